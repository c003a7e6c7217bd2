//! Single-rate antialiasing
//!
//! Each pass re-interpolates one field of the plane at its own resolution.
//! Pass `i` keeps the field of parity `(i + 1) % 2`, so consecutive passes
//! alternate between the two fields.

use super::{AntialiasStrategy, AxisPass};
use crate::error::ConfigError;
use crate::graph::{GraphBuilder, NodeId};
use crate::plane::Parity;

#[derive(Debug, Clone, Copy, Default)]
pub struct SingleRate;

impl AntialiasStrategy for SingleRate {
    fn name(&self) -> &'static str {
        "single-rate"
    }

    fn run(
        &self,
        builder: &mut GraphBuilder,
        input: NodeId,
        mask: Option<NodeId>,
        pass: &AxisPass,
    ) -> Result<NodeId, ConfigError> {
        (0..pass.passes).try_fold(input, |node, i| {
            pass.interpolate(builder, node, Parity::for_pass(i), false, mask)
        })
    }
}
