//! Double-rate antialiasing
//!
//! Every pass interpolates both fields independently from the same input
//! and blends the two results with equal weight; the blend feeds the next
//! pass. The two interpolations of a pass have no dependency on each other.

use super::{AntialiasStrategy, AxisPass};
use crate::error::ConfigError;
use crate::graph::{GraphBuilder, NodeId};
use crate::plane::Parity;

#[derive(Debug, Clone, Copy, Default)]
pub struct DoubleRate;

impl AntialiasStrategy for DoubleRate {
    fn name(&self) -> &'static str {
        "double-rate"
    }

    fn run(
        &self,
        builder: &mut GraphBuilder,
        input: NodeId,
        mask: Option<NodeId>,
        pass: &AxisPass,
    ) -> Result<NodeId, ConfigError> {
        let mut node = input;
        for _ in 0..pass.passes {
            let top = pass.interpolate(builder, node, Parity::Top, false, mask)?;
            let bottom = pass.interpolate(builder, node, Parity::Bottom, false, mask)?;
            node = builder.average(top, bottom)?;
        }
        Ok(node)
    }
}
