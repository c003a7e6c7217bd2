//! Deinterlace antialiasing
//!
//! The first pass doubles the rows; later passes re-interpolate the doubled
//! plane in place with alternating parity. At the end the rows are
//! resampled back down by two with a `-0.5` source offset, unless the fold
//! is deferred to a resample that happens later anyway.

use super::{AntialiasStrategy, AxisPass};
use crate::algorithm::Kernel;
use crate::error::ConfigError;
use crate::graph::{GraphBuilder, NodeId, ResampleParams};
use crate::plane::Parity;
use crate::shift::DEINTERLACE_FOLD;

#[derive(Debug, Clone, Copy, Default)]
pub struct Deinterlace;

impl AntialiasStrategy for Deinterlace {
    fn name(&self) -> &'static str {
        "deinterlace"
    }

    fn run(
        &self,
        builder: &mut GraphBuilder,
        input: NodeId,
        mask: Option<NodeId>,
        pass: &AxisPass,
    ) -> Result<NodeId, ConfigError> {
        let mut node = input;
        let mut mask = mask;

        for i in 0..pass.passes {
            let first = i == 0;
            node = pass.interpolate(builder, node, Parity::for_pass(i), first, mask)?;
            if first && pass.passes > 1 {
                mask = mask.map(|m| double_mask_rows(builder, m));
            }
        }

        if pass.defer_fold {
            return Ok(node);
        }

        let (w, h) = builder.dims(node);
        Ok(builder.resample(
            node,
            ResampleParams {
                width: w,
                height: h / 2,
                src_left: 0.0,
                src_top: DEINTERLACE_FOLD,
                kernel: pass.downscaler,
            },
        ))
    }
}

/// Bring a guide mask to the doubled row count of passes after the first.
fn double_mask_rows(builder: &mut GraphBuilder, mask: NodeId) -> NodeId {
    let (w, h) = builder.dims(mask);
    let target = builder.grid(mask).map_rows(|g| g.enlarged(Parity::Top));
    let doubled = builder.resample_onto(mask, w, h * 2, target, Kernel::Spline36);
    builder.binarize(doubled)
}
