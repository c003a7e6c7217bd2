//! Multi-pass antialiasing strategies
//!
//! Antialiasing re-interpolates one field of a plane with an edge-directed
//! algorithm, which smooths jagged edges running along the rows. Running it
//! on the transposed plane treats columns the same way.
//!
//! # Module Structure
//!
//! - [`single_rate`] - one interpolation per pass, alternating field parity
//! - [`double_rate`] - both fields per pass, blended with equal weight
//! - [`deinterlace`] - doubles the rows on the first pass, folds them back at the end
//!
//! | Strategy | Output rows | Backend calls per pass |
//! |----------|-------------|------------------------|
//! | `sr` | unchanged | 1 |
//! | `dr` | unchanged | 2 |
//! | `di` | doubled, then folded back unless deferred | 1 |
//!
//! [`antialias_plane`] wraps a strategy with the padding, transposition and
//! cropping one plane needs.

pub mod deinterlace;
pub mod double_rate;
pub mod single_rate;

pub use deinterlace::Deinterlace;
pub use double_rate::DoubleRate;
pub use single_rate::SingleRate;

use serde::Serialize;

use crate::algorithm::{Guide, Interpolation, Kernel, Tuning};
use crate::error::ConfigError;
use crate::graph::{EnlargeParams, GraphBuilder, NodeId};
use crate::mode::{ModeDirective, Strategy};
use crate::pad::Padding;
use crate::plane::Parity;
use crate::shift::Axis;

/// Settings for antialiasing one axis of one plane.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AxisPass {
    pub algorithm: Interpolation,
    /// eedi3 guide source
    pub guide: Option<Guide>,
    pub passes: u32,
    /// Backend tuning with the plane's SangNom strength already applied
    pub tuning: Tuning,
    /// Kernel for the deinterlace fold
    pub downscaler: Kernel,
    /// Leave deinterlaced rows doubled for a later resample to fold
    pub defer_fold: bool,
}

impl AxisPass {
    /// Interpolate the field opposite to `parity`.
    ///
    /// With `double_height` the rows are doubled first. Algorithms that
    /// cannot work in place or cannot double are routed through field
    /// selection or line doubling so that every call yields the same
    /// dimensions and sample grid.
    pub fn interpolate(
        &self,
        builder: &mut GraphBuilder,
        node: NodeId,
        parity: Parity,
        double_height: bool,
        mask: Option<NodeId>,
    ) -> Result<NodeId, ConfigError> {
        let params = EnlargeParams { algorithm: self.algorithm, parity, double_height, tuning: self.tuning };

        match self.algorithm {
            Interpolation::SangNom => {
                let base = if double_height { builder.line_double(node) } else { node };
                builder.enlarge(base, EnlargeParams { double_height: false, ..params }, None, None)
            }
            Interpolation::Eedi2 if !double_height => {
                let field = builder.select_field(node, parity)?;
                builder.enlarge(field, EnlargeParams { double_height: true, ..params }, None, None)
            }
            Interpolation::Eedi3 => {
                let guide = self.guide_plane(builder, node, parity, double_height)?;
                builder.enlarge(node, params, guide, mask)
            }
            _ => builder.enlarge(node, params, None, None),
        }
    }

    /// Guide for an eedi3 call, aligned with the call's output.
    fn guide_plane(
        &self,
        builder: &mut GraphBuilder,
        node: NodeId,
        parity: Parity,
        double_height: bool,
    ) -> Result<Option<NodeId>, ConfigError> {
        let Some(guide) = self.guide else {
            return Ok(None);
        };

        let (w, h) = builder.dims(node);
        let guide = match guide {
            Guide::Kernel(kernel) if double_height => {
                let target = builder.grid(node).map_rows(|g| g.enlarged(parity));
                builder.resample_onto(node, w, h * 2, target, kernel)
            }
            Guide::Kernel(kernel) => {
                let target = builder.grid(node);
                let field = builder.select_field(node, parity)?;
                builder.resample_onto(field, w, h, target, kernel)
            }
            Guide::Interpolator(algorithm) => {
                let pass = AxisPass { algorithm, guide: None, ..*self };
                pass.interpolate(builder, node, parity, double_height, None)?
            }
        };
        Ok(Some(guide))
    }
}

/// One way of combining repeated antialiasing passes.
pub trait AntialiasStrategy: Sync {
    fn name(&self) -> &'static str;

    /// Antialias along the rows of `input`.
    ///
    /// `mask` is an eedi3 guide mask in the same orientation as `input`.
    fn run(
        &self,
        builder: &mut GraphBuilder,
        input: NodeId,
        mask: Option<NodeId>,
        pass: &AxisPass,
    ) -> Result<NodeId, ConfigError>;
}

/// The strategy implementing `kind`; `None` for the null mode.
pub fn strategy_for(kind: Strategy) -> Option<&'static dyn AntialiasStrategy> {
    match kind {
        Strategy::SingleRate => Some(&SingleRate),
        Strategy::DoubleRate => Some(&DoubleRate),
        Strategy::Deinterlace => Some(&Deinterlace),
        Strategy::None => None,
    }
}

/// Plane-level settings derived from the pipeline parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PlaneSettings {
    pub padding: Padding,
    pub tuning: Tuning,
    pub downscaler: Kernel,
    /// Leave the last processed axis doubled (deinterlace only)
    pub defer: bool,
}

/// The axis whose deinterlace fold is deferred, if any.
pub fn deferred_axis(directive: &ModeDirective, defer: bool) -> Option<Axis> {
    if !defer || directive.strategy != Strategy::Deinterlace {
        return None;
    }
    if directive.direction.vertical() {
        Some(Axis::Vertical)
    } else {
        Some(Axis::Horizontal)
    }
}

/// Antialias one plane: pad, process the requested directions, crop.
///
/// Horizontal antialiasing runs on the transposed plane. When the fold is
/// deferred the crop on that axis is doubled to match.
pub fn antialias_plane(
    builder: &mut GraphBuilder,
    input: NodeId,
    mask: Option<NodeId>,
    directive: &ModeDirective,
    settings: &PlaneSettings,
) -> Result<NodeId, ConfigError> {
    let (Some(strategy), Some(algorithm)) = (strategy_for(directive.strategy), directive.algorithm) else {
        return Ok(input);
    };

    let deferred = deferred_axis(directive, settings.defer);
    let pass = |axis: Axis| AxisPass {
        algorithm,
        guide: directive.guide,
        passes: directive.passes,
        tuning: settings.tuning,
        downscaler: settings.downscaler,
        defer_fold: deferred == Some(axis),
    };

    let mask = mask.filter(|_| algorithm.accepts_guide());
    let padded_mask = mask.map(|m| builder.pad(m, settings.padding));
    let mut node = builder.pad(input, settings.padding);

    tracing::debug!(
        plane = %builder.node(input).plane,
        strategy = strategy.name(),
        algorithm = %algorithm,
        passes = directive.passes,
        deferred = ?deferred,
        "antialiasing {}",
        input
    );

    if directive.direction.horizontal() {
        let turned = builder.transpose(node);
        let turned_mask = padded_mask.map(|m| builder.transpose(m));
        let done = strategy.run(builder, turned, turned_mask, &pass(Axis::Horizontal))?;
        node = builder.transpose(done);
    }

    if directive.direction.vertical() {
        node = strategy.run(builder, node, padded_mask, &pass(Axis::Vertical))?;
    }

    let crop = match deferred {
        Some(Axis::Horizontal) => settings.padding.scaled(2, 1),
        Some(Axis::Vertical) => settings.padding.scaled(1, 2),
        None => settings.padding,
    };
    builder.crop(node, crop)
}
