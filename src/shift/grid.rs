//! Exact sample-grid bookkeeping
//!
//! Every node of a graph records where its samples sit in the coordinate
//! space of the source plane it descends from: per axis, the position of
//! sample 0 and the spacing between samples, both in source-sample units.
//! Each structural or resampling step maps a grid to a new grid exactly, so
//! any accumulated sub-pixel bias can be removed later by one resample whose
//! offset is solved from the tracked grid and the ideal one.

use serde::Serialize;

use crate::format::{ChromaSiting, FrameFormat, PlaneKind};
use crate::plane::Parity;

/// Tolerance for comparing grid positions.
pub const EPSILON: f64 = 1e-9;

/// Snap values within [`EPSILON`] of a multiple of 2^-24 onto it.
///
/// Shifts are dyadic rationals in practice; this removes the noise that
/// `m / n` ratios leave behind.
pub fn tidy(value: f64) -> f64 {
    let scale = (1u32 << 24) as f64;
    let snapped = (value * scale).round() / scale;
    if (snapped - value).abs() < EPSILON {
        snapped + 0.0
    } else {
        value
    }
}

/// Sample positions along one axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AxisGrid {
    /// Position of sample 0
    pub origin: f64,
    /// Distance between neighbouring samples
    pub step: f64,
}

impl AxisGrid {
    /// The source plane's own sampling.
    pub const SOURCE: AxisGrid = AxisGrid { origin: 0.0, step: 1.0 };

    /// Ideal positions after resizing `from` samples to `to` with centres
    /// preserved.
    pub fn centred(from: u32, to: u32) -> Self {
        let step = from as f64 / to as f64;
        Self { origin: -0.5 + 0.5 * step, step }
    }

    /// Ideal positions for horizontally subsampled chroma whose samples are
    /// co-sited with the left luma sample.
    pub fn left_aligned(from: u32, to: u32) -> Self {
        let step = from as f64 / to as f64;
        Self { origin: 0.25 * step - 0.25, step }
    }

    /// `before` samples of edge padding were inserted ahead of sample 0.
    pub fn padded(self, before: u32) -> Self {
        Self { origin: self.origin - before as f64 * self.step, ..self }
    }

    /// `before` samples were removed ahead of sample 0.
    pub fn cropped(self, before: u32) -> Self {
        Self { origin: self.origin + before as f64 * self.step, ..self }
    }

    /// Doubled by interpolating new samples between the existing ones.
    pub fn enlarged(self, parity: Parity) -> Self {
        let step = self.step / 2.0;
        match parity {
            Parity::Top => Self { origin: self.origin, step },
            Parity::Bottom => Self { origin: self.origin - step, step },
        }
    }

    /// Every other sample, starting at the one selected by `parity`.
    pub fn field(self, parity: Parity) -> Self {
        let origin = match parity {
            Parity::Top => self.origin,
            Parity::Bottom => self.origin + self.step,
        };
        Self { origin, step: self.step * 2.0 }
    }

    /// Resampled from `from` to `to` samples with a source offset of
    /// `shift` input samples.
    pub fn resampled(self, from: u32, to: u32, shift: f64) -> Self {
        let ratio = from as f64 / to as f64;
        Self {
            origin: self.origin + self.step * (0.5 * ratio - 0.5 + shift),
            step: self.step * ratio,
        }
    }

    /// The source offset that makes `resampled(from, to, _)` land on
    /// `target`.
    pub fn shift_onto(self, from: u32, to: u32, target: AxisGrid) -> f64 {
        let ratio = from as f64 / to as f64;
        tidy((target.origin - self.origin) / self.step - 0.5 * ratio + 0.5)
    }

    pub fn approx_eq(&self, other: &AxisGrid) -> bool {
        (self.origin - other.origin).abs() < EPSILON && (self.step - other.step).abs() < EPSILON
    }
}

/// Sample positions of a whole plane.
///
/// `horizontal` and `vertical` always refer to the source plane's axes;
/// `transposed` says whether the node's columns currently run along the
/// source's vertical axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PlaneGrid {
    pub horizontal: AxisGrid,
    pub vertical: AxisGrid,
    pub transposed: bool,
}

impl PlaneGrid {
    pub const SOURCE: PlaneGrid =
        PlaneGrid { horizontal: AxisGrid::SOURCE, vertical: AxisGrid::SOURCE, transposed: false };

    /// Where the samples of `plane` should sit after resizing it from
    /// `from` to `to` (plane dimensions, untransposed).
    pub fn ideal(
        format: &FrameFormat,
        plane: PlaneKind,
        siting: ChromaSiting,
        from: (u32, u32),
        to: (u32, u32),
    ) -> Self {
        let (sub_w, _) = format.plane_subsampling(plane);
        let horizontal = if sub_w > 0 && siting == ChromaSiting::LeftAligned {
            AxisGrid::left_aligned(from.0, to.0)
        } else {
            AxisGrid::centred(from.0, to.0)
        };
        Self { horizontal, vertical: AxisGrid::centred(from.1, to.1), transposed: false }
    }

    /// Grid along the node's columns (its width axis).
    pub fn columns(&self) -> AxisGrid {
        if self.transposed {
            self.vertical
        } else {
            self.horizontal
        }
    }

    /// Grid along the node's rows (its height axis).
    pub fn rows(&self) -> AxisGrid {
        if self.transposed {
            self.horizontal
        } else {
            self.vertical
        }
    }

    pub fn map_columns(mut self, f: impl FnOnce(AxisGrid) -> AxisGrid) -> Self {
        if self.transposed {
            self.vertical = f(self.vertical);
        } else {
            self.horizontal = f(self.horizontal);
        }
        self
    }

    pub fn map_rows(mut self, f: impl FnOnce(AxisGrid) -> AxisGrid) -> Self {
        if self.transposed {
            self.horizontal = f(self.horizontal);
        } else {
            self.vertical = f(self.vertical);
        }
        self
    }

    pub fn transposed(self) -> Self {
        Self { transposed: !self.transposed, ..self }
    }

    /// Same positions on both axes; orientation must match too.
    pub fn approx_eq(&self, other: &PlaneGrid) -> bool {
        self.transposed == other.transposed
            && self.horizontal.approx_eq(&other.horizontal)
            && self.vertical.approx_eq(&other.vertical)
    }
}
