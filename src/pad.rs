//! Padding plans for edge-directed processing
//!
//! Edge-directed interpolators need dimensions that are a multiple of 4 (or
//! of 8 when fields are separated on 4:2:2 chroma) and a few samples of
//! context beyond every border. Padding duplicates edge samples; the
//! matching crop removes it again after processing, scaled by whatever
//! enlargement happened in between.

use serde::Serialize;

use crate::algorithm::Interpolation;
use crate::format::{FrameFormat, PlaneKind};
use crate::mode::ModeDirective;

/// Smallest margin kept on every padded edge.
pub const MIN_MARGIN: u32 = 4;

/// Sample counts added to (or removed from) each edge of a plane.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub struct Padding {
    pub left: u32,
    pub right: u32,
    pub top: u32,
    pub bottom: u32,
}

impl Padding {
    pub const NONE: Padding = Padding { left: 0, right: 0, top: 0, bottom: 0 };

    pub fn is_none(&self) -> bool {
        *self == Self::NONE
    }

    pub fn horizontal(&self) -> u32 {
        self.left + self.right
    }

    pub fn vertical(&self) -> u32 {
        self.top + self.bottom
    }

    /// The same padding expressed in a plane subsampled by `(sub_w, sub_h)`.
    pub fn subsampled(&self, sub_w: u8, sub_h: u8) -> Self {
        Self {
            left: self.left >> sub_w,
            right: self.right >> sub_w,
            top: self.top >> sub_h,
            bottom: self.bottom >> sub_h,
        }
    }

    /// The same padding after enlarging by `(fx, fy)`.
    pub fn scaled(&self, fx: u32, fy: u32) -> Self {
        Self {
            left: self.left * fx,
            right: self.right * fx,
            top: self.top * fy,
            bottom: self.bottom * fy,
        }
    }

    /// Swap the horizontal and vertical amounts.
    pub fn transposed(&self) -> Self {
        Self { left: self.top, right: self.bottom, top: self.left, bottom: self.right }
    }
}

/// Padding required around an antialiasing run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PadPlan {
    /// Alignment the padded luma dimensions satisfy
    pub modulus: u32,
    /// Luma padding; chroma padding is derived by shifting
    pub luma: Padding,
}

impl PadPlan {
    /// A plan that adds nothing.
    pub fn none() -> Self {
        Self { modulus: 1, luma: Padding::NONE }
    }

    /// Plan the padding for antialiasing a `width` x `height` frame.
    ///
    /// `chroma` says whether chroma planes are antialiased too.
    pub fn for_antialias(
        directive: &ModeDirective,
        format: &FrameFormat,
        chroma: bool,
        width: u32,
        height: u32,
    ) -> Self {
        let Some(algorithm) = directive.algorithm else {
            return Self::none();
        };

        let mod4 = width % 4 == 0 && height % 4 == 0;
        let mod8 = width % 8 == 0 && height % 8 == 0;
        let pad8 = !mod8
            && directive.separates_fields()
            && format.subsampling_w > 0
            && !format.is_420()
            && chroma;

        let skip = directive.strategy == crate::mode::Strategy::Deinterlace
            && algorithm == Interpolation::Eedi3
            && mod4
            && !pad8;
        if skip {
            return Self::none();
        }

        let modulus = if pad8 { 8 } else { 4 };
        let (left, right) = edge_amounts(width, modulus);
        let (top, bottom) = edge_amounts(height, modulus);
        Self { modulus, luma: Padding { left, right, top, bottom } }
    }

    pub fn is_none(&self) -> bool {
        self.luma.is_none()
    }

    /// Padding for one plane of `format`.
    pub fn plane(&self, format: &FrameFormat, plane: PlaneKind) -> Padding {
        let (sub_w, sub_h) = format.plane_subsampling(plane);
        self.luma.subsampled(sub_w, sub_h)
    }
}

/// `(leading, trailing)` padding for one dimension.
fn edge_amounts(dim: u32, modulus: u32) -> (u32, u32) {
    let mut trailing = modulus - dim % modulus;
    if trailing < MIN_MARGIN {
        trailing += MIN_MARGIN;
    }
    let leading = if modulus == 8 && (dim + trailing + MIN_MARGIN) % 8 != 0 { 8 } else { MIN_MARGIN };
    (leading, trailing)
}

/// Border padding the doubler adds on every axis it doubles.
///
/// eedi3 handles borders itself and gets none.
pub fn doubler_border(algorithm: Interpolation, double_x: bool, double_y: bool) -> Padding {
    if algorithm == Interpolation::Eedi3 {
        return Padding::NONE;
    }
    let x = if double_x { MIN_MARGIN } else { 0 };
    let y = if double_y { MIN_MARGIN } else { 0 };
    Padding { left: x, right: x, top: y, bottom: y }
}
