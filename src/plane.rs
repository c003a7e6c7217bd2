//! Raster planes and the structural operations the core performs itself
//!
//! Everything here only moves or blends samples: transposition, edge
//! padding, cropping, field selection, line doubling, equal-weight
//! averaging, masked merging and binarization. Synthesis of new sample
//! values is left to backends.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ConfigError;

/// Selects which of the two interleaved row sets is kept as-is.
///
/// With `Top` (parity 1) the input rows land on the even output rows; with
/// `Bottom` (parity 0) they land on the odd rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    Bottom,
    Top,
}

impl Parity {
    /// Parity of 0-based pass `pass`: 1, 0, 1, 0, ...
    pub fn for_pass(pass: u32) -> Self {
        if pass % 2 == 0 {
            Parity::Top
        } else {
            Parity::Bottom
        }
    }

    pub fn value(self) -> u8 {
        match self {
            Parity::Bottom => 0,
            Parity::Top => 1,
        }
    }

    pub fn flipped(self) -> Self {
        match self {
            Parity::Bottom => Parity::Top,
            Parity::Top => Parity::Bottom,
        }
    }

    /// Index of the first row belonging to this field.
    pub fn first_row(self) -> u32 {
        match self {
            Parity::Top => 0,
            Parity::Bottom => 1,
        }
    }
}

impl fmt::Display for Parity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value())
    }
}

/// A single 2-D grid of integer samples.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterPlane {
    width: u32,
    height: u32,
    bit_depth: u8,
    samples: Vec<u16>,
}

impl RasterPlane {
    /// A plane filled with `value`.
    pub fn filled(width: u32, height: u32, bit_depth: u8, value: u16) -> Self {
        Self { width, height, bit_depth, samples: vec![value; width as usize * height as usize] }
    }

    /// Wrap row-major samples.
    pub fn from_samples(
        width: u32,
        height: u32,
        bit_depth: u8,
        samples: Vec<u16>,
    ) -> Result<Self, ConfigError> {
        if width == 0 || height == 0 {
            return Err(ConfigError::InvalidDimensions {
                plane: "raster",
                width,
                height,
                reason: "dimensions must be at least 1".to_string(),
            });
        }
        if !(8..=16).contains(&bit_depth) {
            return Err(ConfigError::UnsupportedFormat(format!(
                "{}-bit samples: must be 8..16 bit integers",
                bit_depth
            )));
        }
        if samples.len() != width as usize * height as usize {
            return Err(ConfigError::InvalidDimensions {
                plane: "raster",
                width,
                height,
                reason: format!("expected {} samples, got {}", width * height, samples.len()),
            });
        }
        Ok(Self { width, height, bit_depth, samples })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dims(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn bit_depth(&self) -> u8 {
        self.bit_depth
    }

    pub fn samples(&self) -> &[u16] {
        &self.samples
    }

    /// Largest representable sample value.
    pub fn peak(&self) -> u16 {
        ((1u32 << self.bit_depth) - 1) as u16
    }

    pub fn get(&self, x: u32, y: u32) -> u16 {
        self.samples[self.index(x, y)]
    }

    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    fn row(&self, y: u32) -> &[u16] {
        let start = self.index(0, y);
        &self.samples[start..start + self.width as usize]
    }

    fn with_samples(&self, width: u32, height: u32, samples: Vec<u16>) -> Self {
        Self { width, height, bit_depth: self.bit_depth, samples }
    }

    /// Swap rows and columns.
    pub fn transpose(&self) -> Self {
        let mut out = Vec::with_capacity(self.samples.len());
        for x in 0..self.width {
            for y in 0..self.height {
                out.push(self.get(x, y));
            }
        }
        self.with_samples(self.height, self.width, out)
    }

    /// Extend every edge by duplicating the outermost samples.
    pub fn pad_edges(&self, left: u32, right: u32, top: u32, bottom: u32) -> Self {
        let width = self.width + left + right;
        let height = self.height + top + bottom;
        let mut out = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            let sy = y.saturating_sub(top).min(self.height - 1);
            let row = self.row(sy);
            for x in 0..width {
                let sx = x.saturating_sub(left).min(self.width - 1);
                out.push(row[sx as usize]);
            }
        }
        self.with_samples(width, height, out)
    }

    /// Remove samples from every edge. Over-cropping leaves at least one sample.
    pub fn crop(&self, left: u32, right: u32, top: u32, bottom: u32) -> Self {
        let left = left.min(self.width - 1);
        let top = top.min(self.height - 1);
        let width = self.width.saturating_sub(left + right).max(1);
        let height = self.height.saturating_sub(top + bottom).max(1);
        let mut out = Vec::with_capacity(width as usize * height as usize);
        for y in top..top + height {
            let row = self.row(y);
            out.extend_from_slice(&row[left as usize..(left + width) as usize]);
        }
        self.with_samples(width, height, out)
    }

    /// Keep every other row, starting at the row selected by `parity`.
    pub fn select_field(&self, parity: Parity) -> Self {
        let height = (self.height / 2).max(1);
        let mut out = Vec::with_capacity(self.width as usize * height as usize);
        for y in 0..height {
            let sy = (2 * y + parity.first_row()).min(self.height - 1);
            out.extend_from_slice(self.row(sy));
        }
        self.with_samples(self.width, height, out)
    }

    /// Double the height by repeating every row.
    pub fn line_double(&self) -> Self {
        let mut out = Vec::with_capacity(self.samples.len() * 2);
        for y in 0..self.height {
            let row = self.row(y);
            out.extend_from_slice(row);
            out.extend_from_slice(row);
        }
        self.with_samples(self.width, self.height * 2, out)
    }

    /// Equal-weight blend of two planes, rounding half up.
    pub fn average(&self, other: &RasterPlane) -> Self {
        let out = self
            .samples
            .iter()
            .zip(&other.samples)
            .map(|(&a, &b)| ((a as u32 + b as u32 + 1) / 2) as u16)
            .collect();
        self.with_samples(self.width, self.height, out)
    }

    /// Blend towards `overlay` in proportion to `mask`.
    ///
    /// A mask sample of 0 keeps `self`, the mask's peak value takes `overlay`.
    pub fn masked_merge(&self, overlay: &RasterPlane, mask: &RasterPlane) -> Self {
        let peak = mask.peak() as u32;
        let half = peak / 2;
        let out = self
            .samples
            .iter()
            .zip(&overlay.samples)
            .zip(&mask.samples)
            .map(|((&a, &b), &m)| {
                let m = (m as u32).min(peak);
                ((a as u32 * (peak - m) + b as u32 * m + half) / peak) as u16
            })
            .collect();
        self.with_samples(self.width, self.height, out)
    }

    /// Map samples at or above `threshold` to peak and the rest to 0.
    pub fn binarize(&self, threshold: u16) -> Self {
        let peak = self.peak();
        let out = self.samples.iter().map(|&v| if v >= threshold { peak } else { 0 }).collect();
        self.with_samples(self.width, self.height, out)
    }
}
