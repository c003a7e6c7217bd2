//! Sub-pixel centre-shift corrections
//!
//! Edge-directed doubling keeps the existing samples in place and
//! interpolates new ones between them, so a doubled axis is biased by half
//! an output sample. The functions here give the `src_left` / `src_top`
//! offsets a corrective resample needs to remove that bias, for luma and for
//! chroma under either siting convention.
//!
//! | Plane / axis | Correction for factor `f > 1` |
//! |--------------|-------------------------------|
//! | luma, horizontal | `-0.5`, or `-0.5 * (f - 1)` when chroma is horizontally subsampled |
//! | luma, vertical | `-0.5` |
//! | chroma, horizontal, subsampled | luma / 2 plus the siting term |
//! | chroma, vertical, subsampled | luma / 2 - 0.25 |
//! | anything with `f == 1` | `0` |
//!
//! The chroma values are always derived from the luma values; they are
//! never chosen independently.

pub mod grid;

use serde::Serialize;

use crate::algorithm::Kernel;
use crate::error::ConfigError;
use crate::format::{check_factor, ChromaSiting, FrameFormat, PlaneKind, ScaleRequest};
use crate::plane::Parity;

/// Offset, in input samples, that folds away one deinterlace doubling when
/// resampling the doubled axis back down by two.
pub const DEINTERLACE_FOLD: f64 = -0.5;

/// An axis of the source plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    Horizontal,
    Vertical,
}

/// A pair of sub-pixel source offsets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ShiftCorrection {
    pub horizontal: f64,
    pub vertical: f64,
}

impl ShiftCorrection {
    pub const ZERO: ShiftCorrection = ShiftCorrection { horizontal: 0.0, vertical: 0.0 };

    pub fn is_zero(&self) -> bool {
        self.horizontal == 0.0 && self.vertical == 0.0
    }
}

/// Luma and chroma corrections for one doubling request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PlaneCorrections {
    pub luma: ShiftCorrection,
    pub chroma: ShiftCorrection,
}

impl PlaneCorrections {
    pub fn for_plane(&self, plane: PlaneKind) -> ShiftCorrection {
        if plane.is_chroma() {
            self.chroma
        } else {
            self.luma
        }
    }
}

/// Field parity the doubler uses at 0-based recursion `level`.
///
/// The first level keeps the existing samples on the even positions; later
/// levels keep them on the odd positions. When chroma is horizontally
/// subsampled ("align chroma"), every horizontal doubling keeps parity 1 so
/// that chroma stays left-anchored.
pub fn doubling_parity(level: u32, axis: Axis, align_chroma: bool) -> Parity {
    if axis == Axis::Horizontal && align_chroma {
        return Parity::Top;
    }
    if level == 0 {
        Parity::Top
    } else {
        Parity::Bottom
    }
}

/// Source offset for a kernel guide resampled alongside a doubling of the
/// given parity.
pub fn guide_shift(parity: Parity) -> f64 {
    match parity {
        Parity::Top => 0.25,
        Parity::Bottom => -0.25,
    }
}

/// Luma correction for a horizontal doubling by `factor`.
pub fn luma_horizontal(factor: u32, align_chroma: bool) -> Result<f64, ConfigError> {
    check_factor("horizontal", factor)?;
    Ok(match factor {
        1 => 0.0,
        f if align_chroma => -0.5 * (f - 1) as f64,
        _ => -0.5,
    })
}

/// Luma correction for a vertical doubling by `factor`.
pub fn luma_vertical(factor: u32) -> Result<f64, ConfigError> {
    check_factor("vertical", factor)?;
    Ok(if factor == 1 { 0.0 } else { -0.5 })
}

/// Chroma correction derived from the luma correction of the same request.
///
/// `in_width` / `out_width` are luma widths before doubling and after the
/// corrective resample.
pub fn chroma_correction(
    luma: ShiftCorrection,
    factors: ScaleRequest,
    format: &FrameFormat,
    siting: ChromaSiting,
    kernel: Kernel,
    in_width: u32,
    out_width: u32,
) -> ShiftCorrection {
    let mut horizontal = luma.horizontal;
    if format.subsampling_w > 0 {
        horizontal /= 2.0;
        horizontal += match siting {
            ChromaSiting::Centered => -0.25 * (factors.x - 1) as f64,
            ChromaSiting::LeftAligned if kernel == Kernel::Point => 0.0,
            ChromaSiting::LeftAligned => {
                0.25 * (1.0 - (in_width * factors.x) as f64 / out_width as f64)
            }
        };
    }

    let vertical = if format.subsampling_h > 0 && factors.y > 1 {
        luma.vertical / 2.0 - 0.25
    } else {
        luma.vertical
    };

    ShiftCorrection { horizontal: grid::tidy(horizontal), vertical }
}

/// Corrections for a power-of-two doubling of `in_width` luma columns by
/// `factors`, resampled afterwards to `out_width` luma columns.
///
/// `align_chroma` is set when the chroma planes take part and are
/// horizontally subsampled.
pub fn doubling_corrections(
    format: &FrameFormat,
    factors: ScaleRequest,
    align_chroma: bool,
    siting: ChromaSiting,
    kernel: Kernel,
    in_width: u32,
    out_width: u32,
) -> Result<PlaneCorrections, ConfigError> {
    let luma = ShiftCorrection {
        horizontal: luma_horizontal(factors.x, align_chroma)?,
        vertical: luma_vertical(factors.y)?,
    };
    let chroma = chroma_correction(luma, factors, format, siting, kernel, in_width, out_width);
    Ok(PlaneCorrections { luma, chroma })
}

/// Source offset for resampling a luma-sized mask down to a chroma plane.
pub fn chroma_mask_shift(axis: Axis, format: &FrameFormat, siting: ChromaSiting) -> f64 {
    match axis {
        Axis::Horizontal if format.subsampling_w > 0 && siting == ChromaSiting::LeftAligned => -0.5,
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::grid::{AxisGrid, PlaneGrid};
    use super::*;

    fn corrections(format: FrameFormat, f: u32, siting: ChromaSiting) -> PlaneCorrections {
        let factors = ScaleRequest::uniform(f).unwrap();
        doubling_corrections(&format, factors, format.subsampling_w > 0, siting, Kernel::Spline36, 64, 64 * f)
            .unwrap()
    }

    /// Grid of one axis after doubling by `f`, following the doubler's parity rule.
    fn doubled_axis(f: u32, axis: Axis, align: bool) -> AxisGrid {
        let mut grid = AxisGrid::SOURCE;
        let mut level = 0;
        let mut remaining = f;
        while remaining > 1 {
            grid = grid.enlarged(doubling_parity(level, axis, align));
            remaining /= 2;
            level += 1;
        }
        grid
    }

    #[test]
    fn test_factor_one_is_zero_everywhere() {
        for format in [FrameFormat::yuv420(8), FrameFormat::yuv422(8), FrameFormat::yuv444(8)] {
            for siting in [ChromaSiting::LeftAligned, ChromaSiting::Centered] {
                let c = corrections(format, 1, siting);
                assert!(c.luma.is_zero(), "{} {}", format, siting);
                assert!(c.chroma.is_zero(), "{} {}", format, siting);
            }
        }
    }

    #[test]
    fn test_luma_values() {
        assert_eq!(luma_horizontal(4, false).unwrap(), -0.5);
        assert_eq!(luma_horizontal(4, true).unwrap(), -1.5);
        assert_eq!(luma_horizontal(8, true).unwrap(), -3.5);
        assert_eq!(luma_vertical(8).unwrap(), -0.5);
    }

    #[test]
    fn test_invalid_factor_is_config_error() {
        assert!(matches!(
            luma_horizontal(3, false),
            Err(ConfigError::InvalidScale { factor: 3, .. })
        ));
        assert!(luma_vertical(16).is_err());
    }

    #[test]
    fn test_chroma_420_values() {
        let left = corrections(FrameFormat::yuv420(8), 2, ChromaSiting::LeftAligned);
        assert_eq!(left.chroma, ShiftCorrection { horizontal: -0.25, vertical: -0.5 });
        let centred = corrections(FrameFormat::yuv420(8), 2, ChromaSiting::Centered);
        assert_eq!(centred.chroma, ShiftCorrection { horizontal: -0.5, vertical: -0.5 });
    }

    #[test]
    fn test_closed_forms_reach_ideal_grid() {
        let cases = [
            (FrameFormat::yuv420(8), ChromaSiting::LeftAligned),
            (FrameFormat::yuv420(8), ChromaSiting::Centered),
            (FrameFormat::yuv422(8), ChromaSiting::LeftAligned),
            (FrameFormat::yuv444(8), ChromaSiting::Centered),
            (FrameFormat::gray(8), ChromaSiting::LeftAligned),
        ];
        for (format, siting) in cases {
            let align = format.subsampling_w > 0;
            for f in [2, 4, 8] {
                let c = corrections(format, f, siting);
                for &plane in format.planes() {
                    let (w, h) = format.plane_dims(plane, 64, 64);
                    let shift = c.for_plane(plane);
                    let out = (w * f, h * f);
                    let got = PlaneGrid {
                        horizontal: doubled_axis(f, Axis::Horizontal, align)
                            .resampled(out.0, out.0, shift.horizontal),
                        vertical: doubled_axis(f, Axis::Vertical, align)
                            .resampled(out.1, out.1, shift.vertical),
                        transposed: false,
                    };
                    let ideal = PlaneGrid::ideal(&format, plane, siting, (w, h), out);
                    assert!(
                        got.approx_eq(&ideal),
                        "{} {} {:?} f={}: {:?} vs {:?}",
                        format,
                        siting,
                        plane,
                        f,
                        got,
                        ideal
                    );
                }
            }
        }
    }

    #[test]
    fn test_parity_rule() {
        assert_eq!(doubling_parity(0, Axis::Vertical, true), Parity::Top);
        assert_eq!(doubling_parity(1, Axis::Vertical, true), Parity::Bottom);
        assert_eq!(doubling_parity(2, Axis::Horizontal, true), Parity::Top);
        assert_eq!(doubling_parity(2, Axis::Horizontal, false), Parity::Bottom);
    }

    #[test]
    fn test_guide_shift_matches_grid_solver() {
        for parity in [Parity::Top, Parity::Bottom] {
            let target = AxisGrid::SOURCE.enlarged(parity);
            assert_eq!(AxisGrid::SOURCE.shift_onto(32, 64, target), guide_shift(parity));
        }
    }

    #[test]
    fn test_chroma_mask_shift() {
        let format = FrameFormat::yuv420(8);
        assert_eq!(chroma_mask_shift(Axis::Horizontal, &format, ChromaSiting::LeftAligned), -0.5);
        assert_eq!(chroma_mask_shift(Axis::Horizontal, &format, ChromaSiting::Centered), 0.0);
        assert_eq!(chroma_mask_shift(Axis::Vertical, &format, ChromaSiting::LeftAligned), 0.0);
    }
}
