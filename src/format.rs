//! Frame formats, planes, chroma siting and scale requests

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;

/// Largest supported power-of-two factor per axis.
pub const MAX_SCALE_FACTOR: u32 = 8;

/// Color family of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorFamily {
    Gray,
    Yuv,
}

/// Assumed position of chroma samples relative to co-located luma samples.
///
/// Only the horizontal axis of horizontally subsampled chroma is affected;
/// vertically subsampled chroma always sits halfway between luma rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
pub enum ChromaSiting {
    /// Chroma sample co-sited with the left luma sample (MPEG-2)
    #[default]
    #[serde(rename = "left", alias = "mpeg2", alias = "MPEG2")]
    #[value(name = "left", alias = "mpeg2")]
    LeftAligned,
    /// Chroma sample centred between its luma samples (MPEG-1)
    #[serde(rename = "center", alias = "mpeg1", alias = "MPEG1")]
    #[value(name = "center", alias = "mpeg1")]
    Centered,
}

impl fmt::Display for ChromaSiting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChromaSiting::LeftAligned => write!(f, "left"),
            ChromaSiting::Centered => write!(f, "center"),
        }
    }
}

/// One plane of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaneKind {
    Luma,
    #[serde(rename = "u")]
    ChromaU,
    #[serde(rename = "v")]
    ChromaV,
}

impl PlaneKind {
    /// Plane index within the frame (Y=0, U=1, V=2).
    pub fn index(self) -> usize {
        match self {
            PlaneKind::Luma => 0,
            PlaneKind::ChromaU => 1,
            PlaneKind::ChromaV => 2,
        }
    }

    pub fn is_chroma(self) -> bool {
        !matches!(self, PlaneKind::Luma)
    }

    pub fn name(self) -> &'static str {
        match self {
            PlaneKind::Luma => "luma",
            PlaneKind::ChromaU => "chroma-u",
            PlaneKind::ChromaV => "chroma-v",
        }
    }
}

impl fmt::Display for PlaneKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

const GRAY_PLANES: [PlaneKind; 1] = [PlaneKind::Luma];
const YUV_PLANES: [PlaneKind; 3] = [PlaneKind::Luma, PlaneKind::ChromaU, PlaneKind::ChromaV];

/// Description of a frame's layout.
///
/// Subsampling factors are log2 values: 0 = full resolution, 1 = halved.
/// The luma plane is never subsampled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameFormat {
    pub color_family: ColorFamily,
    pub subsampling_w: u8,
    pub subsampling_h: u8,
    pub bit_depth: u8,
}

impl FrameFormat {
    pub fn gray(bit_depth: u8) -> Self {
        Self { color_family: ColorFamily::Gray, subsampling_w: 0, subsampling_h: 0, bit_depth }
    }

    pub fn yuv420(bit_depth: u8) -> Self {
        Self { color_family: ColorFamily::Yuv, subsampling_w: 1, subsampling_h: 1, bit_depth }
    }

    pub fn yuv422(bit_depth: u8) -> Self {
        Self { color_family: ColorFamily::Yuv, subsampling_w: 1, subsampling_h: 0, bit_depth }
    }

    pub fn yuv444(bit_depth: u8) -> Self {
        Self { color_family: ColorFamily::Yuv, subsampling_w: 0, subsampling_h: 0, bit_depth }
    }

    /// Check the format is GRAY, 4:2:0, 4:2:2 or 4:4:4 with 8..16-bit samples.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(8..=16).contains(&self.bit_depth) {
            return Err(ConfigError::UnsupportedFormat(format!(
                "{}: samples must be 8..16 bit integers",
                self
            )));
        }
        let supported = match self.color_family {
            ColorFamily::Gray => self.subsampling_w == 0 && self.subsampling_h == 0,
            ColorFamily::Yuv => {
                self.subsampling_w <= 1 && self.subsampling_h <= self.subsampling_w
            }
        };
        if !supported {
            return Err(ConfigError::UnsupportedFormat(format!(
                "{}: must be GRAY, YUV420, YUV422 or YUV444",
                self
            )));
        }
        Ok(())
    }

    pub fn is_gray(&self) -> bool {
        self.color_family == ColorFamily::Gray
    }

    pub fn is_420(&self) -> bool {
        self.color_family == ColorFamily::Yuv && self.subsampling_w == 1 && self.subsampling_h == 1
    }

    pub fn is_422(&self) -> bool {
        self.color_family == ColorFamily::Yuv && self.subsampling_w == 1 && self.subsampling_h == 0
    }

    pub fn is_444(&self) -> bool {
        self.color_family == ColorFamily::Yuv && self.subsampling_w == 0 && self.subsampling_h == 0
    }

    pub fn planes(&self) -> &'static [PlaneKind] {
        match self.color_family {
            ColorFamily::Gray => &GRAY_PLANES,
            ColorFamily::Yuv => &YUV_PLANES,
        }
    }

    /// Subsampling factors `(w, h)` of one plane.
    pub fn plane_subsampling(&self, plane: PlaneKind) -> (u8, u8) {
        if plane.is_chroma() {
            (self.subsampling_w, self.subsampling_h)
        } else {
            (0, 0)
        }
    }

    /// Dimensions of one plane for a frame of `width` x `height`.
    pub fn plane_dims(&self, plane: PlaneKind, width: u32, height: u32) -> (u32, u32) {
        let (sw, sh) = self.plane_subsampling(plane);
        (width >> sw, height >> sh)
    }

    /// Reject frame dimensions that cannot be represented in this format.
    pub fn check_dimensions(
        &self,
        what: &'static str,
        width: u32,
        height: u32,
    ) -> Result<(), ConfigError> {
        if width == 0 || height == 0 {
            return Err(ConfigError::InvalidDimensions {
                plane: what,
                width,
                height,
                reason: "dimensions must be at least 1".to_string(),
            });
        }
        if self.subsampling_w == 1 && width % 2 != 0 {
            return Err(ConfigError::InvalidDimensions {
                plane: what,
                width,
                height,
                reason: format!("width of {} must be a multiple of 2", self),
            });
        }
        if self.subsampling_h == 1 && height % 2 != 0 {
            return Err(ConfigError::InvalidDimensions {
                plane: what,
                width,
                height,
                reason: format!("height of {} must be a multiple of 2", self),
            });
        }
        Ok(())
    }
}

impl fmt::Display for FrameFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.color_family {
            ColorFamily::Gray => write!(f, "GRAY{}", self.bit_depth),
            ColorFamily::Yuv => {
                let layout = match (self.subsampling_w, self.subsampling_h) {
                    (1, 1) => "420".to_string(),
                    (1, 0) => "422".to_string(),
                    (0, 0) => "444".to_string(),
                    (w, h) => format!("{}{}", w, h),
                };
                write!(f, "YUV{}P{}", layout, self.bit_depth)
            }
        }
    }
}

/// Parse names like `gray8`, `gray16`, `yuv420p8`, `yuv422p10`, `yuv444p16`.
impl FromStr for FrameFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        let unsupported = || ConfigError::UnsupportedFormat(format!("unrecognized format '{}'", s));

        let parse_bits = |digits: &str| digits.parse::<u8>().map_err(|_| unsupported());

        let format = if let Some(bits) = lower.strip_prefix("gray") {
            FrameFormat::gray(if bits.is_empty() { 8 } else { parse_bits(bits)? })
        } else if let Some(rest) = lower.strip_prefix("yuv") {
            let (layout, bits) = match rest.split_once('p') {
                Some((layout, bits)) => (layout, parse_bits(bits)?),
                None => (rest, 8),
            };
            match layout {
                "420" => FrameFormat::yuv420(bits),
                "422" => FrameFormat::yuv422(bits),
                "444" => FrameFormat::yuv444(bits),
                _ => return Err(unsupported()),
            }
        } else {
            return Err(unsupported());
        };

        format.validate()?;
        Ok(format)
    }
}

/// Per-axis power-of-two enlargement factors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScaleRequest {
    pub x: u32,
    pub y: u32,
}

impl ScaleRequest {
    /// Create a request, rejecting factors that are not 1, 2, 4 or 8.
    pub fn new(x: u32, y: u32) -> Result<Self, ConfigError> {
        check_factor("horizontal", x)?;
        check_factor("vertical", y)?;
        Ok(Self { x, y })
    }

    pub fn uniform(factor: u32) -> Result<Self, ConfigError> {
        Self::new(factor, factor)
    }

    pub fn identity() -> Self {
        Self { x: 1, y: 1 }
    }

    pub fn is_identity(&self) -> bool {
        self.x == 1 && self.y == 1
    }

    /// Re-check a request that may have been deserialized without validation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        Self::new(self.x, self.y).map(|_| ())
    }
}

impl Default for ScaleRequest {
    fn default() -> Self {
        Self::identity()
    }
}

impl fmt::Display for ScaleRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.x, self.y)
    }
}

/// Parse `"2"` (both axes) or `"2x4"`.
impl FromStr for ScaleRequest {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parse = |v: &str| {
            v.trim().parse::<u32>().map_err(|_| {
                ConfigError::invalid_parameter("scale", format!("cannot parse '{}' as a factor", v))
            })
        };
        match s.split_once(['x', 'X']) {
            Some((x, y)) => Self::new(parse(x)?, parse(y)?),
            None => Self::uniform(parse(s)?),
        }
    }
}

/// Validate a single-axis factor.
pub fn check_factor(axis: &'static str, factor: u32) -> Result<(), ConfigError> {
    if factor == 0 || factor > MAX_SCALE_FACTOR || !factor.is_power_of_two() {
        return Err(ConfigError::InvalidScale { axis, factor });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_parse() {
        assert_eq!("yuv420p8".parse::<FrameFormat>().unwrap(), FrameFormat::yuv420(8));
        assert_eq!("YUV422P10".parse::<FrameFormat>().unwrap(), FrameFormat::yuv422(10));
        assert_eq!("gray16".parse::<FrameFormat>().unwrap(), FrameFormat::gray(16));
        assert_eq!("gray".parse::<FrameFormat>().unwrap(), FrameFormat::gray(8));
        assert!("yuv411p8".parse::<FrameFormat>().is_err());
        assert!("yuv420p32".parse::<FrameFormat>().is_err());
        assert!("rgb24".parse::<FrameFormat>().is_err());
    }

    #[test]
    fn test_format_display() {
        assert_eq!(FrameFormat::yuv420(8).to_string(), "YUV420P8");
        assert_eq!(FrameFormat::gray(12).to_string(), "GRAY12");
    }

    #[test]
    fn test_format_validate_rejects_440() {
        let format = FrameFormat {
            color_family: ColorFamily::Yuv,
            subsampling_w: 0,
            subsampling_h: 1,
            bit_depth: 8,
        };
        assert!(format.validate().is_err());
    }

    #[test]
    fn test_plane_dims() {
        let format = FrameFormat::yuv420(8);
        assert_eq!(format.plane_dims(PlaneKind::Luma, 64, 48), (64, 48));
        assert_eq!(format.plane_dims(PlaneKind::ChromaU, 64, 48), (32, 24));
        let format = FrameFormat::yuv422(8);
        assert_eq!(format.plane_dims(PlaneKind::ChromaV, 64, 48), (32, 48));
    }

    #[test]
    fn test_check_dimensions_odd_subsampled() {
        let format = FrameFormat::yuv420(8);
        assert!(format.check_dimensions("input", 64, 48).is_ok());
        assert!(format.check_dimensions("input", 63, 48).is_err());
        assert!(format.check_dimensions("input", 64, 47).is_err());
        assert!(FrameFormat::yuv422(8).check_dimensions("input", 64, 47).is_ok());
        assert!(FrameFormat::gray(8).check_dimensions("input", 0, 4).is_err());
    }

    #[test]
    fn test_planes() {
        assert_eq!(FrameFormat::gray(8).planes(), &[PlaneKind::Luma]);
        assert_eq!(FrameFormat::yuv444(8).planes().len(), 3);
        assert_eq!(FrameFormat::yuv420(8).plane_subsampling(PlaneKind::Luma), (0, 0));
    }

    #[test]
    fn test_scale_request_validation() {
        for f in [1, 2, 4, 8] {
            assert!(ScaleRequest::uniform(f).is_ok());
        }
        for f in [0, 3, 5, 6, 16] {
            assert!(matches!(
                ScaleRequest::uniform(f),
                Err(ConfigError::InvalidScale { factor, .. }) if factor == f
            ));
        }
    }

    #[test]
    fn test_scale_request_parse() {
        assert_eq!("2".parse::<ScaleRequest>().unwrap(), ScaleRequest { x: 2, y: 2 });
        assert_eq!("1x4".parse::<ScaleRequest>().unwrap(), ScaleRequest { x: 1, y: 4 });
        assert!("3x1".parse::<ScaleRequest>().is_err());
        assert!("ax2".parse::<ScaleRequest>().is_err());
    }

    #[test]
    fn test_siting_serde_aliases() {
        let siting: ChromaSiting = serde_json::from_str("\"mpeg1\"").unwrap();
        assert_eq!(siting, ChromaSiting::Centered);
        let siting: ChromaSiting = serde_json::from_str("\"left\"").unwrap();
        assert_eq!(siting, ChromaSiting::LeftAligned);
        assert_eq!(serde_json::to_string(&ChromaSiting::Centered).unwrap(), "\"center\"");
    }
}
