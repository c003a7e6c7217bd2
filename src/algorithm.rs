//! Closed dispatch tables for every algorithm the pipeline can name
//!
//! Names are resolved into these enums once, when parameters are decoded;
//! nothing downstream dispatches on strings.
//!
//! | Table | Values |
//! |-------|--------|
//! | [`Kernel`] | `Bilinear`, `Bicubic`, `Point`, `Lanczos`, `Spline16`, `Spline36` |
//! | [`Interpolation`] | `SangNom`, `znedi3`, `nnedi3cl`, `eedi3`, `eedi2` |
//! | [`Guide`] | a kernel or an interpolation used to build an eedi3 guide plane |
//! | [`Upscaler`] | a kernel or an edge-directed doubler (optionally with a guide) |
//! | [`MaskAlgorithm`] | `TEdgeMask[1-5]`, `TCanny`, `Prewitt`, `Sobel` |

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;

/// Characters accepted between the tokens of compact descriptors.
pub const SEPARATORS: [char; 4] = [' ', '_', '+', '-'];

/// Generic resampling kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Kernel {
    Bilinear,
    Bicubic,
    Point,
    Lanczos,
    Spline16,
    Spline36,
}

impl Kernel {
    pub const ALL: [Kernel; 6] = [
        Kernel::Bilinear,
        Kernel::Bicubic,
        Kernel::Point,
        Kernel::Lanczos,
        Kernel::Spline16,
        Kernel::Spline36,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Kernel::Bilinear => "Bilinear",
            Kernel::Bicubic => "Bicubic",
            Kernel::Point => "Point",
            Kernel::Lanczos => "Lanczos",
            Kernel::Spline16 => "Spline16",
            Kernel::Spline36 => "Spline36",
        }
    }
}

impl fmt::Display for Kernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Kernel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Kernel::ALL
            .iter()
            .copied()
            .find(|k| k.name() == s)
            .ok_or_else(|| ConfigError::UnknownKernel(s.to_string()))
    }
}

/// Edge-directed interpolation backend family.
///
/// `SangNom` can only re-interpolate a field in place; the others can also
/// double the height of a plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Interpolation {
    #[serde(rename = "SangNom")]
    SangNom,
    #[serde(rename = "znedi3")]
    Znedi3,
    #[serde(rename = "nnedi3cl")]
    Nnedi3cl,
    #[serde(rename = "eedi3")]
    Eedi3,
    #[serde(rename = "eedi2")]
    Eedi2,
}

impl Interpolation {
    pub const ALL: [Interpolation; 5] = [
        Interpolation::SangNom,
        Interpolation::Nnedi3cl,
        Interpolation::Znedi3,
        Interpolation::Eedi3,
        Interpolation::Eedi2,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Interpolation::SangNom => "SangNom",
            Interpolation::Znedi3 => "znedi3",
            Interpolation::Nnedi3cl => "nnedi3cl",
            Interpolation::Eedi3 => "eedi3",
            Interpolation::Eedi2 => "eedi2",
        }
    }

    /// Whether the backend can produce a plane of twice the height.
    pub fn can_double(self) -> bool {
        !matches!(self, Interpolation::SangNom)
    }

    /// Whether the backend accepts a guide plane and a guide mask.
    pub fn accepts_guide(self) -> bool {
        matches!(self, Interpolation::Eedi3)
    }

    /// eedi2 always doubles, so same-size passes run it on one field.
    pub fn works_on_fields(self) -> bool {
        matches!(self, Interpolation::Eedi2)
    }

    /// Longest algorithm name that prefixes `s`, if any.
    pub(crate) fn match_prefix(s: &str) -> Option<Interpolation> {
        Interpolation::ALL
            .iter()
            .copied()
            .filter(|a| s.starts_with(a.name()))
            .max_by_key(|a| a.name().len())
    }

    fn expected_list(set: &[Interpolation]) -> String {
        set.iter().map(|a| a.name()).collect::<Vec<_>>().join(", ")
    }
}

impl fmt::Display for Interpolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Interpolation {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Interpolation::ALL.iter().copied().find(|a| a.name() == s).ok_or_else(|| {
            ConfigError::UnknownAlgorithm {
                name: s.to_string(),
                expected: Interpolation::expected_list(&Interpolation::ALL),
            }
        })
    }
}

/// Where a guide plane for eedi3 comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Guide {
    /// Plain resampling of the selected field
    Kernel(Kernel),
    /// Another interpolator run with the same parity and doubling
    Interpolator(Interpolation),
}

/// Interpolators allowed as guides during antialiasing.
const ANTIALIAS_GUIDES: [Interpolation; 4] = [
    Interpolation::SangNom,
    Interpolation::Znedi3,
    Interpolation::Nnedi3cl,
    Interpolation::Eedi2,
];

/// Interpolators allowed as guides while upscaling (SangNom cannot double).
const UPSCALE_GUIDES: [Interpolation; 3] =
    [Interpolation::Znedi3, Interpolation::Nnedi3cl, Interpolation::Eedi2];

impl Guide {
    /// Parse a guide name accepted during antialiasing.
    pub fn parse_for_antialias(s: &str) -> Result<Self, ConfigError> {
        Self::parse_from(s, &ANTIALIAS_GUIDES)
    }

    /// Parse a guide name accepted by the power-of-two doubler.
    pub fn parse_for_upscale(s: &str) -> Result<Self, ConfigError> {
        Self::parse_from(s, &UPSCALE_GUIDES)
    }

    fn parse_from(s: &str, interpolators: &[Interpolation]) -> Result<Self, ConfigError> {
        if let Ok(kernel) = s.parse::<Kernel>() {
            return Ok(Guide::Kernel(kernel));
        }
        interpolators.iter().copied().find(|a| a.name() == s).map(Guide::Interpolator).ok_or_else(
            || ConfigError::UnknownAlgorithm {
                name: s.to_string(),
                expected: Kernel::ALL
                    .iter()
                    .map(|k| k.name())
                    .chain(interpolators.iter().map(|a| a.name()))
                    .collect::<Vec<_>>()
                    .join(", "),
            },
        )
    }

    /// Guides that must be built from a single separated field.
    ///
    /// Such guides (and eedi2 itself) need field separation, which in turn
    /// needs stricter padding on some chroma layouts.
    pub fn works_on_fields(self) -> bool {
        match self {
            Guide::Kernel(_) => true,
            Guide::Interpolator(a) => a.works_on_fields(),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Guide::Kernel(k) => k.name(),
            Guide::Interpolator(a) => a.name(),
        }
    }
}

impl fmt::Display for Guide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for Guide {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

/// The scaler used to enlarge planes outside of antialiasing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Upscaler {
    Kernel(Kernel),
    EdgeDirected { algorithm: Interpolation, guide: Option<Guide> },
}

impl Upscaler {
    pub fn is_edge_directed(&self) -> bool {
        matches!(self, Upscaler::EdgeDirected { .. })
    }
}

impl Default for Upscaler {
    fn default() -> Self {
        Upscaler::Kernel(Kernel::Spline36)
    }
}

impl fmt::Display for Upscaler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Upscaler::Kernel(k) => write!(f, "{}", k),
            Upscaler::EdgeDirected { algorithm, guide: None } => write!(f, "{}", algorithm),
            Upscaler::EdgeDirected { algorithm, guide: Some(guide) } => {
                write!(f, "{} {}", algorithm, guide)
            }
        }
    }
}

/// Parse `Spline36`, `znedi3`, `eedi3`, `eedi3 znedi3`, `eedi3_Bicubic`, ...
impl FromStr for Upscaler {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(kernel) = s.parse::<Kernel>() {
            return Ok(Upscaler::Kernel(kernel));
        }

        let upscalers =
            [Interpolation::Znedi3, Interpolation::Nnedi3cl, Interpolation::Eedi3, Interpolation::Eedi2];
        let unknown = || ConfigError::UnknownAlgorithm {
            name: s.to_string(),
            expected: Kernel::ALL
                .iter()
                .map(|k| k.name())
                .chain(upscalers.iter().map(|a| a.name()))
                .collect::<Vec<_>>()
                .join(", "),
        };

        let algorithm = Interpolation::match_prefix(s)
            .filter(|a| upscalers.contains(a))
            .ok_or_else(unknown)?;
        let rest = &s[algorithm.name().len()..];
        if rest.is_empty() {
            return Ok(Upscaler::EdgeDirected { algorithm, guide: None });
        }
        if !algorithm.accepts_guide() {
            return Err(unknown());
        }
        let rest = rest.strip_prefix(SEPARATORS).unwrap_or(rest);
        let guide = Guide::parse_for_upscale(rest)?;
        Ok(Upscaler::EdgeDirected { algorithm, guide: Some(guide) })
    }
}

impl TryFrom<String> for Upscaler {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Upscaler> for String {
    fn from(value: Upscaler) -> Self {
        value.to_string()
    }
}

/// Edge-detection backend used to build merge masks and eedi3 guide masks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum MaskAlgorithm {
    /// TEdgeMask with its `type` parameter (1..=5)
    TEdgeMask { kind: u8 },
    TCanny,
    Prewitt,
    Sobel,
}

impl MaskAlgorithm {
    /// Prewitt and Sobel binarize at an integer threshold.
    pub fn rounds_threshold(self) -> bool {
        matches!(self, MaskAlgorithm::Prewitt | MaskAlgorithm::Sobel)
    }

    /// Apply the algorithm's threshold convention.
    pub fn effective_threshold(self, threshold: f64) -> f64 {
        if self.rounds_threshold() {
            round_half_away(threshold)
        } else {
            threshold
        }
    }
}

impl Default for MaskAlgorithm {
    fn default() -> Self {
        MaskAlgorithm::TEdgeMask { kind: 4 }
    }
}

impl fmt::Display for MaskAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MaskAlgorithm::TEdgeMask { kind: 4 } => write!(f, "TEdgeMask"),
            MaskAlgorithm::TEdgeMask { kind } => write!(f, "TEdgeMask{}", kind),
            MaskAlgorithm::TCanny => write!(f, "TCanny"),
            MaskAlgorithm::Prewitt => write!(f, "Prewitt"),
            MaskAlgorithm::Sobel => write!(f, "Sobel"),
        }
    }
}

impl FromStr for MaskAlgorithm {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(kind) = s.strip_prefix("TEdgeMask") {
            if kind.is_empty() {
                return Ok(MaskAlgorithm::TEdgeMask { kind: 4 });
            }
            if kind.chars().count() > 1 {
                return Err(ConfigError::invalid_parameter(
                    "mask_algorithm",
                    "TEdgeMask type must be a single character",
                ));
            }
            return match kind.parse::<u8>() {
                Ok(kind @ 1..=5) => Ok(MaskAlgorithm::TEdgeMask { kind }),
                _ => Err(ConfigError::invalid_parameter(
                    "mask_algorithm",
                    "TEdgeMask type must be between 1 and 5",
                )),
            };
        }
        match s {
            "TCanny" => Ok(MaskAlgorithm::TCanny),
            "Prewitt" => Ok(MaskAlgorithm::Prewitt),
            "Sobel" => Ok(MaskAlgorithm::Sobel),
            _ => Err(ConfigError::UnknownAlgorithm {
                name: s.to_string(),
                expected: "TEdgeMask, TCanny, Prewitt, Sobel".to_string(),
            }),
        }
    }
}

impl TryFrom<String> for MaskAlgorithm {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<MaskAlgorithm> for String {
    fn from(value: MaskAlgorithm) -> Self {
        value.to_string()
    }
}

/// Round half away from zero.
pub(crate) fn round_half_away(value: f64) -> f64 {
    if value < 0.0 {
        -(-value + 0.5).floor()
    } else {
        (value + 0.5).floor()
    }
}

/// Tuning knobs forwarded untouched to interpolation backends.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tuning {
    /// Neural-network size for the nnedi family
    pub nns: u8,
    /// eedi3 `alpha`
    pub alpha: f64,
    /// eedi3 `beta`
    pub beta: f64,
    /// eedi3 `gamma`
    pub gamma: f64,
    /// SangNom antialiasing strength (0 disables its own smoothing)
    pub sangnom_strength: u8,
}

impl Default for Tuning {
    fn default() -> Self {
        Self { nns: 1, alpha: 0.2, beta: 0.25, gamma: 20.0, sangnom_strength: 48 }
    }
}
