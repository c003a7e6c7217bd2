//! Algorithm parameters and named presets

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::algorithm::{Kernel, MaskAlgorithm, Tuning, Upscaler};
use crate::compositor::MaskPolicy;
use crate::error::ConfigError;
use crate::format::{ChromaSiting, FrameFormat, PlaneKind, ScaleRequest};

/// SangNom smoothing strength used on luma; chroma always gets 0.
pub const SANGNOM_LUMA_STRENGTH: u8 = 48;

/// Which planes are antialiased.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ChromaMode {
    /// Luma only
    #[default]
    Skip,
    /// Luma and chroma
    Include,
    /// Chroma only
    Only,
}

impl ChromaMode {
    /// Planes of `format` that get antialiased. GRAY always yields luma.
    pub fn planes(self, format: &FrameFormat) -> Vec<PlaneKind> {
        let mode = if format.is_gray() { ChromaMode::Skip } else { self };
        format
            .planes()
            .iter()
            .copied()
            .filter(|p| match mode {
                ChromaMode::Skip => !p.is_chroma(),
                ChromaMode::Include => true,
                ChromaMode::Only => p.is_chroma(),
            })
            .collect()
    }
}

/// Where contra-sharpening sits in the pipeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum SharpenMode {
    #[default]
    Off,
    /// On the antialiased plane at supersampled size
    BeforeResize,
    /// On the antialiased plane at output size
    AfterResize,
}

/// eedi3 tuning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Eedi3Params {
    pub alpha: f64,
    pub beta: f64,
    pub gamma: f64,
}

impl Default for Eedi3Params {
    fn default() -> Self {
        let tuning = Tuning::default();
        Self { alpha: tuning.alpha, beta: tuning.beta, gamma: tuning.gamma }
    }
}

/// Everything besides the mode and scale that shapes a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AlgorithmParameters {
    /// Resolution antialiasing runs at; `None` means the output scale
    pub supersample: Option<ScaleRequest>,
    pub upscaler: Upscaler,
    pub downscaler: Kernel,
    pub mask: MaskPolicy,
    pub mask_algorithm: MaskAlgorithm,
    pub mask_threshold: f64,
    /// Values above 0 give eedi3 an edge mask detected at this threshold
    pub eedi3_mask_threshold: f64,
    pub chroma: ChromaMode,
    pub siting: ChromaSiting,
    pub sharpen: SharpenMode,
    pub sharpen_strength: Option<f64>,
    pub nns: u8,
    pub eedi3: Eedi3Params,
    /// Reuse identical edge masks instead of detecting them again
    pub reuse_masks: bool,
}

impl Default for AlgorithmParameters {
    fn default() -> Self {
        Self {
            supersample: None,
            upscaler: Upscaler::default(),
            downscaler: Kernel::Spline36,
            mask: MaskPolicy::default(),
            mask_algorithm: MaskAlgorithm::default(),
            mask_threshold: 8.0,
            eedi3_mask_threshold: 0.0,
            chroma: ChromaMode::default(),
            siting: ChromaSiting::default(),
            sharpen: SharpenMode::default(),
            sharpen_strength: None,
            nns: 1,
            eedi3: Eedi3Params::default(),
            reuse_masks: false,
        }
    }
}

impl AlgorithmParameters {
    /// Check value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(supersample) = self.supersample {
            supersample.validate()?;
        }
        if self.mask_threshold.is_nan() || self.mask_threshold <= 0.0 {
            return Err(ConfigError::invalid_parameter("mask_threshold", "must be greater than 0"));
        }
        if self.eedi3_mask_threshold.is_nan() || self.eedi3_mask_threshold < 0.0 {
            return Err(ConfigError::invalid_parameter("eedi3_mask_threshold", "must not be negative"));
        }
        if self.nns > 4 {
            return Err(ConfigError::invalid_parameter("nns", format!("{} is outside 0..=4", self.nns)));
        }
        if let Some(strength) = self.sharpen_strength {
            if strength.is_nan() || strength < 0.0 {
                return Err(ConfigError::invalid_parameter("sharpen_strength", "must not be negative"));
            }
        }
        Ok(())
    }

    /// Backend tuning for antialiasing `plane`.
    pub fn tuning(&self, plane: PlaneKind) -> Tuning {
        Tuning {
            nns: self.nns,
            alpha: self.eedi3.alpha,
            beta: self.eedi3.beta,
            gamma: self.eedi3.gamma,
            sangnom_strength: if plane.is_chroma() { 0 } else { SANGNOM_LUMA_STRENGTH },
        }
    }

    /// Sharpening as actually applied: a zero strength turns it off, and
    /// sharpening before the resize needs an antialiasing pass to sharpen.
    pub fn effective_sharpen(&self, null_mode: bool) -> SharpenMode {
        match self.sharpen {
            _ if self.sharpen_strength == Some(0.0) => SharpenMode::Off,
            SharpenMode::BeforeResize if null_mode => SharpenMode::Off,
            mode => mode,
        }
    }
}

/// Named combinations of a mode and parameter defaults.
///
/// Presets never set `supersample`; it stays equal to the scale unless the
/// caller sets it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
pub enum Preset {
    /// Single-rate SangNom with a Sobel mask
    #[serde(rename = "maa2")]
    #[value(name = "maa2")]
    Maa2,
    /// Vertical double-rate znedi3, sharpened before the resize
    #[serde(rename = "daa")]
    #[value(name = "daa")]
    Daa,
    /// No antialiasing, znedi3 upscaling, sharpened after the resize
    #[serde(rename = "Mrdaa", alias = "MrdaaLame")]
    #[value(name = "Mrdaa", alias = "MrdaaLame")]
    Mrdaa,
    /// Two deinterlace passes of znedi3
    #[serde(rename = "santiag")]
    #[value(name = "santiag")]
    Santiag,
}

impl Preset {
    pub fn name(self) -> &'static str {
        match self {
            Preset::Maa2 => "maa2",
            Preset::Daa => "daa",
            Preset::Mrdaa => "Mrdaa",
            Preset::Santiag => "santiag",
        }
    }

    /// The mode descriptor the preset stands for.
    pub fn mode(self) -> &'static str {
        match self {
            Preset::Maa2 => "sr SangNom",
            Preset::Daa => "drv znedi3",
            Preset::Mrdaa => "null",
            Preset::Santiag => "di2 znedi3",
        }
    }

    /// Parameter defaults of the preset; explicit settings go on top.
    pub fn parameters(self) -> AlgorithmParameters {
        let base = AlgorithmParameters::default();
        match self {
            Preset::Maa2 => AlgorithmParameters {
                mask_algorithm: MaskAlgorithm::Sobel,
                mask_threshold: 7.0,
                ..base
            },
            Preset::Daa => AlgorithmParameters {
                sharpen: SharpenMode::BeforeResize,
                mask: MaskPolicy::Replace,
                chroma: ChromaMode::Include,
                ..base
            },
            Preset::Mrdaa => AlgorithmParameters {
                upscaler: Upscaler::EdgeDirected {
                    algorithm: crate::algorithm::Interpolation::Znedi3,
                    guide: None,
                },
                sharpen: SharpenMode::AfterResize,
                sharpen_strength: Some(1.0),
                mask: MaskPolicy::Replace,
                chroma: ChromaMode::Include,
                ..base
            },
            Preset::Santiag => AlgorithmParameters {
                mask: MaskPolicy::Replace,
                chroma: ChromaMode::Include,
                ..base
            },
        }
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Preset {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        <Preset as ValueEnum>::from_str(s, false).map_err(|_| ConfigError::UnknownAlgorithm {
            name: s.to_string(),
            expected: "maa2, daa, Mrdaa, santiag".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mode::decode;

    #[test]
    fn test_chroma_mode_planes() {
        let yuv = FrameFormat::yuv420(8);
        assert_eq!(ChromaMode::Skip.planes(&yuv), vec![PlaneKind::Luma]);
        assert_eq!(ChromaMode::Include.planes(&yuv).len(), 3);
        assert_eq!(ChromaMode::Only.planes(&yuv), vec![PlaneKind::ChromaU, PlaneKind::ChromaV]);
        assert_eq!(ChromaMode::Only.planes(&FrameFormat::gray(8)), vec![PlaneKind::Luma]);
    }

    #[test]
    fn test_tuning_strength_per_plane() {
        let params = AlgorithmParameters { nns: 3, ..Default::default() };
        assert_eq!(params.tuning(PlaneKind::Luma).sangnom_strength, 48);
        assert_eq!(params.tuning(PlaneKind::ChromaV).sangnom_strength, 0);
        assert_eq!(params.tuning(PlaneKind::ChromaV).nns, 3);
    }

    #[test]
    fn test_effective_sharpen() {
        let params = AlgorithmParameters { sharpen: SharpenMode::BeforeResize, ..Default::default() };
        assert_eq!(params.effective_sharpen(false), SharpenMode::BeforeResize);
        assert_eq!(params.effective_sharpen(true), SharpenMode::Off);

        let params = AlgorithmParameters {
            sharpen: SharpenMode::AfterResize,
            sharpen_strength: Some(0.0),
            ..Default::default()
        };
        assert_eq!(params.effective_sharpen(false), SharpenMode::Off);
    }

    #[test]
    fn test_validate_ranges() {
        assert!(AlgorithmParameters::default().validate().is_ok());
        let bad = AlgorithmParameters { mask_threshold: 0.0, ..Default::default() };
        assert!(matches!(bad.validate(), Err(ConfigError::InvalidParameter { name: "mask_threshold", .. })));
        let bad = AlgorithmParameters { nns: 5, ..Default::default() };
        assert!(bad.validate().is_err());
        let bad = AlgorithmParameters { sharpen_strength: Some(-1.0), ..Default::default() };
        assert!(bad.validate().is_err());
        let bad = AlgorithmParameters { supersample: Some(ScaleRequest { x: 3, y: 1 }), ..Default::default() };
        assert!(matches!(bad.validate(), Err(ConfigError::InvalidScale { factor: 3, .. })));
    }

    #[test]
    fn test_presets_decode() {
        for preset in [Preset::Maa2, Preset::Daa, Preset::Mrdaa, Preset::Santiag] {
            assert!(decode(preset.mode()).is_ok(), "{}", preset);
            assert!(preset.parameters().validate().is_ok());
            assert_eq!(preset.parameters().supersample, None, "{}", preset);
        }
        assert_eq!("MrdaaLame".parse::<Preset>().unwrap(), Preset::Mrdaa);
        assert!("maa".parse::<Preset>().is_err());
    }
}
