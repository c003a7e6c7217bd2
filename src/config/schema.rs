//! Configuration schema types for `xaa.toml`
//!
//! Algorithm names are kept as strings here and resolved into the closed
//! enums once, by [`PipelineSection::resolve`]. Unset fields fall back to the
//! preset named by `mode` (if any) and then to the library defaults.

use serde::{Deserialize, Serialize};

use crate::algorithm::{Kernel, MaskAlgorithm, Upscaler};
use crate::compositor::MaskPolicy;
use crate::format::{ChromaSiting, ScaleRequest};
use crate::mode::decode;
use crate::pipeline::{AlgorithmParameters, ChromaMode, Preset, SharpenMode};

/// eedi3 tuning overrides.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Eedi3Config {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alpha: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub beta: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gamma: Option<f64>,
}

/// The `[pipeline]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineSection {
    /// Mode descriptor or preset name
    #[serde(default = "default_mode")]
    pub mode: String,
    /// Output scale, `"2"` or `"2x1"`
    #[serde(default = "default_scale")]
    pub scale: String,
    /// Supersampling scale; defaults to `scale`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supersample: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upscaler: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub downscaler: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mask: Option<MaskPolicy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mask_algorithm: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mask_threshold: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eedi3_mask_threshold: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chroma: Option<ChromaMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub siting: Option<ChromaSiting>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sharpen: Option<SharpenMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sharpen_strength: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nns: Option<u8>,
    #[serde(default)]
    pub eedi3: Eedi3Config,
    /// Reuse identical edge masks
    #[serde(default)]
    pub reuse_masks: bool,
}

fn default_mode() -> String {
    "sr SangNom".to_string()
}

fn default_scale() -> String {
    "1".to_string()
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            scale: default_scale(),
            supersample: None,
            upscaler: None,
            downscaler: None,
            mask: None,
            mask_algorithm: None,
            mask_threshold: None,
            eedi3_mask_threshold: None,
            chroma: None,
            siting: None,
            sharpen: None,
            sharpen_strength: None,
            nns: None,
            eedi3: Eedi3Config::default(),
            reuse_masks: false,
        }
    }
}

/// A fully resolved pipeline request.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedPipeline {
    /// Mode descriptor with any preset expanded
    pub mode: String,
    pub preset: Option<Preset>,
    pub scale: ScaleRequest,
    pub params: AlgorithmParameters,
}

impl PipelineSection {
    /// Preset named by `mode`, if it names one.
    pub fn preset(&self) -> Option<Preset> {
        self.mode.parse().ok()
    }

    /// Resolve names and defaults, collecting every problem.
    pub fn resolve(&self) -> Result<ResolvedPipeline, Vec<String>> {
        let mut errors = Vec::new();
        let preset = self.preset();
        let base = preset.map(Preset::parameters).unwrap_or_default();
        let mode = preset.map(|p| p.mode().to_string()).unwrap_or_else(|| self.mode.clone());

        if let Err(e) = decode(&mode) {
            errors.push(format!("pipeline.mode: {}", e));
        }

        let mut field = |name: &str, result: Result<(), crate::error::ConfigError>| {
            if let Err(e) = result {
                errors.push(format!("pipeline.{}: {}", name, e));
            }
        };

        let mut scale = ScaleRequest::identity();
        field("scale", self.scale.parse::<ScaleRequest>().map(|s| scale = s));

        let mut params = AlgorithmParameters { reuse_masks: self.reuse_masks, ..base };
        if let Some(supersample) = &self.supersample {
            field("supersample", supersample.parse::<ScaleRequest>().map(|s| params.supersample = Some(s)));
        }
        if let Some(upscaler) = &self.upscaler {
            field("upscaler", upscaler.parse::<Upscaler>().map(|u| params.upscaler = u));
        }
        if let Some(downscaler) = &self.downscaler {
            field("downscaler", downscaler.parse::<Kernel>().map(|k| params.downscaler = k));
        }
        if let Some(algorithm) = &self.mask_algorithm {
            field("mask_algorithm", algorithm.parse::<MaskAlgorithm>().map(|a| params.mask_algorithm = a));
        }

        params.mask = self.mask.unwrap_or(params.mask);
        params.mask_threshold = self.mask_threshold.unwrap_or(params.mask_threshold);
        params.eedi3_mask_threshold = self.eedi3_mask_threshold.unwrap_or(params.eedi3_mask_threshold);
        params.chroma = self.chroma.unwrap_or(params.chroma);
        params.siting = self.siting.unwrap_or(params.siting);
        params.sharpen = self.sharpen.unwrap_or(params.sharpen);
        params.sharpen_strength = self.sharpen_strength.or(params.sharpen_strength);
        params.nns = self.nns.unwrap_or(params.nns);
        params.eedi3.alpha = self.eedi3.alpha.unwrap_or(params.eedi3.alpha);
        params.eedi3.beta = self.eedi3.beta.unwrap_or(params.eedi3.beta);
        params.eedi3.gamma = self.eedi3.gamma.unwrap_or(params.eedi3.gamma);

        if let Err(e) = params.validate() {
            errors.push(format!("pipeline: {}", e));
        }

        if errors.is_empty() {
            Ok(ResolvedPipeline { mode, preset, scale, params })
        } else {
            Err(errors)
        }
    }
}

/// Complete `xaa.toml` configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct XaaConfig {
    #[serde(default)]
    pub pipeline: PipelineSection,
}

impl XaaConfig {
    /// Validate the configuration and return all errors.
    pub fn validate(&self) -> Vec<String> {
        match self.pipeline.resolve() {
            Ok(_) => Vec::new(),
            Err(errors) => errors,
        }
    }

    /// Check if the configuration is valid.
    pub fn is_valid(&self) -> bool {
        self.validate().is_empty()
    }
}
