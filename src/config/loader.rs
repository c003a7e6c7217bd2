//! Configuration loading and discovery for `xaa.toml`
//!
//! Provides functions to find, load, and merge configuration.

use super::schema::{PipelineSection, XaaConfig};
use crate::compositor::MaskPolicy;
use crate::pipeline::ChromaMode;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Name of the configuration file looked up by [`find_config`]
pub const CONFIG_FILE: &str = "xaa.toml";

/// Configuration loading error
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LoadError {
    /// File I/O error
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error
    #[error("Failed to parse xaa.toml: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error
    #[error("Config validation failed:\n{}", .0.iter().map(|e| format!("  - {}", e)).collect::<Vec<_>>().join("\n"))]
    Validation(Vec<String>),
}

/// CLI arguments that can override config values
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    /// Mode descriptor or preset name
    pub mode: Option<String>,
    /// Output scale
    pub scale: Option<String>,
    /// Supersampling scale
    pub supersample: Option<String>,
    pub upscaler: Option<String>,
    pub downscaler: Option<String>,
    pub mask: Option<MaskPolicy>,
    pub chroma: Option<ChromaMode>,
    /// Reuse identical edge masks
    pub reuse_masks: Option<bool>,
}

/// Find xaa.toml by walking up from the current working directory.
///
/// Search order:
/// 1. Walk up from current directory looking for xaa.toml
/// 2. Check XDG_CONFIG_HOME/xaa/xaa.toml (or ~/.config/xaa/xaa.toml)
pub fn find_config() -> Option<PathBuf> {
    if let Ok(cwd) = env::current_dir() {
        if let Some(path) = find_config_from(cwd) {
            return Some(path);
        }
    }

    find_xdg_config()
}

/// Find xaa.toml in the XDG config directory.
pub fn find_xdg_config() -> Option<PathBuf> {
    let xdg_config = env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|_| env::var("HOME").map(|h| PathBuf::from(h).join(".config")))
        .ok()?;

    let config_path = xdg_config.join("xaa").join(CONFIG_FILE);
    if config_path.exists() {
        Some(config_path)
    } else {
        None
    }
}

/// Find xaa.toml by walking up from a specific directory.
pub fn find_config_from(start: PathBuf) -> Option<PathBuf> {
    let mut current = start;

    loop {
        let config_path = current.join(CONFIG_FILE);
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            return None;
        }
    }
}

/// Load configuration from an xaa.toml file.
///
/// If a path is provided, loads from that file. Otherwise, uses [`find_config`]
/// to locate the config file. If no config file is found, returns the
/// default configuration.
///
/// # Example
/// ```ignore
/// let config = load_config(Some(Path::new("show/xaa.toml")))?;
/// let resolved = config.pipeline.resolve();
/// ```
pub fn load_config(path: Option<&Path>) -> Result<XaaConfig, LoadError> {
    let config_path = match path {
        Some(p) => Some(p.to_path_buf()),
        None => find_config(),
    };

    match config_path {
        Some(p) => load_config_file(&p),
        None => Ok(default_config()),
    }
}

fn load_config_file(path: &Path) -> Result<XaaConfig, LoadError> {
    debug!(path = %path.display(), "loading config");
    let contents = fs::read_to_string(path)?;
    let config: XaaConfig = toml::from_str(&contents)?;

    let errors = config.validate();
    if !errors.is_empty() {
        return Err(LoadError::Validation(errors));
    }

    Ok(config)
}

/// Configuration used when no xaa.toml is found.
pub fn default_config() -> XaaConfig {
    XaaConfig { pipeline: PipelineSection::default() }
}

/// Merge CLI overrides into a configuration.
///
/// CLI arguments take precedence over config file values. A new mode drops
/// nothing else: explicit file settings still apply on top of a preset.
pub fn merge_cli_overrides(config: &mut XaaConfig, overrides: &CliOverrides) {
    let pipeline = &mut config.pipeline;

    if let Some(ref mode) = overrides.mode {
        pipeline.mode = mode.clone();
    }
    if let Some(ref scale) = overrides.scale {
        pipeline.scale = scale.clone();
    }
    if let Some(ref supersample) = overrides.supersample {
        pipeline.supersample = Some(supersample.clone());
    }
    if let Some(ref upscaler) = overrides.upscaler {
        pipeline.upscaler = Some(upscaler.clone());
    }
    if let Some(ref downscaler) = overrides.downscaler {
        pipeline.downscaler = Some(downscaler.clone());
    }
    if let Some(mask) = overrides.mask {
        pipeline.mask = Some(mask);
    }
    if let Some(chroma) = overrides.chroma {
        pipeline.chroma = Some(chroma);
    }
    if let Some(reuse_masks) = overrides.reuse_masks {
        pipeline.reuse_masks = reuse_masks;
    }
}
