//! Command-line interface implementation
//!
//! This module provides the CLI entry point and dispatches to submodules
//! for specific command implementations.

mod mode;
mod plan;
mod shifts;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use crate::algorithm::Kernel;
use crate::compositor::MaskPolicy;
use crate::format::ChromaSiting;
use crate::pipeline::ChromaMode;

/// Exit codes
pub(crate) const EXIT_SUCCESS: u8 = 0;
pub(crate) const EXIT_ERROR: u8 = 1;
pub(crate) const EXIT_INVALID_ARGS: u8 = 2;

/// Parse a `WIDTHxHEIGHT` size.
pub fn parse_size(s: &str) -> Result<(u32, u32), String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("invalid size '{}': expected WIDTHxHEIGHT", s))?;
    let parse = |v: &str| {
        v.trim()
            .parse::<u32>()
            .map_err(|_| format!("invalid size '{}': '{}' is not a number", s, v))
    };
    Ok((parse(w)?, parse(h)?))
}

/// xaa - supersampling antialiasing pipeline builder
#[derive(Parser)]
#[command(name = "xaa")]
#[command(about = "xaa - plan supersampling antialiasing pipelines with exact sub-pixel alignment")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build a pipeline and print its transform graph
    Plan {
        /// Input format: gray8, yuv420p8, yuv422p10, yuv444p16, ...
        #[arg(short, long)]
        format: String,

        /// Input size as WIDTHxHEIGHT
        #[arg(short, long, value_parser = parse_size)]
        size: (u32, u32),

        /// Mode descriptor ("sr SangNom", "drv2 eedi3 znedi3") or preset name
        #[arg(short, long)]
        mode: Option<String>,

        /// Output scale: 1, 2, 4, 8 or per axis like 2x1
        #[arg(long)]
        scale: Option<String>,

        /// Supersampling scale (defaults to --scale)
        #[arg(long)]
        supersample: Option<String>,

        /// Upscaler: a kernel name or znedi3, nnedi3cl, eedi2, eedi3 [guide]
        #[arg(long)]
        upscaler: Option<String>,

        /// Kernel used for every reduction
        #[arg(long)]
        downscaler: Option<Kernel>,

        /// How antialiased and reference planes are merged
        #[arg(long, value_enum)]
        mask: Option<MaskPolicy>,

        /// Which planes are antialiased
        #[arg(long, value_enum)]
        chroma: Option<ChromaMode>,

        /// Reuse identical edge masks
        #[arg(long)]
        reuse_masks: bool,

        /// Path to xaa.toml (default: discovered from the working directory)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output the graph as JSON
        #[arg(long)]
        json: bool,
    },

    /// Decode a mode descriptor or preset name
    Mode {
        /// Mode descriptor or preset name
        descriptor: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the doubling shift corrections for a format
    Shifts {
        /// Input format
        #[arg(short, long)]
        format: String,

        /// Doubling factor per axis: 1, 2, 4 or 8
        #[arg(long, default_value = "2")]
        factor: String,

        /// Chroma siting
        #[arg(long, value_enum, default_value = "left")]
        siting: ChromaSiting,

        /// Kernel of the corrective resample
        #[arg(long, default_value = "Spline36")]
        kernel: Kernel,

        /// Luma width before doubling
        #[arg(long, default_value_t = 1920)]
        width: u32,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Parse arguments and run the selected command.
pub fn run() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        Commands::Plan {
            format,
            size,
            mode,
            scale,
            supersample,
            upscaler,
            downscaler,
            mask,
            chroma,
            reuse_masks,
            config,
            json,
        } => plan::run_plan(
            &format,
            size,
            crate::config::CliOverrides {
                mode,
                scale,
                supersample,
                upscaler,
                downscaler: downscaler.map(|k| k.to_string()),
                mask,
                chroma,
                reuse_masks: reuse_masks.then_some(true),
            },
            config.as_deref(),
            json,
        ),
        Commands::Mode { descriptor, json } => mode::run_mode(&descriptor, json),
        Commands::Shifts { format, factor, siting, kernel, width, json } => {
            shifts::run_shifts(&format, &factor, siting, kernel, width, json)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("1280x720"), Ok((1280, 720)));
        assert_eq!(parse_size("64X32"), Ok((64, 32)));
        assert!(parse_size("1280").is_err());
        assert!(parse_size("axb").is_err());
    }

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_plan_arguments_parse() {
        let cli = Cli::try_parse_from([
            "xaa", "plan", "--format", "yuv420p8", "--size", "64x64", "--mode", "sr znedi3", "--mask",
            "overlay", "--chroma", "include", "--downscaler", "Bicubic",
        ])
        .unwrap();
        match cli.command {
            Commands::Plan { size, mode, mask, chroma, downscaler, .. } => {
                assert_eq!(size, (64, 64));
                assert_eq!(mode.as_deref(), Some("sr znedi3"));
                assert_eq!(mask, Some(MaskPolicy::Overlay));
                assert_eq!(chroma, Some(ChromaMode::Include));
                assert_eq!(downscaler, Some(Kernel::Bicubic));
            }
            _ => panic!("expected plan"),
        }
    }

    #[test]
    fn test_shifts_defaults() {
        let cli = Cli::try_parse_from(["xaa", "shifts", "--format", "yuv420p8"]).unwrap();
        match cli.command {
            Commands::Shifts { factor, siting, kernel, width, .. } => {
                assert_eq!(factor, "2");
                assert_eq!(siting, ChromaSiting::LeftAligned);
                assert_eq!(kernel, Kernel::Spline36);
                assert_eq!(width, 1920);
            }
            _ => panic!("expected shifts"),
        }
    }
}
