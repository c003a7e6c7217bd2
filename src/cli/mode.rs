//! Mode command: decode a descriptor or preset name

use std::process::ExitCode;

use serde::Serialize;

use crate::mode::{decode, ModeDirective};
use crate::pipeline::Preset;

use super::{EXIT_ERROR, EXIT_INVALID_ARGS, EXIT_SUCCESS};

#[derive(Serialize)]
struct ModeReport<'a> {
    descriptor: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    preset: Option<Preset>,
    canonical: String,
    directive: ModeDirective,
}

/// Execute the mode command
pub fn run_mode(descriptor: &str, json: bool) -> ExitCode {
    let preset = descriptor.parse::<Preset>().ok();
    let expanded = preset.map(Preset::mode).unwrap_or(descriptor);

    let directive = match decode(expanded) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(EXIT_INVALID_ARGS);
        }
    };

    let report = ModeReport { descriptor, preset, canonical: directive.to_string(), directive };

    if json {
        match serde_json::to_string_pretty(&report) {
            Ok(s) => println!("{}", s),
            Err(e) => {
                eprintln!("Error: {}", e);
                return ExitCode::from(EXIT_ERROR);
            }
        }
        return ExitCode::from(EXIT_SUCCESS);
    }

    if let Some(preset) = preset {
        println!("preset:    {} ({})", preset, expanded);
    }
    println!("canonical: {}", report.canonical);
    println!("strategy:  {:?}", directive.strategy);
    println!("direction: {:?}", directive.direction);
    println!("passes:    {}", directive.passes);
    match directive.algorithm {
        Some(algorithm) => println!("algorithm: {}", algorithm),
        None => println!("algorithm: none"),
    }
    if let Some(guide) = directive.guide {
        println!("guide:     {}", guide);
    }
    ExitCode::from(EXIT_SUCCESS)
}
