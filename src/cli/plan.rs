//! Plan command: build a pipeline and print its graph

use std::path::Path;
use std::process::ExitCode;

use crate::config::{load_config, merge_cli_overrides, CliOverrides};
use crate::format::FrameFormat;
use crate::graph::PlaneTransformGraph;
use crate::pipeline::build_pipeline;

use super::{EXIT_ERROR, EXIT_INVALID_ARGS, EXIT_SUCCESS};

/// Execute the plan command
pub fn run_plan(
    format: &str,
    size: (u32, u32),
    overrides: CliOverrides,
    config_path: Option<&Path>,
    json: bool,
) -> ExitCode {
    let format: FrameFormat = match format.parse() {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(EXIT_INVALID_ARGS);
        }
    };

    let mut config = match load_config(config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(EXIT_ERROR);
        }
    };
    merge_cli_overrides(&mut config, &overrides);

    let resolved = match config.pipeline.resolve() {
        Ok(r) => r,
        Err(errors) => {
            for e in errors {
                eprintln!("Error: {}", e);
            }
            return ExitCode::from(EXIT_INVALID_ARGS);
        }
    };
    if let Some(preset) = resolved.preset {
        tracing::debug!(preset = %preset, mode = %resolved.mode, "expanded preset");
    }

    let graph = match build_pipeline(format, size, &resolved.mode, resolved.scale, &resolved.params) {
        Ok(g) => g,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(EXIT_INVALID_ARGS);
        }
    };

    if json {
        match graph.to_json() {
            Ok(s) => println!("{}", s),
            Err(e) => {
                eprintln!("Error: failed to serialize graph: {}", e);
                return ExitCode::from(EXIT_ERROR);
            }
        }
    } else {
        print!("{}", graph);
        print_backends(&graph);
    }

    ExitCode::from(EXIT_SUCCESS)
}

fn print_backends(graph: &PlaneTransformGraph) {
    let kinds = graph.required_backends();
    if kinds.is_empty() {
        return;
    }
    println!("requires:");
    for kind in kinds {
        println!("  {}", kind);
    }
}
