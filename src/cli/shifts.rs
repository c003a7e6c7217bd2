//! Shifts command: print doubling corrections for a format

use std::process::ExitCode;

use serde::Serialize;

use crate::algorithm::Kernel;
use crate::format::{ChromaSiting, FrameFormat, ScaleRequest};
use crate::shift::{doubling_corrections, PlaneCorrections};

use super::{EXIT_ERROR, EXIT_INVALID_ARGS, EXIT_SUCCESS};

#[derive(Serialize)]
struct ShiftReport {
    format: String,
    factors: ScaleRequest,
    siting: ChromaSiting,
    kernel: Kernel,
    input_width: u32,
    output_width: u32,
    align_chroma: bool,
    corrections: PlaneCorrections,
}

/// Execute the shifts command
pub fn run_shifts(
    format: &str,
    factor: &str,
    siting: ChromaSiting,
    kernel: Kernel,
    width: u32,
    json: bool,
) -> ExitCode {
    let format: FrameFormat = match format.parse() {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(EXIT_INVALID_ARGS);
        }
    };
    let factors: ScaleRequest = match factor.parse() {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(EXIT_INVALID_ARGS);
        }
    };

    let align_chroma = format.subsampling_w > 0;
    let output_width = width * factors.x;
    let corrections = match doubling_corrections(&format, factors, align_chroma, siting, kernel, width, output_width) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(EXIT_INVALID_ARGS);
        }
    };

    let report = ShiftReport {
        format: format.to_string(),
        factors,
        siting,
        kernel,
        input_width: width,
        output_width,
        align_chroma,
        corrections,
    };

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

    println!(
        "{} doubled {} ({} siting, {} resample, {} -> {} luma columns)",
        report.format, factors, siting, kernel, width, output_width
    );
    println!("{:<8} {:>12} {:>12}", "plane", "horizontal", "vertical");
    println!("{:<8} {:>12} {:>12}", "luma", corrections.luma.horizontal, corrections.luma.vertical);
    if !format.is_gray() {
        println!("{:<8} {:>12} {:>12}", "chroma", corrections.chroma.horizontal, corrections.chroma.vertical);
    }
    ExitCode::from(EXIT_SUCCESS)
}
