//! Pipeline construction
//!
//! [`build_pipeline`] turns an input description, a mode descriptor, a scale
//! request and [`AlgorithmParameters`] into a [`PlaneTransformGraph`]:
//!
//! | Stage | Planes | What happens |
//! |-------|--------|--------------|
//! | supersample | antialiased | input to supersampled size, edge-directed or by kernel |
//! | antialias | antialiased | pad, run the strategy per direction, crop |
//! | sharpen | antialiased | optional, before or after the output resize |
//! | output-resize | antialiased | supersampled result to output size on the ideal grid |
//! | reference | all | input to output size without antialiasing |
//! | mask / composite | all | edge mask on reference luma, merge per policy |
//!
//! Every resample that lands on the output size solves its offsets against
//! the ideal output grid, so any doubling bias still carried by its input
//! (a deferred deinterlace fold, an uncorrected doubling) is folded into
//! that single resample.

pub mod params;

pub use params::{AlgorithmParameters, ChromaMode, Eedi3Params, Preset, SharpenMode};

use std::collections::BTreeMap;

use crate::algorithm::{Interpolation, Kernel, Upscaler};
use crate::antialias::{antialias_plane, PlaneSettings};
use crate::compositor::{Compositor, MaskCache, PlaneInputs};
use crate::doubler::{doubling_factor, Doubler};
use crate::error::ConfigError;
use crate::format::{FrameFormat, PlaneKind, ScaleRequest};
use crate::graph::{GraphBuilder, NodeId, PlaneTransformGraph, Stage};
use crate::mode::{decode, ModeDirective};
use crate::pad::PadPlan;
use crate::shift::doubling_corrections;
use crate::shift::grid::PlaneGrid;

/// Largest width or height any scaled plane may have.
///
/// Leaves headroom for antialias padding and the deinterlacer's doubled
/// height without overflowing `u32` sample arithmetic.
pub const MAX_DIMENSION: u32 = 1 << 24;

fn scaled_size(what: &'static str, input: (u32, u32), scale: ScaleRequest) -> Result<(u32, u32), ConfigError> {
    let width = input.0.checked_mul(scale.x).filter(|&w| w <= MAX_DIMENSION);
    let height = input.1.checked_mul(scale.y).filter(|&h| h <= MAX_DIMENSION);
    match (width, height) {
        (Some(width), Some(height)) => Ok((width, height)),
        _ => Err(ConfigError::InvalidDimensions {
            plane: what,
            width: input.0,
            height: input.1,
            reason: format!("{} size exceeds {} samples per axis at {}", what, MAX_DIMENSION, scale),
        }),
    }
}

/// Build the transform graph for one input description.
///
/// Fails with a [`ConfigError`] before anything is built when the format,
/// dimensions, descriptor, scale or parameters are invalid.
pub fn build_pipeline(
    format: FrameFormat,
    input_size: (u32, u32),
    mode: &str,
    scale: ScaleRequest,
    params: &AlgorithmParameters,
) -> Result<PlaneTransformGraph, ConfigError> {
    let directive = decode(mode)?;
    build_pipeline_with(format, input_size, &directive, scale, params)
}

/// [`build_pipeline`] for an already decoded directive.
pub fn build_pipeline_with(
    format: FrameFormat,
    input_size: (u32, u32),
    directive: &ModeDirective,
    scale: ScaleRequest,
    params: &AlgorithmParameters,
) -> Result<PlaneTransformGraph, ConfigError> {
    format.validate()?;
    format.check_dimensions("input", input_size.0, input_size.1)?;
    scale.validate()?;
    params.validate()?;

    let supersample = params.supersample.unwrap_or(scale);
    let output_size = scaled_size("output", input_size, scale)?;
    let ss_size = scaled_size("supersampled", input_size, supersample)?;

    let processed = params.chroma.planes(&format);
    let chroma_processed = processed.iter().any(|p| p.is_chroma());
    let sharpen = params.effective_sharpen(directive.is_null());
    let defer = !directive.is_null() && ss_size != output_size && sharpen != SharpenMode::BeforeResize;

    tracing::debug!(
        format = %format,
        mode = %directive,
        input = ?input_size,
        supersample = ?ss_size,
        output = ?output_size,
        planes = ?processed,
        sharpen = ?sharpen,
        defer,
        "building pipeline"
    );

    let mut planner = Planner {
        builder: GraphBuilder::new(format),
        cache: MaskCache::new(params.reuse_masks),
        params,
        format,
        input_size,
    };

    let sources: BTreeMap<PlaneKind, NodeId> = format
        .planes()
        .iter()
        .map(|&plane| {
            let (w, h) = format.plane_dims(plane, input_size.0, input_size.1);
            (plane, planner.builder.source(plane, w, h))
        })
        .collect();

    let pad_plan = PadPlan::for_antialias(directive, &format, chroma_processed, ss_size.0, ss_size.1);
    if !pad_plan.is_none() {
        tracing::debug!(modulus = pad_plan.modulus, luma = ?pad_plan.luma, "padding antialiased planes");
    }

    let mut antialiased = BTreeMap::new();
    for &plane in &processed {
        let source = sources[&plane];
        let supersampled = planner.supersample(source, ss_size, directive.is_null(), chroma_processed)?;

        planner.builder.set_stage(Stage::Antialias);
        let mask = planner.eedi3_mask(supersampled, directive.algorithm);
        let settings = PlaneSettings {
            padding: pad_plan.plane(&format, plane),
            tuning: params.tuning(plane),
            downscaler: params.downscaler,
            defer,
        };
        let mut node = antialias_plane(&mut planner.builder, supersampled, mask, directive, &settings)?;

        if sharpen == SharpenMode::BeforeResize {
            planner.builder.set_stage(Stage::Sharpen);
            node = planner.builder.contra_sharpen(node, supersampled, params.sharpen_strength)?;
        }

        let resized = planner.to_output(node, output_size, chroma_processed, Stage::OutputResize)?;
        antialiased.insert(plane, resized);
    }

    let mut composite_inputs = Vec::with_capacity(sources.len());
    for (&plane, &source) in &sources {
        let reference = planner.to_output(source, output_size, !format.is_gray(), Stage::Reference)?;

        let antialiased = match antialiased.get(&plane) {
            Some(&node) if sharpen == SharpenMode::AfterResize => {
                planner.builder.set_stage(Stage::Sharpen);
                Some(planner.builder.contra_sharpen(node, reference, params.sharpen_strength)?)
            }
            other => other.copied(),
        };
        composite_inputs.push(PlaneInputs { plane, antialiased, reference });
    }

    let compositor = Compositor {
        policy: params.mask,
        algorithm: params.mask_algorithm,
        threshold: params.mask_threshold,
        siting: params.siting,
    };
    let outputs = compositor.compose(&mut planner.builder, &mut planner.cache, &composite_inputs)?;

    let graph = planner.builder.finish(input_size, output_size, outputs);
    tracing::debug!(nodes = graph.len(), reused_masks = planner.cache.hits(), "pipeline built");
    Ok(graph)
}

/// Builder state shared by the stages.
struct Planner<'a> {
    builder: GraphBuilder,
    cache: MaskCache,
    params: &'a AlgorithmParameters,
    format: FrameFormat,
    input_size: (u32, u32),
}

impl Planner<'_> {
    /// Plane dimensions for a frame of `size`.
    fn plane_size(&self, node: NodeId, size: (u32, u32)) -> (u32, u32) {
        self.format.plane_dims(self.builder.node(node).plane, size.0, size.1)
    }

    /// Where a plane's samples belong in a frame of `size`.
    fn ideal_grid(&self, node: NodeId, size: (u32, u32)) -> PlaneGrid {
        let plane = self.builder.node(node).plane;
        let from = self.format.plane_dims(plane, self.input_size.0, self.input_size.1);
        let to = self.format.plane_dims(plane, size.0, size.1);
        PlaneGrid::ideal(&self.format, plane, self.params.siting, from, to)
    }

    fn doubler(&self, plane: PlaneKind, align_chroma: bool) -> Option<Doubler> {
        let align = align_chroma && self.format.subsampling_w > 0;
        Doubler::from_upscaler(self.params.upscaler, align, self.params.tuning(plane))
    }

    /// Kernel for a resample from `from` to `to`.
    fn kernel(&self, from: (u32, u32), to: (u32, u32)) -> Kernel {
        match self.params.upscaler {
            Upscaler::Kernel(kernel) if to.0 > from.0 || to.1 > from.1 => kernel,
            _ => self.params.downscaler,
        }
    }

    /// Kernel for the resample that follows an edge-directed doubling.
    fn correction_kernel(&self, doubled: (u32, u32), to: (u32, u32)) -> Kernel {
        if to.0 >= doubled.0 && to.1 >= doubled.1 {
            Kernel::Spline36
        } else {
            self.params.downscaler
        }
    }

    /// Guide mask for eedi3 doublings and passes, when enabled.
    fn eedi3_mask(&mut self, input: NodeId, algorithm: Option<Interpolation>) -> Option<NodeId> {
        if algorithm != Some(Interpolation::Eedi3) || self.params.eedi3_mask_threshold <= 0.0 {
            return None;
        }
        let stage = self.builder.stage();
        self.builder.set_stage(Stage::Mask);
        let mask = self.cache.edge_mask(
            &mut self.builder,
            input,
            self.params.mask_algorithm,
            self.params.eedi3_mask_threshold,
        );
        self.builder.set_stage(stage);
        Some(mask)
    }

    fn upscaler_algorithm(&self) -> Option<Interpolation> {
        match self.params.upscaler {
            Upscaler::EdgeDirected { algorithm, .. } => Some(algorithm),
            Upscaler::Kernel(_) => None,
        }
    }

    /// Input plane to supersampled size.
    ///
    /// Edge-directed doublings are corrected right away, except in null mode
    /// where the output resize folds them.
    fn supersample(
        &mut self,
        source: NodeId,
        ss_size: (u32, u32),
        null_mode: bool,
        align_chroma: bool,
    ) -> Result<NodeId, ConfigError> {
        self.builder.set_stage(Stage::Supersample);
        let plane = self.builder.node(source).plane;
        let from = self.builder.dims(source);
        let to = self.plane_size(source, ss_size);
        if from == to {
            return Ok(source);
        }

        let enlarging = to.0 > from.0 || to.1 > from.1;
        match self.doubler(plane, align_chroma) {
            Some(doubler) if enlarging => {
                let factors = ScaleRequest::new(doubling_factor(from.0, to.0), doubling_factor(from.1, to.1))?;
                let mask = self.eedi3_mask(source, self.upscaler_algorithm());
                if null_mode {
                    tracing::debug!(plane = %plane, factors = %factors, "deferring supersample correction");
                    return doubler.enlarge(&mut self.builder, source, mask, factors);
                }

                let doubled = (from.0 * factors.x, from.1 * factors.y);
                let kernel = self.correction_kernel(doubled, to);
                let (in_width, _) = self.input_size;
                let (out_width, _) = ss_size;
                let corrections = doubling_corrections(
                    &self.format,
                    factors,
                    doubler.align_chroma,
                    self.params.siting,
                    kernel,
                    in_width,
                    out_width,
                )?;
                let correction = corrections.for_plane(plane);
                tracing::debug!(
                    plane = %plane,
                    factors = %factors,
                    src_left = correction.horizontal,
                    src_top = correction.vertical,
                    "corrected supersample"
                );
                doubler.enlarge_corrected(&mut self.builder, source, mask, factors, correction, kernel, to.0, to.1)
            }
            _ => {
                let target = self.ideal_grid(source, ss_size);
                let kernel = self.kernel(from, to);
                Ok(self.builder.resample_onto(source, to.0, to.1, target, kernel))
            }
        }
    }

    /// Any plane to output size on the ideal output grid.
    fn to_output(
        &mut self,
        node: NodeId,
        output_size: (u32, u32),
        align_chroma: bool,
        stage: Stage,
    ) -> Result<NodeId, ConfigError> {
        self.builder.set_stage(stage);
        let plane = self.builder.node(node).plane;
        let from = self.builder.dims(node);
        let to = self.plane_size(node, output_size);
        let target = self.ideal_grid(node, output_size);

        let needs_enlarging = from.0 < to.0 || from.1 < to.1;
        if let Some(doubler) = self.doubler(plane, align_chroma).filter(|_| needs_enlarging) {
            let factors = ScaleRequest::new(doubling_factor(from.0, to.0), doubling_factor(from.1, to.1))?;
            let mask = self.eedi3_mask(node, self.upscaler_algorithm());
            let doubled = doubler.enlarge(&mut self.builder, node, mask, factors)?;
            let kernel = self.correction_kernel(self.builder.dims(doubled), to);
            return Ok(self.builder.resample_onto(doubled, to.0, to.1, target, kernel));
        }

        let kernel = self.kernel(from, to);
        Ok(self.builder.resample_onto(node, to.0, to.1, target, kernel))
    }
}
