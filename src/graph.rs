//! Plane transform graphs
//!
//! A [`PlaneTransformGraph`] is the product of pipeline construction: a DAG
//! of per-plane operations whose nodes each record their dimensions and the
//! exact sample grid they carry. Nodes are stored in creation order, which is
//! also a topological order since an operation can only name nodes that
//! already exist.
//!
//! [`GraphBuilder`] computes dimensions and grids for every operation it
//! appends and rejects operations whose inputs do not fit together.

use serde::Serialize;
use std::fmt;

use crate::algorithm::{Interpolation, Kernel, MaskAlgorithm, Tuning};
use crate::error::ConfigError;
use crate::format::{FrameFormat, PlaneKind};
use crate::pad::Padding;
use crate::plane::Parity;
use crate::shift::grid::PlaneGrid;

/// Index of a node within its graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Parameters of a generic resample.
///
/// Offsets are in input samples along the node's own columns and rows.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ResampleParams {
    pub width: u32,
    pub height: u32,
    pub src_left: f64,
    pub src_top: f64,
    pub kernel: Kernel,
}

/// Parameters of an interpolation backend call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EnlargeParams {
    pub algorithm: Interpolation,
    pub parity: Parity,
    /// Output has twice the input's height; otherwise the field opposite to
    /// `parity` is re-interpolated in place
    pub double_height: bool,
    pub tuning: Tuning,
}

/// Pipeline stage a node was created in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    Input,
    Supersample,
    Antialias,
    Sharpen,
    OutputResize,
    Reference,
    Mask,
    Composite,
}

impl Stage {
    pub fn name(self) -> &'static str {
        match self {
            Stage::Input => "input",
            Stage::Supersample => "supersample",
            Stage::Antialias => "antialias",
            Stage::Sharpen => "sharpen",
            Stage::OutputResize => "output-resize",
            Stage::Reference => "reference",
            Stage::Mask => "mask",
            Stage::Composite => "composite",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Op {
    /// One plane of the input frame
    Source,
    Transpose { input: NodeId },
    /// Edge-duplicating padding
    Pad { input: NodeId, padding: Padding },
    Crop { input: NodeId, crop: Padding },
    /// Every other row
    SelectField { input: NodeId, parity: Parity },
    /// Every row repeated once
    LineDouble { input: NodeId },
    /// Interpolation backend call, with optional guide plane and guide mask
    Enlarge {
        input: NodeId,
        params: EnlargeParams,
        guide: Option<NodeId>,
        mask: Option<NodeId>,
    },
    /// Generic resampler call
    Resample { input: NodeId, params: ResampleParams },
    /// Equal-weight blend
    Average { first: NodeId, second: NodeId },
    /// Edge-detection backend call
    DetectEdges { input: NodeId, algorithm: MaskAlgorithm, threshold: f64 },
    Binarize { input: NodeId, threshold: u16 },
    /// `base` where the mask is clear, `overlay` where it is set
    MaskedMerge { base: NodeId, overlay: NodeId, mask: NodeId },
    /// Sharpener backend call
    ContraSharpen { input: NodeId, reference: NodeId, strength: Option<f64> },
}

impl Op {
    /// Nodes this operation reads, in argument order.
    pub fn inputs(&self) -> Vec<NodeId> {
        match *self {
            Op::Source => Vec::new(),
            Op::Transpose { input }
            | Op::Pad { input, .. }
            | Op::Crop { input, .. }
            | Op::SelectField { input, .. }
            | Op::LineDouble { input }
            | Op::Resample { input, .. }
            | Op::DetectEdges { input, .. }
            | Op::Binarize { input, .. } => vec![input],
            Op::Enlarge { input, guide, mask, .. } => {
                std::iter::once(input).chain(guide).chain(mask).collect()
            }
            Op::Average { first, second } => vec![first, second],
            Op::MaskedMerge { base, overlay, mask } => vec![base, overlay, mask],
            Op::ContraSharpen { input, reference, .. } => vec![input, reference],
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Op::Source => "source",
            Op::Transpose { .. } => "transpose",
            Op::Pad { .. } => "pad",
            Op::Crop { .. } => "crop",
            Op::SelectField { .. } => "select-field",
            Op::LineDouble { .. } => "line-double",
            Op::Enlarge { .. } => "enlarge",
            Op::Resample { .. } => "resample",
            Op::Average { .. } => "average",
            Op::DetectEdges { .. } => "detect-edges",
            Op::Binarize { .. } => "binarize",
            Op::MaskedMerge { .. } => "masked-merge",
            Op::ContraSharpen { .. } => "contra-sharpen",
        }
    }

    /// External backend this operation needs, if any.
    pub fn backend(&self) -> Option<BackendKind> {
        match self {
            Op::Enlarge { params, .. } => Some(BackendKind::Interpolator(params.algorithm)),
            Op::Resample { .. } => Some(BackendKind::Resampler),
            Op::DetectEdges { algorithm, .. } => Some(BackendKind::EdgeDetector(*algorithm)),
            Op::ContraSharpen { .. } => Some(BackendKind::Sharpener),
            _ => None,
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Op::Source => write!(f, "source"),
            Op::Transpose { input } => write!(f, "transpose {}", input),
            Op::Pad { input, padding: p } => {
                write!(f, "pad {} l={} r={} t={} b={}", input, p.left, p.right, p.top, p.bottom)
            }
            Op::Crop { input, crop: c } => {
                write!(f, "crop {} l={} r={} t={} b={}", input, c.left, c.right, c.top, c.bottom)
            }
            Op::SelectField { input, parity } => write!(f, "select-field {} parity={}", input, parity),
            Op::LineDouble { input } => write!(f, "line-double {}", input),
            Op::Enlarge { input, params, guide, mask } => {
                write!(
                    f,
                    "enlarge {} {} parity={} dh={}",
                    input, params.algorithm, params.parity, params.double_height
                )?;
                if let Some(guide) = guide {
                    write!(f, " guide={}", guide)?;
                }
                if let Some(mask) = mask {
                    write!(f, " mask={}", mask)?;
                }
                Ok(())
            }
            Op::Resample { input, params: p } => write!(
                f,
                "resample {} {} {}x{} src_left={} src_top={}",
                input, p.kernel, p.width, p.height, p.src_left, p.src_top
            ),
            Op::Average { first, second } => write!(f, "average {} {}", first, second),
            Op::DetectEdges { input, algorithm, threshold } => {
                write!(f, "detect-edges {} {} threshold={}", input, algorithm, threshold)
            }
            Op::Binarize { input, threshold } => write!(f, "binarize {} threshold={}", input, threshold),
            Op::MaskedMerge { base, overlay, mask } => {
                write!(f, "masked-merge base={} overlay={} mask={}", base, overlay, mask)
            }
            Op::ContraSharpen { input, reference, strength } => {
                write!(f, "contra-sharpen {} reference={}", input, reference)?;
                if let Some(strength) = strength {
                    write!(f, " strength={}", strength)?;
                }
                Ok(())
            }
        }
    }
}

/// An external collaborator a graph depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum BackendKind {
    Interpolator(Interpolation),
    EdgeDetector(MaskAlgorithm),
    Resampler,
    Sharpener,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Interpolator(a) => write!(f, "interpolator {}", a),
            BackendKind::EdgeDetector(a) => write!(f, "edge detector {}", a),
            BackendKind::Resampler => write!(f, "resampler"),
            BackendKind::Sharpener => write!(f, "sharpener"),
        }
    }
}

/// One node of a graph.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Node {
    pub id: NodeId,
    /// Source plane this node descends from
    pub plane: PlaneKind,
    pub stage: Stage,
    #[serde(flatten)]
    pub op: Op,
    pub width: u32,
    pub height: u32,
    /// Sample positions in units of the source plane
    pub grid: PlaneGrid,
}

impl Node {
    pub fn dims(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// The final node for one plane of the output frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PlaneOutput {
    pub plane: PlaneKind,
    pub node: NodeId,
}

/// A complete transform plan for one frame layout.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlaneTransformGraph {
    format: FrameFormat,
    input_size: (u32, u32),
    output_size: (u32, u32),
    nodes: Vec<Node>,
    sources: Vec<PlaneOutput>,
    outputs: Vec<PlaneOutput>,
}

impl PlaneTransformGraph {
    pub fn format(&self) -> &FrameFormat {
        &self.format
    }

    pub fn input_size(&self) -> (u32, u32) {
        self.input_size
    }

    pub fn output_size(&self) -> (u32, u32) {
        self.output_size
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Source nodes, one per input plane.
    pub fn sources(&self) -> &[PlaneOutput] {
        &self.sources
    }

    /// Output nodes, one per plane of the input format.
    pub fn outputs(&self) -> &[PlaneOutput] {
        &self.outputs
    }

    pub fn output(&self, plane: PlaneKind) -> Option<&Node> {
        self.outputs.iter().find(|o| o.plane == plane).map(|o| self.node(o.node))
    }

    /// Nodes matching `predicate`, in creation order.
    pub fn filter<'a>(&'a self, predicate: impl Fn(&Node) -> bool + 'a) -> impl Iterator<Item = &'a Node> + 'a {
        self.nodes.iter().filter(move |n| predicate(*n))
    }

    /// Group nodes into dependency levels.
    ///
    /// Every node's inputs live in earlier levels, so the nodes of one level
    /// can be evaluated independently.
    pub fn levels(&self) -> Vec<Vec<NodeId>> {
        let mut depth = vec![0usize; self.nodes.len()];
        let mut levels: Vec<Vec<NodeId>> = Vec::new();
        for node in &self.nodes {
            let d = node.op.inputs().iter().map(|i| depth[i.0] + 1).max().unwrap_or(0);
            depth[node.id.0] = d;
            if levels.len() <= d {
                levels.resize_with(d + 1, Vec::new);
            }
            levels[d].push(node.id);
        }
        levels
    }

    /// Every backend the graph calls, in order of first use.
    pub fn required_backends(&self) -> Vec<BackendKind> {
        let mut kinds = Vec::new();
        for kind in self.nodes.iter().filter_map(|n| n.op.backend()) {
            if !kinds.contains(&kind) {
                kinds.push(kind);
            }
        }
        kinds
    }

    /// Pretty-printed JSON rendering.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

impl fmt::Display for PlaneTransformGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} {}x{} -> {}x{}, {} nodes",
            self.format,
            self.input_size.0,
            self.input_size.1,
            self.output_size.0,
            self.output_size.1,
            self.nodes.len()
        )?;
        for node in &self.nodes {
            writeln!(
                f,
                "{:>5} {:<8} {:<13} {:>11} {}",
                node.id.to_string(),
                node.plane.name(),
                node.stage.name(),
                format!("{}x{}", node.width, node.height),
                node.op
            )?;
        }
        for output in &self.outputs {
            writeln!(f, "  output {} <- {}", output.plane, output.node)?;
        }
        Ok(())
    }
}

/// Appends nodes while tracking dimensions and grids.
#[derive(Debug)]
pub struct GraphBuilder {
    format: FrameFormat,
    nodes: Vec<Node>,
    sources: Vec<PlaneOutput>,
    stage: Stage,
}

impl GraphBuilder {
    pub fn new(format: FrameFormat) -> Self {
        Self { format, nodes: Vec::new(), sources: Vec::new(), stage: Stage::Input }
    }

    pub fn format(&self) -> &FrameFormat {
        &self.format
    }

    /// Label nodes created from now on.
    pub fn set_stage(&mut self, stage: Stage) {
        self.stage = stage;
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn dims(&self, id: NodeId) -> (u32, u32) {
        self.node(id).dims()
    }

    pub fn grid(&self, id: NodeId) -> PlaneGrid {
        self.node(id).grid
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn push(&mut self, plane: PlaneKind, op: Op, width: u32, height: u32, grid: PlaneGrid) -> NodeId {
        let id = NodeId(self.nodes.len());
        tracing::trace!(node = %id, plane = %plane, stage = %self.stage, "{} -> {}x{}", op, width, height);
        self.nodes.push(Node { id, plane, stage: self.stage, op, width, height, grid });
        id
    }

    fn derived(&mut self, from: NodeId, op: Op, width: u32, height: u32, grid: PlaneGrid) -> NodeId {
        let plane = self.node(from).plane;
        self.push(plane, op, width, height, grid)
    }

    fn mismatch(&self, id: NodeId, width: u32, height: u32, reason: String) -> ConfigError {
        ConfigError::InvalidDimensions { plane: self.node(id).plane.name(), width, height, reason }
    }

    /// Add one plane of the input frame.
    pub fn source(&mut self, plane: PlaneKind, width: u32, height: u32) -> NodeId {
        let stage = std::mem::replace(&mut self.stage, Stage::Input);
        let id = self.push(plane, Op::Source, width, height, PlaneGrid::SOURCE);
        self.stage = stage;
        self.sources.push(PlaneOutput { plane, node: id });
        id
    }

    pub fn transpose(&mut self, input: NodeId) -> NodeId {
        let node = self.node(input);
        let (w, h, grid) = (node.width, node.height, node.grid.transposed());
        self.derived(input, Op::Transpose { input }, h, w, grid)
    }

    /// Pad with duplicated edge samples; a no-op for empty padding.
    pub fn pad(&mut self, input: NodeId, padding: Padding) -> NodeId {
        if padding.is_none() {
            return input;
        }
        let node = self.node(input);
        let grid = node
            .grid
            .map_columns(|g| g.padded(padding.left))
            .map_rows(|g| g.padded(padding.top));
        let (w, h) = (node.width + padding.horizontal(), node.height + padding.vertical());
        self.derived(input, Op::Pad { input, padding }, w, h, grid)
    }

    /// Remove samples from the edges; a no-op for empty crops.
    pub fn crop(&mut self, input: NodeId, crop: Padding) -> Result<NodeId, ConfigError> {
        if crop.is_none() {
            return Ok(input);
        }
        let (w, h) = self.dims(input);
        if crop.horizontal() >= w || crop.vertical() >= h {
            return Err(self.mismatch(input, w, h, format!("cannot crop {:?}", crop)));
        }
        let grid = self.grid(input).map_columns(|g| g.cropped(crop.left)).map_rows(|g| g.cropped(crop.top));
        Ok(self.derived(input, Op::Crop { input, crop }, w - crop.horizontal(), h - crop.vertical(), grid))
    }

    /// Keep the field selected by `parity`; the height must be even.
    pub fn select_field(&mut self, input: NodeId, parity: Parity) -> Result<NodeId, ConfigError> {
        let (w, h) = self.dims(input);
        if h % 2 != 0 || h < 2 {
            return Err(self.mismatch(input, w, h, "field separation needs an even height".to_string()));
        }
        let grid = self.grid(input).map_rows(|g| g.field(parity));
        Ok(self.derived(input, Op::SelectField { input, parity }, w, h / 2, grid))
    }

    /// Repeat every row, as a nearest-neighbour doubling would.
    pub fn line_double(&mut self, input: NodeId) -> NodeId {
        let (w, h) = self.dims(input);
        let grid = self.grid(input).map_rows(|g| g.resampled(h, h * 2, 0.0));
        self.derived(input, Op::LineDouble { input }, w, h * 2, grid)
    }

    /// Call an interpolation backend.
    ///
    /// A guide must have the output's dimensions and a mask the input's.
    /// Re-interpolating a line-doubled plane in place restores the grid of
    /// the plane before doubling, enlarged with `params.parity`.
    pub fn enlarge(
        &mut self,
        input: NodeId,
        params: EnlargeParams,
        guide: Option<NodeId>,
        mask: Option<NodeId>,
    ) -> Result<NodeId, ConfigError> {
        let node = self.node(input);
        let (w, h) = node.dims();
        let (out_w, out_h) = if params.double_height { (w, h * 2) } else { (w, h) };

        let grid = match (&node.op, params.double_height) {
            (_, true) => node.grid.map_rows(|g| g.enlarged(params.parity)),
            (Op::LineDouble { input: base }, false) => {
                self.grid(*base).map_rows(|g| g.enlarged(params.parity))
            }
            (_, false) => node.grid,
        };

        if let Some(guide) = guide {
            let dims = self.dims(guide);
            if dims != (out_w, out_h) {
                return Err(self.mismatch(
                    guide,
                    dims.0,
                    dims.1,
                    format!("guide must match the {}x{} output", out_w, out_h),
                ));
            }
        }
        if let Some(mask) = mask {
            let dims = self.dims(mask);
            if dims != (w, h) {
                return Err(self.mismatch(mask, dims.0, dims.1, format!("mask must match the {}x{} input", w, h)));
            }
        }

        Ok(self.derived(input, Op::Enlarge { input, params, guide, mask }, out_w, out_h, grid))
    }

    /// Call the generic resampler.
    pub fn resample(&mut self, input: NodeId, params: ResampleParams) -> NodeId {
        let (w, h) = self.dims(input);
        let grid = self
            .grid(input)
            .map_columns(|g| g.resampled(w, params.width, params.src_left))
            .map_rows(|g| g.resampled(h, params.height, params.src_top));
        self.derived(input, Op::Resample { input, params }, params.width, params.height, grid)
    }

    /// Resample to `width` x `height` so the samples land on `target`.
    ///
    /// Returns `input` unchanged when it already has those dimensions and
    /// lies on `target`.
    pub fn resample_onto(
        &mut self,
        input: NodeId,
        width: u32,
        height: u32,
        target: PlaneGrid,
        kernel: Kernel,
    ) -> NodeId {
        let node = self.node(input);
        if node.dims() == (width, height) && node.grid.approx_eq(&target) {
            return input;
        }
        let src_left = node.grid.columns().shift_onto(node.width, width, target.columns());
        let src_top = node.grid.rows().shift_onto(node.height, height, target.rows());
        self.resample(input, ResampleParams { width, height, src_left, src_top, kernel })
    }

    pub fn average(&mut self, first: NodeId, second: NodeId) -> Result<NodeId, ConfigError> {
        let (w, h) = self.dims(first);
        self.expect_dims(second, (w, h))?;
        let grid = self.grid(first);
        Ok(self.derived(first, Op::Average { first, second }, w, h, grid))
    }

    pub fn detect_edges(&mut self, input: NodeId, algorithm: MaskAlgorithm, threshold: f64) -> NodeId {
        let node = self.node(input);
        let (w, h, grid) = (node.width, node.height, node.grid);
        self.derived(input, Op::DetectEdges { input, algorithm, threshold }, w, h, grid)
    }

    /// Binarize at half the sample range.
    pub fn binarize(&mut self, input: NodeId) -> NodeId {
        let threshold = 1u16 << (self.format.bit_depth.clamp(8, 16) - 1);
        let node = self.node(input);
        let (w, h, grid) = (node.width, node.height, node.grid);
        self.derived(input, Op::Binarize { input, threshold }, w, h, grid)
    }

    pub fn masked_merge(&mut self, base: NodeId, overlay: NodeId, mask: NodeId) -> Result<NodeId, ConfigError> {
        let (w, h) = self.dims(base);
        self.expect_dims(overlay, (w, h))?;
        self.expect_dims(mask, (w, h))?;
        let grid = self.grid(base);
        Ok(self.derived(base, Op::MaskedMerge { base, overlay, mask }, w, h, grid))
    }

    pub fn contra_sharpen(
        &mut self,
        input: NodeId,
        reference: NodeId,
        strength: Option<f64>,
    ) -> Result<NodeId, ConfigError> {
        let (w, h) = self.dims(input);
        self.expect_dims(reference, (w, h))?;
        let grid = self.grid(input);
        Ok(self.derived(input, Op::ContraSharpen { input, reference, strength }, w, h, grid))
    }

    fn expect_dims(&self, id: NodeId, expected: (u32, u32)) -> Result<(), ConfigError> {
        let dims = self.dims(id);
        if dims != expected {
            return Err(self.mismatch(
                id,
                dims.0,
                dims.1,
                format!("expected {}x{} to match its sibling", expected.0, expected.1),
            ));
        }
        Ok(())
    }

    /// Seal the graph.
    pub fn finish(
        self,
        input_size: (u32, u32),
        output_size: (u32, u32),
        outputs: Vec<PlaneOutput>,
    ) -> PlaneTransformGraph {
        PlaneTransformGraph {
            format: self.format,
            input_size,
            output_size,
            nodes: self.nodes,
            sources: self.sources,
            outputs,
        }
    }
}
