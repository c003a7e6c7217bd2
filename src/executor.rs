//! Graph evaluation against registered backends
//!
//! Nodes are grouped into dependency levels (see
//! [`PlaneTransformGraph::levels`]) and each level is evaluated in parallel
//! on a rayon pool. A level only starts once the previous one has finished,
//! so every node sees finished inputs. Intermediate planes are dropped as
//! soon as their last consumer has run.
//!
//! Before any backend is called, the executor checks that every backend the
//! graph needs is registered and that the input planes have the shapes the
//! graph was built for. Backend failures are returned unchanged.

use rayon::prelude::*;
use std::collections::BTreeMap;
use std::time::Instant;

use crate::backend::BackendSet;
use crate::error::{BackendError, ConfigError, Result};
use crate::format::PlaneKind;
use crate::graph::{Node, Op, PlaneTransformGraph};
use crate::plane::RasterPlane;

/// Default number of worker threads (uses available parallelism).
fn default_jobs() -> usize {
    std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
}

/// Evaluates graphs with one backend set.
#[derive(Debug, Clone)]
pub struct Executor {
    backends: BackendSet,
    jobs: usize,
}

impl Executor {
    pub fn new(backends: BackendSet) -> Self {
        Self { backends, jobs: default_jobs() }
    }

    /// Set the number of worker threads.
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    pub fn jobs(&self) -> usize {
        self.jobs
    }

    pub fn backends(&self) -> &BackendSet {
        &self.backends
    }

    /// Evaluate `graph` on one frame.
    ///
    /// `inputs` holds one plane per plane of the graph's format; the result
    /// holds one plane per graph output.
    pub fn execute(
        &self,
        graph: &PlaneTransformGraph,
        inputs: &BTreeMap<PlaneKind, RasterPlane>,
    ) -> Result<BTreeMap<PlaneKind, RasterPlane>> {
        self.backends.ensure(&graph.required_backends())?;
        check_inputs(graph, inputs)?;

        let start = Instant::now();
        let levels = graph.levels();
        tracing::info!(nodes = graph.len(), levels = levels.len(), jobs = self.jobs, "executing graph");

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.jobs)
            .build()
            .map_err(|e| BackendError::failed("executor", e.to_string()))?;

        let last_use = last_use_level(graph, &levels);
        let mut planes: Vec<Option<RasterPlane>> = vec![None; graph.len()];

        for (depth, level) in levels.iter().enumerate() {
            let evaluated: Vec<RasterPlane> = pool.install(|| {
                level
                    .par_iter()
                    .map(|&id| self.evaluate(graph.node(id), &planes, inputs))
                    .collect::<std::result::Result<_, BackendError>>()
            })?;
            for (&id, plane) in level.iter().zip(evaluated) {
                planes[id.index()] = Some(plane);
            }
            for (index, slot) in planes.iter_mut().enumerate() {
                if last_use[index] == Some(depth) {
                    *slot = None;
                }
            }
            tracing::trace!(level = depth, nodes = level.len(), "level done");
        }

        let mut outputs = BTreeMap::new();
        for output in graph.outputs() {
            let plane = planes[output.node.index()].clone().ok_or_else(|| {
                BackendError::failed("executor", format!("output {} was never evaluated", output.node))
            })?;
            outputs.insert(output.plane, plane);
        }

        tracing::info!(elapsed_ms = start.elapsed().as_millis() as u64, "graph executed");
        Ok(outputs)
    }

    fn evaluate(
        &self,
        node: &Node,
        planes: &[Option<RasterPlane>],
        inputs: &BTreeMap<PlaneKind, RasterPlane>,
    ) -> std::result::Result<RasterPlane, BackendError> {
        let get = |id: crate::graph::NodeId| {
            planes[id.index()].as_ref().ok_or_else(|| {
                BackendError::failed("executor", format!("{} read {} before it was evaluated", node.id, id))
            })
        };

        let result = match &node.op {
            Op::Source => inputs
                .get(&node.plane)
                .cloned()
                .ok_or_else(|| BackendError::failed("executor", format!("no input for {}", node.plane)))?,
            Op::Transpose { input } => get(*input)?.transpose(),
            Op::Pad { input, padding: p } => get(*input)?.pad_edges(p.left, p.right, p.top, p.bottom),
            Op::Crop { input, crop: c } => get(*input)?.crop(c.left, c.right, c.top, c.bottom),
            Op::SelectField { input, parity } => get(*input)?.select_field(*parity),
            Op::LineDouble { input } => get(*input)?.line_double(),
            Op::Enlarge { input, params, guide, mask } => {
                let guide = guide.map(get).transpose()?;
                let mask = mask.map(get).transpose()?;
                self.backends.interpolator(params.algorithm)?.enlarge(get(*input)?, params, guide, mask)?
            }
            Op::Resample { input, params } => self.backends.resampler()?.resample(get(*input)?, params)?,
            Op::Average { first, second } => get(*first)?.average(get(*second)?),
            Op::DetectEdges { input, algorithm, threshold } => {
                self.backends.edge_detector(*algorithm)?.detect(get(*input)?, *threshold)?
            }
            Op::Binarize { input, threshold } => get(*input)?.binarize(*threshold),
            Op::MaskedMerge { base, overlay, mask } => get(*base)?.masked_merge(get(*overlay)?, get(*mask)?),
            Op::ContraSharpen { input, reference, strength } => {
                self.backends.sharpener()?.contra_sharpen(get(*input)?, get(*reference)?, *strength)?
            }
        };

        if result.dims() != node.dims() {
            return Err(BackendError::ShapeMismatch {
                node: node.id.index(),
                expected: node.dims(),
                actual: result.dims(),
            });
        }
        Ok(result)
    }
}

/// Evaluate `graph` on one frame with `backends`.
pub fn execute(
    graph: &PlaneTransformGraph,
    inputs: &BTreeMap<PlaneKind, RasterPlane>,
    backends: &BackendSet,
) -> Result<BTreeMap<PlaneKind, RasterPlane>> {
    Executor::new(backends.clone()).execute(graph, inputs)
}

fn check_inputs(graph: &PlaneTransformGraph, inputs: &BTreeMap<PlaneKind, RasterPlane>) -> Result<()> {
    let bit_depth = graph.format().bit_depth;
    for source in graph.sources() {
        let node = graph.node(source.node);
        let plane = inputs.get(&source.plane).ok_or_else(|| ConfigError::InvalidDimensions {
            plane: source.plane.name(),
            width: 0,
            height: 0,
            reason: "plane missing from the input frame".to_string(),
        })?;
        if plane.dims() != node.dims() {
            return Err(ConfigError::InvalidDimensions {
                plane: source.plane.name(),
                width: plane.width(),
                height: plane.height(),
                reason: format!("the graph was built for {}x{}", node.width, node.height),
            }
            .into());
        }
        if plane.bit_depth() != bit_depth {
            return Err(ConfigError::UnsupportedFormat(format!(
                "{} plane has {}-bit samples, the graph expects {}",
                source.plane,
                plane.bit_depth(),
                bit_depth
            ))
            .into());
        }
    }
    Ok(())
}

/// Level after which each node's plane is no longer needed.
///
/// Outputs are kept to the end (`None`).
fn last_use_level(graph: &PlaneTransformGraph, levels: &[Vec<crate::graph::NodeId>]) -> Vec<Option<usize>> {
    let mut last = vec![None; graph.len()];
    for (depth, level) in levels.iter().enumerate() {
        for &id in level {
            last[id.index()] = last[id.index()].or(Some(depth));
            for input in graph.node(id).op.inputs() {
                last[input.index()] = Some(depth);
            }
        }
    }
    for output in graph.outputs() {
        last[output.node.index()] = None;
    }
    last
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithm::{Interpolation, MaskAlgorithm};
    use crate::backend::{EdgeDetector, Interpolator, Resampler};
    use crate::format::{FrameFormat, ScaleRequest};
    use crate::graph::{EnlargeParams, ResampleParams};
    use crate::pipeline::{build_pipeline, AlgorithmParameters};
    use crate::compositor::MaskPolicy;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Doubles by line repetition, or returns the input unchanged.
    struct RepeatRows(Arc<AtomicUsize>);

    impl Interpolator for RepeatRows {
        fn enlarge(
            &self,
            plane: &RasterPlane,
            params: &EnlargeParams,
            _guide: Option<&RasterPlane>,
            _mask: Option<&RasterPlane>,
        ) -> std::result::Result<RasterPlane, BackendError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(if params.double_height { plane.line_double() } else { plane.clone() })
        }
    }

    /// Nearest-neighbour resampling that ignores offsets.
    struct Nearest;

    impl Resampler for Nearest {
        fn resample(&self, plane: &RasterPlane, params: &ResampleParams) -> std::result::Result<RasterPlane, BackendError> {
            let samples = (0..params.height)
                .flat_map(|y| {
                    (0..params.width).map(move |x| {
                        plane.get(x * plane.width() / params.width, y * plane.height() / params.height)
                    })
                })
                .collect();
            RasterPlane::from_samples(params.width, params.height, plane.bit_depth(), samples)
                .map_err(|e| BackendError::failed("nearest", e.to_string()))
        }
    }

    struct Flat;

    impl EdgeDetector for Flat {
        fn detect(&self, plane: &RasterPlane, _threshold: f64) -> std::result::Result<RasterPlane, BackendError> {
            Ok(RasterPlane::filled(plane.width(), plane.height(), plane.bit_depth(), plane.peak()))
        }
    }

    struct WrongSize;

    impl Interpolator for WrongSize {
        fn enlarge(
            &self,
            plane: &RasterPlane,
            _params: &EnlargeParams,
            _guide: Option<&RasterPlane>,
            _mask: Option<&RasterPlane>,
        ) -> std::result::Result<RasterPlane, BackendError> {
            Ok(plane.clone())
        }
    }

    fn gray_input(width: u32, height: u32) -> BTreeMap<PlaneKind, RasterPlane> {
        let samples = (0..width * height).map(|v| (v % 256) as u16).collect();
        BTreeMap::from([(PlaneKind::Luma, RasterPlane::from_samples(width, height, 8, samples).unwrap())])
    }

    fn backends(calls: &Arc<AtomicUsize>) -> BackendSet {
        BackendSet::new()
            .with_interpolator(Interpolation::Znedi3, RepeatRows(Arc::clone(calls)))
            .with_resampler(Nearest)
            .with_edge_detector(MaskAlgorithm::default(), Flat)
    }

    #[test]
    fn test_executes_single_rate_graph() {
        let graph = build_pipeline(
            FrameFormat::gray(8),
            (16, 16),
            "sr znedi3",
            ScaleRequest::uniform(2).unwrap(),
            &AlgorithmParameters::default(),
        )
        .unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let outputs = Executor::new(backends(&calls)).with_jobs(2).execute(&graph, &gray_input(16, 16)).unwrap();
        assert_eq!(outputs[&PlaneKind::Luma].dims(), (32, 32));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_missing_backend_fails_before_any_call() {
        let graph = build_pipeline(
            FrameFormat::gray(8),
            (16, 16),
            "sr znedi3",
            ScaleRequest::identity(),
            &AlgorithmParameters::default(),
        )
        .unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let set = BackendSet::new().with_interpolator(Interpolation::Znedi3, RepeatRows(Arc::clone(&calls)));
        let err = execute(&graph, &gray_input(16, 16), &set).unwrap_err();
        assert!(matches!(err, crate::error::XaaError::Backend(BackendError::Missing { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_input_shape_checked() {
        let params = AlgorithmParameters { mask: MaskPolicy::Replace, ..Default::default() };
        let graph =
            build_pipeline(FrameFormat::gray(8), (16, 16), "sr znedi3", ScaleRequest::identity(), &params).unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let err = execute(&graph, &gray_input(16, 8), &backends(&calls)).unwrap_err();
        assert!(matches!(err, crate::error::XaaError::Config(ConfigError::InvalidDimensions { .. })));
        let err = execute(&graph, &BTreeMap::new(), &backends(&calls)).unwrap_err();
        assert!(matches!(err, crate::error::XaaError::Config(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_backend_output_shape_checked() {
        let params = AlgorithmParameters { mask: MaskPolicy::Replace, ..Default::default() };
        let graph =
            build_pipeline(FrameFormat::gray(8), (16, 16), "div znedi3", ScaleRequest::identity(), &params).unwrap();
        let set = BackendSet::new().with_interpolator(Interpolation::Znedi3, WrongSize).with_resampler(Nearest);
        let err = execute(&graph, &gray_input(16, 16), &set).unwrap_err();
        match err {
            crate::error::XaaError::Backend(BackendError::ShapeMismatch { expected, actual, .. }) => {
                assert_eq!(expected.1, actual.1 * 2);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_last_use_keeps_outputs() {
        let params = AlgorithmParameters { mask: MaskPolicy::Replace, ..Default::default() };
        let graph =
            build_pipeline(FrameFormat::gray(8), (16, 16), "null", ScaleRequest::identity(), &params).unwrap();
        let levels = graph.levels();
        let last = last_use_level(&graph, &levels);
        assert_eq!(last, vec![None]);
    }
}
