//! Executor tests with recording mock backends
//!
//! The mocks move samples around without interpolating anything, which is
//! enough to check call routing, merge policies and error propagation.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use xaa::graph::{EnlargeParams, Op, ResampleParams};
use xaa::{
    build_pipeline, AlgorithmParameters, BackendError, BackendSet, ChromaMode, EdgeDetector, Executor, FrameFormat,
    Interpolation, Interpolator, MaskAlgorithm, MaskPolicy, PlaneKind, PlaneTransformGraph, Preset, RasterPlane,
    Resampler, ScaleRequest, Sharpener, XaaError,
};

type Calls = Arc<Mutex<Vec<(u8, bool)>>>;

/// Records `(parity, double_height)` and doubles by repeating rows.
struct Recording(Calls);

impl Interpolator for Recording {
    fn enlarge(
        &self,
        plane: &RasterPlane,
        params: &EnlargeParams,
        _guide: Option<&RasterPlane>,
        _mask: Option<&RasterPlane>,
    ) -> Result<RasterPlane, BackendError> {
        self.0.lock().unwrap().push((params.parity.value(), params.double_height));
        Ok(if params.double_height { plane.line_double() } else { plane.clone() })
    }
}

struct Failing;

impl Interpolator for Failing {
    fn enlarge(
        &self,
        _plane: &RasterPlane,
        _params: &EnlargeParams,
        _guide: Option<&RasterPlane>,
        _mask: Option<&RasterPlane>,
    ) -> Result<RasterPlane, BackendError> {
        Err(BackendError::failed("znedi3", "out of memory"))
    }
}

/// Nearest-neighbour resampling that ignores sub-pixel offsets.
struct Nearest;

impl Resampler for Nearest {
    fn resample(&self, plane: &RasterPlane, params: &ResampleParams) -> Result<RasterPlane, BackendError> {
        let samples = (0..params.height)
            .flat_map(|y| {
                (0..params.width)
                    .map(move |x| plane.get(x * plane.width() / params.width, y * plane.height() / params.height))
            })
            .collect();
        RasterPlane::from_samples(params.width, params.height, plane.bit_depth(), samples)
            .map_err(|e| BackendError::failed("nearest", e.to_string()))
    }
}

/// Marks every sample as an edge.
struct Everywhere;

impl EdgeDetector for Everywhere {
    fn detect(&self, plane: &RasterPlane, _threshold: f64) -> Result<RasterPlane, BackendError> {
        Ok(RasterPlane::filled(plane.width(), plane.height(), plane.bit_depth(), plane.peak()))
    }
}

struct CountingSharpener(Arc<AtomicUsize>);

impl Sharpener for CountingSharpener {
    fn contra_sharpen(
        &self,
        plane: &RasterPlane,
        _reference: &RasterPlane,
        _strength: Option<f64>,
    ) -> Result<RasterPlane, BackendError> {
        self.0.fetch_add(1, Ordering::SeqCst);
        Ok(plane.clone())
    }
}

fn frame(format: FrameFormat, width: u32, height: u32) -> BTreeMap<PlaneKind, RasterPlane> {
    format
        .planes()
        .iter()
        .map(|&plane| {
            let (w, h) = format.plane_dims(plane, width, height);
            let samples = (0..w * h).map(|v| ((v * 7 + plane.index() as u32 * 31) % 256) as u16).collect();
            (plane, RasterPlane::from_samples(w, h, 8, samples).unwrap())
        })
        .collect()
}

fn backends(calls: &Calls) -> BackendSet {
    BackendSet::new()
        .with_interpolator(Interpolation::Znedi3, Recording(Arc::clone(calls)))
        .with_resampler(Nearest)
        .with_edge_detector(MaskAlgorithm::default(), Everywhere)
}

fn build(mode: &str, params: &AlgorithmParameters) -> PlaneTransformGraph {
    build_pipeline(FrameFormat::yuv420(8), (32, 32), mode, ScaleRequest::uniform(2).unwrap(), params).unwrap()
}

#[test]
fn test_full_mask_merges_like_replace() {
    let calls = Calls::default();
    let executor = Executor::new(backends(&calls)).with_jobs(4);
    let input = frame(FrameFormat::yuv420(8), 32, 32);

    let params = |mask| AlgorithmParameters { mask, chroma: ChromaMode::Include, ..Default::default() };
    let masked = executor.execute(&build("sr znedi3", &params(MaskPolicy::AntialiasedInEdges)), &input).unwrap();
    let replaced = executor.execute(&build("sr znedi3", &params(MaskPolicy::Replace)), &input).unwrap();

    assert_eq!(masked.len(), 3);
    assert_eq!(masked, replaced);
    assert_eq!(masked[&PlaneKind::Luma].dims(), (64, 64));
    assert_eq!(masked[&PlaneKind::ChromaV].dims(), (32, 32));
}

#[test]
fn test_full_mask_keeps_reference_for_original_in_edges() {
    let calls = Calls::default();
    let executor = Executor::new(backends(&calls));
    let input = frame(FrameFormat::yuv420(8), 32, 32);

    let original = AlgorithmParameters { mask: MaskPolicy::OriginalInEdges, ..Default::default() };
    let kept = executor.execute(&build("sr znedi3", &original), &input).unwrap();

    let passthrough = AlgorithmParameters { mask: MaskPolicy::Replace, ..Default::default() };
    let reference = executor.execute(&build("null", &passthrough), &input).unwrap();

    assert_eq!(kept, reference);
    // luma only by default: one call per direction
    assert_eq!(calls.lock().unwrap().len(), 2);
}

#[test]
fn test_deinterlace_parities_reach_backend() {
    let calls = Calls::default();
    let graph = build_pipeline(
        FrameFormat::gray(8),
        (32, 32),
        "div3 znedi3",
        ScaleRequest::identity(),
        &AlgorithmParameters { mask: MaskPolicy::Replace, ..Default::default() },
    )
    .unwrap();
    let outputs = Executor::new(backends(&calls)).with_jobs(1).execute(&graph, &frame(FrameFormat::gray(8), 32, 32)).unwrap();

    assert_eq!(outputs[&PlaneKind::Luma].dims(), (32, 32));
    assert_eq!(*calls.lock().unwrap(), vec![(1, true), (0, false), (1, false)]);
}

#[test]
fn test_backend_error_returned_verbatim() {
    let set = BackendSet::new()
        .with_interpolator(Interpolation::Znedi3, Failing)
        .with_resampler(Nearest)
        .with_edge_detector(MaskAlgorithm::default(), Everywhere);
    let err = Executor::new(set)
        .execute(&build("sr znedi3", &AlgorithmParameters::default()), &frame(FrameFormat::yuv420(8), 32, 32))
        .unwrap_err();
    assert_eq!(err, XaaError::Backend(BackendError::failed("znedi3", "out of memory")));
}

#[test]
fn test_sharpener_runs_once_per_processed_plane() {
    let calls = Calls::default();
    let sharpened = Arc::new(AtomicUsize::new(0));
    let set = backends(&calls).with_sharpener(CountingSharpener(Arc::clone(&sharpened)));

    let graph = build(Preset::Mrdaa.mode(), &Preset::Mrdaa.parameters());
    let outputs = Executor::new(set).execute(&graph, &frame(FrameFormat::yuv420(8), 32, 32)).unwrap();

    assert_eq!(outputs[&PlaneKind::Luma].dims(), (64, 64));
    assert_eq!(sharpened.load(Ordering::SeqCst), 3);
    assert!(!calls.lock().unwrap().is_empty());
}

#[test]
fn test_double_rate_fields_share_a_level() {
    let graph = build_pipeline(
        FrameFormat::gray(8),
        (32, 32),
        "drv znedi3",
        ScaleRequest::identity(),
        &AlgorithmParameters { mask: MaskPolicy::Replace, ..Default::default() },
    )
    .unwrap();
    let widest = graph
        .levels()
        .iter()
        .map(|level| level.iter().filter(|&&id| matches!(graph.node(id).op, Op::Enlarge { .. })).count())
        .max()
        .unwrap();
    assert_eq!(widest, 2);
}
