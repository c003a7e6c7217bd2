//! External backend interfaces and their registry
//!
//! Interpolation, edge detection, generic resampling and contra-sharpening
//! are performed by collaborators outside this crate. Each is a `Send + Sync`
//! trait object so the executor can call it from worker threads; the
//! [`BackendSet`] maps the closed algorithm enums onto registered objects.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::algorithm::{Interpolation, MaskAlgorithm};
use crate::error::BackendError;
use crate::graph::{BackendKind, EnlargeParams, ResampleParams};
use crate::plane::RasterPlane;

/// Edge-directed interpolation.
///
/// With `params.double_height` the result has twice the input's height and
/// the input rows land on the rows selected by `params.parity`. Otherwise the
/// rows of the opposite field are re-interpolated in place.
pub trait Interpolator: Send + Sync {
    fn enlarge(
        &self,
        plane: &RasterPlane,
        params: &EnlargeParams,
        guide: Option<&RasterPlane>,
        mask: Option<&RasterPlane>,
    ) -> Result<RasterPlane, BackendError>;
}

/// Edge detection producing a mask of the input's dimensions.
pub trait EdgeDetector: Send + Sync {
    fn detect(&self, plane: &RasterPlane, threshold: f64) -> Result<RasterPlane, BackendError>;
}

/// Generic kernel resampling with sub-pixel source offsets.
pub trait Resampler: Send + Sync {
    fn resample(&self, plane: &RasterPlane, params: &ResampleParams) -> Result<RasterPlane, BackendError>;
}

/// Contra-sharpening of `plane` against `reference`.
pub trait Sharpener: Send + Sync {
    fn contra_sharpen(
        &self,
        plane: &RasterPlane,
        reference: &RasterPlane,
        strength: Option<f64>,
    ) -> Result<RasterPlane, BackendError>;
}

/// Backends available to the executor.
#[derive(Clone, Default)]
pub struct BackendSet {
    interpolators: HashMap<Interpolation, Arc<dyn Interpolator>>,
    edge_detectors: HashMap<MaskAlgorithm, Arc<dyn EdgeDetector>>,
    resampler: Option<Arc<dyn Resampler>>,
    sharpener: Option<Arc<dyn Sharpener>>,
}

impl BackendSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_interpolator(mut self, algorithm: Interpolation, backend: impl Interpolator + 'static) -> Self {
        self.register_interpolator(algorithm, Arc::new(backend));
        self
    }

    pub fn with_edge_detector(mut self, algorithm: MaskAlgorithm, backend: impl EdgeDetector + 'static) -> Self {
        self.register_edge_detector(algorithm, Arc::new(backend));
        self
    }

    pub fn with_resampler(mut self, backend: impl Resampler + 'static) -> Self {
        self.resampler = Some(Arc::new(backend));
        self
    }

    pub fn with_sharpener(mut self, backend: impl Sharpener + 'static) -> Self {
        self.sharpener = Some(Arc::new(backend));
        self
    }

    /// Register (or replace) the interpolator for `algorithm`.
    pub fn register_interpolator(&mut self, algorithm: Interpolation, backend: Arc<dyn Interpolator>) {
        self.interpolators.insert(algorithm, backend);
    }

    /// Register (or replace) the edge detector for `algorithm`.
    pub fn register_edge_detector(&mut self, algorithm: MaskAlgorithm, backend: Arc<dyn EdgeDetector>) {
        self.edge_detectors.insert(algorithm, backend);
    }

    pub fn interpolator(&self, algorithm: Interpolation) -> Result<&dyn Interpolator, BackendError> {
        self.interpolators
            .get(&algorithm)
            .map(|b| b.as_ref())
            .ok_or_else(|| missing(BackendKind::Interpolator(algorithm)))
    }

    pub fn edge_detector(&self, algorithm: MaskAlgorithm) -> Result<&dyn EdgeDetector, BackendError> {
        self.edge_detectors
            .get(&algorithm)
            .map(|b| b.as_ref())
            .ok_or_else(|| missing(BackendKind::EdgeDetector(algorithm)))
    }

    pub fn resampler(&self) -> Result<&dyn Resampler, BackendError> {
        self.resampler.as_deref().ok_or_else(|| missing(BackendKind::Resampler))
    }

    pub fn sharpener(&self) -> Result<&dyn Sharpener, BackendError> {
        self.sharpener.as_deref().ok_or_else(|| missing(BackendKind::Sharpener))
    }

    pub fn supports(&self, kind: BackendKind) -> bool {
        match kind {
            BackendKind::Interpolator(a) => self.interpolators.contains_key(&a),
            BackendKind::EdgeDetector(a) => self.edge_detectors.contains_key(&a),
            BackendKind::Resampler => self.resampler.is_some(),
            BackendKind::Sharpener => self.sharpener.is_some(),
        }
    }

    /// Fail with the first of `kinds` that has no registered backend.
    pub fn ensure(&self, kinds: &[BackendKind]) -> Result<(), BackendError> {
        match kinds.iter().find(|k| !self.supports(**k)) {
            Some(kind) => Err(missing(*kind)),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for BackendSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut interpolators: Vec<_> = self.interpolators.keys().collect();
        interpolators.sort();
        f.debug_struct("BackendSet")
            .field("interpolators", &interpolators)
            .field("edge_detectors", &self.edge_detectors.keys().map(|a| a.to_string()).collect::<Vec<_>>())
            .field("resampler", &self.resampler.is_some())
            .field("sharpener", &self.sharpener.is_some())
            .finish()
    }
}

fn missing(kind: BackendKind) -> BackendError {
    BackendError::Missing { algorithm: kind.to_string() }
}
