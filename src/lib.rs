//! xaa - Supersampling antialiasing pipeline builder
//!
//! This library provides functionality to:
//! - Decode compact mode descriptors ("sr SangNom", "drv2 eedi3 znedi3")
//! - Plan power-of-two doubling with exact sub-pixel shift corrections
//! - Build per-plane transform graphs: supersample, antialias, resize, composite
//! - Execute those graphs against pluggable interpolation and masking backends
//!
//! The crate never computes interpolated pixel values itself. It decides
//! which external algorithm runs, at which offsets, on which sub-rectangle,
//! and how the results are combined.

pub mod algorithm;
pub mod antialias;
pub mod backend;
pub mod cli;
pub mod compositor;
pub mod config;
pub mod doubler;
pub mod error;
pub mod executor;
pub mod format;
pub mod graph;
pub mod mode;
pub mod pad;
pub mod pipeline;
pub mod plane;
pub mod shift;

pub use algorithm::{Guide, Interpolation, Kernel, MaskAlgorithm, Upscaler};
pub use backend::{BackendSet, EdgeDetector, Interpolator, Resampler, Sharpener};
pub use compositor::MaskPolicy;
pub use error::{BackendError, ConfigError, Result, XaaError};
pub use executor::{execute, Executor};
pub use format::{ChromaSiting, FrameFormat, PlaneKind, ScaleRequest};
pub use graph::PlaneTransformGraph;
pub use mode::{decode, ModeDirective};
pub use pipeline::{build_pipeline, AlgorithmParameters, ChromaMode, Preset, SharpenMode};
pub use plane::{Parity, RasterPlane};
