//! Error types for pipeline construction and execution
//!
//! Configuration problems are always detected while the graph is built,
//! before any backend runs. Backend failures are passed through verbatim.

use thiserror::Error;

/// A configuration error detected while building a pipeline.
///
/// Building either fully succeeds or fails with one of these; nothing is
/// partially applied.
#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// Scale factor is not 1, 2, 4 or 8
    #[error("invalid {axis} scale factor {factor}: must be 1, 2, 4 or 8")]
    InvalidScale { axis: &'static str, factor: u32 },

    /// Malformed mode descriptor
    #[error("invalid mode string '{descriptor}': {reason} (at '{token}')")]
    InvalidMode { descriptor: String, token: String, reason: String },

    /// Unknown resampling kernel name
    #[error("unknown resampling kernel '{0}': expected one of Bilinear, Bicubic, Point, Lanczos, Spline16, Spline36")]
    UnknownKernel(String),

    /// Unknown or unsupported algorithm name
    #[error("unknown algorithm '{name}': expected one of {expected}")]
    UnknownAlgorithm { name: String, expected: String },

    /// Input format outside the supported set
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Dimensions incompatible with the format or request
    #[error("invalid {plane} dimensions {width}x{height}: {reason}")]
    InvalidDimensions { plane: &'static str, width: u32, height: u32, reason: String },

    /// A parameter outside its accepted range
    #[error("invalid parameter '{name}': {message}")]
    InvalidParameter { name: &'static str, message: String },
}

impl ConfigError {
    pub(crate) fn invalid_mode(
        descriptor: &str,
        token: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidMode {
            descriptor: descriptor.to_string(),
            token: token.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_parameter(name: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidParameter { name, message: message.into() }
    }
}

/// An error raised by (or about) an external backend.
#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum BackendError {
    /// The backend reported a failure
    #[error("{backend} backend failed: {message}")]
    Failed { backend: String, message: String },

    /// The graph needs a backend that was never registered
    #[error("no backend registered for '{algorithm}'")]
    Missing { algorithm: String },

    /// A plane did not have the dimensions the graph recorded for it
    #[error("node {node}: expected {}x{}, got {}x{}", expected.0, expected.1, actual.0, actual.1)]
    ShapeMismatch { node: usize, expected: (u32, u32), actual: (u32, u32) },
}

impl BackendError {
    /// Convenience constructor for backend implementations.
    pub fn failed(backend: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Failed { backend: backend.into(), message: message.into() }
    }
}

/// Top-level error for the public API.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum XaaError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Result type alias for the crate.
pub type Result<T> = std::result::Result<T, XaaError>;
