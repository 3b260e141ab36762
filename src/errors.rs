// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the depth viewer
//!
//! Startup failures (GPU setup, shader compilation, mesh construction) are
//! fatal and bubble up to `main`. Everything that can go wrong per frame is
//! handled locally by doing less that tick, so there is no error type for it.

use std::fmt;

use crate::backends::BackendError;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Main application error type
#[derive(Debug, Clone)]
pub enum AppError {
    /// GPU and rendering setup errors
    Render(RenderError),
    /// Mesh data rejected at construction
    Mesh(MeshError),
    /// Point cloud reconstruction errors
    Reconstruct(ReconstructError),
    /// Sensor or tracker errors
    Backend(BackendError),
    /// Configuration errors
    Config(String),
    /// Windowing / event loop errors
    Window(String),
    /// Filesystem errors
    Io(String),
    /// Generic error with message
    Other(String),
}

/// Errors raised while validating mesh data
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MeshError {
    /// Mesh has no vertices
    Empty,
    /// Index list length is not a multiple of 3
    IndexCountNotTriangles { index_count: usize },
    /// An index references a vertex past the end of the vertex list
    IndexOutOfRange {
        position: usize,
        index: u32,
        vertex_count: usize,
    },
}

/// GPU setup and pipeline errors
#[derive(Debug, Clone)]
pub enum RenderError {
    /// No adapter matched the request
    NoAdapter(String),
    /// Device creation failed
    DeviceRequest(String),
    /// Surface creation or configuration failed
    Surface(String),
    /// A shader stage failed to compile; carries the compiler diagnostic
    ShaderCompilation(String),
    /// The render pipeline failed to link; carries the validator diagnostic
    PipelineLink(String),
    /// Mesh data handed to a drawable was invalid
    Mesh(MeshError),
}

/// Point cloud reconstruction errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconstructError {
    /// `reconstruct` was called before the unprojection cache was built
    CacheNotBuilt,
    /// Depth frame resolution does not match the cached calibration
    DimensionMismatch {
        expected: (u32, u32),
        actual: (u32, u32),
    },
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Render(e) => write!(f, "Render error: {}", e),
            AppError::Mesh(e) => write!(f, "Mesh error: {}", e),
            AppError::Reconstruct(e) => write!(f, "Reconstruction error: {}", e),
            AppError::Backend(e) => write!(f, "Backend error: {}", e),
            AppError::Config(msg) => write!(f, "Configuration error: {}", msg),
            AppError::Window(msg) => write!(f, "Window error: {}", msg),
            AppError::Io(msg) => write!(f, "I/O error: {}", msg),
            AppError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl fmt::Display for MeshError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MeshError::Empty => write!(f, "mesh has no vertices"),
            MeshError::IndexCountNotTriangles { index_count } => write!(
                f,
                "index count {} is not a multiple of 3",
                index_count
            ),
            MeshError::IndexOutOfRange {
                position,
                index,
                vertex_count,
            } => write!(
                f,
                "index {} at position {} is out of range for {} vertices",
                index, position, vertex_count
            ),
        }
    }
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::NoAdapter(msg) => write!(f, "No suitable GPU adapter: {}", msg),
            RenderError::DeviceRequest(msg) => write!(f, "Failed to create GPU device: {}", msg),
            RenderError::Surface(msg) => write!(f, "Surface error: {}", msg),
            RenderError::ShaderCompilation(msg) => {
                write!(f, "Shader compilation failed:\n{}", msg)
            }
            RenderError::PipelineLink(msg) => write!(f, "Pipeline link failed:\n{}", msg),
            RenderError::Mesh(e) => write!(f, "Invalid mesh: {}", e),
        }
    }
}

impl fmt::Display for ReconstructError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReconstructError::CacheNotBuilt => {
                write!(f, "unprojection cache must be built before reconstruction")
            }
            ReconstructError::DimensionMismatch { expected, actual } => write!(
                f,
                "depth frame is {}x{} but the cache was built for {}x{}",
                actual.0, actual.1, expected.0, expected.1
            ),
        }
    }
}

impl std::error::Error for AppError {}
impl std::error::Error for MeshError {}
impl std::error::Error for RenderError {}
impl std::error::Error for ReconstructError {}

impl From<RenderError> for AppError {
    fn from(err: RenderError) -> Self {
        AppError::Render(err)
    }
}

impl From<MeshError> for AppError {
    fn from(err: MeshError) -> Self {
        AppError::Mesh(err)
    }
}

impl From<MeshError> for RenderError {
    fn from(err: MeshError) -> Self {
        RenderError::Mesh(err)
    }
}

impl From<ReconstructError> for AppError {
    fn from(err: ReconstructError) -> Self {
        AppError::Reconstruct(err)
    }
}

impl From<BackendError> for AppError {
    fn from(err: BackendError) -> Self {
        AppError::Backend(err)
    }
}

impl From<String> for AppError {
    fn from(msg: String) -> Self {
        AppError::Other(msg)
    }
}

impl From<&str> for AppError {
    fn from(msg: &str) -> Self {
        AppError::Other(msg.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mesh_error_display() {
        let err = MeshError::IndexOutOfRange {
            position: 4,
            index: 12,
            vertex_count: 12,
        };
        assert_eq!(
            err.to_string(),
            "index 12 at position 4 is out of range for 12 vertices"
        );
    }

    #[test]
    fn test_shader_error_keeps_diagnostic() {
        let err: AppError = RenderError::ShaderCompilation("error: expected ';'".into()).into();
        assert!(err.to_string().contains("expected ';'"));
    }
}
