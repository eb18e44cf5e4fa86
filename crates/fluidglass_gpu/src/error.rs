//! Error types for fluidglass_gpu

use thiserror::Error;

use crate::caps::FieldFormat;

/// Errors raised while setting up or reading back GPU state
#[derive(Error, Debug)]
pub enum GpuError {
    /// Failed to request GPU adapter
    #[error("No suitable GPU adapter found")]
    AdapterNotFound,

    /// Failed to request GPU device
    #[error("Failed to request GPU device: {0}")]
    Device(#[from] wgpu::RequestDeviceError),

    /// Failed to create surface
    #[error("Failed to create surface: {0}")]
    Surface(#[from] wgpu::CreateSurfaceError),

    /// No floating-point render target format for a field class
    #[error("No renderable floating-point texture format for {0:?} fields")]
    UnsupportedFormat(FieldFormat),

    /// WGSL failed to parse or validate
    #[error("Shader compilation error in {program}: {message}")]
    Shader {
        program: &'static str,
        message: String,
    },

    /// Mapping a readback buffer failed
    #[error("Readback failed: {0}")]
    Readback(String),
}

/// Result type for GPU operations
pub type Result<T> = std::result::Result<T, GpuError>;
