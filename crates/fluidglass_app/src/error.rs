//! Error types for fluidglass_app

use thiserror::Error;

/// Errors that can occur while creating or driving the engine
#[derive(Error, Debug)]
pub enum EngineError {
    /// GPU setup or readback failed
    #[error("GPU error: {0}")]
    Gpu(#[from] fluidglass_gpu::GpuError),

    /// Configuration could not be loaded or merged
    #[error("Configuration error: {0}")]
    Config(#[from] fluidglass_core::ConfigError),

    /// The surface reported an unrecoverable error
    #[error("Surface error: {0}")]
    Surface(#[from] wgpu::SurfaceError),

    /// The operation needs an offscreen render target
    #[error("Engine is not rendering offscreen")]
    NotOffscreen,

    /// The engine has been destroyed
    #[error("Engine has been destroyed")]
    Destroyed,

    /// Platform error (windowing, DOM access, etc.)
    #[error("Platform error: {0}")]
    Platform(String),
}

/// Result type for fluidglass_app operations
pub type Result<T> = std::result::Result<T, EngineError>;
