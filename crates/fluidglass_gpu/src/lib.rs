//! fluidglass GPU layer
//!
//! Stable-fluids simulation and liquid glass compositing using wgpu.
//!
//! # Features
//!
//! - **Format negotiation**: half-float render targets with full-float and
//!   nearest-filtering fallbacks
//! - **Fluid solver**: vorticity confinement, Jacobi pressure projection and
//!   semi-Lagrangian advection on double-buffered fields
//! - **Liquid glass**: noise-driven refraction of a blurred fluid snapshot
//!   with chromatic aberration, edge light, specular and fresnel terms
//! - **Readback**: field and surface snapshots for tests and diagnostics

pub mod caps;
pub mod context;
pub mod display;
pub mod error;
pub mod field;
pub mod frame;
pub mod glass;
pub mod program;
pub mod readback;
pub mod renderer;
pub mod shaders;
pub mod simulation;
pub mod uniforms;

pub use caps::{Capabilities, FieldFormat, FormatSupport};
pub use context::{choose_surface_format, surface_config, GpuContext};
pub use error::{GpuError, Result};
pub use field::{DoubleBuffer, DoubleField, Field, SamplerKind};
pub use frame::{Blit, FrameEncoder, SurfaceTarget, Target};
pub use glass::GlassRenderer;
pub use program::{validate_wgsl, Blend, Keywords, PipelineKey, Program};
pub use readback::{FieldSnapshot, SurfaceSnapshot};
pub use renderer::{FluidRenderer, RenderPath};
pub use simulation::Simulation;
