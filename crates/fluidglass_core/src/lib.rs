//! fluidglass core
//!
//! GPU-free building blocks shared by the renderer and the host layers:
//!
//! - **Configuration**: the flat `FluidConfig` record with serde overrides
//! - **Glass cards**: stable-id registry of rounded-rect regions
//! - **Pointers**: mouse and multi-touch state machine producing splats
//! - **Timing**: clamped frame clock
//! - **Viewport**: aspect-ratio and grid-resolution math

pub mod card;
pub mod clock;
pub mod color;
pub mod config;
pub mod error;
pub mod pointer;
pub mod splat;
pub mod viewport;

pub use card::{CardId, CardPatch, CardRegistry, GlassCard};
pub use clock::{clamp_timestep, FrameClock, MAX_TIMESTEP};
pub use color::{generate_color, hsv_to_rgb, Rgb};
pub use config::FluidConfig;
pub use error::{ConfigError, Result};
pub use pointer::{Pointer, PointerId, PointerSet};
pub use splat::{initial_burst_size, random_burst, Splat};
pub use viewport::{normalize_pixel_ratio, physical_size, scale_by_pixel_ratio, GridSize, Viewport};
