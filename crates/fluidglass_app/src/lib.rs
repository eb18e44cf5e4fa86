//! fluidglass application layer
//!
//! Drives the fluid renderer from a host: input, glass cards, configuration
//! and timing, plus the desktop and browser runners.
//!
//! # Example (Headless Rendering)
//!
//! ```ignore
//! use fluidglass_app::Engine;
//! use fluidglass_core::{CardPatch, FluidConfig, Rgb};
//!
//! fn main() -> fluidglass_app::Result<()> {
//!     let mut engine = pollster::block_on(Engine::headless(512, 512, FluidConfig::default()))?;
//!     engine.add_card(CardPatch::position(0.5, 0.5));
//!     engine.splat(0.5, 0.5, 0.0, 500.0, Rgb::new(0.8, 0.1, 0.1));
//!     engine.frame(0.0)?;
//!     let image = engine.snapshot()?;
//!     Ok(())
//! }
//! ```
//!
//! # Example (Windowed Application)
//!
//! ```ignore
//! use fluidglass_app::windowed::{run, WindowedOptions};
//!
//! fn main() -> fluidglass_app::Result<()> {
//!     run(WindowedOptions::default())
//! }
//! ```

mod engine;
mod error;
mod target;

#[cfg(feature = "windowed")]
pub mod windowed;

#[cfg(all(target_arch = "wasm32", feature = "web"))]
pub mod web;

pub use engine::{splats_allowed, ColorTimer, Engine, EngineHandle, FrameOutcome, FramebufferKey};
pub use error::{EngineError, Result};
pub use target::{AcquiredFrame, Presenter, RenderTarget, OFFSCREEN_FORMAT};
