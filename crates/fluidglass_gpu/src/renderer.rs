//! Fluid simulation plus its presentation
//!
//! [`FluidRenderer`] owns the solver state and the glass intermediates and
//! picks the presentation path each frame: the glass composite when glass is
//! enabled and at least one card exists, the direct dye display otherwise.

use fluidglass_core::{FluidConfig, GlassCard, Splat, Viewport};

use crate::context::GpuContext;
use crate::display;
use crate::frame::FrameEncoder;
use crate::glass::GlassRenderer;
use crate::simulation::Simulation;

/// Which composite a frame used
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenderPath {
    Direct,
    Glass,
}

pub struct FluidRenderer {
    simulation: Simulation,
    glass: GlassRenderer,
}

impl FluidRenderer {
    pub fn new(gpu: &mut GpuContext, viewport: &Viewport, config: &FluidConfig) -> Self {
        let simulation = Simulation::new(gpu, viewport, config);
        let glass = GlassRenderer::new(gpu, simulation.dye_size(), config.noise_resolution);
        Self { simulation, glass }
    }

    /// Rebuild framebuffers for a new surface size or resolution settings
    pub fn resize(&mut self, frame: &mut FrameEncoder<'_>, viewport: &Viewport, config: &FluidConfig) {
        self.simulation.resize(frame, viewport, config);
        self.glass
            .resize(frame.context(), self.simulation.dye_size(), config.noise_resolution);
    }

    pub fn splat(
        &mut self,
        frame: &mut FrameEncoder<'_>,
        splat: &Splat,
        viewport: &Viewport,
        config: &FluidConfig,
    ) {
        self.simulation.splat(frame, splat, viewport, config);
    }

    pub fn step(&mut self, frame: &mut FrameEncoder<'_>, dt: f32, config: &FluidConfig) {
        self.simulation.step(frame, dt, config);
    }

    /// Composite the current dye onto the surface
    pub fn render<'c>(
        &self,
        frame: &mut FrameEncoder<'_>,
        cards: impl IntoIterator<Item = &'c GlassCard>,
        config: &FluidConfig,
        time: f32,
    ) -> RenderPath {
        let mut cards = cards.into_iter().peekable();
        let dye = self.simulation.dye().read();

        if config.glass_enabled && cards.peek().is_some() {
            self.glass.render(frame, dye, cards, config, time);
            RenderPath::Glass
        } else {
            display::render_direct(frame, dye, config);
            RenderPath::Direct
        }
    }

    pub fn simulation(&self) -> &Simulation {
        &self.simulation
    }

    pub fn glass(&self) -> &GlassRenderer {
        &self.glass
    }
}
