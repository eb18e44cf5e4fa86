//! Engine loop controller
//!
//! [`Engine`] ties the GPU renderer to input, cards, configuration and
//! timing. Hosts call [`Engine::frame`] once per display refresh with a
//! monotonic timestamp; each frame:
//!
//! 1. advances the clock (clamped to [`MAX_TIMESTEP`](fluidglass_core::MAX_TIMESTEP))
//! 2. rebuilds framebuffers if the surface size or a resolution changed
//! 3. applies queued bursts, injected splats and pointer movement
//! 4. cycles pointer colours
//! 5. steps the simulation unless paused
//! 6. renders and presents
//!
//! [`EngineHandle`] is the shared, destroyable handle hosts hold on to.

use std::cell::RefCell;
use std::rc::Rc;

use rand::rngs::SmallRng;
use rand::SeedableRng;

use fluidglass_core::{
    generate_color, initial_burst_size, normalize_pixel_ratio, physical_size, random_burst,
    scale_by_pixel_ratio, CardId, CardPatch, CardRegistry, FluidConfig, FrameClock, GlassCard,
    PointerId, PointerSet, Rgb, Splat, Viewport,
};
use fluidglass_gpu::{FieldSnapshot, FluidRenderer, GpuContext, RenderPath, SurfaceSnapshot};

use crate::error::{EngineError, Result};
use crate::target::RenderTarget;

/// Everything whose change forces a framebuffer rebuild
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FramebufferKey {
    pub width: u32,
    pub height: u32,
    pub sim_resolution: u32,
    pub dye_resolution: u32,
    pub noise_resolution: u32,
}

impl FramebufferKey {
    pub fn new(width: u32, height: u32, config: &FluidConfig) -> Self {
        Self {
            width,
            height,
            sim_resolution: config.sim_resolution,
            dye_resolution: config.dye_resolution,
            noise_resolution: config.noise_resolution,
        }
    }
}

/// Accumulates time until the next pointer recolouring
#[derive(Clone, Copy, Debug, Default)]
pub struct ColorTimer {
    elapsed: f32,
}

impl ColorTimer {
    /// Advance by `dt`; true when pointer colours should change
    pub fn advance(&mut self, dt: f32, speed: f32) -> bool {
        self.elapsed += dt * speed;
        if self.elapsed >= 1.0 {
            self.elapsed = self.elapsed.rem_euclid(1.0);
            true
        } else {
            false
        }
    }
}

/// Whether splats reach the fields this frame
pub fn splats_allowed(config: &FluidConfig) -> bool {
    !config.paused || config.splat_while_paused
}

/// What a call to [`Engine::frame`] did
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FrameOutcome {
    /// Clamped timestep
    pub dt: f32,
    /// Framebuffers were rebuilt
    pub rebuilt: bool,
    /// Splats applied
    pub splats: usize,
    /// Simulation advanced
    pub stepped: bool,
    /// Composite used; `None` when the surface was unavailable
    pub path: Option<RenderPath>,
}

pub struct Engine {
    gpu: GpuContext,
    target: RenderTarget,
    renderer: FluidRenderer,
    config: FluidConfig,
    cards: CardRegistry,
    pointers: PointerSet,
    clock: FrameClock,
    color_timer: ColorTimer,
    pending_bursts: Vec<u32>,
    pending_splats: Vec<Splat>,
    framebuffer_key: FramebufferKey,
    /// Requested surface size in logical pixels
    logical_size: (f32, f32),
    pixel_ratio: f32,
    rng: SmallRng,
    frame_index: u64,
}

impl Engine {
    /// Build an engine over an existing context and target
    ///
    /// The target's current size is taken as the initial surface size with a
    /// pixel ratio of 1.
    pub fn new(mut gpu: GpuContext, target: RenderTarget, mut config: FluidConfig) -> Self {
        if !gpu.capabilities().linear_filtering {
            tracing::warn!("Float textures are not filterable, using nearest filtering");
            config.degrade_for_nearest_filtering();
        }

        let (width, height) = target.size();
        let viewport = Viewport::new(width, height);
        let renderer = FluidRenderer::new(&mut gpu, &viewport, &config);

        let mut rng = SmallRng::from_entropy();
        let mut pending_bursts = Vec::new();
        if config.initial_splats {
            pending_bursts.push(initial_burst_size(&mut rng));
        }

        tracing::info!("Engine created at {}x{}", width, height);

        Self {
            gpu,
            target,
            renderer,
            framebuffer_key: FramebufferKey::new(width, height, &config),
            config,
            cards: CardRegistry::new(),
            pointers: PointerSet::new(),
            clock: FrameClock::new(),
            color_timer: ColorTimer::default(),
            pending_bursts,
            pending_splats: Vec::new(),
            logical_size: (width as f32, height as f32),
            pixel_ratio: 1.0,
            rng,
            frame_index: 0,
        }
    }

    /// Engine rendering into an offscreen texture
    pub async fn headless(width: u32, height: u32, config: FluidConfig) -> Result<Self> {
        let gpu = GpuContext::headless().await?;
        let target = RenderTarget::offscreen(&gpu, width, height);
        Ok(Self::new(gpu, target, config))
    }

    /// Engine presenting to `surface`, created from `instance`
    pub async fn with_surface(
        instance: wgpu::Instance,
        surface: wgpu::Surface<'static>,
        width: u32,
        height: u32,
        config: FluidConfig,
    ) -> Result<Self> {
        let gpu = GpuContext::new(instance, Some(&surface)).await?;
        let target = RenderTarget::surface(&gpu, surface, width, height)?;
        Ok(Self::new(gpu, target, config))
    }

    // ------------------------------------------------------------------
    // Cards
    // ------------------------------------------------------------------

    pub fn add_card(&mut self, patch: CardPatch) -> CardId {
        self.cards.add(patch)
    }

    pub fn remove_card(&mut self, id: CardId) -> bool {
        self.cards.remove(id).is_some()
    }

    pub fn update_card(&mut self, id: CardId, patch: &CardPatch) -> bool {
        self.cards.update(id, patch)
    }

    pub fn clear_cards(&mut self) {
        self.cards.clear();
    }

    /// Draw-order position of a card
    pub fn card_index(&self, id: CardId) -> Option<usize> {
        self.cards.index_of(id)
    }

    pub fn card(&self, id: CardId) -> Option<&GlassCard> {
        self.cards.get(id)
    }

    pub fn card_count(&self) -> usize {
        self.cards.len()
    }

    // ------------------------------------------------------------------
    // Input (logical pixels, origin top-left)
    // ------------------------------------------------------------------

    fn viewport(&self) -> Viewport {
        let (width, height) = self.target.size();
        Viewport::new(width, height)
    }

    fn to_physical(&self, x: f32, y: f32) -> (f32, f32) {
        (
            scale_by_pixel_ratio(x, self.pixel_ratio),
            scale_by_pixel_ratio(y, self.pixel_ratio),
        )
    }

    fn press(&mut self, id: PointerId, x: f32, y: f32) {
        let (x, y) = self.to_physical(x, y);
        let viewport = self.viewport();
        let color = generate_color(&mut self.rng);
        self.pointers.press(id, x, y, &viewport, color);
    }

    fn move_pointer(&mut self, id: PointerId, x: f32, y: f32) {
        let (x, y) = self.to_physical(x, y);
        let viewport = self.viewport();
        self.pointers.move_to(id, x, y, &viewport);
    }

    pub fn pointer_down(&mut self, x: f32, y: f32) {
        self.press(PointerId::Mouse, x, y);
    }

    pub fn pointer_move(&mut self, x: f32, y: f32) {
        self.move_pointer(PointerId::Mouse, x, y);
    }

    pub fn pointer_up(&mut self) {
        self.pointers.release(PointerId::Mouse);
    }

    pub fn touch_start(&mut self, id: u64, x: f32, y: f32) {
        self.press(PointerId::Touch(id), x, y);
    }

    pub fn touch_move(&mut self, id: u64, x: f32, y: f32) {
        self.move_pointer(PointerId::Touch(id), x, y);
    }

    pub fn touch_end(&mut self, id: u64) {
        self.pointers.release(PointerId::Touch(id));
    }

    pub fn pointers(&self) -> &PointerSet {
        &self.pointers
    }

    /// Inject a splat at normalised `(x, y)` (y up), applied next frame
    pub fn splat(&mut self, x: f32, y: f32, dx: f32, dy: f32, color: Rgb) {
        self.pending_splats.push(Splat::new(x, y, dx, dy, color));
    }

    /// Queue `count` random splats for the next frame
    pub fn queue_burst(&mut self, count: u32) {
        self.pending_bursts.push(count);
    }

    // ------------------------------------------------------------------
    // Size and configuration
    // ------------------------------------------------------------------

    /// Requested surface size in logical pixels; applied at the next resize check
    pub fn set_surface_size(&mut self, width: f32, height: f32) {
        self.logical_size = (width, height);
    }

    pub fn set_pixel_ratio(&mut self, ratio: f32) {
        self.pixel_ratio = normalize_pixel_ratio(ratio);
    }

    pub fn pixel_ratio(&self) -> f32 {
        self.pixel_ratio
    }

    /// Physical size of the rendered surface
    pub fn surface_size(&self) -> (u32, u32) {
        self.target.size()
    }

    /// Reconfigure the target and rebuild framebuffers if anything changed
    ///
    /// Returns true when framebuffers were rebuilt.
    pub fn handle_resize(&mut self) -> bool {
        let (width, height) = self.logical_size;
        let (width, height) = physical_size(width, height, self.pixel_ratio);

        if (width, height) != self.target.size() {
            tracing::debug!("Surface resized to {}x{}", width, height);
            self.target.resize(&self.gpu, width, height);
        }

        let (width, height) = self.target.size();
        let key = FramebufferKey::new(width, height, &self.config);
        if key == self.framebuffer_key {
            return false;
        }

        let viewport = Viewport::new(width, height);
        let mut frame = self.gpu.begin_frame(None, self.frame_index);
        self.renderer.resize(&mut frame, &viewport, &self.config);
        frame.finish();

        tracing::debug!("Rebuilt framebuffers for {:?}", key);
        self.framebuffer_key = key;
        true
    }

    pub fn config(&self) -> &FluidConfig {
        &self.config
    }

    /// Merge a partial override record (SCREAMING_SNAKE_CASE keys)
    ///
    /// Resolution changes take effect at the next resize check.
    pub fn update_config(&mut self, overrides: &serde_json::Value) -> Result<()> {
        let config = self.config.merged(overrides)?;
        self.set_config(config);
        Ok(())
    }

    pub fn set_config(&mut self, mut config: FluidConfig) {
        if !self.gpu.capabilities().linear_filtering {
            config.degrade_for_nearest_filtering();
        }
        self.config = config;
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.config.paused = paused;
    }

    // ------------------------------------------------------------------
    // Frame
    // ------------------------------------------------------------------

    /// Run one tick at host time `now_secs`
    pub fn frame(&mut self, now_secs: f64) -> Result<FrameOutcome> {
        let dt = self.clock.tick(now_secs);
        let rebuilt = self.handle_resize();
        self.frame_index += 1;

        // A surface error returns before any queued input is consumed.
        // An unavailable surface still advances the fields, it just shows nothing
        let (surface, presenter) = match self.target.acquire(&self.gpu)? {
            Some(acquired) => {
                let (surface, presenter) = acquired.split();
                (Some(surface), Some(presenter))
            }
            None => (None, None),
        };
        let has_surface = surface.is_some();

        let viewport = self.viewport();
        let splats = self.collect_splats();

        if self.config.colorful && self.color_timer.advance(dt, self.config.color_update_speed) {
            let rng = &mut self.rng;
            self.pointers.recolor(|| generate_color(rng));
        }

        let stepped = !self.config.paused;

        let mut frame = self.gpu.begin_frame(surface, self.frame_index);
        for splat in &splats {
            self.renderer.splat(&mut frame, splat, &viewport, &self.config);
        }
        if stepped {
            self.renderer.step(&mut frame, dt, &self.config);
        }
        let path = has_surface.then(|| {
            self.renderer.render(
                &mut frame,
                self.cards.iter().map(|(_, card)| card),
                &self.config,
                self.clock.elapsed(),
            )
        });
        frame.finish();

        if let Some(presenter) = presenter {
            presenter.present();
        }

        Ok(FrameOutcome {
            dt,
            rebuilt,
            splats: splats.len(),
            stepped,
            path,
        })
    }

    /// Splats to apply this frame under the current pause policy
    fn collect_splats(&mut self) -> Vec<Splat> {
        let pointer_splats = self.pointers.drain_splats(self.config.splat_force);

        if !splats_allowed(&self.config) {
            // Movement while paused is dropped; queued requests wait for resume
            return Vec::new();
        }

        let mut splats = Vec::new();
        for count in self.pending_bursts.drain(..) {
            splats.extend(random_burst(&mut self.rng, count));
        }
        splats.append(&mut self.pending_splats);
        splats.extend(pointer_splats);
        splats
    }

    // ------------------------------------------------------------------
    // Diagnostics
    // ------------------------------------------------------------------

    pub fn gpu(&self) -> &GpuContext {
        &self.gpu
    }

    /// Field textures created since startup
    pub fn allocation_count(&self) -> u64 {
        self.gpu.allocation_count()
    }

    /// Simulated seconds so far
    pub fn time(&self) -> f32 {
        self.clock.elapsed()
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_index
    }

    pub fn read_dye(&mut self) -> Result<FieldSnapshot> {
        let field = self.renderer.simulation().dye().read();
        Ok(self.gpu.read_field(field)?)
    }

    pub fn read_velocity(&mut self) -> Result<FieldSnapshot> {
        let field = self.renderer.simulation().velocity().read();
        Ok(self.gpu.read_field(field)?)
    }

    /// Last rendered image of an offscreen engine
    pub fn snapshot(&self) -> Result<SurfaceSnapshot> {
        let texture = self
            .target
            .offscreen_texture()
            .ok_or(EngineError::NotOffscreen)?;
        let pixels = self.gpu.read_texture_bytes(texture, 4)?;
        Ok(SurfaceSnapshot::new(texture.width(), texture.height(), pixels))
    }
}

/// Shared handle to an [`Engine`]
///
/// Clones refer to the same engine. After [`destroy`](Self::destroy) every
/// GPU resource is released; further calls are ignored and queries report
/// nothing.
#[derive(Clone)]
pub struct EngineHandle(Rc<RefCell<Option<Engine>>>);

impl EngineHandle {
    pub fn new(engine: Engine) -> Self {
        Self(Rc::new(RefCell::new(Some(engine))))
    }

    /// Run `f` against the live engine
    pub fn with<R>(&self, f: impl FnOnce(&mut Engine) -> R) -> Option<R> {
        let mut slot = self.0.borrow_mut();
        match slot.as_mut() {
            Some(engine) => Some(f(engine)),
            None => {
                tracing::trace!("Ignoring call on destroyed engine");
                None
            }
        }
    }

    pub fn add_card(&self, patch: CardPatch) -> Option<CardId> {
        self.with(|engine| engine.add_card(patch))
    }

    pub fn remove_card(&self, id: CardId) -> bool {
        self.with(|engine| engine.remove_card(id)).unwrap_or(false)
    }

    pub fn update_card(&self, id: CardId, patch: CardPatch) -> bool {
        self.with(|engine| engine.update_card(id, &patch))
            .unwrap_or(false)
    }

    pub fn clear_cards(&self) {
        self.with(Engine::clear_cards);
    }

    pub fn card_index(&self, id: CardId) -> Option<usize> {
        self.with(|engine| engine.card_index(id)).flatten()
    }

    pub fn handle_resize(&self) -> bool {
        self.with(Engine::handle_resize).unwrap_or(false)
    }

    pub fn set_surface_size(&self, width: f32, height: f32) {
        self.with(|engine| engine.set_surface_size(width, height));
    }

    pub fn set_pixel_ratio(&self, ratio: f32) {
        self.with(|engine| engine.set_pixel_ratio(ratio));
    }

    pub fn pointer_down(&self, x: f32, y: f32) {
        self.with(|engine| engine.pointer_down(x, y));
    }

    pub fn pointer_move(&self, x: f32, y: f32) {
        self.with(|engine| engine.pointer_move(x, y));
    }

    pub fn pointer_up(&self) {
        self.with(Engine::pointer_up);
    }

    pub fn touch_start(&self, id: u64, x: f32, y: f32) {
        self.with(|engine| engine.touch_start(id, x, y));
    }

    pub fn touch_move(&self, id: u64, x: f32, y: f32) {
        self.with(|engine| engine.touch_move(id, x, y));
    }

    pub fn touch_end(&self, id: u64) {
        self.with(|engine| engine.touch_end(id));
    }

    pub fn update_config(&self, overrides: &serde_json::Value) -> Result<()> {
        self.with(|engine| engine.update_config(overrides))
            .unwrap_or(Err(EngineError::Destroyed))
    }

    /// Copy of the current configuration
    pub fn config(&self) -> Option<FluidConfig> {
        self.with(|engine| engine.config().clone())
    }

    pub fn set_paused(&self, paused: bool) {
        self.with(|engine| engine.set_paused(paused));
    }

    pub fn splat(&self, x: f32, y: f32, dx: f32, dy: f32, color: Rgb) {
        self.with(|engine| engine.splat(x, y, dx, dy, color));
    }

    pub fn queue_burst(&self, count: u32) {
        self.with(|engine| engine.queue_burst(count));
    }

    pub fn frame(&self, now_secs: f64) -> Result<FrameOutcome> {
        self.with(|engine| engine.frame(now_secs))
            .unwrap_or(Err(EngineError::Destroyed))
    }

    /// Release the engine and its GPU resources; safe to call repeatedly
    pub fn destroy(&self) {
        if self.0.borrow_mut().take().is_some() {
            tracing::info!("Engine destroyed");
        }
    }

    pub fn is_destroyed(&self) -> bool {
        self.0.borrow().is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_framebuffer_key_tracks_resolutions() {
        let config = FluidConfig::default();
        let key = FramebufferKey::new(800, 600, &config);
        assert_eq!(key, FramebufferKey::new(800, 600, &config));
        assert_ne!(key, FramebufferKey::new(801, 600, &config));

        let finer = FluidConfig {
            dye_resolution: 2048,
            ..config.clone()
        };
        assert_ne!(key, FramebufferKey::new(800, 600, &finer));

        // Unrelated settings don't force a rebuild
        let tweaked = FluidConfig {
            curl: 5.0,
            shading: false,
            ..config
        };
        assert_eq!(key, FramebufferKey::new(800, 600, &tweaked));
    }

    #[test]
    fn test_color_timer_fires_once_per_period() {
        let mut timer = ColorTimer::default();
        let speed = 10.0;
        let dt = 1.0 / 60.0;

        let fired = (0..60).filter(|_| timer.advance(dt, speed)).count();
        // 60 frames at speed 10 accumulate 10 periods
        assert!((9..=10).contains(&fired), "fired {fired}");

        let mut idle = ColorTimer::default();
        assert!(!(0..600).any(|_| idle.advance(dt, 0.0)));
    }

    #[test]
    fn test_pause_policy() {
        let mut config = FluidConfig::default();
        assert!(splats_allowed(&config));

        config.paused = true;
        config.splat_while_paused = true;
        assert!(splats_allowed(&config));

        config.splat_while_paused = false;
        assert!(!splats_allowed(&config));
    }
}
