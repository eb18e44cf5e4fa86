//! Desktop runner
//!
//! Opens a winit window, drives the engine from redraw requests and maps
//! window input onto the engine's pointer hooks. Coordinates from winit are
//! already physical pixels, so the engine runs with a pixel ratio of 1.
//!
//! Keys: `Space` queues a random burst, `P` toggles pause.

use std::sync::Arc;
use std::time::Instant;

use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, KeyEvent, MouseButton, TouchPhase, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{Key, NamedKey};
use winit::window::{Window, WindowId};

use fluidglass_core::{initial_burst_size, CardPatch, FluidConfig};
use fluidglass_gpu::{GpuContext, GpuError};

use crate::engine::{Engine, EngineHandle};
use crate::error::{EngineError, Result};

/// Window and engine settings for [`run`]
#[derive(Clone, Debug)]
pub struct WindowedOptions {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub config: FluidConfig,
    /// Cards registered once the engine is up
    pub cards: Vec<CardPatch>,
}

impl Default for WindowedOptions {
    fn default() -> Self {
        Self {
            title: "fluidglass".to_string(),
            width: 1280,
            height: 720,
            config: FluidConfig::default(),
            cards: Vec::new(),
        }
    }
}

/// Run the desktop app until the window closes
pub fn run(options: WindowedOptions) -> Result<()> {
    let event_loop = EventLoop::new().map_err(|e| EngineError::Platform(e.to_string()))?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = FluidApp::new(options);
    event_loop
        .run_app(&mut app)
        .map_err(|e| EngineError::Platform(e.to_string()))?;

    match app.error.take() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

struct FluidApp {
    options: WindowedOptions,
    window: Option<Arc<Window>>,
    engine: Option<EngineHandle>,
    start: Instant,
    cursor: (f32, f32),
    error: Option<EngineError>,
}

impl FluidApp {
    fn new(options: WindowedOptions) -> Self {
        Self {
            options,
            window: None,
            engine: None,
            start: Instant::now(),
            cursor: (0.0, 0.0),
            error: None,
        }
    }

    fn init(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let attributes = Window::default_attributes()
            .with_title(self.options.title.clone())
            .with_inner_size(PhysicalSize::new(self.options.width, self.options.height));
        let window = Arc::new(
            event_loop
                .create_window(attributes)
                .map_err(|e| EngineError::Platform(e.to_string()))?,
        );

        let instance = GpuContext::create_instance();
        let surface = instance
            .create_surface(window.clone())
            .map_err(GpuError::from)?;

        let size = window.inner_size();
        let engine = pollster::block_on(Engine::with_surface(
            instance,
            surface,
            size.width,
            size.height,
            self.options.config.clone(),
        ))?;

        let handle = EngineHandle::new(engine);
        for card in &self.options.cards {
            handle.add_card(*card);
        }

        tracing::info!("fluidglass window initialized");
        window.request_redraw();
        self.window = Some(window);
        self.engine = Some(handle);
        Ok(())
    }

    fn handle_key(&self, engine: &EngineHandle, event: &KeyEvent) {
        if event.state != ElementState::Pressed || event.repeat {
            return;
        }
        match &event.logical_key {
            Key::Named(NamedKey::Space) => {
                engine.queue_burst(initial_burst_size(&mut rand::thread_rng()));
            }
            Key::Character(c) if c.eq_ignore_ascii_case("p") => {
                if let Some(config) = engine.config() {
                    tracing::info!("Paused: {}", !config.paused);
                    engine.set_paused(!config.paused);
                }
            }
            _ => {}
        }
    }
}

impl ApplicationHandler for FluidApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        if let Err(err) = self.init(event_loop) {
            tracing::error!("Failed to initialize fluidglass: {}", err);
            self.error = Some(err);
            event_loop.exit();
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        let Some(engine) = self.engine.clone() else {
            return;
        };

        match event {
            WindowEvent::CloseRequested => {
                engine.destroy();
                event_loop.exit();
            }

            WindowEvent::Resized(size) => {
                engine.set_surface_size(size.width as f32, size.height as f32);
                if let Some(window) = &self.window {
                    window.request_redraw();
                }
            }

            WindowEvent::CursorMoved { position, .. } => {
                self.cursor = (position.x as f32, position.y as f32);
                engine.pointer_move(self.cursor.0, self.cursor.1);
            }

            WindowEvent::MouseInput {
                state,
                button: MouseButton::Left,
                ..
            } => match state {
                ElementState::Pressed => engine.pointer_down(self.cursor.0, self.cursor.1),
                ElementState::Released => engine.pointer_up(),
            },

            WindowEvent::Touch(touch) => {
                let (x, y) = (touch.location.x as f32, touch.location.y as f32);
                match touch.phase {
                    TouchPhase::Started => engine.touch_start(touch.id, x, y),
                    TouchPhase::Moved => engine.touch_move(touch.id, x, y),
                    TouchPhase::Ended | TouchPhase::Cancelled => engine.touch_end(touch.id),
                }
            }

            WindowEvent::KeyboardInput { event, .. } => self.handle_key(&engine, &event),

            WindowEvent::RedrawRequested => {
                if let Err(err) = engine.frame(self.start.elapsed().as_secs_f64()) {
                    tracing::error!("Frame failed: {}", err);
                    engine.destroy();
                    self.error = Some(err);
                    event_loop.exit();
                    return;
                }
                if let Some(window) = &self.window {
                    window.request_redraw();
                }
            }

            _ => {}
        }
    }
}
