//! Browser host
//!
//! [`WebEngine`] wraps an [`EngineHandle`] for JavaScript. The canvas is
//! sized from its CSS box times `devicePixelRatio` every frame, and the
//! `requestAnimationFrame` chain stops once the engine is destroyed;
//! [`WebEngine::destroy`] also cancels the pending request and drops the
//! callback.
//!
//! ```js
//! const engine = await WebEngine.create("fluid", null);
//! const card = engine.add_card(0.5, 0.5, 0.3, 0.15, 0.02);
//! engine.start();
//! ```

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use slotmap::{Key, KeyData};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;

use fluidglass_core::{normalize_pixel_ratio, physical_size, CardId, CardPatch, FluidConfig, Rgb};
use fluidglass_gpu::{GpuContext, GpuError};

use crate::engine::{Engine, EngineHandle};
use crate::error::EngineError;

impl From<EngineError> for JsValue {
    fn from(err: EngineError) -> Self {
        JsValue::from_str(&err.to_string())
    }
}

fn platform_error(message: &str) -> EngineError {
    EngineError::Platform(message.to_string())
}

#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
    // A second module instance may already have installed the logger
    let _ = console_log::init_with_level(log::Level::Info);
}

fn window() -> Result<web_sys::Window, EngineError> {
    web_sys::window().ok_or_else(|| platform_error("no window"))
}

fn now_secs(window: &web_sys::Window) -> f64 {
    window
        .performance()
        .map(|performance| performance.now() / 1000.0)
        .unwrap_or(0.0)
}

fn card_id(id: u64) -> CardId {
    CardId::from(KeyData::from_ffi(id))
}

fn device_pixel_ratio(window: &web_sys::Window) -> f32 {
    normalize_pixel_ratio(window.device_pixel_ratio() as f32)
}

/// Match the canvas backing store to its CSS box and report the logical size
///
/// Uses the same rounding as the engine so the surface and canvas agree.
fn sync_canvas_size(canvas: &web_sys::HtmlCanvasElement, pixel_ratio: f32) -> (f32, f32) {
    let css_width = canvas.client_width().max(1) as f32;
    let css_height = canvas.client_height().max(1) as f32;
    let (width, height) = physical_size(css_width, css_height, pixel_ratio);
    if canvas.width() != width || canvas.height() != height {
        canvas.set_width(width);
        canvas.set_height(height);
    }
    (css_width, css_height)
}

type AnimationFrame = Rc<RefCell<Option<Closure<dyn FnMut()>>>>;

#[wasm_bindgen]
pub struct WebEngine {
    handle: EngineHandle,
    canvas: web_sys::HtmlCanvasElement,
    /// Running `requestAnimationFrame` callback; it holds a clone of this cell
    animation: AnimationFrame,
    /// Id of the outstanding frame request
    pending: Rc<Cell<Option<i32>>>,
}

#[wasm_bindgen]
impl WebEngine {
    /// Create an engine drawing into the canvas with id `canvas_id`
    ///
    /// `config_json` is an optional partial configuration record.
    pub async fn create(canvas_id: String, config_json: Option<String>) -> Result<WebEngine, JsValue> {
        let config = match config_json {
            Some(json) => FluidConfig::from_json_str(&json).map_err(EngineError::from)?,
            None => FluidConfig::default(),
        };

        let window = window()?;
        let canvas = window
            .document()
            .ok_or_else(|| platform_error("no document"))?
            .get_element_by_id(&canvas_id)
            .ok_or_else(|| platform_error("canvas not found"))?
            .dyn_into::<web_sys::HtmlCanvasElement>()
            .map_err(|_| platform_error("element is not a canvas"))?;

        let pixel_ratio = device_pixel_ratio(&window);
        let (css_width, css_height) = sync_canvas_size(&canvas, pixel_ratio);

        let instance = GpuContext::create_instance();
        let surface = instance
            .create_surface(wgpu::SurfaceTarget::Canvas(canvas.clone()))
            .map_err(|e| EngineError::from(GpuError::from(e)))?;

        let engine =
            Engine::with_surface(instance, surface, canvas.width(), canvas.height(), config).await?;
        let handle = EngineHandle::new(engine);
        handle.set_pixel_ratio(pixel_ratio);
        handle.set_surface_size(css_width, css_height);

        tracing::info!("fluidglass attached to #{}", canvas_id);
        Ok(WebEngine {
            handle,
            canvas,
            animation: Rc::new(RefCell::new(None)),
            pending: Rc::new(Cell::new(None)),
        })
    }

    /// Start the `requestAnimationFrame` loop
    pub fn start(&self) {
        if self.animation.borrow().is_some() || self.handle.is_destroyed() {
            return;
        }

        let handle = self.handle.clone();
        let canvas = self.canvas.clone();
        let next = self.animation.clone();
        let pending = self.pending.clone();

        *self.animation.borrow_mut() = Some(Closure::wrap(Box::new(move || {
            pending.set(None);
            if handle.is_destroyed() {
                tracing::debug!("Engine destroyed, stopping animation loop");
                return;
            }
            let Ok(window) = window() else {
                return;
            };

            let pixel_ratio = device_pixel_ratio(&window);
            let (css_width, css_height) = sync_canvas_size(&canvas, pixel_ratio);
            handle.set_pixel_ratio(pixel_ratio);
            handle.set_surface_size(css_width, css_height);

            if let Err(err) = handle.frame(now_secs(&window)) {
                tracing::error!("Frame failed: {}", err);
                handle.destroy();
                return;
            }

            if let Some(callback) = next.borrow().as_ref() {
                pending.set(request_animation_frame(&window, callback));
            }
        }) as Box<dyn FnMut()>));

        if let (Ok(window), Some(callback)) = (window(), self.animation.borrow().as_ref()) {
            self.pending.set(request_animation_frame(&window, callback));
        }
    }

    pub fn add_card(&self, x: f32, y: f32, width: f32, height: f32, corner_radius: f32) -> Option<u64> {
        let patch = CardPatch {
            x: Some(x),
            y: Some(y),
            width: Some(width),
            height: Some(height),
            corner_radius: Some(corner_radius),
        };
        self.handle.add_card(patch).map(|id| id.data().as_ffi())
    }

    pub fn remove_card(&self, id: u64) -> bool {
        self.handle.remove_card(card_id(id))
    }

    /// Update a card from a partial JSON record (`x`, `y`, `width`, `height`, `cornerRadius`)
    pub fn update_card(&self, id: u64, patch_json: &str) -> Result<bool, JsValue> {
        let patch: CardPatch = serde_json::from_str(patch_json)
            .map_err(|e| EngineError::from(fluidglass_core::ConfigError::from(e)))?;
        Ok(self.handle.update_card(card_id(id), patch))
    }

    pub fn clear_cards(&self) {
        self.handle.clear_cards();
    }

    pub fn card_index(&self, id: u64) -> Option<u32> {
        self.handle.card_index(card_id(id)).map(|index| index as u32)
    }

    pub fn handle_resize(&self) -> bool {
        if let Ok(window) = window() {
            let (css_width, css_height) = sync_canvas_size(&self.canvas, device_pixel_ratio(&window));
            self.handle.set_surface_size(css_width, css_height);
        }
        self.handle.handle_resize()
    }

    pub fn set_pixel_ratio(&self, ratio: f32) {
        self.handle.set_pixel_ratio(ratio);
    }

    pub fn pointer_down(&self, x: f32, y: f32) {
        self.handle.pointer_down(x, y);
    }

    pub fn pointer_move(&self, x: f32, y: f32) {
        self.handle.pointer_move(x, y);
    }

    pub fn pointer_up(&self) {
        self.handle.pointer_up();
    }

    pub fn touch_start(&self, id: u32, x: f32, y: f32) {
        self.handle.touch_start(id as u64, x, y);
    }

    pub fn touch_move(&self, id: u32, x: f32, y: f32) {
        self.handle.touch_move(id as u64, x, y);
    }

    pub fn touch_end(&self, id: u32) {
        self.handle.touch_end(id as u64);
    }

    /// Merge a partial JSON configuration record
    pub fn update_config(&self, overrides_json: &str) -> Result<(), JsValue> {
        let overrides: serde_json::Value = serde_json::from_str(overrides_json)
            .map_err(|e| EngineError::from(fluidglass_core::ConfigError::from(e)))?;
        Ok(self.handle.update_config(&overrides)?)
    }

    /// Current configuration as JSON
    pub fn config(&self) -> Option<String> {
        self.handle
            .config()
            .and_then(|config| serde_json::to_string(&config).ok())
    }

    #[allow(clippy::too_many_arguments)]
    pub fn splat(&self, x: f32, y: f32, dx: f32, dy: f32, r: f32, g: f32, b: f32) {
        self.handle.splat(x, y, dx, dy, Rgb::new(r, g, b));
    }

    pub fn queue_burst(&self, count: u32) {
        self.handle.queue_burst(count);
    }

    /// Release the engine and break the animation callback's reference cycle
    pub fn destroy(&self) {
        self.handle.destroy();
        if let (Some(id), Ok(window)) = (self.pending.take(), window()) {
            let _ = window.cancel_animation_frame(id);
        }
        // Called from JS, never from inside the callback, so dropping it is safe
        self.animation.borrow_mut().take();
    }

    pub fn is_destroyed(&self) -> bool {
        self.handle.is_destroyed()
    }
}

impl Drop for WebEngine {
    fn drop(&mut self) {
        self.destroy();
    }
}

fn request_animation_frame(window: &web_sys::Window, callback: &Closure<dyn FnMut()>) -> Option<i32> {
    window
        .request_animation_frame(callback.as_ref().unchecked_ref())
        .map_err(|err| tracing::error!("requestAnimationFrame failed: {:?}", err))
        .ok()
}
