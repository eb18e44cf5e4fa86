//! End-to-end engine tests
//!
//! Every test here renders through a real adapter.

use fluidglass_app::{Engine, EngineError, EngineHandle};
use fluidglass_core::{physical_size, CardPatch, FluidConfig, Rgb};
use fluidglass_gpu::RenderPath;

const FRAME: f64 = 1.0 / 60.0;

fn quiet_config() -> FluidConfig {
    FluidConfig {
        initial_splats: false,
        ..FluidConfig::default()
    }
}

fn headless(width: u32, height: u32, config: FluidConfig) -> Engine {
    pollster::block_on(Engine::headless(width, height, config)).unwrap()
}

#[test]
#[ignore] // Requires GPU
fn test_splat_colors_dye_at_center() {
    let mut engine = headless(256, 256, quiet_config());
    // The first tick only starts the clock
    assert_eq!(engine.frame(0.0).unwrap().dt, 0.0);

    engine.splat(0.5, 0.5, 0.0, 0.0, Rgb::new(1.0, 0.0, 0.0));
    let outcome = engine.frame(FRAME).unwrap();
    assert_eq!(outcome.splats, 1);
    assert!(outcome.stepped);
    assert!((outcome.dt - 1.0 / 60.0).abs() < 1e-6, "dt {}", outcome.dt);
    assert_eq!(engine.frame_count(), 2);

    let dye = engine.read_dye().unwrap();
    let [r, g, b, _] = dye.sample(0.5, 0.5);
    assert!(r > 0.0, "red {r}");
    assert!(r > g && r > b, "rgb {r} {g} {b}");
}

#[test]
#[ignore] // Requires GPU
fn test_card_changes_pixels_only_inside() {
    let mut engine = headless(256, 256, quiet_config());
    let id = engine.add_card(CardPatch {
        x: Some(0.5),
        y: Some(0.5),
        width: Some(0.2),
        height: Some(0.2),
        corner_radius: Some(0.02),
    });
    assert_eq!(engine.card_index(id), Some(0));
    assert_eq!(engine.card_count(), 1);

    let outcome = engine.frame(0.0).unwrap();
    assert_eq!(outcome.path, Some(RenderPath::Glass));

    let snapshot = engine.snapshot().unwrap();
    let inside = snapshot.sample(0.5, 0.5);
    let outside = snapshot.sample(0.1, 0.1);
    assert_ne!(inside, outside);
}

#[test]
#[ignore] // Requires GPU
fn test_direct_path_without_cards() {
    let mut engine = headless(128, 128, quiet_config());
    assert_eq!(engine.frame(0.0).unwrap().path, Some(RenderPath::Direct));

    engine.update_config(&serde_json::json!({ "GLASS_ENABLED": false })).unwrap();
    engine.add_card(CardPatch::position(0.5, 0.5));
    assert_eq!(engine.frame(FRAME).unwrap().path, Some(RenderPath::Direct));
}

#[test]
#[ignore] // Requires GPU
fn test_pause_freezes_dye() {
    let mut engine = headless(128, 128, quiet_config());
    engine.splat(0.5, 0.5, 100.0, 0.0, Rgb::new(0.0, 0.5, 0.0));
    engine.frame(0.0).unwrap();

    engine.set_paused(true);
    let before = engine.read_dye().unwrap();
    for i in 1..=10 {
        let outcome = engine.frame(i as f64 * FRAME).unwrap();
        assert!(!outcome.stepped);
    }
    assert_eq!(engine.read_dye().unwrap(), before);
}

#[test]
#[ignore] // Requires GPU
fn test_pointer_splats_while_paused() {
    let mut engine = headless(128, 128, quiet_config());
    engine.set_paused(true);
    engine.frame(0.0).unwrap();
    let before = engine.read_dye().unwrap();

    engine.pointer_down(64.0, 64.0);
    engine.pointer_move(80.0, 60.0);
    let outcome = engine.frame(FRAME).unwrap();

    assert_eq!(outcome.splats, 1);
    assert!(!outcome.stepped);
    assert_ne!(engine.read_dye().unwrap(), before);

    // The drag pushed the fluid even though the step was skipped
    let velocity = engine.read_velocity().unwrap();
    assert!(velocity.max_magnitude(2) > 0.0);
}

#[test]
#[ignore] // Requires GPU
fn test_pointer_ignored_while_paused_when_disabled() {
    let config = FluidConfig {
        splat_while_paused: false,
        ..quiet_config()
    };
    let mut engine = headless(128, 128, config);
    engine.set_paused(true);
    engine.frame(0.0).unwrap();
    let before = engine.read_dye().unwrap();

    engine.pointer_down(64.0, 64.0);
    engine.pointer_move(80.0, 60.0);
    engine.queue_burst(3);
    let outcome = engine.frame(FRAME).unwrap();
    assert_eq!(outcome.splats, 0);
    assert_eq!(engine.read_dye().unwrap(), before);

    // The queued burst lands once resumed; the paused movement does not
    engine.set_paused(false);
    let outcome = engine.frame(2.0 * FRAME).unwrap();
    assert_eq!(outcome.splats, 3);
}

#[test]
#[ignore] // Requires GPU
fn test_resize_is_idempotent() {
    let mut engine = headless(256, 256, quiet_config());
    engine.frame(0.0).unwrap();
    let allocations = engine.allocation_count();

    engine.set_surface_size(256.0, 256.0);
    assert!(!engine.handle_resize());
    for i in 1..5 {
        assert!(!engine.frame(i as f64 * FRAME).unwrap().rebuilt);
    }
    assert_eq!(engine.allocation_count(), allocations);

    engine.set_surface_size(320.0, 200.0);
    assert!(engine.handle_resize());
    assert_eq!(engine.surface_size(), (320, 200));
    assert!(engine.allocation_count() > allocations);

    let allocations = engine.allocation_count();
    assert!(!engine.handle_resize());
    assert_eq!(engine.allocation_count(), allocations);
}

#[test]
#[ignore] // Requires GPU
fn test_pixel_ratio_scales_surface() {
    let mut engine = headless(100, 100, quiet_config());
    engine.set_pixel_ratio(2.0);
    engine.set_surface_size(100.0, 50.0);
    assert!(engine.handle_resize());
    assert_eq!(engine.surface_size(), (200, 100));

    // Fractional ratios round the same way as the web canvas
    engine.set_pixel_ratio(1.1);
    engine.set_surface_size(333.0, 200.0);
    assert!(engine.handle_resize());
    assert_eq!(engine.surface_size(), physical_size(333.0, 200.0, 1.1));
}

#[test]
#[ignore] // Requires GPU
fn test_resolution_change_rebuilds() {
    let mut engine = headless(128, 128, quiet_config());
    engine.frame(0.0).unwrap();

    engine
        .update_config(&serde_json::json!({ "DYE_RESOLUTION": 256 }))
        .unwrap();
    assert!(engine.frame(FRAME).unwrap().rebuilt);
    assert!(!engine.frame(2.0 * FRAME).unwrap().rebuilt);
}

#[test]
#[ignore] // Requires GPU
fn test_destroy_is_idempotent() {
    let handle = EngineHandle::new(headless(64, 64, quiet_config()));
    let card = handle.add_card(CardPatch::default()).unwrap();
    handle.frame(0.0).unwrap();

    handle.destroy();
    handle.destroy();
    assert!(handle.is_destroyed());

    assert!(matches!(handle.frame(FRAME), Err(EngineError::Destroyed)));
    assert!(matches!(
        handle.update_config(&serde_json::json!({ "CURL": 1.0 })),
        Err(EngineError::Destroyed)
    ));
    assert!(handle.add_card(CardPatch::default()).is_none());
    assert!(!handle.remove_card(card));
    assert!(handle.config().is_none());
}
