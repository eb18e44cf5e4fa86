//! Splat impulses

use rand::Rng;

use crate::color::{generate_color, Rgb};

/// Colour boost applied to burst splats
const BURST_COLOR_BOOST: f32 = 10.0;

/// Velocity range of burst splats along each axis
const BURST_VELOCITY: f32 = 1000.0;

/// A Gaussian impulse injected into velocity and dye
///
/// `x`/`y` are normalised with `y` measured from the bottom; `dx`/`dy` is the
/// force vector written into velocity.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Splat {
    pub x: f32,
    pub y: f32,
    pub dx: f32,
    pub dy: f32,
    pub color: Rgb,
}

impl Splat {
    pub fn new(x: f32, y: f32, dx: f32, dy: f32, color: Rgb) -> Self {
        Self { x, y, dx, dy, color }
    }
}

/// Random splats scattered across the surface
pub fn random_burst<R: Rng + ?Sized>(rng: &mut R, count: u32) -> Vec<Splat> {
    (0..count)
        .map(|_| {
            let color = generate_color(rng).scale(BURST_COLOR_BOOST);
            Splat {
                x: rng.gen(),
                y: rng.gen(),
                dx: BURST_VELOCITY * (rng.gen::<f32>() - 0.5),
                dy: BURST_VELOCITY * (rng.gen::<f32>() - 0.5),
                color,
            }
        })
        .collect()
}

/// Size of the opening burst
pub fn initial_burst_size<R: Rng + ?Sized>(rng: &mut R) -> u32 {
    rng.gen_range(5..25)
}
