//! Surface size and aspect-ratio helpers
//!
//! Everything that maps between surface pixels, normalised coordinates and
//! grid resolutions goes through [`Viewport`] so the simulation, the splat
//! shader and the pointer tracker agree on the same aspect conventions.

/// Rendering surface size in physical pixels
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
        }
    }

    /// Width over height
    pub fn aspect_ratio(&self) -> f32 {
        self.width as f32 / self.height as f32
    }

    /// Grid size for a field class whose short side has `resolution` cells
    ///
    /// The long side is stretched by the surface aspect so grid cells stay
    /// square on screen.
    pub fn grid(&self, resolution: u32) -> GridSize {
        let mut aspect = self.aspect_ratio();
        if aspect < 1.0 {
            aspect = 1.0 / aspect;
        }

        let min = (resolution as f32).round().max(1.0) as u32;
        let max = (resolution as f32 * aspect).round().max(1.0) as u32;

        if self.width > self.height {
            GridSize::new(max, min)
        } else {
            GridSize::new(min, max)
        }
    }

    /// Surface pixel to normalised coordinates, `y` measured from the bottom
    pub fn normalize(&self, x: f32, y: f32) -> [f32; 2] {
        [x / self.width as f32, 1.0 - y / self.height as f32]
    }

    /// Correct a normalised pointer delta so equal screen distances give
    /// equal force on both axes
    pub fn correct_delta(&self, dx: f32, dy: f32) -> [f32; 2] {
        let aspect = self.aspect_ratio();
        let dx = if aspect < 1.0 { dx * aspect } else { dx };
        let dy = if aspect > 1.0 { dy / aspect } else { dy };
        [dx, dy]
    }

    /// Widen a splat radius on landscape surfaces so the spot stays round
    pub fn correct_radius(&self, radius: f32) -> f32 {
        let aspect = self.aspect_ratio();
        if aspect > 1.0 {
            radius * aspect
        } else {
            radius
        }
    }
}

/// Scale a logical (CSS-style) length to physical pixels
pub fn scale_by_pixel_ratio(value: f32, pixel_ratio: f32) -> f32 {
    (value * pixel_ratio).floor()
}

/// Device pixel ratio with non-finite or non-positive values replaced by 1
pub fn normalize_pixel_ratio(ratio: f32) -> f32 {
    if ratio.is_finite() && ratio > 0.0 {
        ratio
    } else {
        1.0
    }
}

/// Physical size of a logical box, never smaller than 1x1
pub fn physical_size(width: f32, height: f32, pixel_ratio: f32) -> (u32, u32) {
    (
        scale_by_pixel_ratio(width, pixel_ratio).max(1.0) as u32,
        scale_by_pixel_ratio(height, pixel_ratio).max(1.0) as u32,
    )
}

/// Texel grid dimensions of a field
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GridSize {
    pub width: u32,
    pub height: u32,
}

impl GridSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
        }
    }

    pub fn square(size: u32) -> Self {
        Self::new(size, size)
    }

    /// Size of one texel in normalised coordinates
    pub fn texel_size(&self) -> [f32; 2] {
        [1.0 / self.width as f32, 1.0 / self.height as f32]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_square_surface_grid() {
        let viewport = Viewport::new(256, 256);
        assert_eq!(viewport.grid(128), GridSize::new(128, 128));
    }

    #[test]
    fn test_landscape_grid_stretches_width() {
        let viewport = Viewport::new(1920, 1080);
        let grid = viewport.grid(128);
        assert_eq!(grid.height, 128);
        assert_eq!(grid.width, (128.0_f32 * 1920.0 / 1080.0).round() as u32);
    }

    #[test]
    fn test_portrait_grid_stretches_height() {
        let viewport = Viewport::new(500, 1000);
        assert_eq!(viewport.grid(100), GridSize::new(100, 200));
    }

    #[test]
    fn test_normalize_flips_y() {
        let viewport = Viewport::new(200, 100);
        assert_eq!(viewport.normalize(50.0, 25.0), [0.25, 0.75]);
        assert_eq!(viewport.normalize(0.0, 100.0), [0.0, 0.0]);
    }

    #[test]
    fn test_delta_correction() {
        let landscape = Viewport::new(200, 100);
        assert_eq!(landscape.correct_delta(0.1, 0.1), [0.1, 0.05]);

        let portrait = Viewport::new(100, 200);
        assert_eq!(portrait.correct_delta(0.1, 0.1), [0.05, 0.1]);
    }

    #[test]
    fn test_radius_correction() {
        assert_eq!(Viewport::new(200, 100).correct_radius(0.0025), 0.005);
        assert_eq!(Viewport::new(100, 200).correct_radius(0.0025), 0.0025);
    }

    #[test]
    fn test_zero_size_is_clamped() {
        let viewport = Viewport::new(0, 0);
        assert_eq!(viewport.aspect_ratio(), 1.0);
        assert_eq!(viewport.grid(0), GridSize::new(1, 1));
    }

    #[test]
    fn test_pixel_ratio_scaling() {
        assert_eq!(scale_by_pixel_ratio(100.0, 2.0), 200.0);
        assert_eq!(scale_by_pixel_ratio(10.3, 1.5), 15.0);
    }

    #[test]
    fn test_physical_size() {
        assert_eq!(physical_size(100.0, 50.0, 2.0), (200, 100));
        // 333 * 1.1 is 366.3 in f32
        assert_eq!(physical_size(333.0, 0.0, 1.1), (366, 1));
        assert_eq!(physical_size(0.4, 0.4, 1.0), (1, 1));
    }

    #[test]
    fn test_pixel_ratio_normalization() {
        assert_eq!(normalize_pixel_ratio(2.0), 2.0);
        assert_eq!(normalize_pixel_ratio(0.0), 1.0);
        assert_eq!(normalize_pixel_ratio(-1.5), 1.0);
        assert_eq!(normalize_pixel_ratio(f32::NAN), 1.0);
        assert_eq!(normalize_pixel_ratio(f32::INFINITY), 1.0);
    }
}
