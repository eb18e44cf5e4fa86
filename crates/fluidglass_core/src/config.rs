//! Fluid and glass configuration
//!
//! `FluidConfig` is a flat record of every tunable the engine reads. All keys
//! are optional when deserializing; missing keys take their defaults, so a host
//! can pass a partial override record:
//!
//! ```toml
//! SIM_RESOLUTION = 256
//! CURL = 40.0
//! COLOR_TINT = { r = 0.9, g = 1.0, b = 1.1 }
//! ```
//!
//! Values are read through every frame; changing a field on the live config
//! takes effect on the next frame that reads it. Resolution keys take effect at
//! the next framebuffer rebuild.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::color::Rgb;
use crate::error::{ConfigError, Result};

/// Upper bound on noise octaves evaluated by the noise shader
pub const MAX_NOISE_OCTAVES: u32 = 6;

/// Dye resolution used when the device cannot linearly filter float textures
pub const DEGRADED_DYE_RESOLUTION: u32 = 512;

/// Simulation and glass-effect parameters
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "SCREAMING_SNAKE_CASE")]
pub struct FluidConfig {
    // Simulation
    /// Short-side cell count of the velocity/pressure grid
    pub sim_resolution: u32,
    /// Short-side texel count of the dye grid
    pub dye_resolution: u32,
    pub density_dissipation: f32,
    pub velocity_dissipation: f32,
    /// Decay applied to last frame's pressure before the Jacobi solve
    pub pressure: f32,
    pub pressure_iterations: u32,
    /// Vorticity confinement strength
    pub curl: f32,
    pub splat_radius: f32,
    pub splat_force: f32,

    // Display
    pub shading: bool,
    pub colorful: bool,
    /// Pointer colour changes per second when `colorful` is set
    pub color_update_speed: f32,
    pub paused: bool,
    /// Background colour in 0..=255 channel units
    pub back_color: Rgb,
    pub transparent: bool,

    // Interaction
    /// Pointer splats still land while `paused` is set
    pub splat_while_paused: bool,
    /// Seed the field with a random burst on start
    pub initial_splats: bool,

    // Glass
    pub glass_enabled: bool,
    pub glass_blur_radius: f32,
    pub displacement_scale: f32,
    pub noise_scale: f32,
    pub noise_octaves: u32,
    pub chromatic_aberration: f32,
    pub fresnel_strength: f32,
    pub edge_light_intensity: f32,
    pub specular_intensity: f32,
    pub specular_size: f32,
    pub brightness: f32,
    pub contrast: f32,
    pub saturation: f32,
    pub color_tint: Rgb,
    pub noise_resolution: u32,
    pub animate_noise: bool,
    pub noise_speed: f32,
}

impl Default for FluidConfig {
    fn default() -> Self {
        Self {
            sim_resolution: 128,
            dye_resolution: 1024,
            density_dissipation: 1.0,
            velocity_dissipation: 0.2,
            pressure: 0.8,
            pressure_iterations: 20,
            curl: 30.0,
            splat_radius: 0.25,
            splat_force: 6000.0,

            shading: true,
            colorful: true,
            color_update_speed: 10.0,
            paused: false,
            back_color: Rgb::BLACK,
            transparent: false,

            splat_while_paused: true,
            initial_splats: true,

            glass_enabled: true,
            glass_blur_radius: 8.0,
            displacement_scale: 0.08,
            noise_scale: 2.0,
            noise_octaves: 4,
            chromatic_aberration: 0.015,
            fresnel_strength: 0.4,
            edge_light_intensity: 0.5,
            specular_intensity: 0.4,
            specular_size: 0.2,
            brightness: 0.02,
            contrast: 1.05,
            saturation: 1.4,
            color_tint: Rgb::new(1.0, 1.0, 1.05),
            noise_resolution: 512,
            animate_noise: true,
            noise_speed: 0.05,
        }
    }
}

impl FluidConfig {
    /// Parse a (possibly partial) TOML override record
    pub fn from_toml_str(source: &str) -> Result<Self> {
        Ok(toml::from_str(source)?)
    }

    /// Parse a (possibly partial) JSON override record
    pub fn from_json_str(source: &str) -> Result<Self> {
        Ok(serde_json::from_str(source)?)
    }

    /// Load overrides from a `.toml` or `.json` file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Self::from_toml_str(&content),
            Some("json") => Self::from_json_str(&content),
            other => Err(ConfigError::UnsupportedFormat(
                other.unwrap_or("<none>").to_string(),
            )),
        }
    }

    /// Return a copy with the keys present in `overrides` replaced
    ///
    /// Keys absent from `overrides` keep their current value rather than
    /// falling back to defaults.
    pub fn merged(&self, overrides: &serde_json::Value) -> Result<Self> {
        let mut current = serde_json::to_value(self)?;
        if let (Some(target), Some(patch)) = (current.as_object_mut(), overrides.as_object()) {
            for (key, value) in patch {
                if !target.contains_key(key) {
                    tracing::warn!("Ignoring unknown config key {}", key);
                    continue;
                }
                target.insert(key.clone(), value.clone());
            }
        }
        Ok(serde_json::from_value(current)?)
    }

    /// Noise octave count as evaluated by the shader
    pub fn effective_noise_octaves(&self) -> u32 {
        self.noise_octaves.clamp(1, MAX_NOISE_OCTAVES)
    }

    /// Background colour normalised to `0..=1`
    pub fn back_color_normalized(&self) -> Rgb {
        self.back_color.scale(1.0 / 255.0)
    }

    /// Lower quality for devices without linear float filtering
    pub fn degrade_for_nearest_filtering(&mut self) {
        self.dye_resolution = self.dye_resolution.min(DEGRADED_DYE_RESOLUTION);
        self.shading = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = FluidConfig::default();
        assert_eq!(config.sim_resolution, 128);
        assert_eq!(config.dye_resolution, 1024);
        assert_eq!(config.pressure_iterations, 20);
        assert_eq!(config.noise_resolution, 512);
        assert!(config.glass_enabled);
        assert!(!config.paused);
        assert_eq!(config.color_tint, Rgb::new(1.0, 1.0, 1.05));
    }

    #[test]
    fn test_partial_toml_override() {
        let config = FluidConfig::from_toml_str(
            r#"
            SIM_RESOLUTION = 256
            PAUSED = true
            BACK_COLOR = { r = 10.0, g = 20.0, b = 30.0 }
            "#,
        )
        .unwrap();

        assert_eq!(config.sim_resolution, 256);
        assert!(config.paused);
        assert_eq!(config.back_color, Rgb::new(10.0, 20.0, 30.0));
        // Untouched keys keep defaults
        assert_eq!(config.curl, 30.0);
        assert_eq!(config.glass_blur_radius, 8.0);
    }

    #[test]
    fn test_partial_json_override() {
        let config = FluidConfig::from_json_str(r#"{"GLASS_ENABLED": false, "CURL": 5}"#).unwrap();
        assert!(!config.glass_enabled);
        assert_eq!(config.curl, 5.0);
        assert_eq!(config.splat_force, 6000.0);
    }

    #[test]
    fn test_merge_keeps_current_values() {
        let mut base = FluidConfig::default();
        base.curl = 12.0;

        let merged = base
            .merged(&serde_json::json!({ "SPLAT_RADIUS": 0.5 }))
            .unwrap();
        assert_eq!(merged.splat_radius, 0.5);
        assert_eq!(merged.curl, 12.0);
    }

    #[test]
    fn test_merge_ignores_unknown_keys() {
        let base = FluidConfig::default();
        let merged = base
            .merged(&serde_json::json!({ "BLOOM": true, "CURL": 3.0 }))
            .unwrap();
        assert_eq!(merged.curl, 3.0);
        assert_eq!(FluidConfig { curl: 3.0, ..base }, merged);
    }

    #[test]
    fn test_rejects_wrong_types() {
        assert!(FluidConfig::from_json_str(r#"{"PAUSED": "yes"}"#).is_err());
    }

    #[test]
    fn test_octave_clamp() {
        let mut config = FluidConfig::default();
        config.noise_octaves = 0;
        assert_eq!(config.effective_noise_octaves(), 1);
        config.noise_octaves = 12;
        assert_eq!(config.effective_noise_octaves(), MAX_NOISE_OCTAVES);
    }

    #[test]
    fn test_degrade() {
        let mut config = FluidConfig::default();
        config.degrade_for_nearest_filtering();
        assert_eq!(config.dye_resolution, DEGRADED_DYE_RESOLUTION);
        assert!(!config.shading);
    }
}
