//! Uniform blocks shared with the WGSL programs
//!
//! Each struct must match the `Uniforms` declaration of its shader byte for
//! byte. All of them start with `texel_size` (read by the vertex stage) and are
//! padded to a multiple of 16 bytes.

use bytemuck::{Pod, Zeroable};

/// Uniforms for programs that only need the texel size
/// (copy, divergence, curl, pressure, gradient subtract, display)
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
pub struct TexelUniforms {
    pub texel_size: [f32; 2],
    pub _padding: [f32; 2],
}

impl TexelUniforms {
    pub fn new(texel_size: [f32; 2]) -> Self {
        Self {
            texel_size,
            _padding: [0.0; 2],
        }
    }
}

/// Constant scale of a field
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
pub struct ClearUniforms {
    pub texel_size: [f32; 2],
    pub value: f32,
    pub _padding: f32,
}

/// Solid colour fill
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
pub struct ColorUniforms {
    pub texel_size: [f32; 2],
    pub _padding: [f32; 2],
    pub color: [f32; 4],
}

/// Gaussian splat
///
/// Layout (48 bytes):
/// - texel_size: 8, point: 8
/// - color: 16
/// - aspect_ratio: 4, radius: 4, padding: 8
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
pub struct SplatUniforms {
    pub texel_size: [f32; 2],
    pub point: [f32; 2],
    pub color: [f32; 4],
    pub aspect_ratio: f32,
    pub radius: f32,
    pub _padding: [f32; 2],
}

/// Semi-Lagrangian advection
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
pub struct AdvectionUniforms {
    pub texel_size: [f32; 2],
    /// Texel size of the transported field, used by manual filtering
    pub dye_texel_size: [f32; 2],
    pub dt: f32,
    pub dissipation: f32,
    pub _padding: [f32; 2],
}

/// Vorticity confinement
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
pub struct VorticityUniforms {
    pub texel_size: [f32; 2],
    pub curl: f32,
    pub dt: f32,
}

/// Procedural noise
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
pub struct NoiseUniforms {
    pub texel_size: [f32; 2],
    pub time: f32,
    pub scale: f32,
    pub speed: f32,
    pub octaves: i32,
    pub _padding: [f32; 2],
}

/// One direction of the separable blur
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
pub struct BlurUniforms {
    pub texel_size: [f32; 2],
    /// (1, 0) for the horizontal pass, (0, 1) for the vertical pass
    pub direction: [f32; 2],
    /// Source texture size in texels
    pub resolution: [f32; 2],
    pub radius: f32,
    pub _padding: f32,
}

/// Liquid glass composite for one card
///
/// Layout (96 bytes):
/// - texel_size: 8, resolution: 8
/// - glass_rect: 16 (center.xy, full size.zw)
/// - color_tint: 16 (rgb, w unused)
/// - twelve scalars: 48
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
pub struct GlassUniforms {
    pub texel_size: [f32; 2],
    /// Surface size in pixels
    pub resolution: [f32; 2],
    pub glass_rect: [f32; 4],
    pub color_tint: [f32; 4],
    pub displacement_scale: f32,
    pub chromatic_aberration: f32,
    pub fresnel_strength: f32,
    pub edge_light_intensity: f32,
    pub specular_intensity: f32,
    pub specular_size: f32,
    pub brightness: f32,
    pub contrast: f32,
    pub saturation: f32,
    pub corner_radius: f32,
    pub time: f32,
    pub _padding: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sizes_match_wgsl_layouts() {
        assert_eq!(std::mem::size_of::<TexelUniforms>(), 16);
        assert_eq!(std::mem::size_of::<ClearUniforms>(), 16);
        assert_eq!(std::mem::size_of::<ColorUniforms>(), 32);
        assert_eq!(std::mem::size_of::<SplatUniforms>(), 48);
        assert_eq!(std::mem::size_of::<AdvectionUniforms>(), 32);
        assert_eq!(std::mem::size_of::<VorticityUniforms>(), 16);
        assert_eq!(std::mem::size_of::<NoiseUniforms>(), 32);
        assert_eq!(std::mem::size_of::<BlurUniforms>(), 32);
        assert_eq!(std::mem::size_of::<GlassUniforms>(), 96);
    }
}
