//! CPU copies of GPU images

use fluidglass_core::GridSize;

use crate::error::{GpuError, Result};

/// Widen an IEEE 754 binary16 value
fn half_to_f32(bits: u16) -> f32 {
    let sign = ((bits >> 15) as u32) << 31;
    let exponent = ((bits >> 10) & 0x1f) as u32;
    let mantissa = (bits & 0x3ff) as u32;

    match exponent {
        0 => {
            // Zero or subnormal: mantissa * 2^-24
            let magnitude = mantissa as f32 / (1 << 24) as f32;
            if sign == 0 {
                magnitude
            } else {
                -magnitude
            }
        }
        0x1f => f32::from_bits(sign | 0x7f80_0000 | (mantissa << 13)),
        _ => f32::from_bits(sign | ((exponent + 112) << 23) | (mantissa << 13)),
    }
}

/// Decode tightly packed RGBA texels of `format` into `f32` channels
pub(crate) fn decode_rgba(format: wgpu::TextureFormat, bytes: &[u8]) -> Result<Vec<f32>> {
    match format {
        wgpu::TextureFormat::Rgba32Float => Ok(bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect()),
        wgpu::TextureFormat::Rgba16Float => Ok(bytes
            .chunks_exact(2)
            .map(|c| half_to_f32(u16::from_le_bytes([c[0], c[1]])))
            .collect()),
        other => Err(GpuError::Readback(format!(
            "cannot decode {:?} texels",
            other
        ))),
    }
}

/// RGBA float texels of a field, first memory row first
#[derive(Clone, Debug, PartialEq)]
pub struct FieldSnapshot {
    size: GridSize,
    texels: Vec<f32>,
}

impl FieldSnapshot {
    pub(crate) fn new(size: GridSize, texels: Vec<f32>) -> Self {
        Self { size, texels }
    }

    pub fn size(&self) -> GridSize {
        self.size
    }

    /// Texel at grid cell `(x, y)`
    pub fn texel(&self, x: u32, y: u32) -> [f32; 4] {
        let x = x.min(self.size.width - 1) as usize;
        let y = y.min(self.size.height - 1) as usize;
        let i = (y * self.size.width as usize + x) * 4;
        [
            self.texels[i],
            self.texels[i + 1],
            self.texels[i + 2],
            self.texels[i + 3],
        ]
    }

    /// Nearest texel at normalised field coordinates
    pub fn sample(&self, u: f32, v: f32) -> [f32; 4] {
        let x = (u.clamp(0.0, 1.0) * self.size.width as f32).floor() as u32;
        let y = (v.clamp(0.0, 1.0) * self.size.height as f32).floor() as u32;
        self.texel(x, y)
    }

    /// Largest absolute value of any channel
    pub fn max_abs(&self) -> f32 {
        self.texels.iter().fold(0.0, |m, t| m.max(t.abs()))
    }

    /// Largest magnitude of the first `channels` components over all texels
    pub fn max_magnitude(&self, channels: usize) -> f32 {
        self.texels
            .chunks_exact(4)
            .map(|t| t[..channels].iter().map(|c| c * c).sum::<f32>().sqrt())
            .fold(0.0, f32::max)
    }

    /// Sum of squares of one channel over all texels
    pub fn channel_norm_squared(&self, channel: usize) -> f32 {
        self.texels
            .chunks_exact(4)
            .map(|t| t[channel] * t[channel])
            .sum()
    }
}

/// 8-bit RGBA pixels of a rendered surface, top row first
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SurfaceSnapshot {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl SurfaceSnapshot {
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        Self {
            width,
            height,
            pixels,
        }
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let x = x.min(self.width - 1) as usize;
        let y = y.min(self.height - 1) as usize;
        let i = (y * self.width as usize + x) * 4;
        [
            self.pixels[i],
            self.pixels[i + 1],
            self.pixels[i + 2],
            self.pixels[i + 3],
        ]
    }

    /// Pixel at normalised surface coordinates, `v` measured from the bottom
    pub fn sample(&self, u: f32, v: f32) -> [u8; 4] {
        let x = (u.clamp(0.0, 1.0) * self.width as f32).floor() as u32;
        let row = (v.clamp(0.0, 1.0) * self.height as f32).floor() as u32;
        self.pixel(x, (self.height - 1).saturating_sub(row))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_sample_uses_memory_rows() {
        let mut texels = vec![0.0; 2 * 2 * 4];
        // Cell (1, 0): second column of the first row
        texels[4..8].copy_from_slice(&[1.0, 2.0, 3.0, 4.0]);
        let snapshot = FieldSnapshot::new(GridSize::new(2, 2), texels);

        assert_eq!(snapshot.sample(0.75, 0.25), [1.0, 2.0, 3.0, 4.0]);
        assert_eq!(snapshot.sample(0.25, 0.75), [0.0; 4]);
        assert_eq!(snapshot.sample(1.0, 0.0), [1.0, 2.0, 3.0, 4.0]);
        assert_eq!(snapshot.max_abs(), 4.0);
        assert_eq!(snapshot.max_magnitude(2), 5.0f32.sqrt());
        assert_eq!(snapshot.channel_norm_squared(2), 9.0);
    }

    #[test]
    fn test_decode_full_floats() {
        let bytes: Vec<u8> = [1.5f32, -2.0, 0.0, 1.0]
            .iter()
            .flat_map(|v| v.to_le_bytes())
            .collect();
        let texels = decode_rgba(wgpu::TextureFormat::Rgba32Float, &bytes).unwrap();
        assert_eq!(texels, vec![1.5, -2.0, 0.0, 1.0]);
    }

    #[test]
    fn test_decode_half_floats() {
        // 1.0, -2.0, 1000.0, 0.5 as IEEE half floats
        let bytes = [0x00, 0x3c, 0x00, 0xc0, 0xd0, 0x63, 0x00, 0x38];
        let texels = decode_rgba(wgpu::TextureFormat::Rgba16Float, &bytes).unwrap();
        assert_eq!(texels, vec![1.0, -2.0, 1000.0, 0.5]);
    }

    #[test]
    fn test_half_edge_values() {
        assert_eq!(half_to_f32(0x0000), 0.0);
        assert!(half_to_f32(0x8000).is_sign_negative());
        // Smallest subnormal and largest finite value
        assert_eq!(half_to_f32(0x0001), 2.0f32.powi(-24));
        assert_eq!(half_to_f32(0x7bff), 65504.0);
        assert_eq!(half_to_f32(0x7c00), f32::INFINITY);
        assert_eq!(half_to_f32(0xfc00), f32::NEG_INFINITY);
        assert!(half_to_f32(0x7e00).is_nan());
    }

    #[test]
    fn test_decode_rejects_unknown_formats() {
        let err = decode_rgba(wgpu::TextureFormat::Rgba8Unorm, &[0; 4]).unwrap_err();
        assert!(matches!(err, GpuError::Readback(_)));
    }

    #[test]
    fn test_surface_sample_is_bottom_up() {
        let mut pixels = vec![0u8; 2 * 4];
        // Top row red, bottom row green
        pixels[0..4].copy_from_slice(&[255, 0, 0, 255]);
        pixels[4..8].copy_from_slice(&[0, 255, 0, 255]);
        let snapshot = SurfaceSnapshot::new(1, 2, pixels);

        assert_eq!(snapshot.sample(0.5, 0.9), [255, 0, 0, 255]);
        assert_eq!(snapshot.sample(0.5, 0.1), [0, 255, 0, 255]);
    }
}
