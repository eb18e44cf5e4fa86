//! Render-target format negotiation
//!
//! Fields need floating-point textures that can be both rendered to and
//! sampled. Each field class walks a priority list from the narrowest half
//! float format upwards and takes the first one the device supports:
//!
//! | class | candidates |
//! |-------|------------|
//! | R     | R16Float, Rg16Float, Rgba16Float, Rgba32Float |
//! | RG    | Rg16Float, Rgba16Float, Rgba32Float |
//! | RGBA  | Rgba16Float, Rgba32Float |
//!
//! Linear filtering is only used when every negotiated format is filterable;
//! otherwise all fields sample with nearest filtering and the advection pass
//! filters manually.
//!
//! Readback copies go through `Rgba32Float` when it is renderable and through
//! the RGBA field format otherwise; downlevel devices refuse full-float
//! render attachments.

use crate::error::{GpuError, Result};

/// Component layout of a field
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FieldFormat {
    /// Scalar fields: pressure, divergence, curl
    R,
    /// Vector fields: velocity, noise
    Rg,
    /// Colour fields: dye and the glass background
    Rgba,
}

impl FieldFormat {
    /// Formats to try, in priority order
    pub fn candidates(self) -> &'static [wgpu::TextureFormat] {
        use wgpu::TextureFormat::*;
        match self {
            FieldFormat::R => &[R16Float, Rg16Float, Rgba16Float, Rgba32Float],
            FieldFormat::Rg => &[Rg16Float, Rgba16Float, Rgba32Float],
            FieldFormat::Rgba => &[Rgba16Float, Rgba32Float],
        }
    }
}

/// What the device can do with one texture format
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FormatSupport {
    /// Usable as both render attachment and sampled texture
    pub renderable: bool,
    /// Supports linear filtering when sampled
    pub filterable: bool,
}

/// Negotiated field formats for a device
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Capabilities {
    pub r: wgpu::TextureFormat,
    pub rg: wgpu::TextureFormat,
    pub rgba: wgpu::TextureFormat,
    /// Render target used to read fields back to the CPU
    pub readback: wgpu::TextureFormat,
    /// Every negotiated format supports linear filtering
    pub linear_filtering: bool,
}

impl Capabilities {
    /// Pick formats using an arbitrary support probe
    pub fn negotiate(probe: impl Fn(wgpu::TextureFormat) -> FormatSupport) -> Result<Self> {
        let pick = |class: FieldFormat| {
            class
                .candidates()
                .iter()
                .copied()
                .map(|format| (format, probe(format)))
                .find(|(_, support)| support.renderable)
                .ok_or(GpuError::UnsupportedFormat(class))
        };

        // RGBA first: if it has no format neither do the narrower classes
        let (rgba, rgba_support) = pick(FieldFormat::Rgba)?;
        let (rg, rg_support) = pick(FieldFormat::Rg)?;
        let (r, r_support) = pick(FieldFormat::R)?;

        let readback = if probe(wgpu::TextureFormat::Rgba32Float).renderable {
            wgpu::TextureFormat::Rgba32Float
        } else {
            rgba
        };

        Ok(Self {
            r,
            rg,
            rgba,
            readback,
            linear_filtering: rgba_support.filterable
                && rg_support.filterable
                && r_support.filterable,
        })
    }

    /// Probe a real adapter/device pair
    ///
    /// Format features beyond the WebGPU guarantees are only trusted when the
    /// device was created with `TEXTURE_ADAPTER_SPECIFIC_FORMAT_FEATURES`.
    pub fn probe(adapter: &wgpu::Adapter, device_features: wgpu::Features) -> Result<Self> {
        let adapter_specific =
            device_features.contains(wgpu::Features::TEXTURE_ADAPTER_SPECIFIC_FORMAT_FEATURES);

        Self::negotiate(|format| {
            let reported = adapter.get_texture_format_features(format);
            let (usages, flags) = if adapter_specific {
                (reported.allowed_usages, reported.flags)
            } else {
                let guaranteed = format.guaranteed_format_features(device_features);
                (
                    reported.allowed_usages & guaranteed.allowed_usages,
                    reported.flags & guaranteed.flags,
                )
            };

            FormatSupport {
                renderable: usages.contains(
                    wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
                ),
                filterable: flags.contains(wgpu::TextureFormatFeatureFlags::FILTERABLE),
            }
        })
    }

    /// Texture format for a field class
    pub fn format(&self, class: FieldFormat) -> wgpu::TextureFormat {
        match class {
            FieldFormat::R => self.r,
            FieldFormat::Rg => self.rg,
            FieldFormat::Rgba => self.rgba,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wgpu::TextureFormat::*;

    fn support(renderable: bool, filterable: bool) -> FormatSupport {
        FormatSupport {
            renderable,
            filterable,
        }
    }

    #[test]
    fn test_prefers_narrow_half_floats() {
        let caps = Capabilities::negotiate(|_| support(true, true)).unwrap();
        assert_eq!(caps.r, R16Float);
        assert_eq!(caps.rg, Rg16Float);
        assert_eq!(caps.rgba, Rgba16Float);
        assert_eq!(caps.readback, Rgba32Float);
        assert!(caps.linear_filtering);
    }

    #[test]
    fn test_readback_falls_back_to_field_format() {
        // Downlevel GL: full floats sample but cannot be rendered to
        let caps = Capabilities::negotiate(|format| match format {
            Rgba32Float => support(false, false),
            _ => support(true, true),
        })
        .unwrap();
        assert_eq!(caps.rgba, Rgba16Float);
        assert_eq!(caps.readback, Rgba16Float);
    }

    #[test]
    fn test_falls_back_to_wider_formats() {
        let caps = Capabilities::negotiate(|format| match format {
            R16Float | Rg16Float => support(false, false),
            _ => support(true, true),
        })
        .unwrap();
        assert_eq!(caps.r, Rgba16Float);
        assert_eq!(caps.rg, Rgba16Float);
        assert_eq!(caps.rgba, Rgba16Float);
    }

    #[test]
    fn test_full_float_fallback_disables_filtering() {
        let caps = Capabilities::negotiate(|format| match format {
            Rgba32Float => support(true, false),
            _ => support(false, false),
        })
        .unwrap();
        assert_eq!(caps.format(FieldFormat::R), Rgba32Float);
        assert_eq!(caps.format(FieldFormat::Rgba), Rgba32Float);
        assert!(!caps.linear_filtering);
    }

    #[test]
    fn test_no_float_target_is_a_capability_error() {
        let err = Capabilities::negotiate(|_| support(false, false)).unwrap_err();
        assert!(matches!(err, GpuError::UnsupportedFormat(FieldFormat::Rgba)));
    }

    #[test]
    fn test_single_unfilterable_format_disables_filtering() {
        let caps = Capabilities::negotiate(|format| support(true, format != R16Float)).unwrap();
        assert_eq!(caps.r, R16Float);
        assert!(!caps.linear_filtering);
    }
}
