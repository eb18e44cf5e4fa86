//! Presentable render targets
//!
//! The engine draws either into a window/canvas surface or into an offscreen
//! texture that can be read back (headless renders, tests).

use fluidglass_gpu::{choose_surface_format, surface_config, GpuContext, SurfaceTarget};

use crate::error::{EngineError, Result};

/// Format of offscreen targets
pub const OFFSCREEN_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

pub enum RenderTarget {
    Surface {
        surface: wgpu::Surface<'static>,
        config: wgpu::SurfaceConfiguration,
    },
    Offscreen {
        texture: wgpu::Texture,
    },
}

/// A target acquired for one frame
pub struct AcquiredFrame {
    target: SurfaceTarget,
    texture: Option<wgpu::SurfaceTexture>,
}

impl AcquiredFrame {
    /// Separate the drawable view from the handle that presents it
    pub fn split(self) -> (SurfaceTarget, Presenter) {
        (self.target, Presenter(self.texture))
    }
}

/// Presents an acquired surface texture once drawing is submitted
pub struct Presenter(Option<wgpu::SurfaceTexture>);

impl Presenter {
    /// Show the frame; a no-op for offscreen targets
    pub fn present(self) {
        if let Some(texture) = self.0 {
            texture.present();
        }
    }
}

impl RenderTarget {
    /// Configure `surface` for the adapter in `gpu`
    pub fn surface(
        gpu: &GpuContext,
        surface: wgpu::Surface<'static>,
        width: u32,
        height: u32,
    ) -> Result<Self> {
        let caps = surface.get_capabilities(gpu.adapter());
        tracing::debug!("Surface capabilities - formats: {:?}", caps.formats);

        let format = choose_surface_format(&caps)
            .ok_or_else(|| EngineError::Platform("surface reports no formats".to_string()))?;
        tracing::debug!("Selected surface format: {:?}", format);

        let config = surface_config(&caps, format, width, height);
        surface.configure(gpu.device(), &config);

        Ok(RenderTarget::Surface { surface, config })
    }

    pub fn offscreen(gpu: &GpuContext, width: u32, height: u32) -> Self {
        RenderTarget::Offscreen {
            texture: Self::create_offscreen_texture(gpu, width, height),
        }
    }

    fn create_offscreen_texture(gpu: &GpuContext, width: u32, height: u32) -> wgpu::Texture {
        gpu.device().create_texture(&wgpu::TextureDescriptor {
            label: Some("Offscreen Target"),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: OFFSCREEN_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        })
    }

    /// Currently configured size in physical pixels
    pub fn size(&self) -> (u32, u32) {
        match self {
            RenderTarget::Surface { config, .. } => (config.width, config.height),
            RenderTarget::Offscreen { texture } => (texture.width(), texture.height()),
        }
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        match self {
            RenderTarget::Surface { config, .. } => config.format,
            RenderTarget::Offscreen { .. } => OFFSCREEN_FORMAT,
        }
    }

    pub fn resize(&mut self, gpu: &GpuContext, width: u32, height: u32) {
        let (width, height) = (width.max(1), height.max(1));
        match self {
            RenderTarget::Surface { surface, config } => {
                config.width = width;
                config.height = height;
                surface.configure(gpu.device(), config);
            }
            RenderTarget::Offscreen { texture } => {
                *texture = Self::create_offscreen_texture(gpu, width, height);
            }
        }
    }

    /// Get the texture to draw this frame into
    ///
    /// Returns `None` when the surface is temporarily unavailable; a lost or
    /// outdated surface is reconfigured and the frame skipped.
    pub fn acquire(&mut self, gpu: &GpuContext) -> Result<Option<AcquiredFrame>> {
        let (width, height) = self.size();
        match self {
            RenderTarget::Surface { surface, config } => {
                let texture = match surface.get_current_texture() {
                    Ok(texture) => texture,
                    Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                        tracing::debug!("Surface lost or outdated, reconfiguring");
                        surface.configure(gpu.device(), config);
                        return Ok(None);
                    }
                    Err(wgpu::SurfaceError::Timeout) => {
                        tracing::warn!("Surface texture acquisition timed out");
                        return Ok(None);
                    }
                    Err(err) => return Err(err.into()),
                };
                let view = texture
                    .texture
                    .create_view(&wgpu::TextureViewDescriptor::default());
                Ok(Some(AcquiredFrame {
                    target: SurfaceTarget {
                        view,
                        format: config.format,
                        width,
                        height,
                    },
                    texture: Some(texture),
                }))
            }
            RenderTarget::Offscreen { texture } => Ok(Some(AcquiredFrame {
                target: SurfaceTarget {
                    view: texture.create_view(&wgpu::TextureViewDescriptor::default()),
                    format: OFFSCREEN_FORMAT,
                    width,
                    height,
                },
                texture: None,
            })),
        }
    }

    pub fn offscreen_texture(&self) -> Option<&wgpu::Texture> {
        match self {
            RenderTarget::Offscreen { texture } => Some(texture),
            RenderTarget::Surface { .. } => None,
        }
    }
}
