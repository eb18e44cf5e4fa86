//! Liquid glass composite
//!
//! Cards refract a blurred copy of the fluid. Each frame:
//!
//! 1. refresh the tileable noise texture that drives refraction
//! 2. render the dye into a background texture decoupled from the solver's
//!    double buffers
//! 3. blur it with a separable Gaussian (horizontal, then vertical)
//! 4. draw the unblurred background to the surface
//! 5. draw every card, in registry order, over it

use fluidglass_core::{FluidConfig, GlassCard, GridSize};

use crate::caps::FieldFormat;
use crate::context::GpuContext;
use crate::display;
use crate::field::{Field, SamplerKind};
use crate::frame::{Blit, FrameEncoder, Target};
use crate::program::{Blend, Program};
use crate::uniforms::{BlurUniforms, GlassUniforms, NoiseUniforms, TexelUniforms};

/// Intermediate textures of the glass path
pub struct GlassRenderer {
    noise: Field,
    background: Field,
    blur_h: Field,
    blurred: Field,
}

impl GlassRenderer {
    pub fn new(gpu: &mut GpuContext, dye_size: GridSize, noise_resolution: u32) -> Self {
        Self {
            noise: Self::create_noise(gpu, noise_resolution),
            background: Self::create_target(gpu, "Glass Background", dye_size),
            blur_h: Self::create_target(gpu, "Glass Blur H", dye_size),
            blurred: Self::create_target(gpu, "Glass Blurred", dye_size),
        }
    }

    fn create_noise(gpu: &mut GpuContext, resolution: u32) -> Field {
        gpu.create_field(
            "Glass Noise",
            GridSize::square(resolution),
            FieldFormat::Rg,
            SamplerKind::LINEAR_REPEAT,
        )
    }

    fn create_target(gpu: &mut GpuContext, label: &'static str, size: GridSize) -> Field {
        gpu.create_field(label, size, FieldFormat::Rgba, SamplerKind::LINEAR_CLAMP)
    }

    /// Reallocate textures whose size changed
    pub fn resize(&mut self, gpu: &mut GpuContext, dye_size: GridSize, noise_resolution: u32) {
        if self.noise.size() != GridSize::square(noise_resolution) {
            self.noise = Self::create_noise(gpu, noise_resolution);
        }
        if self.background.size() != dye_size {
            self.background = Self::create_target(gpu, "Glass Background", dye_size);
            self.blur_h = Self::create_target(gpu, "Glass Blur H", dye_size);
            self.blurred = Self::create_target(gpu, "Glass Blurred", dye_size);
        }
    }

    pub fn noise(&self) -> &Field {
        &self.noise
    }

    pub fn background(&self) -> &Field {
        &self.background
    }

    pub fn blurred(&self) -> &Field {
        &self.blurred
    }

    /// Run the whole glass path and composite `cards` onto the surface
    pub fn render<'c>(
        &self,
        frame: &mut FrameEncoder<'_>,
        dye: &Field,
        cards: impl IntoIterator<Item = &'c GlassCard>,
        config: &FluidConfig,
        time: f32,
    ) {
        self.prepare(frame, dye, config, time);

        let Some((width, height)) = frame.surface_size() else {
            return;
        };

        display::draw_backdrop(frame, config);
        frame.blit(
            Blit::new(Program::Copy, Target::Surface)
                .inputs(&[&self.background])
                .blend(Blend::Premultiplied),
            &TexelUniforms::new(self.background.texel_size()),
        );

        let tint = config.color_tint.to_array(1.0);
        for card in cards {
            frame.blit(
                Blit::new(Program::GlassComposite, Target::Surface)
                    .inputs(&[&self.blurred, &self.noise])
                    .blend(Blend::Alpha),
                &GlassUniforms {
                    texel_size: self.blurred.texel_size(),
                    resolution: [width as f32, height as f32],
                    glass_rect: card.rect(),
                    color_tint: tint,
                    displacement_scale: config.displacement_scale,
                    chromatic_aberration: config.chromatic_aberration,
                    fresnel_strength: config.fresnel_strength,
                    edge_light_intensity: config.edge_light_intensity,
                    specular_intensity: config.specular_intensity,
                    specular_size: config.specular_size,
                    brightness: config.brightness,
                    contrast: config.contrast,
                    saturation: config.saturation,
                    corner_radius: card.corner_radius,
                    time,
                    ..Default::default()
                },
            );
        }
    }

    /// Noise, background snapshot and blur; everything before the surface
    pub fn prepare(&self, frame: &mut FrameEncoder<'_>, dye: &Field, config: &FluidConfig, time: f32) {
        frame.blit(
            Blit::new(Program::Noise, Target::Field(&self.noise)),
            &NoiseUniforms {
                texel_size: self.noise.texel_size(),
                time: if config.animate_noise { time } else { 0.0 },
                scale: config.noise_scale,
                speed: config.noise_speed,
                octaves: config.effective_noise_octaves() as i32,
                ..Default::default()
            },
        );

        display::draw_dye(
            frame,
            dye,
            Target::Field(&self.background),
            Blend::Replace,
            config,
        );

        let size = self.background.size();
        let resolution = [size.width as f32, size.height as f32];
        for (source, target, direction) in [
            (&self.background, &self.blur_h, [1.0, 0.0]),
            (&self.blur_h, &self.blurred, [0.0, 1.0]),
        ] {
            frame.blit(
                Blit::new(Program::GaussianBlur, Target::Field(target)).inputs(&[source]),
                &BlurUniforms {
                    texel_size: source.texel_size(),
                    direction,
                    resolution,
                    radius: config.glass_blur_radius,
                    ..Default::default()
                },
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::SurfaceTarget;
    use crate::readback::SurfaceSnapshot;
    use fluidglass_core::{Rgb, Splat, Viewport};

    use crate::simulation::Simulation;

    #[test]
    #[ignore] // Requires GPU
    fn test_blur_spreads_dye() {
        let mut gpu = pollster::block_on(GpuContext::headless()).unwrap();
        let viewport = Viewport::new(64, 64);
        let config = FluidConfig {
            sim_resolution: 32,
            dye_resolution: 64,
            glass_blur_radius: 4.0,
            ..FluidConfig::default()
        };
        let mut sim = Simulation::new(&mut gpu, &viewport, &config);
        let glass = GlassRenderer::new(&mut gpu, sim.dye_size(), 64);

        let mut frame = gpu.begin_frame(None, 1);
        sim.splat(
            &mut frame,
            &Splat::new(0.5, 0.5, 0.0, 0.0, Rgb::new(1.0, 1.0, 1.0)),
            &viewport,
            &config,
        );
        glass.prepare(&mut frame, sim.dye().read(), &config, 0.0);
        frame.finish();

        let background = gpu.read_field(glass.background()).unwrap();
        let blurred = gpu.read_field(glass.blurred()).unwrap();
        // Peak drops and energy spreads outward
        assert!(blurred.sample(0.5, 0.5)[0] < background.sample(0.5, 0.5)[0]);
        assert!(blurred.sample(0.5, 0.62)[0] > background.sample(0.5, 0.62)[0]);
    }

    #[test]
    #[ignore] // Requires GPU
    fn test_card_draws_only_inside_its_rect() {
        let mut gpu = pollster::block_on(GpuContext::headless()).unwrap();
        let viewport = Viewport::new(64, 64);
        let config = FluidConfig {
            sim_resolution: 32,
            dye_resolution: 64,
            back_color: Rgb::new(0.0, 0.0, 0.0),
            brightness: 0.5,
            ..FluidConfig::default()
        };
        let sim = Simulation::new(&mut gpu, &viewport, &config);
        let glass = GlassRenderer::new(&mut gpu, sim.dye_size(), 64);

        let texture = gpu.device().create_texture(&wgpu::TextureDescriptor {
            label: Some("Test Surface"),
            size: wgpu::Extent3d {
                width: 64,
                height: 64,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let surface = SurfaceTarget {
            view: texture.create_view(&wgpu::TextureViewDescriptor::default()),
            format: wgpu::TextureFormat::Rgba8Unorm,
            width: 64,
            height: 64,
        };

        let card = GlassCard {
            x: 0.25,
            y: 0.25,
            width: 0.3,
            height: 0.3,
            corner_radius: 0.0,
        };

        let mut frame = gpu.begin_frame(Some(surface), 1);
        glass.render(&mut frame, sim.dye().read(), [&card], &config, 0.0);
        frame.finish();

        let pixels = gpu.read_texture_bytes(&texture, 4).unwrap();
        let snapshot = SurfaceSnapshot::new(64, 64, pixels);
        assert!(snapshot.sample(0.25, 0.25)[0] > 64);
        assert_eq!(snapshot.sample(0.75, 0.75)[0], 0);
    }
}
