//! Stable-fluids solver
//!
//! Velocity is advanced on the simulation grid and transports dye on the
//! (usually finer) dye grid. One [`Simulation::step`] runs:
//!
//! 1. curl of velocity
//! 2. vorticity confinement
//! 3. divergence of velocity
//! 4. pressure decay (`pressure *= PRESSURE`)
//! 5. `PRESSURE_ITERATIONS` Jacobi iterations
//! 6. pressure gradient subtraction
//! 7. velocity self-advection
//! 8. dye advection
//!
//! Every pass that updates a double-buffered field draws into its write side
//! and swaps immediately, so the next pass always reads the latest state.

use fluidglass_core::{FluidConfig, GridSize, Splat, Viewport};

use crate::caps::FieldFormat;
use crate::context::GpuContext;
use crate::field::{DoubleField, Field, SamplerKind};
use crate::frame::{Blit, FrameEncoder, Target};
use crate::program::{Keywords, Program};
use crate::uniforms::{
    AdvectionUniforms, ClearUniforms, SplatUniforms, TexelUniforms, VorticityUniforms,
};

/// GPU state of the fluid
pub struct Simulation {
    dye: DoubleField,
    velocity: DoubleField,
    divergence: Field,
    curl: Field,
    pressure: DoubleField,
    keywords: Keywords,
}

struct Grids {
    sim: GridSize,
    dye: GridSize,
}

impl Grids {
    fn new(viewport: &Viewport, config: &FluidConfig) -> Self {
        Self {
            sim: viewport.grid(config.sim_resolution),
            dye: viewport.grid(config.dye_resolution),
        }
    }
}

impl Simulation {
    /// Allocate every field for `viewport`; contents start at zero
    pub fn new(gpu: &mut GpuContext, viewport: &Viewport, config: &FluidConfig) -> Self {
        let grids = Grids::new(viewport, config);
        let keywords =
            Keywords::NONE.set(Keywords::MANUAL_FILTERING, !gpu.capabilities().linear_filtering);

        tracing::debug!(
            "Simulation grid {}x{}, dye grid {}x{}",
            grids.sim.width,
            grids.sim.height,
            grids.dye.width,
            grids.dye.height
        );

        Self {
            dye: Self::create_dye(gpu, grids.dye),
            velocity: Self::create_velocity(gpu, grids.sim),
            divergence: gpu.create_field(
                "Divergence",
                grids.sim,
                FieldFormat::R,
                SamplerKind::NEAREST_CLAMP,
            ),
            curl: gpu.create_field("Curl", grids.sim, FieldFormat::R, SamplerKind::NEAREST_CLAMP),
            pressure: Self::create_pressure(gpu, grids.sim),
            keywords,
        }
    }

    fn create_dye(gpu: &mut GpuContext, size: GridSize) -> DoubleField {
        gpu.create_double_field("Dye", size, FieldFormat::Rgba, SamplerKind::LINEAR_CLAMP)
    }

    fn create_velocity(gpu: &mut GpuContext, size: GridSize) -> DoubleField {
        gpu.create_double_field("Velocity", size, FieldFormat::Rg, SamplerKind::LINEAR_CLAMP)
    }

    fn create_pressure(gpu: &mut GpuContext, size: GridSize) -> DoubleField {
        gpu.create_double_field("Pressure", size, FieldFormat::R, SamplerKind::NEAREST_CLAMP)
    }

    /// Reallocate for a new surface size or resolution
    ///
    /// Velocity and dye are resampled into the new grids; pressure,
    /// divergence and curl are recomputed every step and start over.
    pub fn resize(&mut self, frame: &mut FrameEncoder<'_>, viewport: &Viewport, config: &FluidConfig) {
        let grids = Grids::new(viewport, config);
        let resample_dye = grids.dye != self.dye.size();
        let resample_velocity = grids.sim != self.velocity.size();

        if resample_dye {
            let dye = Self::create_dye(frame.context(), grids.dye);
            self.dye = Self::resample(frame, &self.dye, dye);
        }

        if resample_velocity {
            let gpu = frame.context();
            let velocity = Self::create_velocity(gpu, grids.sim);
            self.divergence =
                gpu.create_field("Divergence", grids.sim, FieldFormat::R, SamplerKind::NEAREST_CLAMP);
            self.curl =
                gpu.create_field("Curl", grids.sim, FieldFormat::R, SamplerKind::NEAREST_CLAMP);
            self.pressure = Self::create_pressure(gpu, grids.sim);
            self.velocity = Self::resample(frame, &self.velocity, velocity);
        }

        // Resample blits cached bind groups for the fields just dropped
        if resample_dye || resample_velocity {
            frame.context().release_bind_groups();
        }
    }

    fn resample(frame: &mut FrameEncoder<'_>, old: &DoubleField, mut new: DoubleField) -> DoubleField {
        frame.blit(
            Blit::new(Program::Copy, Target::Field(new.write())).inputs(&[old.read()]),
            &TexelUniforms::new(new.texel_size()),
        );
        new.swap();
        new
    }

    /// Add a Gaussian impulse of velocity and dye
    pub fn splat(
        &mut self,
        frame: &mut FrameEncoder<'_>,
        splat: &Splat,
        viewport: &Viewport,
        config: &FluidConfig,
    ) {
        let aspect_ratio = viewport.aspect_ratio();
        let radius = viewport.correct_radius(config.splat_radius / 100.0);

        frame.blit(
            Blit::new(Program::Splat, Target::Field(self.velocity.write()))
                .inputs(&[self.velocity.read()]),
            &SplatUniforms {
                texel_size: self.velocity.texel_size(),
                point: [splat.x, splat.y],
                color: [splat.dx, splat.dy, 0.0, 1.0],
                aspect_ratio,
                radius,
                ..Default::default()
            },
        );
        self.velocity.swap();

        frame.blit(
            Blit::new(Program::Splat, Target::Field(self.dye.write())).inputs(&[self.dye.read()]),
            &SplatUniforms {
                texel_size: self.dye.texel_size(),
                point: [splat.x, splat.y],
                color: splat.color.to_array(1.0),
                aspect_ratio,
                radius,
                ..Default::default()
            },
        );
        self.dye.swap();
    }

    /// Advance the fluid by `dt` seconds
    pub fn step(&mut self, frame: &mut FrameEncoder<'_>, dt: f32, config: &FluidConfig) {
        self.confine_vorticity(frame, dt, config);
        self.project(frame, config);
        self.advect(frame, dt, config);
    }

    /// Curl plus the confinement force; velocity is clamped to the solver limit
    fn confine_vorticity(&mut self, frame: &mut FrameEncoder<'_>, dt: f32, config: &FluidConfig) {
        let texel_size = self.velocity.texel_size();

        frame.blit(
            Blit::new(Program::Curl, Target::Field(&self.curl)).inputs(&[self.velocity.read()]),
            &TexelUniforms::new(texel_size),
        );

        frame.blit(
            Blit::new(Program::Vorticity, Target::Field(self.velocity.write()))
                .inputs(&[self.velocity.read(), &self.curl]),
            &VorticityUniforms {
                texel_size,
                curl: config.curl,
                dt,
            },
        );
        self.velocity.swap();
    }

    fn compute_divergence(&mut self, frame: &mut FrameEncoder<'_>) {
        frame.blit(
            Blit::new(Program::Divergence, Target::Field(&self.divergence))
                .inputs(&[self.velocity.read()]),
            &TexelUniforms::new(self.velocity.texel_size()),
        );
    }

    /// Divergence, pressure solve and gradient subtraction
    fn project(&mut self, frame: &mut FrameEncoder<'_>, config: &FluidConfig) {
        let texel_size = self.velocity.texel_size();
        let texel = TexelUniforms::new(texel_size);

        self.compute_divergence(frame);

        frame.blit(
            Blit::new(Program::Clear, Target::Field(self.pressure.write()))
                .inputs(&[self.pressure.read()]),
            &ClearUniforms {
                texel_size,
                value: config.pressure,
                ..Default::default()
            },
        );
        self.pressure.swap();

        for _ in 0..config.pressure_iterations {
            frame.blit(
                Blit::new(Program::Pressure, Target::Field(self.pressure.write()))
                    .inputs(&[self.pressure.read(), &self.divergence]),
                &texel,
            );
            self.pressure.swap();
        }

        frame.blit(
            Blit::new(Program::GradientSubtract, Target::Field(self.velocity.write()))
                .inputs(&[self.pressure.read(), self.velocity.read()]),
            &texel,
        );
        self.velocity.swap();
    }

    fn advect(&mut self, frame: &mut FrameEncoder<'_>, dt: f32, config: &FluidConfig) {
        let texel_size = self.velocity.texel_size();

        frame.blit(
            Blit::new(Program::Advection, Target::Field(self.velocity.write()))
                .inputs(&[self.velocity.read(), self.velocity.read()])
                .keywords(self.keywords),
            &AdvectionUniforms {
                texel_size,
                dye_texel_size: texel_size,
                dt,
                dissipation: config.velocity_dissipation,
                ..Default::default()
            },
        );
        self.velocity.swap();

        frame.blit(
            Blit::new(Program::Advection, Target::Field(self.dye.write()))
                .inputs(&[self.velocity.read(), self.dye.read()])
                .keywords(self.keywords),
            &AdvectionUniforms {
                texel_size,
                dye_texel_size: self.dye.texel_size(),
                dt,
                dissipation: config.density_dissipation,
                ..Default::default()
            },
        );
        self.dye.swap();
    }

    pub fn dye(&self) -> &DoubleField {
        &self.dye
    }

    pub fn velocity(&self) -> &DoubleField {
        &self.velocity
    }

    pub fn pressure(&self) -> &DoubleField {
        &self.pressure
    }

    pub fn sim_size(&self) -> GridSize {
        self.velocity.size()
    }

    pub fn dye_size(&self) -> GridSize {
        self.dye.size()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fluidglass_core::Rgb;

    fn small_config() -> FluidConfig {
        FluidConfig {
            sim_resolution: 32,
            dye_resolution: 64,
            pressure_iterations: 4,
            ..FluidConfig::default()
        }
    }

    fn headless() -> GpuContext {
        pollster::block_on(GpuContext::headless()).unwrap()
    }

    #[test]
    #[ignore] // Requires GPU
    fn test_splat_falls_off_with_distance() {
        let mut gpu = headless();
        let viewport = Viewport::new(64, 64);
        let config = small_config();
        let mut sim = Simulation::new(&mut gpu, &viewport, &config);

        let mut frame = gpu.begin_frame(None, 1);
        sim.splat(
            &mut frame,
            &Splat::new(0.5, 0.5, 100.0, 0.0, Rgb::new(1.0, 0.0, 0.0)),
            &viewport,
            &config,
        );
        frame.finish();

        let dye = gpu.read_field(sim.dye().read()).unwrap();
        let size = sim.dye_size();
        assert_eq!(size, GridSize::new(64, 64));

        // exp(-d^2 / radius): the falloff length is sqrt(radius)
        let radius = viewport.correct_radius(config.splat_radius / 100.0);
        let reach = radius.sqrt();
        let row = size.height / 2;
        let v = (row as f32 + 0.5) / size.height as f32;

        let mut previous = f32::MAX;
        for x in size.width / 2..size.width {
            let u = (x as f32 + 0.5) / size.width as f32;
            let distance = ((u - 0.5).powi(2) + (v - 0.5).powi(2)).sqrt();
            let [red, green, blue, _] = dye.texel(x, row);

            let expected = (-distance * distance / radius).exp();
            assert!((red - expected).abs() < 5e-3, "texel {x}: {red} vs {expected}");
            assert_eq!((green, blue), (0.0, 0.0));

            if previous > 1e-3 {
                assert!(red < previous, "texel {x}: {red} after {previous}");
            }
            if distance > 3.0 * reach {
                assert!(red < 1e-3, "texel {x} at {distance}: {red}");
            }
            previous = red;
        }

        let velocity = gpu.read_field(sim.velocity().read()).unwrap();
        assert!(velocity.sample(0.5, 0.5)[0] > 50.0);
        assert!(velocity.sample(0.98, 0.98)[0].abs() < 1e-2);
    }

    #[test]
    #[ignore] // Requires GPU
    fn test_vorticity_clamps_velocity() {
        let mut gpu = headless();
        let viewport = Viewport::new(64, 64);
        let config = small_config();
        let mut sim = Simulation::new(&mut gpu, &viewport, &config);

        let mut frame = gpu.begin_frame(None, 1);
        sim.splat(
            &mut frame,
            &Splat::new(0.5, 0.5, 5000.0, -5000.0, Rgb::new(0.0, 0.0, 1.0)),
            &viewport,
            &config,
        );
        frame.finish();
        let before = gpu.read_field(sim.velocity().read()).unwrap();
        assert!(before.max_abs() > 3000.0);

        let mut frame = gpu.begin_frame(None, 2);
        sim.confine_vorticity(&mut frame, 1.0 / 60.0, &config);
        frame.finish();

        let after = gpu.read_field(sim.velocity().read()).unwrap();
        assert!(after.max_abs() <= 1000.0, "max {}", after.max_abs());
        assert!(after.max_abs() > 900.0);
    }

    #[test]
    #[ignore] // Requires GPU
    fn test_projection_reduces_divergence() {
        let mut gpu = headless();
        let viewport = Viewport::new(64, 64);
        let config = FluidConfig {
            pressure_iterations: 20,
            ..small_config()
        };
        let mut sim = Simulation::new(&mut gpu, &viewport, &config);

        let mut frame = gpu.begin_frame(None, 1);
        sim.splat(
            &mut frame,
            &Splat::new(0.5, 0.5, 1000.0, 0.0, Rgb::new(0.0, 0.0, 1.0)),
            &viewport,
            &config,
        );
        sim.compute_divergence(&mut frame);
        frame.finish();
        let before = gpu.read_field(&sim.divergence).unwrap().channel_norm_squared(0);
        assert!(before > 0.0);

        let mut frame = gpu.begin_frame(None, 2);
        sim.project(&mut frame, &config);
        sim.compute_divergence(&mut frame);
        frame.finish();
        let after = gpu.read_field(&sim.divergence).unwrap().channel_norm_squared(0);

        assert!(after < 0.5 * before, "divergence {before} -> {after}");
    }

    #[test]
    #[ignore] // Requires GPU
    fn test_step_reads_latest_writes() {
        let mut gpu = headless();
        let viewport = Viewport::new(48, 32);
        let config = small_config();
        let mut sim = Simulation::new(&mut gpu, &viewport, &config);

        for frame_index in 1..=3 {
            let mut frame = gpu.begin_frame(None, frame_index);
            sim.step(&mut frame, 1.0 / 60.0, &config);
            frame.finish();

            // Each step ends by swapping, so the read side holds this frame's write
            assert_eq!(sim.velocity().read().last_write(), frame_index);
            assert_eq!(sim.dye().read().last_write(), frame_index);
            assert_eq!(sim.pressure().read().last_write(), frame_index);
        }
    }

    #[test]
    #[ignore] // Requires GPU
    fn test_resize_keeps_dye() {
        let mut gpu = headless();
        let config = small_config();
        let viewport = Viewport::new(64, 64);
        let mut sim = Simulation::new(&mut gpu, &viewport, &config);

        let mut frame = gpu.begin_frame(None, 1);
        sim.splat(
            &mut frame,
            &Splat::new(0.5, 0.5, 0.0, 0.0, Rgb::new(0.0, 1.0, 0.0)),
            &viewport,
            &config,
        );
        let wide = Viewport::new(128, 64);
        sim.resize(&mut frame, &wide, &config);
        frame.finish();

        assert_eq!(sim.dye_size(), wide.grid(config.dye_resolution));
        let dye = gpu.read_field(sim.dye().read()).unwrap();
        assert!(dye.sample(0.5, 0.5)[1] > 0.1);
    }

    #[test]
    #[ignore] // Requires GPU
    fn test_resize_releases_bind_groups() {
        let mut gpu = headless();
        let config = small_config();
        let viewport = Viewport::new(64, 64);
        let mut sim = Simulation::new(&mut gpu, &viewport, &config);

        let mut frame = gpu.begin_frame(None, 1);
        sim.step(&mut frame, 1.0 / 60.0, &config);
        frame.finish();
        assert!(gpu.cached_bind_groups() > 0);

        let mut frame = gpu.begin_frame(None, 2);
        sim.resize(&mut frame, &Viewport::new(96, 64), &config);
        frame.finish();
        assert_eq!(gpu.cached_bind_groups(), 0);

        // Unchanged grids allocate nothing and keep the cache
        let mut frame = gpu.begin_frame(None, 3);
        sim.step(&mut frame, 1.0 / 60.0, &config);
        sim.resize(&mut frame, &Viewport::new(96, 64), &config);
        frame.finish();
        assert!(gpu.cached_bind_groups() > 0);
    }
}
