//! Shader programs and the render pipeline cache
//!
//! Each [`Program`] is compiled into one shader module at startup. The WGSL is
//! run through naga first so a broken program is reported with its full
//! diagnostic and left unusable instead of tripping a device validation error
//! later. Pipelines are created on first use and cached per
//! (program, keywords, target format, blend mode).

use std::collections::HashMap;

use rustc_hash::FxHashMap;

use crate::error::{GpuError, Result};
use crate::shaders;

/// Every GPU program the engine draws with
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Program {
    Copy,
    Clear,
    Color,
    Splat,
    Advection,
    Divergence,
    Curl,
    Vorticity,
    Pressure,
    GradientSubtract,
    Display,
    Noise,
    GaussianBlur,
    GlassComposite,
}

impl Program {
    pub const ALL: [Program; 14] = [
        Program::Copy,
        Program::Clear,
        Program::Color,
        Program::Splat,
        Program::Advection,
        Program::Divergence,
        Program::Curl,
        Program::Vorticity,
        Program::Pressure,
        Program::GradientSubtract,
        Program::Display,
        Program::Noise,
        Program::GaussianBlur,
        Program::GlassComposite,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Program::Copy => "Copy",
            Program::Clear => "Clear",
            Program::Color => "Color",
            Program::Splat => "Splat",
            Program::Advection => "Advection",
            Program::Divergence => "Divergence",
            Program::Curl => "Curl",
            Program::Vorticity => "Vorticity",
            Program::Pressure => "Pressure",
            Program::GradientSubtract => "Gradient Subtract",
            Program::Display => "Display",
            Program::Noise => "Noise",
            Program::GaussianBlur => "Gaussian Blur",
            Program::GlassComposite => "Glass Composite",
        }
    }

    fn fragment_source(self) -> &'static str {
        match self {
            Program::Copy => shaders::COPY_SHADER,
            Program::Clear => shaders::CLEAR_SHADER,
            Program::Color => shaders::COLOR_SHADER,
            Program::Splat => shaders::SPLAT_SHADER,
            Program::Advection => shaders::ADVECTION_SHADER,
            Program::Divergence => shaders::DIVERGENCE_SHADER,
            Program::Curl => shaders::CURL_SHADER,
            Program::Vorticity => shaders::VORTICITY_SHADER,
            Program::Pressure => shaders::PRESSURE_SHADER,
            Program::GradientSubtract => shaders::GRADIENT_SUBTRACT_SHADER,
            Program::Display => shaders::DISPLAY_SHADER,
            Program::Noise => shaders::NOISE_SHADER,
            Program::GaussianBlur => shaders::GAUSSIAN_BLUR_SHADER,
            Program::GlassComposite => shaders::GLASS_COMPOSITE_SHADER,
        }
    }

    /// Full WGSL module source
    pub fn source(self) -> String {
        shaders::compose(self.fragment_source())
    }

    /// Number of texture units sampled by the fragment stage
    pub fn texture_units(self) -> usize {
        match self {
            Program::Color | Program::Noise => 0,
            Program::Copy
            | Program::Clear
            | Program::Splat
            | Program::Divergence
            | Program::Curl
            | Program::Display
            | Program::GaussianBlur => 1,
            Program::Advection
            | Program::Vorticity
            | Program::Pressure
            | Program::GradientSubtract
            | Program::GlassComposite => 2,
        }
    }

    /// Keywords this program declares as override constants
    pub fn keywords(self) -> Keywords {
        match self {
            Program::Advection => Keywords::MANUAL_FILTERING,
            Program::Display => Keywords::SHADING,
            _ => Keywords::NONE,
        }
    }
}

/// Set of boolean shader keywords
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Keywords(u8);

impl Keywords {
    pub const NONE: Keywords = Keywords(0);
    /// In-shader bilinear interpolation for advection
    pub const MANUAL_FILTERING: Keywords = Keywords(1 << 0);
    /// Relief shading of the dye display
    pub const SHADING: Keywords = Keywords(1 << 1);

    const NAMED: [(Keywords, &'static str); 2] = [
        (Keywords::MANUAL_FILTERING, "MANUAL_FILTERING"),
        (Keywords::SHADING, "SHADING"),
    ];

    pub fn contains(self, other: Keywords) -> bool {
        self.0 & other.0 == other.0
    }

    /// Add or remove `flag` depending on `enabled`
    pub fn set(self, flag: Keywords, enabled: bool) -> Keywords {
        if enabled {
            Keywords(self.0 | flag.0)
        } else {
            Keywords(self.0 & !flag.0)
        }
    }

    pub fn intersection(self, other: Keywords) -> Keywords {
        Keywords(self.0 & other.0)
    }

    /// Pipeline override constants for every keyword `declared` by a program
    pub fn constants(self, declared: Keywords) -> HashMap<String, f64> {
        Self::NAMED
            .iter()
            .filter(|(flag, _)| declared.contains(*flag))
            .map(|(flag, name)| {
                let value = if self.contains(*flag) { 1.0 } else { 0.0 };
                (name.to_string(), value)
            })
            .collect()
    }
}

/// How a draw combines with the target
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Blend {
    /// Overwrite the target
    #[default]
    Replace,
    /// Straight alpha: `src * a + dst * (1 - a)`
    Alpha,
    /// Premultiplied alpha: `src + dst * (1 - a)`
    Premultiplied,
}

impl Blend {
    pub fn state(self) -> Option<wgpu::BlendState> {
        match self {
            Blend::Replace => None,
            Blend::Alpha => Some(wgpu::BlendState::ALPHA_BLENDING),
            Blend::Premultiplied => Some(wgpu::BlendState::PREMULTIPLIED_ALPHA_BLENDING),
        }
    }
}

/// Cache key for a render pipeline
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PipelineKey {
    pub program: Program,
    pub keywords: Keywords,
    pub format: wgpu::TextureFormat,
    pub blend: Blend,
}

impl PipelineKey {
    /// Keywords a program doesn't declare are dropped so they don't split the cache
    pub fn new(
        program: Program,
        keywords: Keywords,
        format: wgpu::TextureFormat,
        blend: Blend,
    ) -> Self {
        Self {
            program,
            keywords: keywords.intersection(program.keywords()),
            format,
            blend,
        }
    }
}

/// Parse and validate a WGSL module, returning a printable diagnostic on failure
pub fn validate_wgsl(program: Program, source: &str) -> Result<naga::Module> {
    let module = naga::front::wgsl::parse_str(source).map_err(|err| GpuError::Shader {
        program: program.label(),
        message: err.emit_to_string(source),
    })?;

    naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::empty(),
    )
    .validate(&module)
    .map_err(|err| GpuError::Shader {
        program: program.label(),
        message: format!("{err:?}"),
    })?;

    Ok(module)
}

/// Vertex layout of the full-screen quad: clip position then uv
pub(crate) const QUAD_VERTEX_LAYOUT: wgpu::VertexBufferLayout<'static> = wgpu::VertexBufferLayout {
    array_stride: 16,
    step_mode: wgpu::VertexStepMode::Vertex,
    attributes: &[
        wgpu::VertexAttribute {
            format: wgpu::VertexFormat::Float32x2,
            offset: 0,
            shader_location: 0,
        },
        wgpu::VertexAttribute {
            format: wgpu::VertexFormat::Float32x2,
            offset: 8,
            shader_location: 1,
        },
    ],
};

/// Compiled shader modules plus lazily built pipelines
pub(crate) struct ProgramLibrary {
    /// `None` marks a program whose source failed validation
    modules: FxHashMap<Program, Option<wgpu::ShaderModule>>,
    pipelines: FxHashMap<PipelineKey, wgpu::RenderPipeline>,
}

impl ProgramLibrary {
    pub fn new(device: &wgpu::Device) -> Self {
        let mut modules = FxHashMap::default();

        for program in Program::ALL {
            let source = program.source();
            let module = match validate_wgsl(program, &source) {
                Ok(_) => Some(device.create_shader_module(wgpu::ShaderModuleDescriptor {
                    label: Some(program.label()),
                    source: wgpu::ShaderSource::Wgsl(source.into()),
                })),
                Err(err) => {
                    tracing::error!("{}", err);
                    None
                }
            };
            modules.insert(program, module);
        }

        tracing::debug!("Compiled {} shader programs", modules.len());

        Self {
            modules,
            pipelines: FxHashMap::default(),
        }
    }

    pub fn is_usable(&self, program: Program) -> bool {
        matches!(self.modules.get(&program), Some(Some(_)))
    }

    #[cfg(test)]
    pub fn mark_unusable(&mut self, program: Program) {
        self.modules.insert(program, None);
    }

    /// Build the pipeline for `key` if it isn't cached yet
    ///
    /// Returns false when the program is unusable.
    pub fn prepare(
        &mut self,
        device: &wgpu::Device,
        uniform_layout: &wgpu::BindGroupLayout,
        texture_layouts: &[wgpu::BindGroupLayout],
        key: PipelineKey,
    ) -> bool {
        if self.pipelines.contains_key(&key) {
            return true;
        }
        let Some(Some(module)) = self.modules.get(&key.program) else {
            return false;
        };

        let units = key.program.texture_units();
        let mut bind_group_layouts = vec![uniform_layout];
        if units > 0 {
            bind_group_layouts.push(&texture_layouts[units - 1]);
        }

        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(key.program.label()),
            bind_group_layouts: &bind_group_layouts,
            push_constant_ranges: &[],
        });

        let constants = key.keywords.constants(key.program.keywords());

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(key.program.label()),
            layout: Some(&layout),
            vertex: wgpu::VertexState {
                module,
                entry_point: Some("vs_main"),
                buffers: &[QUAD_VERTEX_LAYOUT],
                compilation_options: wgpu::PipelineCompilationOptions {
                    constants: &constants,
                    zero_initialize_workgroup_memory: true,
                },
            },
            fragment: Some(wgpu::FragmentState {
                module,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: key.format,
                    blend: key.blend.state(),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions {
                    constants: &constants,
                    zero_initialize_workgroup_memory: true,
                },
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        tracing::debug!(
            "Created pipeline {} {:?} -> {:?} ({:?})",
            key.program.label(),
            key.keywords,
            key.format,
            key.blend
        );
        self.pipelines.insert(key, pipeline);
        true
    }

    pub fn pipeline(&self, key: &PipelineKey) -> Option<&wgpu::RenderPipeline> {
        self.pipelines.get(key)
    }

    pub fn pipeline_count(&self) -> usize {
        self.pipelines.len()
    }
}
