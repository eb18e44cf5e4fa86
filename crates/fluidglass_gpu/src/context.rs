//! Device ownership and shared draw resources
//!
//! [`GpuContext`] owns the wgpu device together with everything every pass
//! needs: bind group layouts, samplers, the two full-screen quads, the
//! uniform arena and the compiled program library.

use bytemuck::{Pod, Zeroable};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use wgpu::util::DeviceExt;

use fluidglass_core::GridSize;

use crate::caps::{Capabilities, FieldFormat};
use crate::error::{GpuError, Result};
use crate::field::{DoubleField, Field, SamplerKind};
use crate::frame::{Blit, FrameEncoder, SurfaceTarget, Target};
use crate::program::{PipelineKey, Program, ProgramLibrary};
use crate::readback::{decode_rgba, FieldSnapshot};
use crate::uniforms::TexelUniforms;

/// Bytes bound per draw from the uniform arena
pub(crate) const UNIFORM_BINDING_SIZE: u64 = 256;

/// Draws recorded before the arena is flushed and the encoder submitted
const UNIFORM_SLOTS: u32 = 256;

/// Texture units a program may sample
const MAX_TEXTURE_UNITS: usize = 2;

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
struct QuadVertex {
    position: [f32; 2],
    uv: [f32; 2],
}

/// Field quad: memory row 0 is uv.y = 0
const FIELD_QUAD: [QuadVertex; 4] = [
    QuadVertex { position: [-1.0, 1.0], uv: [0.0, 0.0] },
    QuadVertex { position: [-1.0, -1.0], uv: [0.0, 1.0] },
    QuadVertex { position: [1.0, -1.0], uv: [1.0, 1.0] },
    QuadVertex { position: [1.0, 1.0], uv: [1.0, 0.0] },
];

/// Surface quad: uv.y = 0 is the bottom edge of the screen
const SURFACE_QUAD: [QuadVertex; 4] = [
    QuadVertex { position: [-1.0, -1.0], uv: [0.0, 0.0] },
    QuadVertex { position: [-1.0, 1.0], uv: [0.0, 1.0] },
    QuadVertex { position: [1.0, 1.0], uv: [1.0, 1.0] },
    QuadVertex { position: [1.0, -1.0], uv: [1.0, 0.0] },
];

const QUAD_INDICES: [u16; 6] = [0, 1, 2, 0, 2, 3];

/// CPU staging for per-draw uniforms, bound with a dynamic offset
struct UniformArena {
    buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    staging: Vec<u8>,
    stride: u64,
    cursor: u32,
}

impl UniformArena {
    fn new(device: &wgpu::Device, layout: &wgpu::BindGroupLayout) -> Self {
        let alignment = device.limits().min_uniform_buffer_offset_alignment as u64;
        let stride = UNIFORM_BINDING_SIZE.max(alignment);
        let size = stride * UNIFORM_SLOTS as u64;

        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Uniform Arena"),
            size,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Uniform Arena Bind Group"),
            layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: &buffer,
                    offset: 0,
                    size: wgpu::BufferSize::new(UNIFORM_BINDING_SIZE),
                }),
            }],
        });

        Self {
            buffer,
            bind_group,
            staging: vec![0; size as usize],
            stride,
            cursor: 0,
        }
    }

    /// Stage `bytes` and return their dynamic offset, or `None` when full
    fn push(&mut self, bytes: &[u8]) -> Option<u32> {
        if self.cursor >= UNIFORM_SLOTS {
            return None;
        }
        let start = (self.cursor as u64 * self.stride) as usize;
        self.staging[start..start + bytes.len()].copy_from_slice(bytes);
        self.cursor += 1;
        Some(start as u32)
    }

    fn flush(&mut self, queue: &wgpu::Queue) {
        if self.cursor == 0 {
            return;
        }
        let used = (self.cursor as u64 * self.stride) as usize;
        queue.write_buffer(&self.buffer, 0, &self.staging[..used]);
        self.cursor = 0;
    }
}

type BindGroupKey = SmallVec<[(u64, SamplerKind); MAX_TEXTURE_UNITS]>;

/// GPU device plus the shared resources of every pass
pub struct GpuContext {
    instance: wgpu::Instance,
    adapter: wgpu::Adapter,
    device: wgpu::Device,
    queue: wgpu::Queue,
    caps: Capabilities,
    uniform_layout: wgpu::BindGroupLayout,
    /// Layout for `n` texture units at index `n - 1`
    texture_layouts: Vec<wgpu::BindGroupLayout>,
    samplers: FxHashMap<SamplerKind, wgpu::Sampler>,
    field_quad: wgpu::Buffer,
    surface_quad: wgpu::Buffer,
    quad_indices: wgpu::Buffer,
    uniforms: UniformArena,
    programs: ProgramLibrary,
    bind_groups: FxHashMap<BindGroupKey, wgpu::BindGroup>,
    next_field_id: u64,
    allocations: u64,
}

impl GpuContext {
    /// Get the preferred backend for the current platform
    pub fn preferred_backends() -> wgpu::Backends {
        #[cfg(target_os = "macos")]
        {
            wgpu::Backends::METAL
        }
        #[cfg(target_os = "windows")]
        {
            wgpu::Backends::DX12
        }
        #[cfg(target_os = "linux")]
        {
            wgpu::Backends::VULKAN | wgpu::Backends::GL
        }
        #[cfg(target_arch = "wasm32")]
        {
            wgpu::Backends::BROWSER_WEBGPU | wgpu::Backends::GL
        }
        #[cfg(not(any(
            target_os = "macos",
            target_os = "windows",
            target_os = "linux",
            target_arch = "wasm32"
        )))]
        {
            wgpu::Backends::PRIMARY
        }
    }

    pub fn create_instance() -> wgpu::Instance {
        wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: Self::preferred_backends(),
            ..Default::default()
        })
    }

    /// Create a context without a surface (tests, offscreen rendering)
    pub async fn headless() -> Result<Self> {
        Self::new(Self::create_instance(), None).await
    }

    /// Request an adapter and device able to present to `compatible_surface`
    pub async fn new(
        instance: wgpu::Instance,
        compatible_surface: Option<&wgpu::Surface<'_>>,
    ) -> Result<Self> {
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface,
                force_fallback_adapter: false,
            })
            .await
            .ok_or(GpuError::AdapterNotFound)?;

        let info = adapter.get_info();
        tracing::info!("Using adapter {} ({:?})", info.name, info.backend);

        let required_features = adapter.features()
            & (wgpu::Features::TEXTURE_ADAPTER_SPECIFIC_FORMAT_FEATURES
                | wgpu::Features::FLOAT32_FILTERABLE);

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Fluidglass Device"),
                    required_features,
                    required_limits: wgpu::Limits::downlevel_webgl2_defaults()
                        .using_resolution(adapter.limits()),
                    memory_hints: wgpu::MemoryHints::MemoryUsage,
                },
                None,
            )
            .await?;

        let caps = Capabilities::probe(&adapter, device.features())?;
        tracing::info!(
            "Field formats R={:?} RG={:?} RGBA={:?}, linear filtering: {}",
            caps.r,
            caps.rg,
            caps.rgba,
            caps.linear_filtering
        );

        Ok(Self::from_parts(instance, adapter, device, queue, caps))
    }

    fn from_parts(
        instance: wgpu::Instance,
        adapter: wgpu::Adapter,
        device: wgpu::Device,
        queue: wgpu::Queue,
        caps: Capabilities,
    ) -> Self {
        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Uniform Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: wgpu::BufferSize::new(UNIFORM_BINDING_SIZE),
                },
                count: None,
            }],
        });

        let texture_layouts = (1..=MAX_TEXTURE_UNITS)
            .map(|units| Self::create_texture_layout(&device, units, caps.linear_filtering))
            .collect();

        let samplers = [
            SamplerKind::LINEAR_CLAMP,
            SamplerKind::NEAREST_CLAMP,
            SamplerKind::LINEAR_REPEAT,
            SamplerKind::NEAREST_REPEAT,
        ]
        .into_iter()
        .map(|kind| {
            let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
                label: Some("Field Sampler"),
                address_mode_u: kind.wrap,
                address_mode_v: kind.wrap,
                address_mode_w: kind.wrap,
                mag_filter: kind.filter,
                min_filter: kind.filter,
                mipmap_filter: wgpu::FilterMode::Nearest,
                ..Default::default()
            });
            (kind, sampler)
        })
        .collect();

        let field_quad = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Field Quad"),
            contents: bytemuck::cast_slice(&FIELD_QUAD),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let surface_quad = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Surface Quad"),
            contents: bytemuck::cast_slice(&SURFACE_QUAD),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let quad_indices = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Quad Indices"),
            contents: bytemuck::cast_slice(&QUAD_INDICES),
            usage: wgpu::BufferUsages::INDEX,
        });

        let uniforms = UniformArena::new(&device, &uniform_layout);
        let programs = ProgramLibrary::new(&device);

        Self {
            instance,
            adapter,
            device,
            queue,
            caps,
            uniform_layout,
            texture_layouts,
            samplers,
            field_quad,
            surface_quad,
            quad_indices,
            uniforms,
            programs,
            bind_groups: FxHashMap::default(),
            next_field_id: 1,
            allocations: 0,
        }
    }

    /// Texture unit `n` uses binding `2n` for the texture and `2n + 1` for its sampler
    fn create_texture_layout(
        device: &wgpu::Device,
        units: usize,
        filterable: bool,
    ) -> wgpu::BindGroupLayout {
        let sampler_type = if filterable {
            wgpu::SamplerBindingType::Filtering
        } else {
            wgpu::SamplerBindingType::NonFiltering
        };

        let entries: Vec<_> = (0..units as u32)
            .flat_map(|unit| {
                [
                    wgpu::BindGroupLayoutEntry {
                        binding: unit * 2,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Texture {
                            sample_type: wgpu::TextureSampleType::Float { filterable },
                            view_dimension: wgpu::TextureViewDimension::D2,
                            multisampled: false,
                        },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: unit * 2 + 1,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Sampler(sampler_type),
                        count: None,
                    },
                ]
            })
            .collect();

        device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Texture Layout"),
            entries: &entries,
        })
    }

    pub fn instance(&self) -> &wgpu::Instance {
        &self.instance
    }

    pub fn adapter(&self) -> &wgpu::Adapter {
        &self.adapter
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub fn capabilities(&self) -> Capabilities {
        self.caps
    }

    /// Whether `program` compiled and can be drawn with
    pub fn is_usable(&self, program: Program) -> bool {
        self.programs.is_usable(program)
    }

    /// Number of field textures created so far (readback targets excluded)
    pub fn allocation_count(&self) -> u64 {
        self.allocations
    }

    pub fn pipeline_count(&self) -> usize {
        self.programs.pipeline_count()
    }

    /// Allocate a field of the given class
    ///
    /// Without linear filtering support every field samples with nearest
    /// filtering regardless of `sampler`.
    pub fn create_field(
        &mut self,
        label: &'static str,
        size: GridSize,
        class: FieldFormat,
        sampler: SamplerKind,
    ) -> Field {
        let sampler = if self.caps.linear_filtering {
            sampler
        } else {
            sampler.nearest()
        };

        // Cached bind groups may reference fields that are about to be dropped
        self.bind_groups.clear();
        self.allocations += 1;

        let id = self.next_id();
        tracing::trace!(
            "Allocating field {} {}x{} ({:?})",
            label,
            size.width,
            size.height,
            class
        );
        Field::new(
            &self.device,
            id,
            label,
            size,
            self.caps.format(class),
            sampler,
            wgpu::TextureUsages::empty(),
        )
    }

    pub fn create_double_field(
        &mut self,
        label: &'static str,
        size: GridSize,
        class: FieldFormat,
        sampler: SamplerKind,
    ) -> DoubleField {
        DoubleField::new(
            self.create_field(label, size, class, sampler),
            self.create_field(label, size, class, sampler),
        )
    }

    /// Drop cached bind groups once the fields they reference are replaced
    pub(crate) fn release_bind_groups(&mut self) {
        self.bind_groups.clear();
    }

    #[cfg(test)]
    pub(crate) fn cached_bind_groups(&self) -> usize {
        self.bind_groups.len()
    }

    #[cfg(test)]
    pub(crate) fn mark_unusable(&mut self, program: Program) {
        self.programs.mark_unusable(program);
    }

    fn next_id(&mut self) -> u64 {
        let id = self.next_field_id;
        self.next_field_id += 1;
        id
    }

    pub(crate) fn new_encoder(&self) -> wgpu::CommandEncoder {
        self.device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Fluidglass Frame"),
            })
    }

    /// Stage uniform bytes, returning `None` when the arena must be flushed first
    pub(crate) fn stage_uniforms(&mut self, bytes: &[u8]) -> Option<u32> {
        self.uniforms.push(bytes)
    }

    /// Write staged uniforms to the GPU ahead of the next submit
    pub(crate) fn flush_uniforms(&mut self) {
        self.uniforms.flush(&self.queue);
    }

    /// Record one full-screen draw
    ///
    /// Draws whose program is unusable, or that target a missing surface,
    /// are skipped.
    pub(crate) fn encode_blit(
        &mut self,
        encoder: &mut wgpu::CommandEncoder,
        surface: Option<&SurfaceTarget>,
        blit: &Blit<'_>,
        uniform_offset: u32,
        frame: u64,
    ) {
        let (view, format, quad) = match blit.target {
            Target::Field(field) => (field.view(), field.format(), &self.field_quad),
            Target::Surface => match surface {
                Some(surface) => (&surface.view, surface.format, &self.surface_quad),
                None => {
                    tracing::warn!("{} draw targets the surface but none is bound", blit.program.label());
                    return;
                }
            },
        };

        let key = PipelineKey::new(blit.program, blit.keywords, format, blit.blend);
        if !self
            .programs
            .prepare(&self.device, &self.uniform_layout, &self.texture_layouts, key)
        {
            tracing::trace!("Skipping draw with unusable program {}", blit.program.label());
            return;
        }
        let Some(pipeline) = self.programs.pipeline(&key) else {
            return;
        };

        let units = blit.program.texture_units();
        if blit.inputs.len() != units {
            tracing::warn!(
                "{} expects {} inputs, got {}",
                blit.program.label(),
                units,
                blit.inputs.len()
            );
            return;
        }

        let textures = if units > 0 {
            let key: BindGroupKey = blit
                .inputs
                .iter()
                .map(|field| (field.id, field.sampler()))
                .collect();
            let device = &self.device;
            let layout = &self.texture_layouts[units - 1];
            let samplers = &self.samplers;
            Some(&*self.bind_groups.entry(key).or_insert_with(|| {
                let entries: Vec<_> = blit
                    .inputs
                    .iter()
                    .enumerate()
                    .flat_map(|(unit, field)| {
                        let unit = unit as u32;
                        [
                            wgpu::BindGroupEntry {
                                binding: unit * 2,
                                resource: wgpu::BindingResource::TextureView(field.view()),
                            },
                            wgpu::BindGroupEntry {
                                binding: unit * 2 + 1,
                                resource: wgpu::BindingResource::Sampler(
                                    &samplers[&field.sampler()],
                                ),
                            },
                        ]
                    })
                    .collect();
                device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("Field Bind Group"),
                    layout,
                    entries: &entries,
                })
            }))
        } else {
            None
        };

        let load = match blit.clear {
            Some(color) => wgpu::LoadOp::Clear(color),
            None => wgpu::LoadOp::Load,
        };

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(blit.program.label()),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load,
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        pass.set_pipeline(pipeline);
        pass.set_bind_group(0, &self.uniforms.bind_group, &[uniform_offset]);
        if let Some(textures) = textures {
            pass.set_bind_group(1, textures, &[]);
        }
        pass.set_vertex_buffer(0, quad.slice(..));
        pass.set_index_buffer(self.quad_indices.slice(..), wgpu::IndexFormat::Uint16);
        pass.draw_indexed(0..QUAD_INDICES.len() as u32, 0, 0..1);
        drop(pass);

        if let Target::Field(field) = blit.target {
            field.mark_written(frame);
        }
    }

    /// Begin recording a frame; `surface` is the presentable target, if any
    pub fn begin_frame(&mut self, surface: Option<SurfaceTarget>, frame: u64) -> FrameEncoder<'_> {
        FrameEncoder::new(self, surface, frame)
    }

    /// Copy a field into the negotiated readback format and read it back
    ///
    /// Blocks on the device; not usable on the web.
    pub fn read_field(&mut self, field: &Field) -> Result<FieldSnapshot> {
        let format = self.caps.readback;
        let bytes_per_pixel = format
            .block_copy_size(None)
            .ok_or_else(|| GpuError::Readback(format!("{:?} has no copy size", format)))?;

        let id = self.next_id();
        let target = Field::new(
            &self.device,
            id,
            "Readback Target",
            field.size(),
            format,
            SamplerKind::NEAREST_CLAMP,
            wgpu::TextureUsages::COPY_SRC,
        );

        let mut frame = self.begin_frame(None, 0);
        frame.blit(
            Blit::new(Program::Copy, Target::Field(&target)).inputs(&[field]),
            &TexelUniforms::new(field.texel_size()),
        );
        frame.finish();

        let bytes = self.read_texture_bytes(target.texture(), bytes_per_pixel)?;
        let texels = decode_rgba(format, &bytes)?;

        Ok(FieldSnapshot::new(field.size(), texels))
    }

    /// Read a whole texture into tightly packed rows, first memory row first
    pub fn read_texture_bytes(
        &self,
        texture: &wgpu::Texture,
        bytes_per_pixel: u32,
    ) -> Result<Vec<u8>> {
        let size = texture.size();
        let unpadded = size.width * bytes_per_pixel;
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let padded = unpadded.div_ceil(align) * align;

        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Readback Buffer"),
            size: padded as u64 * size.height as u64,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = self.new_encoder();
        encoder.copy_texture_to_buffer(
            wgpu::ImageCopyTexture {
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::ImageCopyBuffer {
                buffer: &buffer,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(padded),
                    rows_per_image: Some(size.height),
                },
            },
            wgpu::Extent3d {
                width: size.width,
                height: size.height,
                depth_or_array_layers: 1,
            },
        );
        self.queue.submit(Some(encoder.finish()));

        let slice = buffer.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.device.poll(wgpu::Maintain::Wait);

        rx.recv()
            .map_err(|e| GpuError::Readback(e.to_string()))?
            .map_err(|e| GpuError::Readback(e.to_string()))?;

        let mut out = Vec::with_capacity((unpadded * size.height) as usize);
        {
            let data = slice.get_mapped_range();
            for row in 0..size.height as usize {
                let start = row * padded as usize;
                out.extend_from_slice(&data[start..start + unpadded as usize]);
            }
        }
        buffer.unmap();

        Ok(out)
    }
}

/// Pick a presentable format, preferring linear (non-sRGB) encodings
pub fn choose_surface_format(caps: &wgpu::SurfaceCapabilities) -> Option<wgpu::TextureFormat> {
    caps.formats
        .iter()
        .find(|f| !f.is_srgb())
        .or_else(|| caps.formats.first())
        .copied()
}

/// Surface configuration for the given size
pub fn surface_config(
    caps: &wgpu::SurfaceCapabilities,
    format: wgpu::TextureFormat,
    width: u32,
    height: u32,
) -> wgpu::SurfaceConfiguration {
    wgpu::SurfaceConfiguration {
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        format,
        width: width.max(1),
        height: height.max(1),
        present_mode: wgpu::PresentMode::AutoVsync,
        desired_maximum_frame_latency: 2,
        alpha_mode: caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto),
        view_formats: vec![],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::uniforms::{ClearUniforms, ColorUniforms};

    #[test]
    fn test_quads_share_winding_and_cover_clip_space() {
        for quad in [FIELD_QUAD, SURFACE_QUAD] {
            let xs: Vec<f32> = quad.iter().map(|v| v.position[0]).collect();
            let ys: Vec<f32> = quad.iter().map(|v| v.position[1]).collect();
            assert!(xs.contains(&-1.0) && xs.contains(&1.0));
            assert!(ys.contains(&-1.0) && ys.contains(&1.0));
        }
    }

    #[test]
    fn test_field_quad_maps_top_row_to_v0() {
        // Clip-space y = 1 rasterises into memory row 0
        let top: Vec<_> = FIELD_QUAD.iter().filter(|v| v.position[1] > 0.0).collect();
        assert!(top.iter().all(|v| v.uv[1] == 0.0));

        let bottom: Vec<_> = SURFACE_QUAD.iter().filter(|v| v.position[1] < 0.0).collect();
        assert!(bottom.iter().all(|v| v.uv[1] == 0.0));
    }

    #[test]
    fn test_surface_format_prefers_linear() {
        let caps = wgpu::SurfaceCapabilities {
            formats: vec![
                wgpu::TextureFormat::Bgra8UnormSrgb,
                wgpu::TextureFormat::Bgra8Unorm,
            ],
            ..Default::default()
        };
        assert_eq!(choose_surface_format(&caps), Some(wgpu::TextureFormat::Bgra8Unorm));

        let caps = wgpu::SurfaceCapabilities {
            formats: vec![wgpu::TextureFormat::Rgba8UnormSrgb],
            ..Default::default()
        };
        assert_eq!(choose_surface_format(&caps), Some(wgpu::TextureFormat::Rgba8UnormSrgb));

        assert_eq!(choose_surface_format(&wgpu::SurfaceCapabilities::default()), None);
    }

    #[test]
    #[ignore] // Requires GPU
    fn test_create_field_counts_allocations() {
        let mut gpu = pollster::block_on(GpuContext::headless()).unwrap();
        assert_eq!(gpu.allocation_count(), 0);
        let field = gpu.create_field(
            "Test",
            GridSize::new(8, 4),
            FieldFormat::Rg,
            SamplerKind::LINEAR_CLAMP,
        );
        assert_eq!(gpu.allocation_count(), 1);
        assert_eq!(field.size(), GridSize::new(8, 4));

        // Readback targets are not counted
        let snapshot = gpu.read_field(&field).unwrap();
        assert_eq!(gpu.allocation_count(), 1);
        assert_eq!(snapshot.size(), GridSize::new(8, 4));
        assert_eq!(snapshot.max_magnitude(2), 0.0);
    }

    #[test]
    #[ignore] // Requires GPU
    fn test_unusable_program_draw_is_skipped() {
        let mut gpu = pollster::block_on(GpuContext::headless()).unwrap();
        let field = gpu.create_field(
            "Test",
            GridSize::new(4, 4),
            FieldFormat::Rgba,
            SamplerKind::NEAREST_CLAMP,
        );
        let red = ColorUniforms {
            color: [1.0, 0.0, 0.0, 1.0],
            ..Default::default()
        };

        gpu.mark_unusable(Program::Color);
        assert!(!gpu.is_usable(Program::Color));
        let pipelines = gpu.pipeline_count();

        let mut frame = gpu.begin_frame(None, 3);
        frame.blit(Blit::new(Program::Color, Target::Field(&field)), &red);
        frame.finish();

        assert_eq!(field.last_write(), 0);
        assert_eq!(gpu.pipeline_count(), pipelines);
        assert_eq!(gpu.read_field(&field).unwrap().max_abs(), 0.0);

        // Other programs still draw
        let source = gpu.create_field(
            "Source",
            GridSize::new(4, 4),
            FieldFormat::Rgba,
            SamplerKind::NEAREST_CLAMP,
        );
        let mut frame = gpu.begin_frame(None, 4);
        frame.blit(
            Blit::new(Program::Clear, Target::Field(&field)).inputs(&[&source]),
            &ClearUniforms::default(),
        );
        frame.finish();
        assert_eq!(field.last_write(), 4);
    }
}
