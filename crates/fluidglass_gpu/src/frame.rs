//! Per-frame command recording
//!
//! Every pass of the simulation and the composite is a [`Blit`]: one
//! full-screen quad drawn with a program into a field or onto the surface.

use bytemuck::Pod;

use crate::context::{GpuContext, UNIFORM_BINDING_SIZE};
use crate::field::Field;
use crate::program::{Blend, Keywords, Program};

/// Presentable colour target of a frame
pub struct SurfaceTarget {
    pub view: wgpu::TextureView,
    pub format: wgpu::TextureFormat,
    pub width: u32,
    pub height: u32,
}

/// Where a blit draws
#[derive(Clone, Copy, Debug)]
pub enum Target<'a> {
    Field(&'a Field),
    Surface,
}

/// One full-screen draw
#[derive(Clone, Copy, Debug)]
pub struct Blit<'a> {
    pub program: Program,
    pub keywords: Keywords,
    pub inputs: &'a [&'a Field],
    pub target: Target<'a>,
    pub blend: Blend,
    /// Clear the target to this colour before drawing
    pub clear: Option<wgpu::Color>,
}

impl<'a> Blit<'a> {
    pub fn new(program: Program, target: Target<'a>) -> Self {
        Self {
            program,
            keywords: Keywords::NONE,
            inputs: &[],
            target,
            blend: Blend::Replace,
            clear: None,
        }
    }

    /// Fields bound to texture units 0, 1, ...
    pub fn inputs(mut self, inputs: &'a [&'a Field]) -> Self {
        self.inputs = inputs;
        self
    }

    pub fn keywords(mut self, keywords: Keywords) -> Self {
        self.keywords = keywords;
        self
    }

    pub fn blend(mut self, blend: Blend) -> Self {
        self.blend = blend;
        self
    }

    pub fn clear(mut self, color: wgpu::Color) -> Self {
        self.clear = Some(color);
        self
    }
}

/// Records blits for one frame and submits them on [`finish`](Self::finish)
///
/// When the uniform arena fills up mid-frame the recorded work is submitted
/// and recording continues in a fresh encoder.
pub struct FrameEncoder<'a> {
    gpu: &'a mut GpuContext,
    encoder: wgpu::CommandEncoder,
    surface: Option<SurfaceTarget>,
    frame: u64,
}

impl<'a> FrameEncoder<'a> {
    pub(crate) fn new(gpu: &'a mut GpuContext, surface: Option<SurfaceTarget>, frame: u64) -> Self {
        let encoder = gpu.new_encoder();
        Self {
            gpu,
            encoder,
            surface,
            frame,
        }
    }

    pub fn context(&mut self) -> &mut GpuContext {
        self.gpu
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Size of the bound surface, if any
    pub fn surface_size(&self) -> Option<(u32, u32)> {
        self.surface.as_ref().map(|s| (s.width, s.height))
    }

    pub fn blit<U: Pod>(&mut self, blit: Blit<'_>, uniforms: &U) {
        let bytes = bytemuck::bytes_of(uniforms);
        if bytes.len() as u64 > UNIFORM_BINDING_SIZE {
            tracing::error!(
                "{} uniforms are {} bytes, larger than the {} byte binding",
                blit.program.label(),
                bytes.len(),
                UNIFORM_BINDING_SIZE
            );
            return;
        }

        let offset = match self.gpu.stage_uniforms(bytes) {
            Some(offset) => offset,
            None => {
                self.submit_batch();
                match self.gpu.stage_uniforms(bytes) {
                    Some(offset) => offset,
                    None => return,
                }
            }
        };

        self.gpu
            .encode_blit(&mut self.encoder, self.surface.as_ref(), &blit, offset, self.frame);
    }

    fn submit_batch(&mut self) {
        self.gpu.flush_uniforms();
        let encoder = std::mem::replace(&mut self.encoder, self.gpu.new_encoder());
        self.gpu.queue().submit(Some(encoder.finish()));
    }

    /// Submit all recorded work
    pub fn finish(self) {
        self.gpu.flush_uniforms();
        self.gpu.queue().submit(Some(self.encoder.finish()));
    }
}
