//! Simulation fields and read/write pairs
//!
//! A [`Field`] is a float texture addressed in normalised coordinates. Every
//! simulation pass reads one buffer and writes another, so evolving state
//! lives in a [`DoubleBuffer`] whose `read` side always holds the latest
//! completed write.

use std::cell::Cell;

use fluidglass_core::GridSize;

/// Sampler configuration of a field
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SamplerKind {
    pub filter: wgpu::FilterMode,
    pub wrap: wgpu::AddressMode,
}

impl SamplerKind {
    pub const LINEAR_CLAMP: SamplerKind = SamplerKind {
        filter: wgpu::FilterMode::Linear,
        wrap: wgpu::AddressMode::ClampToEdge,
    };
    pub const NEAREST_CLAMP: SamplerKind = SamplerKind {
        filter: wgpu::FilterMode::Nearest,
        wrap: wgpu::AddressMode::ClampToEdge,
    };
    pub const LINEAR_REPEAT: SamplerKind = SamplerKind {
        filter: wgpu::FilterMode::Linear,
        wrap: wgpu::AddressMode::Repeat,
    };
    pub const NEAREST_REPEAT: SamplerKind = SamplerKind {
        filter: wgpu::FilterMode::Nearest,
        wrap: wgpu::AddressMode::Repeat,
    };

    /// Same wrap mode with nearest filtering
    pub fn nearest(self) -> SamplerKind {
        SamplerKind {
            filter: wgpu::FilterMode::Nearest,
            ..self
        }
    }
}

/// A 2D float texture used as a render target and sampled input
pub struct Field {
    pub(crate) id: u64,
    label: &'static str,
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    size: GridSize,
    sampler: SamplerKind,
    /// Frame index of the last draw into this field
    last_write: Cell<u64>,
}

impl Field {
    pub(crate) fn new(
        device: &wgpu::Device,
        id: u64,
        label: &'static str,
        size: GridSize,
        format: wgpu::TextureFormat,
        sampler: SamplerKind,
        extra_usage: wgpu::TextureUsages,
    ) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: size.width,
                height: size.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | extra_usage,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        Self {
            id,
            label,
            texture,
            view,
            size,
            sampler,
            last_write: Cell::new(0),
        }
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    pub fn size(&self) -> GridSize {
        self.size
    }

    pub fn texel_size(&self) -> [f32; 2] {
        self.size.texel_size()
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.texture.format()
    }

    pub fn sampler(&self) -> SamplerKind {
        self.sampler
    }

    pub fn texture(&self) -> &wgpu::Texture {
        &self.texture
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    /// Frame index of the most recent draw into this field (0 = never written)
    pub fn last_write(&self) -> u64 {
        self.last_write.get()
    }

    pub(crate) fn mark_written(&self, frame: u64) {
        self.last_write.set(frame);
    }
}

impl std::fmt::Debug for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Field")
            .field("label", &self.label)
            .field("size", &self.size)
            .field("format", &self.format())
            .field("last_write", &self.last_write.get())
            .finish()
    }
}

/// Two equally sized buffers with an explicit swap
#[derive(Debug)]
pub struct DoubleBuffer<T> {
    buffers: [T; 2],
    read: usize,
}

impl<T> DoubleBuffer<T> {
    pub fn new(first: T, second: T) -> Self {
        Self {
            buffers: [first, second],
            read: 0,
        }
    }

    /// Buffer holding the current state
    pub fn read(&self) -> &T {
        &self.buffers[self.read]
    }

    /// Buffer the next pass writes into
    pub fn write(&self) -> &T {
        &self.buffers[1 - self.read]
    }

    /// Publish the write buffer as the new current state
    pub fn swap(&mut self) {
        self.read = 1 - self.read;
    }
}

/// Double-buffered field
pub type DoubleField = DoubleBuffer<Field>;

impl DoubleField {
    pub fn size(&self) -> GridSize {
        self.read().size()
    }

    pub fn texel_size(&self) -> [f32; 2] {
        self.read().texel_size()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_swap_alternates() {
        let mut pair = DoubleBuffer::new("a", "b");
        assert_eq!(*pair.read(), "a");
        assert_eq!(*pair.write(), "b");

        pair.swap();
        assert_eq!(*pair.read(), "b");
        assert_eq!(*pair.write(), "a");

        pair.swap();
        assert_eq!(*pair.read(), "a");
    }

    #[test]
    fn test_read_tracks_latest_write() {
        // Each buffer records the pass index that last wrote it
        let mut pair = DoubleBuffer::new(Cell::new(0u64), Cell::new(0u64));
        for pass in 1..=25u64 {
            pair.write().set(pass);
            pair.swap();
            assert_eq!(pair.read().get(), pass);
            assert_eq!(pair.write().get(), pass - 1);
        }
    }

    #[test]
    fn test_sampler_nearest_keeps_wrap() {
        assert_eq!(SamplerKind::LINEAR_REPEAT.nearest(), SamplerKind::NEAREST_REPEAT);
        assert_eq!(SamplerKind::LINEAR_CLAMP.nearest(), SamplerKind::NEAREST_CLAMP);
    }
}
