//! Presenting dye on the surface

use fluidglass_core::{FluidConfig, GridSize};

use crate::field::Field;
use crate::frame::{Blit, FrameEncoder, Target};
use crate::program::{Blend, Keywords, Program};
use crate::uniforms::{ColorUniforms, TexelUniforms};

/// Keywords of the display program for `config`
pub fn display_keywords(config: &FluidConfig) -> Keywords {
    Keywords::NONE.set(Keywords::SHADING, config.shading)
}

/// Clear the surface and fill it with the background colour
///
/// With `TRANSPARENT` the surface is only cleared to transparent black.
pub fn draw_backdrop(frame: &mut FrameEncoder<'_>, config: &FluidConfig) {
    if config.transparent {
        frame.blit(
            Blit::new(Program::Color, Target::Surface).clear(wgpu::Color::TRANSPARENT),
            &ColorUniforms::default(),
        );
        return;
    }

    let color = config.back_color_normalized().to_array(1.0);
    frame.blit(
        Blit::new(Program::Color, Target::Surface).clear(wgpu::Color {
            r: color[0] as f64,
            g: color[1] as f64,
            b: color[2] as f64,
            a: 1.0,
        }),
        &ColorUniforms {
            color,
            ..Default::default()
        },
    );
}

/// Texel size of the image being drawn, which sets the shading stencil
fn target_texel_size(target: Target<'_>, surface_size: Option<(u32, u32)>) -> Option<[f32; 2]> {
    match target {
        Target::Field(field) => Some(field.texel_size()),
        Target::Surface => {
            surface_size.map(|(width, height)| GridSize::new(width, height).texel_size())
        }
    }
}

/// Draw dye into `target` through the display program
pub fn draw_dye(
    frame: &mut FrameEncoder<'_>,
    dye: &Field,
    target: Target<'_>,
    blend: Blend,
    config: &FluidConfig,
) {
    let texel_size =
        target_texel_size(target, frame.surface_size()).unwrap_or_else(|| dye.texel_size());
    frame.blit(
        Blit::new(Program::Display, target)
            .inputs(&[dye])
            .keywords(display_keywords(config))
            .blend(blend),
        &TexelUniforms::new(texel_size),
    );
}

/// Direct path: backdrop then dye blended over it
pub fn render_direct(frame: &mut FrameEncoder<'_>, dye: &Field, config: &FluidConfig) {
    draw_backdrop(frame, config);
    draw_dye(frame, dye, Target::Surface, Blend::Premultiplied, config);
}
