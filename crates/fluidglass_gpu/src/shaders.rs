//! WGSL programs for the fluid solver and the glass composite
//!
//! Every program is a fragment stage appended to [`VERTEX_SHADER`]. The
//! fragment source declares a `Uniforms` struct whose first member is
//! `texel_size`, bound at `@group(0) @binding(0)`; the shared vertex stage reads
//! it to emit the four neighbour coordinates used by the finite-difference
//! passes.
//!
//! Textures live in `@group(1)`: texture unit `n` is a `texture_2d<f32>` at
//! binding `2n` with its sampler at binding `2n + 1`.
//!
//! Optional features are WGSL `override` constants (`MANUAL_FILTERING`,
//! `SHADING`) so a single module serves every keyword combination.

/// Shared full-screen quad vertex stage
///
/// `uv` comes from the vertex buffer rather than being derived from the clip
/// position, so offscreen fields and the surface can use different row
/// orders while sampling the same normalised coordinates (`y` up).
pub const VERTEX_SHADER: &str = r#"
// ============================================================================
// Full-screen quad
// ============================================================================

struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) uv: vec2<f32>,
    @location(1) uv_l: vec2<f32>,
    @location(2) uv_r: vec2<f32>,
    @location(3) uv_t: vec2<f32>,
    @location(4) uv_b: vec2<f32>,
}

@vertex
fn vs_main(@location(0) position: vec2<f32>, @location(1) uv: vec2<f32>) -> VertexOutput {
    var out: VertexOutput;
    out.position = vec4<f32>(position, 0.0, 1.0);
    out.uv = uv;
    out.uv_l = uv - vec2<f32>(u.texel_size.x, 0.0);
    out.uv_r = uv + vec2<f32>(u.texel_size.x, 0.0);
    out.uv_t = uv + vec2<f32>(0.0, u.texel_size.y);
    out.uv_b = uv - vec2<f32>(0.0, u.texel_size.y);
    return out;
}
"#;

/// Plain texture copy
pub const COPY_SHADER: &str = r#"
struct Uniforms {
    texel_size: vec2<f32>,
    _padding: vec2<f32>,
}

@group(0) @binding(0) var<uniform> u: Uniforms;
@group(1) @binding(0) var t_source: texture_2d<f32>;
@group(1) @binding(1) var s_source: sampler;

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    return textureSampleLevel(t_source, s_source, in.uv, 0.0);
}
"#;

/// Scale a field by a constant (pressure decay)
pub const CLEAR_SHADER: &str = r#"
struct Uniforms {
    texel_size: vec2<f32>,
    value: f32,
    _padding: f32,
}

@group(0) @binding(0) var<uniform> u: Uniforms;
@group(1) @binding(0) var t_source: texture_2d<f32>;
@group(1) @binding(1) var s_source: sampler;

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    return u.value * textureSampleLevel(t_source, s_source, in.uv, 0.0);
}
"#;

/// Solid colour fill
pub const COLOR_SHADER: &str = r#"
struct Uniforms {
    texel_size: vec2<f32>,
    _padding: vec2<f32>,
    color: vec4<f32>,
}

@group(0) @binding(0) var<uniform> u: Uniforms;

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    return u.color;
}
"#;

/// Gaussian impulse added on top of the current field
pub const SPLAT_SHADER: &str = r#"
struct Uniforms {
    texel_size: vec2<f32>,
    point: vec2<f32>,
    color: vec4<f32>,
    aspect_ratio: f32,
    radius: f32,
    _padding: vec2<f32>,
}

@group(0) @binding(0) var<uniform> u: Uniforms;
@group(1) @binding(0) var t_target: texture_2d<f32>;
@group(1) @binding(1) var s_target: sampler;

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    var p = in.uv - u.point;
    p.x = p.x * u.aspect_ratio;
    let splat = exp(-dot(p, p) / u.radius) * u.color.rgb;
    let base = textureSampleLevel(t_target, s_target, in.uv, 0.0).rgb;
    return vec4<f32>(base + splat, 1.0);
}
"#;

/// Semi-Lagrangian advection
///
/// Unit 0 is the velocity field, unit 1 the quantity being transported.
/// `MANUAL_FILTERING` replaces hardware bilinear filtering for devices that
/// can only sample float textures with nearest filtering.
pub const ADVECTION_SHADER: &str = r#"
override MANUAL_FILTERING: bool = false;

struct Uniforms {
    texel_size: vec2<f32>,
    dye_texel_size: vec2<f32>,
    dt: f32,
    dissipation: f32,
    _padding: vec2<f32>,
}

@group(0) @binding(0) var<uniform> u: Uniforms;
@group(1) @binding(0) var t_velocity: texture_2d<f32>;
@group(1) @binding(1) var s_velocity: sampler;
@group(1) @binding(2) var t_source: texture_2d<f32>;
@group(1) @binding(3) var s_source: sampler;

fn bilerp(t: texture_2d<f32>, s: sampler, uv: vec2<f32>, tsize: vec2<f32>) -> vec4<f32> {
    let st = uv / tsize - 0.5;
    let iuv = floor(st);
    let fuv = fract(st);

    let a = textureSampleLevel(t, s, (iuv + vec2<f32>(0.5, 0.5)) * tsize, 0.0);
    let b = textureSampleLevel(t, s, (iuv + vec2<f32>(1.5, 0.5)) * tsize, 0.0);
    let c = textureSampleLevel(t, s, (iuv + vec2<f32>(0.5, 1.5)) * tsize, 0.0);
    let d = textureSampleLevel(t, s, (iuv + vec2<f32>(1.5, 1.5)) * tsize, 0.0);

    return mix(mix(a, b, fuv.x), mix(c, d, fuv.x), fuv.y);
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    var result: vec4<f32>;
    if (MANUAL_FILTERING) {
        let velocity = bilerp(t_velocity, s_velocity, in.uv, u.texel_size).xy;
        let coord = in.uv - u.dt * velocity * u.texel_size;
        result = bilerp(t_source, s_source, coord, u.dye_texel_size);
    } else {
        let velocity = textureSampleLevel(t_velocity, s_velocity, in.uv, 0.0).xy;
        let coord = in.uv - u.dt * velocity * u.texel_size;
        result = textureSampleLevel(t_source, s_source, coord, 0.0);
    }

    let decay = 1.0 + u.dissipation * u.dt;
    return result / decay;
}
"#;

/// Velocity divergence with reflecting walls
pub const DIVERGENCE_SHADER: &str = r#"
struct Uniforms {
    texel_size: vec2<f32>,
    _padding: vec2<f32>,
}

@group(0) @binding(0) var<uniform> u: Uniforms;
@group(1) @binding(0) var t_velocity: texture_2d<f32>;
@group(1) @binding(1) var s_velocity: sampler;

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    var l = textureSampleLevel(t_velocity, s_velocity, in.uv_l, 0.0).x;
    var r = textureSampleLevel(t_velocity, s_velocity, in.uv_r, 0.0).x;
    var t = textureSampleLevel(t_velocity, s_velocity, in.uv_t, 0.0).y;
    var b = textureSampleLevel(t_velocity, s_velocity, in.uv_b, 0.0).y;

    let c = textureSampleLevel(t_velocity, s_velocity, in.uv, 0.0).xy;
    if (in.uv_l.x < 0.0) { l = -c.x; }
    if (in.uv_r.x > 1.0) { r = -c.x; }
    if (in.uv_t.y > 1.0) { t = -c.y; }
    if (in.uv_b.y < 0.0) { b = -c.y; }

    let div = 0.5 * (r - l + t - b);
    return vec4<f32>(div, 0.0, 0.0, 1.0);
}
"#;

/// Scalar vorticity of the velocity field
pub const CURL_SHADER: &str = r#"
struct Uniforms {
    texel_size: vec2<f32>,
    _padding: vec2<f32>,
}

@group(0) @binding(0) var<uniform> u: Uniforms;
@group(1) @binding(0) var t_velocity: texture_2d<f32>;
@group(1) @binding(1) var s_velocity: sampler;

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let l = textureSampleLevel(t_velocity, s_velocity, in.uv_l, 0.0).y;
    let r = textureSampleLevel(t_velocity, s_velocity, in.uv_r, 0.0).y;
    let t = textureSampleLevel(t_velocity, s_velocity, in.uv_t, 0.0).x;
    let b = textureSampleLevel(t_velocity, s_velocity, in.uv_b, 0.0).x;

    let vorticity = r - l - t + b;
    return vec4<f32>(0.5 * vorticity, 0.0, 0.0, 1.0);
}
"#;

/// Vorticity confinement force
///
/// Unit 0 is velocity, unit 1 the curl field.
pub const VORTICITY_SHADER: &str = r#"
struct Uniforms {
    texel_size: vec2<f32>,
    curl: f32,
    dt: f32,
}

@group(0) @binding(0) var<uniform> u: Uniforms;
@group(1) @binding(0) var t_velocity: texture_2d<f32>;
@group(1) @binding(1) var s_velocity: sampler;
@group(1) @binding(2) var t_curl: texture_2d<f32>;
@group(1) @binding(3) var s_curl: sampler;

const VELOCITY_LIMIT: f32 = 1000.0;

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let l = textureSampleLevel(t_curl, s_curl, in.uv_l, 0.0).x;
    let r = textureSampleLevel(t_curl, s_curl, in.uv_r, 0.0).x;
    let t = textureSampleLevel(t_curl, s_curl, in.uv_t, 0.0).x;
    let b = textureSampleLevel(t_curl, s_curl, in.uv_b, 0.0).x;
    let c = textureSampleLevel(t_curl, s_curl, in.uv, 0.0).x;

    var force = 0.5 * vec2<f32>(abs(t) - abs(b), abs(r) - abs(l));
    force = force / (length(force) + 0.0001);
    force = force * u.curl * c;
    force.y = -force.y;

    var velocity = textureSampleLevel(t_velocity, s_velocity, in.uv, 0.0).xy;
    velocity = velocity + force * u.dt;
    velocity = clamp(velocity, vec2<f32>(-VELOCITY_LIMIT), vec2<f32>(VELOCITY_LIMIT));
    return vec4<f32>(velocity, 0.0, 1.0);
}
"#;

/// One Jacobi iteration of the pressure Poisson solve
///
/// Unit 0 is pressure, unit 1 divergence.
pub const PRESSURE_SHADER: &str = r#"
struct Uniforms {
    texel_size: vec2<f32>,
    _padding: vec2<f32>,
}

@group(0) @binding(0) var<uniform> u: Uniforms;
@group(1) @binding(0) var t_pressure: texture_2d<f32>;
@group(1) @binding(1) var s_pressure: sampler;
@group(1) @binding(2) var t_divergence: texture_2d<f32>;
@group(1) @binding(3) var s_divergence: sampler;

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let l = textureSampleLevel(t_pressure, s_pressure, in.uv_l, 0.0).x;
    let r = textureSampleLevel(t_pressure, s_pressure, in.uv_r, 0.0).x;
    let t = textureSampleLevel(t_pressure, s_pressure, in.uv_t, 0.0).x;
    let b = textureSampleLevel(t_pressure, s_pressure, in.uv_b, 0.0).x;
    let divergence = textureSampleLevel(t_divergence, s_divergence, in.uv, 0.0).x;

    let pressure = (l + r + b + t - divergence) * 0.25;
    return vec4<f32>(pressure, 0.0, 0.0, 1.0);
}
"#;

/// Subtract the pressure gradient from velocity
///
/// Unit 0 is pressure, unit 1 velocity.
pub const GRADIENT_SUBTRACT_SHADER: &str = r#"
struct Uniforms {
    texel_size: vec2<f32>,
    _padding: vec2<f32>,
}

@group(0) @binding(0) var<uniform> u: Uniforms;
@group(1) @binding(0) var t_pressure: texture_2d<f32>;
@group(1) @binding(1) var s_pressure: sampler;
@group(1) @binding(2) var t_velocity: texture_2d<f32>;
@group(1) @binding(3) var s_velocity: sampler;

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let l = textureSampleLevel(t_pressure, s_pressure, in.uv_l, 0.0).x;
    let r = textureSampleLevel(t_pressure, s_pressure, in.uv_r, 0.0).x;
    let t = textureSampleLevel(t_pressure, s_pressure, in.uv_t, 0.0).x;
    let b = textureSampleLevel(t_pressure, s_pressure, in.uv_b, 0.0).x;

    var velocity = textureSampleLevel(t_velocity, s_velocity, in.uv, 0.0).xy;
    velocity = velocity - vec2<f32>(r - l, t - b);
    return vec4<f32>(velocity, 0.0, 1.0);
}
"#;

/// Dye display with optional relief shading; alpha is the brightest channel
pub const DISPLAY_SHADER: &str = r#"
override SHADING: bool = false;

struct Uniforms {
    texel_size: vec2<f32>,
    _padding: vec2<f32>,
}

@group(0) @binding(0) var<uniform> u: Uniforms;
@group(1) @binding(0) var t_dye: texture_2d<f32>;
@group(1) @binding(1) var s_dye: sampler;

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    var c = textureSampleLevel(t_dye, s_dye, in.uv, 0.0).rgb;

    if (SHADING) {
        let lc = textureSampleLevel(t_dye, s_dye, in.uv_l, 0.0).rgb;
        let rc = textureSampleLevel(t_dye, s_dye, in.uv_r, 0.0).rgb;
        let tc = textureSampleLevel(t_dye, s_dye, in.uv_t, 0.0).rgb;
        let bc = textureSampleLevel(t_dye, s_dye, in.uv_b, 0.0).rgb;

        let dx = length(rc) - length(lc);
        let dy = length(tc) - length(bc);
        let n = normalize(vec3<f32>(dx, dy, length(u.texel_size)));
        let diffuse = clamp(dot(n, vec3<f32>(0.0, 0.0, 1.0)) + 0.7, 0.7, 1.0);
        c = c * diffuse;
    }

    let a = max(c.r, max(c.g, c.b));
    return vec4<f32>(c, a);
}
"#;

/// Tileable fractal value noise
///
/// Each octave wraps its lattice at `round(scale * 2^octave)` cells so the
/// texture repeats seamlessly when sampled with a repeating sampler.
pub const NOISE_SHADER: &str = r#"
struct Uniforms {
    texel_size: vec2<f32>,
    time: f32,
    scale: f32,
    speed: f32,
    octaves: i32,
    _padding: vec2<f32>,
}

@group(0) @binding(0) var<uniform> u: Uniforms;

const MAX_OCTAVES: i32 = 6;

fn hash(p: vec2<f32>) -> f32 {
    var q = fract(p * vec2<f32>(123.34, 456.21));
    q = q + dot(q, q + 45.32);
    return fract(q.x * q.y);
}

fn wrap(i: vec2<f32>, period: f32) -> vec2<f32> {
    return i - period * floor(i / period);
}

// Value noise in [-1, 1] with a lattice that repeats every `period` cells
fn value_noise(p: vec2<f32>, period: f32) -> f32 {
    let i = floor(p);
    let f = fract(p);
    let w = f * f * (3.0 - 2.0 * f);

    let i0 = wrap(i, period);
    let i1 = wrap(i + 1.0, period);

    let a = hash(vec2<f32>(i0.x, i0.y));
    let b = hash(vec2<f32>(i1.x, i0.y));
    let c = hash(vec2<f32>(i0.x, i1.y));
    let d = hash(vec2<f32>(i1.x, i1.y));

    return mix(mix(a, b, w.x), mix(c, d, w.x), w.y) * 2.0 - 1.0;
}

fn fbm(uv: vec2<f32>, shift: f32) -> f32 {
    var value = 0.0;
    var amplitude = 0.5;
    var frequency = 1.0;
    let octaves = min(u.octaves, MAX_OCTAVES);

    for (var i: i32 = 0; i < octaves; i = i + 1) {
        let period = max(round(u.scale * frequency), 1.0);
        value = value + amplitude * value_noise(uv * period + vec2<f32>(shift), period);
        amplitude = amplitude * 0.5;
        frequency = frequency * 2.0;
    }
    return value;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let shift = u.time * u.speed;
    let nx = fbm(in.uv, shift);
    let ny = fbm(in.uv, shift + 100.0);
    return vec4<f32>(nx * 0.5 + 0.5, ny * 0.5 + 0.5, 0.5, 1.0);
}
"#;

/// One direction of a separable 25-tap Gaussian blur
pub const GAUSSIAN_BLUR_SHADER: &str = r#"
struct Uniforms {
    texel_size: vec2<f32>,
    direction: vec2<f32>,
    resolution: vec2<f32>,
    radius: f32,
    _padding: f32,
}

@group(0) @binding(0) var<uniform> u: Uniforms;
@group(1) @binding(0) var t_source: texture_2d<f32>;
@group(1) @binding(1) var s_source: sampler;

const TAPS: i32 = 12;

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let tap_offset = u.direction / u.resolution;
    let sigma = max(u.radius, 0.0001);

    var result = vec3<f32>(0.0);
    var total = 0.0;
    for (var i: i32 = -TAPS; i <= TAPS; i = i + 1) {
        let x = f32(i);
        let weight = exp(-x * x / (2.0 * sigma * sigma));
        result = result + textureSampleLevel(t_source, s_source, in.uv + tap_offset * x, 0.0).rgb * weight;
        total = total + weight;
    }

    return vec4<f32>(result / total, 1.0);
}
"#;

/// Liquid glass composite for one card
///
/// Unit 0 is the blurred background, unit 1 the noise field. Output alpha is
/// the rounded-rect mask so the card blends over what is already drawn.
pub const GLASS_COMPOSITE_SHADER: &str = r#"
// ============================================================================
// Liquid glass card
// ============================================================================

struct Uniforms {
    texel_size: vec2<f32>,
    resolution: vec2<f32>,
    // center.xy, full size.zw
    glass_rect: vec4<f32>,
    color_tint: vec4<f32>,
    displacement_scale: f32,
    chromatic_aberration: f32,
    fresnel_strength: f32,
    edge_light_intensity: f32,
    specular_intensity: f32,
    specular_size: f32,
    brightness: f32,
    contrast: f32,
    saturation: f32,
    corner_radius: f32,
    time: f32,
    _padding: f32,
}

@group(0) @binding(0) var<uniform> u: Uniforms;
@group(1) @binding(0) var t_blurred: texture_2d<f32>;
@group(1) @binding(1) var s_blurred: sampler;
@group(1) @binding(2) var t_noise: texture_2d<f32>;
@group(1) @binding(3) var s_noise: sampler;

fn sd_rounded_rect(p: vec2<f32>, half_size: vec2<f32>, radius: f32) -> f32 {
    let d = abs(p) - half_size + vec2<f32>(radius);
    return min(max(d.x, d.y), 0.0) + length(max(d, vec2<f32>(0.0))) - radius;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let uv = in.uv;
    let center = u.glass_rect.xy;
    let aspect = u.resolution.x / u.resolution.y;

    var half_size = u.glass_rect.zw * 0.5;
    var p = uv - center;
    p.x = p.x * aspect;
    half_size.x = half_size.x * aspect;

    let d = sd_rounded_rect(p, half_size, u.corner_radius * aspect);
    let mask = 1.0 - smoothstep(-0.005, 0.005, d);
    if (mask < 0.01) {
        discard;
    }

    let noise = textureSampleLevel(t_noise, s_noise, uv * 2.0, 0.0).rg - 0.5;
    let displacement = noise * u.displacement_scale;

    let edge = smoothstep(0.0, 0.05, -d);
    let fresnel = pow(1.0 - edge, 3.0) * u.fresnel_strength;

    // Chromatic aberration: each channel refracts by a slightly different amount
    let ca = u.chromatic_aberration;
    let r = textureSampleLevel(t_blurred, s_blurred, uv + displacement * (1.0 + ca), 0.0).r;
    let g = textureSampleLevel(t_blurred, s_blurred, uv + displacement, 0.0).g;
    let b = textureSampleLevel(t_blurred, s_blurred, uv + displacement * (1.0 - ca), 0.0).b;
    var color = vec3<f32>(r, g, b);

    color = (color - 0.5) * u.contrast + 0.5 + u.brightness;
    let luminance = dot(color, vec3<f32>(0.299, 0.587, 0.114));
    color = mix(vec3<f32>(luminance), color, u.saturation);
    color = color * u.color_tint.rgb;

    let edge_light = (1.0 - edge) * u.edge_light_intensity;
    color = color + edge_light * vec3<f32>(0.8, 0.85, 1.0);

    let light_pos = vec2<f32>(0.3 + sin(u.time * 0.5) * 0.2, 0.3 + cos(u.time * 0.7) * 0.1);
    let spec_dist = length((uv - center) - light_pos * half_size);
    let spec_size = max(u.specular_size, 0.0001);
    let specular = exp(-spec_dist * spec_dist / (spec_size * spec_size)) * u.specular_intensity;
    color = color + specular * vec3<f32>(1.0, 0.98, 0.95);

    color = color + fresnel * vec3<f32>(0.15, 0.15, 0.2);

    return vec4<f32>(color, mask);
}
"#;

/// Concatenate the shared vertex stage with a fragment program
pub fn compose(fragment: &str) -> String {
    let mut source = String::with_capacity(VERTEX_SHADER.len() + fragment.len());
    source.push_str(VERTEX_SHADER);
    source.push_str(fragment);
    source
}
