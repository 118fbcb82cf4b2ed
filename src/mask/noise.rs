//! Smooth value noise used to roughen the reveal boundary.
//!
//! Mirrors the functions in `render/shaders/mask.wgsl`; both must stay in step
//! so the CPU and GPU mask backends paint the same shape.

#[inline]
fn fract(x: f32) -> f32 {
    x - x.floor()
}

#[inline]
fn mix(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Sine-based lattice hash in `[0, 1]`.
#[inline]
pub fn hash(p: [f32; 2]) -> f32 {
    fract((p[0] * 127.1 + p[1] * 311.7).sin() * 43758.5453123)
}

/// Bilinearly blended lattice hashes with a smoothstep fade curve.
///
/// Output stays within `[0, 1]` for finite input; non-finite input yields NaN,
/// which callers treat as "no contribution".
pub fn value_noise(p: [f32; 2]) -> f32 {
    let i = [p[0].floor(), p[1].floor()];
    let f = [p[0] - i[0], p[1] - i[1]];
    let u = [f[0] * f[0] * (3.0 - 2.0 * f[0]), f[1] * f[1] * (3.0 - 2.0 * f[1])];

    let a = hash(i);
    let b = hash([i[0] + 1.0, i[1]]);
    let c = hash([i[0], i[1] + 1.0]);
    let d = hash([i[0] + 1.0, i[1] + 1.0]);

    mix(mix(a, b, u[0]), mix(c, d, u[0]), u[1])
}
