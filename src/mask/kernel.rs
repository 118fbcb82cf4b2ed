//! Per-texel decay/paint law shared by the CPU field and the WGSL mask pass.

use super::noise::value_noise;

/// Upper bound on how much a texel may fade in a single frame.
///
/// Long frame gaps would otherwise wipe the mask in one step. Below
/// `20 / duration` frames per second the fade runs slower than wall time.
pub const MAX_DECAY_PER_FRAME: f32 = 0.05;

/// Fraction of the brush falloff added to a texel per frame.
pub const PAINT_GAIN: f32 = 0.25;

/// Reveal fragments whose mask sample is below this value are discarded.
pub const DEFAULT_THRESHOLD: f32 = 0.02;

/// Noise can stretch the brush to `radius * 1.5`; the falloff reaches zero at
/// `1.2` times that.
pub const MAX_REACH_FACTOR: f32 = 1.5 * 1.2;

/// Inputs for one decay/paint step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepParams {
    /// Pointer in normalized surface coordinates (`[-1, 1]`, y up).
    pub pointer: [f32; 2],
    pub active: bool,
    pub radius: f32,
    /// Seconds for a fully revealed texel to fade out at the uncapped rate.
    pub duration: f32,
    /// Seconds since the previous frame.
    pub delta: f32,
    /// Seconds since attach; animates the boundary noise.
    pub elapsed: f32,
    /// Surface width / height.
    pub aspect: f32,
}

#[inline]
pub fn clamp01(v: f32) -> f32 {
    if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) }
}

/// Hermite step between `edge0` and `edge1`; a degenerate range acts as a hard step.
#[inline]
pub fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    if !(edge1 > edge0) {
        return if x < edge0 { 0.0 } else { 1.0 };
    }
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// Amount subtracted from every texel this frame.
pub fn decay_amount(delta: f32, duration: f32) -> f32 {
    let rate = delta / duration;
    if rate.is_nan() {
        0.0
    } else {
        rate.clamp(0.0, MAX_DECAY_PER_FRAME)
    }
}

/// Brush intensity in `[0, 1]` at `uv`, both arguments aspect-corrected.
pub fn paint_falloff(uv: [f32; 2], pointer: [f32; 2], radius: f32, elapsed: f32) -> f32 {
    let to = [uv[0] - pointer[0], uv[1] - pointer[1]];
    let dist = to[0].hypot(to[1]);
    if dist > radius * MAX_REACH_FACTOR {
        return 0.0;
    }
    let angle = to[1].atan2(to[0]);

    let n1 = value_noise([angle * 3.0 + elapsed * 0.5, dist * 5.0]);
    let n2 = value_noise([angle * 5.0 - elapsed * 0.3, dist * 3.0 + elapsed]);
    let organic = radius * (0.7 + n1 * 0.5 + n2 * 0.3);

    let f = (1.0 - smoothstep(organic * 0.05, organic * 1.2, dist)) * (0.8 + n1 * 0.2);
    if f.is_finite() { f.clamp(0.0, 1.0) } else { 0.0 }
}

/// Normalized device coordinate of texel `(x, y)`'s centre; row 0 is the top.
#[inline]
pub fn texel_ndc(x: u32, y: u32, width: u32, height: u32) -> [f32; 2] {
    let w = width.max(1) as f32;
    let h = height.max(1) as f32;
    [
        (x as f32 + 0.5) / w * 2.0 - 1.0,
        1.0 - (y as f32 + 0.5) / h * 2.0,
    ]
}

/// Next value for a texel whose previous value was `prev` and whose NDC is `ndc`.
pub fn update_texel(prev: f32, ndc: [f32; 2], params: &StepParams) -> f32 {
    let mut m = clamp01(prev - decay_amount(params.delta, params.duration));
    if params.active {
        let uv = [ndc[0] * params.aspect, ndc[1]];
        let pointer = [params.pointer[0] * params.aspect, params.pointer[1]];
        let f = paint_falloff(uv, pointer, params.radius, params.elapsed);
        m = clamp01(m + f * PAINT_GAIN);
    }
    m
}

/// Composite rule: the reveal image shows where this holds. `fs_plane` in
/// `composite.wgsl` discards the complement (`m < threshold`).
#[inline]
pub fn reveal_visible(mask: f32, threshold: f32) -> bool {
    mask >= threshold
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> StepParams {
        StepParams {
            pointer: [0.0, 0.0],
            active: true,
            radius: 0.35,
            duration: 2.0,
            delta: 0.016,
            elapsed: 1.0,
            aspect: 1.0,
        }
    }

    #[test]
    fn decay_is_capped() {
        assert!((decay_amount(0.016, 2.0) - 0.008).abs() < 1e-6);
        assert_eq!(decay_amount(10.0, 2.0), MAX_DECAY_PER_FRAME);
        assert_eq!(decay_amount(f32::INFINITY, 2.0), MAX_DECAY_PER_FRAME);
        assert_eq!(decay_amount(-1.0, 2.0), 0.0);
        assert_eq!(decay_amount(f32::NAN, 2.0), 0.0);
    }

    #[test]
    fn falloff_peaks_at_pointer() {
        let f = paint_falloff([0.0, 0.0], [0.0, 0.0], 0.35, 0.0);
        assert!((0.8..=1.0).contains(&f), "unexpected centre falloff {f}");
    }

    #[test]
    fn falloff_vanishes_beyond_reach() {
        let far = 0.35 * MAX_REACH_FACTOR + 0.01;
        assert_eq!(paint_falloff([far, 0.0], [0.0, 0.0], 0.35, 3.0), 0.0);
    }

    #[test]
    fn smoothstep_handles_degenerate_range() {
        assert_eq!(smoothstep(0.0, 0.0, -0.1), 0.0);
        assert_eq!(smoothstep(0.0, 0.0, 0.1), 1.0);
        assert!((smoothstep(0.0, 1.0, 0.5) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn texel_centres_map_to_ndc() {
        assert_eq!(texel_ndc(0, 0, 2, 2), [-0.5, 0.5]);
        assert_eq!(texel_ndc(1, 1, 2, 2), [0.5, -0.5]);
    }

    #[test]
    fn inactive_pointer_only_decays() {
        let mut p = params();
        p.active = false;
        let next = update_texel(0.5, [0.0, 0.0], &p);
        assert!((next - 0.492).abs() < 1e-6);
    }

    #[test]
    fn threshold_boundary_is_inclusive() {
        assert!(!reveal_visible(0.019_999, DEFAULT_THRESHOLD));
        assert!(reveal_visible(DEFAULT_THRESHOLD, DEFAULT_THRESHOLD));
        assert!(reveal_visible(0.5, DEFAULT_THRESHOLD));
    }
}
