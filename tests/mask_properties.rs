use proptest::prelude::*;
use reveal_portrait::mask::MaskField;
use reveal_portrait::mask::kernel::{
    MAX_DECAY_PER_FRAME, MAX_REACH_FACTOR, PAINT_GAIN, StepParams, decay_amount, reveal_visible,
    texel_ndc, update_texel,
};

const FRAME: f32 = 0.016;

fn brush(pointer: [f32; 2], active: bool, elapsed: f32, aspect: f32) -> StepParams {
    StepParams {
        pointer,
        active,
        radius: 0.35,
        duration: 2.0,
        delta: FRAME,
        elapsed,
        aspect,
    }
}

proptest! {
    #[test]
    fn texel_stays_in_unit_range(
        prev in any::<f32>(),
        x in any::<f32>(),
        y in any::<f32>(),
        px in any::<f32>(),
        py in any::<f32>(),
        radius in any::<f32>(),
        duration in any::<f32>(),
        delta in any::<f32>(),
        elapsed in any::<f32>(),
        aspect in any::<f32>(),
        active in any::<bool>(),
    ) {
        let params = StepParams { pointer: [px, py], active, radius, duration, delta, elapsed, aspect };
        let next = update_texel(prev, [x, y], &params);
        prop_assert!((0.0..=1.0).contains(&next), "got {next}");
    }

    #[test]
    fn growth_is_bounded_by_paint_gain(
        prev in 0.0f32..=1.0,
        x in -1.0f32..=1.0,
        y in -1.0f32..=1.0,
        px in -1.5f32..=1.5,
        py in -1.5f32..=1.5,
        delta in 0.0f32..0.5,
        elapsed in 0.0f32..1000.0,
    ) {
        let params = StepParams { delta, ..brush([px, py], true, elapsed, 1.5) };
        let next = update_texel(prev, [x, y], &params);
        prop_assert!(next <= prev + PAINT_GAIN + 1e-6);
    }

    #[test]
    fn inactive_pointer_never_increases(
        prev in 0.0f32..=1.0,
        x in -1.0f32..=1.0,
        y in -1.0f32..=1.0,
        delta in any::<f32>(),
    ) {
        let params = StepParams { delta, ..brush([0.0, 0.0], false, 0.0, 1.0) };
        prop_assert!(update_texel(prev, [x, y], &params) <= prev);
    }

    #[test]
    fn decay_only_converges_without_undershoot(
        start in 0.0f32..=1.0,
        delta in 0.01f32..0.2,
        duration in 0.1f32..10.0,
    ) {
        let params = StepParams { delta, duration, ..brush([10.0, 10.0], false, 0.0, 1.0) };
        let step = decay_amount(delta, duration);
        prop_assert!(step > 0.0 && step <= MAX_DECAY_PER_FRAME);
        let frames = (start / step).ceil() as usize + 2;
        let mut m = start;
        for _ in 0..frames {
            let next = update_texel(m, [0.0, 0.0], &params);
            prop_assert!(next <= m);
            prop_assert!(next >= 0.0);
            m = next;
        }
        prop_assert_eq!(m, 0.0);
    }
}

#[test]
fn threshold_boundary() {
    assert!(!reveal_visible(0.0199, 0.02));
    assert!(!reveal_visible(0.0, 0.02));
    assert!(reveal_visible(0.02, 0.02));
    assert!(reveal_visible(1.0, 0.02));
}

#[test]
fn resize_discards_history() {
    let mut field = MaskField::new(800, 600);
    for frame in 0..5 {
        field.step(&brush([0.0, 0.0], true, frame as f32 * FRAME, 800.0 / 600.0));
    }
    assert!(field.peak() > 0.5);

    assert!(field.resize(400, 300));
    field.step(&brush([10.0, 10.0], false, 0.1, 400.0 / 300.0));
    assert_eq!((field.width(), field.height()), (400, 300));
    assert_eq!(field.values().len(), 400 * 300);
    assert!(field.values().iter().all(|v| *v == 0.0));
}

#[test]
fn centre_hover_reaches_steady_state_and_stays_local() {
    let (w, h) = (200u32, 150u32);
    let aspect = w as f32 / h as f32;
    let mut field = MaskField::new(w, h);
    let mut history = Vec::new();
    for frame in 0..30 {
        field.step(&brush([0.0, 0.0], true, frame as f32 * FRAME, aspect));
        history.push(field.sample_ndc([0.0, 0.0]).unwrap());
    }

    let last = *history.last().unwrap();
    assert!(last > 0.99, "centre settled at {last}");
    assert!(history.windows(2).all(|p| p[1] + 1e-6 >= p[0]));

    let reach = 0.35 * MAX_REACH_FACTOR;
    for y in 0..h {
        for x in 0..w {
            let ndc = texel_ndc(x, y, w, h);
            let dist = (ndc[0] * aspect).hypot(ndc[1]);
            if dist > reach + 1e-3 {
                assert_eq!(field.value(x, y), Some(0.0), "texel ({x},{y}) at {dist}");
            }
        }
    }
}

#[test]
fn released_region_conceals_within_duration() {
    let (w, h) = (64u32, 48u32);
    let aspect = w as f32 / h as f32;
    let mut field = MaskField::new(w, h);
    let mut elapsed = 0.0;
    for _ in 0..30 {
        field.step(&brush([0.0, 0.0], true, elapsed, aspect));
        elapsed += FRAME;
    }
    assert!(field.sample_ndc([0.0, 0.0]).unwrap() > 0.99);

    let budget = (2.5 / FRAME).ceil() as usize;
    let mut concealed_at = None;
    for frame in 0..budget {
        field.step(&brush([10.0, 10.0], false, elapsed, aspect));
        elapsed += FRAME;
        if !reveal_visible(field.sample_ndc([0.0, 0.0]).unwrap(), 0.02) {
            concealed_at = Some(frame);
            break;
        }
    }
    assert!(concealed_at.is_some(), "centre still visible after 2.5s");
}
