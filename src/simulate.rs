//! Headless dry run of the mask on the CPU backend.

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tracing::debug;

use crate::config::Configuration;
use crate::events::SurfaceEvent;
use crate::layout;
use crate::mask::MaskField;
use crate::mask::kernel::reveal_visible;
use crate::session::RevealSession;

/// Simulated frame interval.
pub const FRAME_INTERVAL: Duration = Duration::from_millis(16);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationSample {
    pub frame: usize,
    pub elapsed: f32,
    pub centre: f32,
    pub peak: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationReport {
    pub mask_size: (u32, u32),
    /// Frames with the pointer parked at the surface centre.
    pub hover: Vec<SimulationSample>,
    /// Frames after the pointer left.
    pub release: Vec<SimulationSample>,
}

impl SimulationReport {
    /// First release frame at which the centre dropped below `threshold`.
    pub fn concealed_after(&self, threshold: f32) -> Option<&SimulationSample> {
        self.release.iter().find(|s| !reveal_visible(s.centre, threshold))
    }
}

/// Hover the centre of a window-sized surface for `frames` frames, then leave
/// for `frames` more, recording the mask at each step.
pub fn run(cfg: &Configuration, frames: usize) -> Result<SimulationReport> {
    let (width, height) = (cfg.window.width, cfg.window.height);
    let (mw, mh) = layout::mask_dims(width, height, cfg.mask.resolution_scale)
        .context("window size has no area")?;
    let mut field = MaskField::new(mw, mh);

    let t0 = Instant::now();
    let mut now = t0;
    let mut session = RevealSession::new(&cfg.reveal, t0);
    session.attach(width, height, t0);
    session.push(SurfaceEvent::PointerMoved {
        x: f64::from(width) / 2.0,
        y: f64::from(height) / 2.0,
    });

    let mut step = |session: &mut RevealSession, frame: usize, now: Instant| {
        let inputs = session.begin_frame(now)?;
        field.step(&inputs.step_params());
        Some(SimulationSample {
            frame,
            elapsed: inputs.timing.elapsed,
            centre: field.sample_ndc([0.0, 0.0]).unwrap_or(0.0),
            peak: field.peak(),
        })
    };

    let mut hover = Vec::with_capacity(frames);
    for frame in 0..frames {
        now += FRAME_INTERVAL;
        hover.extend(step(&mut session, frame, now));
    }

    session.push(SurfaceEvent::PointerLeft);
    let mut release = Vec::with_capacity(frames);
    for frame in frames..frames * 2 {
        now += FRAME_INTERVAL;
        release.extend(step(&mut session, frame, now));
    }
    session.detach();

    debug!(frames, mask_w = mw, mask_h = mh, "simulation finished");
    Ok(SimulationReport {
        mask_size: (mw, mh),
        hover,
        release,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Configuration {
        let mut cfg: Configuration =
            serde_yaml::from_str("base-image: a.png\nreveal-image: b.png\n").unwrap();
        cfg.window.width = 160;
        cfg.window.height = 100;
        cfg
    }

    #[test]
    fn hover_then_release_rises_and_falls() {
        let report = run(&config(), 40).unwrap();
        assert_eq!(report.mask_size, (160, 100));
        assert_eq!(report.hover.len(), 40);
        assert_eq!(report.release.len(), 40);

        let hovered = report.hover.last().unwrap();
        assert!(hovered.centre > 0.5);
        let released = report.release.last().unwrap();
        assert!(released.centre < hovered.centre);
    }

    #[test]
    fn release_reports_first_concealed_frame() {
        let report = run(&config(), 200).unwrap();
        let concealed = report.concealed_after(0.02).unwrap();
        assert!(concealed.centre < 0.02);
        assert!(concealed.frame > 200);
        let before = &report.release[concealed.frame - 201];
        assert!(before.centre >= 0.02);
    }

    #[test]
    fn zero_frames_yield_empty_report() {
        let report = run(&config(), 0).unwrap();
        assert!(report.hover.is_empty());
        assert!(report.concealed_after(0.02).is_none());
    }
}
