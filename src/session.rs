//! Per-instance reveal state: queued input, pointer, clock, and surface size.
//!
//! A session owns everything the frame loop mutates that is not a GPU
//! resource. Window callbacks only enqueue; [`RevealSession::begin_frame`]
//! drains the queue so every frame sees a consistent snapshot.

use std::collections::VecDeque;
use std::time::Instant;

use tracing::debug;

use crate::clock::{FrameClock, FrameTiming};
use crate::config::RevealConfig;
use crate::events::SurfaceEvent;
use crate::layout;
use crate::mask::kernel::StepParams;
use crate::pointer::{PointerTracker, SurfaceBounds};

/// Snapshot consumed by one frame's mask and composite passes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameInputs {
    pub surface: (u32, u32),
    /// Surface size changed since the previous frame (always set on the first).
    pub resized: bool,
    pub pointer: [f32; 2],
    pub active: bool,
    pub timing: FrameTiming,
    pub radius: f32,
    pub duration: f32,
    pub aspect: f32,
}

impl FrameInputs {
    pub fn step_params(&self) -> StepParams {
        StepParams {
            pointer: self.pointer,
            active: self.active,
            radius: self.radius,
            duration: self.duration,
            delta: self.timing.delta,
            elapsed: self.timing.elapsed,
            aspect: self.aspect,
        }
    }
}

#[derive(Debug)]
pub struct RevealSession {
    radius: f32,
    duration: f32,
    pointer: PointerTracker,
    clock: FrameClock,
    surface: (u32, u32),
    pending: VecDeque<SurfaceEvent>,
    attached: bool,
    resized: bool,
}

impl RevealSession {
    pub fn new(reveal: &RevealConfig, now: Instant) -> Self {
        Self {
            radius: reveal.radius,
            duration: reveal.duration.as_secs_f32(),
            pointer: PointerTracker::new(),
            clock: FrameClock::new(now),
            surface: (0, 0),
            pending: VecDeque::new(),
            attached: false,
            resized: false,
        }
    }

    /// Start (or restart) the session on a surface of the given size.
    pub fn attach(&mut self, width: u32, height: u32, now: Instant) {
        self.pending.clear();
        self.pointer.reset();
        self.clock.reset(now);
        self.surface = (width, height);
        self.resized = true;
        self.attached = true;
        debug!(width, height, "reveal session attached");
    }

    /// Stop producing frames and drop queued input. Safe to call repeatedly;
    /// returns `true` only when a live session was torn down.
    pub fn detach(&mut self) -> bool {
        if !self.attached {
            return false;
        }
        self.attached = false;
        self.pending.clear();
        self.pointer.reset();
        self.resized = false;
        debug!("reveal session detached");
        true
    }

    pub fn pointer(&self) -> &PointerTracker {
        &self.pointer
    }

    pub fn pending_events(&self) -> usize {
        self.pending.len()
    }

    /// Queue input for the next frame. Ignored while detached.
    pub fn push(&mut self, event: SurfaceEvent) {
        if self.attached {
            self.pending.push_back(event);
        }
    }

    /// Drain queued input and produce this frame's inputs.
    ///
    /// Returns `None` while detached or while the surface has no area; the
    /// passes skip such frames entirely.
    pub fn begin_frame(&mut self, now: Instant) -> Option<FrameInputs> {
        if !self.attached {
            return None;
        }
        while let Some(event) = self.pending.pop_front() {
            match event {
                SurfaceEvent::Resized { width, height } => {
                    if (width, height) != self.surface {
                        self.surface = (width, height);
                        self.resized = true;
                    }
                }
                SurfaceEvent::PointerMoved { x, y } => {
                    let bounds = SurfaceBounds::from_size(self.surface.0, self.surface.1);
                    self.pointer.on_move(x, y, bounds);
                }
                SurfaceEvent::PointerLeft => self.pointer.on_leave(),
            }
        }

        let timing = self.clock.tick(now);
        let aspect = layout::aspect(self.surface.0, self.surface.1)?;
        let resized = std::mem::take(&mut self.resized);
        Some(FrameInputs {
            surface: self.surface,
            resized,
            pointer: self.pointer.position(),
            active: self.pointer.is_active(),
            timing,
            radius: self.radius,
            duration: self.duration,
            aspect,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn session() -> (RevealSession, Instant) {
        let now = Instant::now();
        (RevealSession::new(&RevealConfig::default(), now), now)
    }

    #[test]
    fn detached_session_yields_no_frames() {
        let (mut s, now) = session();
        s.push(SurfaceEvent::PointerLeft);
        assert_eq!(s.pending_events(), 0);
        assert!(s.begin_frame(now).is_none());
    }

    #[test]
    fn first_frame_reports_resize() {
        let (mut s, now) = session();
        s.attach(800, 600, now);
        let first = s.begin_frame(now + Duration::from_millis(16)).unwrap();
        assert!(first.resized);
        assert!((first.aspect - 800.0 / 600.0).abs() < 1e-6);
        let second = s.begin_frame(now + Duration::from_millis(32)).unwrap();
        assert!(!second.resized);
    }

    #[test]
    fn events_apply_in_order_before_the_frame() {
        let (mut s, now) = session();
        s.attach(200, 100, now);
        s.push(SurfaceEvent::PointerMoved { x: 100.0, y: 50.0 });
        s.push(SurfaceEvent::PointerLeft);
        s.push(SurfaceEvent::PointerMoved { x: 200.0, y: 0.0 });
        let frame = s.begin_frame(now).unwrap();
        assert_eq!(frame.pointer, [1.0, 1.0]);
        assert!(frame.active);
        assert_eq!(s.pending_events(), 0);
    }

    #[test]
    fn zero_area_surface_skips_frames() {
        let (mut s, now) = session();
        s.attach(640, 480, now);
        s.push(SurfaceEvent::Resized { width: 0, height: 480 });
        assert!(s.begin_frame(now).is_none());
        s.push(SurfaceEvent::Resized { width: 320, height: 240 });
        let frame = s.begin_frame(now).unwrap();
        assert!(frame.resized);
        assert_eq!(frame.surface, (320, 240));
    }

    #[test]
    fn detach_is_idempotent() {
        let (mut s, now) = session();
        assert!(!s.detach());
        s.attach(10, 10, now);
        s.push(SurfaceEvent::PointerMoved { x: 5.0, y: 5.0 });
        assert!(s.detach());
        assert!(!s.detach());
        assert_eq!(s.pending_events(), 0);
        assert!(!s.pointer().is_active());
    }
}
