//! Pointer position normalized to the output surface.

/// Parked pointer position, far outside any reachable brush radius.
pub const POINTER_SENTINEL: [f32; 2] = [10.0, 10.0];

/// Surface rectangle in the same space as incoming client coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceBounds {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl SurfaceBounds {
    /// Bounds of a window surface whose client coordinates start at the origin.
    pub fn from_size(width: u32, height: u32) -> Self {
        Self {
            left: 0.0,
            top: 0.0,
            width: f64::from(width),
            height: f64::from(height),
        }
    }

    fn has_area(&self) -> bool {
        self.width > 0.0 && self.height > 0.0 && self.width.is_finite() && self.height.is_finite()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerTracker {
    position: [f32; 2],
    active: bool,
}

impl Default for PointerTracker {
    fn default() -> Self {
        Self {
            position: POINTER_SENTINEL,
            active: false,
        }
    }
}

impl PointerTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalized position: x grows right, y grows up, both `[-1, 1]` inside the surface.
    pub fn position(&self) -> [f32; 2] {
        self.position
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn on_move(&mut self, client_x: f64, client_y: f64, bounds: SurfaceBounds) {
        if !bounds.has_area() || !client_x.is_finite() || !client_y.is_finite() {
            return;
        }
        let x = (client_x - bounds.left) / bounds.width * 2.0 - 1.0;
        let y = -((client_y - bounds.top) / bounds.height * 2.0 - 1.0);
        self.position = [x as f32, y as f32];
        self.active = true;
    }

    pub fn on_leave(&mut self) {
        self.position = POINTER_SENTINEL;
        self.active = false;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_parked_and_inactive() {
        let tracker = PointerTracker::new();
        assert_eq!(tracker.position(), POINTER_SENTINEL);
        assert!(!tracker.is_active());
    }

    #[test]
    fn normalizes_against_offset_bounds() {
        let mut tracker = PointerTracker::new();
        let bounds = SurfaceBounds {
            left: 100.0,
            top: 50.0,
            width: 200.0,
            height: 100.0,
        };
        tracker.on_move(200.0, 100.0, bounds);
        assert_eq!(tracker.position(), [0.0, 0.0]);
        tracker.on_move(100.0, 50.0, bounds);
        assert_eq!(tracker.position(), [-1.0, 1.0]);
        tracker.on_move(300.0, 150.0, bounds);
        assert_eq!(tracker.position(), [1.0, -1.0]);
        assert!(tracker.is_active());
    }

    #[test]
    fn leave_parks_pointer() {
        let mut tracker = PointerTracker::new();
        tracker.on_move(10.0, 10.0, SurfaceBounds::from_size(20, 20));
        tracker.on_leave();
        assert_eq!(tracker.position(), POINTER_SENTINEL);
        assert!(!tracker.is_active());
    }

    #[test]
    fn zero_area_bounds_are_ignored() {
        let mut tracker = PointerTracker::new();
        tracker.on_move(5.0, 5.0, SurfaceBounds::from_size(0, 300));
        assert_eq!(tracker, PointerTracker::default());
    }
}
