pub mod kernel;
pub mod noise;

use kernel::{StepParams, texel_ndc, update_texel};

use crate::layout;

/// Double-buffered scalar reveal mask.
///
/// Each [`step`](MaskField::step) reads the front buffer and writes the back
/// buffer, then swaps them; the two never alias within a step.
#[derive(Debug, Clone)]
pub struct MaskField {
    width: u32,
    height: u32,
    front: Vec<f32>,
    back: Vec<f32>,
}

impl MaskField {
    pub fn new(width: u32, height: u32) -> Self {
        let len = width as usize * height as usize;
        Self {
            width,
            height,
            front: vec![0.0; len],
            back: vec![0.0; len],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn is_empty(&self) -> bool {
        self.front.is_empty()
    }

    /// Reallocate at a new resolution. History is dropped, not resampled.
    /// Returns `false` when the size is unchanged and the mask was kept.
    pub fn resize(&mut self, width: u32, height: u32) -> bool {
        if self.width == width && self.height == height {
            return false;
        }
        *self = Self::new(width, height);
        true
    }

    /// Advance the mask by one frame. A zero-area field is left untouched.
    pub fn step(&mut self, params: &StepParams) {
        if self.is_empty() {
            return;
        }
        let (w, h) = (self.width, self.height);
        for y in 0..h {
            let row = y as usize * w as usize;
            for x in 0..w {
                let idx = row + x as usize;
                self.back[idx] = update_texel(self.front[idx], texel_ndc(x, y, w, h), params);
            }
        }
        std::mem::swap(&mut self.front, &mut self.back);
    }

    pub fn values(&self) -> &[f32] {
        &self.front
    }

    pub fn value(&self, x: u32, y: u32) -> Option<f32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.front
            .get(y as usize * self.width as usize + x as usize)
            .copied()
    }

    /// Nearest texel to a normalized device coordinate.
    pub fn sample_ndc(&self, ndc: [f32; 2]) -> Option<f32> {
        if self.is_empty() || !ndc[0].is_finite() || !ndc[1].is_finite() {
            return None;
        }
        let [u, v] = layout::ndc_to_mask_uv(ndc).map(|c| c.clamp(0.0, 1.0));
        let x = ((u * self.width as f32) as u32).min(self.width - 1);
        let y = ((v * self.height as f32) as u32).min(self.height - 1);
        self.value(x, y)
    }

    pub fn peak(&self) -> f32 {
        self.front.iter().copied().fold(0.0, f32::max)
    }

    /// Quantize into `out` as tightly packed `R8Unorm` rows.
    pub fn write_r8(&self, out: &mut Vec<u8>) {
        out.clear();
        out.extend(
            self.front
                .iter()
                .map(|v| (kernel::clamp01(*v) * 255.0).round() as u8),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn centre_brush(active: bool) -> StepParams {
        StepParams {
            pointer: [0.0, 0.0],
            active,
            radius: 0.35,
            duration: 2.0,
            delta: 0.016,
            elapsed: 0.0,
            aspect: 1.0,
        }
    }

    #[test]
    fn first_frame_starts_from_zero() {
        let mut field = MaskField::new(16, 16);
        field.step(&centre_brush(false));
        assert!(field.values().iter().all(|v| *v == 0.0));
    }

    #[test]
    fn painting_raises_centre_only() {
        let mut field = MaskField::new(64, 64);
        field.step(&centre_brush(true));
        let centre = field.sample_ndc([0.0, 0.0]).unwrap();
        let corner = field.value(0, 0).unwrap();
        assert!(centre > 0.15, "centre {centre}");
        assert_eq!(corner, 0.0);
    }

    #[test]
    fn resize_same_size_keeps_history() {
        let mut field = MaskField::new(8, 8);
        field.step(&centre_brush(true));
        let before = field.peak();
        assert!(!field.resize(8, 8));
        assert_eq!(field.peak(), before);
    }

    #[test]
    fn zero_area_step_is_noop() {
        let mut field = MaskField::new(0, 10);
        field.step(&centre_brush(true));
        assert!(field.is_empty());
        assert_eq!(field.sample_ndc([0.0, 0.0]), None);
    }

    #[test]
    fn r8_export_matches_dimensions() {
        let mut field = MaskField::new(4, 3);
        field.step(&centre_brush(true));
        let mut bytes = Vec::new();
        field.write_r8(&mut bytes);
        assert_eq!(bytes.len(), 12);
    }
}
