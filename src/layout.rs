//! Sizing helpers: image fit, mask resolution, and mask-space projection.

/// Width over height, or `None` for a zero-area surface.
pub fn aspect(width: u32, height: u32) -> Option<f32> {
    if width == 0 || height == 0 {
        return None;
    }
    Some(width as f32 / height as f32)
}

/// Size in surface pixels of a plane centred on the surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaneSize {
    pub width: f32,
    pub height: f32,
}

/// Scale an image to cover the surface while keeping its aspect ratio.
///
/// The dimension that overflows is cropped by the surface edges.
pub fn cover_plane(img_w: u32, img_h: u32, surface_w: u32, surface_h: u32) -> Option<PlaneSize> {
    let img_aspect = aspect(img_w, img_h)?;
    let surface_aspect = aspect(surface_w, surface_h)?;
    let (sw, sh) = (surface_w as f32, surface_h as f32);
    let plane = if img_aspect > surface_aspect {
        PlaneSize {
            width: sh * img_aspect,
            height: sh,
        }
    } else {
        PlaneSize {
            width: sw,
            height: sw / img_aspect,
        }
    };
    Some(plane)
}

/// Mask grid resolution for a surface, at least 1×1 when the surface has area.
pub fn mask_dims(surface_w: u32, surface_h: u32, scale: f32) -> Option<(u32, u32)> {
    aspect(surface_w, surface_h)?;
    let scale = if scale.is_finite() && scale > 0.0 {
        scale.min(1.0)
    } else {
        1.0
    };
    let w = ((surface_w as f32 * scale).round() as u32).max(1);
    let h = ((surface_h as f32 * scale).round() as u32).max(1);
    Some((w, h))
}

/// Texture coordinate in the mask for a clip-space position (row 0 at the top).
pub fn ndc_to_mask_uv(ndc: [f32; 2]) -> [f32; 2] {
    [ndc[0] * 0.5 + 0.5, 0.5 - ndc[1] * 0.5]
}

/// Largest size within `max_dim` on both sides, keeping aspect. Never upscales.
pub fn fit_within(width: u32, height: u32, max_dim: u32) -> (u32, u32) {
    let max_dim = max_dim.max(1);
    if width <= max_dim && height <= max_dim {
        return (width, height);
    }
    let iw = width.max(1) as f32;
    let ih = height.max(1) as f32;
    let scale = (max_dim as f32 / iw).min(max_dim as f32 / ih);
    let w = (iw * scale).round().clamp(1.0, max_dim as f32);
    let h = (ih * scale).round().clamp(1.0, max_dim as f32);
    (w as u32, h as u32)
}
