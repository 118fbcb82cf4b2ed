use std::path::PathBuf;

use crate::error::LoadError;

/// Window input queued between frames and drained before the mask pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SurfaceEvent {
    /// Client coordinates in physical pixels relative to the surface origin.
    PointerMoved { x: f64, y: f64 },
    PointerLeft,
    Resized { width: u32, height: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageSlot {
    Base,
    Reveal,
}

impl ImageSlot {
    pub const ALL: [Self; 2] = [Self::Base, Self::Reveal];

    /// Draw order, base first.
    pub fn index(self) -> usize {
        match self {
            Self::Base => 0,
            Self::Reveal => 1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Base => "base",
            Self::Reveal => "reveal",
        }
    }
}

/// Decoded RGBA8 image ready for upload.
#[derive(Debug, Clone)]
pub struct PreparedImage {
    pub slot: ImageSlot,
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

#[derive(Debug)]
pub enum LoaderEvent {
    Loaded(PreparedImage),
    Failed { slot: ImageSlot, error: LoadError },
}
