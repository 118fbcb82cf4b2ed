use std::path::PathBuf;

use thiserror::Error;

/// Failure to bring up the rendering context. Fatal at construction.
#[derive(Debug, Error)]
pub enum InitError {
    #[error("failed to create rendering surface")]
    Surface(#[from] wgpu::CreateSurfaceError),

    #[error("no compatible GPU adapter found")]
    Adapter(#[from] wgpu::RequestAdapterError),

    #[error("failed to acquire GPU device")]
    Device(#[from] wgpu::RequestDeviceError),

    #[error("surface reports no supported texture formats")]
    NoSurfaceFormat,
}

/// Failure to prepare one of the two images. The affected layer stays hidden.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to decode {path}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("{0} has zero width or height")]
    Empty(PathBuf),

    #[error("decode task for {0} did not complete")]
    Aborted(PathBuf),
}
