//! Background image loader.
//! Decodes the base and reveal images off the render thread, downscales them
//! to the configured limit, and hands RGBA8 frames to the viewer without
//! blocking the render loop.
use std::path::PathBuf;

use anyhow::Result;
use crossbeam_channel::Sender;
use image::imageops::FilterType;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::LoadError;
use crate::events::{ImageSlot, LoaderEvent, PreparedImage};
use crate::layout::fit_within;

#[derive(Debug, Clone)]
pub struct LoadRequest {
    pub slot: ImageSlot,
    pub path: PathBuf,
}

/// Decode one image and shrink it to fit within `max_dim` on both sides.
pub fn decode(slot: ImageSlot, path: PathBuf, max_dim: u32) -> Result<PreparedImage, LoadError> {
    let img = match image::open(&path) {
        Ok(img) => img,
        Err(source) => return Err(LoadError::Decode { path, source }),
    };
    let (w, h) = (img.width(), img.height());
    if w == 0 || h == 0 {
        return Err(LoadError::Empty(path));
    }
    let (tw, th) = fit_within(w, h, max_dim);
    let img = if (tw, th) != (w, h) {
        debug!(slot = slot.as_str(), from_w = w, from_h = h, to_w = tw, to_h = th, "downscaling image");
        img.resize_exact(tw, th, FilterType::Triangle)
    } else {
        img
    };
    let rgba = img.to_rgba8();
    Ok(PreparedImage {
        slot,
        path,
        width: rgba.width(),
        height: rgba.height(),
        pixels: rgba.into_raw(),
    })
}

/// Shrink an already decoded image so neither side exceeds `max_dim`.
///
/// Returns `None` when the pixel buffer is shorter than its stated size.
pub fn downscale(prepared: &PreparedImage, max_dim: u32) -> Option<PreparedImage> {
    let rgba = image::RgbaImage::from_raw(prepared.width, prepared.height, prepared.pixels.clone())?;
    let (tw, th) = fit_within(prepared.width, prepared.height, max_dim);
    let resized = image::imageops::resize(&rgba, tw, th, FilterType::Triangle);
    Some(PreparedImage {
        slot: prepared.slot,
        path: prepared.path.clone(),
        width: tw,
        height: th,
        pixels: resized.into_raw(),
    })
}

/// Decode every request concurrently and report each outcome once.
///
/// Returns when all requests resolved, the viewer hung up, or `cancel` fired.
pub async fn run(
    requests: Vec<LoadRequest>,
    max_dim: u32,
    to_viewer: Sender<LoaderEvent>,
    cancel: CancellationToken,
) -> Result<()> {
    let mut in_flight = JoinSet::new();
    for LoadRequest { slot, path } in requests {
        in_flight.spawn(async move {
            let job_path = path.clone();
            let outcome = tokio::task::spawn_blocking(move || decode(slot, job_path, max_dim)).await;
            match outcome {
                Ok(result) => (slot, result),
                Err(_) => (slot, Err(LoadError::Aborted(path))),
            }
        });
    }

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                in_flight.abort_all();
                break;
            }
            next = in_flight.join_next() => {
                let Some(joined) = next else { break };
                let (slot, result) = match joined {
                    Ok(pair) => pair,
                    Err(err) => {
                        warn!("image loader task failed: {err}");
                        continue;
                    }
                };
                let event = match result {
                    Ok(image) => {
                        info!(
                            slot = slot.as_str(),
                            width = image.width,
                            height = image.height,
                            path = %image.path.display(),
                            "image decoded"
                        );
                        LoaderEvent::Loaded(image)
                    }
                    Err(error) => {
                        warn!(slot = slot.as_str(), error = %error, "image failed to load; layer stays hidden");
                        LoaderEvent::Failed { slot, error }
                    }
                };
                if to_viewer.send(event).is_err() {
                    debug!("viewer dropped loader channel; stopping");
                    in_flight.abort_all();
                    break;
                }
            }
        }
    }
    Ok(())
}
