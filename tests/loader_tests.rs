use std::path::{Path, PathBuf};

use crossbeam_channel::unbounded;
use reveal_portrait::error::LoadError;
use reveal_portrait::events::{ImageSlot, LoaderEvent, PreparedImage};
use reveal_portrait::render::loader::{self, LoadRequest};
use tokio_util::sync::CancellationToken;

fn write_png(path: &Path, width: u32, height: u32) {
    let img = image::RgbaImage::from_pixel(width, height, image::Rgba([200, 100, 50, 255]));
    img.save(path).unwrap();
}

#[test]
fn decode_downscales_large_images() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("wide.png");
    write_png(&path, 400, 100);

    let prepared = loader::decode(ImageSlot::Base, path.clone(), 200).unwrap();
    assert_eq!((prepared.width, prepared.height), (200, 50));
    assert_eq!(prepared.pixels.len(), 200 * 50 * 4);
    assert_eq!(prepared.slot, ImageSlot::Base);
    assert_eq!(prepared.path, path);
}

#[test]
fn decode_keeps_small_images() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("small.png");
    write_png(&path, 30, 20);

    let prepared = loader::decode(ImageSlot::Reveal, path, 4096).unwrap();
    assert_eq!((prepared.width, prepared.height), (30, 20));
    assert_eq!(&prepared.pixels[..4], &[200, 100, 50, 255]);
}

#[test]
fn decode_reports_unreadable_files() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.png");
    std::fs::write(&path, b"not an image").unwrap();

    let err = loader::decode(ImageSlot::Base, path.clone(), 4096).unwrap_err();
    match err {
        LoadError::Decode { path: p, .. } => assert_eq!(p, path),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn run_reports_each_slot_once() {
    let dir = tempfile::tempdir().unwrap();
    let good = dir.path().join("base.png");
    write_png(&good, 8, 8);
    let missing = dir.path().join("missing.png");

    let (tx, rx) = unbounded();
    let requests = vec![
        LoadRequest {
            slot: ImageSlot::Base,
            path: good,
        },
        LoadRequest {
            slot: ImageSlot::Reveal,
            path: missing,
        },
    ];
    loader::run(requests, 4096, tx, CancellationToken::new())
        .await
        .unwrap();

    let events: Vec<LoaderEvent> = rx.try_iter().collect();
    assert_eq!(events.len(), 2);
    assert!(events.iter().any(|e| matches!(e, LoaderEvent::Loaded(img) if img.slot == ImageSlot::Base)));
    assert!(events.iter().any(|e| matches!(
        e,
        LoaderEvent::Failed { slot: ImageSlot::Reveal, .. }
    )));
}

#[tokio::test]
async fn run_stops_when_cancelled() {
    let (tx, rx) = unbounded();
    let cancel = CancellationToken::new();
    cancel.cancel();
    loader::run(Vec::new(), 4096, tx, cancel).await.unwrap();
    assert!(rx.try_recv().is_err());
}

fn solid(width: u32, height: u32) -> PreparedImage {
    PreparedImage {
        slot: ImageSlot::Reveal,
        path: PathBuf::from("solid.png"),
        width,
        height,
        pixels: vec![0; width as usize * height as usize * 4],
    }
}

#[test]
fn downscale_fits_device_limit() {
    let small = loader::downscale(&solid(300, 100), 128).unwrap();
    assert_eq!((small.width, small.height), (128, 43));
    assert_eq!(small.pixels.len(), 128 * 43 * 4);
    assert_eq!(small.slot, ImageSlot::Reveal);
    assert!(small.pixels.iter().all(|p| *p == 0));
}

#[test]
fn downscale_rejects_short_buffers() {
    let mut broken = solid(64, 64);
    broken.pixels.truncate(100);
    assert!(loader::downscale(&broken, 32).is_none());
}
