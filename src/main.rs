//! Binary entrypoint for the reveal portrait viewer.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use crossbeam_channel::bounded;
use reveal_portrait::config::Configuration;
use reveal_portrait::events::ImageSlot;
use reveal_portrait::render::{loader, viewer};
use reveal_portrait::simulate;
use tokio_util::sync::CancellationToken;
use tracing::{Level, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Debug, Parser)]
#[command(
    name = "reveal-portrait",
    version,
    about = "pointer-reactive image reveal"
)]
struct Args {
    /// Path to YAML config
    #[arg(value_name = "CONFIG")]
    config: PathBuf,
    /// Override reveal.radius
    #[arg(long, value_name = "RADIUS")]
    radius: Option<f32>,
    /// Override reveal.duration (e.g. "1500ms", "2s")
    #[arg(long, value_name = "DURATION", value_parser = humantime::parse_duration)]
    duration: Option<Duration>,
    /// Step the mask headlessly for N hover frames and N release frames, then exit
    #[arg(long = "simulate-frames", value_name = "FRAMES")]
    simulate_frames: Option<usize>,
    /// Increase log verbosity (repeatable)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbosity: u8) -> Result<()> {
    let level = match verbosity {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::new(format!("reveal_portrait={level}"))
            .add_directive("wgpu=warn".parse()?)
            .add_directive("winit=warn".parse()?),
    };
    fmt().with_env_filter(filter).with_target(false).compact().init();
    Ok(())
}

fn print_simulation(report: &simulate::SimulationReport, threshold: f32) {
    let (w, h) = report.mask_size;
    println!("mask {w}x{h}");
    for (phase, samples) in [("hover", &report.hover), ("release", &report.release)] {
        for s in samples.iter() {
            println!(
                "{phase:>7} frame {:>4}  t={:>7.3}s  centre={:.4}  peak={:.4}",
                s.frame, s.elapsed, s.centre, s.peak
            );
        }
    }
    match report.concealed_after(threshold) {
        Some(s) => println!("centre concealed at frame {} (t={:.3}s)", s.frame, s.elapsed),
        None => println!("centre still revealed after the last frame"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose)?;

    let mut cfg = Configuration::from_yaml_file(&args.config)
        .with_context(|| format!("failed to load configuration from {}", args.config.display()))?;
    if let Some(radius) = args.radius {
        cfg.reveal.radius = radius;
    }
    if let Some(duration) = args.duration {
        cfg.reveal.duration = duration;
    }
    let cfg = cfg.validated().context("invalid configuration values")?;
    info!(
        "Loaded configuration from {}:\n{:#?}",
        args.config.display(),
        cfg
    );

    if let Some(frames) = args.simulate_frames {
        let report = simulate::run(&cfg, frames)?;
        print_simulation(&report, cfg.reveal.threshold);
        return Ok(());
    }

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!("ctrl-c handler failed: {err}");
                return;
            }
            info!("ctrl-c received; initiating shutdown");
            cancel.cancel();
        });
    }

    let (to_viewer, from_loader) = bounded(ImageSlot::ALL.len());
    let requests = vec![
        loader::LoadRequest {
            slot: ImageSlot::Base,
            path: cfg.base_image.clone(),
        },
        loader::LoadRequest {
            slot: ImageSlot::Reveal,
            path: cfg.reveal_image.clone(),
        },
    ];
    let loader_task = tokio::spawn({
        let cancel = cancel.clone();
        let max_dim = cfg.loader.max_dimension;
        async move {
            loader::run(requests, max_dim, to_viewer, cancel)
                .await
                .context("loader task failed")
        }
    });

    // Runs on the main thread until the window closes or cancellation fires.
    let viewer_result = viewer::run_windowed(cfg, from_loader, cancel.clone());
    cancel.cancel();

    match loader_task.await {
        Ok(Err(err)) => warn!("{err:?}"),
        Err(err) => warn!("loader task panicked: {err}"),
        Ok(Ok(())) => {}
    }
    viewer_result.context("viewer failed")
}
