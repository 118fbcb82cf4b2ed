use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, ensure};
use serde::Deserialize;

use crate::mask::kernel::DEFAULT_THRESHOLD;

/// Brush and compositing parameters of the reveal effect.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct RevealConfig {
    /// Brush radius in normalized surface units (surface height spans 2.0).
    #[serde(default = "RevealConfig::default_radius")]
    pub radius: f32,
    /// Time for a fully revealed texel to fade at the uncapped decay rate.
    #[serde(default = "RevealConfig::default_duration", with = "humantime_serde")]
    pub duration: Duration,
    /// Mask value below which reveal pixels are discarded.
    #[serde(default = "RevealConfig::default_threshold")]
    pub threshold: f32,
}

impl RevealConfig {
    const fn default_radius() -> f32 {
        0.35
    }

    const fn default_duration() -> Duration {
        Duration::from_secs(2)
    }

    const fn default_threshold() -> f32 {
        DEFAULT_THRESHOLD
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.radius.is_finite() && self.radius > 0.0,
            "reveal.radius must be a positive number"
        );
        ensure!(
            !self.duration.is_zero(),
            "reveal.duration must be greater than zero"
        );
        ensure!(
            self.threshold.is_finite() && self.threshold > 0.0 && self.threshold <= 1.0,
            "reveal.threshold must be within (0, 1]"
        );
        Ok(())
    }
}

impl Default for RevealConfig {
    fn default() -> Self {
        Self {
            radius: Self::default_radius(),
            duration: Self::default_duration(),
            threshold: Self::default_threshold(),
        }
    }
}

/// Where the decay/paint pass runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum MaskBackend {
    /// Fragment shader into a float render target with a copied feedback texture.
    #[default]
    Gpu,
    /// Ping-pong buffers on the render thread, uploaded each frame.
    Cpu,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct MaskConfig {
    #[serde(default)]
    pub backend: MaskBackend,
    /// Mask resolution relative to the surface, in `(0, 1]`.
    #[serde(default = "MaskConfig::default_resolution_scale")]
    pub resolution_scale: f32,
}

impl MaskConfig {
    const fn default_resolution_scale() -> f32 {
        1.0
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.resolution_scale.is_finite()
                && self.resolution_scale > 0.0
                && self.resolution_scale <= 1.0,
            "mask.resolution-scale must be within (0, 1]"
        );
        if self.backend == MaskBackend::Cpu && self.resolution_scale > 0.5 {
            tracing::warn!(
                scale = self.resolution_scale,
                "cpu mask backend at a high resolution-scale may not keep up with the display"
            );
        }
        Ok(())
    }
}

impl Default for MaskConfig {
    fn default() -> Self {
        Self {
            backend: MaskBackend::default(),
            resolution_scale: Self::default_resolution_scale(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct WindowConfig {
    #[serde(default = "WindowConfig::default_title")]
    pub title: String,
    #[serde(default = "WindowConfig::default_width")]
    pub width: u32,
    #[serde(default = "WindowConfig::default_height")]
    pub height: u32,
    #[serde(default)]
    pub fullscreen: bool,
    #[serde(default = "WindowConfig::default_hide_cursor")]
    pub hide_cursor: bool,
    /// Clear colour shown around and beneath the planes (sRGB).
    #[serde(default = "WindowConfig::default_background")]
    pub background: [u8; 3],
}

impl WindowConfig {
    fn default_title() -> String {
        "reveal portrait".to_string()
    }

    const fn default_width() -> u32 {
        1280
    }

    const fn default_height() -> u32 {
        800
    }

    const fn default_hide_cursor() -> bool {
        true
    }

    const fn default_background() -> [u8; 3] {
        [10, 10, 10]
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.width > 0 && self.height > 0,
            "window.width and window.height must be greater than zero"
        );
        Ok(())
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: Self::default_title(),
            width: Self::default_width(),
            height: Self::default_height(),
            fullscreen: false,
            hide_cursor: Self::default_hide_cursor(),
            background: Self::default_background(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct LoaderConfig {
    /// Decoded images larger than this on either side are downscaled.
    #[serde(default = "LoaderConfig::default_max_dimension")]
    pub max_dimension: u32,
}

impl LoaderConfig {
    const fn default_max_dimension() -> u32 {
        4096
    }
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            max_dimension: Self::default_max_dimension(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct Configuration {
    /// Image drawn underneath; always visible once loaded.
    pub base_image: PathBuf,
    /// Image wiped in wherever the mask is set.
    pub reveal_image: PathBuf,
    #[serde(default)]
    pub reveal: RevealConfig,
    #[serde(default)]
    pub mask: MaskConfig,
    #[serde(default)]
    pub window: WindowConfig,
    #[serde(default)]
    pub loader: LoaderConfig,
}

impl Configuration {
    /// Parse a YAML file; relative image paths resolve against the file's directory.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let s = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let mut cfg: Self = serde_yaml::from_str(&s)?;
        if let Some(dir) = path.parent() {
            cfg.resolve_relative_to(dir);
        }
        Ok(cfg)
    }

    fn resolve_relative_to(&mut self, dir: &Path) {
        for image in [&mut self.base_image, &mut self.reveal_image] {
            if image.is_relative() {
                *image = dir.join(&*image);
            }
        }
    }

    /// Validate runtime invariants that cannot be expressed via serde defaults alone.
    pub fn validated(self) -> Result<Self> {
        ensure!(
            !self.base_image.as_os_str().is_empty(),
            "base-image must not be empty"
        );
        ensure!(
            !self.reveal_image.as_os_str().is_empty(),
            "reveal-image must not be empty"
        );
        ensure!(
            self.loader.max_dimension > 0,
            "loader.max-dimension must be greater than zero"
        );
        self.reveal.validate().context("invalid reveal options")?;
        self.mask.validate().context("invalid mask options")?;
        self.window.validate().context("invalid window options")?;
        Ok(self)
    }
}
