//! Visual regression testing with screenshot comparison

use std::path::{Path, PathBuf};

use image::{GenericImageView, Pixel, RgbaImage};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::error::{E2eError, E2eResult};

/// Per-channel difference tolerated before a pixel counts as changed
pub const CHANNEL_TOLERANCE: i32 = 5;

/// Screenshot name for a route: `home` for `/`, else `/` replaced by `_`
pub fn screenshot_name(route: &str) -> String {
    if route == "/" {
        "home".to_string()
    } else {
        route.replace('/', "_")
    }
}

/// Result of a visual comparison
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VisualDiff {
    /// Whether the images match within threshold
    pub matches: bool,

    /// Percentage of pixels that differ
    pub diff_percent: f64,

    pub diff_pixels: u64,
    pub total_pixels: u64,

    /// Written only when pixels differ
    pub diff_image_path: Option<PathBuf>,

    /// True when no baseline existed and this screenshot became it
    pub baseline_created: bool,
}

/// Compares route screenshots against stored baselines
#[derive(Debug, Clone)]
pub struct VisualComparer {
    baseline_dir: PathBuf,
    diff_dir: PathBuf,

    /// Allowed differing pixels, in percent
    threshold: f64,
}

impl VisualComparer {
    pub fn new(config: VisualConfig) -> E2eResult<Self> {
        std::fs::create_dir_all(&config.baseline_dir)?;
        std::fs::create_dir_all(&config.diff_dir)?;

        Ok(Self {
            baseline_dir: config.baseline_dir,
            diff_dir: config.diff_dir,
            threshold: config.threshold,
        })
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Compare `actual_path` against the baseline called `name`
    pub fn compare(&self, name: &str, actual_path: &Path) -> E2eResult<VisualDiff> {
        if !actual_path.exists() {
            return Err(E2eError::ScreenshotNotFound(actual_path.to_path_buf()));
        }

        let baseline_path = self.baseline_dir.join(format!("{}.png", name));
        if !baseline_path.exists() {
            info!("Creating baseline for '{}'", name);
            std::fs::copy(actual_path, &baseline_path)?;
            return Ok(VisualDiff {
                matches: true,
                diff_percent: 0.0,
                diff_pixels: 0,
                total_pixels: 0,
                diff_image_path: None,
                baseline_created: true,
            });
        }

        let actual_img = image::open(actual_path)?;
        let total_pixels = (actual_img.width() as u64) * (actual_img.height() as u64);

        // Quick hash comparison
        if hash_file(actual_path)? == hash_file(&baseline_path)? {
            debug!("Screenshots match exactly (same hash)");
            return Ok(VisualDiff {
                matches: true,
                diff_percent: 0.0,
                diff_pixels: 0,
                total_pixels,
                diff_image_path: None,
                baseline_created: false,
            });
        }

        let baseline_img = image::open(&baseline_path)?;
        if actual_img.dimensions() != baseline_img.dimensions() {
            warn!(
                "Screenshot dimensions differ for '{}': actual {:?} vs baseline {:?}",
                name,
                actual_img.dimensions(),
                baseline_img.dimensions()
            );
        }

        // Compare over the union of both canvases; pixels outside the overlap count as changed
        let width = actual_img.width().max(baseline_img.width());
        let height = actual_img.height().max(baseline_img.height());
        let actual_rgba = actual_img.to_rgba8();
        let baseline_rgba = baseline_img.to_rgba8();

        let mut diff_img = RgbaImage::new(width, height);
        let mut diff_pixels = 0u64;

        for y in 0..height {
            for x in 0..width {
                let actual = pixel_at(&actual_rgba, x, y);
                let baseline = pixel_at(&baseline_rgba, x, y);

                match (actual, baseline) {
                    (Some(a), Some(b)) if !pixels_differ(a, b) => {
                        let c = a.channels();
                        diff_img.put_pixel(x, y, image::Rgba([c[0] / 2, c[1] / 2, c[2] / 2, 128]));
                    }
                    _ => {
                        diff_pixels += 1;
                        diff_img.put_pixel(x, y, image::Rgba([255, 0, 0, 255]));
                    }
                }
            }
        }

        let total_pixels = (width as u64) * (height as u64);
        let diff_percent = if total_pixels == 0 {
            0.0
        } else {
            (diff_pixels as f64 / total_pixels as f64) * 100.0
        };
        let matches = diff_percent <= self.threshold;

        let diff_image_path = if diff_pixels > 0 {
            let path = self.diff_dir.join(format!("{}-diff.png", name));
            diff_img.save(&path)?;
            Some(path)
        } else {
            None
        };

        if !matches {
            warn!(
                "Visual regression detected in '{}': {:.2}% pixels differ (threshold: {:.2}%)",
                name, diff_percent, self.threshold
            );
        }

        Ok(VisualDiff {
            matches,
            diff_percent,
            diff_pixels,
            total_pixels,
            diff_image_path,
            baseline_created: false,
        })
    }
}

fn pixel_at(img: &RgbaImage, x: u32, y: u32) -> Option<&image::Rgba<u8>> {
    (x < img.width() && y < img.height()).then(|| img.get_pixel(x, y))
}

fn pixels_differ(a: &image::Rgba<u8>, b: &image::Rgba<u8>) -> bool {
    a.channels()
        .iter()
        .zip(b.channels())
        .any(|(x, y)| (*x as i32 - *y as i32).abs() > CHANNEL_TOLERANCE)
}

fn hash_file(path: &Path) -> E2eResult<String> {
    let data = std::fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&data);
    Ok(hex::encode(hasher.finalize()))
}

/// Configuration for visual testing
#[derive(Debug, Clone)]
pub struct VisualConfig {
    pub baseline_dir: PathBuf,
    pub diff_dir: PathBuf,
    pub threshold: f64,
}

impl VisualConfig {
    /// Standard layout under a project's `.cache`
    pub fn under(cache_dir: &Path, threshold: f64) -> Self {
        Self {
            baseline_dir: cache_dir.join("visual").join("baselines"),
            diff_dir: cache_dir.join("visual").join("diffs"),
            threshold,
        }
    }
}
