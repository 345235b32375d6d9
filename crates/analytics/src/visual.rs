//! Screenshot comparison between attempts of the same test

use std::path::{Path, PathBuf};
use tracing::debug;

use cynova_common::{CyNovaRun, ScreenshotDiffInsight, TestResultNode};

/// Default per-pixel similarity threshold (0.0 - 1.0, lower is stricter)
pub const DEFAULT_THRESHOLD: f64 = 0.1;

/// Screenshot diffing capability, resolved once when the engine is built
#[derive(Debug, Clone)]
pub enum ScreenshotDiffer {
    /// Built without image support; no diffs are reported
    Unavailable,

    #[cfg(feature = "screenshot-diff")]
    Pixel(PixelDiffer),
}

impl ScreenshotDiffer {
    /// Pick the best differ compiled into this build
    pub fn resolve(diff_dir: PathBuf) -> Self {
        #[cfg(feature = "screenshot-diff")]
        {
            ScreenshotDiffer::Pixel(PixelDiffer::new(diff_dir, DEFAULT_THRESHOLD))
        }
        #[cfg(not(feature = "screenshot-diff"))]
        {
            tracing::info!(
                "Screenshot diffing not compiled in, skipping diffs for {}",
                diff_dir.display()
            );
            ScreenshotDiffer::Unavailable
        }
    }

    pub fn is_available(&self) -> bool {
        !matches!(self, ScreenshotDiffer::Unavailable)
    }

    /// Compare the first two screenshots of every test in the run
    ///
    /// Relative screenshot paths resolve against the run's project root when
    /// it is known. Failures are reported per test, never propagated.
    pub fn diff_run(&self, run: &CyNovaRun) -> Vec<ScreenshotDiffInsight> {
        if !self.is_available() {
            return Vec::new();
        }

        let root = run.project_root.as_deref().map(Path::new);
        let mut insights = Vec::new();

        for (spec, test) in run.tests() {
            let paths = candidate_paths(test);
            let Some(baseline) = paths.first() else {
                continue;
            };

            let resolved: Vec<PathBuf> = paths.iter().map(|p| resolve(root, p)).collect();
            if resolved.len() == 2 && resolved.iter().all(|p| p.exists()) {
                let name = diff_file_stem(&spec.spec_relative, &test.id);
                insights.push(self.diff_pair(
                    &test.id,
                    &spec.spec_relative,
                    (paths[0].as_str(), resolved[0].as_path()),
                    (paths[1].as_str(), resolved[1].as_path()),
                    &name,
                ));
            } else {
                debug!("Not enough screenshots on disk to diff '{}'", test.id);
                insights.push(ScreenshotDiffInsight::skipped(&test.id, &spec.spec_relative, baseline));
            }
        }

        insights
    }

    fn diff_pair(
        &self,
        test_id: &str,
        spec_relative: &str,
        baseline: (&str, &Path),
        compare: (&str, &Path),
        name: &str,
    ) -> ScreenshotDiffInsight {
        match self {
            ScreenshotDiffer::Unavailable => {
                ScreenshotDiffInsight::skipped(test_id, spec_relative, baseline.0)
            }
            #[cfg(feature = "screenshot-diff")]
            ScreenshotDiffer::Pixel(differ) => {
                differ.diff(test_id, spec_relative, baseline, compare, name)
            }
        }
    }
}

/// Up to two distinct screenshot paths across all attempts, in attempt order
fn candidate_paths(test: &TestResultNode) -> Vec<String> {
    let mut paths: Vec<String> = Vec::with_capacity(2);
    for shot in test.attempts.iter().flat_map(|a| a.screenshots.iter()) {
        if shot.path.is_empty() || paths.contains(&shot.path) {
            continue;
        }
        paths.push(shot.path.clone());
        if paths.len() == 2 {
            break;
        }
    }
    paths
}

fn resolve(root: Option<&Path>, path: &str) -> PathBuf {
    let path = Path::new(path);
    match root {
        Some(root) if path.is_relative() => root.join(path),
        _ => path.to_path_buf(),
    }
}

/// File-system safe stem for a test's diff image
fn diff_file_stem(spec: &str, test_id: &str) -> String {
    format!("{spec}--{test_id}")
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .collect()
}

#[cfg(feature = "screenshot-diff")]
pub use pixel::PixelDiffer;

#[cfg(feature = "screenshot-diff")]
mod pixel {
    use image::{GenericImageView, Pixel, Rgba, RgbaImage};
    use sha2::{Digest, Sha256};
    use std::path::{Path, PathBuf};
    use tracing::{debug, warn};

    use cynova_common::{Error, Result, ScreenshotDiffInsight, ScreenshotDiffStatus};

    /// YIQ distance of two fully different colors, as used by pixelmatch
    const MAX_YIQ_DELTA: f64 = 35215.0;

    /// Pixel-by-pixel comparison backed by the `image` crate
    #[derive(Debug, Clone)]
    pub struct PixelDiffer {
        /// Directory for diff images
        diff_dir: PathBuf,

        /// Similarity threshold (0.0 - 1.0)
        threshold: f64,
    }

    /// Raw counts from one comparison
    #[derive(Debug, Clone, PartialEq)]
    pub struct PixelDiff {
        pub diff_pixels: u64,
        pub total_pixels: u64,
        pub diff_image_path: PathBuf,
    }

    impl PixelDiff {
        pub fn ratio(&self) -> f64 {
            if self.total_pixels == 0 {
                0.0
            } else {
                self.diff_pixels as f64 / self.total_pixels as f64
            }
        }
    }

    impl PixelDiffer {
        pub fn new(diff_dir: PathBuf, threshold: f64) -> Self {
            Self {
                diff_dir,
                threshold: threshold.clamp(0.0, 1.0),
            }
        }

        /// Diff two screenshots and describe the outcome
        pub(crate) fn diff(
            &self,
            test_id: &str,
            spec_relative: &str,
            (baseline_label, baseline): (&str, &Path),
            (compare_label, compare): (&str, &Path),
            name: &str,
        ) -> ScreenshotDiffInsight {
            match self.compare(baseline, compare, name) {
                Ok(diff) => ScreenshotDiffInsight {
                    test_id: test_id.to_string(),
                    spec_relative: spec_relative.to_string(),
                    baseline_path: Some(baseline_label.to_string()),
                    compare_path: Some(compare_label.to_string()),
                    diff_image_path: Some(diff.diff_image_path.to_string_lossy().to_string()),
                    total_pixels: Some(diff.total_pixels),
                    diff_pixels: Some(diff.diff_pixels),
                    diff_ratio: Some(diff.ratio()),
                    status: ScreenshotDiffStatus::Computed,
                    error_message: None,
                },
                Err(e) => {
                    warn!("Screenshot diff failed for '{}': {}", test_id, e);
                    ScreenshotDiffInsight::failed(
                        test_id,
                        spec_relative,
                        baseline_label,
                        compare_label,
                        e.to_string(),
                    )
                }
            }
        }

        /// Compare the overlapping region of two images and save a diff image
        pub fn compare(&self, baseline: &Path, compare: &Path, name: &str) -> Result<PixelDiff> {
            let baseline_img = image::open(baseline).map_err(|e| Error::Image(e.to_string()))?;
            let compare_img = image::open(compare).map_err(|e| Error::Image(e.to_string()))?;

            let (bw, bh) = baseline_img.dimensions();
            let (cw, ch) = compare_img.dimensions();
            let width = bw.min(cw);
            let height = bh.min(ch);
            if width == 0 || height == 0 {
                return Err(Error::Image(format!(
                    "no overlapping region ({}x{} vs {}x{})",
                    bw, bh, cw, ch
                )));
            }
            if (bw, bh) != (cw, ch) {
                debug!("Screenshot dimensions differ, comparing {}x{} overlap", width, height);
            }

            std::fs::create_dir_all(&self.diff_dir)?;
            let diff_image_path = self.diff_dir.join(format!("{}-diff.png", name));
            let total_pixels = u64::from(width) * u64::from(height);

            // Identical files need no pixel walk
            if hash_file(baseline)? == hash_file(compare)? {
                debug!("Screenshots match exactly (same hash)");
                let mut diff_img = RgbaImage::new(width, height);
                let baseline_rgba = baseline_img.to_rgba8();
                for (x, y, px) in diff_img.enumerate_pixels_mut() {
                    *px = dimmed(baseline_rgba.get_pixel(x, y));
                }
                diff_img.save(&diff_image_path).map_err(|e| Error::Image(e.to_string()))?;
                return Ok(PixelDiff {
                    diff_pixels: 0,
                    total_pixels,
                    diff_image_path,
                });
            }

            let baseline_rgba = baseline_img.to_rgba8();
            let compare_rgba = compare_img.to_rgba8();
            let mut diff_img = RgbaImage::new(width, height);
            let mut diff_pixels = 0u64;

            for y in 0..height {
                for x in 0..width {
                    let a = baseline_rgba.get_pixel(x, y);
                    let b = compare_rgba.get_pixel(x, y);

                    if self.pixels_differ(a, b) {
                        diff_pixels += 1;
                        // Mark diff pixels in red
                        diff_img.put_pixel(x, y, Rgba([255, 0, 0, 255]));
                    } else {
                        diff_img.put_pixel(x, y, dimmed(a));
                    }
                }
            }

            diff_img.save(&diff_image_path).map_err(|e| Error::Image(e.to_string()))?;

            Ok(PixelDiff {
                diff_pixels,
                total_pixels,
                diff_image_path,
            })
        }

        /// Perceptual color distance in YIQ space against the threshold
        fn pixels_differ(&self, a: &Rgba<u8>, b: &Rgba<u8>) -> bool {
            if a == b {
                return false;
            }
            let max_delta = MAX_YIQ_DELTA * self.threshold * self.threshold;
            yiq_delta(a, b) > max_delta
        }
    }

    /// Keep the original but dim it
    fn dimmed(px: &Rgba<u8>) -> Rgba<u8> {
        let c = px.channels();
        Rgba([c[0] / 2, c[1] / 2, c[2] / 2, 128])
    }

    /// Squared YIQ distance with both colors blended over white
    fn yiq_delta(a: &Rgba<u8>, b: &Rgba<u8>) -> f64 {
        let blend = |px: &Rgba<u8>| {
            let c = px.channels();
            let alpha = f64::from(c[3]) / 255.0;
            let ch = |v: u8| 255.0 + (f64::from(v) - 255.0) * alpha;
            (ch(c[0]), ch(c[1]), ch(c[2]))
        };
        let (r1, g1, b1) = blend(a);
        let (r2, g2, b2) = blend(b);

        let y = |r: f64, g: f64, b: f64| r * 0.29889531 + g * 0.58662247 + b * 0.11448223;
        let i = |r: f64, g: f64, b: f64| r * 0.59597799 - g * 0.27417610 - b * 0.32180189;
        let q = |r: f64, g: f64, b: f64| r * 0.21147017 - g * 0.52261711 + b * 0.31114694;

        let dy = y(r1, g1, b1) - y(r2, g2, b2);
        let di = i(r1, g1, b1) - i(r2, g2, b2);
        let dq = q(r1, g1, b1) - q(r2, g2, b2);

        0.5053 * dy * dy + 0.299 * di * di + 0.1957 * dq * dq
    }

    /// Hash a file using SHA256
    fn hash_file(path: &Path) -> Result<String> {
        let data = std::fs::read(path)?;
        let mut hasher = Sha256::new();
        hasher.update(&data);
        Ok(hex::encode(hasher.finalize()))
    }

}
