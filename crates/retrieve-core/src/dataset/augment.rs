//! Offline augmentation of the training split.
//!
//! For the first images of every class folder a random transform family is
//! drawn (never the family drawn just before in that folder) and its variants
//! are written as JPEG files named `<prefix><j>.jpg`, where `j` is the index of
//! the source image in its folder.

use image::{DynamicImage, Rgb, RgbImage};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::PipelineError;

use super::discovery::{ImageSet, LabeledImage};

/// Images per class folder that get augmented.
pub const DEFAULT_IMAGES_PER_CLASS: usize = 2;

const BLUR_SIGMA: f32 = 5.0;
const CROP_OFFSET: f32 = 180.0;
const CROP_INSET: f32 = 100.0;
const CROP_KEEP: f32 = 0.7;
const BRIGHTNESS: f32 = 1.3;
const CONTRAST: f32 = 4.0;
const SATURATION: f32 = 4.0;

/// A group of related transforms applied together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AugmentFamily {
    Blur,
    Crop,
    Rotate,
    Light,
}

impl AugmentFamily {
    pub const ALL: [AugmentFamily; 4] = [Self::Blur, Self::Crop, Self::Rotate, Self::Light];

    /// Produce every variant of this family as `(file prefix, image)`.
    pub fn apply(&self, img: &RgbImage) -> Vec<(&'static str, RgbImage)> {
        match self {
            Self::Blur => vec![(
                "blur_",
                DynamicImage::ImageRgb8(img.clone())
                    .blur(BLUR_SIGMA)
                    .to_rgb8(),
            )],
            Self::Crop => {
                let (w, h) = (img.width() as f32, img.height() as f32);
                [
                    ("cropl_", (CROP_OFFSET, 1.0, w, h)),
                    ("cropup_", (1.0, CROP_OFFSET, w, h)),
                    ("cropr_", (1.0, 1.0, CROP_KEEP * w, h)),
                    ("cropdown_", (1.0, 1.0, w, CROP_KEEP * h)),
                    ("cropall_", (CROP_INSET, CROP_INSET, CROP_KEEP * w, CROP_KEEP * h)),
                ]
                .into_iter()
                .map(|(prefix, bounds)| (prefix, crop_box(img, bounds)))
                .collect()
            }
            Self::Rotate => vec![
                // counter-clockwise quarter turns
                ("transp_", image::imageops::rotate270(img)),
                ("flip_", image::imageops::rotate180(img)),
                ("rotatel_", image::imageops::rotate90(img)),
            ],
            Self::Light => vec![
                ("bright_", brightness(img, BRIGHTNESS)),
                ("contr_", contrast(img, CONTRAST)),
                ("sat_", saturation(img, SATURATION)),
            ],
        }
    }
}

/// Summary of an augmentation run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AugmentReport {
    pub classes: usize,
    pub sources: usize,
    pub written: Vec<PathBuf>,
    pub failed: usize,
}

/// Writes augmented copies of training images.
pub struct Augmenter {
    rng: StdRng,
    images_per_class: usize,
}

impl Augmenter {
    /// Seeded runs draw the same families every time.
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            rng,
            images_per_class: DEFAULT_IMAGES_PER_CLASS,
        }
    }

    pub fn with_images_per_class(mut self, n: usize) -> Self {
        self.images_per_class = n;
        self
    }

    /// Draw a family different from `previous`.
    pub fn choose_family(&mut self, previous: Option<AugmentFamily>) -> AugmentFamily {
        let candidates: Vec<AugmentFamily> = AugmentFamily::ALL
            .into_iter()
            .filter(|f| Some(*f) != previous)
            .collect();
        *candidates
            .choose(&mut self.rng)
            .unwrap_or(&AugmentFamily::Blur)
    }

    /// Augment every class folder of `set`.
    ///
    /// Variants go next to their source, or under `output/<class>/` when
    /// `output` is given. Images outside class folders are ignored.
    pub fn augment_set(&mut self, set: &ImageSet, output: Option<&Path>) -> AugmentReport {
        let mut by_class: BTreeMap<&str, Vec<&LabeledImage>> = BTreeMap::new();
        for image in &set.images {
            if let Some(class) = image.class.as_deref() {
                by_class.entry(class).or_default().push(image);
            }
        }

        let mut report = AugmentReport {
            classes: by_class.len(),
            ..Default::default()
        };

        for (class, images) in by_class {
            let mut previous = None;
            for (j, source) in images.iter().take(self.images_per_class).enumerate() {
                let family = self.choose_family(previous);
                previous = Some(family);

                let target_dir = match output {
                    Some(root) => root.join(class),
                    None => source
                        .path
                        .parent()
                        .map(Path::to_path_buf)
                        .unwrap_or_default(),
                };

                match augment_image(&source.path, &target_dir, family, j) {
                    Ok(written) => {
                        tracing::debug!(
                            "Augmented {:?} with {:?} ({} files)",
                            source.path,
                            family,
                            written.len()
                        );
                        report.sources += 1;
                        report.written.extend(written);
                    }
                    Err(e) => {
                        tracing::warn!("{}", e);
                        report.failed += 1;
                    }
                }
            }
        }

        tracing::info!(
            "Augmented {} images in {} classes, wrote {} files",
            report.sources,
            report.classes,
            report.written.len()
        );
        report
    }
}

/// Apply `family` to the image at `source` and write the variants to `dir`.
pub fn augment_image(
    source: &Path,
    dir: &Path,
    family: AugmentFamily,
    index: usize,
) -> Result<Vec<PathBuf>, PipelineError> {
    let augment_err = |message: String| PipelineError::Augment {
        path: source.to_path_buf(),
        message,
    };

    let img = image::ImageReader::open(source)
        .map_err(|e| augment_err(e.to_string()))?
        .with_guessed_format()
        .map_err(|e| augment_err(e.to_string()))?
        .decode()
        .map_err(|e| augment_err(e.to_string()))?
        .to_rgb8();

    std::fs::create_dir_all(dir).map_err(|e| augment_err(e.to_string()))?;

    let mut written = Vec::new();
    for (prefix, variant) in family.apply(&img) {
        let path = dir.join(format!("{prefix}{index}.jpg"));
        variant
            .save_with_format(&path, image::ImageFormat::Jpeg)
            .map_err(|e| augment_err(format!("cannot write {}: {}", path.display(), e)))?;
        written.push(path);
    }
    Ok(written)
}

/// Crop the `(left, upper, right, lower)` box, clamped to the image and
/// never smaller than one pixel.
fn crop_box(img: &RgbImage, (left, upper, right, lower): (f32, f32, f32, f32)) -> RgbImage {
    let (w, h) = img.dimensions();
    let clamp = |v: f32, max: u32| (v.round().max(0.0) as u32).min(max);

    let x0 = clamp(left, w.saturating_sub(1));
    let y0 = clamp(upper, h.saturating_sub(1));
    let x1 = clamp(right, w).max(x0 + 1);
    let y1 = clamp(lower, h).max(y0 + 1);

    image::imageops::crop_imm(img, x0, y0, x1 - x0, y1 - y0).to_image()
}

/// Luma with the ITU-R 601-2 weights.
fn luma(p: &Rgb<u8>) -> f32 {
    (299.0 * p[0] as f32 + 587.0 * p[1] as f32 + 114.0 * p[2] as f32) / 1000.0
}

/// Blend every pixel away from `degenerate` by `factor`:
/// `out = degenerate + factor * (pixel - degenerate)`.
fn enhance(img: &RgbImage, factor: f32, degenerate: impl Fn(&Rgb<u8>) -> f32) -> RgbImage {
    let mut out = img.clone();
    for p in out.pixels_mut() {
        let d = degenerate(p);
        for c in p.0.iter_mut() {
            *c = (d + factor * (*c as f32 - d)).round().clamp(0.0, 255.0) as u8;
        }
    }
    out
}

fn brightness(img: &RgbImage, factor: f32) -> RgbImage {
    enhance(img, factor, |_| 0.0)
}

/// Contrast around the mean grey level of the whole image.
fn contrast(img: &RgbImage, factor: f32) -> RgbImage {
    let n = (img.width() as f32 * img.height() as f32).max(1.0);
    let mean = (img.pixels().map(luma).sum::<f32>() / n).round();
    enhance(img, factor, |_| mean)
}

/// Saturation around each pixel's own grey level.
fn saturation(img: &RgbImage, factor: f32) -> RgbImage {
    enhance(img, factor, luma)
}
