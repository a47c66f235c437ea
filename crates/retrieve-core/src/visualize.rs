//! Side-by-side montages of a query and its retrieved gallery images.

use image::imageops::{self, FilterType};
use image::{DynamicImage, Rgb, RgbImage};
use std::path::{Path, PathBuf};

use crate::error::PipelineError;
use crate::retrieval::RetrievalMethod;
use crate::types::{EmbeddedSet, RetrievalRun};

const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const QUERY_BORDER: Rgb<u8> = Rgb([220, 40, 40]);

/// Lays out one row: the query tile (framed), then the retrieved tiles.
#[derive(Debug, Clone, Copy)]
pub struct Montage {
    pub tile_size: u32,
    pub border: u32,
    pub gap: u32,
}

impl Default for Montage {
    fn default() -> Self {
        Self {
            tile_size: 128,
            border: 4,
            gap: 6,
        }
    }
}

impl Montage {
    pub fn render(&self, query: &DynamicImage, retrieved: &[DynamicImage]) -> RgbImage {
        let cell = self.tile_size + 2 * self.border;
        let cells = 1 + retrieved.len() as u32;
        let width = cells * cell + (cells + 1) * self.gap;
        let height = cell + 2 * self.gap;
        let mut canvas = RgbImage::from_pixel(width, height, BACKGROUND);

        // Query frame
        let frame = RgbImage::from_pixel(cell, cell, QUERY_BORDER);
        imageops::replace(&mut canvas, &frame, self.gap as i64, self.gap as i64);

        for (i, img) in std::iter::once(query).chain(retrieved).enumerate() {
            let tile = img
                .resize_exact(self.tile_size, self.tile_size, FilterType::Triangle)
                .to_rgb8();
            let x = self.gap + i as u32 * (cell + self.gap) + self.border;
            let y = self.gap + self.border;
            imageops::replace(&mut canvas, &tile, x as i64, y as i64);
        }
        canvas
    }

    /// Render and save one montage per query of `run` into `dir`.
    ///
    /// Files are named `<prefix>_retrieval_<i>.png`, or
    /// `<prefix>_retrieval_knn_<i>.png` for k-NN runs. Queries whose images
    /// cannot be read are skipped with a warning.
    pub fn save_run(
        &self,
        run: &RetrievalRun,
        queries: &EmbeddedSet,
        gallery: &EmbeddedSet,
        dir: &Path,
        prefix: &str,
    ) -> Result<Vec<PathBuf>, PipelineError> {
        std::fs::create_dir_all(dir).map_err(|e| PipelineError::Write {
            path: dir.to_path_buf(),
            message: format!("Cannot create plot directory: {}", e),
        })?;

        let stem = match run.method {
            RetrievalMethod::Pairwise => format!("{prefix}_retrieval"),
            RetrievalMethod::Knn => format!("{prefix}_retrieval_knn"),
        };

        let mut written = Vec::new();
        for (i, (result, query)) in run.results.iter().zip(&queries.images).enumerate() {
            let images: Result<Vec<DynamicImage>, _> = std::iter::once(&query.path)
                .chain(result.matches.iter().map(|m| &gallery.images[m.index].path))
                .map(image::open)
                .collect();
            let mut images = match images {
                Ok(images) => images,
                Err(e) => {
                    tracing::warn!("Skipping plot for {}: {}", result.query, e);
                    continue;
                }
            };
            let retrieved = images.split_off(1);

            let path = dir.join(format!("{stem}_{i}.png"));
            self.render(&images[0], &retrieved)
                .save(&path)
                .map_err(|e| PipelineError::Write {
                    path: path.clone(),
                    message: format!("Cannot write plot: {}", e),
                })?;
            written.push(path);
        }

        tracing::info!("Saved {} retrieval plots to {:?}", written.len(), dir);
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EmbeddedImage, Match, QueryResult};

    fn solid(colour: [u8; 3]) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(20, 10, Rgb(colour)))
    }

    #[test]
    fn test_render_layout() {
        let montage = Montage {
            tile_size: 16,
            border: 2,
            gap: 3,
        };
        let canvas = montage.render(&solid([0, 0, 255]), &[solid([0, 255, 0]), solid([0, 255, 0])]);

        // three cells of 20px plus four gaps of 3px
        assert_eq!(canvas.dimensions(), (72, 26));
        assert_eq!(canvas.get_pixel(0, 0), &BACKGROUND);
        assert_eq!(canvas.get_pixel(3, 3), &QUERY_BORDER);
        assert_eq!(canvas.get_pixel(5, 5), &Rgb([0, 0, 255]));
        assert_eq!(canvas.get_pixel(28, 5), &Rgb([0, 255, 0]));
    }

    #[test]
    fn test_save_run_names_files_by_method() {
        let dir = tempfile::tempdir().unwrap();
        let q = dir.path().join("q.png");
        let g = dir.path().join("g.png");
        solid([255, 0, 0]).save(&q).unwrap();
        solid([0, 255, 0]).save(&g).unwrap();

        let set = |path: &Path| EmbeddedSet {
            root: dir.path().to_path_buf(),
            images: vec![EmbeddedImage {
                name: path.file_name().unwrap().to_string_lossy().into_owned(),
                path: path.to_path_buf(),
                class: None,
                embedding: vec![0.0],
            }],
            failed: 0,
        };
        let run = RetrievalRun {
            method: RetrievalMethod::Knn,
            metric: "cosine".to_string(),
            results: vec![QueryResult {
                query: "q.png".to_string(),
                class: None,
                matches: vec![Match {
                    name: "g.png".to_string(),
                    index: 0,
                    class: None,
                    distance: 0.0,
                }],
            }],
            accuracy: None,
        };

        let out = dir.path().join("plots");
        let written = Montage::default()
            .save_run(&run, &set(&q), &set(&g), &out, "ConvAE")
            .unwrap();
        assert_eq!(written, vec![out.join("ConvAE_retrieval_knn_0.png")]);
        assert!(written[0].exists());

        // plot directory path occupied by a regular file
        let blocked = dir.path().join("blocked");
        std::fs::write(&blocked, b"").unwrap();
        let err = Montage::default()
            .save_run(&run, &set(&q), &set(&g), &blocked, "ConvAE")
            .unwrap_err();
        assert!(matches!(err, PipelineError::Write { .. }), "{err:?}");
        assert!(err.to_string().starts_with("Write failed"));
    }
}
