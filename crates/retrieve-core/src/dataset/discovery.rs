//! Finding query, gallery and training images on disk.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::{Config, ProcessingConfig};

/// An image file together with its class label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabeledImage {
    /// Full path to the file
    pub path: PathBuf,
    /// File name
    pub name: String,
    /// Folder directly under the set root, `None` for files in the root itself
    pub class: Option<String>,
    /// File size in bytes
    pub size: u64,
}

/// All images found under one directory, sorted by path.
#[derive(Debug, Clone, Default)]
pub struct ImageSet {
    pub root: PathBuf,
    pub images: Vec<LabeledImage>,
}

impl ImageSet {
    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// Get total size of all discovered files.
    pub fn total_size(&self) -> u64 {
        self.images.iter().map(|f| f.size).sum()
    }

    /// Distinct class names in sorted order.
    pub fn classes(&self) -> Vec<String> {
        let mut classes: Vec<String> = self.images.iter().filter_map(|i| i.class.clone()).collect();
        classes.sort();
        classes.dedup();
        classes
    }
}

/// Which part of the dataset to work on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Split {
    /// Labelled query/gallery folders used to measure accuracy
    Validation,
    /// Flat query/gallery folders of the challenge
    Test,
    /// Class folders used for augmentation
    Training,
}

/// Directories a split reads from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatasetLayout {
    QueryGallery { query: PathBuf, gallery: PathBuf },
    Training(PathBuf),
}

impl DatasetLayout {
    /// Resolve the directories of `split` under the configured data path.
    pub fn resolve(config: &Config, split: Split) -> Self {
        let data = config.data_path();
        let ds = &config.dataset;
        match split {
            Split::Validation => {
                let root = data.join(&ds.validation_dir);
                Self::QueryGallery {
                    query: root.join(&ds.query_dir),
                    gallery: root.join(&ds.gallery_dir),
                }
            }
            Split::Test => Self::QueryGallery {
                query: data.join(&ds.query_dir),
                gallery: data.join(&ds.gallery_dir),
            },
            Split::Training => Self::Training(data.join(&ds.training_dir)),
        }
    }
}

/// Discovers image files in directories.
pub struct FileDiscovery {
    config: ProcessingConfig,
}

impl FileDiscovery {
    pub fn new(config: ProcessingConfig) -> Self {
        Self { config }
    }

    /// Recursively collect every supported image under `root`.
    pub fn discover(&self, root: &Path) -> ImageSet {
        let mut images = Vec::new();

        for entry in WalkDir::new(root)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let entry_path = entry.path();
            if !entry_path.is_file() || !self.is_supported(entry_path) {
                continue;
            }
            let Ok(meta) = entry.metadata() else {
                continue;
            };
            images.push(LabeledImage {
                path: entry_path.to_path_buf(),
                name: file_name(entry_path),
                class: class_of(root, entry_path),
                size: meta.len(),
            });
        }

        // Sort by path for deterministic ordering
        images.sort_by(|a, b| a.path.cmp(&b.path));
        tracing::debug!("Discovered {} images under {:?}", images.len(), root);

        ImageSet {
            root: root.to_path_buf(),
            images,
        }
    }

    /// Check if a file has a supported extension.
    pub fn is_supported(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                let ext_lower = ext.to_lowercase();
                self.config
                    .supported_formats
                    .iter()
                    .any(|fmt| fmt.to_lowercase() == ext_lower)
            })
            .unwrap_or(false)
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// First path component below `root`, when the file is not directly in it.
fn class_of(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let mut components = relative.components();
    let first = components.next()?;
    components.next()?;
    Some(first.as_os_str().to_string_lossy().into_owned())
}
