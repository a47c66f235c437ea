//! The `retrieve augment` command: write augmented copies of training images.

use clap::Args;
use retrieve_core::dataset::Augmenter;
use retrieve_core::{Config, DatasetLayout, FileDiscovery, Split};
use std::path::PathBuf;

/// Arguments for the `augment` command.
#[derive(Args, Debug)]
pub struct AugmentArgs {
    /// Dataset root (overrides `dataset.data_path`)
    #[arg(long)]
    pub data_path: Option<PathBuf>,

    /// Write variants under this directory instead of next to their source
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Images augmented per class folder
    #[arg(long, default_value = "2")]
    pub per_class: usize,

    /// Seed for reproducible transform choices
    #[arg(long)]
    pub seed: Option<u64>,
}

pub async fn execute(args: AugmentArgs, mut config: Config) -> anyhow::Result<()> {
    if let Some(path) = args.data_path {
        config.dataset.data_path = path;
    }

    let DatasetLayout::Training(training) = DatasetLayout::resolve(&config, Split::Training)
    else {
        anyhow::bail!("Training split has no class-folder layout");
    };
    if !training.is_dir() {
        anyhow::bail!("Training directory not found: {}", training.display());
    }

    let set = FileDiscovery::new(config.processing.clone()).discover(&training);
    tracing::info!(
        "Augmenting {} classes under {:?}",
        set.classes().len(),
        training
    );

    let output = args.output;
    let per_class = args.per_class;
    let seed = args.seed;
    let report = tokio::task::spawn_blocking(move || {
        Augmenter::new(seed)
            .with_images_per_class(per_class)
            .augment_set(&set, output.as_deref())
    })
    .await?;

    println!(
        "Augmented {} images in {} classes: {} files written, {} failed",
        report.sources,
        report.classes,
        report.written.len(),
        report.failed
    );
    Ok(())
}
