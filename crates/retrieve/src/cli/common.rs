//! Arguments and helpers shared by `evaluate` and `query`.

use clap::Args;
use retrieve_core::output::{save_json, OutputFormat};
use retrieve_core::{
    Config, EmbeddedSet, EmbeddingEngine, FileDiscovery, ImageEmbedder, ModelKind, Montage,
    OutputWriter, ResultsBuilder, RetrievalRun, RunStats, Submission, SubmissionClient,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

/// Dataset, model and runtime overrides for the loaded config.
#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Dataset root (overrides `dataset.data_path`)
    #[arg(long)]
    pub data_path: Option<PathBuf>,

    /// Encoder: autoencoder, pretrained or triplets
    #[arg(short, long, value_parser = parse_model)]
    pub model: Option<ModelKind>,

    /// Square input size fed to the encoder
    #[arg(long)]
    pub img_size: Option<u32>,

    /// Input channels (1 or 3)
    #[arg(long)]
    pub channels: Option<u32>,

    /// Images per inference call
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Number of images decoded concurrently
    #[arg(short, long)]
    pub parallel: Option<usize>,

    /// Root directory for results and plots
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Save one montage per query
    #[arg(long)]
    pub plot: bool,

    /// Post the k-NN results to the scoring endpoint
    #[arg(long)]
    pub submit: bool,

    /// Group name sent with the submission
    #[arg(long)]
    pub group: Option<String>,
}

impl RunArgs {
    /// Apply the overrides to `config` and re-validate it.
    pub fn apply(&self, config: &mut Config) -> anyhow::Result<()> {
        if let Some(path) = &self.data_path {
            config.dataset.data_path = path.clone();
        }
        if let Some(model) = self.model {
            config.embedding.model = model;
        }
        if let Some(size) = self.img_size {
            config.embedding.image_size = size;
        }
        if let Some(channels) = self.channels {
            config.embedding.channels = channels;
        }
        if let Some(batch) = self.batch_size {
            config.embedding.batch_size = batch;
        }
        if let Some(parallel) = self.parallel {
            config.processing.parallel_workers = parallel;
        }
        if let Some(dir) = &self.output_dir {
            config.general.output_dir = dir.clone();
        }
        if self.plot {
            config.output.plot = true;
        }
        if let Some(group) = &self.group {
            config.submission.group_name = group.clone();
        }
        config.validate()?;
        Ok(())
    }
}

/// Distance and ranking overrides.
#[derive(Args, Debug, Default)]
pub struct RankArgs {
    /// Metric for the pairwise distance matrix (scipy names)
    #[arg(long)]
    pub metric: Option<String>,

    /// Exponent of the minkowski metric
    #[arg(long)]
    pub p: Option<f64>,

    /// Metric used by the k-NN search
    #[arg(long)]
    pub knn_metric: Option<String>,

    /// Neighbours returned per query by the k-NN search
    #[arg(short = 'k', long)]
    pub neighbors: Option<usize>,

    /// Matches kept per query in results and submissions
    #[arg(long)]
    pub top_k: Option<usize>,
}

impl RankArgs {
    pub fn apply(&self, config: &mut Config) {
        let retrieval = &mut config.retrieval;
        if let Some(metric) = &self.metric {
            retrieval.metric = metric.clone();
        }
        if let Some(p) = self.p {
            retrieval.minkowski_p = p;
        }
        if let Some(metric) = &self.knn_metric {
            retrieval.knn_metric = metric.clone();
        }
        if let Some(k) = self.neighbors {
            retrieval.knn_neighbors = k;
        }
        if let Some(k) = self.top_k {
            retrieval.top_k = k;
        }
    }
}

pub fn parse_model(s: &str) -> Result<ModelKind, String> {
    ModelKind::parse(s).ok_or_else(|| {
        format!(
            "unknown model '{s}', expected one of: {}",
            ModelKind::ALL.map(|m| m.as_str()).join(", ")
        )
    })
}

/// Query and gallery embeddings of one split.
pub struct EmbeddedSplit {
    pub queries: EmbeddedSet,
    pub gallery: EmbeddedSet,
    pub seconds: f64,
}

impl EmbeddedSplit {
    pub fn stats(&self, retrieval_seconds: f64) -> RunStats {
        RunStats {
            queries: self.queries.len(),
            gallery: self.gallery.len(),
            failed: self.queries.failed + self.gallery.failed,
            embedding_dim: self.gallery.dimension().unwrap_or(0),
            embed_seconds: self.seconds,
            retrieval_seconds,
        }
    }
}

/// Load the configured encoder and embed both directories.
pub async fn embed_split(
    config: &Config,
    query_dir: &Path,
    gallery_dir: &Path,
) -> anyhow::Result<EmbeddedSplit> {
    for dir in [query_dir, gallery_dir] {
        if !dir.is_dir() {
            anyhow::bail!("Directory not found: {}", dir.display());
        }
    }

    let model_dir = config.model_dir();
    let embedding = config.embedding.clone();
    let engine = tokio::task::spawn_blocking(move || EmbeddingEngine::load(&embedding, &model_dir))
        .await??;
    let embedder = ImageEmbedder::new(Arc::new(engine), config);
    let discovery = FileDiscovery::new(config.processing.clone());

    let start = Instant::now();
    let mut sets = Vec::with_capacity(2);
    for (label, dir) in [("query", query_dir), ("gallery", gallery_dir)] {
        let set = discovery.discover(dir);
        if set.is_empty() {
            anyhow::bail!("No supported images found in {}", dir.display());
        }
        tracing::info!("Embedding {} {} images from {:?}", set.len(), label, dir);

        let pb = create_progress_bar(set.len() as u64, label);
        let embedded = embedder.embed_set(&set, &|| pb.inc(1)).await?;
        pb.finish_with_message(format!("{} embedded", embedded.len()));
        sets.push(embedded);
    }

    let gallery = sets.pop().unwrap_or_default();
    let queries = sets.pop().unwrap_or_default();
    Ok(EmbeddedSplit {
        queries,
        gallery,
        seconds: start.elapsed().as_secs_f64(),
    })
}

pub fn create_progress_bar(total: u64, message: &str) -> indicatif::ProgressBar {
    use indicatif::{ProgressBar, ProgressStyle};

    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("##-"),
    );
    pb.set_message(message.to_string());
    pb
}

/// `>>> Top-k Accuracy with <method>: 0.xxx` lines for a labelled run.
pub fn accuracy_lines(run: &RetrievalRun) -> Vec<String> {
    run.accuracy
        .iter()
        .flat_map(|report| &report.entries)
        .map(|e| {
            format!(
                ">>> Top-{} Accuracy with {}: {:.3}",
                e.k,
                run.method.label(),
                e.accuracy
            )
        })
        .collect()
}

/// Write the run as `results_<method>.<ext>` into `dir`.
pub fn write_run(config: &Config, run: &RetrievalRun, dir: &Path) -> anyhow::Result<PathBuf> {
    let format = OutputFormat::parse(&config.output.format).unwrap_or(OutputFormat::Json);
    let path = dir.join(format!("results_{}.{}", run.method, format.extension()));
    let mut writer = OutputWriter::create(&path, format, config.output.pretty)?;
    writer.write_run(run)?;
    writer.flush()?;
    tracing::info!("Wrote {} results to {:?}", run.results.len(), path);
    Ok(path)
}

/// Build the submission for `run` and save it as `submission_<method>.json`.
pub fn write_submission(
    config: &Config,
    run: &RetrievalRun,
    dir: &Path,
) -> anyhow::Result<(Submission, PathBuf)> {
    let submission = ResultsBuilder::from_run(run).finish(&config.submission.group_name);
    let path = save_json(
        &dir.join(format!("submission_{}.json", run.method)),
        &submission,
        config.output.pretty,
    )?;
    Ok((submission, path))
}

pub async fn submit(config: &Config, submission: &Submission) -> anyhow::Result<()> {
    let client = SubmissionClient::new(config.submission.clone());
    tracing::info!("Submitting {} queries to {}", submission.len(), client.url());
    let receipt = client.submit(submission).await?;
    match receipt.accuracy() {
        Some(accuracy) => println!(">>> Submission accuracy: {:.3}", accuracy),
        None => println!(">>> Submission accepted (HTTP {}): {}", receipt.status, receipt.body),
    }
    Ok(())
}

/// Render montages on the blocking pool.
pub async fn plot(
    run: &RetrievalRun,
    split: &EmbeddedSplit,
    dir: &Path,
    model: ModelKind,
) -> anyhow::Result<usize> {
    let run = run.clone();
    let queries = split.queries.clone();
    let gallery = split.gallery.clone();
    let dir = dir.to_path_buf();
    let written = tokio::task::spawn_blocking(move || {
        Montage::default().save_run(&run, &queries, &gallery, &dir, model.plot_prefix())
    })
    .await??;
    Ok(written.len())
}

/// Print a short summary of the run to stderr.
pub fn print_summary(stats: &RunStats, output_dir: &Path) {
    eprintln!();
    eprintln!("  ====================================");
    eprintln!("               Summary");
    eprintln!("  ====================================");
    eprintln!("    Queries:      {:>8}", stats.queries);
    eprintln!("    Gallery:      {:>8}", stats.gallery);
    if stats.failed > 0 {
        eprintln!("    Failed:       {:>8}", stats.failed);
    }
    if stats.embedding_dim > 0 {
        eprintln!("    Dimension:    {:>8}", stats.embedding_dim);
    }
    eprintln!("  ------------------------------------");
    eprintln!("    Embedding:    {:>7.1}s", stats.embed_seconds);
    eprintln!("    Retrieval:    {:>7.1}s", stats.retrieval_seconds);
    eprintln!("    Output:       {}", output_dir.display());
    eprintln!("  ====================================");
}

#[cfg(test)]
mod tests {
    use super::*;
    use retrieve_core::retrieval::{AccuracyReport, RetrievalMethod, TopK};

    #[test]
    fn test_apply_overrides() {
        let args = RunArgs {
            model: Some(ModelKind::Triplets),
            img_size: Some(224),
            batch_size: Some(8),
            output_dir: Some(PathBuf::from("/tmp/results")),
            plot: true,
            group: Some("team".to_string()),
            ..Default::default()
        };
        let mut config = Config::default();
        args.apply(&mut config).unwrap();

        assert_eq!(config.embedding.model, ModelKind::Triplets);
        assert_eq!(config.embedding.image_size, 224);
        assert_eq!(config.embedding.batch_size, 8);
        assert!(config.output.plot);
        assert_eq!(config.submission.group_name, "team");
        assert_eq!(
            config.output_dir_for(config.embedding.model),
            PathBuf::from("/tmp/results/triplets_loss")
        );
    }

    #[test]
    fn test_apply_rejects_invalid_channels() {
        let args = RunArgs {
            channels: Some(2),
            ..Default::default()
        };
        assert!(args.apply(&mut Config::default()).is_err());
    }

    #[test]
    fn test_rank_overrides_are_validated() {
        let mut config = Config::default();
        RankArgs {
            metric: Some("cityblock".to_string()),
            neighbors: Some(5),
            ..Default::default()
        }
        .apply(&mut config);
        assert_eq!(config.retrieval.metric, "cityblock");
        assert_eq!(config.retrieval.knn_neighbors, 5);
        assert!(RunArgs::default().apply(&mut config).is_ok());

        RankArgs {
            metric: Some("hamming".to_string()),
            ..Default::default()
        }
        .apply(&mut config);
        assert!(RunArgs::default().apply(&mut config).is_err());
    }

    #[test]
    fn test_split_stats() {
        let image = |name: &str| retrieve_core::EmbeddedImage {
            name: name.to_string(),
            path: PathBuf::from(name),
            class: None,
            embedding: vec![0.0; 3],
        };
        let split = EmbeddedSplit {
            queries: EmbeddedSet {
                images: vec![image("q.jpg")],
                failed: 1,
                ..Default::default()
            },
            gallery: EmbeddedSet {
                images: vec![image("a.jpg"), image("b.jpg")],
                failed: 2,
                ..Default::default()
            },
            seconds: 1.5,
        };

        let stats = split.stats(0.25);
        assert_eq!(stats.queries, 1);
        assert_eq!(stats.gallery, 2);
        assert_eq!(stats.failed, 3);
        assert_eq!(stats.embedding_dim, 3);
        assert_eq!(stats.embed_seconds, 1.5);
    }

    #[test]
    fn test_parse_model() {
        assert_eq!(parse_model("resnet50"), Ok(ModelKind::Pretrained));
        assert!(parse_model("vgg").unwrap_err().contains("autoencoder"));
    }

    #[test]
    fn test_accuracy_lines() {
        let run = RetrievalRun {
            method: RetrievalMethod::Pairwise,
            metric: "euclidean".to_string(),
            results: vec![],
            accuracy: Some(AccuracyReport {
                evaluated: 4,
                entries: vec![
                    TopK { k: 1, accuracy: 0.25 },
                    TopK { k: 10, accuracy: 0.75 },
                ],
            }),
        };
        assert_eq!(
            accuracy_lines(&run),
            vec![
                ">>> Top-1 Accuracy with pairwise distance: 0.250".to_string(),
                ">>> Top-10 Accuracy with pairwise distance: 0.750".to_string(),
            ]
        );
    }

    #[test]
    fn test_write_run_and_submission() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::default();
        let run = RetrievalRun {
            method: RetrievalMethod::Knn,
            metric: "cosine".to_string(),
            results: vec![],
            accuracy: None,
        };

        let results = write_run(&config, &run, dir.path()).unwrap();
        assert_eq!(results, dir.path().join("results_knn.json"));

        let (submission, path) = write_submission(&config, &run, dir.path()).unwrap();
        assert_eq!(path, dir.path().join("submission_knn.json"));
        assert_eq!(submission.groupname, "retrieve");
        let saved: Submission =
            serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(saved, submission);
    }
}
