//! The `retrieve models` command for managing encoder files.

use clap::{Args, Subcommand};
use retrieve_core::{Config, EmbeddingEngine, ModelKind};
use std::path::{Path, PathBuf};

use super::common::parse_model;

/// Arguments for the `models` command.
#[derive(Args, Debug)]
pub struct ModelsArgs {
    #[command(subcommand)]
    pub command: ModelsCommand,
}

/// Subcommands for model management.
#[derive(Subcommand, Debug)]
pub enum ModelsCommand {
    /// Download an exported encoder into the model directory
    Download {
        /// Which encoder to store (defaults to `embedding.model`)
        #[arg(short, long, value_parser = parse_model)]
        model: Option<ModelKind>,

        /// Source URL (defaults to `embedding.model_url`)
        #[arg(long)]
        url: Option<String>,

        /// Expected BLAKE3 checksum (defaults to `embedding.model_blake3`)
        #[arg(long)]
        blake3: Option<String>,

        /// Replace an existing file
        #[arg(long)]
        force: bool,
    },

    /// List encoders and whether they are installed
    List,

    /// Show model directory path
    Path,
}

/// Execute the models command.
pub async fn execute(args: ModelsArgs, config: &Config) -> anyhow::Result<()> {
    let model_dir = config.model_dir();

    match args.command {
        ModelsCommand::Download {
            model,
            url,
            blake3,
            force,
        } => {
            let model = model.unwrap_or(config.embedding.model);
            let Some(url) = url.or_else(|| config.embedding.model_url.clone()) else {
                anyhow::bail!(
                    "No download URL for the {} encoder.\n\
                     Pass --url or set `embedding.model_url` in the config file.",
                    model
                );
            };
            let expected = blake3.or_else(|| config.embedding.model_blake3.clone());

            let dest = EmbeddingEngine::model_path(model, &model_dir);
            if dest.exists() && !force {
                tracing::info!("{} encoder already exists at {:?}", model, dest);
                return Ok(());
            }
            std::fs::create_dir_all(&model_dir)?;

            tracing::info!("Downloading {} encoder...", model);
            tracing::info!("  Source: {}", url);
            tracing::info!("  Destination: {:?}", dest);

            let client = reqwest::Client::new();
            download_file(&client, &url, &dest, expected.as_deref()).await?;

            let file_size = std::fs::metadata(&dest)?.len();
            tracing::info!(
                "  {} complete ({:.1} MB)",
                model,
                file_size as f64 / (1024.0 * 1024.0)
            );
        }

        ModelsCommand::List => {
            println!("Encoders in {}:\n", model_dir.display());
            for model in ModelKind::ALL {
                let status = if EmbeddingEngine::model_exists(model, &model_dir) {
                    "ready"
                } else {
                    "not installed"
                };
                let default_marker = if model == config.embedding.model {
                    "  (configured)"
                } else {
                    ""
                };
                println!(
                    "  - {:12} {:26} {:14}{}",
                    model.as_str(),
                    model.file_name(),
                    status,
                    default_marker
                );
            }
        }

        ModelsCommand::Path => {
            println!("{}", model_dir.display());
        }
    }

    Ok(())
}

/// Download `url` to `dest`, streaming to disk.
///
/// Bytes land in `<dest>.part` first and are renamed into place only once the
/// stream completed and, with `expected_blake3`, the checksum matched. Any
/// failure removes the partial file.
async fn download_file(
    client: &reqwest::Client,
    url: &str,
    dest: &Path,
    expected_blake3: Option<&str>,
) -> anyhow::Result<()> {
    let part = partial_path(dest);

    let result: anyhow::Result<()> = async {
        stream_to_file(client, url, &part).await?;
        if let Some(expected) = expected_blake3 {
            verify_blake3(&part, expected)?;
        }
        tokio::fs::rename(&part, dest).await?;
        Ok(())
    }
    .await;

    if result.is_err() {
        let _ = tokio::fs::remove_file(&part).await;
    }
    result
}

fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

async fn stream_to_file(client: &reqwest::Client, url: &str, path: &Path) -> anyhow::Result<()> {
    use futures_util::StreamExt;
    use tokio::io::AsyncWriteExt;

    let response = client
        .get(url)
        .send()
        .await?
        .error_for_status()
        .map_err(|e| anyhow::anyhow!("Download failed: {e}"))?;

    let pb = match response.content_length() {
        Some(total) => {
            let pb = indicatif::ProgressBar::new(total);
            pb.set_style(
                indicatif::ProgressStyle::default_bar()
                    .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec})")
                    .unwrap_or_else(|_| indicatif::ProgressStyle::default_bar())
                    .progress_chars("##-"),
            );
            pb
        }
        None => indicatif::ProgressBar::new_spinner(),
    };

    let mut file = tokio::fs::File::create(path).await?;
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => {
                pb.abandon();
                anyhow::bail!("Download interrupted: {e}");
            }
        };
        file.write_all(&chunk).await?;
        pb.inc(chunk.len() as u64);
    }
    file.flush().await?;
    pb.finish_and_clear();
    Ok(())
}

fn file_blake3(path: &Path) -> std::io::Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = blake3::Hasher::new();
    std::io::copy(&mut file, &mut hasher)?;
    Ok(hasher.finalize().to_hex().to_string())
}

/// Verify a downloaded file's BLAKE3 checksum.
///
/// On mismatch, removes the corrupt file so the next run re-downloads.
fn verify_blake3(path: &Path, expected: &str) -> anyhow::Result<()> {
    let actual = file_blake3(path)
        .map_err(|e| anyhow::anyhow!("Checksum computation failed for {}: {e}", path.display()))?;

    if !actual.eq_ignore_ascii_case(expected.trim()) {
        let _ = std::fs::remove_file(path);
        anyhow::bail!(
            "Checksum mismatch for {}:\n  expected: {}\n  actual:   {}\n\
             Corrupt file removed, try downloading again.",
            path.display(),
            expected,
            actual
        );
    }

    tracing::debug!("  Checksum verified: {}", &actual[..16]);
    Ok(())
}
