//! The `retrieve query` command: rank the unlabelled test split.

use clap::Args;
use retrieve_core::output::save_json;
use retrieve_core::{Config, DatasetLayout, RetrievalMethod, Retriever, Split};
use std::time::Instant;

use super::common::{self, RankArgs, RunArgs};

/// Arguments for the `query` command.
#[derive(Args, Debug)]
pub struct QueryArgs {
    #[command(flatten)]
    pub run: RunArgs,

    #[command(flatten)]
    pub rank: RankArgs,
}

/// Embed the test split, run k-NN retrieval and write the submission.
pub async fn execute(args: QueryArgs, mut config: Config) -> anyhow::Result<()> {
    args.rank.apply(&mut config);
    args.run.apply(&mut config)?;

    let DatasetLayout::QueryGallery { query, gallery } =
        DatasetLayout::resolve(&config, Split::Test)
    else {
        anyhow::bail!("Test split has no query/gallery layout");
    };

    let model = config.embedding.model;
    let output_dir = config.output_dir_for(model);

    let split = common::embed_split(&config, &query, &gallery).await?;

    let start = Instant::now();
    let run = Retriever::new(config.retrieval.clone()).retrieve(
        &split.queries,
        &split.gallery,
        RetrievalMethod::Knn,
    )?;
    let retrieval_seconds = start.elapsed().as_secs_f64();

    // Test folders are usually flat; report accuracy only if they happen to be labelled
    for line in common::accuracy_lines(&run) {
        println!("{line}");
    }

    common::write_run(&config, &run, &output_dir)?;
    let (submission, path) = common::write_submission(&config, &run, &output_dir)?;
    println!("Submission with {} queries saved to {}", submission.len(), path.display());

    if config.output.plot {
        let plotted = common::plot(&run, &split, &output_dir, model).await?;
        tracing::info!("Plotted {} retrievals", plotted);
    }

    if args.run.submit {
        common::submit(&config, &submission).await?;
    }

    let stats = split.stats(retrieval_seconds);
    save_json(&output_dir.join("run_stats.json"), &stats, config.output.pretty)?;
    common::print_summary(&stats, &output_dir);
    Ok(())
}
