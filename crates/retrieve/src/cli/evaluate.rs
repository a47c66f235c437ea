//! The `retrieve evaluate` command: accuracy on the labelled validation split.

use clap::Args;
use retrieve_core::output::save_json;
use retrieve_core::{Config, DatasetLayout, RetrievalMethod, Retriever, Split};
use std::time::Instant;

use super::common::{self, RankArgs, RunArgs};

/// Arguments for the `evaluate` command.
#[derive(Args, Debug)]
pub struct EvaluateArgs {
    #[command(flatten)]
    pub run: RunArgs,

    #[command(flatten)]
    pub rank: RankArgs,
}

/// Embed the validation split, rank it both ways and report top-k accuracy.
pub async fn execute(args: EvaluateArgs, mut config: Config) -> anyhow::Result<()> {
    args.rank.apply(&mut config);
    args.run.apply(&mut config)?;

    let DatasetLayout::QueryGallery { query, gallery } =
        DatasetLayout::resolve(&config, Split::Validation)
    else {
        anyhow::bail!("Validation split has no query/gallery layout");
    };

    let model = config.embedding.model;
    let output_dir = config.output_dir_for(model);
    tracing::info!("Evaluating {} encoder on {:?}", model, query.parent().unwrap_or(&query));

    let split = common::embed_split(&config, &query, &gallery).await?;

    let retriever = Retriever::new(config.retrieval.clone());
    let start = Instant::now();
    let mut knn_submission = None;

    for method in [RetrievalMethod::Pairwise, RetrievalMethod::Knn] {
        let run = retriever.retrieve(&split.queries, &split.gallery, method)?;

        println!("\nRESULTS {} ({}):", method, run.metric);
        for line in common::accuracy_lines(&run) {
            println!("{line}");
        }

        common::write_run(&config, &run, &output_dir)?;
        let (submission, path) = common::write_submission(&config, &run, &output_dir)?;
        tracing::info!("Saved submission to {:?}", path);

        if config.output.plot {
            let plotted = common::plot(&run, &split, &output_dir, model).await?;
            tracing::info!("Plotted {} {} retrievals", plotted, method);
        }

        if method == RetrievalMethod::Knn {
            knn_submission = Some(submission);
        }
    }
    let retrieval_seconds = start.elapsed().as_secs_f64();

    if args.run.submit {
        if let Some(submission) = &knn_submission {
            common::submit(&config, submission).await?;
        }
    }

    let stats = split.stats(retrieval_seconds);
    save_json(&output_dir.join("run_stats.json"), &stats, config.output.pretty)?;
    common::print_summary(&stats, &output_dir);
    Ok(())
}
