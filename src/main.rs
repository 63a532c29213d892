//! crossrank CLI entrypoint.
//!
//! Reads a `{query, documents, top_k?}` JSON request from a file argument or
//! stdin, ranks with the env-configured model, and prints the scored
//! documents as JSON. Configuration comes from `CROSSRANK_*` variables.

use std::io::Read;

use crossrank::{Document, RankerConfig, SimilarityRanker};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct RankRequest {
    query: String,
    documents: Vec<Document>,
    #[serde(default)]
    top_k: Option<usize>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = RankerConfig::from_env();
    config.validate()?;

    tracing::info!(
        model = %config.model,
        top_k = config.top_k,
        batch_size = config.batch_size,
        "crossrank starting"
    );

    let mut ranker = SimilarityRanker::new(config)?;
    ranker.warm_up()?;

    let input = match std::env::args().nth(1) {
        Some(path) => std::fs::read_to_string(path)?,
        None => {
            let mut buffer = String::new();
            std::io::stdin().read_to_string(&mut buffer)?;
            buffer
        }
    };

    let request: RankRequest = serde_json::from_str(&input)?;
    let output = ranker.run(&request.query, request.documents, request.top_k)?;

    tracing::info!(returned = output.documents.len(), "Ranking complete");

    serde_json::to_writer_pretty(std::io::stdout().lock(), &output)?;
    println!();

    Ok(())
}
