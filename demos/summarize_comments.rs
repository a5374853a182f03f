//! Summarize a comment thread into a headline, context, discussion points
//! and takeaways.
//!
//! Usage: cargo run --example summarize_comments [path/to/comments.json]

use llm_flows::flows::CommentSummarizer;
use llm_flows::Settings;

const COMMENTS: &str = include_str!("data/comments.json");

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let settings = Settings::load()?;
    let ctx = settings.exec_ctx()?;

    let raw = match std::env::args().nth(1) {
        Some(path) => std::fs::read_to_string(path)?,
        None => COMMENTS.to_string(),
    };
    let comments: serde_json::Value = serde_json::from_str(&raw)?;

    let summary = CommentSummarizer::new(&settings.large_model)
        .summarize(&ctx, &comments)
        .await?;
    println!("{}", summary);
    Ok(())
}
