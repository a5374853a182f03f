//! Classify a batch of multilingual support requests in one call.
//!
//! Usage: cargo run --example classify_requests [path/to/requests.json]

use llm_flows::flows::SupportClassifier;
use llm_flows::Settings;

const REQUESTS: &str = include_str!("data/support_requests.json");

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
        None => REQUESTS.to_string(),
    };
    let requests: Vec<serde_json::Value> = serde_json::from_str(&raw)?;

    let records = SupportClassifier::new(&settings.fast_model)
        .classify(&ctx, &requests)
        .await?;

    println!("{:<18} {:<8} {:<10} REQUEST", "CATEGORY", "URGENCY", "LANGUAGE");
    for record in &records {
        let request: String = record.request.chars().take(60).collect();
        println!(
            "{:<18} {:<8} {:<10} {}",
            record.category, record.urgency, record.language, request
        );
    }
    Ok(())
}
