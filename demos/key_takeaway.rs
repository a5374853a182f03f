//! Key takeaway of an essay, streamed to the terminal.
//!
//! Usage: cargo run --example key_takeaway [path/to/essay.txt]

use llm_flows::events::{Event, FnEventHandler};
use llm_flows::flows::KeyTakeaway;
use llm_flows::Settings;
use std::io::Write;
use std::sync::Arc;

const ESSAY: &str = include_str!("data/essay.txt");

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let settings = Settings::load()?;
    let essay = match std::env::args().nth(1) {
        Some(path) => std::fs::read_to_string(path)?,
        None => ESSAY.to_string(),
    };

    let printer = FnEventHandler(|event: Event| {
        if let Event::Token { chunk, .. } = event {
            print!("{}", chunk);
            let _ = std::io::stdout().flush();
        }
    });
    let ctx = llm_flows::ExecCtx::builder(&settings.base_url)
        .backend(Arc::new(settings.backend()))
        .timeout(settings.timeout)
        .event_handler(Arc::new(printer))
        .build()?;

    KeyTakeaway::new(&settings.fast_model)
        .with_streaming(true)
        .run(&ctx, &essay)
        .await?;
    println!();
    Ok(())
}
