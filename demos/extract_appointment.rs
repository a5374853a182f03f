//! Turn a free-form sentence into a calendar entry.
//!
//! Usage: cargo run --example extract_appointment "Lunch with Sam tomorrow at noon"

use llm_flows::flows::AppointmentExtractor;
use llm_flows::Settings;

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

    let args: Vec<String> = std::env::args().skip(1).collect();
    let input = if args.is_empty() {
        "Design review with Priya and Tom next Tuesday at 2pm in the Aurora room".to_string()
    } else {
        args.join(" ")
    };

    let appointment = AppointmentExtractor::new(&settings.fast_model)
        .extract(&ctx, &input)
        .await?;
    println!("{}", appointment);
    Ok(())
}
