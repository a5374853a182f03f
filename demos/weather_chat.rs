//! Interactive weather assistant.
//!
//! Streams the reply as it is generated and renders `getWeather` results as
//! cards. Type `exit` or send EOF to quit.
//!
//! Usage: cargo run --example weather_chat

use futures::StreamExt;
use llm_flows::agent::{ChatEvent, FinishReason};
use llm_flows::flows::{weather_assistant, WeatherReport};
use llm_flows::{Settings, ToolOutcome, Transcript};
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let settings = Settings::load()?;
    let ctx = Arc::new(settings.exec_ctx()?);
    let agent = Arc::new(weather_assistant(
        &settings.large_model,
        &settings.weather_base_url,
        settings.max_steps,
    )?);

    let mut transcript = Transcript::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("You: ");
        std::io::stdout().flush()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "exit" {
            break;
        }

        transcript.push(llm_flows::Message::user(line));
        let mut events = agent.stream_turn(Arc::clone(&ctx), transcript.clone());

        print!("AI: ");
        while let Some(event) = events.next().await {
            match event {
                Ok(ChatEvent::TextDelta(text)) => {
                    print!("{}", text);
                    std::io::stdout().flush()?;
                }
                Ok(ChatEvent::ToolCallStarted(call)) => {
                    println!("[calling {} {}]", call.name, call.arguments_json());
                }
                Ok(ChatEvent::ToolCallRejected { tool_name, reason, .. }) => {
                    println!("[{} rejected: {}]", tool_name, reason);
                }
                Ok(ChatEvent::ToolResult(result)) => match result.outcome {
                    ToolOutcome::Output(value) => {
                        match serde_json::from_value::<WeatherReport>(value) {
                            Ok(report) => println!("{}", report),
                            Err(_) => println!("[{} returned]", result.tool_name),
                        }
                    }
                    ToolOutcome::Failed(reason) | ToolOutcome::Rejected(reason) => {
                        println!("[{} failed: {}]", result.tool_name, reason);
                    }
                },
                Ok(ChatEvent::TurnComplete(outcome)) => {
                    println!();
                    if outcome.finish == FinishReason::StepBudgetExhausted {
                        println!("(stopped after {} steps)", outcome.steps);
                    }
                    transcript.extend(outcome.messages);
                }
                Ok(_) => {}
                Err(e) => {
                    println!();
                    eprintln!("error: {}", e);
                    // Drop the unanswered question.
                    transcript = Transcript::from(
                        transcript.messages()[..transcript.len() - 1].to_vec(),
                    );
                }
            }
        }
    }
    Ok(())
}
