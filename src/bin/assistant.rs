//! Steward 单次请求
//!
//! 用法：steward-assistant "Schedule a team standup for tomorrow at 9am and email the team."

use std::sync::Arc;

use anyhow::Context;
use steward::agent::{AgentBuilder, PersonalAssistant};
use steward::config::load_config;
use steward::runtime::ActivityContext;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    steward::observability::init();

    let query = std::env::args().skip(1).collect::<Vec<_>>().join(" ");
    let query = if query.trim().is_empty() {
        "Schedule a team standup for tomorrow at 9am and email the team.".to_string()
    } else {
        query
    };

    let cfg = load_config(None).context("Failed to load config")?;
    let builder = AgentBuilder::new(cfg);
    let journal = builder.build_journal().context("Failed to open activity journal")?;
    let assistant = PersonalAssistant::new(Arc::new(builder.build_components()));

    let mut ctx = ActivityContext::new(format!("assistant-{}", uuid::Uuid::new_v4()), journal);
    let result = assistant
        .run(&query, &mut ctx)
        .await
        .context("Assistant request aborted")?;

    println!("\nFinal assistant response:\n");
    println!("{}", result.final_response);
    println!(
        "\n({} step(s); tools: {})",
        result.steps,
        result
            .tool_calls
            .iter()
            .map(|c| c.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );
    Ok(())
}
