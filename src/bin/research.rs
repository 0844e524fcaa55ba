//! Steward 公司研究
//!
//! 用法：steward-research "Acme Corp"，结果 markdown 输出到 stdout（可重定向到文件）

use anyhow::{bail, Context};
use steward::agent::AgentBuilder;
use steward::config::load_config;
use steward::runtime::ActivityContext;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    steward::observability::init();

    let company = std::env::args().skip(1).collect::<Vec<_>>().join(" ");
    if company.trim().is_empty() {
        bail!("usage: steward-research <company name>");
    }

    let cfg = load_config(None).context("Failed to load config")?;
    let builder = AgentBuilder::new(cfg);
    let journal = builder.build_journal().context("Failed to open activity journal")?;
    let agent = builder.build_research_agent();

    let mut ctx = ActivityContext::new(format!("research-{}", uuid::Uuid::new_v4()), journal);
    let report = agent
        .research(company.trim(), &mut ctx)
        .await
        .context("Company research aborted")?;
    if report.markdown_report.trim().is_empty() {
        bail!("research finished without producing a report");
    }
    println!("{}", report.markdown_report);
    Ok(())
}
