//! Steward 交互式聊天
//!
//! 从 stdin 逐行读取消息提交给会话，等待该轮回复后打印；输入 /quit 或 EOF 关闭会话。
//! 用法：steward [session_id]（带 session_id 且配置了 session_dir 时可跨进程恢复）

use std::sync::Arc;

use anyhow::Context;
use steward::agent::{AgentBuilder, ChatSession, SessionConfig};
use steward::config::load_config;
use steward::memory::SessionStore;
use steward::react::ReactEvent;
use tokio::io::{AsyncBufReadExt, BufReader};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    steward::observability::init();

    let cfg = load_config(None).context("Failed to load config")?;
    let builder = AgentBuilder::new(cfg.clone());
    let journal = builder.build_journal().context("Failed to open activity journal")?;
    let components = Arc::new(builder.build_components());

    let session_config = SessionConfig {
        session_id: std::env::args().nth(1),
        system_note: None,
    };
    let store = cfg
        .persistence
        .session_dir
        .is_some()
        .then(|| SessionStore::new(cfg.session_dir()));

    let (event_tx, mut event_rx) = tokio::sync::mpsc::unbounded_channel();
    let (session, handle) = ChatSession::open(components, session_config, journal, store)
        .context("Failed to open chat session")?;
    // 恢复的会话可能带着未完成的消息，本地按提交次数推算轮次
    let mut expected_turn = handle.turn_index() + handle.pending_count() as u64;
    let task = session.with_event_tx(event_tx).spawn();

    tokio::spawn(async move {
        while let Some(ev) = event_rx.recv().await {
            match ev {
                ReactEvent::ToolCall { tool, args } => eprintln!("  -> {tool} {args}"),
                ReactEvent::ToolFailure { tool, reason } => eprintln!("  !! {tool}: {reason}"),
                ReactEvent::CircuitBreaker { tool_calls } => {
                    eprintln!("  (tool budget reached after {tool_calls} calls)")
                }
                _ => {}
            }
        }
    });

    println!("Session {} ready. Type a message, or /quit to exit.", handle.session_id());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        let text = line.trim();
        if text.is_empty() {
            continue;
        }
        if text == "/quit" {
            break;
        }
        handle
            .submit_message(text)
            .context("Failed to submit message")?;
        expected_turn += 1;
        match handle.wait_for_turn(expected_turn).await {
            Some(response) => println!("[{}] {}", response.turn_index, response.text),
            None => break,
        }
    }

    handle.close();
    let summary = task
        .await
        .context("Chat session task failed")?
        .context("Chat session aborted")?;
    println!("Session {} closed after {} turn(s).", summary.session_id, summary.turns);
    Ok(())
}
