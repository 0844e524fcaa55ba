//! 交互式会话集成测试：FIFO、关闭语义、等待轮次、快照恢复与重放

use std::sync::Arc;
use std::time::Duration;

use steward::agent::{AgentBuilder, AgentComponents, ChatSession, SessionConfig};
use steward::config::AppConfig;
use steward::core::AgentError;
use steward::llm::ScriptedLlmClient;
use steward::memory::{PromptEntry, SessionStore};
use steward::react::{AgentStepOutput, ReactEvent};
use steward::runtime::{ActivityJournal, InMemoryJournal, SqliteJournal};

fn components(llm: Arc<ScriptedLlmClient>) -> Arc<AgentComponents> {
    Arc::new(
        AgentBuilder::new(AppConfig::default())
            .with_llm(llm)
            .with_delegation(false)
            .build_components(),
    )
}

fn scripted(finals: &[&str]) -> Arc<ScriptedLlmClient> {
    Arc::new(ScriptedLlmClient::new(
        finals
            .iter()
            .map(|t| AgentStepOutput::text(format!("FINAL SUMMARY: {t}")))
            .collect(),
    ))
}

fn journal() -> Arc<dyn ActivityJournal> {
    Arc::new(InMemoryJournal::new())
}

#[tokio::test(start_paused = true)]
async fn test_messages_are_answered_in_submission_order() {
    let llm = Arc::new(
        ScriptedLlmClient::new(vec![
            AgentStepOutput::text("FINAL SUMMARY: reply to A"),
            AgentStepOutput::text("FINAL SUMMARY: reply to B"),
        ])
        .with_delay(Duration::from_millis(500)),
    );
    let (session, handle) =
        ChatSession::open(components(llm), SessionConfig::default(), journal(), None).unwrap();
    let task = session.spawn();

    handle.submit_message("A").unwrap();
    handle.submit_message("B").unwrap();

    let first = handle.wait_for_turn(1).await.unwrap();
    assert_eq!(first.turn_index, 1);
    assert_eq!(first.text, "reply to A");

    let second = handle.wait_for_turn(2).await.unwrap();
    assert_eq!(second.turn_index, 2);
    assert_eq!(second.text, "reply to B");

    handle.close();
    let summary = task.await.unwrap().unwrap();
    assert_eq!(summary.turns, 2);
}

#[tokio::test(start_paused = true)]
async fn test_close_during_turn_lets_turn_finish() {
    let llm = Arc::new(
        ScriptedLlmClient::new(vec![AgentStepOutput::text("FINAL SUMMARY: done")])
            .with_delay(Duration::from_secs(1)),
    );
    let (session, handle) =
        ChatSession::open(components(llm), SessionConfig::default(), journal(), None).unwrap();
    handle.submit_message("A").unwrap();
    let task = session.spawn();

    while handle.turn_index() < 1 {
        tokio::task::yield_now().await;
    }
    handle.close();
    assert_eq!(handle.submit_message("too late"), Err(AgentError::SessionClosed));

    let summary = task.await.unwrap().unwrap();
    assert_eq!(summary.turns, 1);
    let latest = handle.latest_response().unwrap();
    assert_eq!(latest.text, "done");
    assert_eq!(latest.turn_index, 1);
}

#[tokio::test]
async fn test_turn_without_final_publishes_fallback() {
    let llm = Arc::new(ScriptedLlmClient::new(vec![]));
    let (session, handle) =
        ChatSession::open(components(llm.clone()), SessionConfig::default(), journal(), None)
            .unwrap();
    handle.submit_message("hello").unwrap();
    handle.close();
    session.run().await.unwrap();

    assert_eq!(
        handle.latest_response().unwrap().text,
        "The assistant could not produce a response."
    );
    assert_eq!(llm.decide_calls(), AppConfig::default().agent.chat_max_steps_per_turn);
}

#[tokio::test]
async fn test_intermediate_text_is_kept_when_budget_runs_out() {
    let llm = Arc::new(
        ScriptedLlmClient::new(vec![]).with_fallback(AgentStepOutput::text("Still checking.")),
    );
    let (session, handle) =
        ChatSession::open(components(llm), SessionConfig::default(), journal(), None).unwrap();
    handle.submit_message("hello").unwrap();
    handle.close();
    session.run().await.unwrap();
    assert_eq!(handle.latest_response().unwrap().text, "Still checking.");
}

#[tokio::test]
async fn test_history_accumulates_across_turns() {
    let llm = scripted(&["one", "two", "three"]);
    let (session, handle) =
        ChatSession::open(components(llm.clone()), SessionConfig::default(), journal(), None)
            .unwrap();
    for text in ["A", "B", "C"] {
        handle.submit_message(text).unwrap();
    }
    handle.close();
    session.run().await.unwrap();

    let last_input: Vec<String> = llm.inputs()[2]
        .messages
        .iter()
        .skip(2)
        .map(|m| m.content.clone())
        .collect();
    assert_eq!(
        last_input,
        vec!["A", "FINAL SUMMARY: one", "B", "FINAL SUMMARY: two", "C"]
    );
}

#[tokio::test]
async fn test_events_are_forwarded() {
    let llm = scripted(&["hi"]);
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let (session, handle) =
        ChatSession::open(components(llm), SessionConfig::default(), journal(), None).unwrap();
    let session = session.with_event_tx(tx);
    handle.submit_message("hello").unwrap();
    handle.close();
    session.run().await.unwrap();

    let mut events = Vec::new();
    while let Ok(ev) = rx.try_recv() {
        events.push(ev);
    }
    assert_eq!(
        events.last(),
        Some(&ReactEvent::Final {
            text: "hi".to_string()
        })
    );
}

#[tokio::test]
async fn test_interrupted_turn_is_replayed_after_restart() {
    let dir = tempfile::tempdir().unwrap();
    let shared_journal = journal();
    let config = SessionConfig {
        session_id: Some("resume-me".to_string()),
        system_note: None,
    };

    // 第一次运行：完成 A 后正常关闭，快照里 turn_index = 1
    let (session, handle) = ChatSession::open(
        components(scripted(&["reply A"])),
        config.clone(),
        shared_journal.clone(),
        Some(SessionStore::new(dir.path())),
    )
    .unwrap();
    handle.submit_message("A").unwrap();
    handle.close();
    session.run().await.unwrap();

    let store = SessionStore::new(dir.path());
    let after_a = store.load("resume-me").unwrap().unwrap();

    // 第二次运行：处理 B，turn-2 的活动写入日志
    let (session, handle) = ChatSession::open(
        components(scripted(&["reply B"])),
        config.clone(),
        shared_journal.clone(),
        Some(SessionStore::new(dir.path())),
    )
    .unwrap();
    handle.submit_message("B").unwrap();
    handle.close();
    session.run().await.unwrap();
    assert_eq!(shared_journal.count("resume-me/turn-2").unwrap(), 1);

    // 模拟第二次运行在保存快照前崩溃：快照回到 A 之后，B 仍在待处理队列
    let mut snapshot = after_a;
    snapshot.pending.push("B".to_string());
    store.save(&snapshot).unwrap();

    // 重启：B 从快照恢复，turn-2 的决策从日志重放，不再调用模型
    let fresh_llm = Arc::new(ScriptedLlmClient::new(vec![]));
    let (session, handle) = ChatSession::open(
        components(fresh_llm.clone()),
        config,
        shared_journal,
        Some(SessionStore::new(dir.path())),
    )
    .unwrap();
    assert_eq!(handle.pending_count(), 1);
    assert_eq!(handle.latest_response().unwrap().text, "reply A");
    handle.close();
    let summary = session.run().await.unwrap();

    assert_eq!(summary.turns, 2);
    assert_eq!(fresh_llm.decide_calls(), 0);
    let latest = handle.latest_response().unwrap();
    assert_eq!(latest.text, "reply B");
    assert_eq!(latest.turn_index, 2);

    let saved = store.load("resume-me").unwrap().unwrap();
    assert!(saved.pending.is_empty());
    assert_eq!(saved.turn_index, 2);
    assert_eq!(saved.history.last(), Some(&PromptEntry::assistant("FINAL SUMMARY: reply B")));
}

#[tokio::test]
async fn test_reusing_session_id_without_snapshot_does_not_replay_old_answers() {
    let dir = tempfile::tempdir().unwrap();
    let shared_journal: Arc<dyn ActivityJournal> =
        Arc::new(SqliteJournal::open(dir.path().join("journal.db")).unwrap());
    let config = SessionConfig {
        session_id: Some("work".to_string()),
        system_note: None,
    };

    let (session, handle) = ChatSession::open(
        components(scripted(&["4"])),
        config.clone(),
        shared_journal.clone(),
        None,
    )
    .unwrap();
    handle.submit_message("What's 2+2?").unwrap();
    handle.close();
    session.run().await.unwrap();
    assert_eq!(handle.latest_response().unwrap().text, "4");

    let llm = scripted(&["Email sent to Bob"]);
    let result = ChatSession::open(components(llm.clone()), config, shared_journal, None);
    match result {
        Err(AgentError::SessionConflict(id)) => assert_eq!(id, "work"),
        Err(other) => panic!("unexpected error {other:?}"),
        Ok(_) => panic!("reused session id must not open without a snapshot"),
    }
    assert_eq!(llm.decide_calls(), 0);
}
