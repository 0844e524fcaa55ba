//! 交互式聊天会话
//!
//! 长期运行的单任务：等待「队列非空 或 已关闭」-> 取队首消息 -> turn_index + 1 -> 写入 user 条目 ->
//! 以聊天步数预算跑一轮主循环 -> 发布一条 ChatResponse -> 出队 -> 保存快照。
//! 消息严格 FIFO、一次一轮；close 不打断正在进行的轮次，已排队的消息仍会处理完。
//! 活动日志失败（含重放分歧）时会话立即结束：不发布回复、不保存快照，run 返回 Err。
//!
//! 轮次实例 id 为 <session_id>/turn-<n>。没有快照却在日志里已有 turn-1 的会话 id 会被 open 拒绝，
//! 否则新会话会从旧会话的日志重放出不相干的回复。
//!
//! 外部通过 SessionHandle 交互：submit_message / close 两种信号，latest_response 只读查询。

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;

use crate::agent::prompts::{supervisor_prompt, CHAT_TASK, NO_RESPONSE_FALLBACK};
use crate::agent::AgentComponents;
use crate::core::{AgentError, GuardrailPolicy};
use crate::memory::{PromptEntry, PromptHistory, SessionSnapshot, SessionStore};
use crate::react::{run_turn, ReactEvent};
use crate::runtime::{ActivityContext, ActivityJournal};

/// 会话参数
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionConfig {
    /// 固定 id 才能从快照恢复；为空时生成 chat-<uuid>
    #[serde(default)]
    pub session_id: Option<String>,
    /// 附加的系统说明（如人设、语言）
    #[serde(default)]
    pub system_note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub text: String,
}

/// 一轮结束后发布的回复
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub text: String,
    pub turn_index: u64,
}

/// 会话结束时返回
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub turns: u64,
}

#[derive(Debug, Default)]
struct Inbox {
    pending: VecDeque<ChatMessage>,
    closed: bool,
}

#[derive(Debug, Default)]
struct Shared {
    inbox: Mutex<Inbox>,
    notify: Notify,
    turn_index: AtomicU64,
}

fn lock(inbox: &Mutex<Inbox>) -> MutexGuard<'_, Inbox> {
    inbox.lock().unwrap_or_else(|e| e.into_inner())
}

/// 会话句柄：可克隆，发信号与查询都不阻塞
#[derive(Clone)]
pub struct SessionHandle {
    session_id: String,
    shared: Arc<Shared>,
    latest: watch::Receiver<Option<ChatResponse>>,
}

impl SessionHandle {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// 入队一条用户消息；会话已关闭时拒绝
    pub fn submit_message(&self, text: impl Into<String>) -> Result<(), AgentError> {
        {
            let mut inbox = lock(&self.shared.inbox);
            if inbox.closed {
                return Err(AgentError::SessionClosed);
            }
            inbox.pending.push_back(ChatMessage { text: text.into() });
        }
        self.shared.notify.notify_one();
        Ok(())
    }

    /// 请求关闭：当前轮次与已排队消息处理完后结束
    pub fn close(&self) {
        lock(&self.shared.inbox).closed = true;
        self.shared.notify.notify_one();
    }

    pub fn latest_response(&self) -> Option<ChatResponse> {
        self.latest.borrow().clone()
    }

    /// 尚未完成的消息数（含正在处理的那条）
    pub fn pending_count(&self) -> usize {
        lock(&self.shared.inbox).pending.len()
    }

    /// 已开始的轮次数
    pub fn turn_index(&self) -> u64 {
        self.shared.turn_index.load(Ordering::SeqCst)
    }

    /// 等到 turn_index >= turn 的回复发布；会话先结束则返回 None
    pub async fn wait_for_turn(&self, turn: u64) -> Option<ChatResponse> {
        let mut rx = self.latest.clone();
        let response = match rx
            .wait_for(|r| r.as_ref().is_some_and(|r| r.turn_index >= turn))
            .await
        {
            Ok(latest) => latest.clone(),
            Err(_) => None,
        };
        response
    }
}

pub struct ChatSession {
    session_id: String,
    components: Arc<AgentComponents>,
    journal: Arc<dyn ActivityJournal>,
    store: Option<SessionStore>,
    history: PromptHistory,
    shared: Arc<Shared>,
    latest_tx: watch::Sender<Option<ChatResponse>>,
    event_tx: Option<UnboundedSender<ReactEvent>>,
}

impl ChatSession {
    /// 打开会话：store 中有同 id 快照则从快照恢复（历史、轮次、最新回复、待处理队列），否则新建
    pub fn open(
        components: Arc<AgentComponents>,
        config: SessionConfig,
        journal: Arc<dyn ActivityJournal>,
        store: Option<SessionStore>,
    ) -> Result<(Self, SessionHandle), AgentError> {
        let session_id = config
            .session_id
            .clone()
            .unwrap_or_else(|| format!("chat-{}", uuid::Uuid::new_v4()));

        let snapshot = match &store {
            Some(store) => store.load(&session_id)?,
            None => None,
        };

        let shared = Arc::new(Shared::default());
        let (history, latest) = match snapshot {
            Some(snapshot) => {
                tracing::info!(
                    session = %session_id,
                    turn_index = snapshot.turn_index,
                    pending = snapshot.pending.len(),
                    "resuming chat session from snapshot"
                );
                shared
                    .turn_index
                    .store(snapshot.turn_index, Ordering::SeqCst);
                lock(&shared.inbox).pending = snapshot
                    .pending
                    .into_iter()
                    .map(|text| ChatMessage { text })
                    .collect();
                (snapshot.history, snapshot.latest_response)
            }
            None => {
                if journal.count(&format!("{session_id}/turn-1"))? > 0 {
                    tracing::error!(session = %session_id, "journal already has turns for this session but no snapshot");
                    return Err(AgentError::SessionConflict(session_id));
                }
                (Self::seed_history(&config), None)
            }
        };

        let (latest_tx, latest_rx) = watch::channel(latest);
        let handle = SessionHandle {
            session_id: session_id.clone(),
            shared: shared.clone(),
            latest: latest_rx,
        };
        let session = Self {
            session_id,
            components,
            journal,
            store,
            history,
            shared,
            latest_tx,
            event_tx: None,
        };
        Ok((session, handle))
    }

    pub fn with_event_tx(mut self, tx: UnboundedSender<ReactEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    pub fn seed_history(config: &SessionConfig) -> PromptHistory {
        let mut history = PromptHistory::new();
        history.push(PromptEntry::system(supervisor_prompt()));
        history.push(PromptEntry::task(CHAT_TASK));
        if let Some(note) = config.system_note.as_deref().filter(|n| !n.trim().is_empty()) {
            history.push(PromptEntry::system(note));
        }
        history
    }

    pub fn history(&self) -> &PromptHistory {
        &self.history
    }

    /// 在独立任务中运行
    pub fn spawn(self) -> JoinHandle<Result<SessionSummary, AgentError>> {
        tokio::spawn(self.run())
    }

    pub async fn run(mut self) -> Result<SessionSummary, AgentError> {
        tracing::info!(session = %self.session_id, "chat session started");

        while let Some(message) = self.next_message().await {
            let turn = self.shared.turn_index.fetch_add(1, Ordering::SeqCst) + 1;
            self.history.push(PromptEntry::user(&message.text));
            let mut ctx = ActivityContext::new(
                format!("{}/turn-{turn}", self.session_id),
                self.journal.clone(),
            );
            tracing::info!(session = %self.session_id, turn, "chat turn started");

            let result = {
                let mut session = self
                    .components
                    .react_session(GuardrailPolicy::chat_turn(&self.components.agent));
                if let Some(tx) = &self.event_tx {
                    session = session.with_event_tx(tx);
                }
                run_turn(&session, &mut self.history, &mut ctx).await
            };
            let result = match result {
                Ok(result) => result,
                Err(e) => {
                    tracing::error!(session = %self.session_id, turn, error = %e, "chat turn aborted, closing session");
                    lock(&self.shared.inbox).closed = true;
                    return Err(e);
                }
            };
            tracing::info!(
                session = %self.session_id,
                turn,
                steps = result.steps,
                end = ?result.end,
                "chat turn finished"
            );

            let text = if result.text.trim().is_empty() {
                NO_RESPONSE_FALLBACK.to_string()
            } else {
                result.text
            };
            self.latest_tx.send_replace(Some(ChatResponse {
                text,
                turn_index: turn,
            }));
            lock(&self.shared.inbox).pending.pop_front();
            self.save_snapshot();
        }

        let turns = self.shared.turn_index.load(Ordering::SeqCst);
        tracing::info!(session = %self.session_id, turns, "chat session closed");
        Ok(SessionSummary {
            session_id: self.session_id,
            turns,
        })
    }

    /// 挂起直到队列非空或已关闭；关闭且队列为空时返回 None。
    /// 消息留在队首，轮次完成后才出队。
    async fn next_message(&self) -> Option<ChatMessage> {
        loop {
            let notified = self.shared.notify.notified();
            {
                let inbox = lock(&self.shared.inbox);
                if let Some(front) = inbox.pending.front() {
                    return Some(front.clone());
                }
                if inbox.closed {
                    return None;
                }
            }
            notified.await;
        }
    }

    fn save_snapshot(&self) {
        let Some(store) = &self.store else {
            return;
        };
        let pending = lock(&self.shared.inbox)
            .pending
            .iter()
            .map(|m| m.text.clone())
            .collect();
        let snapshot = SessionSnapshot {
            session_id: self.session_id.clone(),
            history: self.history.clone(),
            turn_index: self.shared.turn_index.load(Ordering::SeqCst),
            latest_response: self.latest_tx.borrow().clone(),
            pending,
            saved_at: chrono::Utc::now().to_rfc3339(),
        };
        if let Err(e) = store.save(&snapshot) {
            tracing::warn!(session = %self.session_id, error = %e, "failed to save session snapshot");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AgentBuilder;
    use crate::config::AppConfig;
    use crate::llm::ScriptedLlmClient;
    use crate::react::AgentStepOutput;
    use crate::runtime::InMemoryJournal;

    fn components(llm: Arc<ScriptedLlmClient>) -> Arc<AgentComponents> {
        Arc::new(
            AgentBuilder::new(AppConfig::default())
                .with_llm(llm)
                .with_delegation(false)
                .build_components(),
        )
    }

    fn journal() -> Arc<dyn ActivityJournal> {
        Arc::new(InMemoryJournal::new())
    }

    fn finals(texts: &[&str]) -> Arc<ScriptedLlmClient> {
        Arc::new(ScriptedLlmClient::new(
            texts
                .iter()
                .map(|t| AgentStepOutput::text(format!("FINAL SUMMARY: {t}")))
                .collect(),
        ))
    }

    #[tokio::test]
    async fn test_close_with_empty_queue_terminates() {
        let (session, handle) =
            ChatSession::open(components(finals(&[])), SessionConfig::default(), journal(), None)
                .unwrap();
        handle.close();
        let summary = session.run().await.unwrap();
        assert_eq!(summary.turns, 0);
        assert!(handle.latest_response().is_none());
    }

    #[tokio::test]
    async fn test_queued_messages_finish_before_close() {
        let llm = finals(&["one", "two"]);
        let (session, handle) =
            ChatSession::open(components(llm.clone()), SessionConfig::default(), journal(), None)
                .unwrap();
        handle.submit_message("A").unwrap();
        handle.submit_message("B").unwrap();
        handle.close();
        assert_eq!(handle.pending_count(), 2);

        let summary = session.run().await.unwrap();
        assert_eq!(summary.turns, 2);
        assert_eq!(
            handle.latest_response(),
            Some(ChatResponse {
                text: "two".to_string(),
                turn_index: 2
            })
        );
        assert_eq!(handle.pending_count(), 0);

        // 第二轮的决策输入里，A 的回复排在 B 之前
        let second = &llm.inputs()[1].messages;
        let contents: Vec<&str> = second.iter().map(|m| m.content.as_str()).collect();
        let n = contents.len();
        assert_eq!(&contents[n - 3..], &["A", "FINAL SUMMARY: one", "B"]);
    }

    #[tokio::test]
    async fn test_submit_after_close_is_rejected() {
        let (_session, handle) =
            ChatSession::open(components(finals(&[])), SessionConfig::default(), journal(), None)
                .unwrap();
        handle.close();
        assert_eq!(handle.submit_message("late"), Err(AgentError::SessionClosed));
    }

    #[tokio::test]
    async fn test_system_note_is_seeded() {
        let config = SessionConfig {
            session_id: Some("noted".to_string()),
            system_note: Some("Answer in French.".to_string()),
        };
        let (session, _handle) =
            ChatSession::open(components(finals(&[])), config, journal(), None).unwrap();
        let entries = session.history().entries();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[2], PromptEntry::system("Answer in French."));
    }

    #[tokio::test]
    async fn test_wait_for_turn_returns_none_after_session_ends() {
        let (session, handle) =
            ChatSession::open(components(finals(&[])), SessionConfig::default(), journal(), None)
                .unwrap();
        handle.close();
        let task = session.spawn();
        assert_eq!(handle.wait_for_turn(1).await, None);
        assert_eq!(task.await.unwrap().unwrap().turns, 0);
    }

    #[tokio::test]
    async fn test_snapshot_resume_continues_history() {
        let dir = tempfile::tempdir().unwrap();
        let config = SessionConfig {
            session_id: Some("persisted".to_string()),
            system_note: None,
        };

        let (session, handle) = ChatSession::open(
            components(finals(&["first"])),
            config.clone(),
            journal(),
            Some(SessionStore::new(dir.path())),
        )
        .unwrap();
        handle.submit_message("A").unwrap();
        handle.close();
        session.run().await.unwrap();

        let llm = finals(&["second"]);
        let (session, handle) = ChatSession::open(
            components(llm.clone()),
            config,
            journal(),
            Some(SessionStore::new(dir.path())),
        )
        .unwrap();
        assert_eq!(handle.turn_index(), 1);
        assert_eq!(handle.latest_response().unwrap().text, "first");

        handle.submit_message("B").unwrap();
        handle.close();
        let summary = session.run().await.unwrap();
        assert_eq!(summary.turns, 2);
        let contents: Vec<String> = llm.inputs()[0]
            .messages
            .iter()
            .map(|m| m.content.clone())
            .collect();
        assert!(contents.contains(&"A".to_string()));
        assert_eq!(contents.last().map(String::as_str), Some("B"));
    }

    #[tokio::test]
    async fn test_reused_session_id_without_snapshot_is_rejected() {
        let journal = journal();
        let config = SessionConfig {
            session_id: Some("work".to_string()),
            system_note: None,
        };
        let (session, handle) =
            ChatSession::open(components(finals(&["4"])), config.clone(), journal.clone(), None)
                .unwrap();
        handle.submit_message("What's 2+2?").unwrap();
        handle.close();
        session.run().await.unwrap();

        let result = ChatSession::open(components(finals(&["sent"])), config, journal, None);
        assert!(matches!(result, Err(AgentError::SessionConflict(ref id)) if id == "work"));
    }

    #[tokio::test]
    async fn test_journal_divergence_ends_session_without_publishing() {
        let journal = journal();
        let config = SessionConfig {
            session_id: Some("diverged".to_string()),
            system_note: None,
        };
        let (session, handle) =
            ChatSession::open(components(finals(&["4"])), config.clone(), journal.clone(), None)
                .unwrap();
        // 同一轮次实例被其他输入占用
        let mut ctx = ActivityContext::new("diverged/turn-1", journal.clone());
        let _: String = ctx
            .execute(
                "decide",
                "unrelated",
                &crate::runtime::ActivityOptions::untimed(crate::runtime::RetryConfig::none()),
                || async { Ok("stale".to_string()) },
            )
            .await
            .unwrap();

        handle.submit_message("Email Bob").unwrap();
        let err = session.run().await.unwrap_err();
        assert!(matches!(err, AgentError::Journal(_)));
        assert!(handle.latest_response().is_none());
        assert_eq!(handle.submit_message("again"), Err(AgentError::SessionClosed));
    }
}
