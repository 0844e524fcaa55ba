//! 会话快照持久化
//!
//! 每完成一轮对话后，把会话状态（历史条目、轮次、最新回复、待处理队列）写入 JSON 文件；
//! 进程重启后从快照恢复。正在进行的那条消息仍在队列中（只在轮次完成后出队），恢复后会重跑，
//! 其已完成的活动由 journal 重放。

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::agent::ChatResponse;
use crate::core::AgentError;
use crate::memory::PromptHistory;

/// 会话状态快照
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub session_id: String,
    pub history: PromptHistory,
    pub turn_index: u64,
    pub latest_response: Option<ChatResponse>,
    pub pending: Vec<String>,
    /// 写入时间（RFC 3339）
    pub saved_at: String,
}

/// 简单的文件持久化：每个会话一个 JSON 文件（<dir>/<session_id>.json）
#[derive(Debug, Clone)]
pub struct SessionStore {
    dir: PathBuf,
}

impl SessionStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    fn path_for(&self, session_id: &str) -> PathBuf {
        let safe: String = session_id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("{safe}.json"))
    }

    /// 读取快照；文件不存在时返回 None
    pub fn load(&self, session_id: &str) -> Result<Option<SessionSnapshot>, AgentError> {
        let path = self.path_for(session_id);
        if !path.exists() {
            return Ok(None);
        }
        let data =
            std::fs::read_to_string(&path).map_err(|e| AgentError::Persistence(e.to_string()))?;
        let snapshot =
            serde_json::from_str(&data).map_err(|e| AgentError::Persistence(e.to_string()))?;
        Ok(Some(snapshot))
    }

    /// 写入快照（先写临时文件再 rename，避免半截文件）；目录不存在时自动创建
    pub fn save(&self, snapshot: &SessionSnapshot) -> Result<(), AgentError> {
        std::fs::create_dir_all(&self.dir).map_err(|e| AgentError::Persistence(e.to_string()))?;
        let path = self.path_for(&snapshot.session_id);
        let tmp = path.with_extension("json.tmp");
        let data = serde_json::to_string_pretty(snapshot)
            .map_err(|e| AgentError::Persistence(e.to_string()))?;
        std::fs::write(&tmp, data).map_err(|e| AgentError::Persistence(e.to_string()))?;
        std::fs::rename(&tmp, &path).map_err(|e| AgentError::Persistence(e.to_string()))?;
        Ok(())
    }
}
