//! 活动日志：按 (instance_id, seq) 记录每个活动的最终结果与输入指纹，供重放使用
//!
//! InMemoryJournal 仅在进程内有效；SqliteJournal 落盘，重启后同一实例可从日志重放已完成的活动。

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::AgentError;

/// 活动的最终结果（成功值或非重试错误）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum ActivityOutcome {
    Completed(Value),
    Failed(AgentError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedActivity {
    pub instance_id: String,
    pub seq: u64,
    pub name: String,
    /// 活动名 + 输入的 sha256；重放时与本次输入比对
    #[serde(default)]
    pub fingerprint: String,
    pub outcome: ActivityOutcome,
}

pub trait ActivityJournal: Send + Sync {
    fn load(&self, instance_id: &str, seq: u64) -> Result<Option<RecordedActivity>, AgentError>;

    fn record(&self, activity: &RecordedActivity) -> Result<(), AgentError>;

    /// 某实例已记录的活动数
    fn count(&self, instance_id: &str) -> Result<usize, AgentError>;
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

#[derive(Default)]
pub struct InMemoryJournal {
    records: Mutex<HashMap<(String, u64), RecordedActivity>>,
}

impl InMemoryJournal {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ActivityJournal for InMemoryJournal {
    fn load(&self, instance_id: &str, seq: u64) -> Result<Option<RecordedActivity>, AgentError> {
        Ok(lock(&self.records)
            .get(&(instance_id.to_string(), seq))
            .cloned())
    }

    fn record(&self, activity: &RecordedActivity) -> Result<(), AgentError> {
        lock(&self.records).insert(
            (activity.instance_id.clone(), activity.seq),
            activity.clone(),
        );
        Ok(())
    }

    fn count(&self, instance_id: &str) -> Result<usize, AgentError> {
        Ok(lock(&self.records)
            .keys()
            .filter(|(id, _)| id == instance_id)
            .count())
    }
}

/// SQLite 活动日志
pub struct SqliteJournal {
    conn: Mutex<Connection>,
}

impl SqliteJournal {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, AgentError> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| AgentError::Journal(format!("create journal dir: {e}")))?;
            }
        }
        Self::init(Connection::open(path)?)
    }

    pub fn in_memory() -> Result<Self, AgentError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, AgentError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS activities (
                 instance_id TEXT NOT NULL,
                 seq INTEGER NOT NULL,
                 name TEXT NOT NULL,
                 fingerprint TEXT NOT NULL DEFAULT '',
                 outcome TEXT NOT NULL,
                 recorded_at TEXT NOT NULL,
                 PRIMARY KEY (instance_id, seq)
             );",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl ActivityJournal for SqliteJournal {
    fn load(&self, instance_id: &str, seq: u64) -> Result<Option<RecordedActivity>, AgentError> {
        let row: Option<(String, String, String)> = lock(&self.conn)
            .query_row(
                "SELECT name, fingerprint, outcome FROM activities WHERE instance_id = ?1 AND seq = ?2",
                params![instance_id, seq as i64],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;
        let Some((name, fingerprint, outcome)) = row else {
            return Ok(None);
        };
        let outcome: ActivityOutcome = serde_json::from_str(&outcome)
            .map_err(|e| AgentError::Journal(format!("corrupt outcome for {instance_id}#{seq}: {e}")))?;
        Ok(Some(RecordedActivity {
            instance_id: instance_id.to_string(),
            seq,
            name,
            fingerprint,
            outcome,
        }))
    }

    fn record(&self, activity: &RecordedActivity) -> Result<(), AgentError> {
        let outcome = serde_json::to_string(&activity.outcome)
            .map_err(|e| AgentError::Journal(e.to_string()))?;
        lock(&self.conn).execute(
            "INSERT OR REPLACE INTO activities (instance_id, seq, name, fingerprint, outcome, recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                activity.instance_id,
                activity.seq as i64,
                activity.name,
                activity.fingerprint,
                outcome,
                chrono::Utc::now().to_rfc3339()
            ],
        )?;
        Ok(())
    }

    fn count(&self, instance_id: &str) -> Result<usize, AgentError> {
        let n: i64 = lock(&self.conn).query_row(
            "SELECT COUNT(*) FROM activities WHERE instance_id = ?1",
            [instance_id],
            |row| row.get(0),
        )?;
        Ok(n as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample(seq: u64, outcome: ActivityOutcome) -> RecordedActivity {
        RecordedActivity {
            instance_id: "wf-1".into(),
            seq,
            name: "decide".into(),
            fingerprint: format!("fp-{seq}"),
            outcome,
        }
    }

    #[test]
    fn test_in_memory_roundtrip() {
        let j = InMemoryJournal::new();
        j.record(&sample(0, ActivityOutcome::Completed(json!("ok")))).unwrap();
        assert_eq!(j.count("wf-1").unwrap(), 1);
        assert_eq!(j.count("wf-2").unwrap(), 0);
        assert!(j.load("wf-1", 1).unwrap().is_none());
        assert_eq!(
            j.load("wf-1", 0).unwrap().unwrap().outcome,
            ActivityOutcome::Completed(json!("ok"))
        );
    }

    #[test]
    fn test_sqlite_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("journal.db");
        {
            let j = SqliteJournal::open(&path).unwrap();
            j.record(&sample(0, ActivityOutcome::Completed(json!({"a": 1})))).unwrap();
            j.record(&sample(
                1,
                ActivityOutcome::Failed(AgentError::UnknownTool("ghost".into())),
            ))
            .unwrap();
        }
        let j = SqliteJournal::open(&path).unwrap();
        assert_eq!(j.count("wf-1").unwrap(), 2);
        let failed = j.load("wf-1", 1).unwrap().unwrap();
        assert_eq!(failed.fingerprint, "fp-1");
        assert_eq!(
            failed.outcome,
            ActivityOutcome::Failed(AgentError::UnknownTool("ghost".into()))
        );
    }
}
