//! 轻量的进程内持久化执行：活动重试 / 超时 / 日志 / 重放

pub mod activity;
pub mod journal;

pub use activity::{fingerprint, ActivityContext, ActivityOptions, RetryConfig};
pub use journal::{
    ActivityJournal, ActivityOutcome, InMemoryJournal, RecordedActivity, SqliteJournal,
};
