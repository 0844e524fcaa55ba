//! 对话历史（PromptHistory）
//!
//! 只追加、不重排、不去重；render 是当前条目序列的纯函数投影（同一历史永远渲染出同一组消息）。

use serde::{Deserialize, Serialize};

use crate::memory::{Message, PromptEntry};

/// 有序、只追加的提示词历史，归单个编排实例独占
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptHistory {
    entries: Vec<PromptEntry>,
}

impl PromptHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: PromptEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[PromptEntry] {
        &self.entries
    }

    pub fn last(&self) -> Option<&PromptEntry> {
        self.entries.last()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 按条目顺序渲染为 role + text 消息列表
    pub fn render(&self) -> Vec<Message> {
        self.entries.iter().map(PromptEntry::render).collect()
    }
}
