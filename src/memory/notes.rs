//! 开发者备注队列
//!
//! 用户随时可以追加备注（包括运行中）；进化循环在每个改进步开始时读取。
//! 队列可被克隆后在界面与循环之间共享，内部使用 RwLock。

use std::sync::Arc;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

/// 单条开发者备注
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeveloperNote {
    pub text: String,
    pub consumed: bool,
    pub added_at: DateTime<Local>,
}

impl DeveloperNote {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            consumed: false,
            added_at: Local::now(),
        }
    }
}

/// 备注选择策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotePolicy {
    /// 每步发送全部备注，由模型自行判断哪些已完成；不标记消费
    #[default]
    Checklist,
    /// 每步只处理最早一条未消费备注，成功后标记消费
    Fifo,
}

/// 某一步选中的备注
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoteSelection {
    /// FIFO 下本步处理的备注：(队列位置, 文本)
    pub focus: Option<(usize, String)>,
    /// 其余需要放进上下文的备注
    pub context: Vec<String>,
}

/// 共享的备注队列（按插入顺序）
#[derive(Debug, Clone, Default)]
pub struct NoteQueue {
    inner: Arc<RwLock<Vec<DeveloperNote>>>,
}

impl NoteQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一条未消费备注；空白文本被忽略，返回是否追加
    pub async fn push(&self, text: impl Into<String>) -> bool {
        let text = text.into();
        let text = text.trim();
        if text.is_empty() {
            return false;
        }
        self.inner.write().await.push(DeveloperNote::new(text));
        true
    }

    pub async fn snapshot(&self) -> Vec<DeveloperNote> {
        self.inner.read().await.clone()
    }

    pub async fn pending(&self) -> usize {
        self.inner.read().await.iter().filter(|n| !n.consumed).count()
    }

    /// 按策略选出本步的备注
    pub async fn select(&self, policy: NotePolicy) -> NoteSelection {
        let notes = self.inner.read().await;
        match policy {
            NotePolicy::Checklist => NoteSelection {
                focus: None,
                context: notes.iter().map(|n| n.text.clone()).collect(),
            },
            NotePolicy::Fifo => NoteSelection {
                focus: notes
                    .iter()
                    .enumerate()
                    .find(|(_, n)| !n.consumed)
                    .map(|(i, n)| (i, n.text.clone())),
                context: notes.iter().filter(|n| n.consumed).map(|n| n.text.clone()).collect(),
            },
        }
    }

    /// 标记第 index 条为已消费；越界时忽略
    pub async fn mark_consumed(&self, index: usize) {
        if let Some(note) = self.inner.write().await.get_mut(index) {
            note.consumed = true;
        }
    }

    /// 新运行开始时清除消费标记（备注本身保留）
    pub async fn reset_consumed(&self) {
        for note in self.inner.write().await.iter_mut() {
            note.consumed = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fifo_selects_oldest_unconsumed() {
        let queue = NoteQueue::new();
        queue.push("add score").await;
        queue.push("add sound").await;

        let first = queue.select(NotePolicy::Fifo).await;
        assert_eq!(first.focus, Some((0, "add score".to_string())));
        assert!(first.context.is_empty());

        queue.mark_consumed(0).await;
        let second = queue.select(NotePolicy::Fifo).await;
        assert_eq!(second.focus, Some((1, "add sound".to_string())));
        assert_eq!(second.context, vec!["add score".to_string()]);
    }

    #[tokio::test]
    async fn test_checklist_sends_everything() {
        let queue = NoteQueue::new();
        queue.push("a").await;
        queue.push("b").await;
        queue.mark_consumed(0).await;
        let selection = queue.select(NotePolicy::Checklist).await;
        assert!(selection.focus.is_none());
        assert_eq!(selection.context, vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test]
    async fn test_blank_notes_ignored_and_reset() {
        let queue = NoteQueue::new();
        assert!(!queue.push("   ").await);
        assert!(queue.push(" jump higher ").await);
        queue.mark_consumed(0).await;
        assert_eq!(queue.pending().await, 0);
        queue.reset_consumed().await;
        assert_eq!(queue.pending().await, 1);
        assert_eq!(queue.snapshot().await[0].text, "jump higher");
    }
}
