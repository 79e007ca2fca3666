//! 状态定义：RunStatus、状态日志与 EvolutionSnapshot 投影
//!
//! 界面只持有轻量的 EvolutionSnapshot（通过 watch 通道接收）；完整运行状态由 EvolutionLoop 维护并投影。

use std::fmt;

use chrono::{DateTime, Local};
use serde::Serialize;

use crate::evolution::types::{GameType, Iteration};
use crate::memory::{DeveloperNote, TimingStats, UsageStat};

/// 运行状态
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Default)]
pub enum RunStatus {
    #[default]
    Idle,
    Generating,
    Improving,
    Stopped,
    Error,
    Finished,
}

impl RunStatus {
    /// 是否有 LLM 步正在推进
    pub fn is_active(&self) -> bool {
        matches!(self, RunStatus::Generating | RunStatus::Improving)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Stopped | RunStatus::Error | RunStatus::Finished)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunStatus::Idle => "Idle",
            RunStatus::Generating => "Generating",
            RunStatus::Improving => "Improving",
            RunStatus::Stopped => "Stopped",
            RunStatus::Error => "Error",
            RunStatus::Finished => "Finished",
        };
        f.write_str(s)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

/// 用户可见的状态日志条目
#[derive(Clone, Debug, Serialize)]
pub struct LogEntry {
    pub at: DateTime<Local>,
    pub level: LogLevel,
    pub message: String,
}

impl LogEntry {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            at: Local::now(),
            level,
            message: message.into(),
        }
    }
}

/// 历史版本的轻量视图
#[derive(Clone, Debug, Serialize)]
pub struct IterationView {
    pub index: usize,
    pub code: String,
    pub plan: Option<String>,
    pub has_screenshot: bool,
    pub created_at: DateTime<Local>,
}

impl From<&Iteration> for IterationView {
    fn from(it: &Iteration) -> Self {
        Self {
            index: it.index,
            code: it.code.clone(),
            plan: it.plan.clone(),
            has_screenshot: it.screenshot.is_some(),
            created_at: it.created_at,
        }
    }
}

/// 界面看到的「投影」状态
#[derive(Clone, Debug, Default, Serialize)]
pub struct EvolutionSnapshot {
    pub status: RunStatus,
    pub concept: String,
    pub game_type: GameType,
    pub max_iterations: usize,
    pub iterations: Vec<IterationView>,
    /// 当前在预览中查看的版本
    pub selected: Option<usize>,
    pub notes: Vec<DeveloperNote>,
    pub short_term_memory: Vec<String>,
    pub long_term_memory: Vec<String>,
    pub usage: Vec<UsageStat>,
    pub timing: TimingStats,
    pub log: Vec<LogEntry>,
    pub last_error: Option<String>,
    /// 最近一次随机生成的创意
    pub last_idea: Option<String>,
}

impl EvolutionSnapshot {
    /// 纯读取：取某个版本的代码
    pub fn code_at(&self, index: usize) -> Option<&str> {
        self.iterations
            .iter()
            .find(|it| it.index == index)
            .map(|it| it.code.as_str())
    }

    /// 当前选中版本（未选中时为最新版本）
    pub fn selected_iteration(&self) -> Option<&IterationView> {
        match self.selected {
            Some(index) => self.iterations.iter().find(|it| it.index == index),
            None => self.iterations.last(),
        }
    }

    pub fn usage_totals(&self) -> (usize, usize) {
        self.usage
            .iter()
            .fold((0, 0), |(i, o), s| (i + s.input_chars, o + s.output_chars))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classes() {
        assert!(RunStatus::Generating.is_active());
        assert!(!RunStatus::Idle.is_active());
        assert!(RunStatus::Finished.is_terminal());
        assert!(!RunStatus::Improving.is_terminal());
    }

    #[test]
    fn test_selected_defaults_to_latest() {
        let mut snapshot = EvolutionSnapshot::default();
        snapshot.iterations.push((&Iteration::new(1, "a")).into());
        snapshot.iterations.push((&Iteration::new(2, "b")).into());
        assert_eq!(snapshot.selected_iteration().map(|i| i.index), Some(2));
        snapshot.selected = Some(1);
        assert_eq!(snapshot.selected_iteration().map(|i| i.code.as_str()), Some("a"));
        assert_eq!(snapshot.code_at(2), Some("b"));
        assert_eq!(snapshot.code_at(3), None);
    }

    #[test]
    fn test_snapshot_serializes_with_timestamps() {
        let mut snapshot = EvolutionSnapshot::default();
        snapshot.notes.push(DeveloperNote::new("add a score counter"));
        snapshot.log.push(LogEntry::new(LogLevel::Info, "Run started"));

        let json = serde_json::to_string(&snapshot).unwrap();
        assert!(json.contains("add a score counter"));
        assert!(json.contains("Run started"));
        assert!(json.contains("added_at"));
    }
}
