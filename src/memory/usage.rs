//! LLM 调用统计（追加式审计日志）

use serde::{Deserialize, Serialize};

use crate::evolution::types::TaskKind;
use crate::llm::Provider;

/// 单次 LLM 调用的字符统计
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageStat {
    /// 发起调用时所在的迭代序号（生成为 1，改进为即将产生的版本号）
    pub iteration: usize,
    pub task: TaskKind,
    pub provider: Provider,
    pub model: String,
    pub input_chars: usize,
    pub output_chars: usize,
}

#[derive(Debug, Clone, Default)]
pub struct UsageLog {
    entries: Vec<UsageStat>,
}

impl UsageLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, stat: UsageStat) {
        tracing::debug!(
            iteration = stat.iteration,
            task = %stat.task,
            input_chars = stat.input_chars,
            output_chars = stat.output_chars,
            "LLM call recorded"
        );
        self.entries.push(stat);
    }

    pub fn entries(&self) -> &[UsageStat] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// (输入字符总数, 输出字符总数)
    pub fn totals(&self) -> (usize, usize) {
        self.entries
            .iter()
            .fold((0, 0), |(i, o), s| (i + s.input_chars, o + s.output_chars))
    }

    pub fn tasks(&self) -> Vec<TaskKind> {
        self.entries.iter().map(|s| s.task).collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stat(task: TaskKind, input: usize, output: usize) -> UsageStat {
        UsageStat {
            iteration: 1,
            task,
            provider: Provider::Mock,
            model: "m".into(),
            input_chars: input,
            output_chars: output,
        }
    }

    #[test]
    fn test_totals_and_order() {
        let mut log = UsageLog::new();
        log.record(stat(TaskKind::Generation, 10, 100));
        log.record(stat(TaskKind::Improvement, 20, 0));
        assert_eq!(log.totals(), (30, 100));
        assert_eq!(log.tasks(), vec![TaskKind::Generation, TaskKind::Improvement]);
    }
}
