//! 继续 / 终止判断
//!
//! 每个改进步开始前与结束后各检查一次：停止请求优先，其次是改进次数上限，最后是备注策略。

use serde::{Deserialize, Serialize};

use crate::core::RunStatus;

/// 终止策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// 跑满改进次数上限（或被手动停止）
    #[default]
    MaxIterations,
    /// 没有未消费的备注时结束；仍受上限约束
    NotesExhausted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Continuation {
    Continue,
    Halt(RunStatus),
}

/// 继续判断所需的输入
#[derive(Debug, Clone, Copy)]
pub struct LoopProgress {
    pub stop_requested: bool,
    pub improvements_done: usize,
    pub pending_notes: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContinuationPolicy {
    /// 本次运行允许的改进步总数
    pub budget: usize,
    pub termination: Termination,
}

impl ContinuationPolicy {
    pub fn new(budget: usize, termination: Termination) -> Self {
        Self { budget, termination }
    }

    pub fn check(&self, progress: LoopProgress) -> Continuation {
        if progress.stop_requested {
            return Continuation::Halt(RunStatus::Stopped);
        }
        if progress.improvements_done >= self.budget {
            return Continuation::Halt(RunStatus::Finished);
        }
        if self.termination == Termination::NotesExhausted && progress.pending_notes == 0 {
            return Continuation::Halt(RunStatus::Finished);
        }
        Continuation::Continue
    }

    /// 续跑时追加一批改进次数
    pub fn extend(&mut self, improvements_done: usize, batch: usize) {
        self.budget = improvements_done + batch.max(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn progress(stop: bool, done: usize, pending: usize) -> LoopProgress {
        LoopProgress {
            stop_requested: stop,
            improvements_done: done,
            pending_notes: pending,
        }
    }

    #[test]
    fn test_stop_wins_over_everything() {
        let policy = ContinuationPolicy::new(3, Termination::MaxIterations);
        assert_eq!(policy.check(progress(true, 3, 0)), Continuation::Halt(RunStatus::Stopped));
    }

    #[test]
    fn test_budget_finishes_run() {
        let policy = ContinuationPolicy::new(3, Termination::MaxIterations);
        assert_eq!(policy.check(progress(false, 2, 0)), Continuation::Continue);
        assert_eq!(policy.check(progress(false, 3, 5)), Continuation::Halt(RunStatus::Finished));
    }

    #[test]
    fn test_notes_exhausted() {
        let policy = ContinuationPolicy::new(10, Termination::NotesExhausted);
        assert_eq!(policy.check(progress(false, 1, 1)), Continuation::Continue);
        assert_eq!(policy.check(progress(false, 1, 0)), Continuation::Halt(RunStatus::Finished));
    }

    #[test]
    fn test_extend_grants_another_batch() {
        let mut policy = ContinuationPolicy::new(3, Termination::MaxIterations);
        policy.extend(3, 3);
        assert_eq!(policy.check(progress(false, 5, 0)), Continuation::Continue);
        assert_eq!(policy.check(progress(false, 6, 0)), Continuation::Halt(RunStatus::Finished));
    }
}
