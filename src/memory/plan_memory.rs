//! 计划记忆：短期窗口 + 长期摘要
//!
//! 短期记忆保留最近 N 条计划（超出时从最旧处剪枝）；每完成 K 次改进，
//! 把最近 K 条计划交给 LLM 摘要成一条长期记忆。完整计划日志保留用于摘要。

/// 默认短期窗口
pub const DEFAULT_SHORT_TERM_WINDOW: usize = 10;
/// 默认摘要间隔（改进次数）
pub const DEFAULT_CONSOLIDATION_INTERVAL: usize = 10;

#[derive(Debug, Clone)]
pub struct PlanMemory {
    short_term: Vec<String>,
    long_term: Vec<String>,
    plans: Vec<String>,
    window: usize,
    interval: usize,
    /// 已合并到长期记忆的计划数量
    consolidated: usize,
}

impl Default for PlanMemory {
    fn default() -> Self {
        Self::new(DEFAULT_SHORT_TERM_WINDOW, DEFAULT_CONSOLIDATION_INTERVAL)
    }
}

impl PlanMemory {
    pub fn new(window: usize, interval: usize) -> Self {
        Self {
            short_term: Vec::new(),
            long_term: Vec::new(),
            plans: Vec::new(),
            window: window.max(1),
            interval,
            consolidated: 0,
        }
    }

    /// 记录一条改进计划
    pub fn push_plan(&mut self, plan: impl Into<String>) {
        let plan = plan.into();
        self.plans.push(plan.clone());
        self.short_term.push(plan);
        if self.short_term.len() > self.window {
            let excess = self.short_term.len() - self.window;
            self.short_term.drain(..excess);
        }
    }

    /// 若已积累满 K 条未合并计划，返回待摘要的计划
    pub fn pending_consolidation(&self) -> Option<Vec<String>> {
        if self.interval == 0 {
            return None;
        }
        let total = self.plans.len();
        if total == 0 || total % self.interval != 0 || total <= self.consolidated {
            return None;
        }
        Some(self.plans[total - self.interval..].to_vec())
    }

    /// 摘要成功后写入长期记忆
    pub fn push_summary(&mut self, summary: impl Into<String>) {
        self.long_term.push(summary.into());
        self.consolidated = self.plans.len();
    }

    pub fn short_term(&self) -> &[String] {
        &self.short_term
    }

    pub fn long_term(&self) -> &[String] {
        &self.long_term
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_term_window_prunes_oldest() {
        let mut memory = PlanMemory::new(2, 10);
        memory.push_plan("a");
        memory.push_plan("b");
        memory.push_plan("c");
        assert_eq!(memory.short_term(), &["b".to_string(), "c".to_string()]);
        assert_eq!(memory.pending_consolidation(), None);
    }

    #[test]
    fn test_consolidation_every_interval() {
        let mut memory = PlanMemory::new(10, 2);
        memory.push_plan("a");
        assert!(memory.pending_consolidation().is_none());
        memory.push_plan("b");
        assert_eq!(memory.pending_consolidation(), Some(vec!["a".to_string(), "b".to_string()]));

        memory.push_summary("ab");
        assert!(memory.pending_consolidation().is_none());
        memory.push_plan("c");
        memory.push_plan("d");
        assert_eq!(memory.pending_consolidation(), Some(vec!["c".to_string(), "d".to_string()]));
        assert_eq!(memory.long_term(), &["ab".to_string()]);
    }

    #[test]
    fn test_zero_interval_disables_consolidation() {
        let mut memory = PlanMemory::new(10, 0);
        memory.push_plan("a");
        assert!(memory.pending_consolidation().is_none());
    }
}
