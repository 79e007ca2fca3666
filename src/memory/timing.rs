//! 计时：运行总时长（仅在生成 / 改进状态计时）与每次迭代耗时

use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

/// 可暂停的秒表：暂停不清零，只有 reset 清零
#[derive(Debug, Clone, Default)]
pub struct Stopwatch {
    accumulated: Duration,
    running_since: Option<Instant>,
}

impl Stopwatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self) {
        if self.running_since.is_none() {
            self.running_since = Some(Instant::now());
        }
    }

    pub fn pause(&mut self) {
        if let Some(since) = self.running_since.take() {
            self.accumulated += since.elapsed();
        }
    }

    pub fn reset(&mut self) {
        self.accumulated = Duration::ZERO;
        self.running_since = None;
    }

    pub fn elapsed(&self) -> Duration {
        self.accumulated + self.running_since.map(|s| s.elapsed()).unwrap_or_default()
    }
}

/// 对外展示的计时统计
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TimingStats {
    pub total_elapsed_ms: u64,
    pub per_iteration_ms: Vec<u64>,
}

impl TimingStats {
    pub fn average_ms(&self) -> Option<u64> {
        if self.per_iteration_ms.is_empty() {
            return None;
        }
        Some(self.per_iteration_ms.iter().sum::<u64>() / self.per_iteration_ms.len() as u64)
    }
}

/// 运行计时：总秒表 + 每步耗时
#[derive(Debug, Clone, Default)]
pub struct RunTimer {
    total: Stopwatch,
    per_iteration: Vec<Duration>,
    step_started: Option<Instant>,
}

impl RunTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.total.reset();
        self.per_iteration.clear();
        self.step_started = None;
    }

    pub fn resume(&mut self) {
        self.total.start();
    }

    pub fn pause(&mut self) {
        self.total.pause();
    }

    pub fn begin_step(&mut self) {
        self.step_started = Some(Instant::now());
    }

    /// 结束当前步（成功或失败都记录）
    pub fn end_step(&mut self) -> Option<Duration> {
        let elapsed = self.step_started.take()?.elapsed();
        self.per_iteration.push(elapsed);
        Some(elapsed)
    }

    pub fn stats(&self) -> TimingStats {
        TimingStats {
            total_elapsed_ms: self.total.elapsed().as_millis() as u64,
            per_iteration_ms: self.per_iteration.iter().map(|d| d.as_millis() as u64).collect(),
        }
    }
}
