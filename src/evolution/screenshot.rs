//! 截图时机：渲染后等待画面稳定，再按固定间隔截取若干张
//!
//! 截图失败不致命：调用方记录警告后退化为纯文本上下文。

use std::time::Duration;

use crate::core::{EvolveError, RunToken};
use crate::preview::{self, PreviewRenderer, Screenshot};

/// 原图 + 发给 LLM 的压缩图
#[derive(Debug, Clone)]
pub struct CapturedShot {
    pub original: Screenshot,
    pub compressed: Screenshot,
}

/// 上下文截图的结果：成功的截图（原图 + 压缩图）与每次失败的原因
#[derive(Debug, Default)]
pub struct ContextCapture {
    pub shots: Vec<CapturedShot>,
    pub failures: Vec<EvolveError>,
    /// 等待期间收到停止请求，提前结束
    pub interrupted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScreenshotSchedule {
    pub settle_delay: Duration,
    /// 每步截图张数（1–10）
    pub count: usize,
    /// 相邻两张的间隔
    pub interval: Duration,
    pub compress_max_width: u32,
    pub compress_quality: u8,
}

impl Default for ScreenshotSchedule {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_millis(1500),
            count: 1,
            interval: Duration::from_secs(1),
            compress_max_width: 512,
            compress_quality: 60,
        }
    }
}

impl ScreenshotSchedule {
    /// 不等待、只截一张（测试与无截图渲染器使用）
    pub fn immediate() -> Self {
        Self {
            settle_delay: Duration::ZERO,
            interval: Duration::ZERO,
            ..Self::default()
        }
    }

    /// 截一张并生成压缩版；压缩失败时两者都用原图
    pub async fn capture_one(&self, renderer: &dyn PreviewRenderer) -> Result<CapturedShot, EvolveError> {
        let original = renderer.capture_screenshot().await?;
        let compressed = match preview::compress(&original, self.compress_max_width, self.compress_quality) {
            Ok(small) => small,
            Err(e) => {
                tracing::warn!("Screenshot compression failed, sending original: {}", e);
                original.clone()
            }
        };
        Ok(CapturedShot { original, compressed })
    }

    /// 改进步开始前的上下文截图；等待可被停止请求打断
    pub async fn capture_context(&self, renderer: &dyn PreviewRenderer, token: &RunToken) -> ContextCapture {
        let mut capture = ContextCapture::default();
        if !wait_or_stop(self.settle_delay, token).await {
            capture.interrupted = true;
            return capture;
        }

        let count = self.count.clamp(1, 10);
        for i in 0..count {
            match self.capture_one(renderer).await {
                Ok(shot) => capture.shots.push(shot),
                Err(e) => capture.failures.push(e),
            }
            if i + 1 < count && !wait_or_stop(self.interval, token).await {
                capture.interrupted = true;
                break;
            }
        }
        capture
    }
}

/// 等待 delay；期间收到停止请求时返回 false
pub(crate) async fn wait_or_stop(delay: Duration, token: &RunToken) -> bool {
    if delay.is_zero() {
        return !token.is_stop_requested();
    }
    tokio::select! {
        _ = tokio::time::sleep(delay) => !token.is_stop_requested(),
        _ = token.stopped() => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use crate::core::RunSupervisor;

    /// 第 n 次截图失败的渲染器
    struct FlakyRenderer {
        calls: AtomicUsize,
        fail_on: usize,
    }

    #[async_trait]
    impl PreviewRenderer for FlakyRenderer {
        async fn render(&self, _html: &str) -> Result<(), EvolveError> {
            Ok(())
        }

        async fn capture_screenshot(&self) -> Result<Screenshot, EvolveError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n == self.fail_on {
                return Err(EvolveError::Capture("no canvas".into()));
            }
            Ok(Screenshot::png(vec![0u8; 4]))
        }
    }

    #[tokio::test]
    async fn test_context_capture_collects_shots_and_failures() {
        let renderer = FlakyRenderer {
            calls: AtomicUsize::new(0),
            fail_on: 2,
        };
        let schedule = ScreenshotSchedule {
            count: 3,
            ..ScreenshotSchedule::immediate()
        };
        let token = RunSupervisor::new().begin();
        let capture = schedule.capture_context(&renderer, &token).await;
        // 非法 PNG 压缩失败时回退原图
        assert_eq!(capture.shots.len(), 2);
        assert_eq!(capture.failures.len(), 1);
        assert!(!capture.interrupted);
    }

    #[tokio::test]
    async fn test_stop_interrupts_settle_delay() {
        let renderer = FlakyRenderer {
            calls: AtomicUsize::new(0),
            fail_on: 0,
        };
        let schedule = ScreenshotSchedule {
            settle_delay: Duration::from_secs(30),
            ..ScreenshotSchedule::default()
        };
        let supervisor = RunSupervisor::new();
        let token = supervisor.begin();
        let stopper = supervisor.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            stopper.request_stop();
        });
        let capture = schedule.capture_context(&renderer, &token).await;
        assert!(capture.interrupted);
        assert!(capture.shots.is_empty());
    }
}
