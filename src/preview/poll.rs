//! 有界重试轮询
//!
//! 反复调用 check 直到返回 Some 或超时；用于等待预览中出现可绘制表面（canvas），与具体 UI 无关。

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

/// 轮询超时（返回最后一次尝试的次数，便于日志）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollTimeout {
    pub attempts: usize,
}

/// 每隔 interval 调用一次 check，最多等待 timeout；至少尝试一次
pub async fn poll_until<T, F, Fut>(
    timeout: Duration,
    interval: Duration,
    mut check: F,
) -> Result<T, PollTimeout>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Option<T>>,
{
    let deadline = Instant::now() + timeout;
    let mut attempts = 0usize;
    loop {
        attempts += 1;
        if let Some(value) = check().await {
            return Ok(value);
        }
        let now = Instant::now();
        if now >= deadline {
            return Err(PollTimeout { attempts });
        }
        let remaining = deadline - now;
        tokio::time::sleep(interval.min(remaining)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_poll_returns_when_ready() {
        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();
        let result = poll_until(Duration::from_secs(1), Duration::from_millis(1), move || {
            let c = c.clone();
            async move {
                let n = c.fetch_add(1, Ordering::SeqCst) + 1;
                (n >= 3).then_some(n)
            }
        })
        .await;
        assert_eq!(result, Ok(3));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_poll_times_out() {
        let result: Result<(), _> =
            poll_until(Duration::from_millis(20), Duration::from_millis(5), || async { None }).await;
        let timeout = result.unwrap_err();
        assert!(timeout.attempts >= 2);
    }

    #[tokio::test]
    async fn test_poll_zero_timeout_tries_once() {
        let result: Result<u8, _> = poll_until(Duration::ZERO, Duration::from_millis(5), || async { None }).await;
        assert_eq!(result, Err(PollTimeout { attempts: 1 }));
    }
}
