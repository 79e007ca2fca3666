//! 运行监管：协作式停止与过期结果丢弃
//!
//! 每次 start 开启新一代运行：代数加一并换上新的 CancellationToken。
//! 停止请求只取消令牌，不中断正在进行的 LLM 调用；调用返回后由 RunToken 判断是否仍可应用结果。

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio_util::sync::CancellationToken;

#[derive(Debug)]
struct Inner {
    generation: AtomicU64,
    current: Mutex<CancellationToken>,
}

impl Inner {
    fn current(&self) -> MutexGuard<'_, CancellationToken> {
        self.current.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// 运行级生命周期管理：代数计数 + 取消令牌
#[derive(Debug, Clone)]
pub struct RunSupervisor {
    inner: Arc<Inner>,
}

/// 某一代运行的凭证，随异步步骤传递
#[derive(Debug, Clone)]
pub struct RunToken {
    generation: u64,
    cancel: CancellationToken,
    supervisor: Arc<Inner>,
}

impl RunSupervisor {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                generation: AtomicU64::new(0),
                current: Mutex::new(CancellationToken::new()),
            }),
        }
    }

    /// 开启新一代运行；上一代的令牌被取消，其结果随后都会被丢弃
    pub fn begin(&self) -> RunToken {
        let cancel = CancellationToken::new();
        let previous = std::mem::replace(&mut *self.inner.current(), cancel.clone());
        previous.cancel();
        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        RunToken {
            generation,
            cancel,
            supervisor: self.inner.clone(),
        }
    }

    /// 请求停止当前运行（协作式）
    pub fn request_stop(&self) {
        self.inner.current().cancel();
    }

    /// 沿用当前代继续运行（resume）：换上新令牌但不改变代数
    pub fn rearm(&self) -> RunToken {
        let cancel = CancellationToken::new();
        *self.inner.current() = cancel.clone();
        RunToken {
            generation: self.generation(),
            cancel,
            supervisor: self.inner.clone(),
        }
    }

    pub fn generation(&self) -> u64 {
        self.inner.generation.load(Ordering::SeqCst)
    }
}

impl Default for RunSupervisor {
    fn default() -> Self {
        Self::new()
    }
}

impl RunToken {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_stop_requested(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// 本代是否仍是最新一代（结果可应用）
    pub fn is_current(&self) -> bool {
        self.supervisor.generation.load(Ordering::SeqCst) == self.generation
    }

    /// 等待停止请求（用于在延时中提前醒来）
    pub async fn stopped(&self) {
        self.cancel.cancelled().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_cancels_current_token() {
        let supervisor = RunSupervisor::new();
        let token = supervisor.begin();
        assert!(!token.is_stop_requested());
        supervisor.request_stop();
        assert!(token.is_stop_requested());
        assert!(token.is_current());
    }

    #[test]
    fn test_new_run_makes_old_token_stale() {
        let supervisor = RunSupervisor::new();
        let old = supervisor.begin();
        let new = supervisor.begin();
        assert!(old.is_stop_requested());
        assert!(!old.is_current());
        assert!(new.is_current());
        assert_eq!(new.generation(), 2);
    }

    #[test]
    fn test_rearm_keeps_generation() {
        let supervisor = RunSupervisor::new();
        let token = supervisor.begin();
        supervisor.request_stop();
        let resumed = supervisor.rearm();
        assert!(token.is_stop_requested());
        assert!(!resumed.is_stop_requested());
        assert_eq!(resumed.generation(), token.generation());
    }
}
