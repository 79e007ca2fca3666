//! Headless Chrome 预览：加载 HTML 并截取 canvas
//!
//! 需启用 feature "browser" 且系统已安装 Chrome/Chromium。
//! 文档以 data URL 方式加载；截图时轮询等待 `<canvas>` 出现（有界超时），找不到则返回 Capture 错误。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use headless_chrome::protocol::cdp::Page::CaptureScreenshotFormatOption;
use headless_chrome::{Browser, LaunchOptions, Tab};

use crate::core::EvolveError;
use crate::preview::{poll_until, PreviewRenderer, Screenshot};

/// 轮询 canvas 的间隔
const CANVAS_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Headless Chrome 渲染器：持有浏览器进程与单个 Tab
pub struct ChromeRenderer {
    _browser: Browser,
    tab: Arc<Tab>,
    capture_timeout: Duration,
}

impl ChromeRenderer {
    /// 启动无头浏览器；window 为视口大小
    pub fn launch(window: (u32, u32), capture_timeout: Duration) -> Result<Self, EvolveError> {
        let options = LaunchOptions::default_builder()
            .headless(true)
            .window_size(Some(window))
            .build()
            .map_err(|e| EvolveError::Config(format!("Chrome launch options: {}", e)))?;
        let browser = Browser::new(options)
            .map_err(|e| EvolveError::Config(format!("Launch Chrome failed: {}", e)))?;
        let tab = browser
            .new_tab()
            .map_err(|e| EvolveError::Config(format!("Open tab failed: {}", e)))?;
        Ok(Self {
            _browser: browser,
            tab,
            capture_timeout,
        })
    }
}

#[async_trait]
impl PreviewRenderer for ChromeRenderer {
    async fn render(&self, html: &str) -> Result<(), EvolveError> {
        let url = format!("data:text/html;base64,{}", STANDARD.encode(html.as_bytes()));
        let tab = self.tab.clone();
        tokio::task::spawn_blocking(move || -> Result<(), String> {
            tab.navigate_to(&url)
                .and_then(|t| t.wait_until_navigated())
                .map(|_| ())
                .map_err(|e| e.to_string())
        })
        .await
        .map_err(|e| EvolveError::Io(e.to_string()))?
        .map_err(|e| EvolveError::Io(format!("Load preview failed: {}", e)))
    }

    async fn capture_screenshot(&self) -> Result<Screenshot, EvolveError> {
        let tab = self.tab.clone();
        let result = poll_until(self.capture_timeout, CANVAS_POLL_INTERVAL, || {
            let tab = tab.clone();
            async move {
                tokio::task::spawn_blocking(move || {
                    let canvas = tab.find_element("canvas").ok()?;
                    canvas
                        .capture_screenshot(CaptureScreenshotFormatOption::Png)
                        .ok()
                })
                .await
                .ok()
                .flatten()
            }
        })
        .await;

        match result {
            Ok(bytes) if !bytes.is_empty() => Ok(Screenshot::png(bytes)),
            Ok(_) => Err(EvolveError::Capture("canvas screenshot was empty".to_string())),
            Err(timeout) => Err(EvolveError::Capture(format!(
                "no canvas found after {} attempts ({:?})",
                timeout.attempts, self.capture_timeout
            ))),
        }
    }
}
