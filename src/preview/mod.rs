//! 预览层：加载生成的 HTML 文档并按需截图
//!
//! 进化循环只通过 PreviewRenderer 两个能力使用预览：render（加载文档）与 capture_screenshot（截图）。
//! - **FileRenderer**: 写入 preview.html 供用户在浏览器中打开；无可绘制表面，截图总是失败（降级为纯文本上下文）
//! - **ChromeRenderer**: Headless Chrome 渲染并截取 canvas（需 feature "browser"）

#[cfg(feature = "browser")]
pub mod chrome;
pub mod poll;
pub mod screenshot;

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::core::EvolveError;

#[cfg(feature = "browser")]
pub use chrome::ChromeRenderer;
pub use poll::{poll_until, PollTimeout};
pub use screenshot::{compress, ImageFormat, Screenshot};

/// 预览渲染器 trait
#[async_trait]
pub trait PreviewRenderer: Send + Sync {
    /// 在隔离环境中加载完整 HTML 文档（替换之前的文档）
    async fn render(&self, html: &str) -> Result<(), EvolveError>;

    /// 截取当前文档的画面；在有界时间内找不到可绘制表面时返回 EvolveError::Capture
    async fn capture_screenshot(&self) -> Result<Screenshot, EvolveError>;
}

/// 文件预览：把当前文档写到磁盘
#[derive(Debug, Clone)]
pub struct FileRenderer {
    path: PathBuf,
}

impl FileRenderer {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl PreviewRenderer for FileRenderer {
    async fn render(&self, html: &str) -> Result<(), EvolveError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.path, html).await?;
        tracing::debug!("Preview written to {}", self.path.display());
        Ok(())
    }

    async fn capture_screenshot(&self) -> Result<Screenshot, EvolveError> {
        Err(EvolveError::Capture(format!(
            "no drawable surface: file preview at {} cannot be captured",
            self.path.display()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_file_renderer_writes_document() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = FileRenderer::new(dir.path().join("nested").join("preview.html"));
        renderer.render("<html><body>hi</body></html>").await.unwrap();

        let written = std::fs::read_to_string(renderer.path()).unwrap();
        assert!(written.contains("hi"));
    }

    #[tokio::test]
    async fn test_file_renderer_capture_fails() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = FileRenderer::new(dir.path().join("preview.html"));
        assert!(matches!(
            renderer.capture_screenshot().await,
            Err(EvolveError::Capture(_))
        ));
    }
}
