//! LLM 客户端抽象
//!
//! 所有后端（OpenAI 兼容 / Gemini / Mock）实现 LlmClient：给定一条结构化请求（system + user 文本 + 可选图片），
//! 返回模型输出文本。字符数统计由调用方基于 LlmRequest::input_chars 计算。

use async_trait::async_trait;
use thiserror::Error;

use crate::core::EvolveError;
use crate::llm::Provider;
use crate::preview::Screenshot;

/// LLM 调用错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LlmError {
    /// 网络不可达、连接被拒等；hint 为面向用户的排查提示
    #[error("Network request failed: {message}{}", hint_suffix(.hint))]
    Network { message: String, hint: Option<String> },

    #[error("API request failed with status {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Received an empty response from {0}")]
    EmptyResponse(String),

    #[error("Invalid request: {0}")]
    Request(String),

    #[error("{0}")]
    Other(String),
}

impl LlmError {
    /// 请求是否已经发到提供方；构造请求阶段的错误不算一次调用
    pub fn was_sent(&self) -> bool {
        !matches!(self, LlmError::Request(_))
    }
}

fn hint_suffix(hint: &Option<String>) -> String {
    hint.as_deref().map(|h| format!("\n\n{}", h)).unwrap_or_default()
}

impl From<LlmError> for EvolveError {
    fn from(e: LlmError) -> Self {
        EvolveError::Provider(e.to_string())
    }
}

/// 单次 LLM 请求
#[derive(Debug, Clone, Default)]
pub struct LlmRequest {
    pub system: Option<String>,
    pub user: String,
    /// 附带的图片（按顺序放在文本之前）
    pub images: Vec<Screenshot>,
    /// 要求模型输出 JSON 对象
    pub json_response: bool,
}

impl LlmRequest {
    pub fn new(user: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            ..Default::default()
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_images(mut self, images: Vec<Screenshot>) -> Self {
        self.images = images;
        self
    }

    pub fn json(mut self) -> Self {
        self.json_response = true;
        self
    }

    /// 输入字符数：system + user 文本（图片不计）
    pub fn input_chars(&self) -> usize {
        self.system.as_deref().map(|s| s.chars().count()).unwrap_or(0) + self.user.chars().count()
    }
}

/// LLM 客户端 trait
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// 非流式完成，返回模型输出文本
    async fn complete(&self, request: &LlmRequest) -> Result<String, LlmError>;

    fn provider(&self) -> Provider;

    fn model(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_chars_counts_system_and_user() {
        let req = LlmRequest::new("héllo").with_system("sys");
        assert_eq!(req.input_chars(), 8);
    }

    #[test]
    fn test_network_error_includes_hint() {
        let err = LlmError::Network {
            message: "connection refused".into(),
            hint: Some("Check the server".into()),
        };
        let text = err.to_string();
        assert!(text.contains("connection refused"));
        assert!(text.ends_with("Check the server"));
    }

    #[test]
    fn test_llm_error_maps_to_provider_error() {
        let err: EvolveError = LlmError::Http { status: 401, body: "bad key".into() }.into();
        assert!(matches!(err, EvolveError::Provider(msg) if msg.contains("401")));
    }
}
