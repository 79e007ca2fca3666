//! LLM 层：客户端抽象与实现（OpenAI 兼容 / Gemini / Mock）

pub mod gemini;
pub mod mock;
pub mod openai;
pub mod settings;
pub mod traits;

use std::sync::Arc;

pub use gemini::{GeminiClient, GEMINI_BASE_URL};
pub use mock::{MockLlmClient, MOCK_MODEL};
pub use openai::{OpenAiClient, OPENAI_DEFAULT_BASE_URL};
pub use settings::{LlmSettings, Provider, DEFAULT_GEMINI_MODEL, DEFAULT_OPENAI_MODEL};
pub use traits::{LlmClient, LlmError, LlmRequest};

use crate::core::EvolveError;

/// 根据设置创建 LLM 客户端
///
/// 模型名为空时使用提供方默认模型；Gemini 缺少 API Key 时返回 Provider 错误。
pub fn create_llm_client(settings: &LlmSettings, timeout_secs: u64) -> Result<Arc<dyn LlmClient>, EvolveError> {
    let model = if settings.model_name.trim().is_empty() {
        settings.provider.default_model().to_string()
    } else {
        settings.model_name.trim().to_string()
    };

    let client: Arc<dyn LlmClient> = match settings.provider {
        Provider::Gemini => {
            let client = GeminiClient::new(&model, settings.api_key(), timeout_secs)?;
            match settings.base_url() {
                Some(url) => Arc::new(client.with_base_url(url)),
                None => Arc::new(client),
            }
        }
        Provider::OpenAi => Arc::new(OpenAiClient::new(settings.base_url(), &model, settings.api_key())),
        Provider::Mock => Arc::new(MockLlmClient::new()),
    };

    tracing::info!(provider = %settings.provider, model = %client.model(), "LLM client ready");
    Ok(client)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_provider_needs_no_key() {
        let client = create_llm_client(&LlmSettings::for_provider(Provider::Mock), 30).unwrap();
        assert_eq!(client.provider(), Provider::Mock);
        assert_eq!(client.model(), MOCK_MODEL);
    }

    #[test]
    fn test_openai_uses_default_model_when_blank() {
        let mut settings = LlmSettings::for_provider(Provider::OpenAi);
        settings.model_name = "  ".into();
        settings.base_url = "http://localhost:1234/v1".into();
        let client = create_llm_client(&settings, 30).unwrap();
        assert_eq!(client.model(), DEFAULT_OPENAI_MODEL);
    }
}
