//! LLM 连接设置：提供方、API Key、Base URL、模型名
//!
//! 由用户在界面中填写、由 SettingsStore 跨会话持久化；每次运行开始时随 EvolutionConfig 固定。

use serde::{Deserialize, Serialize};

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-pro";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o";

/// LLM 提供方
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[default]
    Gemini,
    /// OpenAI 或任意 OpenAI 兼容端点（LM Studio、Ollama 等）
    #[serde(alias = "openai-compatible")]
    OpenAi,
    /// 离线 Mock，无需 API
    Mock,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Gemini => "gemini",
            Provider::OpenAi => "openai",
            Provider::Mock => "mock",
        }
    }

    /// 切换提供方时使用的默认模型
    pub fn default_model(&self) -> &'static str {
        match self {
            Provider::Gemini => DEFAULT_GEMINI_MODEL,
            Provider::OpenAi => DEFAULT_OPENAI_MODEL,
            Provider::Mock => crate::llm::mock::MOCK_MODEL,
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "gemini" | "google" => Ok(Provider::Gemini),
            "openai" | "openai-compatible" => Ok(Provider::OpenAi),
            "mock" => Ok(Provider::Mock),
            other => Err(format!("Unsupported LLM provider: {}", other)),
        }
    }
}

/// 一次运行使用的模型配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LlmSettings {
    pub provider: Provider,
    /// 为空时从环境变量读取（GEMINI_API_KEY / OPENAI_API_KEY）
    #[serde(default)]
    pub api_key: String,
    /// 仅 OpenAI 兼容端点使用；为空表示官方端点
    #[serde(default)]
    pub base_url: String,
    pub model_name: String,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self::for_provider(Provider::default())
    }
}

impl LlmSettings {
    pub fn for_provider(provider: Provider) -> Self {
        Self {
            provider,
            api_key: String::new(),
            base_url: String::new(),
            model_name: provider.default_model().to_string(),
        }
    }

    /// 切换提供方并重置为合理默认（Gemini 不使用 base_url）
    pub fn switch_provider(&mut self, provider: Provider) {
        if self.provider == provider {
            return;
        }
        self.provider = provider;
        self.model_name = provider.default_model().to_string();
        if provider != Provider::OpenAi {
            self.base_url.clear();
        }
    }

    pub fn base_url(&self) -> Option<&str> {
        let url = self.base_url.trim();
        (!url.is_empty()).then_some(url)
    }

    pub fn api_key(&self) -> Option<&str> {
        let key = self.api_key.trim();
        (!key.is_empty()).then_some(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_parse() {
        assert_eq!("Gemini".parse::<Provider>(), Ok(Provider::Gemini));
        assert_eq!("openai".parse::<Provider>(), Ok(Provider::OpenAi));
        assert!("claude".parse::<Provider>().is_err());
    }

    #[test]
    fn test_switch_provider_resets_model_and_base_url() {
        let mut settings = LlmSettings::for_provider(Provider::OpenAi);
        settings.base_url = "http://localhost:1234/v1".into();
        settings.switch_provider(Provider::Gemini);
        assert_eq!(settings.model_name, DEFAULT_GEMINI_MODEL);
        assert!(settings.base_url().is_none());
    }

    #[test]
    fn test_blank_optional_fields() {
        let settings = LlmSettings {
            api_key: "  ".into(),
            ..LlmSettings::for_provider(Provider::OpenAi)
        };
        assert!(settings.api_key().is_none());
        assert!(settings.base_url().is_none());
    }
}
