//! OpenAI 兼容 API 客户端
//!
//! 通过 async_openai 调用任意 OpenAI 兼容端点（可配置 base_url）；支持 OpenAI 官方、LM Studio、Ollama 等本地服务。
//! 图片以 data URL 的 image_url 分段发送；JSON 模式只对官方端点开启（本地端点常不支持 response_format）。

use async_openai::config::OpenAIConfig;
use async_openai::error::OpenAIError;
use async_openai::types::chat::{
    ChatCompletionRequestMessage, ChatCompletionRequestMessageContentPartImageArgs,
    ChatCompletionRequestMessageContentPartTextArgs, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs, ChatCompletionRequestUserMessageContentPart,
    CreateChatCompletionRequestArgs, ImageDetail, ImageUrlArgs, ResponseFormat,
};
use async_openai::Client;
use async_trait::async_trait;

use crate::llm::{LlmClient, LlmError, LlmRequest, Provider};

pub const OPENAI_DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// 采样温度（与原交互一致，偏创造性）
const TEMPERATURE: f32 = 0.7;

/// OpenAI 兼容客户端：持有 Client、model 名与自定义 base_url
pub struct OpenAiClient {
    client: Client<OpenAIConfig>,
    model: String,
    base_url: Option<String>,
}

impl OpenAiClient {
    pub fn new(base_url: Option<&str>, model: &str, api_key: Option<&str>) -> Self {
        // 本地端点通常不校验 Key，但 async_openai 需要一个值
        let api_key = api_key
            .map(String::from)
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .unwrap_or_else(|| "sk-placeholder".to_string());

        let config = if let Some(url) = base_url {
            OpenAIConfig::new()
                .with_api_base(url.trim_end_matches('/'))
                .with_api_key(api_key)
        } else {
            OpenAIConfig::new().with_api_key(api_key)
        };

        Self {
            client: Client::with_config(config),
            model: model.to_string(),
            base_url: base_url.map(String::from),
        }
    }

    fn endpoint(&self) -> &str {
        self.base_url.as_deref().unwrap_or(OPENAI_DEFAULT_BASE_URL)
    }

    fn to_openai_messages(&self, request: &LlmRequest) -> Result<Vec<ChatCompletionRequestMessage>, LlmError> {
        let mut messages = Vec::new();

        if let Some(system) = &request.system {
            messages.push(ChatCompletionRequestMessage::System(
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(system.clone())
                    .build()
                    .map_err(|e| LlmError::Request(e.to_string()))?,
            ));
        }

        let user = if request.images.is_empty() {
            ChatCompletionRequestUserMessageArgs::default()
                .content(request.user.clone())
                .build()
        } else {
            let mut parts: Vec<ChatCompletionRequestUserMessageContentPart> = Vec::new();
            for shot in &request.images {
                let image_url = ImageUrlArgs::default()
                    .url(shot.data_url())
                    .detail(ImageDetail::Auto)
                    .build()
                    .map_err(|e| LlmError::Request(e.to_string()))?;
                parts.push(
                    ChatCompletionRequestMessageContentPartImageArgs::default()
                        .image_url(image_url)
                        .build()
                        .map_err(|e| LlmError::Request(e.to_string()))?
                        .into(),
                );
            }
            parts.push(
                ChatCompletionRequestMessageContentPartTextArgs::default()
                    .text(request.user.clone())
                    .build()
                    .map_err(|e| LlmError::Request(e.to_string()))?
                    .into(),
            );
            ChatCompletionRequestUserMessageArgs::default()
                .content(parts)
                .build()
        }
        .map_err(|e| LlmError::Request(e.to_string()))?;
        messages.push(ChatCompletionRequestMessage::User(user));

        Ok(messages)
    }

    /// 将传输层错误转为 LlmError；自定义端点连接失败时附带排查提示
    fn map_error(&self, e: OpenAIError) -> LlmError {
        match e {
            OpenAIError::Reqwest(inner) => LlmError::Network {
                message: inner.to_string(),
                hint: self.base_url.as_ref().map(|url| {
                    format!(
                        "ACTION REQUIRED: could not reach {}. If this is a local LLM server \
                         (LM Studio, Ollama), make sure it is running, listening on that address, \
                         and that the URL scheme (http vs https) matches the server.",
                        url
                    )
                }),
            },
            other => LlmError::Other(format!("OpenAI API error ({}): {}", self.endpoint(), other)),
        }
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn complete(&self, request: &LlmRequest) -> Result<String, LlmError> {
        let mut args = CreateChatCompletionRequestArgs::default();
        args.model(&self.model)
            .messages(self.to_openai_messages(request)?)
            .temperature(TEMPERATURE);
        if request.json_response && self.base_url.is_none() {
            args.response_format(ResponseFormat::JsonObject);
        }
        let chat_request = args.build().map_err(|e| LlmError::Request(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(chat_request)
            .await
            .map_err(|e| self.map_error(e))?;

        if let Some(usage) = &response.usage {
            tracing::debug!(
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "OpenAI usage"
            );
        }

        let content = response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .unwrap_or_default();

        if content.trim().is_empty() {
            return Err(LlmError::EmptyResponse(format!("OpenAI ({})", self.endpoint())));
        }
        Ok(content)
    }

    fn provider(&self) -> Provider {
        Provider::OpenAi
    }

    fn model(&self) -> &str {
        &self.model
    }
}
