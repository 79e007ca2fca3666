//! 游戏开发网关：进化循环使用的四种 LLM 能力
//!
//! 每次调用都返回字符统计，失败时也尽量带回（调用已发出即记入 UsageStat）。

use std::sync::Arc;

use async_trait::async_trait;

use crate::core::EvolveError;
use crate::evolution::prompts;
use crate::evolution::response::{self, HtmlRecovery};
use crate::evolution::types::{GameType, GeneratedGame, ImproveRequest, Improvement};
use crate::llm::{LlmClient, LlmRequest, Provider};

/// 一次调用的输入 / 输出字符数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallUsage {
    pub input_chars: usize,
    pub output_chars: usize,
}

/// 成功结果 + 字符统计
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completed<T> {
    pub value: T,
    pub usage: CallUsage,
}

/// 失败结果；usage 为 None 表示调用根本没有发出
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayFailure {
    pub error: EvolveError,
    pub usage: Option<CallUsage>,
}

impl From<EvolveError> for GatewayFailure {
    fn from(error: EvolveError) -> Self {
        Self { error, usage: None }
    }
}

pub type GatewayResult<T> = Result<Completed<T>, GatewayFailure>;

/// 网关 trait：可替换为测试用的假实现
#[async_trait]
pub trait GameDevGateway: Send + Sync {
    async fn generate_initial(&self, concept: &str, game_type: GameType) -> GatewayResult<GeneratedGame>;

    async fn improve(&self, request: &ImproveRequest) -> GatewayResult<Improvement>;

    async fn summarize(&self, plans: &[String]) -> GatewayResult<String>;

    async fn random_idea(&self, game_type: GameType) -> GatewayResult<String>;

    fn provider(&self) -> Provider;

    fn model(&self) -> String;
}

/// 基于 LlmClient 的网关实现
pub struct LlmGameDevGateway {
    client: Arc<dyn LlmClient>,
    recovery: HtmlRecovery,
}

impl LlmGameDevGateway {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self {
            client,
            recovery: HtmlRecovery::default(),
        }
    }

    pub fn with_recovery(mut self, recovery: HtmlRecovery) -> Self {
        self.recovery = recovery;
        self
    }

    /// 发出请求并解析；任何失败都带回本次调用的字符统计
    async fn call<T>(
        &self,
        request: LlmRequest,
        parse: impl FnOnce(&str) -> Result<T, EvolveError>,
    ) -> GatewayResult<T> {
        let input_chars = request.input_chars();
        let output = self.client.complete(&request).await.map_err(|e| GatewayFailure {
            usage: e.was_sent().then_some(CallUsage {
                input_chars,
                output_chars: 0,
            }),
            error: e.into(),
        })?;

        let usage = CallUsage {
            input_chars,
            output_chars: output.chars().count(),
        };
        match parse(&output) {
            Ok(value) => Ok(Completed { value, usage }),
            Err(error) => Err(GatewayFailure {
                error,
                usage: Some(usage),
            }),
        }
    }
}

#[async_trait]
impl GameDevGateway for LlmGameDevGateway {
    async fn generate_initial(&self, concept: &str, game_type: GameType) -> GatewayResult<GeneratedGame> {
        let request = LlmRequest::new(prompts::initial_prompt(concept, game_type))
            .with_system(prompts::GAME_DEV_SYSTEM)
            .json();
        let recovery = self.recovery;
        self.call(request, |out| response::parse_initial(out, recovery)).await
    }

    async fn improve(&self, request: &ImproveRequest) -> GatewayResult<Improvement> {
        let llm_request = LlmRequest::new(prompts::improve_prompt(request))
            .with_system(prompts::IMPROVER_SYSTEM)
            .with_images(request.screenshots.clone())
            .json();
        self.call(llm_request, response::parse_improvement).await
    }

    async fn summarize(&self, plans: &[String]) -> GatewayResult<String> {
        let request = LlmRequest::new(prompts::summarize_prompt(plans)).with_system(prompts::SUMMARIZER_SYSTEM);
        self.call(request, response::parse_summary).await
    }

    async fn random_idea(&self, game_type: GameType) -> GatewayResult<String> {
        let request = LlmRequest::new(prompts::idea_prompt(game_type));
        self.call(request, response::parse_idea).await
    }

    fn provider(&self) -> Provider {
        self.client.provider()
    }

    fn model(&self) -> String {
        self.client.model().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{LlmError, MockLlmClient};

    struct FixedClient(Result<String, LlmError>);

    #[async_trait]
    impl LlmClient for FixedClient {
        async fn complete(&self, _request: &LlmRequest) -> Result<String, LlmError> {
            self.0.clone()
        }

        fn provider(&self) -> Provider {
            Provider::Mock
        }

        fn model(&self) -> &str {
            "fixed"
        }
    }

    #[tokio::test]
    async fn test_generate_initial_with_mock_counts_chars() {
        let gateway = LlmGameDevGateway::new(Arc::new(MockLlmClient::new()));
        let done = gateway.generate_initial("A cat jumps over dogs", GameType::Interactive).await.unwrap();
        assert!(done.value.code.contains("<canvas"));
        assert!(done.usage.input_chars > 0);
        assert!(done.usage.output_chars > done.value.code.len() / 2);
    }

    #[tokio::test]
    async fn test_provider_failure_keeps_input_usage() {
        let gateway = LlmGameDevGateway::new(Arc::new(FixedClient(Err(LlmError::Http {
            status: 429,
            body: "rate limited".into(),
        }))));
        let failure = gateway.summarize(&["a".to_string()]).await.unwrap_err();
        assert!(matches!(failure.error, EvolveError::Provider(ref m) if m.contains("rate limited")));
        let usage = failure.usage.unwrap();
        assert!(usage.input_chars > 0);
        assert_eq!(usage.output_chars, 0);
    }

    #[tokio::test]
    async fn test_request_build_failure_is_not_an_issued_call() {
        let gateway = LlmGameDevGateway::new(Arc::new(FixedClient(Err(LlmError::Request(
            "invalid image data".into(),
        )))));
        let failure = gateway.random_idea(GameType::Interactive).await.unwrap_err();
        assert!(matches!(failure.error, EvolveError::Provider(ref m) if m.contains("invalid image data")));
        assert!(failure.usage.is_none());
    }

    #[tokio::test]
    async fn test_parse_failure_keeps_output_usage() {
        let gateway = LlmGameDevGateway::new(Arc::new(FixedClient(Ok(
            r#"{"thought":"t","analysis":"a","plan":"p"}"#.to_string(),
        ))));
        let failure = gateway.improve(&ImproveRequest::default()).await.unwrap_err();
        assert!(matches!(failure.error, EvolveError::Parse(_)));
        assert_eq!(failure.usage.unwrap().output_chars, 41);
    }
}
