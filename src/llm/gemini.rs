//! Google Gemini 客户端（REST generateContent）
//!
//! - Base URL: https://generativelanguage.googleapis.com/v1beta
//! - Key: 设置中的 api_key，否则读取环境变量 `GEMINI_API_KEY` / `API_KEY`
//! - 图片以 inlineData（base64）分段发送，JSON 模式通过 responseMimeType 开启

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::llm::{LlmClient, LlmError, LlmRequest, Provider};

pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

const TEMPERATURE: f32 = 0.7;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content<'a>>,
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
enum Part<'a> {
    Text(&'a str),
    InlineData(InlineData),
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: &'static str,
    data: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<&'static str>,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

/// Gemini 客户端：reqwest + API Key
pub struct GeminiClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl GeminiClient {
    pub fn new(model: &str, api_key: Option<&str>, timeout_secs: u64) -> Result<Self, LlmError> {
        let api_key = api_key
            .map(String::from)
            .or_else(|| std::env::var("GEMINI_API_KEY").ok())
            .or_else(|| std::env::var("API_KEY").ok())
            .ok_or_else(|| {
                LlmError::Request(
                    "Gemini API key is not configured (set it in settings or GEMINI_API_KEY)".to_string(),
                )
            })?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| LlmError::Request(e.to_string()))?;
        Ok(Self {
            http,
            base_url: GEMINI_BASE_URL.to_string(),
            model: model.to_string(),
            api_key,
        })
    }

    /// 覆盖端点（代理或测试服务器）
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn build_body<'a>(&self, request: &'a LlmRequest, encoded: &'a [(String, &'static str)]) -> GenerateContentRequest<'a> {
        let mut parts: Vec<Part<'a>> = encoded
            .iter()
            .map(|(data, mime)| {
                Part::InlineData(InlineData {
                    mime_type: *mime,
                    data: data.clone(),
                })
            })
            .collect();
        parts.push(Part::Text(&request.user));

        GenerateContentRequest {
            system_instruction: request.system.as_deref().map(|s| Content {
                role: None,
                parts: vec![Part::Text(s)],
            }),
            contents: vec![Content {
                role: Some("user"),
                parts,
            }],
            generation_config: GenerationConfig {
                temperature: TEMPERATURE,
                response_mime_type: request.json_response.then_some("application/json"),
            },
        }
    }
}

#[async_trait]
impl LlmClient for GeminiClient {
    async fn complete(&self, request: &LlmRequest) -> Result<String, LlmError> {
        let encoded: Vec<(String, &'static str)> = request
            .images
            .iter()
            .map(|shot| (shot.to_base64(), shot.mime_type()))
            .collect();
        let body = self.build_body(request, &encoded);
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);

        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Network {
                message: format!("Gemini API Error: {}", e),
                hint: None,
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            return Err(LlmError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Other(format!("Gemini API Error: invalid response body: {}", e)))?;

        let text: String = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(LlmError::EmptyResponse("Gemini API".to_string()));
        }
        Ok(text)
    }

    fn provider(&self) -> Provider {
        Provider::Gemini
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preview::Screenshot;

    #[test]
    fn test_request_body_shape() {
        let client = GeminiClient::new("gemini-2.5-pro", Some("k"), 30).unwrap();
        let request = LlmRequest::new("make it faster")
            .with_system("you are a game developer")
            .with_images(vec![Screenshot::png(vec![1, 2, 3])])
            .json();
        let encoded: Vec<(String, &'static str)> =
            request.images.iter().map(|s| (s.to_base64(), s.mime_type())).collect();
        let body = serde_json::to_value(client.build_body(&request, &encoded)).unwrap();

        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "you are a game developer");
        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(body["contents"][0]["parts"][0]["inlineData"]["mimeType"], "image/png");
        assert_eq!(body["contents"][0]["parts"][1]["text"], "make it faster");
        assert_eq!(body["generationConfig"]["responseMimeType"], "application/json");
    }

    #[test]
    fn test_text_request_has_no_mime_type() {
        let client = GeminiClient::new("gemini-2.5-pro", Some("k"), 30).unwrap();
        let request = LlmRequest::new("idea please");
        let body = serde_json::to_value(client.build_body(&request, &[])).unwrap();
        assert!(body.get("systemInstruction").is_none());
        assert!(body["generationConfig"].get("responseMimeType").is_none());
    }
}
