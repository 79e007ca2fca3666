//! LLM 输出解析
//!
//! 严格模式：响应必须是约定形状的 JSON 对象（允许整体包在一个 markdown 代码块里）。
//! 唯一的恢复策略是 HtmlRecovery，且只用于初始生成：JSON 无法解析时从响应中提取完整 HTML 文档。

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Deserializer};

use crate::core::EvolveError;
use crate::evolution::types::{GeneratedGame, Improvement};

/// 初始生成响应无法按 JSON 解析时的恢复策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HtmlRecovery {
    /// 提取 ```html 代码块或裸露的 `<!DOCTYPE html>…</html>` 文档
    #[default]
    ExtractDocument,
    Disabled,
}

impl HtmlRecovery {
    pub fn from_flag(enabled: bool) -> Self {
        if enabled {
            HtmlRecovery::ExtractDocument
        } else {
            HtmlRecovery::Disabled
        }
    }
}

/// plan 可能是字符串，也可能是步骤数组
fn plan_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Plan {
        Text(String),
        Steps(Vec<String>),
    }

    Ok(match Plan::deserialize(deserializer)? {
        Plan::Text(s) => s,
        Plan::Steps(steps) => steps.join("\n"),
    })
}

fn optional_plan_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    plan_text(deserializer).map(Some)
}

#[derive(Deserialize)]
struct InitialPayload {
    #[serde(default)]
    thought: Option<String>,
    #[serde(default, deserialize_with = "optional_plan_text")]
    plan: Option<String>,
    code: String,
}

#[derive(Deserialize)]
struct ImprovePayload {
    thought: String,
    analysis: String,
    #[serde(deserialize_with = "plan_text")]
    plan: String,
    code: String,
}

/// 整个响应包在一个 markdown 代码块（```json / ```）里时取出内部文本
pub fn unwrap_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    if !trimmed.starts_with("```") || !trimmed.ends_with("```") || trimmed.len() < 6 {
        return trimmed;
    }
    let inner = &trimmed[3..trimmed.len() - 3];
    // 首行是语言标记（可能为空）
    match inner.find('\n') {
        Some(nl) => inner[nl + 1..].trim(),
        None => inner.trim(),
    }
}

static HTML_FENCE_RE: OnceLock<Option<Regex>> = OnceLock::new();
static HTML_DOCUMENT_RE: OnceLock<Option<Regex>> = OnceLock::new();

/// 从自由文本中提取完整 HTML 文档：优先 ```html 代码块，其次裸的 <!DOCTYPE html>…</html>
pub fn extract_html_document(text: &str) -> Option<String> {
    let fence = HTML_FENCE_RE.get_or_init(|| Regex::new(r"(?s)```html[ \t]*\r?\n?(.*?)```").ok());
    if let Some(doc) = fence
        .as_ref()
        .and_then(|re| re.captures(text))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
        .filter(|doc| !doc.is_empty())
    {
        return Some(doc.to_string());
    }

    let document = HTML_DOCUMENT_RE.get_or_init(|| Regex::new(r"(?is)<!doctype html.*</html>").ok());
    document
        .as_ref()
        .and_then(|re| re.find(text))
        .map(|m| m.as_str().to_string())
}

fn non_blank_code(code: String) -> Result<String, EvolveError> {
    if code.trim().is_empty() {
        return Err(EvolveError::Parse("response field `code` is empty".to_string()));
    }
    Ok(code)
}

/// 解析初始生成响应
pub fn parse_initial(output: &str, recovery: HtmlRecovery) -> Result<GeneratedGame, EvolveError> {
    let body = unwrap_code_fence(output);
    match serde_json::from_str::<InitialPayload>(body) {
        Ok(payload) => Ok(GeneratedGame {
            thought: payload.thought,
            plan: payload.plan,
            code: non_blank_code(payload.code)?,
        }),
        Err(e) => {
            if recovery == HtmlRecovery::ExtractDocument {
                if let Some(code) = extract_html_document(output) {
                    tracing::warn!("Initial response was not valid JSON, recovered HTML document");
                    return Ok(GeneratedGame {
                        thought: None,
                        plan: None,
                        code,
                    });
                }
            }
            Err(EvolveError::Parse(format!(
                "could not parse initial generation response: {}",
                e
            )))
        }
    }
}

/// 解析改进响应：thought / analysis / plan / code 缺一不可
pub fn parse_improvement(output: &str) -> Result<Improvement, EvolveError> {
    let body = unwrap_code_fence(output);
    let payload: ImprovePayload = serde_json::from_str(body)
        .map_err(|e| EvolveError::Parse(format!("could not parse improvement response: {}", e)))?;
    Ok(Improvement {
        thought: payload.thought,
        analysis: payload.analysis,
        plan: payload.plan,
        code: non_blank_code(payload.code)?,
    })
}

/// 摘要：非空纯文本
pub fn parse_summary(output: &str) -> Result<String, EvolveError> {
    let summary = output.trim();
    if summary.is_empty() {
        return Err(EvolveError::Parse("summary response is empty".to_string()));
    }
    Ok(summary.to_string())
}

/// 创意：取第一行非空文本并去掉包裹的引号
pub fn parse_idea(output: &str) -> Result<String, EvolveError> {
    let line = output
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .ok_or_else(|| EvolveError::Parse("idea response is empty".to_string()))?;
    Ok(line.trim_matches(|c| c == '"' || c == '\'').trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_improvement_accepts_fenced_json_and_plan_list() {
        let output = "```json\n{\"thought\":\"t\",\"analysis\":\"a\",\"plan\":[\"one\",\"two\"],\"code\":\"<html></html>\"}\n```";
        let parsed = parse_improvement(output).unwrap();
        assert_eq!(parsed.plan, "one\ntwo");
        assert_eq!(parsed.code, "<html></html>");
    }

    #[test]
    fn test_improvement_missing_code_is_parse_error() {
        let err = parse_improvement(r#"{"thought":"t","analysis":"a","plan":"p"}"#).unwrap_err();
        assert!(matches!(err, EvolveError::Parse(msg) if msg.contains("missing field `code`")));
    }

    #[test]
    fn test_improvement_does_not_recover_html() {
        let output = "Sure!\n```html\n<!DOCTYPE html><html></html>\n```";
        assert!(parse_improvement(output).is_err());
    }

    #[test]
    fn test_initial_recovers_html_block() {
        let output = "Here you go:\n```html\n<!DOCTYPE html><html><body></body></html>\n```\nEnjoy";
        let game = parse_initial(output, HtmlRecovery::ExtractDocument).unwrap();
        assert_eq!(game.code, "<!DOCTYPE html><html><body></body></html>");
        assert!(game.plan.is_none());
    }

    #[test]
    fn test_initial_recovers_bare_document() {
        let output = "prefix <!DOCTYPE html><html><canvas></canvas></html> suffix";
        let game = parse_initial(output, HtmlRecovery::ExtractDocument).unwrap();
        assert_eq!(game.code, "<!DOCTYPE html><html><canvas></canvas></html>");
    }

    #[test]
    fn test_initial_without_recovery_fails_closed() {
        let output = "```html\n<html></html>\n```";
        let err = parse_initial(output, HtmlRecovery::Disabled).unwrap_err();
        assert!(matches!(err, EvolveError::Parse(_)));
    }

    #[test]
    fn test_blank_code_rejected() {
        let err = parse_initial(r#"{"code":"   "}"#, HtmlRecovery::Disabled).unwrap_err();
        assert_eq!(err, EvolveError::Parse("response field `code` is empty".into()));
    }

    #[test]
    fn test_idea_strips_quotes() {
        assert_eq!(parse_idea("\n\"A frog racing snails\"\n").unwrap(), "A frog racing snails");
        assert!(parse_idea("   ").is_err());
    }
}
