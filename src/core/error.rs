//! 进化循环错误类型
//!
//! 与 EvolutionLoop 的传播策略配合：Validation / Capture 在本地处理不终止运行；
//! Provider / Parse 对当前运行是致命的，消息原样展示给用户，不自动重试。

use thiserror::Error;

/// 进化运行中可能出现的错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EvolveError {
    /// 用户可修正的输入错误（如空的游戏概念），不改变任何状态
    #[error("Validation error: {0}")]
    Validation(String),

    /// 网络 / 鉴权 / 限流等提供方错误，终止当前运行
    #[error("Provider error: {0}")]
    Provider(String),

    /// LLM 响应缺少必需字段或 JSON 无法解析，终止当前运行
    #[error("Parse error: {0}")]
    Parse(String),

    /// 截图不可用（无可绘制表面、超时），降级为纯文本上下文
    #[error("Capture error: {0}")]
    Capture(String),

    /// 当前状态不允许该操作（如未开始就执行改进步）
    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(String),
}

impl From<std::io::Error> for EvolveError {
    fn from(e: std::io::Error) -> Self {
        EvolveError::Io(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_is_verbatim() {
        let err = EvolveError::Provider("API request failed with status 429".into());
        assert_eq!(err.to_string(), "Provider error: API request failed with status 429");
    }
}
