use std::fmt;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::llm::LlmSettings;
use crate::preview::Screenshot;

/// 游戏类型：交互式（玩家操控）或模拟（自行运行）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum GameType {
    #[default]
    Interactive,
    Simulation,
}

impl GameType {
    pub fn as_str(&self) -> &'static str {
        match self {
            GameType::Interactive => "interactive",
            GameType::Simulation => "simulation",
        }
    }
}

impl fmt::Display for GameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for GameType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "interactive" | "game" => Ok(GameType::Interactive),
            "simulation" | "sim" => Ok(GameType::Simulation),
            other => Err(format!("Unknown game type: {}", other)),
        }
    }
}

/// 一次 LLM 调用的任务类型（用于 UsageStat）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    Generation,
    Improvement,
    Summarize,
    Idea,
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskKind::Generation => write!(f, "generation"),
            TaskKind::Improvement => write!(f, "improvement"),
            TaskKind::Summarize => write!(f, "summarize"),
            TaskKind::Idea => write!(f, "idea"),
        }
    }
}

/// 一次进化运行的配置；start 之后不可变
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvolutionConfig {
    pub game_concept: String,
    pub game_type: GameType,
    /// 初始生成之后最多执行的改进步数（≥ 1）
    pub max_iterations: usize,
    pub llm: LlmSettings,
}

impl EvolutionConfig {
    pub fn new(game_concept: impl Into<String>, game_type: GameType, max_iterations: usize) -> Self {
        Self {
            game_concept: game_concept.into(),
            game_type,
            max_iterations,
            llm: LlmSettings::default(),
        }
    }

    pub fn with_llm(mut self, llm: LlmSettings) -> Self {
        self.llm = llm;
        self
    }
}

/// 生成产物的一个版本（完整 HTML 文档 + 可选截图）
#[derive(Debug, Clone)]
pub struct Iteration {
    /// 从 1 开始
    pub index: usize,
    pub code: String,
    pub screenshot: Option<Screenshot>,
    pub compressed_screenshot: Option<Screenshot>,
    /// 产生该版本的计划（初始生成可能为空）
    pub plan: Option<String>,
    pub created_at: DateTime<Local>,
}

impl Iteration {
    pub fn new(index: usize, code: impl Into<String>) -> Self {
        Self {
            index,
            code: code.into(),
            screenshot: None,
            compressed_screenshot: None,
            plan: None,
            created_at: Local::now(),
        }
    }
}

/// 初始生成结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedGame {
    pub thought: Option<String>,
    pub plan: Option<String>,
    pub code: String,
}

/// 改进结果：四个字段均为必需
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Improvement {
    pub thought: String,
    pub analysis: String,
    pub plan: String,
    pub code: String,
}

/// 发给 improve 的完整上下文
#[derive(Debug, Clone, Default)]
pub struct ImproveRequest {
    pub code: String,
    pub screenshots: Vec<Screenshot>,
    pub concept: String,
    pub game_type: GameType,
    /// 本步重点处理的开发者备注（FIFO 策略）
    pub focus_note: Option<String>,
    /// 其余备注：Checklist 策略下为全部备注，FIFO 下为已处理过的备注
    pub notes: Vec<String>,
    pub long_term_memory: Vec<String>,
    pub short_term_memory: Vec<String>,
}

impl ImproveRequest {
    /// 是否在上下文中出现某条备注（原文）
    pub fn mentions_note(&self, text: &str) -> bool {
        self.focus_note.as_deref() == Some(text) || self.notes.iter().any(|n| n == text)
    }
}
