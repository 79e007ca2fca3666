//! EvoForge - LLM 驱动的 HTML 游戏迭代进化器
//!
//! 模块划分：
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误类型、运行状态投影、运行监管、编排器
//! - **evolution**: 提示词、响应解析、LLM 网关、继续策略、截图调度与进化主循环
//! - **llm**: LLM 客户端抽象与实现（Gemini / OpenAI 兼容 / Mock）
//! - **memory**: 开发者备注、计划记忆、用量与计时统计、设置持久化
//! - **observability**: tracing 日志初始化
//! - **preview**: 预览渲染与截图（文件预览 / headless Chrome）
//! - **ui**: Ratatui TUI 界面

pub mod config;
pub mod core;
pub mod evolution;
pub mod llm;
pub mod memory;
pub mod observability;
pub mod preview;
pub mod ui;

pub use core::{EvolutionSnapshot, EvolveError, RunStatus};
pub use evolution::{EvolutionConfig, EvolutionLoop, GameType};
