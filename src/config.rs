//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `EVOFORGE__*` 覆盖（双下划线表示嵌套，如 `EVOFORGE__LLM__PROVIDER=openai`）。

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::evolution::{GameType, HtmlRecovery, LoopOptions, ScreenshotSchedule, Termination};
use crate::llm::{LlmSettings, Provider};
use crate::memory::{NotePolicy, DEFAULT_CONSOLIDATION_INTERVAL, DEFAULT_SHORT_TERM_WINDOW};

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub llm: LlmSection,
    pub evolution: EvolutionSection,
    pub screenshot: ScreenshotSection,
}

/// [app] 段：工作目录、设置文件、日志文件
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppSection {
    /// 预览与最终代码的输出目录，未设置时用 ./workspace
    pub workspace_root: Option<PathBuf>,
    /// LLM 设置持久化文件，未设置时为 <workspace>/settings.json
    pub settings_path: Option<PathBuf>,
    /// TUI 模式下 tracing 输出的日志文件
    pub log_file: PathBuf,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            workspace_root: None,
            settings_path: None,
            log_file: PathBuf::from("evoforge.log"),
        }
    }
}

impl AppSection {
    pub fn workspace(&self) -> PathBuf {
        self.workspace_root.clone().unwrap_or_else(|| PathBuf::from("workspace"))
    }

    pub fn settings_file(&self) -> PathBuf {
        self.settings_path
            .clone()
            .unwrap_or_else(|| self.workspace().join("settings.json"))
    }
}

/// [llm] 段：提供方、模型、端点与超时
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    pub provider: Provider,
    /// 为空时使用提供方默认模型
    pub model: String,
    pub base_url: Option<String>,
    /// 一般留空，从环境变量读取
    pub api_key: Option<String>,
    /// 单次请求超时（秒）
    pub request_timeout_secs: u64,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: Provider::default(),
            model: String::new(),
            base_url: None,
            api_key: None,
            request_timeout_secs: 180,
        }
    }
}

impl LlmSection {
    pub fn settings(&self) -> LlmSettings {
        let mut settings = LlmSettings::for_provider(self.provider);
        if !self.model.trim().is_empty() {
            settings.model_name = self.model.trim().to_string();
        }
        settings.base_url = self.base_url.clone().unwrap_or_default();
        settings.api_key = self.api_key.clone().unwrap_or_default();
        settings
    }
}

/// [evolution] 段：迭代次数、备注与终止策略、记忆参数
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EvolutionSection {
    /// 初始生成之后的改进步数
    pub max_iterations: usize,
    pub game_type: GameType,
    pub note_policy: NotePolicy,
    pub termination: Termination,
    pub short_term_window: usize,
    pub consolidation_interval: usize,
    pub step_delay_ms: u64,
    /// 初始生成响应不是 JSON 时是否从中提取 HTML
    pub html_fallback: bool,
}

impl Default for EvolutionSection {
    fn default() -> Self {
        Self {
            max_iterations: 5,
            game_type: GameType::Interactive,
            note_policy: NotePolicy::Checklist,
            termination: Termination::MaxIterations,
            short_term_window: DEFAULT_SHORT_TERM_WINDOW,
            consolidation_interval: DEFAULT_CONSOLIDATION_INTERVAL,
            step_delay_ms: 1000,
            html_fallback: true,
        }
    }
}

impl EvolutionSection {
    pub fn html_recovery(&self) -> HtmlRecovery {
        HtmlRecovery::from_flag(self.html_fallback)
    }
}

/// 预览渲染方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RendererKind {
    /// 写入 preview.html，无截图
    #[default]
    File,
    /// Headless Chrome（需 feature "browser"）
    Chrome,
}

/// [screenshot] 段：渲染方式、稳定等待、截图张数与间隔、压缩参数
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScreenshotSection {
    pub renderer: RendererKind,
    pub settle_delay_ms: u64,
    pub count: usize,
    pub interval_secs: u64,
    pub capture_timeout_secs: u64,
    pub compress_max_width: u32,
    pub compress_quality: u8,
    /// Chrome 渲染窗口大小
    pub window_width: u32,
    pub window_height: u32,
}

impl Default for ScreenshotSection {
    fn default() -> Self {
        Self {
            renderer: RendererKind::File,
            settle_delay_ms: 1500,
            count: 1,
            interval_secs: 1,
            capture_timeout_secs: 5,
            compress_max_width: 512,
            compress_quality: 60,
            window_width: 1024,
            window_height: 768,
        }
    }
}

impl ScreenshotSection {
    pub fn schedule(&self) -> ScreenshotSchedule {
        ScreenshotSchedule {
            settle_delay: Duration::from_millis(self.settle_delay_ms),
            count: self.count.clamp(1, 10),
            interval: Duration::from_secs(self.interval_secs.clamp(1, 10)),
            compress_max_width: self.compress_max_width.max(1),
            compress_quality: self.compress_quality.clamp(1, 100),
        }
    }

    pub fn capture_timeout(&self) -> Duration {
        Duration::from_secs(self.capture_timeout_secs.max(1))
    }
}

impl AppConfig {
    /// 组装循环参数
    pub fn loop_options(&self) -> LoopOptions {
        LoopOptions {
            note_policy: self.evolution.note_policy,
            termination: self.evolution.termination,
            short_term_window: self.evolution.short_term_window.max(1),
            consolidation_interval: self.evolution.consolidation_interval,
            step_delay: Duration::from_millis(self.evolution.step_delay_ms),
            screenshots: self.screenshot.schedule(),
        }
    }
}

/// 从 config 目录加载配置，环境变量 EVOFORGE__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 EVOFORGE__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    for name in ["config/default", "../config/default", "default"] {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("EVOFORGE")
            .separator("__")
            .try_parsing(true),
    );

    builder.build()?.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_usable() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.evolution.max_iterations, 5);
        assert_eq!(cfg.llm.request_timeout_secs, 180);
        let options = cfg.loop_options();
        assert_eq!(options.consolidation_interval, 10);
        assert_eq!(options.screenshots.count, 1);
    }

    #[test]
    fn test_explicit_file_overrides() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[llm]\nprovider = \"openai\"\nmodel = \"llama3\"\nbase_url = \"http://localhost:1234/v1\"\n\n\
             [evolution]\nnote_policy = \"fifo\"\ntermination = \"notes_exhausted\"\n\n\
             [screenshot]\ncount = 40"
        )
        .unwrap();

        let cfg = load_config(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(cfg.llm.provider, Provider::OpenAi);
        let settings = cfg.llm.settings();
        assert_eq!(settings.model_name, "llama3");
        assert_eq!(settings.base_url(), Some("http://localhost:1234/v1"));
        assert_eq!(cfg.evolution.note_policy, NotePolicy::Fifo);
        assert_eq!(cfg.evolution.termination, Termination::NotesExhausted);
        assert_eq!(cfg.screenshot.schedule().count, 10);
    }
}
