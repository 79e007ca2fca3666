//! 进化运行的记忆与簿记
//!
//! - **notes**: 开发者备注队列（运行中可追加）
//! - **plan_memory**: 短期计划窗口与长期摘要
//! - **usage**: 每次 LLM 调用的字符统计
//! - **timing**: 运行秒表与每步耗时
//! - **settings_store**: LLM 设置与模型历史的 JSON 持久化

pub mod notes;
pub mod plan_memory;
pub mod settings_store;
pub mod timing;
pub mod usage;

pub use notes::{DeveloperNote, NotePolicy, NoteQueue, NoteSelection};
pub use plan_memory::{PlanMemory, DEFAULT_CONSOLIDATION_INTERVAL, DEFAULT_SHORT_TERM_WINDOW};
pub use settings_store::{SettingsStore, StoredSettings, MODEL_HISTORY_LIMIT};
pub use timing::{RunTimer, Stopwatch, TimingStats};
pub use usage::{UsageLog, UsageStat};
