//! 进化层：游戏代码的迭代生成
//!
//! types（领域类型）→ prompts / response（提示词与严格解析）→ gateway（LLM 能力）
//! → engine（继续判断）/ screenshot（截图时机）→ loop_（EvolutionLoop 状态机）

pub mod engine;
pub mod gateway;
pub mod loop_;
pub mod prompts;
pub mod response;
pub mod screenshot;
pub mod types;

pub use engine::{Continuation, ContinuationPolicy, LoopProgress, Termination};
pub use gateway::{CallUsage, Completed, GameDevGateway, GatewayFailure, GatewayResult, LlmGameDevGateway};
pub use loop_::{EvolutionHandle, EvolutionLoop, LoopOptions, StepOutcome, MAX_LOG_ENTRIES};
pub use response::HtmlRecovery;
pub use screenshot::{CapturedShot, ContextCapture, ScreenshotSchedule};
pub use types::{EvolutionConfig, GameType, GeneratedGame, ImproveRequest, Improvement, Iteration, TaskKind};
