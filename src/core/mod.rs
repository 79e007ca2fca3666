//! 核心编排层：错误类型、状态投影、运行监管、主控循环

pub mod error;
pub mod orchestrator;
pub mod state;
pub mod supervisor;

pub use error::EvolveError;
pub use orchestrator::{build_gateway, build_renderer, create_evolver, Command, EvolverInfo};
pub use state::{EvolutionSnapshot, IterationView, LogEntry, LogLevel, RunStatus};
pub use supervisor::{RunSupervisor, RunToken};
