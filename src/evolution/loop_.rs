//! 进化循环：初始生成 →（截图 → 改进）* 的状态机
//!
//! - 任何时刻只有一个 LLM 调用或截图在进行；历史、记忆、统计只由本循环写入
//! - 界面通过 watch 通道读取 EvolutionSnapshot，通过 EvolutionHandle 停止运行或追加备注
//! - 停止是协作式的：在发起下一次 LLM 调用前检查，不中断进行中的调用
//! - Provider / Parse 错误终止本次运行（状态 Error），截图失败只记警告

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use crate::core::{
    EvolutionSnapshot, EvolveError, IterationView, LogEntry, LogLevel, RunStatus, RunSupervisor, RunToken,
};
use crate::evolution::engine::{Continuation, ContinuationPolicy, LoopProgress, Termination};
use crate::evolution::gateway::{CallUsage, GameDevGateway};
use crate::evolution::screenshot::{wait_or_stop, ScreenshotSchedule};
use crate::evolution::types::{EvolutionConfig, GameType, ImproveRequest, Iteration, TaskKind};
use crate::memory::{
    NotePolicy, NoteQueue, PlanMemory, RunTimer, TimingStats, UsageLog, UsageStat,
    DEFAULT_CONSOLIDATION_INTERVAL, DEFAULT_SHORT_TERM_WINDOW,
};
use crate::preview::PreviewRenderer;

/// 状态日志保留的最大条数
pub const MAX_LOG_ENTRIES: usize = 500;

/// 循环行为参数（来自配置的 [evolution] / [screenshot]）
#[derive(Debug, Clone)]
pub struct LoopOptions {
    pub note_policy: NotePolicy,
    pub termination: Termination,
    pub short_term_window: usize,
    /// 每完成多少次改进合并一次长期记忆；0 表示不合并
    pub consolidation_interval: usize,
    /// 两个改进步之间的间隔
    pub step_delay: Duration,
    pub screenshots: ScreenshotSchedule,
}

impl Default for LoopOptions {
    fn default() -> Self {
        Self {
            note_policy: NotePolicy::default(),
            termination: Termination::default(),
            short_term_window: DEFAULT_SHORT_TERM_WINDOW,
            consolidation_interval: DEFAULT_CONSOLIDATION_INTERVAL,
            step_delay: Duration::from_millis(1000),
            screenshots: ScreenshotSchedule::default(),
        }
    }
}

/// 单步结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Continue,
    Halted(RunStatus),
}

/// 运行中也可使用的句柄：停止、追加备注、订阅快照
#[derive(Clone)]
pub struct EvolutionHandle {
    supervisor: RunSupervisor,
    notes: NoteQueue,
    snapshot: Arc<watch::Sender<EvolutionSnapshot>>,
}

impl EvolutionHandle {
    /// 同步开启新一代运行；之后的 stop 作用于这一代（交给 start_with）
    pub fn begin_run(&self) -> RunToken {
        self.supervisor.begin()
    }

    /// 同步为 resume 换上新令牌（交给 resume_with）
    pub fn rearm_run(&self) -> RunToken {
        self.supervisor.rearm()
    }

    /// 请求在当前步完成后停止
    pub fn stop(&self) {
        tracing::info!("Stop requested, finishing the current step");
        self.supervisor.request_stop();
    }

    /// 追加一条开发者备注，下一个改进步可见
    pub async fn add_note(&self, text: impl Into<String>) -> bool {
        let added = self.notes.push(text).await;
        if added {
            let notes = self.notes.snapshot().await;
            tracing::info!(count = notes.len(), "Developer note added");
            self.snapshot.send_modify(|s| s.notes = notes);
        }
        added
    }

    /// 在快照日志中追加一条提示（不进入运行日志，下次发布时被覆盖）
    pub fn notice(&self, level: LogLevel, message: impl Into<String>) {
        let entry = LogEntry::new(level, message);
        match level {
            LogLevel::Info => tracing::info!("{}", entry.message),
            LogLevel::Warn => tracing::warn!("{}", entry.message),
            LogLevel::Error => tracing::error!("{}", entry.message),
        }
        self.snapshot.send_modify(|s| s.log.push(entry));
    }

    pub fn subscribe(&self) -> watch::Receiver<EvolutionSnapshot> {
        self.snapshot.subscribe()
    }

    pub fn snapshot(&self) -> EvolutionSnapshot {
        self.snapshot.borrow().clone()
    }
}

pub struct EvolutionLoop {
    gateway: Arc<dyn GameDevGateway>,
    renderer: Arc<dyn PreviewRenderer>,
    options: LoopOptions,
    supervisor: RunSupervisor,
    notes: NoteQueue,
    snapshot: Arc<watch::Sender<EvolutionSnapshot>>,

    config: Option<EvolutionConfig>,
    token: Option<RunToken>,
    policy: ContinuationPolicy,
    status: RunStatus,
    history: Vec<Iteration>,
    memory: PlanMemory,
    usage: UsageLog,
    timer: RunTimer,
    log: Vec<LogEntry>,
    selected: Option<usize>,
    last_error: Option<String>,
    last_idea: Option<String>,
}

impl EvolutionLoop {
    pub fn new(gateway: Arc<dyn GameDevGateway>, renderer: Arc<dyn PreviewRenderer>, options: LoopOptions) -> Self {
        let (tx, _rx) = watch::channel(EvolutionSnapshot::default());
        let memory = PlanMemory::new(options.short_term_window, options.consolidation_interval);
        let policy = ContinuationPolicy::new(0, options.termination);
        Self {
            gateway,
            renderer,
            options,
            supervisor: RunSupervisor::new(),
            notes: NoteQueue::new(),
            snapshot: Arc::new(tx),
            config: None,
            token: None,
            policy,
            status: RunStatus::Idle,
            history: Vec::new(),
            memory,
            usage: UsageLog::new(),
            timer: RunTimer::new(),
            log: Vec::new(),
            selected: None,
            last_error: None,
            last_idea: None,
        }
    }

    pub fn handle(&self) -> EvolutionHandle {
        EvolutionHandle {
            supervisor: self.supervisor.clone(),
            notes: self.notes.clone(),
            snapshot: self.snapshot.clone(),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<EvolutionSnapshot> {
        self.snapshot.subscribe()
    }

    pub fn status(&self) -> RunStatus {
        self.status
    }

    pub fn config(&self) -> Option<&EvolutionConfig> {
        self.config.as_ref()
    }

    pub fn history(&self) -> &[Iteration] {
        &self.history
    }

    /// 纯读取：按序号（从 1 开始）取版本
    pub fn iteration(&self, index: usize) -> Option<&Iteration> {
        index.checked_sub(1).and_then(|i| self.history.get(i))
    }

    pub fn usage(&self) -> &UsageLog {
        &self.usage
    }

    pub fn memory(&self) -> &PlanMemory {
        &self.memory
    }

    pub fn timing(&self) -> TimingStats {
        self.timer.stats()
    }

    pub fn status_log(&self) -> &[LogEntry] {
        &self.log
    }

    pub fn notes(&self) -> &NoteQueue {
        &self.notes
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// 更换网关（切换提供方 / 模型）；运行中不允许
    pub fn set_gateway(&mut self, gateway: Arc<dyn GameDevGateway>) -> Result<(), EvolveError> {
        if self.status.is_active() {
            return Err(EvolveError::InvalidState(
                "cannot change the LLM gateway while a run is in progress".to_string(),
            ));
        }
        self.gateway = gateway;
        Ok(())
    }

    fn validate_start(&self, config: &EvolutionConfig) -> Result<(), EvolveError> {
        if config.game_concept.trim().is_empty() {
            return Err(EvolveError::Validation("Please enter a game concept.".to_string()));
        }
        if config.max_iterations == 0 {
            return Err(EvolveError::Validation("max_iterations must be at least 1".to_string()));
        }
        if self.status.is_active() {
            return Err(EvolveError::InvalidState("a run is already in progress".to_string()));
        }
        Ok(())
    }

    /// 开始新一轮运行：校验、重置运行数据、生成初始版本
    pub async fn start(&mut self, config: EvolutionConfig) -> Result<StepOutcome, EvolveError> {
        self.validate_start(&config)?;
        let token = self.supervisor.begin();
        self.start_with(config, token).await
    }

    /// 用调用方预先开启的令牌开始运行（EvolutionHandle::begin_run），令牌开启后的停止请求不会丢失
    pub async fn start_with(&mut self, config: EvolutionConfig, token: RunToken) -> Result<StepOutcome, EvolveError> {
        self.validate_start(&config)?;
        if !token.is_current() {
            return Err(EvolveError::InvalidState("run token is stale".to_string()));
        }

        self.token = Some(token.clone());
        self.history.clear();
        self.memory = PlanMemory::new(self.options.short_term_window, self.options.consolidation_interval);
        self.usage.clear();
        self.timer.reset();
        self.log.clear();
        self.selected = None;
        self.last_error = None;
        self.notes.reset_consumed().await;
        self.policy = ContinuationPolicy::new(config.max_iterations, self.options.termination);

        let concept = config.game_concept.trim().to_string();
        let game_type = config.game_type;
        self.config = Some(config);

        self.status = RunStatus::Generating;
        self.timer.resume();
        self.log(LogLevel::Info, "Starting evolution...");
        self.log(LogLevel::Info, format!("Generating initial code for: \"{}\"", concept));
        if self.options.termination == Termination::NotesExhausted && self.notes.pending().await == 0 {
            self.log(
                LogLevel::Warn,
                "No developer notes added. Add a note to guide the first improvement.",
            );
        }
        self.publish().await;

        if token.is_stop_requested() {
            return Ok(self.halt(RunStatus::Stopped).await);
        }
        self.timer.begin_step();
        let result = self.gateway.generate_initial(&concept, game_type).await;
        if !token.is_current() {
            tracing::warn!(generation = token.generation(), "Discarding stale generation result");
            return Ok(StepOutcome::Halted(self.status));
        }

        match result {
            Err(failure) => {
                self.record_usage(1, TaskKind::Generation, failure.usage);
                self.timer.end_step();
                Ok(self.fail("Failed to generate initial code", failure.error).await)
            }
            Ok(done) => {
                self.record_usage(1, TaskKind::Generation, Some(done.usage));
                let game = done.value;
                if let Some(thought) = game.thought.as_deref().filter(|t| !t.trim().is_empty()) {
                    self.log(LogLevel::Info, format!("[Thought] {}", thought));
                }
                if let Some(plan) = game.plan.as_deref().filter(|p| !p.trim().is_empty()) {
                    self.log(LogLevel::Info, format!("[Plan]\n{}", plan));
                }
                self.log(LogLevel::Info, "Initial code generated successfully.");

                let mut iteration = Iteration::new(1, game.code);
                iteration.plan = game.plan;
                self.history.push(iteration);
                self.status = RunStatus::Improving;
                self.capture_latest().await;
                self.timer.end_step();

                if token.is_stop_requested() {
                    return Ok(self.halt(RunStatus::Stopped).await);
                }
                self.publish().await;
                Ok(StepOutcome::Continue)
            }
        }
    }

    /// 一个改进步：合并记忆 → 截图 → 选备注 → 改进 → 记录
    pub async fn improvement_step(&mut self) -> Result<StepOutcome, EvolveError> {
        if self.status != RunStatus::Improving {
            return Err(EvolveError::InvalidState(format!(
                "cannot run an improvement step while {}",
                self.status
            )));
        }
        let (token, concept, game_type) = match (&self.token, &self.config) {
            (Some(token), Some(config)) => (token.clone(), config.game_concept.clone(), config.game_type),
            _ => return Err(EvolveError::InvalidState("no active run".to_string())),
        };

        if let Continuation::Halt(status) = self.continuation(&token).await {
            return Ok(self.halt(status).await);
        }

        let next_index = self.history.len() + 1;
        self.timer.begin_step();

        if let Some(plans) = self.memory.pending_consolidation() {
            self.log(
                LogLevel::Info,
                format!("Consolidating the last {} plans into long-term memory...", plans.len()),
            );
            self.publish().await;
            let result = self.gateway.summarize(&plans).await;
            if !token.is_current() {
                return Ok(StepOutcome::Halted(self.status));
            }
            match result {
                Ok(done) => {
                    self.record_usage(self.history.len(), TaskKind::Summarize, Some(done.usage));
                    self.memory.push_summary(done.value);
                    self.log(LogLevel::Info, "Long-term memory updated.");
                }
                Err(failure) => {
                    self.record_usage(self.history.len(), TaskKind::Summarize, failure.usage);
                    self.timer.end_step();
                    return Ok(self.fail("Memory consolidation failed", failure.error).await);
                }
            }
            if token.is_stop_requested() {
                return Ok(self.halt(RunStatus::Stopped).await);
            }
        }

        let capture = self
            .options
            .screenshots
            .capture_context(self.renderer.as_ref(), &token)
            .await;
        if let Some(last) = capture.failures.last() {
            let message = if capture.shots.is_empty() {
                format!("Screenshot unavailable, continuing with code only: {}", last)
            } else {
                format!(
                    "{} of {} screenshot captures failed: {}",
                    capture.failures.len(),
                    capture.failures.len() + capture.shots.len(),
                    last
                )
            };
            self.log(LogLevel::Warn, message);
        }
        // 稳定后的首张截图替换上一版本在渲染后立即截的那张
        if let (Some(shot), Some(previous)) = (capture.shots.first(), self.history.last_mut()) {
            previous.screenshot = Some(shot.original.clone());
            previous.compressed_screenshot = Some(shot.compressed.clone());
        }
        if capture.interrupted || token.is_stop_requested() {
            return Ok(self.halt(RunStatus::Stopped).await);
        }

        let selection = self.notes.select(self.options.note_policy).await;
        let current_code = self
            .history
            .last()
            .map(|it| it.code.clone())
            .ok_or_else(|| EvolveError::InvalidState("no iteration to improve".to_string()))?;
        let request = ImproveRequest {
            code: current_code,
            screenshots: capture.shots.into_iter().map(|shot| shot.compressed).collect(),
            concept,
            game_type,
            focus_note: selection.focus.as_ref().map(|(_, text)| text.clone()),
            notes: selection.context,
            long_term_memory: self.memory.long_term().to_vec(),
            short_term_memory: self.memory.short_term().to_vec(),
        };
        match &request.focus_note {
            Some(note) => self.log(
                LogLevel::Info,
                format!("Starting iteration {} with note: \"{}\"", next_index, note),
            ),
            None => self.log(
                LogLevel::Info,
                format!(
                    "Starting iteration {} ({} developer note(s) in checklist)",
                    next_index,
                    request.notes.len()
                ),
            ),
        }
        self.publish().await;

        let result = self.gateway.improve(&request).await;
        if !token.is_current() {
            tracing::warn!(generation = token.generation(), "Discarding stale improvement result");
            return Ok(StepOutcome::Halted(self.status));
        }

        match result {
            Err(failure) => {
                self.record_usage(next_index, TaskKind::Improvement, failure.usage);
                self.timer.end_step();
                return Ok(self.fail("Error during improvement cycle", failure.error).await);
            }
            Ok(done) => {
                self.record_usage(next_index, TaskKind::Improvement, Some(done.usage));
                let improvement = done.value;
                self.log(LogLevel::Info, format!("[Analysis] {}", improvement.analysis));
                self.log(LogLevel::Info, format!("[Thought] {}", improvement.thought));
                self.log(LogLevel::Info, format!("[Plan]\n{}", improvement.plan));

                let mut iteration = Iteration::new(next_index, improvement.code);
                iteration.plan = Some(improvement.plan.clone());
                self.history.push(iteration);
                self.selected = None;
                self.memory.push_plan(improvement.plan);
                if let Some((position, _)) = selection.focus {
                    self.notes.mark_consumed(position).await;
                }
                self.capture_latest().await;
                if let Some(elapsed) = self.timer.end_step() {
                    self.log(
                        LogLevel::Info,
                        format!("Iteration {} completed in {:.1}s", next_index, elapsed.as_secs_f64()),
                    );
                }
            }
        }

        match self.continuation(&token).await {
            Continuation::Halt(status) => Ok(self.halt(status).await),
            Continuation::Continue => {
                self.publish().await;
                Ok(StepOutcome::Continue)
            }
        }
    }

    /// start + 反复改进，直到进入终止状态
    pub async fn run(&mut self, config: EvolutionConfig) -> Result<RunStatus, EvolveError> {
        let outcome = self.start(config).await?;
        self.drive(outcome).await
    }

    pub async fn run_with(&mut self, config: EvolutionConfig, token: RunToken) -> Result<RunStatus, EvolveError> {
        let outcome = self.start_with(config, token).await?;
        self.drive(outcome).await
    }

    /// 从已有历史继续改进（再给一批 max_iterations 次）
    pub async fn resume(&mut self) -> Result<StepOutcome, EvolveError> {
        let token = self.supervisor.rearm();
        self.resume_with(token).await
    }

    /// 用调用方预先换上的令牌继续（EvolutionHandle::rearm_run）
    pub async fn resume_with(&mut self, token: RunToken) -> Result<StepOutcome, EvolveError> {
        if self.status.is_active() {
            return Err(EvolveError::InvalidState("a run is already in progress".to_string()));
        }
        let batch = match &self.config {
            Some(config) if !self.history.is_empty() => config.max_iterations,
            _ => {
                return Err(EvolveError::InvalidState(
                    "nothing to resume, start a run first".to_string(),
                ))
            }
        };

        self.token = Some(token);
        self.policy.extend(self.history.len() - 1, batch);
        self.last_error = None;
        self.status = RunStatus::Improving;
        self.timer.resume();
        self.log(
            LogLevel::Info,
            format!("Resuming evolution from iteration {}", self.history.len()),
        );
        self.publish().await;
        Ok(StepOutcome::Continue)
    }

    pub async fn resume_and_run(&mut self) -> Result<RunStatus, EvolveError> {
        let outcome = self.resume().await?;
        self.drive(outcome).await
    }

    pub async fn resume_and_run_with(&mut self, token: RunToken) -> Result<RunStatus, EvolveError> {
        let outcome = self.resume_with(token).await?;
        self.drive(outcome).await
    }

    /// 反复执行改进步，步间等待 step_delay（可被停止请求打断）
    pub async fn drive(&mut self, mut outcome: StepOutcome) -> Result<RunStatus, EvolveError> {
        loop {
            match outcome {
                StepOutcome::Halted(status) => return Ok(status),
                StepOutcome::Continue => {
                    if let Some(token) = self.token.clone() {
                        wait_or_stop(self.options.step_delay, &token).await;
                    }
                    outcome = self.improvement_step().await?;
                }
            }
        }
    }

    /// 没有步骤在进行时直接停止；运行中请使用 EvolutionHandle::stop
    pub async fn stop(&mut self) {
        self.supervisor.request_stop();
        if self.status.is_active() {
            self.log(LogLevel::Info, "Stopping evolution after the current step...");
            self.halt(RunStatus::Stopped).await;
        }
    }

    pub async fn add_note(&mut self, text: impl Into<String>) -> bool {
        let text = text.into();
        let added = self.notes.push(text.clone()).await;
        if added {
            self.log(LogLevel::Info, format!("Developer note added: \"{}\"", text.trim()));
            self.publish().await;
        }
        added
    }

    /// 在预览中查看某个历史版本；不影响循环状态，重复选择结果相同
    pub async fn select_iteration(&mut self, index: usize) -> Result<String, EvolveError> {
        let code = self
            .iteration(index)
            .map(|it| it.code.clone())
            .ok_or_else(|| EvolveError::Validation(format!("iteration {} does not exist", index)))?;
        self.selected = Some(index);
        self.publish().await;
        Ok(code)
    }

    /// 随机生成一个游戏创意；失败不影响运行状态
    pub async fn generate_random_idea(&mut self, game_type: GameType) -> Result<String, EvolveError> {
        self.log(LogLevel::Info, format!("Generating a random {} idea...", game_type));
        self.publish().await;

        let result = self.gateway.random_idea(game_type).await;
        let iteration = self.history.len();
        match result {
            Ok(done) => {
                self.record_usage(iteration, TaskKind::Idea, Some(done.usage));
                self.log(LogLevel::Info, format!("New idea: {}", done.value));
                self.last_idea = Some(done.value.clone());
                self.publish().await;
                Ok(done.value)
            }
            Err(failure) => {
                self.record_usage(iteration, TaskKind::Idea, failure.usage);
                self.log(LogLevel::Error, format!("Failed to generate idea: {}", failure.error));
                self.publish().await;
                Err(failure.error)
            }
        }
    }

    async fn continuation(&self, token: &RunToken) -> Continuation {
        self.policy.check(LoopProgress {
            stop_requested: token.is_stop_requested(),
            improvements_done: self.history.len().saturating_sub(1),
            pending_notes: self.notes.pending().await,
        })
    }

    /// 渲染最新版本，等待稳定后尽力截图，附加到该版本上
    async fn capture_latest(&mut self) {
        let Some(latest) = self.history.last() else {
            return;
        };
        let index = latest.index;
        let code = latest.code.clone();

        if let Err(e) = self.renderer.render(&code).await {
            self.log(LogLevel::Warn, format!("Preview render failed: {}", e));
            return;
        }
        // 等画面稳定；停止请求只缩短等待，仍然截图
        if let Some(token) = &self.token {
            wait_or_stop(self.options.screenshots.settle_delay, token).await;
        }
        match self.options.screenshots.capture_one(self.renderer.as_ref()).await {
            Ok(shot) => {
                if let Some(it) = self.history.last_mut() {
                    it.screenshot = Some(shot.original);
                    it.compressed_screenshot = Some(shot.compressed);
                }
            }
            Err(e) => self.log(
                LogLevel::Warn,
                format!("Screenshot for iteration {} unavailable: {}", index, e),
            ),
        }
    }

    fn record_usage(&mut self, iteration: usize, task: TaskKind, usage: Option<CallUsage>) {
        if let Some(usage) = usage {
            self.usage.record(UsageStat {
                iteration,
                task,
                provider: self.gateway.provider(),
                model: self.gateway.model(),
                input_chars: usage.input_chars,
                output_chars: usage.output_chars,
            });
        }
    }

    async fn halt(&mut self, status: RunStatus) -> StepOutcome {
        self.status = status;
        self.timer.pause();
        match status {
            RunStatus::Stopped => self.log(LogLevel::Info, "Evolution stopped by user."),
            RunStatus::Finished => self.log(
                LogLevel::Info,
                format!("Evolution finished after {} iteration(s).", self.history.len()),
            ),
            _ => {}
        }
        self.publish().await;
        StepOutcome::Halted(status)
    }

    /// 致命错误：原样记录消息并进入 Error
    async fn fail(&mut self, context: &str, error: EvolveError) -> StepOutcome {
        self.last_error = Some(error.to_string());
        self.log(LogLevel::Error, format!("{}: {}", context, error));
        self.halt(RunStatus::Error).await
    }

    fn log(&mut self, level: LogLevel, message: impl Into<String>) {
        let message = message.into();
        match level {
            LogLevel::Info => tracing::info!("{}", message),
            LogLevel::Warn => tracing::warn!("{}", message),
            LogLevel::Error => tracing::error!("{}", message),
        }
        self.log.push(LogEntry::new(level, message));
        if self.log.len() > MAX_LOG_ENTRIES {
            let excess = self.log.len() - MAX_LOG_ENTRIES;
            self.log.drain(..excess);
        }
    }

    async fn publish(&self) {
        let notes = self.notes.snapshot().await;
        let (concept, game_type, max_iterations) = match &self.config {
            Some(c) => (c.game_concept.clone(), c.game_type, c.max_iterations),
            None => (String::new(), GameType::default(), 0),
        };
        self.snapshot.send_replace(EvolutionSnapshot {
            status: self.status,
            concept,
            game_type,
            max_iterations,
            iterations: self.history.iter().map(IterationView::from).collect(),
            selected: self.selected,
            notes,
            short_term_memory: self.memory.short_term().to_vec(),
            long_term_memory: self.memory.long_term().to_vec(),
            usage: self.usage.entries().to_vec(),
            timing: self.timer.stats(),
            log: self.log.clone(),
            last_error: self.last_error.clone(),
            last_idea: self.last_idea.clone(),
        });
    }
}
