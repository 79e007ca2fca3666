//! 进化编排器：主控循环
//!
//! 负责：加载配置、创建渲染器与 LLM 网关、建立 cmd/snapshot 两通道，
//! 并在后台任务中消费界面命令（Start/Stop/Resume/AddNote/SelectIteration/GenerateIdea/Quit）。
//! 运行本身在独立任务中持有 EvolutionLoop 的锁；运行期间 Stop 与 AddNote 经由 EvolutionHandle 生效。

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::{mpsc, watch, Mutex};

use crate::config::{load_config, AppConfig, RendererKind};
use crate::core::{EvolutionSnapshot, EvolveError, LogLevel};
use crate::evolution::{EvolutionConfig, EvolutionHandle, EvolutionLoop, GameDevGateway, GameType, LlmGameDevGateway};
use crate::llm::{create_llm_client, LlmSettings, MockLlmClient};
use crate::memory::{SettingsStore, StoredSettings};
use crate::preview::{FileRenderer, PreviewRenderer};

/// 从界面发往编排器的命令
#[derive(Debug, Clone)]
pub enum Command {
    /// 以给定配置开始新一轮运行
    Start(EvolutionConfig),
    /// 当前步完成后停止
    Stop,
    /// 从已有历史继续改进
    Resume,
    /// 追加开发者备注（任何时候都可以）
    AddNote(String),
    /// 导出某个历史版本供查看
    SelectIteration(usize),
    /// 随机生成一个游戏创意
    GenerateIdea { game_type: GameType, llm: LlmSettings },
    Quit,
}

/// 根据设置创建游戏开发网关
pub fn build_gateway(settings: &LlmSettings, cfg: &AppConfig) -> Result<Arc<dyn GameDevGateway>, EvolveError> {
    let client = create_llm_client(settings, cfg.llm.request_timeout_secs)?;
    Ok(Arc::new(
        LlmGameDevGateway::new(client).with_recovery(cfg.evolution.html_recovery()),
    ))
}

/// 根据配置创建预览渲染器；Chrome 不可用时退回文件预览
pub fn build_renderer(cfg: &AppConfig, workspace: &Path) -> Arc<dyn PreviewRenderer> {
    let file_renderer = || -> Arc<dyn PreviewRenderer> { Arc::new(FileRenderer::new(workspace.join("preview.html"))) };

    match cfg.screenshot.renderer {
        RendererKind::File => file_renderer(),
        #[cfg(feature = "browser")]
        RendererKind::Chrome => {
            let window = (cfg.screenshot.window_width, cfg.screenshot.window_height);
            match crate::preview::ChromeRenderer::launch(window, cfg.screenshot.capture_timeout()) {
                Ok(chrome) => Arc::new(chrome),
                Err(e) => {
                    tracing::warn!("Chrome renderer unavailable ({}), falling back to file preview", e);
                    file_renderer()
                }
            }
        }
        #[cfg(not(feature = "browser"))]
        RendererKind::Chrome => {
            tracing::warn!("Built without the \"browser\" feature, falling back to file preview");
            file_renderer()
        }
    }
}

/// 工作目录：配置 > 当前目录下的 workspace
fn prepare_workspace(cfg: &AppConfig) -> PathBuf {
    let workspace = cfg.app.workspace();
    if let Err(e) = std::fs::create_dir_all(&workspace) {
        tracing::warn!("Failed to create workspace {}: {}", workspace.display(), e);
    }
    workspace.canonicalize().unwrap_or(workspace)
}

/// 编排器启动后交给界面的初始信息
#[derive(Debug, Clone)]
pub struct EvolverInfo {
    pub config: AppConfig,
    pub workspace: PathBuf,
    pub settings: StoredSettings,
}

/// 创建进化运行时：返回命令发送端、快照接收端与初始信息；后台任务消费命令。
pub async fn create_evolver(
    config_path: Option<PathBuf>,
) -> anyhow::Result<(mpsc::UnboundedSender<Command>, watch::Receiver<EvolutionSnapshot>, EvolverInfo)> {
    let cfg = load_config(config_path).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        AppConfig::default()
    });
    let workspace = prepare_workspace(&cfg);

    // 持久化的设置优先；首次运行时用配置文件中的 [llm]
    let store = SettingsStore::new(cfg.app.settings_file());
    let settings = match store.load() {
        Ok(stored) if store.path().exists() => stored,
        Ok(_) => StoredSettings {
            llm: cfg.llm.settings(),
            model_history: Vec::new(),
        },
        Err(e) => {
            tracing::warn!("Failed to load saved settings ({}), using config", e);
            StoredSettings {
                llm: cfg.llm.settings(),
                model_history: Vec::new(),
            }
        }
    };

    let gateway = build_gateway(&settings.llm, &cfg).unwrap_or_else(|e| {
        tracing::warn!("{} - using the mock LLM until a run is started", e);
        Arc::new(LlmGameDevGateway::new(Arc::new(MockLlmClient::new())))
    });
    let renderer = build_renderer(&cfg, &workspace);

    let evolution = EvolutionLoop::new(gateway, renderer, cfg.loop_options());
    let handle = evolution.handle();
    let snapshot_rx = evolution.subscribe();
    let evolution = Arc::new(Mutex::new(evolution));

    let (cmd_tx, mut cmd_rx) = mpsc::unbounded_channel::<Command>();
    let info = EvolverInfo {
        config: cfg.clone(),
        workspace: workspace.clone(),
        settings,
    };

    tokio::spawn(async move {
        loop {
            tokio::select! {
                Some(cmd) = cmd_rx.recv() => {
                    match cmd {
                        Command::Start(config) => {
                            start_run(&evolution, &handle, &cfg, &store, config);
                        }
                        Command::Stop => handle.stop(),
                        Command::Resume => {
                            let Ok(mut guard) = evolution.clone().try_lock_owned() else {
                                handle.notice(LogLevel::Warn, "A run is already in progress.");
                                continue;
                            };
                            let token = handle.rearm_run();
                            tokio::spawn(async move {
                                if let Err(e) = guard.resume_and_run_with(token).await {
                                    tracing::warn!("Resume rejected: {}", e);
                                }
                            });
                        }
                        Command::AddNote(text) => {
                            if !handle.add_note(text).await {
                                handle.notice(LogLevel::Warn, "Empty note ignored.");
                            }
                        }
                        Command::SelectIteration(index) => {
                            let Ok(mut guard) = evolution.try_lock() else {
                                handle.notice(
                                    LogLevel::Info,
                                    format!("Iteration {} can be exported once the run ends; the Code tab shows it now.", index),
                                );
                                continue;
                            };
                            match guard.select_iteration(index).await {
                                Ok(code) => export_iteration(&handle, &workspace, index, &code).await,
                                Err(e) => handle.notice(LogLevel::Warn, e.to_string()),
                            }
                        }
                        Command::GenerateIdea { game_type, llm } => {
                            let gateway = match build_gateway(&llm, &cfg) {
                                Ok(g) => g,
                                Err(e) => {
                                    handle.notice(LogLevel::Error, e.to_string());
                                    continue;
                                }
                            };
                            let Ok(mut guard) = evolution.clone().try_lock_owned() else {
                                handle.notice(LogLevel::Warn, "Cannot generate an idea while a run is in progress.");
                                continue;
                            };
                            tokio::spawn(async move {
                                if let Err(e) = guard.set_gateway(gateway) {
                                    tracing::warn!("{}", e);
                                    return;
                                }
                                // 失败已写入状态日志
                                let _ = guard.generate_random_idea(game_type).await;
                            });
                        }
                        Command::Quit => {
                            handle.stop();
                            break;
                        }
                    }
                }
                else => break,  // cmd_tx 已关闭，退出循环
            }
        }
        tracing::info!("Orchestrator stopped");
    });

    Ok((cmd_tx, snapshot_rx, info))
}

/// 校验能否开始：锁被占用说明已有运行；否则换上新网关、保存设置、开启新一代并在独立任务中运行
fn start_run(
    evolution: &Arc<Mutex<EvolutionLoop>>,
    handle: &EvolutionHandle,
    cfg: &AppConfig,
    store: &SettingsStore,
    config: EvolutionConfig,
) {
    let Ok(mut guard) = evolution.clone().try_lock_owned() else {
        handle.notice(LogLevel::Warn, "A run is already in progress; stop it before starting a new one.");
        return;
    };

    let gateway = match build_gateway(&config.llm, cfg) {
        Ok(g) => g,
        Err(e) => {
            handle.notice(LogLevel::Error, e.to_string());
            return;
        }
    };
    if let Err(e) = store.record_run(&config.llm) {
        tracing::warn!("Failed to save settings: {}", e);
    }

    // 在派生任务之前开启新一代，紧随其后的 Stop 作用于这次运行
    let token = handle.begin_run();
    tokio::spawn(async move {
        if let Err(e) = guard.set_gateway(gateway) {
            tracing::warn!("{}", e);
            return;
        }
        match guard.run_with(config, token).await {
            Ok(status) => tracing::info!(%status, "Run ended"),
            Err(EvolveError::Validation(msg)) => {
                guard.handle().notice(LogLevel::Error, format!("Error: {}", msg));
            }
            Err(e) => tracing::warn!("Run rejected: {}", e),
        }
    });
}

/// 把选中的历史版本写到 workspace/iteration-N.html
async fn export_iteration(handle: &EvolutionHandle, workspace: &Path, index: usize, code: &str) {
    let path = workspace.join(format!("iteration-{}.html", index));
    match tokio::fs::write(&path, code).await {
        Ok(()) => handle.notice(LogLevel::Info, format!("Iteration {} written to {}", index, path.display())),
        Err(e) => handle.notice(LogLevel::Warn, format!("Failed to write {}: {}", path.display(), e)),
    }
}
