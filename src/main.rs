//! EvoForge - LLM 驱动的 HTML 游戏迭代进化器
//!
//! 入口：初始化日志、创建进化编排器与 TUI，并运行主循环。
//! 用法：`evoforge [config.toml]`

use std::path::PathBuf;

use anyhow::Context;
use evoforge::{config::load_config, core::create_evolver, observability, ui::run_app};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args().nth(1).map(PathBuf::from);

    // TUI 占用终端，日志写文件；级别可通过 RUST_LOG 覆盖
    let log_file = load_config(config_path.clone())
        .map(|cfg| cfg.app.log_file)
        .unwrap_or_else(|_| PathBuf::from("evoforge.log"));
    observability::init_file(&log_file).context("Failed to initialize logging")?;

    // 创建编排器：返回命令发送端、快照接收端与初始信息
    let (cmd_tx, snapshot_rx, info) = create_evolver(config_path)
        .await
        .context("Failed to create evolver")?;
    tracing::info!(workspace = %info.workspace.display(), "EvoForge started");

    run_app(snapshot_rx, cmd_tx, info)
        .await
        .context("App run failed")?;

    Ok(())
}
