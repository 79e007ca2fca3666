//! 编排器集成测试：通过 Command 通道驱动 create_evolver，使用 Mock LLM 与文件预览

use std::path::Path;
use std::time::Duration;

use tokio::sync::{mpsc, watch};

use evoforge::core::{create_evolver, Command, EvolutionSnapshot, LogLevel, RunStatus};
use evoforge::evolution::{EvolutionConfig, GameType};
use evoforge::llm::{LlmSettings, Provider};

fn write_config(dir: &Path, step_delay_ms: u64) -> std::path::PathBuf {
    let path = dir.join("evoforge.toml");
    let body = format!(
        r#"
[app]
workspace_root = '{ws}'
settings_path = '{settings}'
log_file = '{log}'

[llm]
provider = "mock"

[evolution]
step_delay_ms = {step_delay_ms}

[screenshot]
renderer = "file"
settle_delay_ms = 0
"#,
        ws = dir.join("workspace").display(),
        settings = dir.join("settings.json").display(),
        log = dir.join("evoforge.log").display(),
        step_delay_ms = step_delay_ms,
    );
    std::fs::write(&path, body).unwrap();
    path
}

async fn evolver(
    dir: &Path,
    step_delay_ms: u64,
) -> (mpsc::UnboundedSender<Command>, watch::Receiver<EvolutionSnapshot>, std::path::PathBuf) {
    let (tx, rx, info) = create_evolver(Some(write_config(dir, step_delay_ms))).await.unwrap();
    (tx, rx, info.workspace)
}

fn cat(max: usize) -> EvolutionConfig {
    EvolutionConfig::new("A cat jumps over dogs", GameType::Interactive, max)
        .with_llm(LlmSettings::for_provider(Provider::Mock))
}

async fn wait_until(
    rx: &mut watch::Receiver<EvolutionSnapshot>,
    condition: impl FnMut(&EvolutionSnapshot) -> bool,
) -> EvolutionSnapshot {
    tokio::time::timeout(Duration::from_secs(10), rx.wait_for(condition))
        .await
        .expect("timed out waiting for snapshot")
        .expect("orchestrator dropped the snapshot channel")
        .clone()
}

/// 运行结束的快照先于锁释放发布；锁仍被占用时命令会被拒绝，稍后重发
async fn send_until(
    tx: &mpsc::UnboundedSender<Command>,
    rx: &mut watch::Receiver<EvolutionSnapshot>,
    command: impl Fn() -> Command,
    mut condition: impl FnMut(&EvolutionSnapshot) -> bool,
) -> EvolutionSnapshot {
    for _ in 0..50 {
        tx.send(command()).unwrap();
        if let Ok(Ok(snapshot)) =
            tokio::time::timeout(Duration::from_millis(200), rx.wait_for(|s| condition(s))).await
        {
            return snapshot.clone();
        }
    }
    panic!("command was never accepted");
}

fn has_log(snapshot: &EvolutionSnapshot, level: LogLevel, needle: &str) -> bool {
    snapshot.log.iter().any(|e| e.level == level && e.message.contains(needle))
}

#[tokio::test]
async fn test_stop_right_after_start_stops_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let (tx, mut rx, _) = evolver(dir.path(), 0).await;

    tx.send(Command::Start(cat(3))).unwrap();
    tx.send(Command::Stop).unwrap();

    let snapshot = wait_until(&mut rx, |s| s.status.is_terminal()).await;
    assert_eq!(snapshot.status, RunStatus::Stopped);
    assert!(snapshot.iterations.len() <= 1);
    assert!(snapshot.usage.len() <= 1);
}

#[tokio::test]
async fn test_run_resume_and_export() {
    let dir = tempfile::tempdir().unwrap();
    let (tx, mut rx, workspace) = evolver(dir.path(), 0).await;

    tx.send(Command::Start(cat(2))).unwrap();
    let finished = wait_until(&mut rx, |s| s.status == RunStatus::Finished).await;
    assert_eq!(finished.iterations.len(), 3);

    send_until(&tx, &mut rx, || Command::Resume, |s| s.iterations.len() > 3).await;
    let resumed = wait_until(&mut rx, |s| s.status == RunStatus::Finished && s.iterations.len() == 5).await;
    assert_eq!(resumed.usage.len(), 5);

    let exported = send_until(
        &tx,
        &mut rx,
        || Command::SelectIteration(2),
        |s| has_log(s, LogLevel::Info, "Iteration 2 written"),
    )
    .await;
    assert_eq!(exported.selected, Some(2));
    let written = std::fs::read_to_string(workspace.join("iteration-2.html")).unwrap();
    assert_eq!(Some(written.as_str()), exported.code_at(2));

    // 设置在开始运行时保存
    assert!(dir.path().join("settings.json").exists());
}

#[tokio::test]
async fn test_commands_during_a_run_are_rejected_with_a_notice() {
    let dir = tempfile::tempdir().unwrap();
    // 步间等待足够长，第一步之后运行停在等待中并持有锁
    let (tx, mut rx, workspace) = evolver(dir.path(), 60_000).await;

    tx.send(Command::Start(cat(3))).unwrap();
    wait_until(&mut rx, |s| s.iterations.len() == 1 && s.status == RunStatus::Improving).await;

    tx.send(Command::Start(cat(3))).unwrap();
    wait_until(&mut rx, |s| has_log(s, LogLevel::Warn, "already in progress")).await;

    tx.send(Command::SelectIteration(1)).unwrap();
    wait_until(&mut rx, |s| has_log(s, LogLevel::Info, "once the run ends")).await;
    assert!(!workspace.join("iteration-1.html").exists());

    tx.send(Command::AddNote("make the cat orange".into())).unwrap();
    wait_until(&mut rx, |s| s.notes.iter().any(|n| n.text == "make the cat orange")).await;

    tx.send(Command::Stop).unwrap();
    let stopped = wait_until(&mut rx, |s| s.status.is_terminal()).await;
    assert_eq!(stopped.status, RunStatus::Stopped);
    assert_eq!(stopped.iterations.len(), 1);
}

#[tokio::test]
async fn test_blank_concept_is_reported_without_running() {
    let dir = tempfile::tempdir().unwrap();
    let (tx, mut rx, _) = evolver(dir.path(), 0).await;

    let config = EvolutionConfig::new("  ", GameType::Interactive, 3).with_llm(LlmSettings::for_provider(Provider::Mock));
    tx.send(Command::Start(config)).unwrap();

    let snapshot = wait_until(&mut rx, |s| has_log(s, LogLevel::Error, "game concept")).await;
    assert_eq!(snapshot.status, RunStatus::Idle);
    assert!(snapshot.iterations.is_empty());
}
