//! EvoForge 无界面运行器：一次性跑完一个概念的进化，输出最终版本与用量统计
//!
//! 用法：
//! `evoforge-run "A cat jumps over dogs" [--simulation] [--max N] [--note TEXT]... [--provider NAME] [--model NAME] [--config PATH]`
//!
//! Ctrl+C 在当前步完成后停止。

use std::path::PathBuf;

use anyhow::{bail, Context};
use evoforge::{
    config::load_config,
    core::{build_gateway, build_renderer},
    evolution::{EvolutionConfig, EvolutionLoop, GameType},
    llm::Provider,
    observability,
};

struct Args {
    concept: String,
    game_type: GameType,
    max_iterations: Option<usize>,
    notes: Vec<String>,
    provider: Option<Provider>,
    model: Option<String>,
    config: Option<PathBuf>,
}

fn parse_args() -> anyhow::Result<Args> {
    let mut args = std::env::args().skip(1);
    let mut concept = Vec::new();
    let mut parsed = Args {
        concept: String::new(),
        game_type: GameType::Interactive,
        max_iterations: None,
        notes: Vec::new(),
        provider: None,
        model: None,
        config: None,
    };

    while let Some(arg) = args.next() {
        let mut value = |name: &str| args.next().with_context(|| format!("{} needs a value", name));
        match arg.as_str() {
            "--simulation" => parsed.game_type = GameType::Simulation,
            "--max" => {
                parsed.max_iterations = Some(value("--max")?.parse().context("--max must be a number")?)
            }
            "--note" => parsed.notes.push(value("--note")?),
            "--provider" => {
                parsed.provider = Some(value("--provider")?.parse::<Provider>().map_err(anyhow::Error::msg)?)
            }
            "--model" => parsed.model = Some(value("--model")?),
            "--config" => parsed.config = Some(PathBuf::from(value("--config")?)),
            flag if flag.starts_with("--") => bail!("unknown option {}", flag),
            word => concept.push(word.to_string()),
        }
    }
    parsed.concept = concept.join(" ");
    if parsed.concept.trim().is_empty() {
        bail!("usage: evoforge-run <concept> [--simulation] [--max N] [--note TEXT] [--provider NAME] [--model NAME] [--config PATH]");
    }
    Ok(parsed)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();
    let args = parse_args()?;

    let cfg = load_config(args.config.clone()).context("Failed to load config")?;
    let workspace = cfg.app.workspace();
    std::fs::create_dir_all(&workspace)
        .with_context(|| format!("Failed to create workspace {}", workspace.display()))?;

    let mut llm = cfg.llm.settings();
    if let Some(provider) = args.provider {
        llm.switch_provider(provider);
    }
    if let Some(model) = args.model {
        llm.model_name = model;
    }

    let gateway = build_gateway(&llm, &cfg).context("Failed to create LLM client")?;
    let renderer = build_renderer(&cfg, &workspace);
    let mut evolution = EvolutionLoop::new(gateway, renderer, cfg.loop_options());
    let handle = evolution.handle();

    for note in &args.notes {
        handle.add_note(note.clone()).await;
    }

    let stopper = handle.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            stopper.stop();
        }
    });

    let max_iterations = args.max_iterations.unwrap_or(cfg.evolution.max_iterations);
    let config = EvolutionConfig::new(args.concept, args.game_type, max_iterations).with_llm(llm);
    let status = evolution.run(config).await.context("Run rejected")?;

    println!("Run ended: {} after {} iteration(s)", status, evolution.history().len());
    if let Some(last) = evolution.history().last() {
        let path = workspace.join("final.html");
        tokio::fs::write(&path, &last.code)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("Final version (iteration {}) written to {}", last.index, path.display());
    }
    if let Some(err) = evolution.last_error() {
        println!("Last error: {}", err);
    }

    println!("\n{:<6} {:<12} {:<28} {:>10} {:>10}", "iter", "task", "model", "in", "out");
    for stat in evolution.usage().entries() {
        println!(
            "{:<6} {:<12} {:<28} {:>10} {:>10}",
            stat.iteration,
            stat.task.to_string(),
            format!("{}/{}", stat.provider, stat.model),
            stat.input_chars,
            stat.output_chars
        );
    }
    let (input, output) = evolution.usage().totals();
    let timing = evolution.timing();
    println!("Total chars: in {} / out {}", input, output);
    println!("Total time: {:.1}s", timing.total_elapsed_ms as f64 / 1000.0);
    if let Some(avg) = timing.average_ms() {
        println!("Average per iteration: {:.1}s", avg as f64 / 1000.0);
    }
    Ok(())
}
