//! TUI 应用主循环
//!
//! 进入全屏/原始模式，轮询 snapshot_rx 与键盘事件，将输入解析为 Command 发送给编排器，
//! 每帧用 draw 渲染 EvolutionSnapshot 与本地 ShellState。

use std::io::{self, Stdout};

use crossterm::event::KeyCode;
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tokio::sync::{mpsc, watch};

use crate::core::{Command, EvolutionSnapshot, EvolverInfo};
use crate::evolution::EvolutionConfig;
use crate::ui::event::{parse_input, AppEvent, EventHandler, InputAction, HELP};
use crate::ui::render::{draw, ShellState, Tab};

/// 一行输入处理后的结果
#[derive(Debug)]
pub enum InputOutcome {
    Send(Command),
    Quit,
    Local,
}

impl ShellState {
    pub fn from_info(info: &EvolverInfo) -> Self {
        Self {
            input: String::new(),
            concept: String::new(),
            game_type: info.config.evolution.game_type,
            max_iterations: info.config.evolution.max_iterations.max(1),
            llm: info.settings.llm.clone(),
            model_history: info.settings.model_history.clone(),
            tab: Tab::Log,
            view: None,
            scroll: usize::MAX,
            flash: None,
        }
    }

    /// 把解析后的动作应用到本地状态，需要编排器处理的返回 Send
    pub fn apply(&mut self, action: InputAction) -> InputOutcome {
        self.flash = None;
        match action {
            InputAction::Start(concept) => {
                if let Some(c) = concept {
                    self.concept = c;
                }
                self.view = None;
                self.tab = Tab::Log;
                self.scroll = usize::MAX;
                if !self.model_history.contains(&self.llm.model_name) {
                    self.model_history.insert(0, self.llm.model_name.clone());
                }
                let config = EvolutionConfig::new(self.concept.clone(), self.game_type, self.max_iterations)
                    .with_llm(self.llm.clone());
                InputOutcome::Send(Command::Start(config))
            }
            InputAction::Stop => InputOutcome::Send(Command::Stop),
            InputAction::Resume => InputOutcome::Send(Command::Resume),
            InputAction::Note(text) => InputOutcome::Send(Command::AddNote(text)),
            InputAction::Concept(c) => {
                self.flash = Some(format!("Concept: {}", c));
                self.concept = c;
                InputOutcome::Local
            }
            InputAction::GameType(t) => {
                self.game_type = t;
                self.flash = Some(format!("Game type: {}", t));
                InputOutcome::Local
            }
            InputAction::MaxIterations(n) => {
                self.max_iterations = n;
                self.flash = Some(format!("Max improvement steps: {}", n));
                InputOutcome::Local
            }
            InputAction::Provider(p) => {
                self.llm.switch_provider(p);
                self.flash = Some(format!("Provider: {} ({})", p, self.llm.model_name));
                InputOutcome::Local
            }
            InputAction::Model(m) => {
                self.flash = Some(format!("Model: {}", m));
                self.llm.model_name = m;
                InputOutcome::Local
            }
            InputAction::Models => {
                self.flash = Some(if self.model_history.is_empty() {
                    "No models used yet".to_string()
                } else {
                    format!("Recent models: {}", self.model_history.join(", "))
                });
                InputOutcome::Local
            }
            InputAction::BaseUrl(url) => {
                self.flash = Some(if url.is_empty() {
                    "Base URL cleared".to_string()
                } else {
                    format!("Base URL: {}", url)
                });
                self.llm.base_url = url;
                InputOutcome::Local
            }
            InputAction::ApiKey(key) => {
                self.flash = Some(if key.is_empty() { "API key cleared" } else { "API key set" }.to_string());
                self.llm.api_key = key;
                InputOutcome::Local
            }
            InputAction::View(index) => {
                self.view = Some(index);
                self.tab = Tab::Code;
                self.scroll = 0;
                InputOutcome::Send(Command::SelectIteration(index))
            }
            InputAction::Idea => InputOutcome::Send(Command::GenerateIdea {
                game_type: self.game_type,
                llm: self.llm.clone(),
            }),
            InputAction::Help => {
                self.flash = Some(HELP.to_string());
                InputOutcome::Local
            }
            InputAction::Quit => InputOutcome::Quit,
            InputAction::Invalid(msg) => {
                self.flash = Some(msg);
                InputOutcome::Local
            }
        }
    }
}

/// 运行 TUI：启用原始模式与全屏，循环 poll 事件 + 渲染，退出时恢复终端
pub async fn run_app(
    snapshot_rx: watch::Receiver<EvolutionSnapshot>,
    cmd_tx: mpsc::UnboundedSender<Command>,
    info: EvolverInfo,
) -> anyhow::Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let event_handler = EventHandler::new(cmd_tx);
    let mut shell = ShellState::from_info(&info);
    let mut last_log_len = 0usize;
    let mut last_idea: Option<String> = None;

    loop {
        let snapshot = snapshot_rx.borrow().clone();

        if snapshot.log.len() != last_log_len {
            last_log_len = snapshot.log.len();
            if shell.tab == Tab::Log {
                shell.scroll = usize::MAX;
            }
        }
        // 新创意直接作为下一次运行的概念
        if snapshot.last_idea.is_some() && snapshot.last_idea != last_idea {
            last_idea = snapshot.last_idea.clone();
            if let Some(idea) = &last_idea {
                shell.concept = idea.clone();
            }
        }

        if let Ok(Some(ev)) = event_handler.poll() {
            match ev {
                AppEvent::Command(Command::Quit) => {
                    event_handler.send(Command::Quit);
                    break;
                }
                AppEvent::Command(_) => {}
                AppEvent::NextTab => {
                    shell.tab = shell.tab.next();
                    shell.scroll = if shell.tab == Tab::Log { usize::MAX } else { 0 };
                }
                AppEvent::Key(key) => match key.code {
                    KeyCode::Enter => {
                        let input = std::mem::take(&mut shell.input);
                        if let Some(action) = parse_input(&input) {
                            match shell.apply(action) {
                                InputOutcome::Send(cmd) => event_handler.send(cmd),
                                InputOutcome::Quit => {
                                    event_handler.send(Command::Quit);
                                    break;
                                }
                                InputOutcome::Local => {}
                            }
                        }
                    }
                    KeyCode::Backspace => {
                        shell.input.pop();
                    }
                    KeyCode::Esc => {
                        shell.input.clear();
                        shell.flash = None;
                    }
                    KeyCode::Char(c) => shell.input.push(c),
                    KeyCode::Up => shell.scroll = shell.scroll.saturating_sub(1),
                    KeyCode::Down => shell.scroll = shell.scroll.saturating_add(1),
                    KeyCode::PageUp => shell.scroll = shell.scroll.saturating_sub(10),
                    KeyCode::PageDown => shell.scroll = shell.scroll.saturating_add(10),
                    KeyCode::Home => shell.scroll = 0,
                    KeyCode::End => shell.scroll = usize::MAX,
                    _ => {}
                },
            }
        }

        let mut max_scroll = 0usize;
        terminal.draw(|f| {
            max_scroll = draw(f, &snapshot, &shell);
        })?;
        shell.scroll = shell.scroll.min(max_scroll);

        tokio::task::yield_now().await;
    }

    restore_terminal(&mut terminal)?;
    Ok(())
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> anyhow::Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)?;
    terminal.show_cursor()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::evolution::GameType;
    use crate::llm::Provider;
    use crate::memory::StoredSettings;

    fn shell() -> ShellState {
        let info = EvolverInfo {
            config: AppConfig::default(),
            workspace: std::env::temp_dir(),
            settings: StoredSettings::default(),
        };
        ShellState::from_info(&info)
    }

    #[test]
    fn test_start_uses_local_settings() {
        let mut shell = shell();
        shell.apply(InputAction::GameType(GameType::Simulation));
        shell.apply(InputAction::MaxIterations(3));
        shell.apply(InputAction::Provider(Provider::Mock));
        match shell.apply(InputAction::Start(Some("A cat jumps over dogs".into()))) {
            InputOutcome::Send(Command::Start(config)) => {
                assert_eq!(config.game_concept, "A cat jumps over dogs");
                assert_eq!(config.game_type, GameType::Simulation);
                assert_eq!(config.max_iterations, 3);
                assert_eq!(config.llm.provider, Provider::Mock);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_view_switches_to_code_tab() {
        let mut shell = shell();
        assert!(matches!(
            shell.apply(InputAction::View(2)),
            InputOutcome::Send(Command::SelectIteration(2))
        ));
        assert_eq!(shell.view, Some(2));
        assert_eq!(shell.tab, Tab::Code);
    }

    #[test]
    fn test_invalid_input_only_flashes() {
        let mut shell = shell();
        assert!(matches!(shell.apply(InputAction::Invalid("nope".into())), InputOutcome::Local));
        assert_eq!(shell.flash.as_deref(), Some("nope"));
    }
}
