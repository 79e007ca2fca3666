//! 事件处理
//!
//! 轮询 crossterm 键盘事件：Ctrl+C 转为 Stop，Ctrl+Q 退出，Tab 切换面板，其余按键交给 run_app 拼输入缓冲。
//! Enter 时由 parse_input 把输入解析为 InputAction：`/` 开头为命令，其余文本作为开发者备注。

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use tokio::sync::mpsc;

use crate::core::Command;
use crate::evolution::GameType;
use crate::llm::Provider;

/// 应用事件：来自快捷键的 Command、面板切换或原始 KeyEvent
#[derive(Debug, Clone)]
pub enum AppEvent {
    Command(Command),
    NextTab,
    Key(KeyEvent),
}

/// 一行输入对应的动作
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputAction {
    /// 开始运行；可同时给出新的概念
    Start(Option<String>),
    Stop,
    Resume,
    Note(String),
    Concept(String),
    GameType(GameType),
    MaxIterations(usize),
    Provider(Provider),
    Model(String),
    /// 列出最近使用的模型
    Models,
    BaseUrl(String),
    ApiKey(String),
    View(usize),
    Idea,
    Help,
    Quit,
    Invalid(String),
}

pub const HELP: &str = "/start [concept] │ /stop │ /resume │ /concept <text> │ /type interactive|simulation │ \
/max N │ /idea │ /view N │ /provider gemini|openai|mock │ /model [NAME] │ /baseurl URL │ /key KEY │ /quit │ text = note";

/// 解析一行输入；空行返回 None
pub fn parse_input(input: &str) -> Option<InputAction> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }
    let Some(command) = input.strip_prefix('/') else {
        return Some(InputAction::Note(input.to_string()));
    };

    let (name, arg) = match command.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (command, ""),
    };
    let non_empty = |arg: &str| (!arg.is_empty()).then(|| arg.to_string());

    let action = match name.to_lowercase().as_str() {
        "start" | "go" => InputAction::Start(non_empty(arg)),
        "stop" => InputAction::Stop,
        "resume" | "improve" => InputAction::Resume,
        "concept" => match non_empty(arg) {
            Some(c) => InputAction::Concept(c),
            None => InputAction::Invalid("usage: /concept <text>".into()),
        },
        "type" => match arg.parse::<GameType>() {
            Ok(t) => InputAction::GameType(t),
            Err(e) => InputAction::Invalid(e),
        },
        "max" => match arg.parse::<usize>() {
            Ok(n) if n >= 1 => InputAction::MaxIterations(n),
            _ => InputAction::Invalid("usage: /max N (N >= 1)".into()),
        },
        "provider" => match arg.parse::<Provider>() {
            Ok(p) => InputAction::Provider(p),
            Err(e) => InputAction::Invalid(e),
        },
        "model" => match non_empty(arg) {
            Some(m) => InputAction::Model(m),
            None => InputAction::Models,
        },
        "baseurl" | "base_url" => InputAction::BaseUrl(arg.to_string()),
        "key" => InputAction::ApiKey(arg.to_string()),
        "view" => match arg.parse::<usize>() {
            Ok(n) if n >= 1 => InputAction::View(n),
            _ => InputAction::Invalid("usage: /view N".into()),
        },
        "note" => match non_empty(arg) {
            Some(n) => InputAction::Note(n),
            None => InputAction::Invalid("usage: /note <text>".into()),
        },
        "idea" => InputAction::Idea,
        "help" | "?" => InputAction::Help,
        "quit" | "exit" => InputAction::Quit,
        other => InputAction::Invalid(format!("unknown command /{}", other)),
    };
    Some(action)
}

/// 事件处理器：持有 cmd_tx，poll 时读键盘并返回 AppEvent
pub struct EventHandler {
    cmd_tx: mpsc::UnboundedSender<Command>,
}

impl EventHandler {
    pub fn new(cmd_tx: mpsc::UnboundedSender<Command>) -> Self {
        Self { cmd_tx }
    }

    pub fn poll(&self) -> anyhow::Result<Option<AppEvent>> {
        if event::poll(std::time::Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    return Ok(Some(self.handle_key(key)));
                }
            }
        }
        Ok(None)
    }

    fn handle_key(&self, key: KeyEvent) -> AppEvent {
        match key.code {
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.send(Command::Stop);
                AppEvent::Command(Command::Stop)
            }
            KeyCode::Char('q') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                AppEvent::Command(Command::Quit)
            }
            KeyCode::Tab => AppEvent::NextTab,
            _ => AppEvent::Key(key),
        }
    }

    pub fn send(&self, cmd: Command) {
        let _ = self.cmd_tx.send(cmd);
    }
}
