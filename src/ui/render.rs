//! 界面渲染
//!
//! 根据 EvolutionSnapshot 与本地 ShellState 绘制：标题栏显示状态、迭代进度、模型与耗时，
//! 左侧为当前面板（日志 / 代码 / 统计 / 记忆），右侧为版本列表与备注，底部为输入框与提示。

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, List, ListItem, Paragraph, Tabs, Wrap},
    Frame,
};

use crate::core::{EvolutionSnapshot, LogLevel, RunStatus};
use crate::evolution::GameType;
use crate::llm::LlmSettings;

/// 左侧面板
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tab {
    #[default]
    Log,
    Code,
    Stats,
    Memory,
}

impl Tab {
    pub const ALL: [Tab; 4] = [Tab::Log, Tab::Code, Tab::Stats, Tab::Memory];

    pub fn title(&self) -> &'static str {
        match self {
            Tab::Log => "Log",
            Tab::Code => "Code",
            Tab::Stats => "Stats",
            Tab::Memory => "Memory",
        }
    }

    pub fn next(&self) -> Tab {
        match self {
            Tab::Log => Tab::Code,
            Tab::Code => Tab::Stats,
            Tab::Stats => Tab::Memory,
            Tab::Memory => Tab::Log,
        }
    }
}

/// 界面本地状态（不属于进化循环）
#[derive(Debug, Clone)]
pub struct ShellState {
    pub input: String,
    pub concept: String,
    pub game_type: GameType,
    pub max_iterations: usize,
    pub llm: LlmSettings,
    pub model_history: Vec<String>,
    pub tab: Tab,
    /// 本地查看的版本；None 表示跟随最新
    pub view: Option<usize>,
    pub scroll: usize,
    /// 界面自身的提示（命令错误等）
    pub flash: Option<String>,
}

fn status_color(status: RunStatus) -> Color {
    match status {
        RunStatus::Idle => Color::Gray,
        RunStatus::Generating | RunStatus::Improving => Color::Yellow,
        RunStatus::Stopped => Color::Blue,
        RunStatus::Error => Color::Red,
        RunStatus::Finished => Color::Green,
    }
}

fn format_ms(ms: u64) -> String {
    let secs = ms / 1000;
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

/// 绘制一帧；返回左侧面板的最大滚动偏移，供外部 clamp 滚动
pub fn draw(f: &mut Frame, snapshot: &EvolutionSnapshot, shell: &ShellState) -> usize {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(8), Constraint::Length(5)])
        .split(f.area());

    draw_header(f, chunks[0], snapshot, shell);

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(68), Constraint::Percentage(32)])
        .split(chunks[1]);
    let max_scroll = draw_main(f, body[0], snapshot, shell);
    draw_sidebar(f, body[1], snapshot, shell);
    draw_input(f, chunks[2], snapshot, shell);
    max_scroll
}

fn draw_header(f: &mut Frame, area: Rect, snapshot: &EvolutionSnapshot, shell: &ShellState) {
    let done = snapshot.iterations.len();
    let max = if snapshot.max_iterations > 0 {
        snapshot.max_iterations
    } else {
        shell.max_iterations
    };
    let (input_chars, output_chars) = snapshot.usage_totals();
    let line = Line::from(vec![
        Span::styled(
            format!(" {} ", snapshot.status),
            Style::default()
                .fg(Color::Black)
                .bg(status_color(snapshot.status))
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(format!(
            "  iterations {} (1 + {} improvements)  │  {} {}  │  {}  │  elapsed {}  │  chars in {} / out {}",
            done,
            max,
            shell.llm.provider,
            shell.llm.model_name,
            shell.game_type,
            format_ms(snapshot.timing.total_elapsed_ms),
            input_chars,
            output_chars,
        )),
    ]);
    let title = if shell.concept.is_empty() {
        " EvoForge ".to_string()
    } else {
        format!(" EvoForge │ {} ", shell.concept)
    };
    let header = Paragraph::new(line).block(
        Block::default()
            .title(title)
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Yellow)),
    );
    f.render_widget(header, area);
}

fn main_lines(snapshot: &EvolutionSnapshot, shell: &ShellState) -> Vec<Line<'static>> {
    match shell.tab {
        Tab::Log => snapshot
            .log
            .iter()
            .flat_map(|entry| {
                let color = match entry.level {
                    LogLevel::Info => Color::White,
                    LogLevel::Warn => Color::Yellow,
                    LogLevel::Error => Color::Red,
                };
                let stamp = entry.at.format("%H:%M:%S").to_string();
                entry
                    .message
                    .lines()
                    .enumerate()
                    .map(|(i, text)| {
                        let prefix = if i == 0 { format!("{} ", stamp) } else { " ".repeat(9) };
                        Line::from(vec![
                            Span::styled(prefix, Style::default().fg(Color::DarkGray)),
                            Span::styled(text.to_string(), Style::default().fg(color)),
                        ])
                    })
                    .collect::<Vec<_>>()
            })
            .collect(),
        Tab::Code => {
            let view = shell.view.or(snapshot.selected);
            let iteration = match view {
                Some(index) => snapshot.iterations.iter().find(|it| it.index == index),
                None => snapshot.iterations.last(),
            };
            match iteration {
                Some(it) => it
                    .code
                    .lines()
                    .enumerate()
                    .map(|(n, text)| {
                        Line::from(vec![
                            Span::styled(format!("{:>4} ", n + 1), Style::default().fg(Color::DarkGray)),
                            Span::raw(text.to_string()),
                        ])
                    })
                    .collect(),
                None => vec![Line::from("No code yet. Type /start <concept> to begin.")],
            }
        }
        Tab::Stats => {
            let mut lines = vec![Line::from(Span::styled(
                format!("{:<5} {:<12} {:<22} {:>10} {:>10}", "iter", "task", "model", "in", "out"),
                Style::default().add_modifier(Modifier::BOLD),
            ))];
            for stat in &snapshot.usage {
                lines.push(Line::from(format!(
                    "{:<5} {:<12} {:<22} {:>10} {:>10}",
                    stat.iteration,
                    stat.task.to_string(),
                    format!("{}/{}", stat.provider, stat.model),
                    stat.input_chars,
                    stat.output_chars
                )));
            }
            lines.push(Line::from(""));
            let timing = &snapshot.timing;
            lines.push(Line::from(format!("Total time: {}", format_ms(timing.total_elapsed_ms))));
            if let Some(avg) = timing.average_ms() {
                lines.push(Line::from(format!("Average per iteration: {:.1}s", avg as f64 / 1000.0)));
            }
            for (i, ms) in timing.per_iteration_ms.iter().enumerate() {
                lines.push(Line::from(format!("  step {:>3}: {:.1}s", i + 1, *ms as f64 / 1000.0)));
            }
            lines
        }
        Tab::Memory => {
            let mut lines = vec![Line::from(Span::styled(
                "Long-term memory",
                Style::default().add_modifier(Modifier::BOLD),
            ))];
            lines.extend(snapshot.long_term_memory.iter().map(|m| Line::from(format!("• {}", m))));
            lines.push(Line::from(""));
            lines.push(Line::from(Span::styled(
                "Recent plans",
                Style::default().add_modifier(Modifier::BOLD),
            )));
            for plan in &snapshot.short_term_memory {
                for (i, text) in plan.lines().enumerate() {
                    let bullet = if i == 0 { "• " } else { "  " };
                    lines.push(Line::from(format!("{}{}", bullet, text)));
                }
            }
            lines
        }
    }
}

fn draw_main(f: &mut Frame, area: Rect, snapshot: &EvolutionSnapshot, shell: &ShellState) -> usize {
    let parts = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Min(3)])
        .split(area);

    let selected = Tab::ALL.iter().position(|t| *t == shell.tab).unwrap_or(0);
    let tabs = Tabs::new(Tab::ALL.iter().map(|t| t.title()).collect::<Vec<_>>())
        .select(selected)
        .highlight_style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD));
    f.render_widget(tabs, parts[0]);

    let lines = main_lines(snapshot, shell);
    let total = lines.len();
    let height = parts[1].height.saturating_sub(2) as usize;
    let max_scroll = total.saturating_sub(height);
    let scroll = shell.scroll.min(max_scroll);

    let paragraph = Paragraph::new(Text::from(lines))
        .block(Block::default().borders(Borders::ALL))
        .wrap(Wrap { trim: false })
        .scroll((scroll as u16, 0));
    f.render_widget(paragraph, parts[1]);
    max_scroll
}

fn draw_sidebar(f: &mut Frame, area: Rect, snapshot: &EvolutionSnapshot, shell: &ShellState) {
    let parts = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(area);

    let view = shell.view.or(snapshot.selected);
    let latest = snapshot.iterations.last().map(|it| it.index);
    let items: Vec<ListItem> = snapshot
        .iterations
        .iter()
        .rev()
        .map(|it| {
            let marker = if Some(it.index) == view || (view.is_none() && Some(it.index) == latest) {
                "▶"
            } else {
                " "
            };
            let camera = if it.has_screenshot { "▣" } else { "·" };
            let plan = it
                .plan
                .as_deref()
                .and_then(|p| p.lines().next())
                .unwrap_or("initial version");
            ListItem::new(format!("{} #{:<3} {} {}", marker, it.index, camera, plan))
        })
        .collect();
    let history = List::new(items).block(Block::default().title(" Iterations ").borders(Borders::ALL));
    f.render_widget(history, parts[0]);

    let notes: Vec<ListItem> = snapshot
        .notes
        .iter()
        .map(|n| {
            let style = if n.consumed {
                Style::default().fg(Color::DarkGray).add_modifier(Modifier::CROSSED_OUT)
            } else {
                Style::default()
            };
            ListItem::new(Span::styled(format!("• {}", n.text), style))
        })
        .collect();
    let notes = List::new(notes).block(Block::default().title(" Developer notes ").borders(Borders::ALL));
    f.render_widget(notes, parts[1]);
}

fn draw_input(f: &mut Frame, area: Rect, snapshot: &EvolutionSnapshot, shell: &ShellState) {
    let (title, color) = if let Some(flash) = &shell.flash {
        (format!(" {} ", flash), Color::Magenta)
    } else if let Some(err) = &snapshot.last_error {
        (format!(" Error: {} ", err.chars().take(60).collect::<String>()), Color::Red)
    } else if snapshot.status.is_active() {
        (" Add a note (applies to the next step) ".to_string(), Color::Yellow)
    } else {
        (" Input ".to_string(), Color::Blue)
    };

    let hint = " Enter send │ Tab panel │ ↑↓ PgUp/PgDn scroll │ /help │ Ctrl+C stop │ Ctrl+Q quit ";
    let block = Block::default()
        .title(title)
        .title_bottom(Line::from(Span::styled(hint, Style::default().fg(Color::DarkGray))))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(color));
    let input = Paragraph::new(shell.input.as_str())
        .block(block)
        .wrap(Wrap { trim: false });
    f.render_widget(input, area);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tab_cycle_returns_to_start() {
        let mut tab = Tab::default();
        for _ in 0..Tab::ALL.len() {
            tab = tab.next();
        }
        assert_eq!(tab, Tab::Log);
    }

    #[test]
    fn test_format_ms() {
        assert_eq!(format_ms(61_500), "01:01");
        assert_eq!(format_ms(0), "00:00");
    }
}
