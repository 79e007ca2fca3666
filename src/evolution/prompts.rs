//! 发给 LLM 的提示词
//!
//! 四类任务各自的 system 提示与 user 文本拼装；输出格式约定见 response 模块。

use crate::evolution::types::{GameType, ImproveRequest};

pub const GAME_DEV_SYSTEM: &str = r#"You are an expert game developer AI. Your goal is to create a complete, playable game in a single HTML file.
Rules:
1. Single file: the entire game (logic and styles) must be in one HTML file with inline <script> and <style>.
2. Rendering: draw the game on a <canvas> element so it can be captured as a screenshot.
3. Complete code: always output the full, runnable HTML. No placeholders.
4. JSON output: respond with a single valid JSON object and nothing else:
{"thought": "your reasoning", "plan": "step-by-step plan", "code": "the full HTML document"}"#;

pub const IMPROVER_SYSTEM: &str = r#"You are an expert game developer AI. You receive the current code of a single-file HTML game, screenshots of it running, the original concept, developer notes and a memory of previous plans. Produce the next improved version.
Rules:
1. Output the complete, runnable HTML file.
2. Address the developer notes; report in your analysis which of them are already satisfied.
3. Use the screenshots to judge the visual state.
4. JSON output: respond with a single valid JSON object and nothing else:
{"thought": "your reasoning", "analysis": "analysis of the current state and notes", "plan": "step-by-step plan for this change", "code": "the full HTML document"}"#;

pub const SUMMARIZER_SYSTEM: &str = "You compress the development history of a game. Summarize the given plans into one short paragraph that keeps the features added, the problems fixed and the open issues. Reply with the paragraph only.";

/// 初始生成的 user 文本
pub fn initial_prompt(concept: &str, game_type: GameType) -> String {
    let behaviour = match game_type {
        GameType::Interactive => "It must be playable by a user with keyboard or mouse controls.",
        GameType::Simulation => "It must run on its own without any user input.",
    };
    format!(
        "Game Concept: \"{concept}\"\nGame Type: \"{game_type}\". {behaviour}\nGenerate the initial complete HTML file for this game."
    )
}

fn bullet_list(items: &[String]) -> String {
    items
        .iter()
        .map(|i| format!("- {}", i))
        .collect::<Vec<_>>()
        .join("\n")
}

/// 改进步的 user 文本：概念、记忆、备注、当前代码
pub fn improve_prompt(req: &ImproveRequest) -> String {
    let mut s = String::new();
    s.push_str(&format!(
        "Original Game Concept: \"{}\"\nGame Type: \"{}\"\n\n",
        req.concept, req.game_type
    ));

    if !req.long_term_memory.is_empty() {
        s.push_str("## Long-term memory (summaries of earlier iterations)\n");
        s.push_str(&bullet_list(&req.long_term_memory));
        s.push_str("\n\n");
    }
    if !req.short_term_memory.is_empty() {
        s.push_str("## Recent plans (oldest first)\n");
        s.push_str(&bullet_list(&req.short_term_memory));
        s.push_str("\n\n");
    }

    match (&req.focus_note, req.notes.is_empty()) {
        (Some(focus), true) => {
            s.push_str(&format!("## New Developer Note\n\"{}\"\n\n", focus));
        }
        (Some(focus), false) => {
            s.push_str("## Developer Note History\n");
            s.push_str(&bullet_list(&req.notes));
            s.push_str(&format!("\n\n## New Developer Note\n\"{}\"\n\n", focus));
        }
        (None, false) => {
            s.push_str("## Developer Notes (checklist)\n");
            s.push_str(&bullet_list(&req.notes));
            s.push_str("\n\n");
        }
        (None, true) => {
            s.push_str("## Developer Notes\nNone. Improve gameplay, visuals and robustness on your own judgement.\n\n");
        }
    }

    if req.screenshots.is_empty() {
        s.push_str("No screenshot is available for this iteration; rely on the code.\n\n");
    } else {
        s.push_str(&format!(
            "{} screenshot(s) of the running game are attached in capture order.\n\n",
            req.screenshots.len()
        ));
    }

    s.push_str(&format!("## Current HTML Code\n```html\n{}\n```\n\n", req.code));
    s.push_str("Analyze the code, screenshots and notes, then generate the improved HTML file.");
    s
}

/// 长期记忆合并的 user 文本
pub fn summarize_prompt(plans: &[String]) -> String {
    let numbered = plans
        .iter()
        .enumerate()
        .map(|(i, p)| format!("{}. {}", i + 1, p))
        .collect::<Vec<_>>()
        .join("\n");
    format!("Plans of the last {} iterations:\n{}", plans.len(), numbered)
}

/// 随机创意：单条 user 消息（部分本地模型不支持 system 角色）
pub fn idea_prompt(game_type: GameType) -> String {
    format!(
        "You are a creative concept generator.\n\
         Generate a single, creative and concise concept for a simple web {game_type} drawn on an HTML canvas.\n\
         An 'interactive' game involves player controls, while a 'simulation' runs on its own.\n\
         The concept must be a single short sentence. Only provide the concept, no extra text.\n\
         Example for an interactive game: A platformer where a ninja squirrel collects golden acorns while avoiding robot owls.\n\
         Example for a simulation: A simple ecosystem where sheep wander and eat grass while wolves hunt them.\n\n\
         Generate a new, unique concept for a {game_type} now."
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_improve_prompt_contains_code_and_focus_note() {
        let req = ImproveRequest {
            code: "<html>game</html>".into(),
            concept: "A cat jumps over dogs".into(),
            focus_note: Some("make the cat orange".into()),
            notes: vec!["add a score".into()],
            ..Default::default()
        };
        let prompt = improve_prompt(&req);
        assert!(prompt.contains("```html\n<html>game</html>\n```"));
        assert!(prompt.contains("\"make the cat orange\""));
        assert!(prompt.contains("- add a score"));
        assert!(prompt.contains("No screenshot"));
    }

    #[test]
    fn test_checklist_notes_are_listed() {
        let req = ImproveRequest {
            notes: vec!["first".into(), "second".into()],
            ..Default::default()
        };
        let prompt = improve_prompt(&req);
        assert!(prompt.contains("checklist"));
        assert!(prompt.find("- first").unwrap() < prompt.find("- second").unwrap());
    }

    #[test]
    fn test_summarize_prompt_numbers_plans() {
        let prompt = summarize_prompt(&["a".to_string(), "b".to_string()]);
        assert!(prompt.contains("1. a\n2. b"));
    }
}
