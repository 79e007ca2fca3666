//! Mock LLM 客户端（用于测试与离线演示，无需 API）
//!
//! 按 system 提示区分任务：初始生成返回固定的 canvas 小游戏，改进时在上一版代码末尾追加修订标记，
//! 摘要与创意返回固定文本。输出格式与真实模型约定一致，可完整跑通进化循环。

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::evolution::prompts::{GAME_DEV_SYSTEM, IMPROVER_SYSTEM, SUMMARIZER_SYSTEM};
use crate::llm::{LlmClient, LlmError, LlmRequest, Provider};

pub const MOCK_MODEL: &str = "mock-gamedev";

const MOCK_GAME: &str = r#"<!DOCTYPE html>
<html>
<head><style>body{margin:0;background:#111}canvas{display:block;margin:auto}</style></head>
<body>
<canvas id="game" width="480" height="320"></canvas>
<script>
const ctx = document.getElementById('game').getContext('2d');
let x = 20;
function frame() {
  ctx.fillStyle = '#111'; ctx.fillRect(0, 0, 480, 320);
  ctx.fillStyle = '#f90'; ctx.fillRect(x, 260, 30, 30);
  x = (x + 2) % 480;
  requestAnimationFrame(frame);
}
frame();
</script>
</body>
</html>"#;

/// Mock 客户端：确定性输出，记录调用次数
#[derive(Debug, Default)]
pub struct MockLlmClient {
    calls: AtomicUsize,
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// 取 user 文本中 ```html 代码块里的上一版代码
    fn previous_code(user: &str) -> &str {
        user.find("```html\n")
            .map(|start| &user[start + "```html\n".len()..])
            .and_then(|rest| rest.rfind("\n```").map(|end| &rest[..end]))
            .unwrap_or(MOCK_GAME)
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, request: &LlmRequest) -> Result<String, LlmError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let system = request.system.as_deref().unwrap_or_default();

        let output = if system == GAME_DEV_SYSTEM {
            serde_json::json!({
                "thought": "Start with a minimal canvas loop.",
                "plan": "Draw a moving square on a canvas.",
                "code": MOCK_GAME,
            })
            .to_string()
        } else if system == IMPROVER_SYSTEM {
            let code = format!("{}\n<!-- revision {} -->", Self::previous_code(&request.user), n);
            serde_json::json!({
                "thought": "Iterate on the current version.",
                "analysis": format!("Reviewed {} screenshot(s) and the current code.", request.images.len()),
                "plan": format!("Mock revision {}", n),
                "code": code,
            })
            .to_string()
        } else if system == SUMMARIZER_SYSTEM {
            format!("Mock summary of earlier work (call {}).", n)
        } else {
            "A square that dodges falling circles on a dark canvas.".to_string()
        };
        Ok(output)
    }

    fn provider(&self) -> Provider {
        Provider::Mock
    }

    fn model(&self) -> &str {
        MOCK_MODEL
    }
}
