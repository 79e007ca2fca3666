//! LLM 设置持久化
//!
//! 单个 JSON 文件保存当前 LlmSettings 与用过的模型名历史（最近优先、去重、最多 10 条），跨会话恢复。

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::llm::LlmSettings;

pub const MODEL_HISTORY_LIMIT: usize = 10;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSettings {
    pub llm: LlmSettings,
    #[serde(default)]
    pub model_history: Vec<String>,
}

impl StoredSettings {
    /// 记录一次使用的模型名：移到最前，去重，截断
    pub fn remember_model(&mut self, model: &str) {
        let model = model.trim();
        if model.is_empty() {
            return;
        }
        self.model_history.retain(|m| m != model);
        self.model_history.insert(0, model.to_string());
        self.model_history.truncate(MODEL_HISTORY_LIMIT);
    }
}

#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 文件不存在时返回默认设置
    pub fn load(&self) -> anyhow::Result<StoredSettings> {
        if !self.path.exists() {
            return Ok(StoredSettings::default());
        }
        let data = std::fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&data)?)
    }

    /// 写入 JSON 文件；父目录不存在时自动创建
    pub fn save(&self, settings: &StoredSettings) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(settings)?)?;
        Ok(())
    }

    /// 保存本次运行使用的设置，并把模型名记入历史
    pub fn record_run(&self, llm: &LlmSettings) -> anyhow::Result<StoredSettings> {
        let mut stored = self.load().unwrap_or_default();
        stored.llm = llm.clone();
        stored.remember_model(&llm.model_name);
        self.save(&stored)?;
        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Provider;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("settings.json"));
        assert_eq!(store.load().unwrap(), StoredSettings::default());
    }

    #[test]
    fn test_record_run_dedups_model_history() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("nested").join("settings.json"));

        let mut llm = LlmSettings::for_provider(Provider::OpenAi);
        llm.model_name = "llama3".into();
        store.record_run(&llm).unwrap();
        llm.model_name = "qwen".into();
        store.record_run(&llm).unwrap();
        llm.model_name = "llama3".into();
        let stored = store.record_run(&llm).unwrap();

        assert_eq!(stored.model_history, vec!["llama3".to_string(), "qwen".to_string()]);
        assert_eq!(store.load().unwrap().llm.provider, Provider::OpenAi);
    }

    #[test]
    fn test_history_is_capped() {
        let mut stored = StoredSettings::default();
        for i in 0..15 {
            stored.remember_model(&format!("model-{}", i));
        }
        assert_eq!(stored.model_history.len(), MODEL_HISTORY_LIMIT);
        assert_eq!(stored.model_history[0], "model-14");
    }
}
