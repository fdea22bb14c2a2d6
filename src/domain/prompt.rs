//! 系统提示词配置

use serde::{Deserialize, Serialize};

/// 提示词配置
///
/// 文件格式：`{"default": "...", "admin_prompt": "..." | null}`，
/// 只有 `admin_prompt` 允许缺省
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptConfig {
    #[serde(rename = "default")]
    pub default_prompt: String,
    #[serde(default)]
    pub admin_prompt: Option<String>,
}

/// 设置管理员提示词的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptUpdate {
    /// 已生效并持久化，携带裁剪后的提示词
    Applied(String),
    /// 输入为空或只有空白，未做任何修改
    RejectedEmpty,
}

impl PromptConfig {
    pub fn new(default_prompt: impl Into<String>) -> Self {
        Self {
            default_prompt: default_prompt.into(),
            admin_prompt: None,
        }
    }

    pub fn with_admin_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.admin_prompt = Some(prompt.into());
        self
    }

    /// 管理员提示词非空时优先，否则使用默认提示词
    pub fn effective_prompt(&self) -> &str {
        match self.admin_prompt.as_deref() {
            Some(prompt) if !prompt.trim().is_empty() => prompt,
            _ => &self.default_prompt,
        }
    }

    /// 在内存中替换管理员提示词，持久化由调用方负责
    pub fn set_admin_prompt(&mut self, candidate: &str) -> PromptUpdate {
        let prompt = candidate.trim();
        if prompt.is_empty() {
            return PromptUpdate::RejectedEmpty;
        }
        self.admin_prompt = Some(prompt.to_string());
        PromptUpdate::Applied(prompt.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_prompt_falls_back_to_default() {
        let config = PromptConfig::new("be helpful");
        assert_eq!(config.effective_prompt(), "be helpful");

        let blank = PromptConfig::new("be helpful").with_admin_prompt("   ");
        assert_eq!(blank.effective_prompt(), "be helpful");
    }

    #[test]
    fn test_effective_prompt_prefers_admin() {
        let config = PromptConfig::new("be helpful").with_admin_prompt("talk like a pirate");
        assert_eq!(config.effective_prompt(), "talk like a pirate");
    }

    #[test]
    fn test_set_admin_prompt_trims() {
        let mut config = PromptConfig::new("default");
        let outcome = config.set_admin_prompt("  be terse \n");
        assert_eq!(outcome, PromptUpdate::Applied("be terse".to_string()));
        assert_eq!(config.admin_prompt.as_deref(), Some("be terse"));
    }

    #[test]
    fn test_set_admin_prompt_rejects_whitespace() {
        let mut config = PromptConfig::new("default").with_admin_prompt("old");
        assert_eq!(config.set_admin_prompt(" \t "), PromptUpdate::RejectedEmpty);
        assert_eq!(config.admin_prompt.as_deref(), Some("old"));
    }

    #[test]
    fn test_missing_admin_prompt_key_is_tolerated() {
        let config: PromptConfig = serde_json::from_str(r#"{"default": "hello"}"#).unwrap();
        assert_eq!(config.default_prompt, "hello");
        assert!(config.admin_prompt.is_none());

        let config: PromptConfig =
            serde_json::from_str(r#"{"default": "hello", "admin_prompt": null}"#).unwrap();
        assert!(config.admin_prompt.is_none());
    }

    #[test]
    fn test_missing_default_key_is_rejected() {
        let result: Result<PromptConfig, _> = serde_json::from_str(r#"{"admin_prompt": "x"}"#);
        assert!(result.is_err());
    }
}
