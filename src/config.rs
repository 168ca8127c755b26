use serde::{Deserialize, Serialize};

const DEFAULT_USER_LABEL: &str = "user";
const DEFAULT_ASSISTANT_LABEL: &str = "assistant";

/// 补全接口的输入形态
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputFormat {
    /// 调用方给出的是单条原始 prompt
    Prompt,
    /// 调用方给出的是多轮消息
    #[default]
    Messages,
}

/// 补全 prompt 转换配置
///
/// Missing fields fall back to their defaults when deserialized, so a partial
/// document such as `{"user_label": "Human"}` is valid.
///
/// # Examples
///
/// ```
/// use parley_llm::config::{CompletionPromptOptions, InputFormat};
///
/// let options = CompletionPromptOptions::default()
///     .with_input_format(InputFormat::Prompt)
///     .with_user_label("Human");
/// assert_eq!(options.user_label(), "Human");
/// assert_eq!(options.assistant_label(), "assistant");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionPromptOptions {
    pub input_format: InputFormat,
    pub user_label: String,
    pub assistant_label: String,
}

impl Default for CompletionPromptOptions {
    fn default() -> Self {
        Self {
            input_format: InputFormat::default(),
            user_label: DEFAULT_USER_LABEL.to_string(),
            assistant_label: DEFAULT_ASSISTANT_LABEL.to_string(),
        }
    }
}

impl CompletionPromptOptions {
    pub fn with_input_format(mut self, input_format: InputFormat) -> Self {
        self.input_format = input_format;
        self
    }

    pub fn with_user_label(mut self, label: impl Into<String>) -> Self {
        self.user_label = label.into();
        self
    }

    pub fn with_assistant_label(mut self, label: impl Into<String>) -> Self {
        self.assistant_label = label.into();
        self
    }

    /// 用户标签 为空时回退到 `user`
    pub fn user_label(&self) -> &str {
        non_empty_or(&self.user_label, DEFAULT_USER_LABEL)
    }

    /// 助手标签 为空时回退到 `assistant`
    pub fn assistant_label(&self) -> &str {
        non_empty_or(&self.assistant_label, DEFAULT_ASSISTANT_LABEL)
    }
}

fn non_empty_or<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.is_empty() { fallback } else { value }
}
