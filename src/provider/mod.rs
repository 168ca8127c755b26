use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures_core::Stream;
use serde::{Deserialize, Serialize};

use crate::error::LLMError;
use crate::types::{Message, Response, StreamEvent, StreamMetadata};

pub mod mock;
pub mod openrouter;
pub(crate) mod retry;

pub use retry::{is_retryable_status, retry_after_from_headers};

/// 流式事件别名 事件按到达顺序产出
pub type EventStream = Pin<Box<dyn Stream<Item = StreamEvent> + Send>>;

/// 一次流式调用的结果 元数据在流开始时即已知
pub struct StreamResponse {
    pub metadata: StreamMetadata,
    pub events: EventStream,
}

impl StreamResponse {
    pub fn new(events: EventStream) -> Self {
        Self {
            metadata: StreamMetadata::default(),
            events,
        }
    }

    pub fn with_metadata(mut self, metadata: StreamMetadata) -> Self {
        self.metadata = metadata;
        self
    }
}

impl std::fmt::Debug for StreamResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamResponse")
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}

/// 调用参数 仅为纯数据 如何组装由调用方决定
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CallOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stop_sequences: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    /// 额外请求头 由传输层负责发送
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, String>,
}

/// 统一的模型 Trait 所有供应商实现该接口即可接入
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// 供应商名称
    fn provider_name(&self) -> &str;

    /// 模型 ID
    fn model_id(&self) -> &str;

    /// 提交完整请求并等待完整响应
    async fn generate(&self, prompt: &[Message], options: &CallOptions)
    -> Result<Response, LLMError>;

    /// 以流式方式返回增量事件
    async fn stream(
        &self,
        prompt: &[Message],
        options: &CallOptions,
    ) -> Result<StreamResponse, LLMError>;
}

/// 线程安全模型
pub type DynLanguageModel = Arc<dyn LanguageModel>;
