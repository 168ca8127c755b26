//! 面向多供应商的 LLM 对话模型与编解码库
//!
//! The crate has three layers:
//! - [`types`]: the provider-neutral conversation model and stream events.
//! - [`builder`]: [`ResponseBuilder`], which folds a stream of events into one [`Response`].
//! - [`provider`]: the [`LanguageModel`] boundary and the OpenRouter wire codecs.

pub mod builder;
pub mod config;
pub mod error;
pub mod provider;
pub mod stream;
pub mod types;

pub use builder::{ResponseBuilder, stream_to_response};
pub use config::{CompletionPromptOptions, InputFormat};
pub use error::{AggregationError, ApiCallError, LLMError, StreamFailure};
pub use provider::{CallOptions, EventStream, LanguageModel, StreamResponse};
pub use types::*;
