//! Scripted [`LanguageModel`] for tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use futures_util::stream;

use crate::error::LLMError;
use crate::types::{Message, Response, StreamEvent, StreamMetadata};

use super::{CallOptions, LanguageModel, StreamResponse};

/// One scripted reply to [`LanguageModel::generate`].
pub type MockResult = Result<Response, LLMError>;

/// Replays queued results in order.
///
/// Once the `generate` queue is drained further calls return an empty
/// [`Response`]; once the stream queue is drained further calls return a stream
/// with no events.
///
/// # Examples
///
/// ```
/// use parley_llm::provider::mock::MockLanguageModel;
/// use parley_llm::provider::{CallOptions, LanguageModel};
/// use parley_llm::error::LLMError;
/// use parley_llm::types::{ContentBlock, Message, Response};
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let model = MockLanguageModel::new(vec![
///     Ok(Response { content: vec![ContentBlock::text("Hello")], ..Response::default() }),
///     Err(LLMError::transport("rate limit exceeded")),
/// ]);
/// let prompt = [Message::user_text("hi")];
/// let options = CallOptions::default();
///
/// assert_eq!(model.generate(&prompt, &options).await.unwrap().text(), "Hello");
/// assert!(model.generate(&prompt, &options).await.is_err());
/// assert_eq!(model.call_count(), 2);
/// # });
/// ```
#[derive(Debug)]
pub struct MockLanguageModel {
    provider_name: String,
    model_id: String,
    results: Mutex<VecDeque<MockResult>>,
    streams: Mutex<VecDeque<(StreamMetadata, Vec<StreamEvent>)>>,
    prompts: Mutex<Vec<Vec<Message>>>,
    call_count: AtomicUsize,
    stream_call_count: AtomicUsize,
}

impl MockLanguageModel {
    pub fn new(results: Vec<MockResult>) -> Self {
        Self {
            provider_name: "mock-provider".to_string(),
            model_id: "mock-model".to_string(),
            results: Mutex::new(results.into()),
            streams: Mutex::new(VecDeque::new()),
            prompts: Mutex::new(Vec::new()),
            call_count: AtomicUsize::new(0),
            stream_call_count: AtomicUsize::new(0),
        }
    }

    pub fn with_provider_name(mut self, name: impl Into<String>) -> Self {
        self.provider_name = name.into();
        self
    }

    pub fn with_model_id(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = model_id.into();
        self
    }

    /// Queues an event sequence for the next `stream` call.
    pub fn with_stream(self, events: Vec<StreamEvent>) -> Self {
        self.with_stream_metadata(StreamMetadata::default(), events)
    }

    pub fn with_stream_metadata(self, metadata: StreamMetadata, events: Vec<StreamEvent>) -> Self {
        lock(&self.streams).push_back((metadata, events));
        self
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    pub fn stream_call_count(&self) -> usize {
        self.stream_call_count.load(Ordering::SeqCst)
    }

    /// Scripted `generate` results not consumed yet.
    pub fn remaining(&self) -> usize {
        lock(&self.results).len()
    }

    /// Prompts received so far, across both entry points.
    pub fn prompts(&self) -> Vec<Vec<Message>> {
        lock(&self.prompts).clone()
    }

    fn record(&self, prompt: &[Message]) {
        lock(&self.prompts).push(prompt.to_vec());
    }
}

#[async_trait]
impl LanguageModel for MockLanguageModel {
    fn provider_name(&self) -> &str {
        &self.provider_name
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn generate(
        &self,
        prompt: &[Message],
        _options: &CallOptions,
    ) -> Result<Response, LLMError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        self.record(prompt);
        lock(&self.results)
            .pop_front()
            .unwrap_or_else(|| Ok(Response::default()))
    }

    async fn stream(
        &self,
        prompt: &[Message],
        _options: &CallOptions,
    ) -> Result<StreamResponse, LLMError> {
        self.stream_call_count.fetch_add(1, Ordering::SeqCst);
        self.record(prompt);
        let (metadata, events) = lock(&self.streams).pop_front().unwrap_or_default();
        Ok(StreamResponse::new(Box::pin(stream::iter(events))).with_metadata(metadata))
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
