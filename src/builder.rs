//! Folds an ordered sequence of [`StreamEvent`]s into one [`Response`].
//!
//! The builder trusts arrival order: it never reorders events, it only rejects
//! the ones that would leave the response inconsistent. It is not safe for
//! concurrent mutation; callers sharing a builder across producers must
//! serialize calls to [`ResponseBuilder::add_event`] themselves, e.g. by
//! funnelling every event through a single consumer.

use std::collections::HashMap;

use futures_util::StreamExt;
use tracing::{debug, trace, warn};

use crate::error::{AggregationError, LLMError, StreamFailure};
use crate::provider::StreamResponse;
use crate::types::{
    ContentBlock, FileBlock, ReasoningBlock, RedactedReasoningBlock, Response, ResponseInfo,
    SourceBlock, StreamEvent, StreamMetadata, ToolCallBlock,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    None,
    Text,
    Reasoning,
    ToolCall,
    Source,
    File,
    Finished,
}

impl State {
    fn name(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Text => "text",
            Self::Reasoning => "reasoning",
            Self::ToolCall => "tool-call",
            Self::Source => "source",
            Self::File => "file",
            Self::Finished => "finished",
        }
    }
}

/// Stateful aggregator turning stream events into a [`Response`].
///
/// Tool calls keep the position at which their ID was first seen, whether via
/// [`StreamEvent::ToolCall`] or [`StreamEvent::ToolCallDelta`]; later deltas for
/// the same ID append to that entry's raw argument buffer.
///
/// # Examples
///
/// ```
/// # use parley_llm::builder::ResponseBuilder;
/// # use parley_llm::types::{ContentBlock, StreamEvent};
/// let mut builder = ResponseBuilder::new();
/// builder.add_event(StreamEvent::text_delta("Hello ")).unwrap();
/// builder.add_event(StreamEvent::text_delta("World")).unwrap();
/// let response = builder.build().unwrap();
/// assert_eq!(response.content, vec![ContentBlock::text("Hello World")]);
/// ```
#[derive(Debug)]
pub struct ResponseBuilder {
    response: Response,
    /// Tool-call ID to its slot in `response.content`. Both are updated together.
    tool_call_slots: HashMap<String, usize>,
    state: State,
    response_id: Option<String>,
    error: Option<String>,
}

impl Default for ResponseBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseBuilder {
    pub fn new() -> Self {
        Self {
            response: Response::default(),
            tool_call_slots: HashMap::new(),
            state: State::None,
            response_id: None,
            error: None,
        }
    }

    /// Applies one event.
    ///
    /// A rejected event leaves the builder unchanged, so [`ResponseBuilder::build`]
    /// still returns everything aggregated before it.
    pub fn add_event(&mut self, event: StreamEvent) -> Result<(), AggregationError> {
        let kind = event.kind();
        if self.state == State::Finished {
            debug!(event = kind, "rejecting event received after finish");
            return Err(AggregationError::AfterFinish { event: kind });
        }

        let result = self.apply(event);
        match &result {
            Ok(()) => trace!(event = kind, state = self.state.name(), "stream event applied"),
            Err(err) => debug!(event = kind, state = self.state.name(), %err, "stream event rejected"),
        }
        result
    }

    fn apply(&mut self, event: StreamEvent) -> Result<(), AggregationError> {
        match event {
            StreamEvent::TextDelta { text } => {
                self.add_text_delta(text);
                Ok(())
            }
            StreamEvent::Reasoning { text } => self.add_reasoning(text),
            StreamEvent::ReasoningSignature { signature } => self.add_reasoning_signature(signature),
            StreamEvent::RedactedReasoning { data } => self.add_redacted_reasoning(data),
            StreamEvent::ToolCall {
                tool_call_id,
                tool_name,
                args,
            } => self.add_tool_call(tool_call_id, tool_name, args),
            StreamEvent::ToolCallDelta {
                tool_call_id,
                tool_name,
                args_delta,
            } => {
                self.add_tool_call_delta(tool_call_id, tool_name, &args_delta);
                Ok(())
            }
            StreamEvent::Source { source } => {
                self.state = State::Source;
                self.response
                    .content
                    .push(ContentBlock::Source(SourceBlock::from(source)));
                Ok(())
            }
            StreamEvent::File { media_type, data } => {
                self.state = State::File;
                self.response.content.push(ContentBlock::File(FileBlock {
                    data: Some(data),
                    media_type: Some(media_type),
                    ..FileBlock::default()
                }));
                Ok(())
            }
            StreamEvent::ResponseMetadata {
                id,
                model_id,
                timestamp,
            } => self.add_response_metadata(id, model_id, timestamp),
            StreamEvent::Finish {
                finish_reason,
                usage,
                provider_metadata,
                log_probs,
            } => {
                self.state = State::Finished;
                self.response.finish_reason = Some(finish_reason);
                if let Some(usage) = usage.filter(|usage| !usage.is_zero()) {
                    self.response.usage = usage;
                }
                if provider_metadata.is_some() {
                    self.response.provider_metadata = provider_metadata;
                }
                if !log_probs.is_empty() {
                    self.response.log_probs = log_probs;
                }
                Ok(())
            }
            StreamEvent::Error { message } => {
                // Not terminal: later events are still accepted until a finish arrives.
                warn!(%message, "stream reported an error");
                self.error = Some(message);
                Ok(())
            }
        }
    }

    fn add_text_delta(&mut self, text: String) {
        self.state = State::Text;
        if let Some(ContentBlock::Text(block)) = self.response.content.last_mut() {
            block.text.push_str(&text);
            return;
        }
        self.response.content.push(ContentBlock::text(text));
    }

    fn add_reasoning(&mut self, text: String) -> Result<(), AggregationError> {
        if let Some(ContentBlock::Reasoning(block)) = self.response.content.last_mut() {
            block.text.push_str(&text);
            self.state = State::Reasoning;
            return Ok(());
        }
        self.ensure_reasoning_allowed("reasoning")?;
        self.state = State::Reasoning;
        self.response
            .content
            .push(ContentBlock::Reasoning(ReasoningBlock {
                text,
                ..ReasoningBlock::default()
            }));
        Ok(())
    }

    fn add_reasoning_signature(&mut self, signature: String) -> Result<(), AggregationError> {
        match self.response.content.last_mut() {
            None => Err(AggregationError::NoReasoningBlock),
            Some(ContentBlock::Reasoning(block)) => {
                block.signature = Some(signature);
                Ok(())
            }
            Some(other) => Err(AggregationError::LastBlockNotReasoning {
                found: other.kind(),
            }),
        }
    }

    fn add_redacted_reasoning(&mut self, data: String) -> Result<(), AggregationError> {
        self.ensure_reasoning_allowed("redacted-reasoning")?;
        self.state = State::Reasoning;
        self.response
            .content
            .push(ContentBlock::RedactedReasoning(RedactedReasoningBlock {
                data,
                provider_metadata: None,
            }));
        Ok(())
    }

    fn ensure_reasoning_allowed(&self, event: &'static str) -> Result<(), AggregationError> {
        match self.state {
            State::None | State::Reasoning => Ok(()),
            other => Err(AggregationError::InvalidTransition {
                event,
                state: other.name(),
            }),
        }
    }

    fn add_tool_call(
        &mut self,
        tool_call_id: String,
        tool_name: String,
        args: String,
    ) -> Result<(), AggregationError> {
        if self.tool_call_slots.contains_key(&tool_call_id) {
            return Err(AggregationError::DuplicateToolCall { id: tool_call_id });
        }
        self.state = State::ToolCall;
        self.push_tool_call(tool_call_id, tool_name, args);
        Ok(())
    }

    fn add_tool_call_delta(&mut self, tool_call_id: String, tool_name: String, args_delta: &str) {
        self.state = State::ToolCall;
        let slot = match self.tool_call_slots.get(&tool_call_id) {
            Some(&slot) => slot,
            None => self.push_tool_call(tool_call_id, tool_name.clone(), String::new()),
        };
        if let Some(ContentBlock::ToolCall(call)) = self.response.content.get_mut(slot) {
            if call.tool_name.is_empty() {
                call.tool_name = tool_name;
            }
            call.args.push_str(args_delta);
        }
    }

    fn push_tool_call(&mut self, tool_call_id: String, tool_name: String, args: String) -> usize {
        let slot = self.response.content.len();
        self.tool_call_slots.insert(tool_call_id.clone(), slot);
        self.response.content.push(ContentBlock::ToolCall(ToolCallBlock {
            tool_call_id,
            tool_name,
            args,
            provider_metadata: None,
        }));
        slot
    }

    fn add_response_metadata(
        &mut self,
        id: String,
        model_id: String,
        timestamp: Option<chrono::DateTime<chrono::Utc>>,
    ) -> Result<(), AggregationError> {
        match &self.response_id {
            Some(expected) if *expected != id => {
                return Err(AggregationError::ResponseIdMismatch {
                    expected: expected.clone(),
                    actual: id,
                });
            }
            Some(_) => {}
            None if !id.is_empty() => self.response_id = Some(id.clone()),
            None => {}
        }

        let info = self
            .response
            .response_info
            .get_or_insert_with(ResponseInfo::default);
        info.id = id;
        if !model_id.is_empty() {
            info.model_id = model_id;
        }
        if timestamp.is_some() {
            info.timestamp = timestamp;
        }
        Ok(())
    }

    /// Merges side-channel data known at stream start.
    ///
    /// Additive: warnings are appended, provider metadata entries merged, and the
    /// remaining fields only overwritten when the source actually carries them.
    /// The event state machine is not affected.
    pub fn add_metadata(&mut self, metadata: StreamMetadata) {
        self.response.warnings.extend(metadata.warnings);
        if !metadata.raw_call.is_empty() {
            self.response.raw_call = metadata.raw_call;
        }
        if metadata.raw_response.is_some() {
            self.response.raw_response = metadata.raw_response;
        }
        if metadata.request_info.is_some() {
            self.response.request_info = metadata.request_info;
        }
        if metadata.response_info.is_some() {
            self.response.response_info = metadata.response_info;
        }
        if let Some(provider_metadata) = metadata.provider_metadata {
            self.response
                .provider_metadata
                .get_or_insert_with(Default::default)
                .merge(provider_metadata);
        }
    }

    /// Response aggregated so far.
    pub fn response(&self) -> &Response {
        &self.response
    }

    pub fn is_finished(&self) -> bool {
        self.state == State::Finished
    }

    /// Seals the response.
    ///
    /// When the stream reported an error, the failure still carries the partial
    /// response so callers can decide whether it is usable.
    pub fn build(self) -> Result<Response, StreamFailure> {
        match self.error {
            Some(message) => Err(StreamFailure {
                message,
                partial: Box::new(self.response),
            }),
            None => Ok(self.response),
        }
    }
}

/// Drains a streamed generation into a single [`Response`].
///
/// The stream's up-front metadata is merged first, then every event is folded in
/// order. A rejected event or a stream-reported error ends the call with an error
/// that still carries the response aggregated so far, see
/// [`LLMError::partial_response`].
#[tracing::instrument(level = "debug", skip_all)]
pub async fn stream_to_response(stream: StreamResponse) -> Result<Response, LLMError> {
    let StreamResponse {
        metadata,
        mut events,
    } = stream;

    let mut builder = ResponseBuilder::new();
    builder.add_metadata(metadata);
    while let Some(event) = events.next().await {
        if let Err(source) = builder.add_event(event) {
            return Err(LLMError::Aggregation {
                source,
                partial: Box::new(builder.response),
            });
        }
    }
    Ok(builder.build()?)
}
