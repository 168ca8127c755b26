use std::collections::{HashMap, VecDeque};
use std::pin::Pin;
use std::task::{Context, Poll};

use chrono::DateTime;
use futures_core::Stream;
use tracing::warn;

use crate::error::LLMError;
use crate::provider::EventStream;
use crate::stream::{ByteStream, SseDecoder, SseFrame};
use crate::types::{LogProb, StreamEvent};

use super::response::{decode_finish_reason, decode_logprobs, decode_usage};
use super::types::{ChatStreamChunk, ChatUsage, ToolCallDelta};

#[derive(Debug, Default)]
struct ToolCallSlot {
    id: String,
    name: String,
}

/// Turns chat stream chunks into [`StreamEvent`]s.
///
/// Finish reason, usage and log probabilities arrive spread over several chunks
/// (usage usually in a trailing chunk without choices), so they are accumulated
/// and released as a single [`StreamEvent::Finish`] by [`ChunkDecoder::finish`].
#[derive(Debug, Default)]
pub struct ChunkDecoder {
    metadata_sent: bool,
    tool_calls: HashMap<usize, ToolCallSlot>,
    finish_reason: Option<String>,
    usage: Option<ChatUsage>,
    log_probs: Vec<LogProb>,
    finished: bool,
}

impl ChunkDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses one `data:` payload.
    pub fn decode_data(&mut self, data: &str) -> Result<Vec<StreamEvent>, LLMError> {
        let chunk: ChatStreamChunk =
            serde_json::from_str(data).map_err(|err| LLMError::json_parse(data, err))?;
        Ok(self.decode_chunk(chunk))
    }

    pub fn decode_chunk(&mut self, chunk: ChatStreamChunk) -> Vec<StreamEvent> {
        let mut events = Vec::new();

        if let Some(error) = chunk.error {
            events.push(StreamEvent::error(error.message));
            return events;
        }

        if !self.metadata_sent && (chunk.id.is_some() || chunk.model.is_some()) {
            self.metadata_sent = true;
            events.push(StreamEvent::ResponseMetadata {
                id: chunk.id.unwrap_or_default(),
                model_id: chunk.model.unwrap_or_default(),
                timestamp: chunk
                    .created
                    .and_then(|secs| DateTime::from_timestamp(secs, 0)),
            });
        }

        if chunk.usage.is_some() {
            self.usage = chunk.usage;
        }

        // Only the first choice is surfaced.
        let Some(choice) = chunk.choices.into_iter().next() else {
            return events;
        };

        if let Some(reasoning) = choice.delta.reasoning.filter(|text| !text.is_empty()) {
            events.push(StreamEvent::Reasoning { text: reasoning });
        }
        if let Some(text) = choice.delta.content.filter(|text| !text.is_empty()) {
            events.push(StreamEvent::text_delta(text));
        }
        for delta in choice.delta.tool_calls.into_iter().flatten() {
            if let Some(event) = self.decode_tool_call_delta(delta) {
                events.push(event);
            }
        }

        self.log_probs
            .extend(decode_logprobs(choice.logprobs.as_ref()));
        if let Some(reason) = choice.finish_reason.filter(|reason| !reason.is_empty()) {
            self.finish_reason = Some(reason);
        }
        events
    }

    /// Tool-call fragments are keyed by wire index. The ID is fixed by the first
    /// fragment at an index, so every fragment lands on the same call even when a
    /// later one carries a different ID. A missing name is filled in once seen.
    fn decode_tool_call_delta(&mut self, delta: ToolCallDelta) -> Option<StreamEvent> {
        let (name, arguments) = delta
            .function
            .map(|function| (function.name, function.arguments))
            .unwrap_or_default();
        let arguments = arguments.unwrap_or_default();

        let is_new = !self.tool_calls.contains_key(&delta.index);
        let slot = self.tool_calls.entry(delta.index).or_default();
        if is_new {
            slot.id = delta.id.unwrap_or_default();
        }
        if slot.name.is_empty() {
            slot.name = name.unwrap_or_default();
        }

        if !is_new && arguments.is_empty() {
            return None;
        }
        Some(StreamEvent::tool_call_delta(
            slot.id.clone(),
            slot.name.clone(),
            arguments,
        ))
    }

    /// Releases the accumulated finish event. Returns `None` after the first call.
    pub fn finish(&mut self) -> Option<StreamEvent> {
        if self.finished {
            return None;
        }
        self.finished = true;
        Some(StreamEvent::Finish {
            finish_reason: decode_finish_reason(self.finish_reason.as_deref()),
            usage: self.usage.as_ref().map(decode_usage),
            provider_metadata: None,
            log_probs: std::mem::take(&mut self.log_probs),
        })
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

/// Decodes an OpenRouter SSE body into stream events.
///
/// The stream ends with a `Finish` event at `[DONE]` or end of body. A malformed
/// chunk or a transport failure ends it early with a single `Error` event.
pub fn event_stream(body: ByteStream) -> EventStream {
    Box::pin(ChatEventStream {
        frames: SseDecoder::new(body),
        decoder: ChunkDecoder::new(),
        pending: VecDeque::new(),
        done: false,
    })
}

struct ChatEventStream {
    frames: SseDecoder,
    decoder: ChunkDecoder,
    pending: VecDeque<StreamEvent>,
    done: bool,
}

impl ChatEventStream {
    fn fail(&mut self, err: LLMError) {
        warn!(%err, "chat stream terminated early");
        self.pending.push_back(StreamEvent::error(err.to_string()));
        self.done = true;
    }
}

impl Stream for ChatEventStream {
    type Item = StreamEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            if let Some(event) = this.pending.pop_front() {
                return Poll::Ready(Some(event));
            }
            if this.done {
                return Poll::Ready(None);
            }

            match Pin::new(&mut this.frames).poll_next(cx) {
                Poll::Ready(Some(Ok(SseFrame::Data(data)))) => {
                    match this.decoder.decode_data(&data) {
                        Ok(events) => this.pending.extend(events),
                        Err(err) => this.fail(err),
                    }
                }
                Poll::Ready(Some(Ok(SseFrame::Done))) | Poll::Ready(None) => {
                    this.pending.extend(this.decoder.finish());
                    this.done = true;
                }
                Poll::Ready(Some(Err(err))) => this.fail(err),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
