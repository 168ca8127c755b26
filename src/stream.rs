use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures_core::Stream;

use crate::error::LLMError;

/// Raw response body delivered by the transport, chunked arbitrarily.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>, LLMError>> + Send>>;

/// One server-sent event frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseFrame {
    /// Joined `data:` payload of one event.
    Data(String),
    /// Terminal `[DONE]` marker.
    Done,
}

/// Splits a byte stream into [`SseFrame`]s.
///
/// Only `data:` fields are kept; comments and other fields such as `event:` or
/// `id:` are ignored. Multi-line payloads are joined with `\n`. After `[DONE]`
/// the decoder stops polling the body.
pub struct SseDecoder {
    body: ByteStream,
    partial_line: Vec<u8>,
    payload: Option<Vec<u8>>,
    frames: VecDeque<Result<SseFrame, LLMError>>,
    eof: bool,
    saw_done: bool,
}

impl SseDecoder {
    pub fn new(body: ByteStream) -> Self {
        Self {
            body,
            partial_line: Vec::new(),
            payload: None,
            frames: VecDeque::new(),
            eof: false,
            saw_done: false,
        }
    }

    /// Feeds one complete line. A blank line dispatches the buffered payload.
    fn push_line(&mut self, mut line: &[u8]) {
        if let Some(stripped) = line.strip_suffix(b"\r") {
            line = stripped;
        }
        if line.is_empty() {
            self.dispatch();
            return;
        }
        let Some(value) = line.strip_prefix(b"data:") else {
            return;
        };
        let value = value.strip_prefix(b" ").unwrap_or(value);
        match self.payload.as_mut() {
            Some(payload) => {
                payload.push(b'\n');
                payload.extend_from_slice(value);
            }
            None => self.payload = Some(value.to_vec()),
        }
    }

    fn dispatch(&mut self) {
        let Some(payload) = self.payload.take().filter(|payload| !payload.is_empty()) else {
            return;
        };
        // Anything after the terminal marker is dropped, even within one chunk.
        if self.saw_done {
            return;
        }
        let frame = match String::from_utf8(payload) {
            Ok(data) if data.trim() == "[DONE]" => {
                self.saw_done = true;
                Ok(SseFrame::Done)
            }
            Ok(data) => Ok(SseFrame::Data(data)),
            Err(err) => Err(LLMError::Stream {
                message: format!("invalid UTF-8 in stream chunk: {err}"),
            }),
        };
        self.frames.push_back(frame);
    }

    fn feed(&mut self, bytes: &[u8]) {
        self.partial_line.extend_from_slice(bytes);
        while let Some(end) = self.partial_line.iter().position(|byte| *byte == b'\n') {
            let line: Vec<u8> = self.partial_line.drain(..=end).collect();
            self.push_line(&line[..end]);
        }
    }

    fn close(&mut self) {
        self.eof = true;
        let rest = std::mem::take(&mut self.partial_line);
        if !rest.is_empty() {
            self.push_line(&rest);
        }
        self.dispatch();
    }
}

impl Stream for SseDecoder {
    type Item = Result<SseFrame, LLMError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            if let Some(frame) = this.frames.pop_front() {
                return Poll::Ready(Some(frame));
            }
            if this.eof || this.saw_done {
                return Poll::Ready(None);
            }

            match this.body.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(bytes))) => this.feed(&bytes),
                Poll::Ready(Some(Err(err))) => return Poll::Ready(Some(Err(err))),
                Poll::Ready(None) => this.close(),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use futures_util::StreamExt;
    use futures_util::stream;

    use super::*;

    fn body(chunks: Vec<Result<Vec<u8>, LLMError>>) -> ByteStream {
        Box::pin(stream::iter(chunks))
    }

    #[tokio::test]
    async fn decoder_emits_data_and_done_frames() {
        let chunks = vec![
            Ok(b"data: {\"text\":\"hi\"}\n\n".to_vec()),
            Ok(b"data: [DONE]\n\n".to_vec()),
            Ok(b"data: ignored\n\n".to_vec()),
        ];
        let mut decoder = SseDecoder::new(body(chunks));

        let first = decoder.next().await.expect("frame").expect("ok");
        assert_eq!(first, SseFrame::Data("{\"text\":\"hi\"}".to_string()));
        let second = decoder.next().await.expect("frame").expect("ok");
        assert_eq!(second, SseFrame::Done);
        assert!(decoder.next().await.is_none());
    }

    #[tokio::test]
    async fn decoder_drops_frames_after_done_in_same_chunk() {
        let chunks = vec![Ok(b"data: a\n\ndata: [DONE]\n\ndata: b\n\n".to_vec())];
        let frames: Vec<_> = SseDecoder::new(body(chunks))
            .map(|frame| frame.expect("ok"))
            .collect()
            .await;
        assert_eq!(frames, vec![SseFrame::Data("a".to_string()), SseFrame::Done]);
    }

    #[tokio::test]
    async fn decoder_joins_multiline_payloads_and_split_chunks() {
        let chunks = vec![
            Ok(b": keep-alive\r\n\r\ndata: line ".to_vec()),
            Ok(b"one\r\ndata: line two\r\n\r\n".to_vec()),
        ];
        let mut decoder = SseDecoder::new(body(chunks));
        let frame = decoder.next().await.expect("frame").expect("ok");
        assert_eq!(frame, SseFrame::Data("line one\nline two".to_string()));
        assert!(decoder.next().await.is_none());
    }

    #[tokio::test]
    async fn decoder_flushes_unterminated_event_at_eof() {
        let mut decoder = SseDecoder::new(body(vec![Ok(b"data: tail".to_vec())]));
        let frame = decoder.next().await.expect("frame").expect("ok");
        assert_eq!(frame, SseFrame::Data("tail".to_string()));
        assert!(decoder.next().await.is_none());
    }

    #[tokio::test]
    async fn decoder_reports_utf8_and_transport_errors() {
        let mut decoder = SseDecoder::new(body(vec![Ok(b"data: \xff\n\n".to_vec())]));
        let err = decoder.next().await.expect("frame").unwrap_err();
        assert!(matches!(err, LLMError::Stream { .. }));

        let mut decoder = SseDecoder::new(body(vec![Err(LLMError::transport("reset"))]));
        let err = decoder.next().await.expect("frame").unwrap_err();
        assert!(matches!(err, LLMError::Transport { .. }));
    }
}
