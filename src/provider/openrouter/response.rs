use chrono::DateTime;

use crate::error::LLMError;
use crate::types::{
    ContentBlock, FinishReason, LogProb, ReasoningBlock, Response, ResponseInfo, TokenLogProb,
    Usage,
};

use super::types::{ChatResponse, ChatUsage, CompletionLogProbs, LogProbs, WireTopLogProb};

/// Maps a wire finish reason onto [`FinishReason`].
///
/// Total and lossy: absent, empty and unrecognized values all become
/// [`FinishReason::Unknown`].
pub fn decode_finish_reason(reason: Option<&str>) -> FinishReason {
    match reason.unwrap_or_default() {
        "stop" => FinishReason::Stop,
        "length" => FinishReason::Length,
        "content_filter" => FinishReason::ContentFilter,
        "function_call" | "tool_calls" => FinishReason::ToolCalls,
        _ => FinishReason::Unknown,
    }
}

/// Decodes chat-style log probabilities. Absent input yields an empty list.
pub fn decode_logprobs(logprobs: Option<&LogProbs>) -> Vec<LogProb> {
    let Some(content) = logprobs.and_then(|logprobs| logprobs.content.as_ref()) else {
        return Vec::new();
    };
    content
        .iter()
        .map(|item| LogProb {
            token: item.token.clone(),
            log_prob: item.logprob,
            top_log_probs: decode_top_logprobs(
                item.top_logprobs.as_deref().unwrap_or_default(),
            ),
        })
        .collect()
}

fn decode_top_logprobs(top: &[WireTopLogProb]) -> Vec<TokenLogProb> {
    top.iter()
        .map(|entry| TokenLogProb {
            token: entry.token.clone(),
            log_prob: entry.logprob,
        })
        .collect()
}

/// Decodes completion-style parallel arrays.
///
/// A token without a log-prob value gets `0.0`; a token without a top-log-prob
/// map gets an empty list. Top entries are ordered by descending probability,
/// ties broken by token text, since the wire map carries no order.
pub fn decode_completion_logprobs(logprobs: Option<&CompletionLogProbs>) -> Vec<LogProb> {
    let Some(logprobs) = logprobs else {
        return Vec::new();
    };
    let tokens = logprobs.tokens.as_deref().unwrap_or_default();
    let token_logprobs = logprobs.token_logprobs.as_deref().unwrap_or_default();
    tokens
        .iter()
        .enumerate()
        .map(|(index, token)| LogProb {
            token: token.clone(),
            log_prob: token_logprobs.get(index).copied().flatten().unwrap_or(0.0),
            top_log_probs: completion_top_logprobs(logprobs, index),
        })
        .collect()
}

fn completion_top_logprobs(logprobs: &CompletionLogProbs, index: usize) -> Vec<TokenLogProb> {
    let Some(map) = logprobs
        .top_logprobs
        .as_ref()
        .and_then(|top| top.get(index))
        .and_then(Option::as_ref)
    else {
        return Vec::new();
    };

    let mut entries: Vec<TokenLogProb> = map
        .iter()
        .map(|(token, log_prob)| TokenLogProb {
            token: token.clone(),
            log_prob: *log_prob,
        })
        .collect();
    entries.sort_by(|a, b| {
        b.log_prob
            .total_cmp(&a.log_prob)
            .then_with(|| a.token.cmp(&b.token))
    });
    entries
}

pub fn decode_usage(usage: &ChatUsage) -> Usage {
    Usage {
        input_tokens: usage.prompt_tokens,
        output_tokens: usage.completion_tokens,
        reasoning_tokens: usage
            .completion_tokens_details
            .as_ref()
            .map_or(0, |details| details.reasoning_tokens),
        cached_tokens: usage
            .prompt_tokens_details
            .as_ref()
            .map_or(0, |details| details.cached_tokens),
    }
}

/// Converts a chat completion body into a [`Response`].
///
/// Only the first choice is read. Its content becomes, in order, a reasoning
/// block, a text block and one block per tool call; empty reasoning and text are
/// skipped.
///
/// # Errors
///
/// Returns [`LLMError::NoContentGenerated`] when the body has no choices.
pub fn decode_response(response: ChatResponse) -> Result<Response, LLMError> {
    let ChatResponse {
        id,
        model,
        created,
        choices,
        usage,
        ..
    } = response;

    let Some(choice) = choices.into_iter().next() else {
        return Err(LLMError::NoContentGenerated {
            message: "no choices in response".to_string(),
        });
    };

    let mut content = Vec::new();
    if let Some(reasoning) = choice.message.reasoning.filter(|text| !text.is_empty()) {
        content.push(ContentBlock::Reasoning(ReasoningBlock {
            text: reasoning,
            ..ReasoningBlock::default()
        }));
    }
    if let Some(text) = choice.message.content.filter(|text| !text.is_empty()) {
        content.push(ContentBlock::text(text));
    }
    content.extend(choice.message.tool_calls.into_iter().flatten().map(|call| {
        ContentBlock::tool_call(call.id, call.function.name, call.function.arguments)
    }));

    Ok(Response {
        content,
        finish_reason: Some(decode_finish_reason(choice.finish_reason.as_deref())),
        usage: usage.as_ref().map(decode_usage).unwrap_or_default(),
        log_probs: decode_logprobs(choice.logprobs.as_ref()),
        response_info: Some(ResponseInfo {
            id,
            timestamp: created.and_then(|secs| DateTime::from_timestamp(secs, 0)),
            model_id: model,
        }),
        ..Response::default()
    })
}

/// Parses and decodes a raw chat completion body.
pub fn parse_response(body: &str) -> Result<Response, LLMError> {
    let response: ChatResponse =
        serde_json::from_str(body).map_err(|err| LLMError::json_parse(body, err))?;
    decode_response(response)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::provider::openrouter::types::{CompletionTokensDetails, PromptTokensDetails};

    #[test]
    fn finish_reasons_are_total() {
        assert_eq!(decode_finish_reason(Some("stop")), FinishReason::Stop);
        assert_eq!(decode_finish_reason(Some("length")), FinishReason::Length);
        assert_eq!(
            decode_finish_reason(Some("content_filter")),
            FinishReason::ContentFilter
        );
        assert_eq!(
            decode_finish_reason(Some("function_call")),
            FinishReason::ToolCalls
        );
        assert_eq!(
            decode_finish_reason(Some("tool_calls")),
            FinishReason::ToolCalls
        );
        assert_eq!(decode_finish_reason(Some("")), FinishReason::Unknown);
        assert_eq!(decode_finish_reason(Some("eos")), FinishReason::Unknown);
        assert_eq!(decode_finish_reason(Some("error")), FinishReason::Unknown);
        assert_eq!(decode_finish_reason(None), FinishReason::Unknown);
    }

    #[test]
    fn absent_logprobs_decode_to_empty_lists() {
        assert!(decode_logprobs(None).is_empty());
        assert!(decode_logprobs(Some(&LogProbs::default())).is_empty());
        assert!(decode_completion_logprobs(None).is_empty());
    }

    #[test]
    fn completion_logprobs_fill_gaps() {
        let logprobs = CompletionLogProbs {
            tokens: Some(vec!["Hello".into(), " world".into(), "!".into()]),
            token_logprobs: Some(vec![Some(-0.1), None]),
            top_logprobs: Some(vec![Some(HashMap::from([
                ("Hi".to_string(), -1.5),
                ("Hello".to_string(), -0.1),
                ("Hey".to_string(), -1.5),
            ]))]),
        };
        let decoded = decode_completion_logprobs(Some(&logprobs));
        assert_eq!(decoded.len(), 3);
        assert_eq!(decoded[0].log_prob, -0.1);
        let top: Vec<_> = decoded[0]
            .top_log_probs
            .iter()
            .map(|entry| entry.token.as_str())
            .collect();
        assert_eq!(top, ["Hello", "Hey", "Hi"]);
        assert_eq!(decoded[1].log_prob, 0.0);
        assert!(decoded[1].top_log_probs.is_empty());
        assert_eq!(decoded[2].log_prob, 0.0);
        assert!(decoded[2].top_log_probs.is_empty());
    }

    #[test]
    fn usage_reads_token_details() {
        let usage = ChatUsage {
            prompt_tokens: 12,
            completion_tokens: 30,
            total_tokens: 42,
            prompt_tokens_details: Some(PromptTokensDetails { cached_tokens: 4 }),
            completion_tokens_details: Some(CompletionTokensDetails {
                reasoning_tokens: 20,
            }),
        };
        assert_eq!(
            decode_usage(&usage),
            Usage {
                input_tokens: 12,
                output_tokens: 30,
                reasoning_tokens: 20,
                cached_tokens: 4,
            }
        );
    }

    #[test]
    fn empty_choices_is_no_content() {
        let err = decode_response(ChatResponse::default()).unwrap_err();
        assert!(matches!(err, LLMError::NoContentGenerated { .. }));
    }

    #[test]
    fn malformed_body_is_a_json_parse_error() {
        let err = parse_response("{not json").unwrap_err();
        match err {
            LLMError::JsonParse { text, .. } => assert_eq!(text, "{not json"),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
