use std::collections::HashMap;

use parley_llm::error::LLMError;
use parley_llm::provider::openrouter::types::{
    ChatResponse, CompletionLogProbs, ContentPart, ImageUrl, LogProbs, UserContent, WireMessage,
};
use parley_llm::provider::openrouter::{
    FailedResponse, decode_completion_logprobs, decode_error, decode_logprobs, decode_response,
    encode_prompt, parse_response,
};
use parley_llm::types::{
    ContentBlock, FinishReason, ImageBlock, Message, ReasoningBlock, SourceBlock,
    ToolResultBlock, Usage,
};
use serde_json::json;

#[test]
fn single_text_user_message_encodes_as_string() {
    let prompt = encode_prompt(&[Message::user_text("hello")]).expect("encode");
    assert_eq!(
        serde_json::to_value(&prompt).expect("serialize"),
        json!([{ "role": "user", "content": "hello" }])
    );
}

#[test]
fn multi_block_user_message_encodes_as_parts() {
    let prompt = encode_prompt(&[Message::user(vec![
        ContentBlock::text("hi"),
        ContentBlock::image_url("https://example.com/cat.png"),
    ])])
    .expect("encode");

    assert_eq!(
        prompt,
        vec![WireMessage::User {
            content: UserContent::Parts(vec![
                ContentPart::Text { text: "hi".into() },
                ContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url: "https://example.com/cat.png".into()
                    }
                },
            ])
        }]
    );
    assert_eq!(
        serde_json::to_value(&prompt).expect("serialize"),
        json!([{
            "role": "user",
            "content": [
                { "type": "text", "text": "hi" },
                { "type": "image_url", "image_url": { "url": "https://example.com/cat.png" } }
            ]
        }])
    );
}

#[test]
fn single_image_block_still_uses_parts() {
    let prompt = encode_prompt(&[Message::user(vec![ContentBlock::Image(
        ImageBlock::from_data(b"png".to_vec(), Some("image/png".into())),
    )])])
    .expect("encode");
    assert_eq!(
        serde_json::to_value(&prompt).expect("serialize"),
        json!([{
            "role": "user",
            "content": [{ "type": "image_url", "image_url": { "url": "data:image/png;base64,cG5n" } }]
        }])
    );
}

#[test]
fn full_conversation_encodes_with_tool_fan_out() {
    let prompt = encode_prompt(&[
        Message::system("be brief"),
        Message::user_text("weather in Paris and Rome?"),
        Message::assistant(vec![
            ContentBlock::text("Checking "),
            ContentBlock::text("now."),
            ContentBlock::tool_call("call_1", "weather", r#"{"city":"Paris"}"#),
            ContentBlock::tool_call("call_2", "weather", r#"{"city":"Rome"}"#),
        ]),
        Message::tool(vec![
            ToolResultBlock::new("call_1", "weather", json!({ "temp": 21 })),
            ToolResultBlock::new("call_2", "weather", json!({ "temp": 25 })),
        ]),
        Message::tool(Vec::new()),
    ])
    .expect("encode");

    assert_eq!(
        serde_json::to_value(&prompt).expect("serialize"),
        json!([
            { "role": "system", "content": "be brief" },
            { "role": "user", "content": "weather in Paris and Rome?" },
            {
                "role": "assistant",
                "content": "Checking now.",
                "tool_calls": [
                    { "type": "function", "id": "call_1",
                      "function": { "name": "weather", "arguments": "{\"city\":\"Paris\"}" } },
                    { "type": "function", "id": "call_2",
                      "function": { "name": "weather", "arguments": "{\"city\":\"Rome\"}" } }
                ]
            },
            { "role": "tool", "content": "{\"temp\":21}", "tool_call_id": "call_1" },
            { "role": "tool", "content": "{\"temp\":25}", "tool_call_id": "call_2" }
        ])
    );
}

#[test]
fn unsupported_blocks_name_the_offender() {
    let err = encode_prompt(&[Message::user(vec![
        ContentBlock::text("a"),
        ContentBlock::tool_call("call_1", "t", "{}"),
    ])])
    .unwrap_err();
    assert!(matches!(
        err,
        LLMError::UnsupportedContent {
            message_role: "user",
            block: "tool-call"
        }
    ));

    let err = encode_prompt(&[Message::assistant(vec![ContentBlock::Reasoning(
        ReasoningBlock::default(),
    )])])
    .unwrap_err();
    assert_eq!(
        err.to_string(),
        "unsupported reasoning block in assistant message"
    );

    let err = encode_prompt(&[Message::assistant(vec![ContentBlock::Source(
        SourceBlock::default(),
    )])])
    .unwrap_err();
    assert!(matches!(
        err,
        LLMError::UnsupportedContent {
            block: "source",
            ..
        }
    ));
}

#[test]
fn decode_response_orders_reasoning_text_then_tool_calls() {
    let body: ChatResponse = serde_json::from_value(json!({
        "id": "gen-123",
        "object": "chat.completion",
        "created": 1_700_000_000,
        "model": "anthropic/claude-3.5-sonnet",
        "choices": [{
            "index": 0,
            "message": {
                "role": "assistant",
                "content": "Let me check.",
                "reasoning": "User wants weather.",
                "tool_calls": [{
                    "id": "call_9", "type": "function",
                    "function": { "name": "weather", "arguments": "{\"city\":\"Oslo\"}" }
                }]
            },
            "finish_reason": "tool_calls"
        }],
        "usage": { "prompt_tokens": 20, "completion_tokens": 8, "total_tokens": 28 }
    }))
    .expect("wire response");

    let response = decode_response(body).expect("decode");
    let kinds: Vec<_> = response.content.iter().map(ContentBlock::kind).collect();
    assert_eq!(kinds, ["reasoning", "text", "tool-call"]);
    assert_eq!(response.text(), "Let me check.");
    assert_eq!(response.tool_calls()[0].args, r#"{"city":"Oslo"}"#);
    assert_eq!(response.finish_reason, Some(FinishReason::ToolCalls));
    assert_eq!(
        response.usage,
        Usage {
            input_tokens: 20,
            output_tokens: 8,
            ..Usage::default()
        }
    );
    let info = response.response_info.expect("response info");
    assert_eq!(info.id, "gen-123");
    assert_eq!(info.model_id, "anthropic/claude-3.5-sonnet");
    assert_eq!(info.timestamp.map(|ts| ts.timestamp()), Some(1_700_000_000));
    assert!(response.log_probs.is_empty());
}

#[test]
fn null_arrays_in_response_body_are_treated_as_empty() {
    let response = parse_response(
        r#"{"id":"gen-9","model":"openai/gpt-4o","choices":[{"index":0,"message":{"role":"assistant","content":"hi","tool_calls":null},"logprobs":{"content":[{"token":"hi","logprob":-0.1,"top_logprobs":null}]},"finish_reason":"stop"}]}"#,
    )
    .expect("null arrays decode");

    assert_eq!(response.content, vec![ContentBlock::text("hi")]);
    assert_eq!(response.finish_reason, Some(FinishReason::Stop));
    assert_eq!(response.log_probs.len(), 1);
    assert!(response.log_probs[0].top_log_probs.is_empty());

    let completion: CompletionLogProbs = serde_json::from_value(json!({
        "tokens": ["a"],
        "token_logprobs": null,
        "top_logprobs": null
    }))
    .expect("null completion arrays decode");
    let decoded = decode_completion_logprobs(Some(&completion));
    assert_eq!(decoded.len(), 1);
    assert_eq!(decoded[0].log_prob, 0.0);
}

#[test]
fn chat_logprobs_decode_in_order() {
    let logprobs: LogProbs = serde_json::from_value(json!({
        "content": [
            { "token": "Hi", "logprob": -0.2, "top_logprobs": [
                { "token": "Hi", "logprob": -0.2 }, { "token": "Hello", "logprob": -1.7 }
            ] },
            { "token": "!", "logprob": -0.01 }
        ]
    }))
    .expect("wire logprobs");

    let decoded = decode_logprobs(Some(&logprobs));
    assert_eq!(decoded.len(), 2);
    assert_eq!(decoded[0].token, "Hi");
    assert_eq!(decoded[0].top_log_probs.len(), 2);
    assert_eq!(decoded[0].top_log_probs[1].token, "Hello");
    assert!(decoded[1].top_log_probs.is_empty());
}

#[test]
fn logprob_decoders_are_total() {
    assert_eq!(decode_logprobs(None), Vec::new());
    assert_eq!(decode_completion_logprobs(None), Vec::new());

    let short = CompletionLogProbs {
        tokens: Some(vec!["a".into(), "b".into()]),
        token_logprobs: Some(vec![Some(-0.3)]),
        top_logprobs: Some(vec![None]),
    };
    let decoded = decode_completion_logprobs(Some(&short));
    assert_eq!(decoded[0].log_prob, -0.3);
    assert!(decoded[0].top_log_probs.is_empty());
    assert_eq!(decoded[1].log_prob, 0.0);
    assert!(decoded[1].top_log_probs.is_empty());
}

#[test]
fn error_body_decoding_classifies_retryability() {
    let headers = HashMap::new();
    let body = br#"{"error":{"message":"Invalid model","type":"invalid_request_error","param":null,"code":null}}"#;
    let err = decode_error(FailedResponse {
        url: "https://openrouter.ai/api/v1/chat/completions",
        status: 400,
        status_text: "Bad Request",
        headers: &headers,
        body,
    });
    assert_eq!(err.message, "Invalid model");
    assert_eq!(err.url, "https://openrouter.ai/api/v1/chat/completions");
    assert!(!err.retryable);
    assert!(err.code.is_none());

    for (status, retryable) in [(429, true), (500, true), (502, true), (404, false)] {
        let err = decode_error(FailedResponse {
            url: "u",
            status,
            status_text: "",
            headers: &headers,
            body: b"not json",
        });
        assert_eq!(err.retryable, retryable, "status {status}");
        assert_eq!(
            LLMError::from(err).is_retryable(),
            retryable,
            "status {status}"
        );
    }
}
