//! OpenRouter chat and completion wire codecs.
//!
//! Everything here is pure translation; sending requests and authenticating is
//! left to the caller's transport.

mod completion;
mod error;
mod request;
mod response;
mod stream;
pub mod types;

pub use completion::{CompletionPrompt, convert_to_completion_prompt};
pub use error::{FailedResponse, decode_error};
pub use request::encode_prompt;
pub use response::{
    decode_completion_logprobs, decode_finish_reason, decode_logprobs, decode_response,
    decode_usage, parse_response,
};
pub use stream::{ChunkDecoder, event_stream};
