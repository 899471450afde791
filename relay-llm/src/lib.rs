//! Text-completion client for the relay.
//!
//! Pure HTTP client: one blocking-from-the-caller request per question, no streaming.

mod client;
mod error;
mod types;

pub use client::{DEFAULT_MODEL, InferenceClient};
pub use error::{COMMUNICATION_FALLBACK, InferenceError, Result, UNEXPECTED_FORMAT_FALLBACK};
pub use types::{
    CompletionRequest, CompletionResponse, DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE,
    SamplingParams,
};
