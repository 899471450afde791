use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_TOKENS: u32 = 3000;
pub const DEFAULT_TEMPERATURE: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplingParams {
    pub max_tokens_to_sample: u32,
    pub temperature: f32,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            max_tokens_to_sample: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
        }
    }
}

/// Text-completion request body in the Human/Assistant prompt dialect.
#[derive(Debug, Clone, Serialize)]
pub struct CompletionRequest {
    pub prompt: String,
    pub max_tokens_to_sample: u32,
    pub temperature: f32,
}

impl CompletionRequest {
    pub fn for_question(question: &str, params: SamplingParams) -> Self {
        Self {
            prompt: format!("\n\nHuman: {question}\n\nAssistant:"),
            max_tokens_to_sample: params.max_tokens_to_sample,
            temperature: params.temperature,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CompletionResponse {
    /// Missing in some provider replies; treated as an empty answer.
    #[serde(default)]
    pub completion: String,
    #[serde(default)]
    pub stop_reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_wraps_question_in_prompt_template() {
        let req =
            CompletionRequest::for_question("Quelle heure est-il ?", SamplingParams::default());
        let value = serde_json::to_value(&req).expect("serialize request");
        assert_eq!(
            value,
            json!({
                "prompt": "\n\nHuman: Quelle heure est-il ?\n\nAssistant:",
                "max_tokens_to_sample": 3000,
                "temperature": 0.5,
            })
        );
    }

    #[test]
    fn response_without_completion_defaults_to_empty() {
        let parsed: CompletionResponse =
            serde_json::from_str(r#"{"stop_reason":"max_tokens"}"#).expect("parse response");
        assert_eq!(parsed.completion, "");
        assert_eq!(parsed.stop_reason.as_deref(), Some("max_tokens"));
    }
}
