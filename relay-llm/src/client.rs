use crate::error::{InferenceError, Result};
use crate::types::{CompletionRequest, CompletionResponse, SamplingParams};
use reqwest::header::ACCEPT;
use reqwest::{StatusCode, Url};
use std::time::Duration;

pub const DEFAULT_MODEL: &str = "anthropic.claude-v2:1";

/// Client for a hosted model runtime exposing `POST {endpoint}/model/{model}/invoke`.
#[derive(Clone)]
pub struct InferenceClient {
    http: reqwest::Client,
    invoke_url: Url,
    model: String,
    api_key: Option<String>,
    params: SamplingParams,
}

impl InferenceClient {
    pub fn new(endpoint: &str, model: &str, timeout: Duration) -> Result<Self> {
        let model = model.trim();
        if model.is_empty() {
            return Err(InferenceError::InvalidInput(
                "model identifier is required".to_string(),
            ));
        }
        let invoke_url = build_invoke_url(endpoint, model)?;
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            invoke_url,
            model: model.to_string(),
            api_key: None,
            params: SamplingParams::default(),
        })
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .map(ToOwned::to_owned);
        self
    }

    pub fn with_sampling(mut self, params: SamplingParams) -> Self {
        self.params = params;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn invoke_url(&self) -> &Url {
        &self.invoke_url
    }

    #[tracing::instrument(level = "info", skip_all, fields(model = %self.model))]
    pub async fn complete(&self, question: &str) -> Result<String> {
        if question.trim().is_empty() {
            return Err(InferenceError::InvalidInput("question is empty".to_string()));
        }
        let req = CompletionRequest::for_question(question, self.params);

        let mut request = self
            .http
            .post(self.invoke_url.clone())
            .header(ACCEPT, "application/json")
            .json(&req);
        if let Some(api_key) = self.api_key.as_deref() {
            request = request.bearer_auth(api_key);
        }

        let response = request.send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;
        if status != StatusCode::OK {
            return Err(InferenceError::Status {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }

        let text = String::from_utf8(bytes.to_vec())?;
        let parsed: CompletionResponse = serde_json::from_str(&text)?;
        tracing::info!(
            completion_chars = parsed.completion.chars().count(),
            stop_reason = ?parsed.stop_reason,
            "completion received"
        );
        Ok(parsed.completion)
    }

    /// Like [`complete`](Self::complete), but every failure becomes a fixed fallback answer.
    pub async fn complete_or_fallback(&self, question: &str) -> String {
        match self.complete(question).await {
            Ok(answer) => answer,
            Err(error) => {
                tracing::warn!(
                    model = %self.model,
                    %error,
                    "completion failed; using fallback answer"
                );
                error.fallback_message().to_string()
            }
        }
    }
}

fn build_invoke_url(endpoint: &str, model: &str) -> Result<Url> {
    let endpoint = endpoint.trim();
    if endpoint.is_empty() {
        return Err(InferenceError::InvalidInput(
            "inference endpoint is required".to_string(),
        ));
    }
    let mut url = Url::parse(endpoint)
        .map_err(|e| InferenceError::InvalidInput(format!("invalid inference endpoint: {e}")))?;
    match url.scheme() {
        "http" | "https" => {}
        other => {
            return Err(InferenceError::InvalidInput(format!(
                "invalid inference endpoint scheme: {other}"
            )));
        }
    }
    url.path_segments_mut()
        .map_err(|_| {
            InferenceError::InvalidInput("inference endpoint cannot be a base url".to_string())
        })?
        .pop_if_empty()
        .extend(["model", model, "invoke"]);
    Ok(url)
}
