//! Per-event relay: verify, clean, ask the model, post the card.
//!
//! Every stage returns an explicit error; `handle` folds them into an [`Outcome`]
//! and callers always acknowledge the platform with the same response.

use crate::config::RelayConfig;
use axum::http::HeaderMap;
use relay_channels::{
    CardFormatter, ChannelAdapter, HmacVerifier, InboundEvent, MessageSanitizer,
    PlatformResponse, TeamsMessage, TeamsWebhookAdapter,
};
use relay_llm::InferenceClient;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("request signature rejected")]
    Auth,

    #[error("body is not a chat message: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("no question left after sanitizing")]
    EmptyInput,

    #[error("card delivery failed: {0}")]
    Delivery(anyhow::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    AuthFailed,
    EmptyQuestion,
    Delivered,
    DeliveryFailed,
}

impl Outcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AuthFailed => "auth_failed",
            Self::EmptyQuestion => "empty_question",
            Self::Delivered => "delivered",
            Self::DeliveryFailed => "delivery_failed",
        }
    }
}

impl From<&RelayError> for Outcome {
    fn from(error: &RelayError) -> Self {
        match error {
            RelayError::Auth => Self::AuthFailed,
            RelayError::Parse(_) | RelayError::EmptyInput => Self::EmptyQuestion,
            RelayError::Delivery(_) => Self::DeliveryFailed,
        }
    }
}

pub struct RelayHandler {
    verifier: HmacVerifier,
    sanitizer: MessageSanitizer,
    llm: InferenceClient,
    formatter: CardFormatter,
    channel: Arc<dyn ChannelAdapter>,
}

impl RelayHandler {
    pub fn new(
        verifier: HmacVerifier,
        sanitizer: MessageSanitizer,
        llm: InferenceClient,
        formatter: CardFormatter,
        channel: Arc<dyn ChannelAdapter>,
    ) -> Self {
        Self {
            verifier,
            sanitizer,
            llm,
            formatter,
            channel,
        }
    }

    pub fn from_config(cfg: &RelayConfig) -> anyhow::Result<Self> {
        let verifier = HmacVerifier::from_base64(&cfg.auth.hmac_secret)?;
        let sanitizer = MessageSanitizer::new(&cfg.teams.bot_name)?;
        let llm = InferenceClient::new(
            &cfg.inference.endpoint,
            &cfg.inference.model,
            cfg.inference_timeout(),
        )?
        .with_api_key(cfg.inference.api_key.clone())
        .with_sampling(cfg.sampling());
        let formatter = CardFormatter::new(cfg.teams.max_answer_chars);
        let channel: Arc<dyn ChannelAdapter> = Arc::new(TeamsWebhookAdapter::new(
            &cfg.teams.webhook_url,
            cfg.teams_timeout(),
        )?);
        Ok(Self::new(verifier, sanitizer, llm, formatter, channel))
    }

    pub fn model(&self) -> &str {
        self.llm.model()
    }

    pub fn channel_id(&self) -> &str {
        self.channel.channel_id()
    }

    pub fn verifier(&self) -> &HmacVerifier {
        &self.verifier
    }

    /// Runs one event to completion. Never fails; the outcome is for logging and tests.
    #[tracing::instrument(level = "info", skip_all, fields(body_len = raw_body.len()))]
    pub async fn handle(&self, headers: &HeaderMap, raw_body: &[u8]) -> Outcome {
        let result = self.relay(headers, raw_body).await;
        let outcome = match &result {
            Ok(()) => Outcome::Delivered,
            Err(error) => Outcome::from(error),
        };
        match result {
            Ok(()) => tracing::info!(outcome = outcome.as_str(), "answer card delivered"),
            Err(RelayError::Auth) => {
                tracing::warn!(outcome = outcome.as_str(), "hmac is invalid; request dropped")
            }
            Err(RelayError::EmptyInput) => {
                tracing::info!(outcome = outcome.as_str(), "no question found; request dropped")
            }
            Err(error @ RelayError::Parse(_)) => {
                tracing::warn!(
                    outcome = outcome.as_str(),
                    %error,
                    "unreadable message; request dropped"
                )
            }
            Err(error @ RelayError::Delivery(_)) => {
                tracing::error!(outcome = outcome.as_str(), %error, "answer card not delivered")
            }
        }
        outcome
    }

    /// Platform-facing entry point: always acknowledges.
    pub async fn handle_event(&self, event: &InboundEvent) -> PlatformResponse {
        let headers = event.header_map();
        self.handle(&headers, event.body.as_bytes()).await;
        PlatformResponse::ack()
    }

    async fn relay(&self, headers: &HeaderMap, raw_body: &[u8]) -> Result<(), RelayError> {
        self.authenticate(headers, raw_body)?;
        let question = self.extract_question(raw_body)?;
        let answer = self.llm.complete_or_fallback(&question).await;
        let card = self.formatter.format_card(&question, &answer);
        self.channel
            .send_card(&card)
            .await
            .map_err(RelayError::Delivery)
    }

    fn authenticate(&self, headers: &HeaderMap, raw_body: &[u8]) -> Result<(), RelayError> {
        if self.verifier.verify(headers, raw_body) {
            Ok(())
        } else {
            Err(RelayError::Auth)
        }
    }

    fn extract_question(&self, raw_body: &[u8]) -> Result<String, RelayError> {
        let message = TeamsMessage::from_body(raw_body)?;
        let question = self.sanitizer.sanitize(&message.text);
        if question.is_empty() {
            return Err(RelayError::EmptyInput);
        }
        tracing::debug!(
            message_id = ?message.id,
            sender = %message.sender_name(),
            question = %question,
            "question extracted"
        );
        Ok(question)
    }
}
