use crate::card::CardPayload;
use crate::traits::ChannelAdapter;
use anyhow::{Result, anyhow};
use reqwest::Url;
use std::time::Duration;

/// Posts cards to a Teams incoming-webhook URL.
#[derive(Clone)]
pub struct TeamsWebhookAdapter {
    http: reqwest::Client,
    webhook_url: Url,
}

impl TeamsWebhookAdapter {
    pub fn new(webhook_url: &str, timeout: Duration) -> Result<Self> {
        let webhook_url = normalize_http_url(webhook_url, "webhook_url")?;
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http, webhook_url })
    }
}

#[async_trait::async_trait]
impl ChannelAdapter for TeamsWebhookAdapter {
    fn channel_id(&self) -> &str {
        "teams"
    }

    #[tracing::instrument(level = "info", skip_all, fields(host = ?self.webhook_url.host_str()))]
    async fn send_card(&self, card: &CardPayload) -> Result<()> {
        let response = self
            .http
            .post(self.webhook_url.clone())
            .json(card)
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(anyhow!(
                "teams webhook post failed: status={} body={}",
                status,
                body
            ));
        }
        tracing::debug!(status = status.as_u16(), "teams webhook accepted card");
        Ok(())
    }
}

pub(crate) fn normalize_http_url(raw: &str, field: &str) -> Result<Url> {
    let normalized = raw.trim();
    if normalized.is_empty() {
        return Err(anyhow!("{field} is required"));
    }
    let parsed = Url::parse(normalized).map_err(|e| anyhow!("invalid {field}: {e}"))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => Err(anyhow!("invalid {field} scheme: {other}")),
    }
}
