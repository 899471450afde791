use crate::card::CardPayload;
use anyhow::Result;
use async_trait::async_trait;

#[async_trait]
pub trait ChannelAdapter: Send + Sync {
    /// Unique channel identifier, e.g. "teams".
    fn channel_id(&self) -> &str;

    /// Deliver a formatted card to the channel's configured destination.
    async fn send_card(&self, card: &CardPayload) -> Result<()>;
}
