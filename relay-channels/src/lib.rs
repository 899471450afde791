//! Teams-side concerns of the relay.
//!
//! Inbound: signature verification and message cleanup. Outbound: adaptive-card
//! formatting and webhook delivery. Adapters are pure I/O.

pub mod auth;
mod card;
mod sanitize;
mod teams;
mod traits;
mod types;

pub use auth::{HmacVerifier, SIGNATURE_SCHEME};
pub use card::{
    ADAPTIVE_CARD_CONTENT_TYPE, AdaptiveCard, CardAttachment, CardFormatter, CardPayload,
    DEFAULT_MAX_ANSWER_CHARS, TextBlock, format_card, truncate_answer,
};
pub use sanitize::{DEFAULT_BOT_NAME, MessageSanitizer};
pub use teams::TeamsWebhookAdapter;
pub use traits::ChannelAdapter;
pub use types::{ACK_MESSAGE, InboundEvent, PlatformResponse, TeamsMessage, TeamsSender};
