use serde::Serialize;
use std::borrow::Cow;

pub const ADAPTIVE_CARD_CONTENT_TYPE: &str = "application/vnd.microsoft.card.adaptive";
pub const ADAPTIVE_CARD_VERSION: &str = "1.0";
pub const DEFAULT_MAX_ANSWER_CHARS: usize = 3500;
const TRUNCATION_MARKER: &str = "...";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CardPayload {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub attachments: Vec<CardAttachment>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CardAttachment {
    pub content_type: &'static str,
    pub content: AdaptiveCard,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdaptiveCard {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub version: &'static str,
    pub body: Vec<TextBlock>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextBlock {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub text: String,
    pub wrap: bool,
    pub size: &'static str,
}

impl TextBlock {
    fn wrapped(text: String) -> Self {
        Self {
            kind: "TextBlock",
            text,
            wrap: true,
            size: "Medium",
        }
    }
}

impl CardPayload {
    fn single_card(card: AdaptiveCard) -> Self {
        Self {
            kind: "message",
            attachments: vec![CardAttachment {
                content_type: ADAPTIVE_CARD_CONTENT_TYPE,
                content: card,
            }],
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CardFormatter {
    max_answer_chars: usize,
}

impl Default for CardFormatter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ANSWER_CHARS)
    }
}

impl CardFormatter {
    pub fn new(max_answer_chars: usize) -> Self {
        Self { max_answer_chars }
    }

    pub fn format_card(&self, question: &str, answer: &str) -> CardPayload {
        let answer = truncate_answer(answer, self.max_answer_chars);
        CardPayload::single_card(AdaptiveCard {
            kind: "AdaptiveCard",
            version: ADAPTIVE_CARD_VERSION,
            body: vec![
                TextBlock::wrapped(format!("Question: {question}")),
                TextBlock::wrapped(format!("Réponse: {answer}")),
            ],
        })
    }
}

/// Question/answer card with the default answer limit.
pub fn format_card(question: &str, answer: &str) -> CardPayload {
    CardFormatter::default().format_card(question, answer)
}

/// Keeps the first `max_chars` characters (not bytes) and marks the cut.
pub fn truncate_answer(answer: &str, max_chars: usize) -> Cow<'_, str> {
    match answer.char_indices().nth(max_chars) {
        Some((cut, _)) => Cow::Owned(format!("{}{TRUNCATION_MARKER}", &answer[..cut])),
        None => Cow::Borrowed(answer),
    }
}
