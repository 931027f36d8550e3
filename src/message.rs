//! Message types flowing in and out of the bot

use serde::{Deserialize, Serialize};

/// Kind of inbound chat event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    Message,
    Other,
}

/// Inbound event from the chat platform
#[derive(Debug, Clone)]
pub struct ChatEvent {
    pub kind: EventKind,
    pub channel_id: String,
    pub sender_id: String,
    pub text: String,
}

impl ChatEvent {
    pub fn message(channel_id: &str, sender_id: &str, text: &str) -> Self {
        Self {
            kind: EventKind::Message,
            channel_id: channel_id.to_string(),
            sender_id: sender_id.to_string(),
            text: text.to_string(),
        }
    }
}

/// One label/value pair of a rendered report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub title: String,
    pub value: String,
    pub short: bool,
}

impl Field {
    /// Short field, rendered side by side with its neighbour.
    pub fn new(title: impl Into<String>, value: impl ToString) -> Self {
        Self {
            title: title.into(),
            value: value.to_string(),
            short: true,
        }
    }
}

/// Attribution shown above a rich message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Author {
    pub name: String,
    pub link: String,
    pub icon: String,
}

/// A message ready to be posted, produced once per dispatch
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OutboundMessage {
    /// Top-level message text
    pub headline: String,
    pub title: Option<String>,
    pub title_link: Option<String>,
    pub text: Option<String>,
    pub fields: Vec<Field>,
    pub image_url: Option<String>,
    pub author: Option<Author>,
}

impl OutboundMessage {
    /// A plain text reply with no attachment.
    pub fn text(headline: impl Into<String>) -> Self {
        Self {
            headline: headline.into(),
            ..Default::default()
        }
    }

    /// Whether anything beyond the headline needs to be sent.
    pub fn has_attachment(&self) -> bool {
        self.title.is_some()
            || self.text.is_some()
            || !self.fields.is_empty()
            || self.image_url.is_some()
            || self.author.is_some()
    }
}
