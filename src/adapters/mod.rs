//! Adapters module — chat platform integrations.
//!
//! The bot talks to the chat platform through two seams:
//!
//! - [`Transport`] — outbound: post a rendered message, look up users
//! - [`EventSource`] — inbound: connect once, then drain pending events
//!
//! # Supported Platforms
//!
//! - **Slack** — Web API for posting, RTM websocket for events
//! - **None** — [`NoEvents`], for the unattended scheduled mode

pub mod slack;

use async_trait::async_trait;

use crate::message::{ChatEvent, OutboundMessage};
use crate::Result;

/// Outbound side of a chat platform.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Platform name (e.g., "slack").
    fn name(&self) -> &str;

    /// Post one message to the configured channel.
    async fn post_message(&self, message: &OutboundMessage) -> Result<()>;

    /// First name of a user, for personal replies.
    async fn user_first_name(&self, user_id: &str) -> Result<String>;
}

/// Inbound side of a chat platform.
#[async_trait]
pub trait EventSource: Send {
    /// Establish the event connection.
    async fn connect(&mut self) -> Result<()>;

    /// Every event received since the last call. Never blocks.
    ///
    /// Returns [`crate::Error::ConnectionLost`] once the connection is gone.
    fn drain(&mut self) -> Result<Vec<ChatEvent>>;

    /// Platform user ID of the bot itself, once connected.
    fn bot_user_id(&self) -> Option<&str> {
        None
    }
}

/// Event source that never yields anything.
#[derive(Debug, Default)]
pub struct NoEvents;

#[async_trait]
impl EventSource for NoEvents {
    async fn connect(&mut self) -> Result<()> {
        Ok(())
    }

    fn drain(&mut self) -> Result<Vec<ChatEvent>> {
        Ok(Vec::new())
    }
}

/// Fake transport for testing: records every posted message.
#[cfg(test)]
#[derive(Default)]
pub struct FakeTransport {
    posted: std::sync::Mutex<Vec<OutboundMessage>>,
    fail: std::sync::atomic::AtomicBool,
}

#[cfg(test)]
impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every post fail from now on.
    pub fn failing() -> Self {
        let transport = Self::default();
        transport.fail.store(true, std::sync::atomic::Ordering::SeqCst);
        transport
    }

    pub fn posted(&self) -> Vec<OutboundMessage> {
        self.posted.lock().unwrap().clone()
    }

    pub fn headlines(&self) -> Vec<String> {
        self.posted().into_iter().map(|m| m.headline).collect()
    }
}

#[cfg(test)]
#[async_trait]
impl Transport for std::sync::Arc<FakeTransport> {
    fn name(&self) -> &str {
        "fake"
    }

    async fn post_message(&self, message: &OutboundMessage) -> Result<()> {
        if self.fail.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(crate::Error::Transport("fake transport is down".to_string()));
        }
        self.posted.lock().unwrap().push(message.clone());
        Ok(())
    }

    async fn user_first_name(&self, _user_id: &str) -> Result<String> {
        Ok("Dave".to_string())
    }
}

/// Fake event source for testing: replays batches, then reports the
/// connection as lost.
#[cfg(test)]
#[derive(Default)]
pub struct FakeEvents {
    batches: std::collections::VecDeque<Vec<ChatEvent>>,
    fail_connect: bool,
}

#[cfg(test)]
impl FakeEvents {
    pub fn new(batches: Vec<Vec<ChatEvent>>) -> Self {
        Self {
            batches: batches.into(),
            fail_connect: false,
        }
    }

    /// A source whose connect always fails.
    pub fn refusing() -> Self {
        Self {
            batches: Default::default(),
            fail_connect: true,
        }
    }
}

#[cfg(test)]
#[async_trait]
impl EventSource for FakeEvents {
    async fn connect(&mut self) -> Result<()> {
        if self.fail_connect {
            return Err(crate::Error::ConnectionLost("refused".to_string()));
        }
        Ok(())
    }

    fn drain(&mut self) -> Result<Vec<ChatEvent>> {
        self.batches
            .pop_front()
            .ok_or_else(|| crate::Error::ConnectionLost("fake stream ended".to_string()))
    }
}
