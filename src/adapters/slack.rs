//! Slack adapter: Web API for posting, RTM websocket for events

use async_trait::async_trait;
use futures_util::StreamExt;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, info, warn};

use super::{EventSource, Transport};
use crate::config::{SPACEBOT_ICON_URL, SPACEBOT_USERNAME};
use crate::error::Error;
use crate::http::HttpClient;
use crate::message::{ChatEvent, EventKind, OutboundMessage};
use crate::Result;

pub const SLACK_BASE_URL: &str = "https://slack.com/api/";

/// Slack Web API client bound to one channel
#[derive(Clone)]
pub struct SlackClient {
    http: Arc<dyn HttpClient>,
    token: String,
    channel: String,
    base_url: String,
}

/// Result of `rtm.connect`
#[derive(Debug, Clone)]
pub struct RtmSession {
    pub url: String,
    pub bot_user_id: Option<String>,
}

impl SlackClient {
    pub fn new(http: Arc<dyn HttpClient>, token: &str, channel: &str) -> Self {
        Self {
            http,
            token: token.to_string(),
            channel: channel.to_string(),
            base_url: SLACK_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.to_string();
        self
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Call a Web API method with a form body; `ok: false` is an error.
    async fn api_call(&self, method: &str, params: &[(&str, String)]) -> Result<Value> {
        let url = format!("{}{}", self.base_url, method);
        let mut form: Vec<(&str, String)> = vec![("token", self.token.clone())];
        form.extend(params.iter().cloned());

        let response = self.http.post_form(&url, &form).await?;
        if !response.is_ok() {
            return Err(Error::Transport(format!(
                "Slack {} returned HTTP {}",
                method, response.status
            )));
        }

        let body: Value = serde_json::from_str(&response.body)
            .map_err(|e| Error::Transport(format!("Slack {} sent invalid JSON: {}", method, e)))?;
        if body.get("ok").and_then(|v| v.as_bool()) != Some(true) {
            let reason = body.get("error").and_then(|v| v.as_str()).unwrap_or("unknown");
            return Err(Error::Transport(format!("Slack {} failed: {}", method, reason)));
        }
        Ok(body)
    }

    /// Ask for an RTM websocket URL.
    pub async fn rtm_connect(&self) -> Result<RtmSession> {
        let body = self
            .api_call("rtm.connect", &[])
            .await
            .map_err(|e| Error::ConnectionLost(format!("Slack connection failed: {}", e)))?;

        let url = body
            .get("url")
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::ConnectionLost("No 'url' in rtm.connect response".to_string()))?;
        let bot_user_id = body
            .get("self")
            .and_then(|s| s.get("id"))
            .and_then(|v| v.as_str())
            .map(|s| s.to_string());

        Ok(RtmSession {
            url: url.to_string(),
            bot_user_id,
        })
    }
}

#[async_trait]
impl Transport for SlackClient {
    fn name(&self) -> &str {
        "slack"
    }

    async fn post_message(&self, message: &OutboundMessage) -> Result<()> {
        let mut params = vec![
            ("channel", self.channel.clone()),
            ("text", message.headline.clone()),
            ("username", SPACEBOT_USERNAME.to_string()),
            ("icon_url", SPACEBOT_ICON_URL.to_string()),
        ];
        if message.has_attachment() {
            params.push(("attachments", json!([attachment(message)]).to_string()));
        }

        self.api_call("chat.postMessage", &params).await?;
        info!("Sent Slack message: {}", message.headline);
        Ok(())
    }

    async fn user_first_name(&self, user_id: &str) -> Result<String> {
        let body = self.api_call("users.info", &[("user", user_id.to_string())]).await?;
        let user = &body["user"];
        let name = [
            &user["profile"]["first_name"],
            &user["profile"]["real_name"],
            &user["name"],
        ]
        .into_iter()
        .filter_map(|v| v.as_str())
        .find(|s| !s.is_empty())
        .ok_or_else(|| Error::Transport(format!("No name for user {}", user_id)))?;
        Ok(name.to_string())
    }
}

/// Legacy Slack attachment for a message; only present keys are sent.
pub fn attachment(message: &OutboundMessage) -> Value {
    let mut obj = Map::new();
    obj.insert("fallback".to_string(), json!(message.headline));

    let optional = [
        ("title", &message.title),
        ("title_link", &message.title_link),
        ("text", &message.text),
        ("image_url", &message.image_url),
    ];
    for (key, value) in optional {
        if let Some(value) = value {
            obj.insert(key.to_string(), json!(value));
        }
    }

    if let Some(author) = &message.author {
        obj.insert("author_name".to_string(), json!(author.name));
        obj.insert("author_link".to_string(), json!(author.link));
        obj.insert("author_icon".to_string(), json!(author.icon));
    }

    if !message.fields.is_empty() {
        obj.insert("fields".to_string(), json!(message.fields));
    }

    Value::Object(obj)
}

/// Turn an RTM frame into a chat event.
///
/// Empty frames, message edits/joins (anything with a `subtype`) and
/// messages without text yield `None`.
pub fn parse_event(frame: &Value) -> Option<ChatEvent> {
    let obj = frame.as_object().filter(|o| !o.is_empty())?;
    let str_field = |key: &str| obj.get(key).and_then(|v| v.as_str()).unwrap_or("").to_string();

    if obj.get("type").and_then(|v| v.as_str()) != Some("message") {
        return Some(ChatEvent {
            kind: EventKind::Other,
            channel_id: str_field("channel"),
            sender_id: str_field("user"),
            text: String::new(),
        });
    }

    if obj.contains_key("subtype") {
        return None;
    }
    let text = obj.get("text").and_then(|v| v.as_str())?;

    Some(ChatEvent {
        kind: EventKind::Message,
        channel_id: str_field("channel"),
        sender_id: str_field("user"),
        text: text.to_string(),
    })
}

/// What the websocket reader hands to the loop
#[derive(Debug)]
enum Frame {
    Event(Value),
    Closed(String),
}

/// Slack RTM event source
pub struct RtmEventSource {
    client: SlackClient,
    bot_user_id: Option<String>,
    rx: Option<mpsc::UnboundedReceiver<Frame>>,
    reader: Option<JoinHandle<()>>,
    closed: Option<String>,
}

impl RtmEventSource {
    pub fn new(client: SlackClient) -> Self {
        Self {
            client,
            bot_user_id: None,
            rx: None,
            reader: None,
            closed: None,
        }
    }
}

impl Drop for RtmEventSource {
    fn drop(&mut self) {
        if let Some(handle) = self.reader.take() {
            handle.abort();
        }
    }
}

#[async_trait]
impl EventSource for RtmEventSource {
    async fn connect(&mut self) -> Result<()> {
        let session = self.client.rtm_connect().await?;
        let (mut ws_stream, response) = tokio_tungstenite::connect_async(session.url.as_str())
            .await
            .map_err(|e| Error::ConnectionLost(format!("Slack websocket failed: {}", e)))?;
        info!("Connected to Slack RTM (status: {})", response.status());

        let (tx, rx) = mpsc::unbounded_channel();

        let reader = tokio::spawn(async move {
            let reason = loop {
                match ws_stream.next().await {
                    Some(Ok(WsMessage::Text(text))) => match serde_json::from_str::<Value>(&text) {
                        Ok(frame) => {
                            if tx.send(Frame::Event(frame)).is_err() {
                                return;
                            }
                        }
                        Err(e) => warn!("Ignoring unparseable Slack frame: {}", e),
                    },
                    Some(Ok(WsMessage::Close(_))) => break "Slack closed the connection".to_string(),
                    Some(Ok(_)) => {}
                    Some(Err(e)) => break format!("Slack websocket error: {}", e),
                    None => break "Slack websocket ended".to_string(),
                }
            };
            let _ = tx.send(Frame::Closed(reason));
        });

        self.bot_user_id = session.bot_user_id;
        self.rx = Some(rx);
        self.reader = Some(reader);
        self.closed = None;
        Ok(())
    }

    fn drain(&mut self) -> Result<Vec<ChatEvent>> {
        if let Some(reason) = &self.closed {
            return Err(Error::ConnectionLost(reason.clone()));
        }
        let rx = self
            .rx
            .as_mut()
            .ok_or_else(|| Error::ConnectionLost("Not connected".to_string()))?;

        let mut events = Vec::new();
        loop {
            match rx.try_recv() {
                Ok(Frame::Event(frame)) => {
                    debug!("Received event: {}", frame);
                    events.extend(parse_event(&frame));
                }
                Ok(Frame::Closed(reason)) => {
                    // hand out what arrived first, fail on the next call
                    self.closed = Some(reason);
                    break;
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.closed = Some("Slack reader stopped".to_string());
                    break;
                }
            }
        }
        Ok(events)
    }

    fn bot_user_id(&self) -> Option<&str> {
        self.bot_user_id.as_deref()
    }
}

#[cfg(test)]
impl RtmEventSource {
    /// Build a connected source fed by the returned sender.
    fn connected_for_test(client: SlackClient) -> (Self, mpsc::UnboundedSender<Frame>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut source = Self::new(client);
        source.rx = Some(rx);
        (source, tx)
    }
}
