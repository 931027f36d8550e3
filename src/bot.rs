//! Bot loop - ties events, the router, the scheduler and the sources together

use chrono::{Local, NaiveDateTime, NaiveTime};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::adapters::{EventSource, Transport};
use crate::config::Config;
use crate::message::{ChatEvent, EventKind, OutboundMessage};
use crate::router::{Route, Router, UNRECOGNIZED_REPLY};
use crate::scheduler::Scheduler;
use crate::sources::{Request, SourceRegistry};
use crate::Result;

pub const FETCH_FAILED_REPLY: &str = "Sorry, I couldn't fetch that right now. Please try again later.";
pub const FATAL_NOTICE: &str = "Something killed me :(";

/// Where the loop is in its life cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BotState {
    Connecting,
    Running,
}

/// The bot: one channel, one transport, a closed set of sources
pub struct SpaceBot<T: Transport> {
    config: Config,
    router: Router,
    sources: SourceRegistry,
    scheduler: Scheduler,
    transport: T,
    state: BotState,
    shutdown: Arc<AtomicBool>,
}

impl<T: Transport> SpaceBot<T> {
    pub fn new(config: Config, sources: SourceRegistry, transport: T) -> Self {
        let router = Router::new(&config.bot_name);
        Self {
            config,
            router,
            sources,
            scheduler: Scheduler::new(),
            transport,
            state: BotState::Connecting,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Run `request` every day at `time_of_day`.
    pub fn schedule_daily(&mut self, time_of_day: NaiveTime, request: Request) {
        self.scheduler.register_daily(time_of_day, request);
    }

    /// Flag that stops the loop at the start of its next iteration.
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        self.shutdown.clone()
    }

    pub fn state(&self) -> BotState {
        self.state
    }

    /// Connect, then poll until shutdown or until the connection is lost.
    pub async fn run<E: EventSource>(&mut self, events: &mut E) -> Result<()> {
        self.state = BotState::Connecting;
        if let Err(e) = events.connect().await {
            error!("Slack connection failed: {}", e);
            return Err(e);
        }
        if let Some(id) = events.bot_user_id() {
            self.router.set_bot_user_id(id);
        }

        self.state = BotState::Running;
        info!("SpaceBot running in channel {}", self.config.channel);

        while !self.shutdown.load(Ordering::SeqCst) {
            let now = Local::now().naive_local();
            if let Err(e) = self.step(now, events).await {
                error!("Unexpected failure: {}", e);
                // best effort, the process is going down anyway
                if let Err(post_err) = self.transport.post_message(&OutboundMessage::text(FATAL_NOTICE)).await {
                    warn!("Could not post shutdown notice: {}", post_err);
                }
                return Err(e);
            }
            tokio::time::sleep(self.config.poll_interval()).await;
        }

        info!("Shutting down");
        Ok(())
    }

    /// One loop iteration without the sleep: scheduled jobs, then inbound events.
    pub async fn step<E: EventSource>(&mut self, now: NaiveDateTime, events: &mut E) -> Result<()> {
        for request in self.scheduler.tick(now) {
            info!("Running scheduled {:?}", request);
            self.execute(&request).await;
        }

        for event in events.drain()? {
            self.handle_event(&event).await;
        }
        Ok(())
    }

    /// Route one inbound event and answer it.
    pub async fn handle_event(&self, event: &ChatEvent) {
        if !self.accepts(event) {
            return;
        }
        debug!("Received message: {:?}", event);

        match self.router.route(&event.text) {
            Route::Ignore => {}
            Route::Fetch(request) => {
                info!("Received command from {}: {}", event.sender_id, event.text);
                self.execute(&request).await;
            }
            Route::Help => self.send(&OutboundMessage::text(self.help_text())).await,
            Route::Reply(text) => self.send(&OutboundMessage::text(text)).await,
            Route::PodBayDoors => {
                let name = match self.transport.user_first_name(&event.sender_id).await {
                    Ok(name) => name,
                    Err(e) => {
                        warn!("Could not look up user {}: {}", event.sender_id, e);
                        "Dave".to_string()
                    }
                };
                let reply = format!("I'm sorry {}. I'm afraid I can't do that.", name);
                self.send(&OutboundMessage::text(reply)).await;
            }
            Route::Unrecognized => self.send(&OutboundMessage::text(UNRECOGNIZED_REPLY)).await,
        }
    }

    /// Fetch and post; failures turn into a reply instead of an error.
    pub async fn execute(&self, request: &Request) {
        match self.sources.fetch(request).await {
            Ok(message) => self.send(&message).await,
            Err(e) => {
                error!("{} fetch failed: {}", request.source_id(), e);
                let reply = if e.is_upstream() {
                    FETCH_FAILED_REPLY.to_string()
                } else {
                    e.to_string()
                };
                self.send(&OutboundMessage::text(reply)).await;
            }
        }
    }

    /// Fetch and post, propagating every failure. Used by one-shot runs.
    pub async fn post_once(&self, request: &Request) -> Result<()> {
        let message = self.sources.fetch(request).await?;
        self.transport.post_message(&message).await
    }

    /// Commands the bot understands.
    pub fn help_text(&self) -> String {
        let name = self.router.bot_name();
        let mut lines = vec![format!(
            "Available commands (case insensitive):\n\n*{} help:* Shows this.",
            name
        )];
        lines.extend(self.sources.help_lines(name));
        lines.join("\n")
    }

    fn accepts(&self, event: &ChatEvent) -> bool {
        event.kind == EventKind::Message
            && !event.text.trim().is_empty()
            && event.channel_id == self.config.channel
    }

    /// Post, logging instead of failing: one lost message must not end the loop.
    async fn send(&self, message: &OutboundMessage) {
        if let Err(e) = self.transport.post_message(message).await {
            error!("Failed to post to {}: {}", self.transport.name(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{FakeEvents, FakeTransport, NoEvents};
    use crate::error::Error;
    use crate::http::{FakeHttpClient, HttpResponse};
    use chrono::NaiveDate;

    const CHANNEL: &str = "C0SPACE";
    const APOD_BODY: &str = r#"{"title": "T", "explanation": "E", "url": "http://x"}"#;

    fn config() -> Config {
        Config {
            channel: CHANNEL.to_string(),
            token: "xoxb".to_string(),
            poll_interval_ms: 1,
            ..Default::default()
        }
    }

    fn bot_with(
        responses: Vec<HttpResponse>,
        transport: Arc<FakeTransport>,
    ) -> (SpaceBot<Arc<FakeTransport>>, Arc<FakeHttpClient>) {
        let http = Arc::new(FakeHttpClient::with_responses(responses));
        let sources = SourceRegistry::new_with_defaults(&config(), http.clone());
        (SpaceBot::new(config(), sources, transport), http)
    }

    fn msg(text: &str) -> ChatEvent {
        ChatEvent::message(CHANNEL, "U1", text)
    }

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 4).unwrap().and_hms_opt(h, m, 0).unwrap()
    }

    #[tokio::test]
    async fn test_apod_command_posts_one_message() {
        let transport = Arc::new(FakeTransport::new());
        let (bot, http) = bot_with(vec![HttpResponse::new(200, APOD_BODY)], transport.clone());

        bot.handle_event(&msg("spacebot apod 2020-01-01")).await;

        assert_eq!(
            transport.headlines(),
            vec!["Astronomy Picture of the Day - Wed January 01, 2020"]
        );
        assert_eq!(http.requests()[0].param("date"), Some("2020-01-01"));
    }

    #[tokio::test]
    async fn test_ignores_other_channels_and_empty_text() {
        let transport = Arc::new(FakeTransport::new());
        let (bot, http) = bot_with(vec![], transport.clone());

        bot.handle_event(&ChatEvent::message("C0OTHER", "U1", "spacebot apod")).await;
        bot.handle_event(&msg("   ")).await;
        bot.handle_event(&msg("just chatting about apod")).await;
        bot.handle_event(&ChatEvent {
            kind: EventKind::Other,
            channel_id: CHANNEL.to_string(),
            sender_id: String::new(),
            text: "spacebot apod".to_string(),
        })
        .await;

        assert!(transport.posted().is_empty());
        assert!(http.requests().is_empty());
    }

    #[tokio::test]
    async fn test_canned_replies() {
        let transport = Arc::new(FakeTransport::new());
        let (bot, _) = bot_with(vec![], transport.clone());

        bot.handle_event(&msg("spacebot frobnicate")).await;
        bot.handle_event(&msg("spacebot apod tomorrow")).await;
        bot.handle_event(&msg("spacebot still alive")).await;
        bot.handle_event(&msg("spacebot open the pod bay doors")).await;

        assert_eq!(
            transport.headlines(),
            vec![
                UNRECOGNIZED_REPLY.to_string(),
                "Incorrect date format. Should be YYYY-MM-DD".to_string(),
                "Yes".to_string(),
                "I'm sorry Dave. I'm afraid I can't do that.".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_help_lists_every_source() {
        let transport = Arc::new(FakeTransport::new());
        let (bot, _) = bot_with(vec![], transport.clone());

        bot.handle_event(&msg("spacebot help")).await;

        let help = &transport.headlines()[0];
        assert!(help.starts_with("Available commands"));
        assert!(help.contains("*spacebot APOD [YYYY-MM-DD]:*"));
        assert!(help.contains("*spacebot ISS [zoom 0-21]:*"));
        assert!(help.contains("*spacebot mars weather:*"));
    }

    #[tokio::test]
    async fn test_upstream_failure_degrades_to_reply() {
        let transport = Arc::new(FakeTransport::new());
        let (bot, _) = bot_with(vec![HttpResponse::new(503, "")], transport.clone());

        bot.handle_event(&msg("spacebot mars weather")).await;

        assert_eq!(transport.headlines(), vec![FETCH_FAILED_REPLY.to_string()]);
    }

    #[tokio::test]
    async fn test_transport_failure_is_not_fatal() {
        let transport = Arc::new(FakeTransport::failing());
        let (mut bot, _) = bot_with(vec![], transport.clone());

        let mut events = FakeEvents::new(vec![vec![msg("spacebot still alive"), msg("spacebot help")]]);
        bot.step(at(9, 0), &mut events).await.unwrap();
        assert!(transport.posted().is_empty());
    }

    #[tokio::test]
    async fn test_scheduled_job_fires_once() {
        let transport = Arc::new(FakeTransport::new());
        let (mut bot, _) = bot_with(
            vec![HttpResponse::new(200, APOD_BODY), HttpResponse::new(200, APOD_BODY)],
            transport.clone(),
        );
        bot.schedule_daily(NaiveTime::from_hms_opt(12, 0, 0).unwrap(), Request::Apod { date: None });

        let mut events = NoEvents;
        bot.step(at(11, 59), &mut events).await.unwrap();
        bot.step(at(12, 0), &mut events).await.unwrap();
        bot.step(at(12, 0), &mut events).await.unwrap();
        bot.step(at(12, 1), &mut events).await.unwrap();

        assert_eq!(transport.posted().len(), 1);
        assert!(transport.headlines()[0].starts_with("Astronomy Picture of the Day - "));
    }

    #[tokio::test]
    async fn test_run_ends_on_connection_lost() {
        let transport = Arc::new(FakeTransport::new());
        let (mut bot, _) = bot_with(vec![], transport.clone());

        let mut events = FakeEvents::new(vec![vec![msg("spacebot still alive")], vec![]]);
        let result = bot.run(&mut events).await;

        assert!(matches!(result, Err(Error::ConnectionLost(_))));
        assert_eq!(bot.state(), BotState::Running);
        assert_eq!(transport.headlines(), vec!["Yes", FATAL_NOTICE]);
    }

    #[tokio::test]
    async fn test_run_fails_when_connect_fails() {
        let transport = Arc::new(FakeTransport::new());
        let (mut bot, _) = bot_with(vec![], transport.clone());

        let mut events = FakeEvents::refusing();
        assert!(bot.run(&mut events).await.is_err());
        assert_eq!(bot.state(), BotState::Connecting);
        assert!(transport.posted().is_empty());
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let transport = Arc::new(FakeTransport::new());
        let (mut bot, _) = bot_with(vec![], transport.clone());

        bot.shutdown_handle().store(true, Ordering::SeqCst);
        bot.run(&mut NoEvents).await.unwrap();
        assert!(transport.posted().is_empty());
    }

    #[tokio::test]
    async fn test_post_once_propagates_errors() {
        let transport = Arc::new(FakeTransport::new());
        let (bot, _) = bot_with(vec![HttpResponse::new(500, "")], transport.clone());

        let result = bot.post_once(&Request::Apod { date: None }).await;
        assert!(matches!(result, Err(Error::UpstreamUnavailable(_))));
        assert!(transport.posted().is_empty());
    }
}
