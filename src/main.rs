//! SpaceBot CLI entry point

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{error, info};

use spacebot::adapters::slack::{RtmEventSource, SlackClient};
use spacebot::adapters::NoEvents;
use spacebot::bot::SpaceBot;
use spacebot::config::{self, Config, LogLevel, Overrides};
use spacebot::http::ReqwestHttpClient;
use spacebot::sources::{Request, SourceRegistry};

#[derive(Parser)]
#[command(name = "spacebot")]
#[command(about = "🚀 SpaceBot - NASA pictures, ISS position and Mars weather for Slack")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    options: Options,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer commands in the channel (and post the APOD daily if --apod-time is set)
    Listen,

    /// Post the APOD once, or daily when --apod-time is set
    Post,
}

#[derive(Args)]
struct Options {
    /// Slack channel or group ID
    #[arg(short = 'c', long = "chan", global = true)]
    channel: Option<String>,

    /// Slack API token
    #[arg(short, long, global = true)]
    token: Option<String>,

    /// NASA API key [default: DEMO_KEY]
    #[arg(short = 'k', long = "key", global = true)]
    key: Option<String>,

    /// Time of day (24 hour HH:MM) to post the APOD
    #[arg(short = 'T', long = "apod-time", global = true)]
    apod_time: Option<String>,

    /// Log file [default: spacebot.log]
    #[arg(short = 'f', long = "file", global = true)]
    log_file: Option<PathBuf>,

    /// Log level: DEBUG, INFO, WARNING, ERROR or CRITICAL [default: INFO]
    #[arg(short = 'l', long = "level", global = true)]
    level: Option<LogLevel>,

    /// JSON config file [default: ~/.spacebot/config.json]
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

impl Options {
    fn into_overrides(self) -> Overrides {
        Overrides {
            channel: self.channel,
            token: self.token,
            nasa_api_key: self.key,
            apod_time: self.apod_time,
            log_file: self.log_file,
            log_level: self.level,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_file = cli.options.config.clone();
    let config = config::load(config_file.as_deref())?.merge(cli.options.into_overrides());
    config.validate()?;

    let _guard = spacebot::logging::init(&config)?;
    info!("Starting SpaceBot v{}", env!("CARGO_PKG_VERSION"));

    let result = match cli.command {
        Commands::Listen => run_listen(config).await,
        Commands::Post => run_post(config).await,
    };

    if let Err(e) = &result {
        error!("SpaceBot stopped: {:#}", e);
    }
    result
}

/// Build the bot with every built-in source, posting through Slack.
fn build_bot(config: &Config) -> Result<(SpaceBot<SlackClient>, SlackClient)> {
    let http = Arc::new(ReqwestHttpClient::new(config.http_timeout())?);
    let slack = SlackClient::new(http.clone(), &config.token, &config.channel);
    let sources = SourceRegistry::new_with_defaults(config, http);
    let mut bot = SpaceBot::new(config.clone(), sources, slack.clone());

    if let Some(trigger) = config.apod_trigger()? {
        bot.schedule_daily(trigger, Request::Apod { date: None });
    }

    install_shutdown_handler(bot.shutdown_handle())?;
    Ok((bot, slack))
}

async fn run_listen(config: Config) -> Result<()> {
    let (mut bot, slack) = build_bot(&config)?;
    let mut events = RtmEventSource::new(slack);
    bot.run(&mut events).await.context("listen loop failed")?;
    Ok(())
}

async fn run_post(config: Config) -> Result<()> {
    let (mut bot, _) = build_bot(&config)?;

    if config.apod_time.is_some() {
        bot.run(&mut NoEvents).await.context("scheduled posting failed")?;
    } else {
        bot.post_once(&Request::Apod { date: None })
            .await
            .context("could not post the APOD")?;
        info!("Posted the APOD");
    }
    Ok(())
}

/// First Ctrl+C asks the loop to stop; a second one exits right away.
fn install_shutdown_handler(shutdown: Arc<AtomicBool>) -> Result<()> {
    ctrlc::set_handler(move || {
        if shutdown.swap(true, Ordering::SeqCst) {
            std::process::exit(130);
        }
        eprintln!("\nStopping SpaceBot (Ctrl+C again to force)");
    })
    .context("failed to install Ctrl+C handler")
}
