//! Configuration management
//!
//! A [`Config`] is assembled once at startup (optional JSON file, then CLI
//! flags on top) and handed to every component that needs it.

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::Error;
use crate::Result;

/// Name the bot answers to and posts under.
pub const SPACEBOT_USERNAME: &str = "SpaceBot";

/// Avatar used for every post.
pub const SPACEBOT_ICON_URL: &str = "http://i.imgur.com/xm4a5PP.jpg";

/// Publicly documented, rate-limited NASA key.
pub const DEMO_KEY: &str = "DEMO_KEY";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Slack channel or group ID
    #[serde(default)]
    pub channel: String,

    /// Slack API token
    #[serde(default)]
    pub token: String,

    /// NASA API key
    #[serde(default = "default_nasa_api_key")]
    pub nasa_api_key: String,

    /// Time of day ("HH:MM", 24 hour) for the automatic APOD post
    #[serde(default)]
    pub apod_time: Option<String>,

    /// File that receives all log output
    #[serde(default = "default_log_file")]
    pub log_file: PathBuf,

    #[serde(default)]
    pub log_level: LogLevel,

    /// Delay between loop iterations
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Upper bound for every outbound HTTP call
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,

    /// Mention prefix the bot responds to
    #[serde(default = "default_bot_name")]
    pub bot_name: String,
}

fn default_nasa_api_key() -> String {
    DEMO_KEY.to_string()
}

fn default_log_file() -> PathBuf {
    PathBuf::from("spacebot.log")
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_http_timeout_secs() -> u64 {
    10
}

fn default_bot_name() -> String {
    SPACEBOT_USERNAME.to_lowercase()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            channel: String::new(),
            token: String::new(),
            nasa_api_key: default_nasa_api_key(),
            apod_time: None,
            log_file: default_log_file(),
            log_level: LogLevel::default(),
            poll_interval_ms: default_poll_interval_ms(),
            http_timeout_secs: default_http_timeout_secs(),
            bot_name: default_bot_name(),
        }
    }
}

/// Logging level names accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warning,
    Error,
    Critical,
}

impl LogLevel {
    /// Directive understood by `tracing_subscriber::EnvFilter`.
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warn",
            // tracing has nothing above error
            LogLevel::Error | LogLevel::Critical => "error",
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "DEBUG" => Ok(LogLevel::Debug),
            "INFO" => Ok(LogLevel::Info),
            "WARNING" | "WARN" => Ok(LogLevel::Warning),
            "ERROR" => Ok(LogLevel::Error),
            "CRITICAL" => Ok(LogLevel::Critical),
            other => Err(format!("Invalid log level: {}", other)),
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
            LogLevel::Critical => "CRITICAL",
        };
        f.write_str(name)
    }
}

/// Values given on the command line; `None` keeps whatever the file said.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub channel: Option<String>,
    pub token: Option<String>,
    pub nasa_api_key: Option<String>,
    pub apod_time: Option<String>,
    pub log_file: Option<PathBuf>,
    pub log_level: Option<LogLevel>,
}

impl Config {
    /// Apply command line values on top of this config.
    pub fn merge(mut self, overrides: Overrides) -> Self {
        if let Some(channel) = overrides.channel {
            self.channel = channel;
        }
        if let Some(token) = overrides.token {
            self.token = token;
        }
        if let Some(key) = overrides.nasa_api_key {
            self.nasa_api_key = key;
        }
        if overrides.apod_time.is_some() {
            self.apod_time = overrides.apod_time;
        }
        if let Some(file) = overrides.log_file {
            self.log_file = file;
        }
        if let Some(level) = overrides.log_level {
            self.log_level = level;
        }
        self
    }

    /// Check required values and the shape of `apod_time`.
    pub fn validate(&self) -> Result<()> {
        if self.channel.trim().is_empty() {
            return Err(Error::Config("Slack channel is required (-c/--chan)".to_string()));
        }
        if self.token.trim().is_empty() {
            return Err(Error::Config("Slack token is required (-t/--token)".to_string()));
        }
        if self.poll_interval_ms == 0 {
            return Err(Error::Config("poll_interval_ms must be greater than zero".to_string()));
        }
        self.apod_trigger()?;
        Ok(())
    }

    /// Parsed `apod_time`, if one was configured.
    pub fn apod_trigger(&self) -> Result<Option<NaiveTime>> {
        self.apod_time.as_deref().map(parse_time_of_day).transpose()
    }

    pub fn poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.poll_interval_ms)
    }

    pub fn http_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.http_timeout_secs)
    }
}

/// Parse a 24 hour "HH:MM" time of day.
pub fn parse_time_of_day(value: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M").map_err(|_| {
        Error::Config(format!(
            "Invalid time of day {:?}, expected 24 hour HH:MM (e.g. 11:00)",
            value
        ))
    })
}

/// Get the config directory path
pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".spacebot")
}

/// Get the default config file path
pub fn config_path() -> PathBuf {
    config_dir().join("config.json")
}

/// Load configuration from a JSON file.
pub fn load_from(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Err(Error::Config(format!("Config not found at {:?}", path)));
    }

    let content = std::fs::read_to_string(path)?;
    let config: Config = serde_json::from_str(&content)?;
    Ok(config)
}

/// Load the explicit file if given, else the default file if it exists,
/// else built-in defaults.
pub fn load(explicit: Option<&Path>) -> Result<Config> {
    match explicit {
        Some(path) => load_from(path),
        None => {
            let path = config_path();
            if path.exists() {
                load_from(&path)
            } else {
                Ok(Config::default())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.nasa_api_key, "DEMO_KEY");
        assert_eq!(config.log_file, PathBuf::from("spacebot.log"));
        assert_eq!(config.log_level, LogLevel::Info);
        assert_eq!(config.poll_interval_ms, 500);
        assert_eq!(config.bot_name, "spacebot");
    }

    #[test]
    fn test_log_level_parsing() {
        assert_eq!("debug".parse::<LogLevel>().unwrap(), LogLevel::Debug);
        assert_eq!("WARNING".parse::<LogLevel>().unwrap(), LogLevel::Warning);
        assert_eq!("Critical".parse::<LogLevel>().unwrap(), LogLevel::Critical);
        assert!("loud".parse::<LogLevel>().is_err());
        assert_eq!(LogLevel::Critical.as_filter(), "error");
    }

    #[test]
    fn test_overrides_win() {
        let config = Config::default().merge(Overrides {
            channel: Some("C123".to_string()),
            token: Some("xoxb-1".to_string()),
            apod_time: Some("11:00".to_string()),
            ..Default::default()
        });
        assert_eq!(config.channel, "C123");
        assert_eq!(config.token, "xoxb-1");
        assert_eq!(config.nasa_api_key, "DEMO_KEY");
        assert_eq!(
            config.apod_trigger().unwrap(),
            Some(NaiveTime::from_hms_opt(11, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_validate() {
        assert!(Config::default().validate().is_err());

        let mut config = Config {
            channel: "C1".to_string(),
            token: "t".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_ok());

        config.apod_time = Some("25:99".to_string());
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"channel": "G42", "token": "abc", "log_level": "DEBUG", "apod_time": "09:30"}}"#
        )
        .unwrap();

        let config = load_from(file.path()).unwrap();
        assert_eq!(config.channel, "G42");
        assert_eq!(config.log_level, LogLevel::Debug);
        assert_eq!(config.nasa_api_key, "DEMO_KEY");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_missing_file() {
        let result = load_from(Path::new("/definitely/not/here.json"));
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
