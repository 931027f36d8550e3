//! Command router — maps chat text to what the bot should do.
//!
//! Routing is a pure function of the text. Commands are matched against a
//! fixed, ordered table of whole-word prefixes; the first match wins.

use regex::Regex;

use crate::sources::iss::{DEFAULT_ZOOM, MAX_ZOOM};
use crate::sources::{validate_date, Request};

pub const INVALID_DATE_REPLY: &str = "Incorrect date format. Should be YYYY-MM-DD";
pub const ISS_USAGE_REPLY: &str =
    "Usage: `iss [zoom 0-21]` or `iss overhead LAT LON` (e.g. `iss overhead 51.48 -0.01`)";
pub const UNRECOGNIZED_REPLY: &str = "I'm sorry, I'm afraid I can't do that. Try `help`.";

/// Routing decision for one piece of text
#[derive(Debug, Clone, PartialEq)]
pub enum Route {
    /// Invoke a data source
    Fetch(Request),
    Help,
    /// Answer with fixed text, no data source involved
    Reply(String),
    /// "open the pod bay doors"
    PodBayDoors,
    /// Addressed to the bot, but not a known command
    Unrecognized,
    /// Not addressed to the bot
    Ignore,
}

type Handler = fn(&str) -> Route;

/// Ordered prefix table.
const COMMANDS: &[(&str, Handler)] = &[
    ("apod", route_apod),
    ("iss", route_iss),
    ("mars weather", route_mars_weather),
    ("help", route_help),
    ("still alive", route_still_alive),
    ("open the pod bay doors", route_pod_bay_doors),
];

/// Routes text addressed to the bot.
#[derive(Debug, Clone)]
pub struct Router {
    bot_name: String,
    mention: Regex,
    bot_user_id: Option<String>,
}

impl Router {
    pub fn new(bot_name: &str) -> Self {
        Self {
            bot_name: bot_name.trim().to_lowercase(),
            mention: Regex::new(r"^<@([a-z0-9]+)>").expect("mention pattern is valid"),
            bot_user_id: None,
        }
    }

    /// Also accept Slack `<@USERID>` mentions of the bot.
    pub fn with_bot_user_id(mut self, user_id: &str) -> Self {
        self.bot_user_id = Some(user_id.to_lowercase());
        self
    }

    pub fn set_bot_user_id(&mut self, user_id: &str) {
        self.bot_user_id = Some(user_id.to_lowercase());
    }

    pub fn bot_name(&self) -> &str {
        &self.bot_name
    }

    /// Trim, lowercase, collapse whitespace and strip the leading mention.
    ///
    /// Returns `None` when the text does not address the bot.
    pub fn normalize(&self, text: &str) -> Option<String> {
        let text = text.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase();

        let rest = if let Some(caps) = self.mention.captures(&text) {
            match &self.bot_user_id {
                Some(id) if caps[1] == **id => &text[caps[0].len()..],
                _ => return None,
            }
        } else {
            strip_word(&text, &self.bot_name)?
        };

        let rest = rest.trim_start_matches([':', ',']).trim();
        Some(rest.to_string())
    }

    /// Decide what to do with a chat message.
    pub fn route(&self, text: &str) -> Route {
        match self.normalize(text) {
            Some(command) => route_command(&command),
            None => Route::Ignore,
        }
    }
}

/// Route an already normalized command (no mention, lowercase).
pub fn route_command(command: &str) -> Route {
    COMMANDS
        .iter()
        .find_map(|(prefix, handler)| strip_word(command, prefix).map(|args| handler(args.trim())))
        .unwrap_or(Route::Unrecognized)
}

/// Strip `prefix` when it is followed by the end of text, whitespace or
/// punctuation.
fn strip_word<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    let rest = text.strip_prefix(prefix)?;
    match rest.chars().next() {
        None => Some(rest),
        Some(c) if c.is_whitespace() || matches!(c, ':' | ',' | '?' | '!' | '.') => Some(rest),
        Some(_) => None,
    }
}

fn route_apod(args: &str) -> Route {
    if args.is_empty() {
        return Route::Fetch(Request::Apod { date: None });
    }
    match validate_date(args) {
        Ok(date) => Route::Fetch(Request::Apod { date: Some(date) }),
        Err(_) => Route::Reply(INVALID_DATE_REPLY.to_string()),
    }
}

fn route_iss(args: &str) -> Route {
    let parts: Vec<&str> = args.split(' ').filter(|s| !s.is_empty()).collect();
    match parts.as_slice() {
        [] => Route::Fetch(Request::Iss { zoom: DEFAULT_ZOOM }),
        ["zoom", level] => match level.parse::<u8>() {
            Ok(zoom) if zoom <= MAX_ZOOM => Route::Fetch(Request::Iss { zoom }),
            _ => Route::Reply(ISS_USAGE_REPLY.to_string()),
        },
        ["overhead", lat, lon] => match (lat.parse::<f64>(), lon.parse::<f64>()) {
            (Ok(lat), Ok(lon)) if (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lon) => {
                Route::Fetch(Request::IssOverhead { lat, lon })
            }
            _ => Route::Reply(ISS_USAGE_REPLY.to_string()),
        },
        _ => Route::Reply(ISS_USAGE_REPLY.to_string()),
    }
}

fn route_mars_weather(_args: &str) -> Route {
    Route::Fetch(Request::MarsWeather)
}

fn route_help(_args: &str) -> Route {
    Route::Help
}

fn route_still_alive(_args: &str) -> Route {
    Route::Reply("Yes".to_string())
}

fn route_pod_bay_doors(_args: &str) -> Route {
    Route::PodBayDoors
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn router() -> Router {
        Router::new("spacebot")
    }

    #[test]
    fn test_apod_with_date() {
        assert_eq!(
            router().route("spacebot apod 2020-01-01"),
            Route::Fetch(Request::Apod {
                date: NaiveDate::from_ymd_opt(2020, 1, 1)
            })
        );
    }

    #[test]
    fn test_apod_without_date() {
        assert_eq!(
            router().route("spacebot apod"),
            Route::Fetch(Request::Apod { date: None })
        );
    }

    #[test]
    fn test_apod_bad_date() {
        assert_eq!(
            router().route("spacebot apod 2020-13-40"),
            Route::Reply(INVALID_DATE_REPLY.to_string())
        );
        assert_eq!(
            router().route("spacebot apod yesterday"),
            Route::Reply(INVALID_DATE_REPLY.to_string())
        );
        assert_eq!(
            router().route("spacebot apod -0001-01-01"),
            Route::Reply(INVALID_DATE_REPLY.to_string())
        );
        assert_eq!(
            router().route("spacebot apod +2020-01-01"),
            Route::Reply(INVALID_DATE_REPLY.to_string())
        );
    }

    #[test]
    fn test_iss_zoom() {
        assert_eq!(
            router().route("spacebot iss zoom 8"),
            Route::Fetch(Request::Iss { zoom: 8 })
        );
        assert_eq!(
            router().route("spacebot iss"),
            Route::Fetch(Request::Iss { zoom: DEFAULT_ZOOM })
        );
        assert_eq!(
            router().route("spacebot iss zoom 99"),
            Route::Reply(ISS_USAGE_REPLY.to_string())
        );
    }

    #[test]
    fn test_iss_overhead() {
        assert_eq!(
            router().route("SpaceBot ISS overhead 51.5 -0.12"),
            Route::Fetch(Request::IssOverhead { lat: 51.5, lon: -0.12 })
        );
        assert_eq!(
            router().route("spacebot iss overhead 91 0"),
            Route::Reply(ISS_USAGE_REPLY.to_string())
        );
    }

    #[test]
    fn test_mars_weather() {
        assert_eq!(
            router().route("spacebot mars weather"),
            Route::Fetch(Request::MarsWeather)
        );
        assert_eq!(
            router().route("  SPACEBOT:   Mars   Weather "),
            Route::Fetch(Request::MarsWeather)
        );
    }

    #[test]
    fn test_unrecognized() {
        assert_eq!(router().route("spacebot frobnicate"), Route::Unrecognized);
        assert_eq!(router().route("spacebot"), Route::Unrecognized);
        // whole-word prefixes only
        assert_eq!(router().route("spacebot issue tracker"), Route::Unrecognized);
    }

    #[test]
    fn test_canned_replies() {
        assert_eq!(router().route("spacebot help"), Route::Help);
        assert_eq!(
            router().route("spacebot, still alive?"),
            Route::Reply("Yes".to_string())
        );
        assert_eq!(
            router().route("spacebot open the pod bay doors"),
            Route::PodBayDoors
        );
    }

    #[test]
    fn test_not_addressed() {
        assert_eq!(router().route("apod 2020-01-01"), Route::Ignore);
        assert_eq!(router().route("spacebotty apod"), Route::Ignore);
        assert_eq!(router().route(""), Route::Ignore);
    }

    #[test]
    fn test_slack_mention() {
        let router = router().with_bot_user_id("U024BE7LH");
        assert_eq!(
            router.route("<@U024BE7LH> mars weather"),
            Route::Fetch(Request::MarsWeather)
        );
        assert_eq!(router.route("<@U999> mars weather"), Route::Ignore);
    }

    #[test]
    fn test_first_match_wins() {
        assert_eq!(route_command("help apod"), Route::Help);
        assert_eq!(
            route_command("apod help"),
            Route::Reply(INVALID_DATE_REPLY.to_string())
        );
    }
}
