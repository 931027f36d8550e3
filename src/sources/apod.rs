//! NASA Astronomy Picture of the Day

use async_trait::async_trait;
use chrono::{Local, NaiveDate};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

use super::{display, require, Request, Source, SourceId};
use crate::error::Error;
use crate::http::{get_json, HttpClient};
use crate::message::{Author, OutboundMessage};
use crate::Result;

pub const APOD_API_URL: &str = "https://api.nasa.gov/planetary/apod";
pub const APOD_PIX_URL: &str = "http://apod.nasa.gov/apod/astropix.html";
const AUTHOR_NAME: &str = "@apod";
const AUTHOR_LINK: &str = "https://twitter.com/apod";
const AUTHOR_ICON: &str = "https://pbs.twimg.com/profile_images/19829782/apod_normal.png";

pub const HEADLINE_PREFIX: &str = "Astronomy Picture of the Day - ";
pub const ERROR_TITLE: &str = "APOD Error";

/// APOD source backed by the NASA open API
pub struct ApodSource {
    http: Arc<dyn HttpClient>,
    api_key: String,
    base_url: String,
}

impl ApodSource {
    pub fn new(http: Arc<dyn HttpClient>, api_key: &str) -> Self {
        Self {
            http,
            api_key: api_key.to_string(),
            base_url: APOD_API_URL.to_string(),
        }
    }

    /// Point the source at a different endpoint.
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.to_string();
        self
    }

    /// Fetch and render the APOD for `date`.
    pub async fn fetch_date(&self, date: NaiveDate) -> Result<OutboundMessage> {
        let query = [
            ("api_key", self.api_key.clone()),
            ("date", date.format("%Y-%m-%d").to_string()),
        ];
        let data = get_json(self.http.as_ref(), &self.base_url, &query).await?;
        debug!("APOD response: {}", data);
        render(date, &data)
    }
}

#[async_trait]
impl Source for ApodSource {
    fn id(&self) -> SourceId {
        SourceId::Apod
    }

    fn help(&self) -> &str {
        "*{name} APOD [YYYY-MM-DD]:* Displays the APOD for the given date (optional; defaults to today's APOD)."
    }

    async fn fetch(&self, request: &Request) -> Result<OutboundMessage> {
        match request {
            Request::Apod { date } => {
                let date = date.unwrap_or_else(|| Local::now().date_naive());
                info!("Fetching APOD for {}", date);
                self.fetch_date(date).await
            }
            other => Err(Error::Other(format!("APOD cannot handle {:?}", other))),
        }
    }
}

/// Render an APOD payload for `date`.
///
/// The API reports some failures in-band with a 200 status, so the body is
/// checked for an error before anything else.
pub fn render(date: NaiveDate, data: &Value) -> Result<OutboundMessage> {
    let author = Some(Author {
        name: AUTHOR_NAME.to_string(),
        link: AUTHOR_LINK.to_string(),
        icon: AUTHOR_ICON.to_string(),
    });

    if let Some(error) = upstream_error(data) {
        return Ok(OutboundMessage {
            headline: ERROR_TITLE.to_string(),
            title: Some(ERROR_TITLE.to_string()),
            title_link: Some(APOD_PIX_URL.to_string()),
            text: Some(error),
            author,
            ..Default::default()
        });
    }

    let title = display(require(data, "title")?);
    let explanation = display(require(data, "explanation")?);
    let url = display(require(data, "url")?);

    Ok(OutboundMessage {
        headline: headline(date),
        title: Some(title),
        title_link: Some(APOD_PIX_URL.to_string()),
        text: Some(explanation),
        fields: Vec::new(),
        image_url: Some(url),
        author,
    })
}

/// "Astronomy Picture of the Day - Wed January 01, 2020"
pub fn headline(date: NaiveDate) -> String {
    format!("{}{}", HEADLINE_PREFIX, date.format("%a %B %d, %Y"))
}

fn upstream_error(data: &Value) -> Option<String> {
    match data.get("error")? {
        Value::String(s) => Some(s.clone()),
        Value::Object(obj) => Some(
            obj.get("message")
                .map(display)
                .unwrap_or_else(|| Value::Object(obj.clone()).to_string()),
        ),
        other => Some(display(other)),
    }
}
