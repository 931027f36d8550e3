//! Latest Martian weather report from Curiosity's REMS instrument
//!
//! The API wraps <http://cab.inta-csic.es/rems/rems_weather.xml>; only the
//! inner `report` object is used.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

use super::{display, require, Request, Source, SourceId};
use crate::error::Error;
use crate::http::{get_json, HttpClient};
use crate::message::{Field, OutboundMessage};
use crate::Result;

pub const MARS_WEATHER_API_URL: &str = "http://marsweather.ingenology.com/v1/latest";

pub const HEADLINE: &str = ":star: *Latest Martian Weather Report From Curiosity* :star:";

/// Mars weather source
pub struct MarsWeatherSource {
    http: Arc<dyn HttpClient>,
    base_url: String,
}

impl MarsWeatherSource {
    pub fn new(http: Arc<dyn HttpClient>) -> Self {
        Self {
            http,
            base_url: MARS_WEATHER_API_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.to_string();
        self
    }
}

#[async_trait]
impl Source for MarsWeatherSource {
    fn id(&self) -> SourceId {
        SourceId::MarsWeather
    }

    fn help(&self) -> &str {
        "*{name} mars weather:* Displays the latest weather report from the Curiosity rover on Mars."
    }

    async fn fetch(&self, request: &Request) -> Result<OutboundMessage> {
        if *request != Request::MarsWeather {
            return Err(Error::Other(format!("Mars weather cannot handle {:?}", request)));
        }

        info!("Fetching latest Mars weather report");
        let data = get_json(self.http.as_ref(), &self.base_url, &[]).await?;
        debug!("Mars Weather response: {}", data);
        render(require(&data, "report")?)
    }
}

/// Slack emoji for an `atmo_opacity` value.
pub fn weather_emoji(opacity: &str) -> &'static str {
    match opacity {
        "Cloudy" => ":cloud:",
        "Dust_devils_and_strong_winds" | "Windy" => ":dash:",
        "Fog" => ":foggy:",
        "Frost" | "Ice_and_fog" | "Snow" => ":snowflake:",
        "Storm" => ":umbrella:",
        "Sunny_and_cloudy" => ":partly_sunny:",
        "Sunny" => ":sunny:",
        _ => ":question:",
    }
}

fn pressure_trend(pressure_string: &str) -> &'static str {
    if pressure_string == "Higher" {
        "above average"
    } else {
        "below average"
    }
}

/// Render the inner `report` object.
pub fn render(report: &Value) -> Result<OutboundMessage> {
    let field = |key: &str| require(report, key).map(display);
    // Curiosity reports null readings when a sensor is down
    let reading = |key: &str| -> Result<String> {
        report
            .get(key)
            .map(display)
            .ok_or_else(|| Error::MalformedPayload(format!("missing field '{}'", key)))
    };

    let opacity = field("atmo_opacity")?;

    let fields = vec![
        Field::new("Terrestrial Date", field("terrestrial_date")?),
        Field::new("Sol", field("sol")?),
        Field::new("Solar Longitude", format!("{} degrees", field("ls")?)),
        Field::new("Season", field("season")?),
        Field::new(
            "Atmospheric Conditions",
            format!("{} {}", opacity, weather_emoji(&opacity)),
        ),
        Field::new(
            "Minimum Temperature",
            format!("{} F ({} C)", reading("min_temp_fahrenheit")?, reading("min_temp")?),
        ),
        Field::new(
            "Maximum Temperature",
            format!("{} F ({} C)", reading("max_temp_fahrenheit")?, reading("max_temp")?),
        ),
        Field::new(
            "Atmospheric Pressure",
            format!(
                "{} Pa ({})",
                reading("pressure")?,
                pressure_trend(&reading("pressure_string")?)
            ),
        ),
        Field::new("Relative Humidity", format!("{} %", reading("abs_humidity")?)),
        Field::new("Wind Speed", format!("{} m/s", reading("wind_speed")?)),
        Field::new("Wind Direction", reading("wind_direction")?),
        Field::new("Sunrise :sunrise:", field("sunrise")?),
        Field::new("Sunset :sunrise_over_mountains:", field("sunset")?),
    ];

    Ok(OutboundMessage {
        headline: HEADLINE.to_string(),
        fields,
        ..Default::default()
    })
}
