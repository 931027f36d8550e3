//! International Space Station position

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};
use url::Url;

use super::{display, require, Request, Source, SourceId};
use crate::error::Error;
use crate::geo;
use crate::http::{get_json, HttpClient};
use crate::message::{Field, OutboundMessage};
use crate::Result;

pub const ISS_API_URL: &str = "https://api.wheretheiss.at/v1/satellites/25544";
const STATIC_MAP_URL: &str = "https://maps.googleapis.com/maps/api/staticmap";

/// Google Maps zoom used when none is given
pub const DEFAULT_ZOOM: u8 = 1;
pub const MAX_ZOOM: u8 = 21;

pub const HEADLINE: &str = ":star: *Current Position of the ISS* :star:";

/// ISS telemetry source
pub struct IssSource {
    http: Arc<dyn HttpClient>,
    base_url: String,
}

impl IssSource {
    pub fn new(http: Arc<dyn HttpClient>) -> Self {
        Self {
            http,
            base_url: ISS_API_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.to_string();
        self
    }

    async fn telemetry(&self) -> Result<Value> {
        let data = get_json(self.http.as_ref(), &self.base_url, &[]).await?;
        debug!("ISS location response: {}", data);
        Ok(data)
    }
}

#[async_trait]
impl Source for IssSource {
    fn id(&self) -> SourceId {
        SourceId::Iss
    }

    fn help(&self) -> &str {
        "*{name} ISS [zoom 0-21]:* Displays information about the current location of the \
         International Space Station. The `zoom` parameter specifies the Google Maps zoom, \
         lower being more zoomed out (optional; defaults to 1).\n\
         *{name} ISS overhead LAT LON:* Tells you whether the ISS is overhead of the given position."
    }

    async fn fetch(&self, request: &Request) -> Result<OutboundMessage> {
        match *request {
            Request::Iss { zoom } => {
                info!("Fetching ISS position (zoom {})", zoom);
                let data = self.telemetry().await?;
                render_position(&data, zoom)
            }
            Request::IssOverhead { lat, lon } => {
                info!("Checking whether the ISS is over {}, {}", lat, lon);
                let data = self.telemetry().await?;
                render_overhead(&data, lat, lon)
            }
            ref other => Err(Error::Other(format!("ISS cannot handle {:?}", other))),
        }
    }
}

/// Where the station is and how much ground it covers.
#[derive(Debug, Clone, Copy)]
struct SubPoint {
    lat: f64,
    lon: f64,
    footprint_km: f64,
}

impl SubPoint {
    fn from_json(data: &Value) -> Result<Self> {
        Ok(Self {
            lat: number(data, "latitude")?,
            lon: number(data, "longitude")?,
            footprint_km: number(data, "footprint")?,
        })
    }
}

fn number(data: &Value, key: &str) -> Result<f64> {
    require(data, key)?
        .as_f64()
        .ok_or_else(|| Error::MalformedPayload(format!("field '{}' is not a number", key)))
}

/// Render the telemetry fields and a map of the sub-point.
pub fn render_position(data: &Value, zoom: u8) -> Result<OutboundMessage> {
    let fields = vec![
        Field::new("Altitude", format!("{} km", display(require(data, "altitude")?))),
        Field::new("Linear Velocity", format!("{} km/hr", display(require(data, "velocity")?))),
        Field::new("Solar Latitude", format!("{} degrees", display(require(data, "solar_lat")?))),
        Field::new("Solar Longitude", format!("{} degrees", display(require(data, "solar_lon")?))),
        Field::new("Latitude", format!("{} degrees", display(require(data, "latitude")?))),
        Field::new("Longitude", format!("{} degrees", display(require(data, "longitude")?))),
        Field::new("Footprint Diameter", format!("{} km", display(require(data, "footprint")?))),
        Field::new("Visibility", display(require(data, "visibility")?)),
    ];

    let sub = SubPoint::from_json(data)?;

    Ok(OutboundMessage {
        headline: HEADLINE.to_string(),
        fields,
        image_url: Some(map_url(sub.lat, sub.lon, zoom)?),
        ..Default::default()
    })
}

/// Render the answer to "is the ISS overhead of (lat, lon)?".
pub fn render_overhead(data: &Value, lat: f64, lon: f64) -> Result<OutboundMessage> {
    let sub = SubPoint::from_json(data)?;
    let distance = geo::great_circle_distance_km(lat, lon, sub.lat, sub.lon);
    let overhead = geo::is_overhead(sub.lat, sub.lon, sub.footprint_km, lat, lon);

    let headline = if overhead {
        format!(":rocket: The ISS is overhead of {}, {} right now!", lat, lon)
    } else {
        format!("The ISS is not overhead of {}, {}.", lat, lon)
    };

    Ok(OutboundMessage {
        headline,
        fields: vec![
            Field::new("Distance", format!("{:.0} km", distance)),
            Field::new("Footprint Radius", format!("{:.0} km", sub.footprint_km / 2.0)),
        ],
        ..Default::default()
    })
}

/// Google static map with a marker on the sub-point.
pub fn map_url(lat: f64, lon: f64, zoom: u8) -> Result<String> {
    let url = Url::parse_with_params(
        STATIC_MAP_URL,
        &[
            ("markers", format!("{},{}", lat, lon)),
            ("zoom", zoom.to_string()),
            ("size", "500x400".to_string()),
        ],
    )
    .map_err(|e| Error::Other(format!("Failed to build map URL: {}", e)))?;
    Ok(url.to_string())
}
