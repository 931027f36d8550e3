//! SpaceBot - a Slack bot for space enthusiasts
//!
//! Answers commands in one channel with NASA's Astronomy Picture of the Day,
//! the current position of the International Space Station and the latest
//! Mars weather report, and can post the APOD unattended once a day.

pub mod adapters;
pub mod bot;
pub mod config;
pub mod error;
pub mod geo;
pub mod http;
pub mod logging;
pub mod message;
pub mod router;
pub mod scheduler;
pub mod sources;

pub use error::{Error, Result};
