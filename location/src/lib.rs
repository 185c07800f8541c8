//! Cross-platform location bridge for the whindy app.
//!
//! One component, [`LocationBridge`], answers the `getCurrentLocation`
//! method call: it observes the location permission (prompting interactively
//! when undetermined), reads the device's last-known fix from the positioning
//! providers in priority order, and delivers exactly one reply per request.
//!
//! Platform positioning lives behind the [`PositioningProvider`] trait, with
//! adapters for Android (JNI) and Apple (swift-bridge) under [`sys`].

#![warn(missing_docs)]

mod bridge;
mod channel;
mod provider;
/// Platform-specific positioning adapters.
pub mod sys;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use bridge::LocationBridge;
pub use channel::{
    CHANNEL_NAME, ErrorCode, METHOD_GET_CURRENT_LOCATION, Outcome, ReplyChannel,
};
pub use provider::{FixSource, PositioningProvider};
pub use whindy_permission::{Permission, PermissionState};

/// A geographic coordinate pair.
///
/// Values are passed through exactly as the positioning service reported
/// them; no range validation is performed. Serializes to the wire shape
/// `{ "latitude": <f64>, "longitude": <f64> }`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
}

/// Errors that can terminate a location request.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LocationError {
    /// The user or system declined location access.
    #[error("location permission was denied")]
    PermissionDenied,
    /// Permission is granted but no fix could be obtained.
    #[error("location not available")]
    Unavailable,
    /// A request is already in progress; only one may be outstanding.
    #[error("a location request is already in progress")]
    Busy,
    /// The method name was not recognized.
    #[error("method not implemented")]
    NotImplemented,
    /// An unexpected platform state or fault was observed.
    #[error("unknown error: {0}")]
    Unknown(String),
}
