//! # Whindy native
//!
//! Platform glue for the whindy mobile app: a single native bridge that
//! answers the `getCurrentLocation` method call with the device's last-known
//! coordinates.
//!
//! The crates are modular; enable only what you need:
//!
//! - `location`: the location bridge and per-platform positioning adapters.
//! - `permission`: permission state observation and request plumbing.
//!
//! ## Example
//!
//! ```toml
//! [dependencies]
//! whindy-native = { version = "0.1", features = ["location"] }
//! ```

#[cfg(feature = "location")]
pub use whindy_location as location;

#[cfg(feature = "permission")]
pub use whindy_permission as permission;
