//! The positioning capability the bridge runs against.

use crate::{Coordinate, LocationError, PermissionState};

/// A named source of cached position data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FixSource {
    /// Satellite-based provider.
    Gps,
    /// Cell/Wi-Fi based provider.
    Network,
    /// Coarse passive provider fed by other apps' requests.
    Passive,
}

impl FixSource {
    /// Query order for last-known fixes: most accurate source first.
    pub const PRIORITY: [Self; 3] = [Self::Gps, Self::Network, Self::Passive];

    /// The Android `LocationManager` provider name.
    #[must_use]
    pub const fn provider_name(self) -> &'static str {
        match self {
            Self::Gps => "gps",
            Self::Network => "network",
            Self::Passive => "passive",
        }
    }
}

/// Platform positioning capability used by the bridge.
///
/// Adapters are expected to be quick, non-blocking reads of cached OS state;
/// none of these calls may wait for a fresh fix. Faults while reading a fix
/// are swallowed by returning `None`.
pub trait PositioningProvider: Send + Sync {
    /// Observe the current location-permission state.
    ///
    /// # Errors
    /// Returns [`LocationError::Unknown`] when the platform reports an
    /// authorization status outside the known set.
    fn permission_state(&self) -> Result<PermissionState, LocationError>;

    /// Fire the interactive permission prompt and return immediately.
    ///
    /// The decision reaches the bridge later through
    /// `LocationBridge::on_permission_decision`.
    ///
    /// # Errors
    /// Returns an error if the prompt cannot be shown.
    fn request_permission(&self) -> Result<(), LocationError>;

    /// Whether any positioning provider is enabled on the device.
    fn positioning_enabled(&self) -> bool;

    /// Read the cached last-known fix of one source, if it has one.
    fn last_known_fix(&self, source: FixSource) -> Option<Coordinate>;
}
