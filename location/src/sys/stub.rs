//! Host stub for platforms without a positioning service.

use crate::provider::{FixSource, PositioningProvider};
use crate::{Coordinate, LocationError, Permission, PermissionState};

/// Provider for hosts without positioning.
///
/// The permission stays undetermined, the prompt cannot be shown, no
/// provider is enabled and no fix is ever returned. Keeps the crate
/// building and testable off-device.
#[derive(Debug, Default, Clone, Copy)]
pub struct StubProvider;

impl PositioningProvider for StubProvider {
    fn permission_state(&self) -> Result<PermissionState, LocationError> {
        whindy_permission::check(Permission::FineLocation)
            .map_err(|err| LocationError::Unknown(err.to_string()))
    }

    fn request_permission(&self) -> Result<(), LocationError> {
        whindy_permission::request(Permission::FineLocation)
            .map_err(|err| LocationError::Unknown(err.to_string()))
    }

    fn positioning_enabled(&self) -> bool {
        false
    }

    fn last_known_fix(&self, _source: FixSource) -> Option<Coordinate> {
        None
    }
}
