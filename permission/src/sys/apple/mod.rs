//! Apple platform (iOS/macOS) permission implementation using swift-bridge.

use crate::{Permission, PermissionError, PermissionState};

#[swift_bridge::bridge]
mod ffi {
    // Mirrors CLAuthorizationStatus, with a sentinel for @unknown default.
    enum AuthorizationStatus {
        NotDetermined,
        Restricted,
        Denied,
        AuthorizedWhenInUse,
        AuthorizedAlways,
        Unknown,
    }

    extern "Swift" {
        fn authorization_status() -> AuthorizationStatus;
        fn request_when_in_use_authorization();
    }
}

const fn state_from_ffi(status: ffi::AuthorizationStatus) -> Option<PermissionState> {
    match status {
        ffi::AuthorizationStatus::NotDetermined => Some(PermissionState::Undetermined),
        ffi::AuthorizationStatus::Restricted | ffi::AuthorizationStatus::Denied => {
            Some(PermissionState::Denied)
        }
        ffi::AuthorizationStatus::AuthorizedWhenInUse
        | ffi::AuthorizationStatus::AuthorizedAlways => Some(PermissionState::Granted),
        ffi::AuthorizationStatus::Unknown => None,
    }
}

/// Check location authorization on Apple platforms.
///
/// Both permission kinds map to when-in-use authorization; CoreLocation does
/// not distinguish fine from coarse at this level.
pub(crate) fn check(_permission: Permission) -> Result<PermissionState, PermissionError> {
    state_from_ffi(ffi::authorization_status())
        .ok_or_else(|| PermissionError::Unknown("unrecognized authorization status".into()))
}

/// Fire the when-in-use authorization prompt.
///
/// The decision arrives through the CoreLocation delegate, not here.
pub(crate) fn request(_permission: Permission) -> Result<(), PermissionError> {
    ffi::request_when_in_use_authorization();
    Ok(())
}
