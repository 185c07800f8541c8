//! Location-permission handling for the whindy native bridge.
//!
//! The operating system owns the permission state; this crate only observes
//! it and fires the interactive prompt. The user's decision is delivered
//! later through an OS callback, never as a return value here.

#![warn(missing_docs)]

/// Platform-specific implementations.
pub mod sys;

use thiserror::Error;

/// Location permissions the bridge can observe and request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Permission {
    /// Precise (GPS-grade) location access.
    FineLocation,
    /// Coarse (network-grade) location access.
    CoarseLocation,
}

impl Permission {
    /// The Android manifest name for this permission.
    #[must_use]
    pub const fn android_name(self) -> &'static str {
        match self {
            Self::FineLocation => "android.permission.ACCESS_FINE_LOCATION",
            Self::CoarseLocation => "android.permission.ACCESS_COARSE_LOCATION",
        }
    }
}

/// The permission state as last observed from the operating system.
///
/// Apple's `restricted` authorization normalizes to [`Denied`]: the prompt
/// cannot change it, so the bridge treats it as a terminal denial.
///
/// [`Denied`]: PermissionState::Denied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PermissionState {
    /// The user has not been asked yet.
    Undetermined,
    /// Access has been granted.
    Granted,
    /// Access has been denied (or is restricted by policy).
    Denied,
}

/// Errors that can occur when observing or requesting permissions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PermissionError {
    /// Interactive permission requests are not supported on this platform.
    #[error("permission requests not supported on this platform")]
    NotSupported,
    /// The platform reported a status this crate cannot interpret.
    #[error("unknown permission error: {0}")]
    Unknown(String),
}

/// Check the current state of a location permission.
///
/// On Android the state is tied to an `Activity`; use
/// `sys::android::check_with_activity` there instead.
///
/// # Errors
/// Returns [`PermissionError::Unknown`] when the platform reports a status
/// outside the known set.
pub fn check(permission: Permission) -> Result<PermissionState, PermissionError> {
    sys::check(permission)
}

/// Fire the interactive permission prompt and return immediately.
///
/// The user's decision arrives asynchronously through the platform's
/// permission callback; this call never blocks on the prompt.
///
/// # Errors
/// Returns an error if the prompt cannot be shown on this platform.
pub fn request(permission: Permission) -> Result<(), PermissionError> {
    sys::request(permission)
}
