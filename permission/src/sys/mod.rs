//! Platform-specific permission implementations.

#[cfg(any(target_os = "ios", target_os = "macos"))]
mod apple;

/// Android platform implementation.
#[cfg(target_os = "android")]
pub mod android;

// Re-export platform implementations
#[cfg(any(target_os = "ios", target_os = "macos"))]
pub(crate) use apple::{check, request};

#[cfg(target_os = "android")]
pub(crate) use android::{check, request};

// Fallback for platforms without an interactive permission model.
#[cfg(not(any(target_os = "ios", target_os = "macos", target_os = "android")))]
pub(crate) fn check(
    _permission: crate::Permission,
) -> Result<crate::PermissionState, crate::PermissionError> {
    Ok(crate::PermissionState::Undetermined)
}

#[cfg(not(any(target_os = "ios", target_os = "macos", target_os = "android")))]
pub(crate) fn request(_permission: crate::Permission) -> Result<(), crate::PermissionError> {
    Err(crate::PermissionError::NotSupported)
}
