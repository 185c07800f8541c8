//! Platform-specific positioning adapters.

/// Apple platform adapter.
#[cfg(any(target_os = "ios", target_os = "macos"))]
pub mod apple;

/// Android platform adapter.
#[cfg(target_os = "android")]
pub mod android;

#[cfg(not(any(target_os = "ios", target_os = "macos", target_os = "android")))]
mod stub;

// Re-export platform adapters
#[cfg(any(target_os = "ios", target_os = "macos"))]
pub use apple::{AppleProvider, register_bridge};

#[cfg(target_os = "android")]
pub use android::{AndroidProvider, register_bridge};

#[cfg(not(any(target_os = "ios", target_os = "macos", target_os = "android")))]
pub use stub::StubProvider;
