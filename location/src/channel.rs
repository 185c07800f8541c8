//! The reply surface of the method channel.
//!
//! A [`ReplyChannel`] is write-once: exactly one of its methods is invoked
//! for a request, enforced by consuming `Box<Self>`.

use crate::{Coordinate, LocationError};

/// Name of the method channel shared with the application layer.
pub const CHANNEL_NAME: &str = "com.whindy.location";

/// The single method the bridge recognizes.
pub const METHOD_GET_CURRENT_LOCATION: &str = "getCurrentLocation";

/// Typed failure delivered through a reply channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// The user declined the permission prompt (or access is restricted).
    PermissionDenied,
    /// No location could be determined.
    Unavailable,
    /// A request was already pending when a new one arrived.
    Busy,
    /// An unexpected permission state or platform fault was observed.
    Unknown,
}

impl ErrorCode {
    /// The wire code sent back to the application layer.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::PermissionDenied => "PERMISSION_DENIED",
            Self::Unavailable => "UNAVAILABLE",
            Self::Busy => "BUSY",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// The canonical human-readable message for this code.
    #[must_use]
    pub const fn default_message(self) -> &'static str {
        match self {
            Self::PermissionDenied => "Location permission was denied.",
            Self::Unavailable => "Location not available.",
            Self::Busy => "A location request is already in progress.",
            Self::Unknown => "Unknown authorization status.",
        }
    }
}

/// The single-use handle through which one outcome reaches the caller.
pub trait ReplyChannel: Send {
    /// Deliver the coordinates of a successful fix.
    fn succeed(self: Box<Self>, coordinate: Coordinate);

    /// Deliver a typed failure.
    fn fail(self: Box<Self>, code: ErrorCode, message: &str);

    /// Report that the method name was not recognized.
    fn not_implemented(self: Box<Self>);
}

/// An owned record of a delivered reply.
///
/// Used by the async facade and by tests; platform reply channels translate
/// directly to their host representation instead.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The request succeeded with a coordinate pair.
    Success(Coordinate),
    /// The request failed with a wire code and message.
    Failure {
        /// Typed failure code.
        code: ErrorCode,
        /// Human-readable message.
        message: String,
    },
    /// The method name was not recognized.
    NotImplemented,
}

impl Outcome {
    /// Convert the outcome into the typed result used by the async facade.
    ///
    /// # Errors
    /// Maps every non-success outcome onto the matching [`LocationError`].
    pub fn into_result(self) -> Result<Coordinate, LocationError> {
        match self {
            Self::Success(coordinate) => Ok(coordinate),
            Self::Failure { code, message } => Err(match code {
                ErrorCode::PermissionDenied => LocationError::PermissionDenied,
                ErrorCode::Unavailable => LocationError::Unavailable,
                ErrorCode::Busy => LocationError::Busy,
                ErrorCode::Unknown => LocationError::Unknown(message),
            }),
            Self::NotImplemented => Err(LocationError::NotImplemented),
        }
    }
}
