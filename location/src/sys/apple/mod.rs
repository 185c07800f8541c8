//! Apple platform (iOS/macOS) positioning adapter using swift-bridge.
//!
//! The Swift side owns a `CLLocationManager` and installs itself as its
//! delegate; authorization changes come back through [`AuthorizationRelay`]
//! and method calls through `handle_method_call`. Fixes are the manager's
//! cached `location` value, never a live one-shot request.

use std::fmt;
use std::sync::{Arc, Mutex, OnceLock};

use log::{debug, error};

use crate::channel::{ErrorCode, ReplyChannel};
use crate::provider::{FixSource, PositioningProvider};
use crate::{Coordinate, LocationBridge, LocationError, Permission, PermissionState};

#[swift_bridge::bridge]
mod ffi {
    extern "Rust" {
        type AuthorizationRelay;

        fn dispatch_decision(self: &AuthorizationRelay, raw_status: i32);

        fn handle_method_call(method: String, reply: MethodReply);
    }

    extern "Swift" {
        type AppleLocationService;

        #[swift_bridge(init)]
        fn new(relay: AuthorizationRelay) -> AppleLocationService;

        fn location_services_enabled(self: &AppleLocationService) -> bool;
        // Empty string when no cached fix exists, otherwise
        // {"latitude": <f64>, "longitude": <f64>}.
        fn cached_fix_json(self: &AppleLocationService) -> String;

        type MethodReply;

        fn reply_success(self: &MethodReply, payload_json: String);
        fn reply_error(self: &MethodReply, code: String, message: String);
        fn reply_not_implemented(self: &MethodReply);
    }
}

// CLAuthorizationStatus raw values.
const CL_NOT_DETERMINED: i32 = 0;
const CL_AUTHORIZED_ALWAYS: i32 = 3;
const CL_AUTHORIZED_WHEN_IN_USE: i32 = 4;

fn registry() -> &'static Mutex<Option<Arc<LocationBridge>>> {
    static REGISTRY: OnceLock<Mutex<Option<Arc<LocationBridge>>>> = OnceLock::new();
    REGISTRY.get_or_init(|| Mutex::new(None))
}

/// Register the bridge that the Swift callbacks forward to.
pub fn register_bridge(bridge: Arc<LocationBridge>) {
    *registry().lock().expect("bridge registry mutex poisoned") = Some(bridge);
}

fn registered_bridge() -> Option<Arc<LocationBridge>> {
    registry()
        .lock()
        .expect("bridge registry mutex poisoned")
        .clone()
}

/// Forwards CoreLocation authorization changes to the registered bridge.
pub struct AuthorizationRelay;

impl AuthorizationRelay {
    fn dispatch_decision(&self, raw_status: i32) {
        let state = match raw_status {
            // The prompt is still open; no decision yet.
            CL_NOT_DETERMINED => return,
            CL_AUTHORIZED_ALWAYS | CL_AUTHORIZED_WHEN_IN_USE => PermissionState::Granted,
            // Denied, restricted and anything unrecognized all terminate
            // the request as a denial.
            _ => PermissionState::Denied,
        };

        match registered_bridge() {
            Some(bridge) => bridge.on_permission_decision(state),
            None => debug!("authorization change arrived before a bridge was registered"),
        }
    }
}

/// Positioning adapter over the Apple CoreLocation stack.
pub struct AppleProvider {
    service: Mutex<Option<ffi::AppleLocationService>>,
}

// Safety: the Swift service is only touched behind the mutex, and the relay
// holds no reference to it. The raw pointer inside is managed by Swift.
#[allow(clippy::non_send_fields_in_send_ty)]
unsafe impl Send for AppleProvider {}
unsafe impl Sync for AppleProvider {}

impl fmt::Debug for AppleProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppleProvider").finish()
    }
}

impl AppleProvider {
    /// Create the adapter.
    ///
    /// The CoreLocation manager is constructed lazily on first use, so the
    /// adapter can be created before the app finishes launching.
    #[must_use]
    pub fn new() -> Self {
        Self {
            service: Mutex::new(None),
        }
    }

    fn with_service<T>(&self, f: impl FnOnce(&ffi::AppleLocationService) -> T) -> T {
        let mut guard = self.service.lock().expect("apple service mutex poisoned");
        let service =
            guard.get_or_insert_with(|| ffi::AppleLocationService::new(AuthorizationRelay));
        f(service)
    }
}

impl Default for AppleProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl PositioningProvider for AppleProvider {
    fn permission_state(&self) -> Result<PermissionState, LocationError> {
        whindy_permission::check(Permission::FineLocation)
            .map_err(|err| LocationError::Unknown(err.to_string()))
    }

    fn request_permission(&self) -> Result<(), LocationError> {
        // Instantiating the service installs the delegate before the prompt
        // opens, so the decision callback cannot be missed.
        self.with_service(|_| ());
        whindy_permission::request(Permission::FineLocation)
            .map_err(|err| LocationError::Unknown(err.to_string()))
    }

    fn positioning_enabled(&self) -> bool {
        self.with_service(|service| service.location_services_enabled())
    }

    fn last_known_fix(&self, source: FixSource) -> Option<Coordinate> {
        // CoreLocation keeps a single cache; report it as the GPS source.
        if source != FixSource::Gps {
            return None;
        }

        let json = self.with_service(|service| service.cached_fix_json());
        if json.is_empty() {
            return None;
        }

        match serde_json::from_str(&json) {
            Ok(coordinate) => Some(coordinate),
            Err(err) => {
                error!("failed to parse cached fix payload: {err}");
                None
            }
        }
    }
}

/// Reply channel over a `FlutterResult` closure held on the Swift side.
struct SwiftReplyChannel {
    reply: ffi::MethodReply,
}

// Safety: the reply object is invoked exactly once; the Swift side hops to
// the main queue before touching Flutter.
unsafe impl Send for SwiftReplyChannel {}

impl ReplyChannel for SwiftReplyChannel {
    fn succeed(self: Box<Self>, coordinate: Coordinate) {
        match serde_json::to_string(&coordinate) {
            Ok(payload) => self.reply.reply_success(payload),
            Err(err) => {
                error!("failed to encode fix payload: {err}");
                self.reply.reply_error(
                    ErrorCode::Unknown.code().into(),
                    "Failed to encode location payload.".into(),
                );
            }
        }
    }

    fn fail(self: Box<Self>, code: ErrorCode, message: &str) {
        self.reply.reply_error(code.code().into(), message.into());
    }

    fn not_implemented(self: Box<Self>) {
        self.reply.reply_not_implemented();
    }
}

/// Entry point for the Swift method-channel handler.
fn handle_method_call(method: String, reply: ffi::MethodReply) {
    let reply: Box<dyn ReplyChannel> = Box::new(SwiftReplyChannel { reply });

    match registered_bridge() {
        Some(bridge) => bridge.handle(&method, reply),
        None => {
            error!("method call arrived before a bridge was registered");
            reply.fail(ErrorCode::Unknown, "Location bridge not initialized.");
        }
    }
}
