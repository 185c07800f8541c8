//! Android positioning adapter using JNI.
//!
//! The embedding activity wires the bridge up in three steps:
//! 1. construct an [`AndroidProvider`] and a [`LocationBridge`] at startup
//!    and register the bridge with [`register_bridge`];
//! 2. forward calls on the `com.whindy.location` method channel to
//!    `LocationBridge.nativeOnMethodCall`;
//! 3. forward `onRequestPermissionsResult` to
//!    `LocationBridge.nativeOnPermissionResult`.

use std::fmt;
use std::sync::{Arc, Mutex, OnceLock};

use jni::objects::{GlobalRef, JClass, JObject, JString, JValue};
use jni::sys::{jboolean, jint};
use jni::{JNIEnv, JavaVM};
use log::{debug, error};

use crate::channel::{ErrorCode, ReplyChannel};
use crate::provider::{FixSource, PositioningProvider};
use crate::{Coordinate, LocationBridge, LocationError, Permission, PermissionState};
use whindy_permission::sys::android as permission;

fn registry() -> &'static Mutex<Option<Arc<LocationBridge>>> {
    static REGISTRY: OnceLock<Mutex<Option<Arc<LocationBridge>>>> = OnceLock::new();
    REGISTRY.get_or_init(|| Mutex::new(None))
}

/// Register the bridge that the native entry points forward to.
pub fn register_bridge(bridge: Arc<LocationBridge>) {
    *registry().lock().expect("bridge registry mutex poisoned") = Some(bridge);
}

fn registered_bridge() -> Option<Arc<LocationBridge>> {
    registry()
        .lock()
        .expect("bridge registry mutex poisoned")
        .clone()
}

/// Positioning adapter backed by `android.location.LocationManager`.
pub struct AndroidProvider {
    vm: JavaVM,
    activity: GlobalRef,
}

impl fmt::Debug for AndroidProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AndroidProvider").finish()
    }
}

impl AndroidProvider {
    /// Create an adapter bound to the embedding Activity.
    ///
    /// # Errors
    /// Returns an error if the `JavaVM` handle or a global reference to the
    /// activity cannot be obtained.
    pub fn new(env: &JNIEnv<'_>, activity: JObject<'_>) -> Result<Self, LocationError> {
        let vm = env.get_java_vm().map_err(jni_error)?;
        let activity = env.new_global_ref(activity).map_err(jni_error)?;
        Ok(Self { vm, activity })
    }

    fn with_env<T>(
        &self,
        f: impl FnOnce(&mut JNIEnv<'_>) -> Result<T, LocationError>,
    ) -> Result<T, LocationError> {
        let mut env = self.vm.attach_current_thread().map_err(jni_error)?;
        let result = f(&mut env);
        if result.is_err() {
            // A failed framework call may leave a Java exception pending.
            let _ = env.exception_clear();
        }
        result
    }
}

impl PositioningProvider for AndroidProvider {
    fn permission_state(&self) -> Result<PermissionState, LocationError> {
        self.with_env(|env| {
            permission::check_with_activity(env, self.activity.as_obj(), Permission::FineLocation)
                .map_err(|err| LocationError::Unknown(err.to_string()))
        })
    }

    fn request_permission(&self) -> Result<(), LocationError> {
        self.with_env(|env| {
            permission::request_with_activity(env, self.activity.as_obj(), Permission::FineLocation)
                .map_err(|err| LocationError::Unknown(err.to_string()))
        })
    }

    fn positioning_enabled(&self) -> bool {
        self.with_env(|env| {
            let manager = location_manager(env, self.activity.as_obj())?;
            Ok(provider_enabled(env, &manager, FixSource::Gps)?
                || provider_enabled(env, &manager, FixSource::Network)?)
        })
        .unwrap_or_else(|err| {
            error!("failed to query enabled providers: {err}");
            false
        })
    }

    fn last_known_fix(&self, source: FixSource) -> Option<Coordinate> {
        self.with_env(|env| {
            let manager = location_manager(env, self.activity.as_obj())?;
            last_known(env, &manager, source)
        })
        .unwrap_or_else(|err| {
            // Faults while reading a provider normalize to "no location".
            error!("failed to read last-known {source:?} fix: {err}");
            None
        })
    }
}

fn location_manager<'local>(
    env: &mut JNIEnv<'local>,
    activity: &JObject<'_>,
) -> Result<JObject<'local>, LocationError> {
    let service_name = env.new_string("location").map_err(jni_error)?;
    env.call_method(
        activity,
        "getSystemService",
        "(Ljava/lang/String;)Ljava/lang/Object;",
        &[JValue::Object(&service_name)],
    )
    .map_err(jni_error)?
    .l()
    .map_err(jni_error)
}

fn provider_enabled(
    env: &mut JNIEnv<'_>,
    manager: &JObject<'_>,
    source: FixSource,
) -> Result<bool, LocationError> {
    let name = env.new_string(source.provider_name()).map_err(jni_error)?;
    env.call_method(
        manager,
        "isProviderEnabled",
        "(Ljava/lang/String;)Z",
        &[JValue::Object(&name)],
    )
    .map_err(jni_error)?
    .z()
    .map_err(jni_error)
}

fn last_known(
    env: &mut JNIEnv<'_>,
    manager: &JObject<'_>,
    source: FixSource,
) -> Result<Option<Coordinate>, LocationError> {
    let name = env.new_string(source.provider_name()).map_err(jni_error)?;
    let location = env
        .call_method(
            manager,
            "getLastKnownLocation",
            "(Ljava/lang/String;)Landroid/location/Location;",
            &[JValue::Object(&name)],
        )
        .map_err(jni_error)?
        .l()
        .map_err(jni_error)?;

    if location.is_null() {
        return Ok(None);
    }

    let latitude = env
        .call_method(&location, "getLatitude", "()D", &[])
        .map_err(jni_error)?
        .d()
        .map_err(jni_error)?;
    let longitude = env
        .call_method(&location, "getLongitude", "()D", &[])
        .map_err(jni_error)?
        .d()
        .map_err(jni_error)?;

    Ok(Some(Coordinate {
        latitude,
        longitude,
    }))
}

fn jni_error(err: jni::errors::Error) -> LocationError {
    LocationError::Unknown(err.to_string())
}

/// Reply channel over a `MethodChannel.Result` object.
struct MethodChannelReply {
    vm: JavaVM,
    result: GlobalRef,
}

impl MethodChannelReply {
    fn with_env(&self, f: impl FnOnce(&mut JNIEnv<'_>) -> Result<(), LocationError>) {
        match self.vm.attach_current_thread() {
            Ok(mut env) => {
                if let Err(err) = f(&mut env) {
                    let _ = env.exception_clear();
                    error!("failed to deliver method-channel reply: {err}");
                }
            }
            Err(err) => error!("failed to attach reply thread: {err}"),
        }
    }
}

impl ReplyChannel for MethodChannelReply {
    fn succeed(self: Box<Self>, coordinate: Coordinate) {
        self.with_env(|env| {
            let payload = coordinate_map(env, coordinate)?;
            env.call_method(
                self.result.as_obj(),
                "success",
                "(Ljava/lang/Object;)V",
                &[JValue::Object(&payload)],
            )
            .map_err(jni_error)?;
            Ok(())
        });
    }

    fn fail(self: Box<Self>, code: ErrorCode, message: &str) {
        self.with_env(|env| {
            let code = env.new_string(code.code()).map_err(jni_error)?;
            let message = env.new_string(message).map_err(jni_error)?;
            env.call_method(
                self.result.as_obj(),
                "error",
                "(Ljava/lang/String;Ljava/lang/String;Ljava/lang/Object;)V",
                &[
                    JValue::Object(&code),
                    JValue::Object(&message),
                    JValue::Object(&JObject::null()),
                ],
            )
            .map_err(jni_error)?;
            Ok(())
        });
    }

    fn not_implemented(self: Box<Self>) {
        self.with_env(|env| {
            env.call_method(self.result.as_obj(), "notImplemented", "()V", &[])
                .map_err(jni_error)?;
            Ok(())
        });
    }
}

/// Build the `{ latitude, longitude }` HashMap handed back to the channel.
fn coordinate_map<'local>(
    env: &mut JNIEnv<'local>,
    coordinate: Coordinate,
) -> Result<JObject<'local>, LocationError> {
    let map = env
        .new_object("java/util/HashMap", "()V", &[])
        .map_err(jni_error)?;

    for (key, value) in [
        ("latitude", coordinate.latitude),
        ("longitude", coordinate.longitude),
    ] {
        let key = env.new_string(key).map_err(jni_error)?;
        let boxed = env
            .call_static_method(
                "java/lang/Double",
                "valueOf",
                "(D)Ljava/lang/Double;",
                &[JValue::Double(value)],
            )
            .map_err(jni_error)?
            .l()
            .map_err(jni_error)?;
        env.call_method(
            &map,
            "put",
            "(Ljava/lang/Object;Ljava/lang/Object;)Ljava/lang/Object;",
            &[JValue::Object(&key), JValue::Object(&boxed)],
        )
        .map_err(jni_error)?;
    }

    Ok(map)
}

/// `LocationBridge.nativeOnMethodCall(String method, MethodChannel.Result result)`.
#[allow(non_snake_case)]
#[unsafe(no_mangle)]
pub extern "system" fn Java_com_whindy_location_LocationBridge_nativeOnMethodCall(
    mut env: JNIEnv<'_>,
    _class: JClass<'_>,
    method: JString<'_>,
    result: JObject<'_>,
) {
    let method = match env.get_string(&method) {
        Ok(value) => value.to_string_lossy().into_owned(),
        Err(err) => {
            error!("failed to read method name: {err}");
            return;
        }
    };

    let reply: Box<dyn ReplyChannel> = match wrap_result(&env, result) {
        Ok(reply) => reply,
        Err(err) => {
            error!("failed to wrap reply channel: {err}");
            return;
        }
    };

    match registered_bridge() {
        Some(bridge) => bridge.handle(&method, reply),
        None => {
            error!("method call arrived before a bridge was registered");
            reply.fail(ErrorCode::Unknown, "Location bridge not initialized.");
        }
    }
}

fn wrap_result(
    env: &JNIEnv<'_>,
    result: JObject<'_>,
) -> Result<Box<dyn ReplyChannel>, LocationError> {
    let vm = env.get_java_vm().map_err(jni_error)?;
    let result = env.new_global_ref(result).map_err(jni_error)?;
    Ok(Box::new(MethodChannelReply { vm, result }))
}

/// `LocationBridge.nativeOnPermissionResult(int requestCode, boolean granted)`.
///
/// The embedding activity forwards `onRequestPermissionsResult` here; a
/// result with no pending request is a no-op.
#[allow(non_snake_case)]
#[unsafe(no_mangle)]
pub extern "system" fn Java_com_whindy_location_LocationBridge_nativeOnPermissionResult(
    _env: JNIEnv<'_>,
    _class: JClass<'_>,
    request_code: jint,
    granted: jboolean,
) {
    if request_code != permission::LOCATION_REQUEST_CODE {
        return;
    }

    let state = if granted == 0 {
        PermissionState::Denied
    } else {
        PermissionState::Granted
    };

    match registered_bridge() {
        Some(bridge) => bridge.on_permission_decision(state),
        None => debug!("permission result arrived before a bridge was registered"),
    }
}
