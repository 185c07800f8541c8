//! Android permission implementation using JNI.

use crate::{Permission, PermissionError, PermissionState};
use jni::JNIEnv;
use jni::objects::{JObject, JValue};
use jni::sys::jint;

/// `PackageManager.PERMISSION_GRANTED`.
const PERMISSION_GRANTED: jint = 0;

/// Request code passed to `Activity.requestPermissions`.
///
/// The embedding activity must forward `onRequestPermissionsResult` calls
/// carrying this code to the bridge's native entry point.
pub const LOCATION_REQUEST_CODE: jint = 1;

/// Check a location permission against the given Activity.
///
/// Android exposes only a granted/not-granted flag when reading the state,
/// so a non-granted permission reports [`PermissionState::Undetermined`];
/// an actual denial is only observable through the request callback.
///
/// # Errors
/// Returns [`PermissionError::Unknown`] if the underlying JNI call fails.
pub fn check_with_activity(
    env: &mut JNIEnv<'_>,
    activity: &JObject<'_>,
    permission: Permission,
) -> Result<PermissionState, PermissionError> {
    let name = env
        .new_string(permission.android_name())
        .map_err(jni_error)?;

    let status = env
        .call_method(
            activity,
            "checkSelfPermission",
            "(Ljava/lang/String;)I",
            &[JValue::Object(&name)],
        )
        .map_err(jni_error)?
        .i()
        .map_err(jni_error)?;

    Ok(if status == PERMISSION_GRANTED {
        PermissionState::Granted
    } else {
        PermissionState::Undetermined
    })
}

/// Show the interactive permission prompt via `Activity.requestPermissions`.
///
/// Returns as soon as the prompt is queued; the decision is delivered to the
/// activity's `onRequestPermissionsResult` with [`LOCATION_REQUEST_CODE`].
///
/// # Errors
/// Returns [`PermissionError::Unknown`] if the underlying JNI call fails.
pub fn request_with_activity(
    env: &mut JNIEnv<'_>,
    activity: &JObject<'_>,
    permission: Permission,
) -> Result<(), PermissionError> {
    let name = env
        .new_string(permission.android_name())
        .map_err(jni_error)?;

    let names = env
        .new_object_array(1, "java/lang/String", &name)
        .map_err(jni_error)?;

    env.call_method(
        activity,
        "requestPermissions",
        "([Ljava/lang/String;I)V",
        &[
            JValue::Object(&names),
            JValue::Int(LOCATION_REQUEST_CODE),
        ],
    )
    .map_err(jni_error)?;

    Ok(())
}

fn jni_error(err: jni::errors::Error) -> PermissionError {
    PermissionError::Unknown(err.to_string())
}

// Context-free wrappers for the crate surface; Android needs an Activity.
pub(crate) fn check(_permission: Permission) -> Result<PermissionState, PermissionError> {
    Ok(PermissionState::Undetermined)
}

pub(crate) fn request(_permission: Permission) -> Result<(), PermissionError> {
    Err(PermissionError::Unknown(
        "Android: use request_with_activity() with an Activity".into(),
    ))
}
