//! Process-wide JVM bridge and its Rust entry points
//!
//! Native methods reach the JVM through these functions. The bridge is
//! initialized once from `JNI_OnLoad` (see [`on_load`]); everything else
//! reads the write-once state lock-free.

use crate::config::BridgeConfig;
use crate::runtime::{JniContext, JniRuntime};
use jni::objects::{JObject, JString};
use jni::sys::{jint, JNI_ERR, JNI_VERSION_1_6};
use jni::{JNIEnv, JavaVM};
use tether_core::{Bridge, BridgeError, ByteBuffer};

static BRIDGE: Bridge<JniRuntime> = Bridge::new();

#[inline]
pub fn bridge() -> &'static Bridge<JniRuntime> {
    &BRIDGE
}

/// Stores `vm` and resolves the string capabilities on the loading thread.
pub fn initialize_bridge(
    vm: JavaVM,
    env: JNIEnv<'_>,
    config: BridgeConfig,
) -> Result<(), BridgeError> {
    let runtime = JniRuntime::with_config(vm, config);
    let mut ctx = runtime.context(env);
    BRIDGE.initialize(runtime, &mut ctx)?;
    tracing::info!("Tether bridge v{} ready", tether_core::VERSION);
    Ok(())
}

/// Body for a library's `JNI_OnLoad`.
///
/// Reads [`BridgeConfig::from_env`], initializes the bridge and returns the
/// JNI version to report, or `JNI_ERR` so the JVM refuses the library rather
/// than running with a half-initialized bridge.
pub fn on_load(vm: JavaVM) -> jint {
    let config = match BridgeConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(%err, "bridge config rejected");
            return JNI_ERR;
        }
    };

    let env = match vm.get_env() {
        Ok(env) => env.get_raw(),
        Err(err) => {
            tracing::error!(%err, "JNI_OnLoad called without a JNIEnv");
            return JNI_ERR;
        }
    };
    // SAFETY: `env` belongs to the loading thread, which stays attached for
    // the whole of JNI_OnLoad.
    let env = match unsafe { JNIEnv::from_raw(env) } {
        Ok(env) => env,
        Err(err) => {
            tracing::error!(%err, "invalid JNIEnv");
            return JNI_ERR;
        }
    };

    match initialize_bridge(vm, env, config) {
        Ok(()) => JNI_VERSION_1_6,
        Err(err) => {
            tracing::error!(%err, "bridge initialization failed");
            JNI_ERR
        }
    }
}

pub fn get_runtime() -> Result<&'static JniRuntime, BridgeError> {
    BRIDGE.runtime()
}

/// Copies a Java string's bytes out. A null reference yields `None`.
pub fn native_from_managed<'local>(
    ctx: &mut JniContext<'local>,
    string: &JString<'local>,
) -> Result<Option<ByteBuffer>, BridgeError> {
    let string = (!string.is_null()).then_some(string);
    BRIDGE.native_from_managed(ctx, string)
}

/// Builds a Java string from native bytes. `None` yields a null reference.
pub fn managed_from_native<'local>(
    ctx: &mut JniContext<'local>,
    bytes: Option<&[u8]>,
) -> Result<JString<'local>, BridgeError> {
    Ok(BRIDGE
        .managed_from_native(ctx, bytes)?
        .unwrap_or_else(|| JString::from(JObject::null())))
}

/// Runs `body` with a JNI context for the current thread, attaching it for
/// the duration if needed.
///
/// The closure works for any `'local`, so local references cannot leave it;
/// copy what you need into owned values first:
///
/// ```compile_fail
/// let string = tether_jni::with_attachment(|ctx| {
///     tether_jni::managed_from_native(ctx, Some(b"x".as_slice()))
/// });
/// ```
pub fn with_attachment<F, T>(body: F) -> Result<T, BridgeError>
where
    F: for<'local> FnOnce(&mut JniContext<'local>) -> T,
{
    BRIDGE.with_attachment(body)
}

pub fn drain_exceptions(ctx: &mut JniContext<'_>) -> bool {
    BRIDGE.drain_exceptions(ctx)
}
