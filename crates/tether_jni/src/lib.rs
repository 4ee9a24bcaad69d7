//! Tether JNI
//!
//! JVM backend for `tether_core`, built on the `jni` crate.
//!
//! ## Usage
//!
//! Initialize once from the library's `JNI_OnLoad`, then wrap every native
//! entry point that may run on a foreign thread in [`with_attachment`]:
//!
//! ```ignore
//! #[no_mangle]
//! pub extern "system" fn JNI_OnLoad(vm: JavaVM, _: *mut c_void) -> jint {
//!     tether_jni::on_load(vm)
//! }
//!
//! tether_jni::with_attachment(|ctx| {
//!     let string = tether_jni::managed_from_native(ctx, Some(b"hello".as_slice()))?;
//!     tether_jni::native_from_managed(ctx, &string)
//! })??;
//! ```
//!
//! C callers use the `tether_*` functions in [`ffi`].

pub mod bridge;
pub mod config;
pub mod ffi;
pub mod runtime;

pub use bridge::{
    bridge, drain_exceptions, get_runtime, initialize_bridge, managed_from_native,
    native_from_managed, on_load, with_attachment,
};
pub use config::{BridgeConfig, ConfigError};
pub use runtime::{JniContext, JniRuntime, StringCapabilities};
pub use tether_core::{release, BridgeError, ByteBuffer};

pub use jni;
pub use tether_core;
