//! C ABI for native code outside Rust
//!
//! Mirrors a classic `jni_helper.h`: strings returned to C are `malloc`ed and
//! released with [`tether_release_string`]; scopes are expressed as a
//! [`ScopedJni`] filled by [`tether_attach_thread`] and emptied by
//! [`tether_detach_thread`].

#![allow(clippy::missing_safety_doc)]

use crate::bridge::{self, bridge};
use crate::config::BridgeConfig;
use crate::runtime::JniContext;
use jni::objects::JString;
use jni::sys::{jint, jstring, JNI_ERR, JNI_OK};
use jni::{JNIEnv, JavaVM};
use std::ffi::{c_char, c_int, CStr};
use std::ptr;
use tether_core::attach::{self, AttachmentState};
use tether_core::ByteBuffer;

/// Attachment scope as seen from C.
#[repr(C)]
#[derive(Debug)]
pub struct ScopedJni {
    pub env: *mut jni::sys::JNIEnv,
    pub require_release: c_int,
}

impl ScopedJni {
    pub const fn empty() -> Self {
        Self {
            env: ptr::null_mut(),
            require_release: 0,
        }
    }
}

/// Builds a context for an env handed in from C, sharing the bridge config.
unsafe fn context_from_raw<'local>(env: *mut jni::sys::JNIEnv) -> Option<JniContext<'local>> {
    let config = match bridge::get_runtime() {
        Ok(runtime) => runtime.config_arc(),
        Err(err) => {
            tracing::error!(%err, "C caller used the bridge before initialization");
            return None;
        }
    };
    match JniContext::from_raw(env, config) {
        Ok(ctx) => Some(ctx),
        Err(err) => {
            tracing::error!(%err, "invalid JNIEnv from C caller");
            None
        }
    }
}

/// Copies `buffer` (with its terminator) into `malloc`ed memory.
fn malloc_copy(buffer: &ByteBuffer) -> *mut c_char {
    let bytes = buffer.as_bytes_with_nul();
    // SAFETY: the allocation is exactly `bytes.len()` long and disjoint from it.
    unsafe {
        let out = libc::malloc(bytes.len()).cast::<u8>();
        if out.is_null() {
            return ptr::null_mut();
        }
        ptr::copy_nonoverlapping(bytes.as_ptr(), out, bytes.len());
        out.cast()
    }
}

/// Initializes the bridge from a C host, reading `TETHER_BRIDGE_CONFIG` the
/// same way [`crate::on_load`] does.
#[no_mangle]
pub unsafe extern "C" fn tether_initialize(vm: *mut jni::sys::JavaVM, env: *mut jni::sys::JNIEnv) -> jint {
    let config = match BridgeConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(%err, "bridge config rejected");
            return JNI_ERR;
        }
    };
    let vm = match JavaVM::from_raw(vm) {
        Ok(vm) => vm,
        Err(err) => {
            tracing::error!(%err, "invalid JavaVM pointer");
            return JNI_ERR;
        }
    };
    let env = match JNIEnv::from_raw(env) {
        Ok(env) => env,
        Err(err) => {
            tracing::error!(%err, "invalid JNIEnv pointer");
            return JNI_ERR;
        }
    };
    match bridge::initialize_bridge(vm, env, config) {
        Ok(()) => JNI_OK,
        Err(err) => {
            tracing::error!(%err, "bridge initialization failed");
            JNI_ERR
        }
    }
}

#[no_mangle]
pub extern "C" fn tether_global_java_vm() -> *mut jni::sys::JavaVM {
    bridge::get_runtime()
        .map(|runtime| runtime.vm().get_java_vm_pointer())
        .unwrap_or(ptr::null_mut())
}

/// Returns the bytes of `string` as a NUL-terminated, `malloc`ed C string,
/// or null for a null string or on failure (check for a pending exception).
#[no_mangle]
pub unsafe extern "C" fn tether_get_string(env: *mut jni::sys::JNIEnv, string: jstring) -> *mut c_char {
    if string.is_null() {
        return ptr::null_mut();
    }
    let Some(mut ctx) = context_from_raw(env) else {
        return ptr::null_mut();
    };
    let string = JString::from_raw(string);
    match bridge::native_from_managed(&mut ctx, &string) {
        Ok(Some(buffer)) => malloc_copy(&buffer),
        Ok(None) => ptr::null_mut(),
        Err(err) => {
            tracing::warn!(%err, "tether_get_string failed");
            ptr::null_mut()
        }
    }
}

/// Builds a Java string from a NUL-terminated C string. Null in, null out.
#[no_mangle]
pub unsafe extern "C" fn tether_new_string(env: *mut jni::sys::JNIEnv, string: *const c_char) -> jstring {
    if string.is_null() {
        return ptr::null_mut();
    }
    let Some(mut ctx) = context_from_raw(env) else {
        return ptr::null_mut();
    };
    let bytes = CStr::from_ptr(string).to_bytes();
    match bridge::managed_from_native(&mut ctx, Some(bytes)) {
        Ok(string) => string.as_raw(),
        Err(err) => {
            tracing::warn!(%err, "tether_new_string failed");
            ptr::null_mut()
        }
    }
}

/// Returns 1 if an exception was pending (it is now reported and cleared).
#[no_mangle]
pub unsafe extern "C" fn tether_catch_exception(env: *mut jni::sys::JNIEnv) -> c_int {
    match context_from_raw(env) {
        Some(mut ctx) => c_int::from(bridge::drain_exceptions(&mut ctx)),
        None => 0,
    }
}

/// Fills `scope` with an env for the current thread, attaching if needed.
#[no_mangle]
pub unsafe extern "C" fn tether_attach_thread(scope: *mut ScopedJni) -> jint {
    let Some(scope) = scope.as_mut() else {
        return JNI_ERR;
    };
    *scope = ScopedJni::empty();

    let runtime = match bridge::get_runtime() {
        Ok(runtime) => runtime,
        Err(err) => {
            tracing::error!(%err, "tether_attach_thread before initialization");
            return JNI_ERR;
        }
    };
    match attach::enter(runtime) {
        Ok((ctx, state)) => {
            scope.env = ctx.as_raw();
            scope.require_release = c_int::from(state.into_raw());
            JNI_OK
        }
        Err(_) => JNI_ERR,
    }
}

/// Ends a scope from [`tether_attach_thread`]. Calling it again on the same
/// scope, or on an empty one, does nothing.
#[no_mangle]
pub unsafe extern "C" fn tether_detach_thread(scope: *mut ScopedJni) {
    let Some(scope) = scope.as_mut() else {
        return;
    };
    let created = scope.require_release != 0;
    *scope = ScopedJni::empty();
    if !created {
        return;
    }

    match bridge().runtime() {
        Ok(runtime) => attach::exit(runtime, AttachmentState::from_raw(true)),
        Err(err) => tracing::error!(%err, "tether_detach_thread without a runtime"),
    }
}

/// Frees a string from [`tether_get_string`] and nulls the caller's pointer.
#[no_mangle]
pub unsafe extern "C" fn tether_release_string(string: *mut *mut c_char) {
    if let Some(slot) = string.as_mut() {
        libc::free((*slot).cast());
        *slot = ptr::null_mut();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn release_frees_and_nulls() {
        let mut copied = malloc_copy(&ByteBuffer::from_bytes(b"hello"));
        assert!(!copied.is_null());
        assert_eq!(unsafe { CStr::from_ptr(copied) }.to_bytes(), b"hello");

        unsafe { tether_release_string(&mut copied) };
        assert!(copied.is_null());
        // A second release sees null and does nothing.
        unsafe { tether_release_string(&mut copied) };
        unsafe { tether_release_string(ptr::null_mut()) };
    }

    #[test]
    fn null_strings_short_circuit() {
        unsafe {
            assert!(tether_get_string(ptr::null_mut(), ptr::null_mut()).is_null());
            assert!(tether_new_string(ptr::null_mut(), ptr::null()).is_null());
        }
    }

    #[test]
    fn uninitialized_bridge_refuses_attachment() {
        assert!(tether_global_java_vm().is_null());

        let mut scope = ScopedJni {
            env: ptr::null_mut(),
            require_release: 1,
        };
        assert_eq!(unsafe { tether_attach_thread(&mut scope) }, JNI_ERR);
        assert!(scope.env.is_null());
        assert_eq!(scope.require_release, 0);
        assert_eq!(unsafe { tether_attach_thread(ptr::null_mut()) }, JNI_ERR);
    }

    #[test]
    fn detach_without_created_attachment_is_a_no_op() {
        let mut scope = ScopedJni::empty();
        unsafe {
            tether_detach_thread(&mut scope);
            tether_detach_thread(&mut scope);
            tether_detach_thread(ptr::null_mut());
        }
        assert_eq!(scope.require_release, 0);
    }

    #[test]
    fn catch_exception_without_bridge_reports_nothing() {
        assert_eq!(unsafe { tether_catch_exception(ptr::null_mut()) }, 0);
    }
}
