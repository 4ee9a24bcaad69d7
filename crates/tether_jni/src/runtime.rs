//! JVM backend for the bridge
//!
//! `JniRuntime` wraps the process `JavaVM`; `JniContext` wraps the per-thread
//! `JNIEnv`. Strings go through `String.getBytes(Charset)` and
//! `new String(byte[], Charset)` with the charset pinned once at
//! initialization ([`BridgeConfig::charset`], UTF-8 by default), instead of
//! the modified UTF-8 of `GetStringUTFChars` or the JVM's default charset.
//!
//! With UTF-8, well-formed input (embedded NULs included) crosses unchanged
//! in both directions. Malformed input is not rejected: `new String` replaces
//! each maximal invalid subsequence with U+FFFD, so `[0xff, 0xfe, 0x80]` comes
//! back as three `EF BF BD` sequences, and an unpaired surrogate in a Java
//! string is encoded as `?`. Hosts that need every byte sequence to survive
//! can pick `ISO-8859-1`, which maps bytes to chars one to one.

use crate::config::BridgeConfig;
use jni::errors::{Error as JniCallError, JniError};
use jni::objects::{GlobalRef, JByteArray, JClass, JMethodID, JObject, JString, JThrowable, JValue};
use jni::signature::ReturnType;
use jni::sys::{jsize, jvalue};
use jni::{JNIEnv, JavaVM};
use std::sync::Arc;
use tether_core::{CallContext, ManagedRuntime, RuntimeError};

const CONSTRUCTOR_SIG: &str = "([BLjava/nio/charset/Charset;)V";
const GET_BYTES_SIG: &str = "(Ljava/nio/charset/Charset;)[B";
const CHARSET_CLASS: &str = "java/nio/charset/Charset";
const FOR_NAME_SIG: &str = "(Ljava/lang/String;)Ljava/nio/charset/Charset;";

/// Cached `String` class, the two methods the marshaller needs, and the
/// charset both of them are called with.
pub struct StringCapabilities {
    class: GlobalRef,
    charset: GlobalRef,
    constructor: JMethodID,
    get_bytes: JMethodID,
}

// SAFETY: method IDs stay valid on every thread for as long as their class is
// loaded, and the global references keep the class and charset alive.
unsafe impl Send for StringCapabilities {}
unsafe impl Sync for StringCapabilities {}

impl StringCapabilities {
    pub fn class(&self) -> &GlobalRef {
        &self.class
    }

    /// The charset strings are encoded and decoded with.
    pub fn charset(&self) -> &GlobalRef {
        &self.charset
    }
}

pub(crate) fn map_error(err: JniCallError) -> RuntimeError {
    match err {
        JniCallError::JavaException => RuntimeError::ExceptionPending,
        JniCallError::JniCall(JniError::NoMemory) => RuntimeError::OutOfMemory,
        JniCallError::JniCall(JniError::ThreadDetached) => RuntimeError::Detached,
        JniCallError::NullPtr(what) | JniCallError::NullDeref(what) => RuntimeError::NullResult(what),
        other => RuntimeError::Other(other.to_string()),
    }
}

/// The process-wide JVM handle.
pub struct JniRuntime {
    vm: JavaVM,
    config: Arc<BridgeConfig>,
}

impl JniRuntime {
    pub fn new(vm: JavaVM) -> Self {
        Self::with_config(vm, BridgeConfig::default())
    }

    pub fn with_config(vm: JavaVM, config: BridgeConfig) -> Self {
        Self {
            vm,
            config: Arc::new(config),
        }
    }

    #[inline]
    pub fn vm(&self) -> &JavaVM {
        &self.vm
    }

    #[inline]
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Shared handle to the settings, for contexts built from raw envs.
    pub fn config_arc(&self) -> Arc<BridgeConfig> {
        Arc::clone(&self.config)
    }

    /// Wraps an env obtained outside the runtime (e.g. a native method's
    /// argument) in a context sharing this runtime's settings.
    pub fn context<'local>(&self, env: JNIEnv<'local>) -> JniContext<'local> {
        JniContext::new(env, Arc::clone(&self.config))
    }
}

impl ManagedRuntime for JniRuntime {
    type Context<'rt> = JniContext<'rt> where Self: 'rt;
    type Capabilities = StringCapabilities;

    fn current_context(&self) -> Option<JniContext<'_>> {
        self.vm.get_env().ok().map(|env| self.context(env))
    }

    fn attach_current_thread(&self) -> Result<JniContext<'_>, RuntimeError> {
        self.vm
            .attach_current_thread_permanently()
            .map(|env| self.context(env))
            .map_err(map_error)
    }

    unsafe fn detach_current_thread(&self) {
        self.vm.detach_current_thread();
    }
}

/// Per-thread JNI call context.
pub struct JniContext<'local> {
    env: JNIEnv<'local>,
    config: Arc<BridgeConfig>,
}

impl<'local> JniContext<'local> {
    pub fn new(env: JNIEnv<'local>, config: Arc<BridgeConfig>) -> Self {
        Self { env, config }
    }

    /// # Safety
    /// `env` must be a valid `JNIEnv` pointer for the current thread.
    pub unsafe fn from_raw(
        env: *mut jni::sys::JNIEnv,
        config: Arc<BridgeConfig>,
    ) -> Result<Self, RuntimeError> {
        let env = JNIEnv::from_raw(env).map_err(map_error)?;
        Ok(Self::new(env, config))
    }

    /// Direct access for callers that need more of JNI than strings.
    #[inline]
    pub fn env(&mut self) -> &mut JNIEnv<'local> {
        &mut self.env
    }

    #[inline]
    pub fn as_raw(&self) -> *mut jni::sys::JNIEnv {
        self.env.get_raw()
    }
}

impl<'local> JniContext<'local> {
    fn drop_local<'other>(&mut self, object: impl Into<JObject<'other>>) {
        if let Err(err) = self.env.delete_local_ref(object.into()) {
            tracing::debug!(%err, "failed to drop local reference");
        }
    }

    /// `Charset.forName(config.charset)`; an unknown name leaves the JVM's
    /// `UnsupportedCharsetException` pending.
    fn charset_for_name(&mut self) -> Result<JObject<'local>, RuntimeError> {
        let name = self
            .env
            .new_string(self.config.charset.as_str())
            .map_err(map_error)?;
        let charset = self
            .env
            .call_static_method(CHARSET_CLASS, "forName", FOR_NAME_SIG, &[JValue::Object(name.as_ref())])
            .and_then(|value| value.l());
        self.drop_local(name);

        let charset = charset.map_err(map_error)?;
        if charset.is_null() {
            return Err(RuntimeError::NullResult("Charset.forName"));
        }
        Ok(charset)
    }

    /// Clears the pending exception and returns its `toString()`.
    fn take_exception_summary(&mut self) -> Result<Option<String>, JniCallError> {
        let throwable = self.env.exception_occurred()?;
        if throwable.is_null() {
            return Ok(None);
        }
        self.env.exception_clear()?;

        let summary = self.throwable_to_string(&throwable);
        self.drop_local(throwable);
        summary.map(Some)
    }

    fn throwable_to_string(&mut self, throwable: &JThrowable<'_>) -> Result<String, JniCallError> {
        let text = self
            .env
            .call_method(throwable, "toString", "()Ljava/lang/String;", &[])?
            .l()?;
        if text.is_null() {
            return Ok("null".to_string());
        }
        let text = JString::from(text);
        let summary: String = self.env.get_string(&text)?.into();
        self.drop_local(text);
        Ok(summary)
    }
}

impl<'local> CallContext for JniContext<'local> {
    type Capabilities = StringCapabilities;
    type Str = JString<'local>;
    type Bytes = JByteArray<'local>;

    fn resolve_capabilities(&mut self) -> Result<StringCapabilities, RuntimeError> {
        let class = self
            .env
            .find_class(self.config.string_class.as_str())
            .map_err(map_error)?;
        let constructor = self
            .env
            .get_method_id(&class, "<init>", CONSTRUCTOR_SIG)
            .map_err(map_error)?;
        let get_bytes = self
            .env
            .get_method_id(&class, "getBytes", GET_BYTES_SIG)
            .map_err(map_error)?;
        let charset = self.charset_for_name()?;

        let class_global = self.env.new_global_ref(&class).map_err(map_error)?;
        let charset_global = self.env.new_global_ref(&charset).map_err(map_error)?;
        self.drop_local(class);
        self.drop_local(charset);

        tracing::debug!(
            class = %self.config.string_class,
            charset = %self.config.charset,
            "resolved string capabilities"
        );
        Ok(StringCapabilities {
            class: class_global,
            charset: charset_global,
            constructor,
            get_bytes,
        })
    }

    fn string_bytes(
        &mut self,
        caps: &StringCapabilities,
        string: &JString<'local>,
    ) -> Result<JByteArray<'local>, RuntimeError> {
        let args = [jvalue {
            l: caps.charset.as_obj().as_raw(),
        }];
        // SAFETY: `get_bytes` was resolved on the string class as
        // `(Charset)[B` and the single argument is the cached charset.
        let value = unsafe {
            self.env
                .call_method_unchecked(string, caps.get_bytes, ReturnType::Array, &args)
        }
        .map_err(map_error)?;
        let array = value.l().map_err(map_error)?;
        if array.is_null() {
            return Err(RuntimeError::NullResult("getBytes"));
        }
        Ok(JByteArray::from(array))
    }

    fn byte_array_len(&mut self, array: &JByteArray<'local>) -> Result<usize, RuntimeError> {
        let len = self.env.get_array_length(array).map_err(map_error)?;
        usize::try_from(len).map_err(|_| RuntimeError::Other(format!("negative array length {len}")))
    }

    fn read_byte_array(
        &mut self,
        array: &JByteArray<'local>,
        dst: &mut [u8],
    ) -> Result<(), RuntimeError> {
        self.env
            .get_byte_array_region(array, 0, bytemuck::cast_slice_mut(dst))
            .map_err(map_error)
    }

    fn new_byte_array(&mut self, len: usize) -> Result<JByteArray<'local>, RuntimeError> {
        let len = jsize::try_from(len).map_err(|_| RuntimeError::OutOfMemory)?;
        self.env.new_byte_array(len).map_err(map_error)
    }

    fn write_byte_array(
        &mut self,
        array: &mut JByteArray<'local>,
        src: &[u8],
    ) -> Result<(), RuntimeError> {
        self.env
            .set_byte_array_region(&*array, 0, bytemuck::cast_slice(src))
            .map_err(map_error)
    }

    fn new_string(
        &mut self,
        caps: &StringCapabilities,
        bytes: &JByteArray<'local>,
    ) -> Result<JString<'local>, RuntimeError> {
        let class = <&JClass>::from(caps.class.as_obj());
        let args = [
            jvalue { l: bytes.as_raw() },
            jvalue {
                l: caps.charset.as_obj().as_raw(),
            },
        ];
        // SAFETY: `constructor` was resolved on `class` as `([BCharset)V` and
        // the arguments are a byte array and the cached charset.
        let object = unsafe { self.env.new_object_unchecked(class, caps.constructor, &args) }
            .map_err(map_error)?;
        if object.is_null() {
            return Err(RuntimeError::NullResult("String(byte[])"));
        }
        Ok(JString::from(object))
    }

    fn release_bytes(&mut self, array: JByteArray<'local>) {
        self.drop_local(array);
    }

    fn exception_pending(&mut self) -> bool {
        self.env.exception_check().unwrap_or(false)
    }

    /// Reports the pending exception. Like `ExceptionDescribe`, this clears
    /// it as a side effect.
    fn describe_exception(&mut self) {
        if self.config.describe_exceptions {
            if let Err(err) = self.env.exception_describe() {
                tracing::debug!(%err, "ExceptionDescribe failed");
            }
            return;
        }
        match self.take_exception_summary() {
            Ok(Some(summary)) => tracing::warn!(exception = %summary, "managed exception"),
            Ok(None) => {}
            Err(err) => tracing::debug!(%err, "could not summarize pending exception"),
        }
    }

    fn clear_exception(&mut self) {
        if let Err(err) = self.env.exception_clear() {
            tracing::debug!(%err, "ExceptionClear failed");
        }
    }
}
