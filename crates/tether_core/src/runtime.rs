//! Embedding interface of the managed runtime
//!
//! The bridge never talks to a concrete runtime directly. A backend (the JVM
//! in `tether_jni`, a mock in tests) implements these two traits and the
//! generic components in this crate do the rest.

use thiserror::Error;

/// Failures reported by a runtime backend.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    #[error("a managed exception is pending")]
    ExceptionPending,

    #[error("the runtime is out of memory")]
    OutOfMemory,

    #[error("{0} returned null")]
    NullResult(&'static str),

    #[error("the current thread is not attached to the runtime")]
    Detached,

    #[error("{0}")]
    Other(String),
}

/// Process-wide handle to a managed runtime.
///
/// Implementations must be shareable across threads; per-thread state lives in
/// the [`CallContext`] values they hand out.
pub trait ManagedRuntime: Send + Sync + 'static {
    /// Per-thread call context. Backends should make this `!Send`.
    type Context<'rt>: CallContext<Capabilities = Self::Capabilities>
    where
        Self: 'rt;

    /// Resolved class and method handles for string construction.
    type Capabilities: Send + Sync + 'static;

    /// Returns the context of the current thread if it is already attached.
    fn current_context(&self) -> Option<Self::Context<'_>>;

    /// Registers the current thread with the runtime.
    fn attach_current_thread(&self) -> Result<Self::Context<'_>, RuntimeError>;

    /// Unregisters the current thread.
    ///
    /// # Safety
    /// Must only be called on a thread previously attached through
    /// [`ManagedRuntime::attach_current_thread`], and no context or local
    /// reference obtained on this thread may be used afterwards.
    unsafe fn detach_current_thread(&self);
}

/// Operations available through a per-thread call context.
///
/// The marshaller uses the byte-array accessor path exclusively: strings are
/// read through a resolved `getBytes`-style method and built through a
/// constructor taking a byte array. No transcoding happens on this side; the
/// backend decides the charset and should pin it rather than rely on a
/// process default.
pub trait CallContext {
    type Capabilities;

    /// Managed string reference, local to this context.
    type Str;

    /// Transient managed byte array reference.
    type Bytes;

    fn resolve_capabilities(&mut self) -> Result<Self::Capabilities, RuntimeError>;

    /// Invokes the byte accessor on `string`, yielding a new local array.
    fn string_bytes(
        &mut self,
        caps: &Self::Capabilities,
        string: &Self::Str,
    ) -> Result<Self::Bytes, RuntimeError>;

    fn byte_array_len(&mut self, array: &Self::Bytes) -> Result<usize, RuntimeError>;

    /// Copies `dst.len()` bytes from the start of `array`.
    fn read_byte_array(&mut self, array: &Self::Bytes, dst: &mut [u8]) -> Result<(), RuntimeError>;

    fn new_byte_array(&mut self, len: usize) -> Result<Self::Bytes, RuntimeError>;

    /// Copies `src` into the start of `array`.
    fn write_byte_array(&mut self, array: &mut Self::Bytes, src: &[u8]) -> Result<(), RuntimeError>;

    /// Invokes the cached constructor with `bytes`.
    fn new_string(
        &mut self,
        caps: &Self::Capabilities,
        bytes: &Self::Bytes,
    ) -> Result<Self::Str, RuntimeError>;

    /// Drops the local reference to a transient array.
    fn release_bytes(&mut self, array: Self::Bytes);

    fn exception_pending(&mut self) -> bool;

    /// Prints the pending exception through the runtime's own reporting.
    fn describe_exception(&mut self);

    fn clear_exception(&mut self);
}
