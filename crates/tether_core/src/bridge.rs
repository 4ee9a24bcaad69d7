//! Process-wide bridge state
//!
//! `Bridge` ties the registry and the capability cache together and exposes
//! the entry points native callers use. Backends declare one as a `static`.

use crate::attach::AttachGuard;
use crate::buffer::ByteBuffer;
use crate::capability::CapabilityCache;
use crate::drain;
use crate::error::BridgeError;
use crate::marshal;
use crate::registry::RuntimeRegistry;
use crate::runtime::{CallContext, ManagedRuntime};

type Str<'rt, R> = <<R as ManagedRuntime>::Context<'rt> as CallContext>::Str;

pub struct Bridge<R: ManagedRuntime> {
    runtime: RuntimeRegistry<R>,
    capabilities: CapabilityCache<R::Capabilities>,
}

impl<R: ManagedRuntime> Bridge<R> {
    pub const fn new() -> Self {
        Self {
            runtime: RuntimeRegistry::new(),
            capabilities: CapabilityCache::new(),
        }
    }

    /// Stores the runtime and resolves the capability set through `ctx`.
    ///
    /// Call once at load time, on the thread owning `ctx`, before any other
    /// thread uses the bridge. Nothing is published if resolution fails.
    pub fn initialize<X>(&self, runtime: R, ctx: &mut X) -> Result<(), BridgeError>
    where
        X: CallContext<Capabilities = R::Capabilities>,
    {
        if self.runtime.is_set() {
            return Err(BridgeError::AlreadyInitialized { what: "runtime" });
        }
        self.capabilities.initialize(ctx)?;
        self.runtime.set(runtime)?;
        tracing::debug!("bridge initialized");
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.runtime.is_set() && self.capabilities.is_initialized()
    }

    pub fn runtime(&self) -> Result<&R, BridgeError> {
        self.runtime.get()
    }

    pub fn capabilities(&self) -> Result<&R::Capabilities, BridgeError> {
        self.capabilities.get()
    }

    /// Copies a managed string out as native bytes. `None` in, `None` out.
    pub fn native_from_managed<X>(
        &self,
        ctx: &mut X,
        string: Option<&X::Str>,
    ) -> Result<Option<ByteBuffer>, BridgeError>
    where
        X: CallContext<Capabilities = R::Capabilities>,
    {
        if string.is_none() {
            return Ok(None);
        }
        marshal::to_native(ctx, self.capabilities.get()?, string)
    }

    /// Builds a managed string from native bytes. `None` in, `None` out.
    pub fn managed_from_native<X>(
        &self,
        ctx: &mut X,
        bytes: Option<&[u8]>,
    ) -> Result<Option<X::Str>, BridgeError>
    where
        X: CallContext<Capabilities = R::Capabilities>,
    {
        if bytes.is_none() {
            return Ok(None);
        }
        marshal::to_managed(ctx, self.capabilities.get()?, bytes)
    }

    /// Runs `body` with a call context for the current thread, attaching for
    /// the duration of the call if the thread was not attached already.
    ///
    /// `body` must accept a context of any lifetime, so managed references it
    /// creates cannot be part of its result.
    pub fn with_attachment<F, T>(&self, body: F) -> Result<T, BridgeError>
    where
        F: for<'c> FnOnce(&mut R::Context<'c>) -> T,
    {
        let mut guard = self.attach()?;
        Ok(guard.with(body))
    }

    /// Guard form of [`Bridge::with_attachment`].
    pub fn attach(&self) -> Result<AttachGuard<'_, R>, BridgeError> {
        AttachGuard::enter(self.runtime()?)
    }

    pub fn drain_exceptions<X: CallContext>(&self, ctx: &mut X) -> bool {
        drain::drain(ctx)
    }

    /// Copies a managed string out as an owned `String`, replacing invalid
    /// UTF-8 sequences.
    pub fn string_from_managed<'rt>(
        &self,
        ctx: &mut R::Context<'rt>,
        string: Option<&Str<'rt, R>>,
    ) -> Result<Option<String>, BridgeError> {
        Ok(self
            .native_from_managed(ctx, string)?
            .map(|buffer| String::from_utf8_lossy(buffer.as_bytes()).into_owned()))
    }
}

impl<R: ManagedRuntime> Default for Bridge<R> {
    fn default() -> Self {
        Self::new()
    }
}
