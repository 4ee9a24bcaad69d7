//! Capability cache
//!
//! Resolved handles needed to build managed strings. The whole set is
//! resolved before anything is stored, so readers see either all handles or
//! none.

use crate::error::BridgeError;
use crate::runtime::CallContext;
use once_cell::sync::OnceCell;

pub struct CapabilityCache<C> {
    slot: OnceCell<C>,
}

impl<C> CapabilityCache<C> {
    pub const fn new() -> Self {
        Self {
            slot: OnceCell::new(),
        }
    }

    /// Resolves the capability set through `ctx` and publishes it.
    ///
    /// Must run once, on the thread that owns `ctx`. Re-initialization is
    /// rejected without touching the runtime.
    pub fn initialize<X>(&self, ctx: &mut X) -> Result<(), BridgeError>
    where
        X: CallContext<Capabilities = C>,
    {
        if self.is_initialized() {
            return Err(BridgeError::AlreadyInitialized { what: "capability cache" });
        }

        let caps = ctx
            .resolve_capabilities()
            .map_err(|err| BridgeError::from_runtime("resolve_capabilities", 0, err))?;

        self.slot
            .set(caps)
            .map_err(|_| BridgeError::AlreadyInitialized { what: "capability cache" })?;
        tracing::debug!("capability cache initialized");
        Ok(())
    }

    pub fn get(&self) -> Result<&C, BridgeError> {
        self.slot
            .get()
            .ok_or(BridgeError::NotInitialized { what: "capability cache" })
    }

    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.slot.get().is_some()
    }
}

impl<C> Default for CapabilityCache<C> {
    fn default() -> Self {
        Self::new()
    }
}
