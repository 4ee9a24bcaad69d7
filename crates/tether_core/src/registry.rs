//! Runtime handle registry
//!
//! Holds the single process-wide runtime handle. Written once at load time,
//! read lock-free by every thread afterwards.

use crate::error::BridgeError;
use once_cell::sync::OnceCell;

pub struct RuntimeRegistry<R> {
    slot: OnceCell<R>,
}

impl<R> RuntimeRegistry<R> {
    pub const fn new() -> Self {
        Self {
            slot: OnceCell::new(),
        }
    }

    /// Stores the runtime handle. A second call is rejected and the handle
    /// passed to it is dropped.
    pub fn set(&self, runtime: R) -> Result<(), BridgeError> {
        self.slot
            .set(runtime)
            .map_err(|_| BridgeError::AlreadyInitialized { what: "runtime" })
    }

    pub fn get(&self) -> Result<&R, BridgeError> {
        self.slot
            .get()
            .ok_or(BridgeError::NotInitialized { what: "runtime" })
    }

    #[inline]
    pub fn is_set(&self) -> bool {
        self.slot.get().is_some()
    }
}

impl<R> Default for RuntimeRegistry<R> {
    fn default() -> Self {
        Self::new()
    }
}
