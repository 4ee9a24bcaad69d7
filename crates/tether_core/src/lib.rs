//! Tether Core
//!
//! Runtime-agnostic boundary between native threads and a managed,
//! garbage-collected runtime:
//! - Runtime handle registry and capability cache (write-once globals)
//! - String marshalling over raw bytes
//! - Scoped thread attachment
//! - Exception draining
//!
//! Backends plug in through [`ManagedRuntime`] and [`CallContext`].

pub mod attach;
pub mod bridge;
pub mod buffer;
pub mod capability;
pub mod drain;
pub mod error;
pub mod marshal;
pub mod registry;
pub mod runtime;

#[cfg(test)]
mod mock;

pub use attach::{AttachGuard, AttachmentState};
pub use bridge::Bridge;
pub use buffer::{release, ByteBuffer};
pub use error::BridgeError;
pub use runtime::{CallContext, ManagedRuntime, RuntimeError};
pub use tether_metrics;

/// Bridge event counters (no-ops unless the `metrics` feature is on).
pub static EVENTS: tether_metrics::Counter = tether_metrics::Counter::new();

/// Bridge version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
