//! Tether Metrics - Event counters for the bridge
//!
//! Counts attach/detach traffic, drained exceptions and string conversions
//! so hosts can spot leaked thread registrations. Without the `metrics`
//! feature every counter compiles to nothing.
//!
//! # Feature Flags
//!
//! - `metrics` - Enable counter collection (off here; `tether_core` turns it
//!   on by default)
//!
//! # Usage
//!
//! ```ignore
//! use tether_metrics::{BridgeEvent, Counter};
//!
//! static COUNTER: Counter = Counter::new();
//! COUNTER.increment(BridgeEvent::Attach);
//! println!("attached: {}", COUNTER.get(BridgeEvent::Attach));
//! ```
//!
//! Without the `metrics` feature every call is an empty inline function.

#[cfg(feature = "metrics")]
mod counter;

#[cfg(feature = "metrics")]
pub use counter::Counter;

/// Bridge events worth counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BridgeEvent {
    /// A scope attached the current thread to the runtime.
    Attach,
    /// A scope detached a thread it had attached.
    Detach,
    /// A scope found the thread already attached and reused its context.
    Reuse,
    /// A pending exception was reported and cleared.
    ExceptionDrained,
    /// A managed string was copied out into a native buffer.
    ToNative,
    /// A managed string was constructed from native bytes.
    ToManaged,
}

impl BridgeEvent {
    pub const COUNT: usize = 6;

    pub const ALL: [BridgeEvent; Self::COUNT] = [
        BridgeEvent::Attach,
        BridgeEvent::Detach,
        BridgeEvent::Reuse,
        BridgeEvent::ExceptionDrained,
        BridgeEvent::ToNative,
        BridgeEvent::ToManaged,
    ];

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn name(self) -> &'static str {
        match self {
            BridgeEvent::Attach => "attach",
            BridgeEvent::Detach => "detach",
            BridgeEvent::Reuse => "reuse",
            BridgeEvent::ExceptionDrained => "exception_drained",
            BridgeEvent::ToNative => "to_native",
            BridgeEvent::ToManaged => "to_managed",
        }
    }
}

// ============================================================================
// No-op stubs when metrics disabled
// ============================================================================

#[cfg(not(feature = "metrics"))]
pub struct Counter;

#[cfg(not(feature = "metrics"))]
impl Counter {
    pub const fn new() -> Self { Self }
    #[inline]
    pub fn increment(&self, _event: BridgeEvent) {}
    #[inline]
    pub fn get(&self, _event: BridgeEvent) -> u64 { 0 }
    #[inline]
    pub fn reset_all(&self) {}
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = (BridgeEvent, u64)> + '_ {
        BridgeEvent::ALL.into_iter().map(|event| (event, 0))
    }
}

#[cfg(not(feature = "metrics"))]
impl Default for Counter {
    fn default() -> Self {
        Self::new()
    }
}
