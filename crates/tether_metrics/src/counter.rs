//! Lock-free counters for bridge events

use crate::BridgeEvent;
use std::sync::atomic::{AtomicU64, Ordering};

pub struct Counter {
    counts: [AtomicU64; BridgeEvent::COUNT],
}

impl Counter {
    pub const fn new() -> Self {
        Self {
            counts: [const { AtomicU64::new(0) }; BridgeEvent::COUNT],
        }
    }

    #[inline]
    pub fn increment(&self, event: BridgeEvent) {
        self.counts[event.index()].fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(&self, event: BridgeEvent) -> u64 {
        self.counts[event.index()].load(Ordering::Relaxed)
    }

    pub fn reset_all(&self) {
        for count in &self.counts {
            count.store(0, Ordering::Relaxed);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (BridgeEvent, u64)> + '_ {
        BridgeEvent::ALL.into_iter().map(move |event| (event, self.get(event)))
    }
}

impl Default for Counter {
    fn default() -> Self {
        Self::new()
    }
}
