//! Exception drain

use crate::runtime::CallContext;
use crate::EVENTS;
use tether_metrics::BridgeEvent;

/// Reports and clears a pending managed exception.
///
/// Returns `true` if one was pending. The context is usable for further
/// runtime calls afterwards either way.
pub fn drain<X: CallContext>(ctx: &mut X) -> bool {
    if !ctx.exception_pending() {
        return false;
    }

    ctx.describe_exception();
    ctx.clear_exception();
    EVENTS.increment(BridgeEvent::ExceptionDrained);
    tracing::warn!("cleared pending managed exception");
    true
}
