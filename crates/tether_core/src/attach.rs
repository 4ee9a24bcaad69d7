//! Scoped thread attachment
//!
//! A thread is either detached or attached. Entering a scope on a detached
//! thread attaches it and remembers that it did; entering on an attached
//! thread reuses the existing context. Leaving a scope detaches only what
//! that scope attached, so nested scopes and threads owned by the runtime are
//! never detached from under their owner.

use crate::error::BridgeError;
use crate::runtime::ManagedRuntime;
use crate::EVENTS;
use std::mem::ManuallyDrop;
use tether_metrics::BridgeEvent;

/// Whether a scope created the attachment it is holding.
///
/// Deliberately neither `Copy` nor `Clone`: [`exit`] consumes it, so one
/// state can release at most once.
#[derive(Debug, PartialEq, Eq)]
#[must_use = "an attachment state must be passed to `exit`"]
pub struct AttachmentState {
    created: bool,
}

impl AttachmentState {
    /// Rebuilds a state stored outside Rust (e.g. in a C struct).
    ///
    /// # Safety
    /// `created` must be the value recorded by the matching [`enter`] on
    /// this thread, and that state must not have been exited yet.
    pub unsafe fn from_raw(created: bool) -> Self {
        Self { created }
    }

    #[inline]
    pub fn created(&self) -> bool {
        self.created
    }

    /// Gives up ownership without exiting, returning the flag.
    pub fn into_raw(self) -> bool {
        self.created
    }
}

/// Obtains a call context for the current thread, attaching it if needed.
pub fn enter<R: ManagedRuntime>(
    runtime: &R,
) -> Result<(R::Context<'_>, AttachmentState), BridgeError> {
    if let Some(context) = runtime.current_context() {
        EVENTS.increment(BridgeEvent::Reuse);
        tracing::trace!("thread already attached, reusing context");
        return Ok((context, AttachmentState { created: false }));
    }

    match runtime.attach_current_thread() {
        Ok(context) => {
            EVENTS.increment(BridgeEvent::Attach);
            tracing::debug!(thread = ?std::thread::current().id(), "attached thread to runtime");
            Ok((context, AttachmentState { created: true }))
        }
        Err(source) => {
            tracing::error!(%source, thread = ?std::thread::current().id(), "runtime refused thread attachment");
            Err(BridgeError::AttachFailed { source })
        }
    }
}

/// Ends a scope started with [`enter`], detaching only if it attached.
///
/// # Safety
/// Must run on the thread that produced `state`, with the same runtime, and
/// no context or local reference from the scope may be used afterwards.
pub unsafe fn exit<R: ManagedRuntime>(runtime: &R, state: AttachmentState) {
    if state.created {
        runtime.detach_current_thread();
        EVENTS.increment(BridgeEvent::Detach);
        tracing::debug!(thread = ?std::thread::current().id(), "detached thread from runtime");
    }
}

/// RAII form of [`enter`]/[`exit`]; dropping the guard ends the scope on
/// every exit path, including unwinding. The context is only reachable
/// through [`AttachGuard::with`].
pub struct AttachGuard<'rt, R: ManagedRuntime> {
    runtime: &'rt R,
    context: ManuallyDrop<R::Context<'rt>>,
    state: Option<AttachmentState>,
}

impl<'rt, R: ManagedRuntime> AttachGuard<'rt, R> {
    pub fn enter(runtime: &'rt R) -> Result<Self, BridgeError> {
        let (context, state) = enter(runtime)?;
        Ok(Self {
            runtime,
            context: ManuallyDrop::new(context),
            state: Some(state),
        })
    }

    /// True if dropping this guard will detach the thread.
    pub fn created(&self) -> bool {
        self.state.as_ref().is_some_and(AttachmentState::created)
    }

    /// Runs `body` with the scope's context.
    ///
    /// The closure is generic over the context lifetime, so nothing tied to
    /// the context (local references included) can be returned past the
    /// scope that owns it.
    pub fn with<F, T>(&mut self, body: F) -> T
    where
        F: for<'c> FnOnce(&mut R::Context<'c>) -> T,
    {
        body(&mut *self.context)
    }
}

impl<R: ManagedRuntime> Drop for AttachGuard<'_, R> {
    fn drop(&mut self) {
        // SAFETY: the context is dropped exactly once, here, before detaching.
        unsafe { ManuallyDrop::drop(&mut self.context) };
        if let Some(state) = self.state.take() {
            // SAFETY: the guard is !Send through its context, so this is the
            // thread that entered.
            unsafe { exit(self.runtime, state) };
        }
    }
}
