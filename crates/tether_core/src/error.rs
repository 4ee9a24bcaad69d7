use crate::runtime::RuntimeError;
use thiserror::Error;

/// Errors surfaced by the bridge.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BridgeError {
    #[error("bridge used before initialization ({what} is not set)")]
    NotInitialized { what: &'static str },

    #[error("{what} is already initialized")]
    AlreadyInitialized { what: &'static str },

    #[error("runtime refused to attach the current thread: {source}")]
    AttachFailed {
        #[source]
        source: RuntimeError,
    },

    #[error("allocation of {len} bytes failed during {op}")]
    Allocation { op: &'static str, len: usize },

    #[error("managed exception raised during {op}")]
    PendingException { op: &'static str },

    #[error("{op} failed: {source}")]
    Runtime {
        op: &'static str,
        #[source]
        source: RuntimeError,
    },
}

impl BridgeError {
    /// Classifies a backend failure from operation `op` touching `len` bytes.
    pub(crate) fn from_runtime(op: &'static str, len: usize, err: RuntimeError) -> Self {
        match err {
            RuntimeError::OutOfMemory => BridgeError::Allocation { op, len },
            RuntimeError::ExceptionPending => BridgeError::PendingException { op },
            source => BridgeError::Runtime { op, source },
        }
    }

    /// Attachment and initialization failures leave the bridge unusable for
    /// the caller; hosts should escalate them.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            BridgeError::NotInitialized { .. }
                | BridgeError::AlreadyInitialized { .. }
                | BridgeError::AttachFailed { .. }
        )
    }
}
