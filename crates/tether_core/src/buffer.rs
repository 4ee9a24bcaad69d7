//! Owned byte buffers handed out by the marshaller

use std::ffi::{c_char, CString};
use std::fmt;

/// Raw string bytes copied out of the managed runtime.
///
/// The allocation always ends with a NUL terminator that is not part of the
/// content, so the buffer can be passed to C code expecting a C string. The
/// content itself may contain NUL bytes.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ByteBuffer {
    bytes: Box<[u8]>,
}

impl ByteBuffer {
    /// Zero-filled buffer with room for `len` content bytes, or `None` if
    /// the allocation cannot be satisfied.
    pub(crate) fn try_zeroed(len: usize) -> Option<Self> {
        let total = len.checked_add(1)?;
        let mut bytes = Vec::new();
        bytes.try_reserve_exact(total).ok()?;
        bytes.resize(total, 0);
        Some(Self {
            bytes: bytes.into_boxed_slice(),
        })
    }

    pub fn from_bytes(content: &[u8]) -> Self {
        let mut bytes = Vec::with_capacity(content.len() + 1);
        bytes.extend_from_slice(content);
        bytes.push(0);
        Self {
            bytes: bytes.into_boxed_slice(),
        }
    }

    /// Content without the terminator.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len()]
    }

    #[inline]
    pub(crate) fn content_mut(&mut self) -> &mut [u8] {
        let len = self.len();
        &mut self.bytes[..len]
    }

    #[inline]
    pub fn as_bytes_with_nul(&self) -> &[u8] {
        &self.bytes
    }

    /// Pointer to the NUL-terminated content, valid while `self` lives.
    #[inline]
    pub fn as_ptr(&self) -> *const c_char {
        self.bytes.as_ptr().cast()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len() - 1
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Content as UTF-8, if it is valid.
    pub fn to_str(&self) -> Option<&str> {
        std::str::from_utf8(self.as_bytes()).ok()
    }

    pub fn into_vec(self) -> Vec<u8> {
        let mut bytes = self.bytes.into_vec();
        bytes.pop();
        bytes
    }

    /// Converts into a `CString`, failing if the content holds an interior NUL.
    pub fn into_c_string(self) -> Result<CString, std::ffi::NulError> {
        CString::new(self.into_vec())
    }
}

impl AsRef<[u8]> for ByteBuffer {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl fmt::Debug for ByteBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ByteBuffer")
            .field("len", &self.len())
            .field("content", &String::from_utf8_lossy(self.as_bytes()))
            .finish()
    }
}

/// Releases a buffer returned by the marshaller.
///
/// Ownership makes double release impossible; this exists so call sites read
/// the same as the C surface.
pub fn release(buffer: ByteBuffer) {
    tracing::trace!(len = buffer.len(), "releasing byte buffer");
    drop(buffer);
}
