//! String marshalling between native bytes and managed strings
//!
//! Both directions go through a transient managed byte array: reading calls
//! the cached byte accessor and copies the array region out, writing fills a
//! new array and hands it to the cached constructor. This side copies bytes
//! verbatim; decoding is the runtime's business. With a UTF-8 runtime,
//! well-formed input (embedded NULs included) round-trips exactly and
//! malformed sequences come back replaced. Every transient array is released
//! before returning, on success and failure alike.

use crate::buffer::ByteBuffer;
use crate::error::BridgeError;
use crate::runtime::CallContext;
use crate::EVENTS;
use tether_metrics::BridgeEvent;

/// Copies the bytes of a managed string into a new caller-owned buffer.
///
/// `None` short-circuits to `Ok(None)` without touching the runtime.
pub fn to_native<X: CallContext>(
    ctx: &mut X,
    caps: &X::Capabilities,
    string: Option<&X::Str>,
) -> Result<Option<ByteBuffer>, BridgeError> {
    let Some(string) = string else {
        return Ok(None);
    };

    let array = ctx
        .string_bytes(caps, string)
        .map_err(|err| BridgeError::from_runtime("string_bytes", 0, err))?;
    let copied = copy_out(ctx, &array);
    ctx.release_bytes(array);

    let buffer = copied?;
    EVENTS.increment(BridgeEvent::ToNative);
    tracing::trace!(len = buffer.len(), "copied managed string to native");
    Ok(Some(buffer))
}

fn copy_out<X: CallContext>(ctx: &mut X, array: &X::Bytes) -> Result<ByteBuffer, BridgeError> {
    let len = ctx
        .byte_array_len(array)
        .map_err(|err| BridgeError::from_runtime("byte_array_len", 0, err))?;
    let mut buffer =
        ByteBuffer::try_zeroed(len).ok_or(BridgeError::Allocation { op: "to_native", len })?;
    ctx.read_byte_array(array, buffer.content_mut())
        .map_err(|err| BridgeError::from_runtime("read_byte_array", len, err))?;
    Ok(buffer)
}

/// Builds a managed string from raw bytes.
///
/// `None` short-circuits to `Ok(None)` without touching the runtime. An empty
/// slice is not `None`: it yields an empty managed string.
pub fn to_managed<X: CallContext>(
    ctx: &mut X,
    caps: &X::Capabilities,
    bytes: Option<&[u8]>,
) -> Result<Option<X::Str>, BridgeError> {
    let Some(bytes) = bytes else {
        return Ok(None);
    };

    let len = bytes.len();
    let mut array = ctx
        .new_byte_array(len)
        .map_err(|err| BridgeError::from_runtime("new_byte_array", len, err))?;
    let built = construct(ctx, caps, &mut array, bytes);
    ctx.release_bytes(array);

    let string = built?;
    EVENTS.increment(BridgeEvent::ToManaged);
    tracing::trace!(len, "constructed managed string");
    Ok(Some(string))
}

fn construct<X: CallContext>(
    ctx: &mut X,
    caps: &X::Capabilities,
    array: &mut X::Bytes,
    bytes: &[u8],
) -> Result<X::Str, BridgeError> {
    let len = bytes.len();
    ctx.write_byte_array(array, bytes)
        .map_err(|err| BridgeError::from_runtime("write_byte_array", len, err))?;
    ctx.new_string(caps, array)
        .map_err(|err| BridgeError::from_runtime("new_string", len, err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockCapabilities, MockRuntime};
    use crate::runtime::{CallContext, ManagedRuntime};

    fn caps() -> MockCapabilities {
        MockCapabilities {
            class_name: "java/lang/String",
        }
    }

    #[test]
    fn null_inputs_never_reach_the_runtime() {
        let runtime = MockRuntime::new();
        let mut ctx = runtime.attach_current_thread().unwrap();
        let before = runtime.runtime_calls();

        assert_eq!(to_managed(&mut ctx, &caps(), None).unwrap(), None);
        assert_eq!(to_native(&mut ctx, &caps(), None).unwrap(), None);
        assert_eq!(runtime.runtime_calls(), before);

        drop(ctx);
        unsafe { runtime.detach_current_thread() };
    }

    #[test]
    fn round_trips_well_formed_utf8() {
        let runtime = MockRuntime::new();
        let mut ctx = runtime.attach_current_thread().unwrap();
        let samples: [&[u8]; 4] = [b"", b"hello", b"a\0b\0", "héllo ✓".as_bytes()];

        for sample in samples {
            let string = to_managed(&mut ctx, &caps(), Some(sample)).unwrap().unwrap();
            let buffer = to_native(&mut ctx, &caps(), Some(&string)).unwrap().unwrap();
            assert_eq!(buffer.as_bytes(), sample);
            assert_eq!(buffer.as_bytes_with_nul().last(), Some(&0));
        }

        drop(ctx);
        unsafe { runtime.detach_current_thread() };
    }

    #[test]
    fn malformed_utf8_comes_back_replaced() {
        let runtime = MockRuntime::new();
        let mut ctx = runtime.attach_current_thread().unwrap();

        let string = to_managed(&mut ctx, &caps(), Some(&[0xff, 0xfe, 0x80][..]))
            .unwrap()
            .unwrap();
        let buffer = to_native(&mut ctx, &caps(), Some(&string)).unwrap().unwrap();
        assert_eq!(buffer.as_bytes(), "\u{FFFD}".repeat(3).as_bytes());
        assert_eq!(ctx.live_arrays(), 0);

        drop(ctx);
        unsafe { runtime.detach_current_thread() };
    }

    #[test]
    fn transient_arrays_are_released() {
        let runtime = MockRuntime::new();
        let mut ctx = runtime.attach_current_thread().unwrap();

        for i in 0..64 {
            let text = format!("value-{i}");
            let string = to_managed(&mut ctx, &caps(), Some(text.as_bytes())).unwrap().unwrap();
            let _ = to_native(&mut ctx, &caps(), Some(&string)).unwrap();
        }
        assert_eq!(ctx.live_arrays(), 0);

        drop(ctx);
        unsafe { runtime.detach_current_thread() };
    }

    #[test]
    fn allocation_failure_is_signaled_not_empty() {
        let runtime = MockRuntime::new();
        let mut ctx = runtime.attach_current_thread().unwrap();

        runtime.fail_next_allocation();
        let err = to_managed(&mut ctx, &caps(), Some(&b"data"[..])).unwrap_err();
        assert_eq!(err, BridgeError::Allocation { op: "new_byte_array", len: 4 });
        assert!(ctx.exception_pending());
        ctx.clear_exception();

        let string = to_managed(&mut ctx, &caps(), Some(&b"data"[..])).unwrap().unwrap();
        runtime.fail_next_allocation();
        let err = to_native(&mut ctx, &caps(), Some(&string)).unwrap_err();
        assert!(matches!(err, BridgeError::Allocation { .. }));
        assert_eq!(ctx.live_arrays(), 0);

        drop(ctx);
        unsafe { runtime.detach_current_thread() };
    }

    #[test]
    fn constructor_exception_releases_the_array() {
        let runtime = MockRuntime::new();
        let mut ctx = runtime.attach_current_thread().unwrap();

        runtime.throw_on_construct(true);
        let err = to_managed(&mut ctx, &caps(), Some(&b"boom"[..])).unwrap_err();
        assert_eq!(err, BridgeError::PendingException { op: "new_string" });
        assert_eq!(ctx.live_arrays(), 0);

        drop(ctx);
        unsafe { runtime.detach_current_thread() };
    }
}
