//! In-process stand-in for a managed runtime, used by the unit tests.
//!
//! Tracks per-thread attachment, pending exceptions and live transient
//! arrays the way an embedding interface would, and panics on misuse
//! (foreign-thread contexts, detaching a thread it was not asked to attach).

use crate::runtime::{CallContext, ManagedRuntime, RuntimeError};
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::thread::ThreadId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockCapabilities {
    pub class_name: &'static str,
}

/// Managed strings hold text, not bytes: construction decodes as UTF-8 with
/// replacement, like a JVM `String` built with a pinned UTF-8 charset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockString(pub String);

#[derive(Debug)]
pub struct MockArray {
    data: Vec<u8>,
}

#[derive(Default)]
struct ThreadState {
    pending: Option<String>,
    live_arrays: usize,
    external: bool,
}

#[derive(Default)]
pub struct MockRuntime {
    threads: Mutex<HashMap<ThreadId, ThreadState>>,
    described: Mutex<Vec<String>>,
    attach_calls: AtomicUsize,
    detach_calls: AtomicUsize,
    resolve_calls: AtomicUsize,
    runtime_calls: AtomicUsize,
    reject_attach: AtomicBool,
    fail_resolution: AtomicBool,
    fail_next_allocation: AtomicBool,
    throw_on_construct: AtomicBool,
}

impl MockRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach_calls(&self) -> usize {
        self.attach_calls.load(Ordering::SeqCst)
    }

    pub fn detach_calls(&self) -> usize {
        self.detach_calls.load(Ordering::SeqCst)
    }

    pub fn resolve_calls(&self) -> usize {
        self.resolve_calls.load(Ordering::SeqCst)
    }

    pub fn runtime_calls(&self) -> usize {
        self.runtime_calls.load(Ordering::SeqCst)
    }

    pub fn attached_threads(&self) -> usize {
        self.threads.lock().unwrap().len()
    }

    pub fn is_current_attached(&self) -> bool {
        self.threads
            .lock()
            .unwrap()
            .contains_key(&std::thread::current().id())
    }

    pub fn described(&self) -> Vec<String> {
        self.described.lock().unwrap().clone()
    }

    pub fn reject_attach(&self, reject: bool) {
        self.reject_attach.store(reject, Ordering::SeqCst);
    }

    pub fn fail_resolution(&self, fail: bool) {
        self.fail_resolution.store(fail, Ordering::SeqCst);
    }

    pub fn fail_next_allocation(&self) {
        self.fail_next_allocation.store(true, Ordering::SeqCst);
    }

    pub fn throw_on_construct(&self, throw: bool) {
        self.throw_on_construct.store(throw, Ordering::SeqCst);
    }

    /// Attaches the current thread the way a runtime-owned thread would be,
    /// bypassing the counters.
    pub fn attach_externally(&self) {
        self.threads.lock().unwrap().insert(
            std::thread::current().id(),
            ThreadState {
                external: true,
                ..ThreadState::default()
            },
        );
    }

    pub fn detach_externally(&self) {
        self.threads
            .lock()
            .unwrap()
            .remove(&std::thread::current().id());
    }

    fn context(&self) -> MockContext<'_> {
        MockContext {
            runtime: self,
            thread: std::thread::current().id(),
            _not_send: PhantomData,
        }
    }
}

impl ManagedRuntime for MockRuntime {
    type Context<'rt> = MockContext<'rt> where Self: 'rt;
    type Capabilities = MockCapabilities;

    fn current_context(&self) -> Option<MockContext<'_>> {
        self.is_current_attached().then(|| self.context())
    }

    fn attach_current_thread(&self) -> Result<MockContext<'_>, RuntimeError> {
        if self.reject_attach.load(Ordering::SeqCst) {
            return Err(RuntimeError::Other("attach rejected".into()));
        }
        self.attach_calls.fetch_add(1, Ordering::SeqCst);
        self.threads
            .lock()
            .unwrap()
            .entry(std::thread::current().id())
            .or_default();
        Ok(self.context())
    }

    unsafe fn detach_current_thread(&self) {
        self.detach_calls.fetch_add(1, Ordering::SeqCst);
        let state = self
            .threads
            .lock()
            .unwrap()
            .remove(&std::thread::current().id());
        match state {
            None => panic!("detached a thread that is not attached"),
            Some(state) if state.external => panic!("detached a thread owned by someone else"),
            Some(_) => {}
        }
    }
}

pub struct MockContext<'rt> {
    runtime: &'rt MockRuntime,
    thread: ThreadId,
    _not_send: PhantomData<*const ()>,
}

impl MockContext<'_> {
    fn with_state<T>(&self, f: impl FnOnce(&mut ThreadState) -> T) -> T {
        assert_eq!(
            self.thread,
            std::thread::current().id(),
            "call context used from a foreign thread"
        );
        let mut threads = self.runtime.threads.lock().unwrap();
        let state = threads
            .get_mut(&self.thread)
            .expect("call context used after detach");
        f(state)
    }

    /// Counts a runtime call and refuses it while an exception is pending.
    fn call(&self) -> Result<(), RuntimeError> {
        self.runtime.runtime_calls.fetch_add(1, Ordering::SeqCst);
        if self.with_state(|state| state.pending.is_some()) {
            return Err(RuntimeError::ExceptionPending);
        }
        Ok(())
    }

    fn allocate(&self) -> Result<(), RuntimeError> {
        if self.runtime.fail_next_allocation.swap(false, Ordering::SeqCst) {
            self.throw("java/lang/OutOfMemoryError");
            return Err(RuntimeError::OutOfMemory);
        }
        self.with_state(|state| state.live_arrays += 1);
        Ok(())
    }

    /// Raises a managed exception on this thread.
    pub fn throw(&self, message: &str) {
        self.with_state(|state| state.pending = Some(message.to_string()));
    }

    pub fn live_arrays(&self) -> usize {
        self.with_state(|state| state.live_arrays)
    }
}

impl CallContext for MockContext<'_> {
    type Capabilities = MockCapabilities;
    type Str = MockString;
    type Bytes = MockArray;

    fn resolve_capabilities(&mut self) -> Result<MockCapabilities, RuntimeError> {
        self.runtime.resolve_calls.fetch_add(1, Ordering::SeqCst);
        self.call()?;
        if self.runtime.fail_resolution.load(Ordering::SeqCst) {
            return Err(RuntimeError::Other("class not found".into()));
        }
        Ok(MockCapabilities {
            class_name: "java/lang/String",
        })
    }

    fn string_bytes(
        &mut self,
        _caps: &MockCapabilities,
        string: &MockString,
    ) -> Result<MockArray, RuntimeError> {
        self.call()?;
        self.allocate()?;
        Ok(MockArray {
            data: string.0.as_bytes().to_vec(),
        })
    }

    fn byte_array_len(&mut self, array: &MockArray) -> Result<usize, RuntimeError> {
        self.call()?;
        Ok(array.data.len())
    }

    fn read_byte_array(&mut self, array: &MockArray, dst: &mut [u8]) -> Result<(), RuntimeError> {
        self.call()?;
        let src = array
            .data
            .get(..dst.len())
            .ok_or_else(|| RuntimeError::Other("array index out of bounds".into()))?;
        dst.copy_from_slice(src);
        Ok(())
    }

    fn new_byte_array(&mut self, len: usize) -> Result<MockArray, RuntimeError> {
        self.call()?;
        self.allocate()?;
        Ok(MockArray { data: vec![0; len] })
    }

    fn write_byte_array(&mut self, array: &mut MockArray, src: &[u8]) -> Result<(), RuntimeError> {
        self.call()?;
        let dst = array
            .data
            .get_mut(..src.len())
            .ok_or_else(|| RuntimeError::Other("array index out of bounds".into()))?;
        dst.copy_from_slice(src);
        Ok(())
    }

    fn new_string(
        &mut self,
        _caps: &MockCapabilities,
        bytes: &MockArray,
    ) -> Result<MockString, RuntimeError> {
        self.call()?;
        if self.runtime.throw_on_construct.load(Ordering::SeqCst) {
            self.throw("java/lang/IllegalArgumentException");
            return Err(RuntimeError::ExceptionPending);
        }
        Ok(MockString(String::from_utf8_lossy(&bytes.data).into_owned()))
    }

    fn release_bytes(&mut self, _array: MockArray) {
        self.with_state(|state| state.live_arrays -= 1);
    }

    fn exception_pending(&mut self) -> bool {
        self.with_state(|state| state.pending.is_some())
    }

    fn describe_exception(&mut self) {
        if let Some(message) = self.with_state(|state| state.pending.clone()) {
            self.runtime.described.lock().unwrap().push(message);
        }
    }

    fn clear_exception(&mut self) {
        self.with_state(|state| state.pending = None);
    }
}
