//! Abstraction over the managed runtime the bridge calls back into.
//!
//! The JNI implementation lives in the `android-launch` crate. Keeping the
//! seam here lets the attach/dispatch discipline run against a recording
//! runtime in tests.

use crate::error::BridgeError;

/// Runtime ABI version requested when attaching a thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AbiVersion(pub i32);

impl AbiVersion {
    /// `JNI_VERSION_1_4`
    pub const V1_4: AbiVersion = AbiVersion(0x0001_0004);
    /// `JNI_VERSION_1_6`
    pub const V1_6: AbiVersion = AbiVersion(0x0001_0006);
}

/// One argument of an upcall.
///
/// Strings are converted into transient managed values by the runtime for the
/// duration of a single call and released before `call_void` returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpcallArg<'a> {
    Str(&'a str),
    Int(i32),
}

/// A managed runtime with a thread-registration API.
pub trait ManagedRuntime: Send + Sync + 'static {
    /// Call environment. Only valid on the thread that attached it.
    type Env: Clone + 'static;
    /// Durable reference to a managed object.
    type Object: Send + Sync + 'static;
    /// Resolved method identifier.
    type Method: Copy + Send + Sync + 'static;

    /// Attaches the calling OS thread and returns its environment.
    fn attach_current_thread(&self, version: AbiVersion) -> Result<Self::Env, BridgeError>;

    /// Detaches the calling OS thread. Runs on the exiting thread, during
    /// thread-local teardown, with the environment its attach produced.
    fn detach_current_thread(&self, env: &Self::Env);

    /// Invokes a `void` method on `target`.
    ///
    /// Any fault raised by the managed side stays pending in `env` until
    /// [`ManagedRuntime::clear_pending_fault`] is called.
    fn call_void(
        &self,
        env: &Self::Env,
        target: &Self::Object,
        method: Self::Method,
        args: &[UpcallArg<'_>],
    ) -> Result<(), BridgeError>;

    /// Clears a pending managed fault. Returns whether one was pending.
    fn clear_pending_fault(&self, env: &Self::Env) -> bool;
}
