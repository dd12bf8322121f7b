//! Error types for the bridge core.
//!
//! None of these cross the native/managed boundary. Entry points log them and
//! return; pipeline trampolines log them and return.

use thiserror::Error;

/// Errors that can occur while driving the bridge.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// The calling thread could not join the managed runtime.
    #[error("Failed to attach current thread: {0}")]
    AttachFailed(String),

    /// A call into the managed owner failed or raised a fault.
    #[error("Managed call failed: {0}")]
    ManagedCall(String),

    /// The owner class lacks methods or fields the dispatcher needs.
    #[error("Managed class is missing required members: {}", .0.join(", "))]
    MissingMembers(Vec<String>),

    /// Commands were issued before the one-time class init succeeded.
    #[error("Bridge method table has not been resolved")]
    NotRegistered,

    /// The native pipeline rejected a request.
    #[error("Pipeline error: {0}")]
    Pipeline(String),

    /// Reading or writing the owner's storage slot failed.
    #[error("Owner slot access failed: {0}")]
    OwnerSlot(String),

    /// A command arrived on the thread that is already inside a pipeline
    /// call for the same bridge, typically from an upcall the pipeline
    /// delivered synchronously.
    #[error("Command re-entered the bridge from its own pipeline call")]
    Reentrant,

    /// The pipeline had no decoded sample to hand out.
    #[error("No decoded sample available")]
    NoSample,

    /// I/O error while writing a sample dump.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type for bridge operations.
pub type BridgeResult<T> = Result<T, BridgeError>;
