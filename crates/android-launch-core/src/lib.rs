//! Core of the Android launch bridge.
//!
//! Lets a managed runtime drive a native media pipeline and receive its
//! events from arbitrary worker threads. The runtime, the pipeline, the
//! owner's handle storage and native windows are all traits here; the
//! `android-launch` crate implements them over JNI, `ndk-sys` and
//! gst-launch-remote.
//!
//! # Layout
//!
//! - [`env_registry`]: lazy per-thread attach, detach on thread exit
//! - [`durable`]: create-once release-once managed references
//! - [`dispatcher`]: pipeline events to managed upcalls
//! - [`bridge`]: instance lifecycle and the command surface
//! - [`surface`]: render-target swap ordering
//! - [`context`]: process-wide state built at load time

pub mod bridge;
pub mod config;
pub mod context;
pub mod diagnostics;
pub mod dispatcher;
pub mod durable;
pub mod env_registry;
pub mod error;
pub mod handle;
pub mod methods;
pub mod pipeline;
pub mod runtime;
pub mod surface;

pub use bridge::{Bridge, CommandCache};
pub use config::BridgeConfig;
pub use context::BridgeContext;
pub use diagnostics::BridgeMetricsSnapshot;
pub use dispatcher::Dispatcher;
pub use durable::DurableRef;
pub use env_registry::EnvRegistry;
pub use error::{BridgeError, BridgeResult};
pub use handle::{OwnerSlot, RawHandle};
pub use methods::{MethodTable, Upcall};
pub use pipeline::{
    Pipeline, PipelineEvent, PipelineEvents, PipelineFactory, PipelineProperty, Sample,
};
pub use runtime::{AbiVersion, ManagedRuntime, UpcallArg};
pub use surface::{NativeWindowRef, WindowSlot, WindowState};
