//! Pipeline events to managed upcalls.
//!
//! One [`Dispatcher`] per bridge. The pipeline holds it as its event receiver
//! and calls it from worker threads. Each callback:
//!
//! 1. gets the thread's environment, attaching on first use (or drops the
//!    callback if the thread cannot attach),
//! 2. calls the owner's method through the durable reference,
//! 3. clears and logs any managed fault so it never reaches the pipeline.
//!
//! Transient managed strings are created and released inside
//! [`ManagedRuntime::call_void`].

use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::context::BridgeContext;
use crate::diagnostics;
use crate::durable::DurableRef;
use crate::methods::{MethodTable, Upcall};
use crate::pipeline::PipelineEvents;
use crate::runtime::{ManagedRuntime, UpcallArg};

pub struct Dispatcher<R: ManagedRuntime> {
    context: Arc<BridgeContext<R>>,
    methods: MethodTable<R::Method>,
    owner: DurableRef<R::Object>,
}

impl<R: ManagedRuntime> Dispatcher<R> {
    pub fn new(
        context: Arc<BridgeContext<R>>,
        methods: MethodTable<R::Method>,
        owner: DurableRef<R::Object>,
    ) -> Self {
        Self {
            context,
            methods,
            owner,
        }
    }

    /// Consumes the dispatcher and releases the owner reference.
    pub fn release_owner(self) {
        self.owner.release();
    }

    fn upcall(&self, upcall: Upcall, args: &[UpcallArg<'_>]) {
        let Some(env) = self.context.environment() else {
            diagnostics::record_callback_dropped();
            warn!("No environment for this thread, dropping {}", upcall.name());
            return;
        };

        let runtime = self.context.runtime();
        let result = runtime.call_void(&env, self.owner.get(), self.methods.get(upcall), args);

        if runtime.clear_pending_fault(&env) {
            diagnostics::record_managed_fault();
            error!("Failed to call Java method {}", upcall.name());
            return;
        }

        match result {
            Ok(()) => diagnostics::record_callback_dispatched(),
            Err(e) => error!("{}: {e}", upcall.name()),
        }
    }
}

impl<R: ManagedRuntime> PipelineEvents for Dispatcher<R> {
    fn on_message(&self, message: &str) {
        debug!("Setting message to: {message}");
        self.upcall(Upcall::SetMessage, &[UpcallArg::Str(message)]);
    }

    fn on_error(&self, message: &str, code: i32) {
        debug!("Error {code}: {message}");
        self.upcall(Upcall::OnError, &[UpcallArg::Str(message), UpcallArg::Int(code)]);
    }

    fn on_position(&self, position: i32, duration: i32) {
        self.upcall(
            Upcall::SetCurrentPosition,
            &[UpcallArg::Int(position), UpcallArg::Int(duration)],
        );
    }

    fn on_size_changed(&self, width: i32, height: i32) {
        debug!("Media size changed to {width}x{height}");
        self.upcall(
            Upcall::OnMediaSizeChanged,
            &[UpcallArg::Int(width), UpcallArg::Int(height)],
        );
    }

    fn on_ready(&self) {
        self.upcall(Upcall::OnInitialized, &[]);
    }

    fn on_loaded(&self) {
        self.upcall(Upcall::OnVideoLoaded, &[]);
    }
}
