//! Bridge instances and the command surface.
//!
//! A [`Bridge`] couples one managed owner with one pipeline. It is boxed and
//! leaked into a [`RawHandle`] stored in the owner's slot; every command
//! reads the slot, and a zero or unknown handle makes the command a no-op.
//!
//! Commands come from the owner's thread. Pipeline events reach the owner
//! through the [`Dispatcher`], never through the bridge. A pipeline may still
//! deliver an event synchronously from inside a command; a command the owner
//! issues from that upcall fails with [`BridgeError::Reentrant`] instead of
//! waiting on the lock its own thread holds.

use std::sync::Arc;
use std::thread::{self, ThreadId};

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::context::BridgeContext;
use crate::diagnostics;
use crate::dispatcher::Dispatcher;
use crate::durable::DurableRef;
use crate::error::{BridgeError, BridgeResult};
use crate::handle::{self, OwnerSlot, RawHandle};
use crate::pipeline::{Pipeline, PipelineEvents, PipelineFactory, PipelineProperty};
use crate::runtime::ManagedRuntime;
use crate::surface::{WindowSlot, WindowState};

/// Last value of each setting forwarded to the pipeline.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct CommandCache {
    pub uri: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub timeout: Option<i32>,
}

impl std::fmt::Debug for CommandCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandCache")
            .field("uri", &self.uri)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("timeout", &self.timeout)
            .finish()
    }
}

struct BridgeState<P: Pipeline> {
    pipeline: P,
    window: WindowSlot<P::Window>,
    settings: CommandCache,
}

/// Clears the holder when a pipeline call returns or unwinds.
struct HolderGuard<'a>(&'a Mutex<Option<ThreadId>>);

impl Drop for HolderGuard<'_> {
    fn drop(&mut self) {
        *self.0.lock() = None;
    }
}

/// One bridge instance.
pub struct Bridge<P: Pipeline, R: ManagedRuntime> {
    state: Mutex<BridgeState<P>>,
    /// Thread currently calling into the pipeline with `state` locked.
    holder: Mutex<Option<ThreadId>>,
    dispatcher: Arc<Dispatcher<R>>,
    context: Arc<BridgeContext<R>>,
}

impl<P: Pipeline, R: ManagedRuntime> Bridge<P, R> {
    /// Creates a bridge for `owner` and stores its handle in `slot`.
    ///
    /// Fails with [`BridgeError::NotRegistered`] until
    /// [`BridgeContext::class_init`] has succeeded. An instance already in
    /// the slot is finalized first.
    pub fn init<F, S>(
        context: &Arc<BridgeContext<R>>,
        factory: &F,
        owner: DurableRef<R::Object>,
        slot: &mut S,
    ) -> BridgeResult<()>
    where
        F: PipelineFactory<Pipeline = P>,
        S: OwnerSlot + ?Sized,
    {
        let Some(methods) = context.methods() else {
            return Err(BridgeError::NotRegistered);
        };

        if slot.load()? != 0 {
            warn!("Bridge already initialized, finalizing previous instance");
            Self::finalize(slot)?;
        }

        let dispatcher = Arc::new(Dispatcher::new(Arc::clone(context), *methods, owner));
        let events: Arc<dyn PipelineEvents> = dispatcher.clone();
        let pipeline = factory.create(events)?;

        let bridge = Box::new(Self {
            state: Mutex::new(BridgeState {
                pipeline,
                window: WindowSlot::default(),
                settings: CommandCache::default(),
            }),
            holder: Mutex::new(None),
            dispatcher,
            context: Arc::clone(context),
        });
        let handle = handle::into_raw(bridge);
        diagnostics::record_bridge_created();

        if let Err(e) = slot.store(handle) {
            // SAFETY: `handle` was produced just above and never published.
            if let Some(bridge) = unsafe { handle::take::<Self>(handle) } {
                bridge.teardown();
            }
            return Err(e);
        }

        debug!("Created bridge {handle:#x}");
        Ok(())
    }

    /// Tears the instance in `slot` down and clears the slot.
    ///
    /// No-op when the slot is empty, so repeated calls are harmless.
    pub fn finalize<S>(slot: &mut S) -> BridgeResult<()>
    where
        S: OwnerSlot + ?Sized,
    {
        let handle = slot.load()?;
        if handle == 0 {
            return Ok(());
        }

        // SAFETY: the borrow ends before `take` below.
        if let Some(bridge) = unsafe { handle::borrow::<Self>(handle) } {
            if bridge.held_by_current_thread() {
                return Err(BridgeError::Reentrant);
            }
        }

        debug!("Deleting bridge {handle:#x}");
        // SAFETY: slot handles only come from `init` for this bridge type, and
        // commands run on the owner's thread, so no borrow is alive here.
        if let Some(bridge) = unsafe { handle::take::<Self>(handle) } {
            bridge.teardown();
        }
        slot.store(0)?;
        debug!("Done finalizing");
        Ok(())
    }

    pub fn play<S: OwnerSlot + ?Sized>(slot: &mut S) -> BridgeResult<()> {
        Self::with_state(slot, |state| {
            debug!("Setting state to PLAYING");
            state.pipeline.play();
        })
        .map(drop)
    }

    pub fn pause<S: OwnerSlot + ?Sized>(slot: &mut S) -> BridgeResult<()> {
        Self::with_state(slot, |state| {
            debug!("Setting state to PAUSED");
            state.pipeline.pause();
        })
        .map(drop)
    }

    pub fn stop<S: OwnerSlot + ?Sized>(slot: &mut S) -> BridgeResult<()> {
        Self::with_state(slot, |state| {
            debug!("Setting state to NULL");
            state.pipeline.stop();
        })
        .map(drop)
    }

    pub fn set_uri<S: OwnerSlot + ?Sized>(slot: &mut S, uri: &str) -> BridgeResult<()> {
        Self::with_state(slot, |state| {
            debug!("Setting URI to {uri}");
            state.settings.uri = Some(uri.to_owned());
            state.pipeline.set_property(PipelineProperty::Uri(uri));
        })
        .map(drop)
    }

    pub fn set_username<S: OwnerSlot + ?Sized>(slot: &mut S, username: &str) -> BridgeResult<()> {
        Self::with_state(slot, |state| {
            debug!("Setting username to {username}");
            state.settings.username = Some(username.to_owned());
            state.pipeline.set_property(PipelineProperty::Username(username));
        })
        .map(drop)
    }

    pub fn set_password<S: OwnerSlot + ?Sized>(slot: &mut S, password: &str) -> BridgeResult<()> {
        Self::with_state(slot, |state| {
            debug!("Setting password");
            state.settings.password = Some(password.to_owned());
            state.pipeline.set_property(PipelineProperty::Password(password));
        })
        .map(drop)
    }

    pub fn set_timeout<S: OwnerSlot + ?Sized>(slot: &mut S, timeout: i32) -> BridgeResult<()> {
        Self::with_state(slot, |state| {
            debug!("Setting TCP timeout to {timeout}");
            state.settings.timeout = Some(timeout);
            state.pipeline.set_property(PipelineProperty::TcpTimeout(timeout));
        })
        .map(drop)
    }

    /// Attaches or replaces the render target.
    ///
    /// Without an instance the window is released immediately.
    pub fn surface_init<S: OwnerSlot + ?Sized>(slot: &mut S, window: P::Window) -> BridgeResult<()> {
        let mut window = Some(window);
        Self::with_state(slot, |state| {
            if let Some(window) = window.take() {
                state.window.attach(&mut state.pipeline, window);
            }
        })?;
        if window.is_some() {
            debug!("No bridge instance, releasing native window");
        }
        Ok(())
    }

    pub fn surface_finalize<S: OwnerSlot + ?Sized>(slot: &mut S) -> BridgeResult<()> {
        Self::with_state(slot, |state| state.window.detach(&mut state.pipeline)).map(drop)
    }

    /// Writes the pipeline's current frame to the configured dump path.
    ///
    /// Returns the number of bytes written, or `None` without an instance.
    pub fn request_sample<S: OwnerSlot + ?Sized>(slot: &mut S) -> BridgeResult<Option<usize>> {
        let pulled = Self::with_bridge(slot, |bridge| {
            let path = bridge.context.config().sample_path.clone();
            bridge
                .locked(|state| state.pipeline.current_sample())
                .map(|sample| (sample, path))
        })?
        .transpose()?;
        let Some((sample, path)) = pulled else {
            return Ok(None);
        };
        let sample = sample.ok_or(BridgeError::NoSample)?;

        info!("Sample caps: {}", sample.caps);
        std::fs::write(&path, &sample.data)?;
        info!("Wrote {} bytes to {}", sample.data.len(), path.display());
        Ok(Some(sample.data.len()))
    }

    pub fn settings<S: OwnerSlot + ?Sized>(slot: &mut S) -> BridgeResult<Option<CommandCache>> {
        Self::with_state(slot, |state| state.settings.clone())
    }

    pub fn window_state<S: OwnerSlot + ?Sized>(slot: &mut S) -> BridgeResult<Option<WindowState>> {
        Self::with_state(slot, |state| state.window.state())
    }

    /// Detach window, destroy pipeline, release owner. In that order.
    fn teardown(self: Box<Self>) {
        let Self {
            state, dispatcher, ..
        } = *self;
        let BridgeState {
            mut pipeline,
            mut window,
            settings,
        } = state.into_inner();

        window.detach(&mut pipeline);
        pipeline.destroy();
        drop(settings);

        match Arc::try_unwrap(dispatcher) {
            Ok(dispatcher) => dispatcher.release_owner(),
            Err(_) => warn!("Pipeline still holds its event receiver after destroy"),
        }
        diagnostics::record_bridge_destroyed();
    }

    fn held_by_current_thread(&self) -> bool {
        *self.holder.lock() == Some(thread::current().id())
    }

    /// Runs `f` with the state locked, refusing re-entry from the thread
    /// that already holds it.
    fn locked<T>(&self, f: impl FnOnce(&mut BridgeState<P>) -> T) -> BridgeResult<T> {
        if self.held_by_current_thread() {
            return Err(BridgeError::Reentrant);
        }
        let mut state = self.state.lock();
        *self.holder.lock() = Some(thread::current().id());
        let _holder = HolderGuard(&self.holder);
        Ok(f(&mut state))
    }

    fn with_bridge<S, T>(slot: &mut S, f: impl FnOnce(&Self) -> T) -> BridgeResult<Option<T>>
    where
        S: OwnerSlot + ?Sized,
    {
        let handle: RawHandle = slot.load()?;
        // SAFETY: see `finalize`; the borrow ends before this returns.
        let Some(bridge) = (unsafe { handle::borrow::<Self>(handle) }) else {
            return Ok(None);
        };
        Ok(Some(f(bridge)))
    }

    fn with_state<S, T>(
        slot: &mut S,
        f: impl FnOnce(&mut BridgeState<P>) -> T,
    ) -> BridgeResult<Option<T>>
    where
        S: OwnerSlot + ?Sized,
    {
        Self::with_bridge(slot, |bridge| bridge.locked(f))?.transpose()
    }
}
