//! Thread-local environment registry.
//!
//! Any thread that needs to call into the managed runtime goes through
//! [`EnvRegistry::get_environment`]. The first call on a thread attaches it and
//! parks an [`Attachment`] in a thread-local map; the attachment's `Drop`
//! detaches the thread when the OS tears its thread-local storage down. There
//! is no other detach path.
//!
//! The map is keyed by registry id so two registries (e.g. two runtimes in a
//! test process) never hand each other's environments out.

use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::diagnostics;
use crate::runtime::{AbiVersion, ManagedRuntime};

thread_local! {
    static ATTACHMENTS: RefCell<HashMap<u64, Box<dyn Any>>> = RefCell::new(HashMap::new());
}

static NEXT_REGISTRY_ID: AtomicU64 = AtomicU64::new(1);

/// One attached thread. Dropped on thread exit.
struct Attachment<R: ManagedRuntime> {
    runtime: Arc<R>,
    env: R::Env,
}

impl<R: ManagedRuntime> Drop for Attachment<R> {
    fn drop(&mut self) {
        // thread::current() is off limits here: thread-local storage is
        // being destroyed.
        debug!("Detaching thread");
        self.runtime.detach_current_thread(&self.env);
        diagnostics::record_thread_detached();
    }
}

/// Lazily attaches threads to a managed runtime.
pub struct EnvRegistry<R: ManagedRuntime> {
    id: u64,
    runtime: Arc<R>,
    version: AbiVersion,
}

impl<R: ManagedRuntime> EnvRegistry<R> {
    pub fn new(runtime: Arc<R>, version: AbiVersion) -> Self {
        Self {
            id: NEXT_REGISTRY_ID.fetch_add(1, Ordering::Relaxed),
            runtime,
            version,
        }
    }

    /// Returns an environment valid for the calling thread, attaching it on
    /// first use.
    ///
    /// `None` means the thread could not join the runtime this time; callers
    /// drop whatever they were about to dispatch. Failures are not cached, so
    /// the next call retries.
    pub fn get_environment(&self) -> Option<R::Env> {
        let cached = ATTACHMENTS.try_with(|slots| {
            slots
                .borrow()
                .get(&self.id)
                .and_then(|slot| slot.downcast_ref::<Attachment<R>>())
                .map(|attachment| attachment.env.clone())
        });

        match cached {
            Ok(Some(env)) => return Some(env),
            Ok(None) => {}
            Err(_) => {
                // Thread-local storage is already being torn down; attaching
                // now would never be matched by a detach.
                warn!("Thread is exiting, refusing to attach");
                return None;
            }
        }

        debug!("Attaching thread {:?}", std::thread::current().id());
        let env = match self.runtime.attach_current_thread(self.version) {
            Ok(env) => env,
            Err(e) => {
                error!("{e}");
                return None;
            }
        };
        diagnostics::record_thread_attached();

        let attachment = Attachment {
            runtime: Arc::clone(&self.runtime),
            env: env.clone(),
        };
        let stored = ATTACHMENTS.try_with(|slots| {
            slots.borrow_mut().insert(self.id, Box::new(attachment));
        });
        if stored.is_err() {
            // The attachment was dropped with the closure, which detached.
            return None;
        }

        Some(env)
    }

    /// Whether the calling thread already holds an attachment.
    #[cfg(test)]
    fn is_attached(&self) -> bool {
        ATTACHMENTS
            .try_with(|slots| slots.borrow().contains_key(&self.id))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BridgeError;
    use crate::runtime::UpcallArg;
    use parking_lot::Mutex;
    use std::sync::atomic::AtomicBool;
    use std::thread::{self, ThreadId};

    #[derive(Default)]
    struct CountingRuntime {
        attached: Mutex<Vec<ThreadId>>,
        detached: Mutex<Vec<ThreadId>>,
        refuse: AtomicBool,
    }

    impl ManagedRuntime for CountingRuntime {
        type Env = ThreadId;
        type Object = ();
        type Method = ();

        fn attach_current_thread(&self, _version: AbiVersion) -> Result<ThreadId, BridgeError> {
            if self.refuse.load(Ordering::SeqCst) {
                return Err(BridgeError::AttachFailed("refused".into()));
            }
            let id = thread::current().id();
            self.attached.lock().push(id);
            Ok(id)
        }

        fn detach_current_thread(&self, env: &ThreadId) {
            self.detached.lock().push(*env);
        }

        fn call_void(
            &self,
            _env: &ThreadId,
            _target: &(),
            _method: (),
            _args: &[UpcallArg<'_>],
        ) -> Result<(), BridgeError> {
            Ok(())
        }

        fn clear_pending_fault(&self, _env: &ThreadId) -> bool {
            false
        }
    }

    #[test]
    fn attaches_once_per_thread() {
        let runtime = Arc::new(CountingRuntime::default());
        let registry = Arc::new(EnvRegistry::new(Arc::clone(&runtime), AbiVersion::V1_4));

        let worker_registry = Arc::clone(&registry);
        let worker = thread::spawn(move || {
            let first = worker_registry.get_environment();
            let second = worker_registry.get_environment();
            assert_eq!(first, second);
            assert!(worker_registry.is_attached());
            thread::current().id()
        });
        let worker_id = worker.join().unwrap();

        assert_eq!(*runtime.attached.lock(), vec![worker_id]);
    }

    #[test]
    fn detaches_on_thread_exit() {
        let runtime = Arc::new(CountingRuntime::default());
        let registry = Arc::new(EnvRegistry::new(Arc::clone(&runtime), AbiVersion::V1_4));

        let worker_registry = Arc::clone(&registry);
        let worker_id = thread::spawn(move || {
            worker_registry.get_environment();
            thread::current().id()
        })
        .join()
        .unwrap();

        assert_eq!(*runtime.detached.lock(), vec![worker_id]);
    }

    #[test]
    fn failed_attach_is_not_cached() {
        let runtime = Arc::new(CountingRuntime::default());
        let registry = EnvRegistry::new(Arc::clone(&runtime), AbiVersion::V1_4);

        runtime.refuse.store(true, Ordering::SeqCst);
        assert!(registry.get_environment().is_none());
        assert!(!registry.is_attached());

        runtime.refuse.store(false, Ordering::SeqCst);
        assert_eq!(registry.get_environment(), Some(thread::current().id()));
        assert_eq!(runtime.attached.lock().len(), 1);
    }

    #[test]
    fn registries_do_not_share_attachments() {
        let first = Arc::new(CountingRuntime::default());
        let second = Arc::new(CountingRuntime::default());
        let a = EnvRegistry::new(Arc::clone(&first), AbiVersion::V1_4);
        let b = EnvRegistry::new(Arc::clone(&second), AbiVersion::V1_6);

        a.get_environment();
        assert!(a.is_attached());
        assert!(!b.is_attached());

        b.get_environment();
        assert_eq!(first.attached.lock().len(), 1);
        assert_eq!(second.attached.lock().len(), 1);
    }
}
