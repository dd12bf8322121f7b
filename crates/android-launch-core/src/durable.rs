//! Durable references to managed objects.

use crate::diagnostics;

/// Ownership token for a durable managed reference.
///
/// A `DurableRef` is created once from a reference the runtime has already
/// promoted (e.g. a JNI global ref) and released exactly once: either through
/// [`DurableRef::release`] or when it is dropped. Because `release` consumes
/// the token, a second release does not type-check, and nothing borrowed from
/// [`DurableRef::get`] can outlive it.
pub struct DurableRef<T> {
    object: T,
}

impl<T> DurableRef<T> {
    pub fn new(object: T) -> Self {
        diagnostics::record_durable_created();
        Self { object }
    }

    pub fn get(&self) -> &T {
        &self.object
    }

    /// Releases the reference now.
    pub fn release(self) {
        tracing::debug!("Releasing durable owner reference");
        drop(self);
    }
}

impl<T> Drop for DurableRef<T> {
    fn drop(&mut self) {
        // `object` is dropped right after this, which is the actual release.
        diagnostics::record_durable_released();
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for DurableRef<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("DurableRef").field(&self.object).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Tracked(Arc<AtomicUsize>);

    impl Drop for Tracked {
        fn drop(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn release_drops_the_object_once() {
        let releases = Arc::new(AtomicUsize::new(0));
        let durable = DurableRef::new(Tracked(Arc::clone(&releases)));
        assert_eq!(releases.load(Ordering::SeqCst), 0);
        durable.release();
        assert_eq!(releases.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn implicit_drop_also_releases() {
        let releases = Arc::new(AtomicUsize::new(0));
        {
            let _durable = DurableRef::new(Tracked(Arc::clone(&releases)));
        }
        assert_eq!(releases.load(Ordering::SeqCst), 1);
    }
}
