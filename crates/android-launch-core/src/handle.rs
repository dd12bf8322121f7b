//! Raw bridge handles stored in the owner's `long` field.
//!
//! A handle is the address of a boxed bridge, widened to `i64`. `0` means no
//! instance. Every live handle is in the diagnostics registry; anything else
//! read back from the owner is treated as absent.

use tracing::{error, warn};

use crate::diagnostics;
use crate::error::BridgeResult;

/// Value stored in the owner's handle field.
pub type RawHandle = i64;

/// The owner-side storage for a [`RawHandle`].
///
/// On Android this is the `long` field on the activity; tests use a plain
/// integer.
pub trait OwnerSlot {
    fn load(&mut self) -> BridgeResult<RawHandle>;
    fn store(&mut self, handle: RawHandle) -> BridgeResult<()>;
}

/// Leaks `value` and returns its registered handle.
pub fn into_raw<T>(value: Box<T>) -> RawHandle {
    let ptr = Box::into_raw(value);
    let addr = ptr as usize;
    if !diagnostics::register_bridge(addr) {
        error!("Bridge handle {addr:#x} registered twice");
    }
    addr as RawHandle
}

/// Borrows the value behind `handle`.
///
/// Returns `None` for `0` and for handles the registry does not know.
///
/// # Safety
/// `handle` must have come from [`into_raw::<T>`], and [`take`] must not run
/// for it while the returned reference is alive.
pub unsafe fn borrow<'a, T>(handle: RawHandle) -> Option<&'a T> {
    if handle == 0 {
        return None;
    }
    let addr = handle as usize;
    if !diagnostics::is_registered(addr) {
        warn!("Ignoring unknown bridge handle {addr:#x}");
        return None;
    }
    // SAFETY: registered, so still owned by a leaked Box<T> per the contract.
    Some(unsafe { &*(addr as *const T) })
}

/// Reclaims ownership of the value behind `handle` and unregisters it.
///
/// # Safety
/// `handle` must have come from [`into_raw::<T>`], with no borrow from
/// [`borrow`] still alive.
pub unsafe fn take<T>(handle: RawHandle) -> Option<Box<T>> {
    if handle == 0 {
        return None;
    }
    let addr = handle as usize;
    if !diagnostics::unregister_bridge(addr) {
        error!("Refusing to free unknown bridge handle {addr:#x}");
        return None;
    }
    // SAFETY: the registry entry proves this is a live Box<T> from into_raw.
    Some(unsafe { Box::from_raw(addr as *mut T) })
}
