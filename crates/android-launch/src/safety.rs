//! JNI and pipeline boundary safety.
//!
//! Every `extern` function the JVM or gst-launch-remote calls wraps its body
//! in [`jni_boundary`] or [`boundary_or`], which:
//! 1. Catches panics via `std::panic::catch_unwind()`
//! 2. Logs a `BridgeError` instead of letting it reach the caller

use std::panic::{catch_unwind, AssertUnwindSafe};

use android_launch_core::BridgeResult;

/// Runs a `void` entry point body, logging errors and panics.
///
/// # Safety rationale for `AssertUnwindSafe`
///
/// Shared bridge state sits behind `parking_lot::Mutex` (poison-free), and
/// owner handles are only mutated after the fallible work succeeded, so an
/// unwind leaves nothing half-updated.
pub fn jni_boundary<F>(entry: &str, f: F)
where
    F: FnOnce() -> BridgeResult<()>,
{
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::error!("{entry}: {e}"),
        Err(_panic) => tracing::error!("{entry}: caught Rust panic at JNI boundary"),
    }
}

/// Runs an entry point with a return value. Returns `default` on panic.
pub fn boundary_or<T, F>(entry: &str, default: T, f: F) -> T
where
    F: FnOnce() -> T,
{
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(val) => val,
        Err(_panic) => {
            tracing::error!("{entry}: caught Rust panic at JNI boundary");
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use android_launch_core::BridgeError;
    use std::cell::Cell;

    #[test]
    fn panics_do_not_escape() {
        jni_boundary("nativePlay", || panic!("pipeline exploded"));
        assert_eq!(boundary_or("nativeClassInit", 0u8, || panic!("no class")), 0);
    }

    #[test]
    fn errors_are_absorbed() {
        let ran = Cell::new(false);
        jni_boundary("nativeInit", || {
            ran.set(true);
            Err(BridgeError::NotRegistered)
        });
        assert!(ran.get());
    }

    #[test]
    fn value_passes_through() {
        assert_eq!(boundary_or("JNI_OnLoad", 0, || 0x0001_0004), 0x0001_0004);
    }
}
