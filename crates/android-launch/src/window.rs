//! `ANativeWindow` ownership.

use std::ptr::NonNull;

use android_launch_core::NativeWindowRef;
use jni::objects::JObject;
use jni::JNIEnv;

/// An acquired `ANativeWindow`. Released on drop.
pub struct AndroidWindow(NonNull<ndk_sys::ANativeWindow>);

// SAFETY: ANativeWindow is reference counted and thread-safe; we only hand
// the pointer to the pipeline and release it.
unsafe impl Send for AndroidWindow {}

impl AndroidWindow {
    /// Acquires the window behind an `android.view.Surface`.
    ///
    /// Returns `None` when the surface has no native window.
    pub fn from_surface(env: &JNIEnv<'_>, surface: &JObject<'_>) -> Option<Self> {
        // SAFETY: `env` is valid for the calling thread and `surface` is a live
        // reference for the duration of this native call.
        let raw = unsafe {
            ndk_sys::ANativeWindow_fromSurface(env.get_raw().cast(), surface.as_raw().cast())
        };
        NonNull::new(raw).map(Self)
    }
}

impl NativeWindowRef for AndroidWindow {
    fn raw_handle(&self) -> usize {
        self.0.as_ptr() as usize
    }
}

impl Drop for AndroidWindow {
    fn drop(&mut self) {
        // SAFETY: we hold the reference ANativeWindow_fromSurface acquired.
        unsafe { ndk_sys::ANativeWindow_release(self.0.as_ptr()) }
    }
}
