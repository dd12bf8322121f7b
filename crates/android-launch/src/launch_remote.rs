//! [`Pipeline`] over the gst-launch-remote C library.
//!
//! gst-launch-remote runs its own GLib main loop thread and reports through a
//! table of C callbacks plus one `user_data` pointer. Here `user_data` is a
//! leaked `Box<Arc<dyn PipelineEvents>>`, reclaimed after
//! `gst_launch_remote_free` has joined that thread.
//!
//! Fields of `GstLaunchRemote` are reached through the `android_launch_*`
//! accessors compiled from `native/launch_remote_shim.c`. The uri and
//! credential strings they set are owned by this side and released by
//! `android_launch_free`.

use std::borrow::Cow;
use std::ffi::{c_char, c_int, c_void, CStr, CString};
use std::ptr::NonNull;
use std::sync::Arc;

use android_launch_core::{
    BridgeError, BridgeResult, Pipeline, PipelineEvents, PipelineFactory, PipelineProperty, Sample,
};
use gstreamer as gst;
use gstreamer::glib::translate::from_glib_none;
use gstreamer::prelude::*;
use tracing::{debug, warn};

use crate::safety::boundary_or;
use crate::window::AndroidWindow;

#[repr(C)]
pub struct GstLaunchRemote {
    _private: [u8; 0],
}

#[repr(C)]
struct GstLaunchRemoteAppContext {
    app: *mut c_void,
    set_message: unsafe extern "C" fn(*const c_char, *mut c_void),
    set_error: unsafe extern "C" fn(*const c_char, c_int, *mut c_void),
    set_current_position: unsafe extern "C" fn(c_int, c_int, *mut c_void),
    initialized: unsafe extern "C" fn(*mut c_void),
    media_size_changed: unsafe extern "C" fn(c_int, c_int, *mut c_void),
    on_video_loaded: unsafe extern "C" fn(*mut c_void),
}

#[link(name = "gst_launch_remote")]
extern "C" {
    fn gst_launch_remote_new(ctx: *const GstLaunchRemoteAppContext) -> *mut GstLaunchRemote;
    fn gst_launch_remote_play(launch: *mut GstLaunchRemote);
    fn gst_launch_remote_pause(launch: *mut GstLaunchRemote);
    fn gst_launch_remote_stop(launch: *mut GstLaunchRemote);
    fn gst_launch_remote_set_window_handle(launch: *mut GstLaunchRemote, handle: usize);
}

// native/launch_remote_shim.c
extern "C" {
    fn android_launch_set_uri(launch: *mut GstLaunchRemote, uri: *const c_char);
    fn android_launch_set_username(launch: *mut GstLaunchRemote, username: *const c_char);
    fn android_launch_set_password(launch: *mut GstLaunchRemote, password: *const c_char);
    fn android_launch_set_tcp_timeout(launch: *mut GstLaunchRemote, timeout: c_int);
    fn android_launch_get_pipeline(launch: *mut GstLaunchRemote) -> *mut gst::ffi::GstElement;
    /// Frees the credentials, then calls `gst_launch_remote_free`, which
    /// joins the main loop thread.
    fn android_launch_free(launch: *mut GstLaunchRemote);
}

type Events = Arc<dyn PipelineEvents>;
type StringSetter = unsafe extern "C" fn(*mut GstLaunchRemote, *const c_char);

/// # Safety
/// `user_data` must be the pointer [`LaunchRemote::new`] registered, and the
/// pipeline must not have been freed.
unsafe fn events<'a>(user_data: *mut c_void) -> Option<&'a Events> {
    unsafe { user_data.cast::<Events>().as_ref() }
}

/// # Safety
/// `text` must be null or a valid NUL-terminated string.
unsafe fn text<'a>(text: *const c_char) -> Cow<'a, str> {
    if text.is_null() {
        Cow::Borrowed("")
    } else {
        unsafe { CStr::from_ptr(text) }.to_string_lossy()
    }
}

unsafe extern "C" fn on_message(message: *const c_char, user_data: *mut c_void) {
    boundary_or("set_message", (), || {
        if let Some(events) = unsafe { events(user_data) } {
            events.on_message(&unsafe { text(message) });
        }
    })
}

unsafe extern "C" fn on_error(message: *const c_char, code: c_int, user_data: *mut c_void) {
    boundary_or("set_error", (), || {
        if let Some(events) = unsafe { events(user_data) } {
            events.on_error(&unsafe { text(message) }, code);
        }
    })
}

unsafe extern "C" fn on_position(position: c_int, duration: c_int, user_data: *mut c_void) {
    boundary_or("set_current_position", (), || {
        if let Some(events) = unsafe { events(user_data) } {
            events.on_position(position, duration);
        }
    })
}

unsafe extern "C" fn on_ready(user_data: *mut c_void) {
    boundary_or("initialized", (), || {
        if let Some(events) = unsafe { events(user_data) } {
            events.on_ready();
        }
    })
}

unsafe extern "C" fn on_size_changed(width: c_int, height: c_int, user_data: *mut c_void) {
    boundary_or("media_size_changed", (), || {
        if let Some(events) = unsafe { events(user_data) } {
            events.on_size_changed(width, height);
        }
    })
}

unsafe extern "C" fn on_loaded(user_data: *mut c_void) {
    boundary_or("on_video_loaded", (), || {
        if let Some(events) = unsafe { events(user_data) } {
            events.on_loaded();
        }
    })
}

/// One gst-launch-remote instance.
pub struct LaunchRemote {
    raw: NonNull<GstLaunchRemote>,
    events: *mut Events,
    freed: bool,
}

// SAFETY: gst-launch-remote marshals every call onto its own main loop, and
// `events` is only touched again in `free`.
unsafe impl Send for LaunchRemote {}

impl LaunchRemote {
    pub fn new(events: Events) -> BridgeResult<Self> {
        let events = Box::into_raw(Box::new(events));
        let ctx = GstLaunchRemoteAppContext {
            app: events.cast(),
            set_message: on_message,
            set_error: on_error,
            set_current_position: on_position,
            initialized: on_ready,
            media_size_changed: on_size_changed,
            on_video_loaded: on_loaded,
        };

        // SAFETY: the context is copied by gst_launch_remote_new.
        let raw = unsafe { gst_launch_remote_new(&ctx) };
        match NonNull::new(raw) {
            Some(raw) => {
                debug!("Created gst-launch-remote at {:p}", raw);
                Ok(Self {
                    raw,
                    events,
                    freed: false,
                })
            }
            None => {
                // SAFETY: never handed to a live pipeline.
                drop(unsafe { Box::from_raw(events) });
                Err(BridgeError::Pipeline("gst_launch_remote_new returned NULL".into()))
            }
        }
    }

    fn set_string(&mut self, property: &str, value: &str, setter: StringSetter) {
        let Ok(value) = CString::new(value) else {
            warn!("Ignoring {property} containing a NUL byte");
            return;
        };
        // SAFETY: the shim duplicates the string.
        unsafe { setter(self.raw.as_ptr(), value.as_ptr()) }
    }

    /// Quits the main loop and reclaims the events box. Runs once.
    fn free(&mut self) {
        if self.freed {
            return;
        }
        self.freed = true;
        debug!("Quitting main loop...");
        // SAFETY: freeing joins the main loop thread, so no callback is
        // running or will run when the events box is reclaimed.
        unsafe {
            android_launch_free(self.raw.as_ptr());
            drop(Box::from_raw(self.events));
        }
    }
}

impl Pipeline for LaunchRemote {
    type Window = AndroidWindow;

    fn play(&mut self) {
        unsafe { gst_launch_remote_play(self.raw.as_ptr()) }
    }

    fn pause(&mut self) {
        unsafe { gst_launch_remote_pause(self.raw.as_ptr()) }
    }

    fn stop(&mut self) {
        unsafe { gst_launch_remote_stop(self.raw.as_ptr()) }
    }

    fn set_window_handle(&mut self, handle: usize) {
        unsafe { gst_launch_remote_set_window_handle(self.raw.as_ptr(), handle) }
    }

    fn set_property(&mut self, property: PipelineProperty<'_>) {
        match property {
            PipelineProperty::Uri(uri) => self.set_string("uri", uri, android_launch_set_uri),
            PipelineProperty::Username(name) => {
                self.set_string("username", name, android_launch_set_username)
            }
            PipelineProperty::Password(password) => {
                self.set_string("password", password, android_launch_set_password)
            }
            PipelineProperty::TcpTimeout(timeout) => unsafe {
                android_launch_set_tcp_timeout(self.raw.as_ptr(), timeout)
            },
        }
    }

    fn current_sample(&mut self) -> Option<Sample> {
        if let Err(e) = gst::init() {
            warn!("GStreamer init failed: {e}");
            return None;
        }
        // SAFETY: the pipeline element lives as long as `self.raw`; from_glib_none
        // takes its own reference.
        let element = unsafe { android_launch_get_pipeline(self.raw.as_ptr()) };
        if element.is_null() {
            return None;
        }
        let element: gst::Element = unsafe { from_glib_none(element) };

        element.find_property("sample")?;
        let sample = element.property::<Option<gst::Sample>>("sample")?;
        let caps = sample.caps().map(|caps| caps.to_string()).unwrap_or_default();
        let buffer = sample.buffer()?;
        let map = match buffer.map_readable() {
            Ok(map) => map,
            Err(e) => {
                warn!("Failed to map sample buffer: {e}");
                return None;
            }
        };
        Some(Sample {
            caps,
            data: map.as_slice().to_vec(),
        })
    }

    fn destroy(mut self) {
        self.free();
    }
}

impl Drop for LaunchRemote {
    fn drop(&mut self) {
        if !self.freed {
            warn!("gst-launch-remote dropped without destroy");
            self.free();
        }
    }
}

pub struct LaunchRemoteFactory;

impl PipelineFactory for LaunchRemoteFactory {
    type Pipeline = LaunchRemote;

    fn create(&self, events: Arc<dyn PipelineEvents>) -> BridgeResult<LaunchRemote> {
        LaunchRemote::new(events)
    }
}
