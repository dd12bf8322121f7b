//! Logcat output.

use std::ffi::{c_char, c_int, CString};

use android_launch_core::BridgeConfig;
use tracing::log::LevelFilter;

const ANDROID_LOG_ERROR: c_int = 6;

extern "C" {
    fn __android_log_write(prio: c_int, tag: *const c_char, text: *const c_char) -> c_int;
}

/// Routes `tracing` (through its `log` records) to logcat.
pub fn init(config: &BridgeConfig) {
    android_logger::init_once(
        android_logger::Config::default()
            .with_max_level(level_filter(config.log_level))
            .with_tag(config.log_tag.as_str()),
    );
}

fn level_filter(level: tracing::Level) -> LevelFilter {
    match level {
        tracing::Level::ERROR => LevelFilter::Error,
        tracing::Level::WARN => LevelFilter::Warn,
        tracing::Level::INFO => LevelFilter::Info,
        tracing::Level::DEBUG => LevelFilter::Debug,
        tracing::Level::TRACE => LevelFilter::Trace,
    }
}

/// Writes an error straight to logcat, for use before [`init`] has run.
pub fn write_raw(tag: &str, message: &str) {
    let (Ok(tag), Ok(text)) = (CString::new(tag), CString::new(message)) else {
        return;
    };
    // SAFETY: both pointers are valid NUL-terminated strings for the call.
    unsafe {
        __android_log_write(ANDROID_LOG_ERROR, tag.as_ptr(), text.as_ptr());
    }
}
