//! Bridge configuration.

use std::path::PathBuf;

use crate::runtime::AbiVersion;

/// Default managed owner class, in JNI slash notation.
pub const DEFAULT_OWNER_CLASS: &str = "io/evercam/androidapp/video/VideoActivity";

/// Default name of the `long` field that stores the bridge handle.
pub const DEFAULT_HANDLE_FIELD: &str = "native_app_data";

/// Default log tag.
pub const DEFAULT_LOG_TAG: &str = "android-launch";

/// Default destination for `request_sample` dumps.
pub const DEFAULT_SAMPLE_PATH: &str = "/sdcard/sample.dat";

/// Process-wide bridge settings, fixed at load time.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Owner class whose native methods are registered.
    pub owner_class: String,
    /// Field on the owner holding the raw bridge handle.
    pub handle_field: String,
    /// Minimum runtime ABI requested when attaching threads.
    pub abi_version: AbiVersion,
    /// Tag for platform log output.
    pub log_tag: String,
    /// Most verbose level forwarded to the platform log.
    pub log_level: tracing::Level,
    /// Where `request_sample` writes the raw frame bytes.
    pub sample_path: PathBuf,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            owner_class: DEFAULT_OWNER_CLASS.to_string(),
            handle_field: DEFAULT_HANDLE_FIELD.to_string(),
            abi_version: AbiVersion::V1_4,
            log_tag: DEFAULT_LOG_TAG.to_string(),
            log_level: tracing::Level::DEBUG,
            sample_path: PathBuf::from(DEFAULT_SAMPLE_PATH),
        }
    }
}

impl BridgeConfig {
    pub fn with_sample_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.sample_path = path.into();
        self
    }
}
