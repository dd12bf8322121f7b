//! Process-wide bridge context.

use std::sync::{Arc, OnceLock};

use tracing::{debug, error};

use crate::config::BridgeConfig;
use crate::env_registry::EnvRegistry;
use crate::error::BridgeResult;
use crate::methods::MethodTable;
use crate::runtime::ManagedRuntime;

/// Everything the bridge needs that outlives any single instance.
///
/// Built once when the library is loaded and shared by `Arc` with every
/// bridge and dispatcher. The method table is filled in later by
/// [`BridgeContext::class_init`]; until then [`crate::Bridge::init`] refuses
/// to create instances.
pub struct BridgeContext<R: ManagedRuntime> {
    runtime: Arc<R>,
    registry: EnvRegistry<R>,
    config: BridgeConfig,
    methods: OnceLock<MethodTable<R::Method>>,
}

impl<R: ManagedRuntime> BridgeContext<R> {
    pub fn new(runtime: Arc<R>, config: BridgeConfig) -> Arc<Self> {
        let registry = EnvRegistry::new(Arc::clone(&runtime), config.abi_version);
        Arc::new(Self {
            runtime,
            registry,
            config,
            methods: OnceLock::new(),
        })
    }

    /// Environment for the calling thread, attaching it if needed.
    pub fn environment(&self) -> Option<R::Env> {
        self.registry.get_environment()
    }

    /// Resolves and caches the callback method table.
    ///
    /// Calling it again after a success keeps the first table.
    pub fn class_init<F>(&self, lookup: F) -> BridgeResult<()>
    where
        F: FnMut(&str, &str) -> Option<R::Method>,
    {
        if self.methods.get().is_some() {
            debug!("Callback methods already resolved");
            return Ok(());
        }
        let table = MethodTable::resolve(lookup).inspect_err(|e| error!("{e}"))?;
        // A concurrent class_init may have won; both tables are equivalent.
        let _ = self.methods.set(table);
        Ok(())
    }

    pub fn methods(&self) -> Option<&MethodTable<R::Method>> {
        self.methods.get()
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn runtime(&self) -> &Arc<R> {
        &self.runtime
    }
}
