//! The bridge context: runtime slot plus plugin registry behind one lock.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use netbridge_shared::{Error, Handle, Result};

use crate::config::{BridgeConfig, runtime_config_path};
use crate::hostfxr::{LibraryResolver, ResolverLoader};
use crate::plugin::{MethodDescriptor, PluginInstance};
use crate::registry::{PluginRegistry, derive_handle, plugin_name};
use crate::runtime::{RuntimeContext, RuntimeParams};

#[derive(Debug, Default)]
struct BridgeState {
    /// Set once by the first successful registration, never replaced.
    runtime: Option<Arc<RuntimeContext>>,
    registry: PluginRegistry,
}

/// Hosts at most one .NET runtime and the plugins registered against it.
///
/// All methods take `&self`; registration (including first-time runtime
/// initialization) is serialized by an internal mutex, so the runtime is
/// created exactly once and check-then-insert is atomic. Managed code runs
/// without the lock held.
///
/// `invoke` and `close` must not be called concurrently for the same runtime:
/// closing while a managed call is in flight is not detected.
#[derive(Debug)]
pub struct Bridge<R: ResolverLoader = LibraryResolver> {
    config: BridgeConfig,
    resolver: R,
    state: Mutex<BridgeState>,
}

impl Bridge<LibraryResolver> {
    pub fn new(config: BridgeConfig) -> Self {
        Self::with_resolver(config, LibraryResolver)
    }
}

impl<R: ResolverLoader> Bridge<R> {
    pub fn with_resolver(config: BridgeConfig, resolver: R) -> Self {
        Self {
            config,
            resolver,
            state: Mutex::new(BridgeState::default()),
        }
    }

    pub fn resolver(&self) -> &R {
        &self.resolver
    }

    fn state(&self) -> MutexGuard<'_, BridgeState> {
        // Registry and runtime slot are only ever written after every fallible
        // step succeeded, so a poisoned guard still holds consistent data.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register the assembly at `assembly_path`, initializing the runtime if
    /// this is the first plugin.
    ///
    /// A relative `assembly_path` is taken relative to the current directory.
    /// Registering a name that is already known returns its handle without
    /// side effects. On failure nothing is recorded.
    pub fn register(&self, assembly_path: &Path) -> Result<Handle> {
        let name = plugin_name(assembly_path)?;
        let absolute = std::path::absolute(assembly_path)?;
        let assembly_path = absolute.as_path();
        let mut state = self.state();

        if let Some(handle) = state.registry.find(&name)? {
            tracing::debug!("Plugin {} already registered as {}", name, handle);
            return Ok(handle);
        }

        let runtime = match &state.runtime {
            Some(runtime) if runtime.is_closed() => return Err(Error::RuntimeClosed),
            Some(runtime) => runtime.clone(),
            None => {
                let runtime = Arc::new(self.start_runtime(assembly_path)?);
                state.runtime = Some(runtime.clone());
                runtime
            }
        };

        let handle = derive_handle(&name);
        state.registry.insert(
            handle,
            PluginInstance::new(assembly_path.to_path_buf(), name.clone(), runtime),
        )?;
        tracing::info!(
            "Registered {} ({}) as {}",
            name,
            assembly_path.display(),
            handle
        );
        Ok(handle)
    }

    fn start_runtime(&self, assembly_path: &Path) -> Result<RuntimeContext> {
        let assembly_dir = assembly_path.parent().ok_or_else(|| {
            Error::Other(format!("{} has no parent directory", assembly_path.display()))
        })?;
        let resolver_path = self.config.resolver_library_path(assembly_dir);
        let params = RuntimeParams {
            runtime_config: runtime_config_path(assembly_path),
            host_path: assembly_dir.to_path_buf(),
            dotnet_root: self.config.dotnet_root_for(assembly_dir),
        };

        tracing::debug!("Bootstrapping hostfxr from {}", resolver_path.display());
        let api = self.resolver.load(&resolver_path).inspect_err(|e| {
            tracing::error!("Failed to load hostfxr: {}", e);
        })?;
        RuntimeContext::initialize(api, &params)
    }

    /// The plugin registered under `handle`.
    pub fn plugin(&self, handle: Handle) -> Result<Arc<PluginInstance>> {
        self.state().registry.get(handle).cloned()
    }

    /// Resolve and call `type_name::method_name` in the plugin `handle`,
    /// returning the managed status. Never changes the registry.
    pub fn invoke(&self, handle: Handle, type_name: &str, method_name: &str) -> Result<i32> {
        let plugin = self.plugin(handle)?;
        plugin.invoke(type_name, method_name)
    }

    pub fn invoke_desc(&self, handle: Handle, desc: &MethodDescriptor) -> Result<i32> {
        self.invoke(handle, &desc.type_name, &desc.method_name)
    }

    /// Close the runtime. Returns whether there was an open runtime to close.
    ///
    /// Plugins stay registered; invoking them afterwards fails with
    /// [`Error::RuntimeClosed`].
    pub fn close(&self, handle: Handle) -> bool {
        let state = self.state();
        if !state.registry.contains(handle) {
            tracing::warn!("Closing runtime through unregistered handle {}", handle);
        }
        match &state.runtime {
            Some(runtime) => runtime.close(),
            None => false,
        }
    }

    /// Number of registered plugins.
    pub fn plugin_count(&self) -> usize {
        self.state().registry.len()
    }

    pub fn is_initialized(&self) -> bool {
        self.state().runtime.is_some()
    }
}
