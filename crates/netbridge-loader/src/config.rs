//! Bridge configuration.

use std::path::{Path, PathBuf};

use netbridge_shared::library_file_name;

/// Overrides the resolver library location (full path to hostfxr).
pub const HOSTFXR_PATH_VAR: &str = "NETBRIDGE_HOSTFXR_PATH";
/// Overrides the dotnet root passed to hostfxr.
pub const DOTNET_ROOT_VAR: &str = "NETBRIDGE_DOTNET_ROOT";

const RESOLVER_STEM: &str = "hostfxr";
const RUNTIME_CONFIG_EXTENSION: &str = "runtimeconfig.json";

/// Where the bridge looks for hostfxr and what it tells hostfxr about the host.
///
/// By default everything is relative to the first assembly registered: hostfxr
/// is expected next to it and that directory doubles as host path and dotnet
/// root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    /// File name of the resolver library inside the assembly directory.
    pub resolver_file_name: String,
    /// Full resolver path; wins over `resolver_file_name`.
    pub resolver_path: Option<PathBuf>,
    /// Runtime root; defaults to the assembly directory.
    pub dotnet_root: Option<PathBuf>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            resolver_file_name: library_file_name(RESOLVER_STEM),
            resolver_path: None,
            dotnet_root: None,
        }
    }
}

impl BridgeConfig {
    /// Defaults, overridden by `NETBRIDGE_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults, overridden by whatever `lookup` returns. Empty values count as
    /// unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str| lookup(key).filter(|v| !v.is_empty()).map(PathBuf::from);
        Self {
            resolver_path: var(HOSTFXR_PATH_VAR),
            dotnet_root: var(DOTNET_ROOT_VAR),
            ..Self::default()
        }
    }

    /// hostfxr location for an assembly living in `assembly_dir`.
    pub fn resolver_library_path(&self, assembly_dir: &Path) -> PathBuf {
        match &self.resolver_path {
            Some(path) => path.clone(),
            None => assembly_dir.join(&self.resolver_file_name),
        }
    }

    pub fn dotnet_root_for(&self, assembly_dir: &Path) -> PathBuf {
        self.dotnet_root
            .clone()
            .unwrap_or_else(|| assembly_dir.to_path_buf())
    }
}

/// `plugins/HILib.dll` -> `plugins/HILib.runtimeconfig.json`
pub fn runtime_config_path(assembly_path: &Path) -> PathBuf {
    assembly_path.with_extension(RUNTIME_CONFIG_EXTENSION)
}
