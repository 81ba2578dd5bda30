//! Handle derivation and the plugin table.
//!
//! A plugin's handle is the 64-bit FNV-1a hash of its assembly base name, so
//! registering `a/HILib.dll` and `b/HILib.dll` yields the same handle: the
//! registry treats them as the same plugin. FNV-1a mixes every byte, so names
//! differing in a single character still land far apart. Two *different* names
//! hashing to the same value is reported as [`Error::HandleCollision`] instead
//! of silently aliasing.

use std::collections::HashMap;
use std::hash::Hasher;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use fnv::FnvHasher;
use netbridge_shared::{Error, Handle, RawHandle, Result};

use crate::plugin::PluginInstance;

/// Assembly base name: file name without directory or extension.
pub fn plugin_name(assembly_path: &Path) -> Result<String> {
    let stem = assembly_path
        .file_stem()
        .ok_or_else(|| {
            Error::InvalidString(format!(
                "no file name in assembly path {}",
                assembly_path.display()
            ))
        })?
        .to_str()
        .ok_or_else(|| {
            Error::InvalidString(format!(
                "assembly name is not valid UTF-8: {}",
                assembly_path.display()
            ))
        })?;
    Ok(stem.to_string())
}

/// Handle for a plugin name. Never [`Handle::NULL`].
pub fn derive_handle(name: &str) -> Handle {
    let mut hasher = FnvHasher::default();
    hasher.write(name.as_bytes());
    match hasher.finish() as RawHandle {
        0 => Handle::from_raw(1),
        h => Handle::from_raw(h),
    }
}

/// Resolve a relative assembly path against the caller's plugin directory.
pub fn resolve_assembly_path(assembly_path: &Path, plugin_dir: Option<&Path>) -> PathBuf {
    match plugin_dir {
        Some(dir) if assembly_path.is_relative() && !dir.as_os_str().is_empty() => {
            dir.join(assembly_path)
        }
        _ => assembly_path.to_path_buf(),
    }
}

/// Handle -> plugin. Entries are never replaced or removed.
#[derive(Debug, Default)]
pub struct PluginRegistry {
    plugins: HashMap<Handle, Arc<PluginInstance>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    pub fn contains(&self, handle: Handle) -> bool {
        self.plugins.contains_key(&handle)
    }

    pub fn get(&self, handle: Handle) -> Result<&Arc<PluginInstance>> {
        self.plugins
            .get(&handle)
            .ok_or(Error::NotRegistered(handle))
    }

    /// The handle `name` is registered under, if it is.
    ///
    /// Fails if the handle belongs to a different name.
    pub fn find(&self, name: &str) -> Result<Option<Handle>> {
        let handle = derive_handle(name);
        match self.plugins.get(&handle) {
            None => Ok(None),
            Some(existing) if existing.name() == name => Ok(Some(handle)),
            Some(existing) => Err(Error::HandleCollision {
                handle,
                name: name.to_string(),
                existing: existing.name().to_string(),
            }),
        }
    }

    /// Insert `plugin` under `handle`. An occupied handle is never overwritten.
    pub fn insert(&mut self, handle: Handle, plugin: PluginInstance) -> Result<()> {
        if let Some(existing) = self.plugins.get(&handle) {
            return Err(Error::HandleCollision {
                handle,
                name: plugin.name().to_string(),
                existing: existing.name().to_string(),
            });
        }
        self.plugins.insert(handle, Arc::new(plugin));
        Ok(())
    }

    pub fn handles(&self) -> impl Iterator<Item = Handle> + '_ {
        self.plugins.keys().copied()
    }
}
