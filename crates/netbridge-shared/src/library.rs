//! Dynamic library loading and symbol resolution.

use std::path::{Path, PathBuf};

use libloading::Library;

use crate::{Error, Result};

/// Platform file name prefix for shared libraries.
#[cfg(any(windows, target_os = "cygwin"))]
pub const LIBRARY_PREFIX: &str = "";
#[cfg(not(any(windows, target_os = "cygwin")))]
pub const LIBRARY_PREFIX: &str = "lib";

/// Platform file name suffix for shared libraries.
#[cfg(any(windows, target_os = "cygwin"))]
pub const LIBRARY_SUFFIX: &str = ".dll";
#[cfg(target_os = "macos")]
pub const LIBRARY_SUFFIX: &str = ".dylib";
#[cfg(not(any(windows, target_os = "cygwin", target_os = "macos")))]
pub const LIBRARY_SUFFIX: &str = ".so";

/// File name of a shared library called `stem` on this platform
/// (`hostfxr` -> `libhostfxr.so`, `hostfxr.dll`, ...).
///
/// Cygwin processes load Windows-native runtimes, so they use Windows naming.
pub fn library_file_name(stem: &str) -> String {
    format!("{LIBRARY_PREFIX}{stem}{LIBRARY_SUFFIX}")
}

/// A loaded shared library. Symbols resolved from it stay valid for as long as
/// this value lives.
#[derive(Debug)]
pub struct DynamicLibrary {
    path: PathBuf,
    inner: Library,
}

impl DynamicLibrary {
    /// Load the library at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        tracing::debug!("Loading library {}", path.display());

        // SAFETY: running a library's initializers is inherently unsafe; the
        // caller picked the path.
        let inner = unsafe { Library::new(path) }.map_err(|source| Error::LibraryLoad {
            path: path.to_path_buf(),
            source,
        })?;

        Ok(Self {
            path: path.to_path_buf(),
            inner,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Resolve an exported symbol to a value of type `T`, usually a function
    /// pointer.
    ///
    /// # Safety
    ///
    /// `T` must match the actual type of the exported symbol, and the returned
    /// value must not be used after this library is dropped.
    pub unsafe fn resolve<T: Copy>(&self, symbol: &str) -> Result<T> {
        let sym = unsafe { self.inner.get::<T>(symbol.as_bytes()) }.map_err(|source| {
            Error::SymbolNotFound {
                symbol: symbol.to_string(),
                path: self.path.clone(),
                source,
            }
        })?;
        Ok(*sym)
    }
}
