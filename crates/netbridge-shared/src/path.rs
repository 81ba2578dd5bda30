//! POSIX to native path translation.
//!
//! A process running under Cygwin sees POSIX paths (`/cygdrive/c/...`, `/home/...`)
//! while the Windows runtime it hosts only understands native ones. Everywhere
//! else the process and the OS share a path namespace and translation is the
//! identity.

use std::path::{Path, PathBuf};

use crate::Result;

/// Translate `path` into the form native OS calls expect.
#[cfg(not(target_os = "cygwin"))]
pub fn to_native_path(path: &Path) -> Result<PathBuf> {
    Ok(path.to_path_buf())
}

/// Translate `path` into the form native OS calls expect.
///
/// Uses `cygwin_conv_path`, so the mount table is honoured. Errors reported by
/// the translator are returned, never passed through.
#[cfg(target_os = "cygwin")]
pub fn to_native_path(path: &Path) -> Result<PathBuf> {
    cygwin::posix_to_win(path)
}

#[cfg(target_os = "cygwin")]
mod cygwin {
    use std::ffi::{CStr, CString, c_uint, c_void};
    use std::os::unix::ffi::OsStrExt;
    use std::path::{Path, PathBuf};

    use crate::{Error, Result};

    const CCP_POSIX_TO_WIN_A: c_uint = 0;
    const CCP_ABSOLUTE: c_uint = 0;

    unsafe extern "C" {
        fn cygwin_conv_path(
            what: c_uint,
            from: *const c_void,
            to: *mut c_void,
            size: usize,
        ) -> isize;
    }

    pub(super) fn posix_to_win(path: &Path) -> Result<PathBuf> {
        let translation_error = |source: std::io::Error| Error::PathTranslation {
            path: path.to_path_buf(),
            source,
        };

        let from = CString::new(path.as_os_str().as_bytes()).map_err(|e| {
            translation_error(std::io::Error::new(std::io::ErrorKind::InvalidInput, e))
        })?;
        let what = CCP_POSIX_TO_WIN_A | CCP_ABSOLUTE;

        // A zero size asks for the required buffer length.
        let needed =
            unsafe { cygwin_conv_path(what, from.as_ptr().cast(), std::ptr::null_mut(), 0) };
        if needed < 0 {
            return Err(translation_error(std::io::Error::last_os_error()));
        }

        let mut buf = vec![0u8; needed as usize];
        let rc = unsafe {
            cygwin_conv_path(what, from.as_ptr().cast(), buf.as_mut_ptr().cast(), buf.len())
        };
        if rc != 0 {
            return Err(translation_error(std::io::Error::last_os_error()));
        }

        let native = CStr::from_bytes_until_nul(&buf).map_err(|e| {
            translation_error(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
        })?;
        Ok(PathBuf::from(native.to_string_lossy().into_owned()))
    }
}
