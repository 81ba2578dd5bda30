//! String re-encoding between the narrow C ABI and the hosting API.
//!
//! Callers hand the bridge narrow `char*` strings. The hosting API takes
//! `char_t` strings, which are UTF-16 on Windows (and on Cygwin, where the
//! runtime being hosted is the Windows one) and narrow everywhere else.

use std::ffi::CStr;
use std::path::Path;

use crate::{Error, Result};

/// `char_t` of the hosting API.
#[cfg(any(windows, target_os = "cygwin"))]
pub type NativeChar = u16;
#[cfg(not(any(windows, target_os = "cygwin")))]
pub type NativeChar = std::ffi::c_char;

/// Nul-terminated string in the hosting API's representation.
#[derive(Clone, PartialEq, Eq)]
pub struct NativeString {
    buf: Vec<NativeChar>,
}

impl NativeString {
    /// Encode `s`. Fails if `s` contains an interior NUL.
    pub fn new(s: &str) -> Result<Self> {
        if s.contains('\0') {
            return Err(Error::InvalidString(format!(
                "interior NUL in {:?}",
                s.replace('\0', "\\0")
            )));
        }
        Ok(Self {
            buf: encode(s),
        })
    }

    /// Encode a path. Non UTF-8 paths are rejected rather than mangled.
    pub fn from_path(path: &Path) -> Result<Self> {
        let s = path.to_str().ok_or_else(|| {
            Error::InvalidString(format!("path is not valid UTF-8: {}", path.display()))
        })?;
        Self::new(s)
    }

    pub fn as_ptr(&self) -> *const NativeChar {
        self.buf.as_ptr()
    }

    /// Length in code units, excluding the terminator.
    pub fn len(&self) -> usize {
        self.buf.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn to_string_lossy(&self) -> String {
        decode(&self.buf[..self.len()])
    }
}

impl std::fmt::Debug for NativeString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.to_string_lossy())
    }
}

#[cfg(any(windows, target_os = "cygwin"))]
fn encode(s: &str) -> Vec<NativeChar> {
    s.encode_utf16().chain(std::iter::once(0)).collect()
}

#[cfg(not(any(windows, target_os = "cygwin")))]
fn encode(s: &str) -> Vec<NativeChar> {
    s.bytes()
        .map(|b| b as NativeChar)
        .chain(std::iter::once(0))
        .collect()
}

#[cfg(any(windows, target_os = "cygwin"))]
fn decode(units: &[NativeChar]) -> String {
    String::from_utf16_lossy(units)
}

#[cfg(not(any(windows, target_os = "cygwin")))]
fn decode(units: &[NativeChar]) -> String {
    let bytes: Vec<u8> = units.iter().map(|&c| c as u8).collect();
    String::from_utf8_lossy(&bytes).into_owned()
}

/// Read a nul-terminated `char_t` string owned by someone else.
///
/// # Safety
///
/// `ptr` must be null or point to a nul-terminated `char_t` string.
pub unsafe fn native_ptr_to_string(ptr: *const NativeChar) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    let len = (0..).take_while(|&i| unsafe { *ptr.add(i) } != 0).count();
    let units = unsafe { std::slice::from_raw_parts(ptr, len) };
    Some(decode(units))
}

/// Decode a narrow string received over the C ABI.
///
/// On Windows narrow strings are in the active ANSI code page; elsewhere they
/// are UTF-8.
#[cfg(windows)]
pub fn decode_narrow(s: &CStr) -> Result<String> {
    use windows::Win32::Globalization::{CP_ACP, MB_ERR_INVALID_CHARS, MultiByteToWideChar};

    let bytes = s.to_bytes();
    if bytes.is_empty() {
        return Ok(String::new());
    }

    let len = unsafe { MultiByteToWideChar(CP_ACP, MB_ERR_INVALID_CHARS, bytes, None) };
    if len <= 0 {
        return Err(windows::core::Error::from_win32().into());
    }

    let mut wide = vec![0u16; len as usize];
    let written =
        unsafe { MultiByteToWideChar(CP_ACP, MB_ERR_INVALID_CHARS, bytes, Some(&mut wide)) };
    if written <= 0 {
        return Err(windows::core::Error::from_win32().into());
    }
    wide.truncate(written as usize);

    String::from_utf16(&wide).map_err(|e| Error::InvalidString(e.to_string()))
}

#[cfg(not(windows))]
pub fn decode_narrow(s: &CStr) -> Result<String> {
    s.to_str()
        .map(str::to_owned)
        .map_err(|e| Error::InvalidString(format!("{}: {:?}", e, s)))
}

/// Decode a possibly-null narrow string received over the C ABI.
///
/// # Safety
///
/// `ptr` must be null or point to a nul-terminated string.
pub unsafe fn decode_narrow_ptr(ptr: *const std::ffi::c_char) -> Result<String> {
    if ptr.is_null() {
        return Err(Error::InvalidString("null string pointer".into()));
    }
    decode_narrow(unsafe { CStr::from_ptr(ptr) })
}
