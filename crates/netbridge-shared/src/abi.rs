//! The C ABI exported by the loader library.
//!
//! Both sides of the shared-library boundary use these definitions: the loader
//! implements the exports, front ends resolve them by name.

use std::ffi::{c_char, c_int};
use std::fmt;

use crate::{Error, Result};

/// Raw handle value as it crosses the ABI (`size_t`).
pub type RawHandle = usize;

/// Opaque identifier of a registered plugin.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle(RawHandle);

impl Handle {
    /// Reserved "no handle" value, returned on registration failure.
    pub const NULL: Handle = Handle(0);

    pub const fn from_raw(raw: RawHandle) -> Self {
        Self(raw)
    }

    pub const fn into_raw(self) -> RawHandle {
        self.0
    }

    pub const fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:X}", self.0)
    }
}

/// Export names
pub const CLR_INIT_SYMBOL: &str = "clrInit";
pub const CLR_DEINIT_SYMBOL: &str = "clrDeInit";
pub const RUN_METHOD_SYMBOL: &str = "runMethod";
pub const RUN_METHOD_DESC_SYMBOL: &str = "runMethodDesc";

/// `clrInit(assemblyPath, pluginDirectoryHint, enableDebug) -> handle`
pub type ClrInitFn = unsafe extern "C" fn(
    assembly_path: *const c_char,
    plugin_dir: *const c_char,
    enable_debug: bool,
) -> RawHandle;

/// `clrDeInit(handle) -> closed`
pub type ClrDeInitFn = unsafe extern "C" fn(handle: RawHandle) -> bool;

/// `runMethod(handle, typeName, methodName) -> status`
pub type RunMethodFn = unsafe extern "C" fn(
    handle: RawHandle,
    type_name: *const c_char,
    method_name: *const c_char,
) -> c_int;

/// `runMethodDesc(handle, "Type:Method") -> status`
pub type RunMethodDescFn =
    unsafe extern "C" fn(handle: RawHandle, method_desc: *const c_char) -> c_int;

/// Status codes returned by `runMethod` / `runMethodDesc`.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvokeStatus {
    /// Entry point resolved and called
    Ok = 0,
    /// Type or method not found in the assembly
    EntryPointNotFound = -1,
    /// Handle was never returned by `clrInit`
    NotRegistered = -2,
    /// `clrDeInit` already closed the runtime
    RuntimeClosed = -3,
    /// Null or undecodable string argument
    InvalidArgument = -4,
}

impl InvokeStatus {
    pub const fn code(self) -> c_int {
        self as c_int
    }
}

impl TryFrom<c_int> for InvokeStatus {
    type Error = Error;

    fn try_from(v: c_int) -> Result<Self> {
        match v {
            0 => Ok(InvokeStatus::Ok),
            -1 => Ok(InvokeStatus::EntryPointNotFound),
            -2 => Ok(InvokeStatus::NotRegistered),
            -3 => Ok(InvokeStatus::RuntimeClosed),
            -4 => Ok(InvokeStatus::InvalidArgument),
            code => Err(Error::UnknownStatus(code)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_handle_is_reserved() {
        assert!(Handle::NULL.is_null());
        assert_eq!(Handle::NULL.into_raw(), 0);
        assert!(!Handle::from_raw(7).is_null());
    }

    #[test]
    fn status_codes_round_trip_through_c_int() {
        for status in [
            InvokeStatus::Ok,
            InvokeStatus::EntryPointNotFound,
            InvokeStatus::NotRegistered,
            InvokeStatus::RuntimeClosed,
            InvokeStatus::InvalidArgument,
        ] {
            assert_eq!(InvokeStatus::try_from(status.code()).unwrap(), status);
        }
        assert_eq!(InvokeStatus::EntryPointNotFound.code(), -1);
    }

    #[test]
    fn unknown_status_codes_keep_the_raw_value() {
        for code in [1, 42, -5, i32::MIN] {
            match InvokeStatus::try_from(code) {
                Err(Error::UnknownStatus(raw)) => assert_eq!(raw, code),
                other => panic!("{code} should be unknown, got {other:?}"),
            }
        }
    }
}
