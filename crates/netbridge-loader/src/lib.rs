//! Shared library that hosts the .NET runtime and runs plugin entry points.
//!
//! Native hosts load this library, call `clrInit` once per plugin assembly,
//! `runMethod` to call into managed code, and `clrDeInit` to shut the runtime
//! down. The same functionality is available to Rust callers through
//! [`Bridge`].

pub mod bridge;
pub mod config;
pub mod hostfxr;
pub mod logging;
pub mod plugin;
pub mod registry;
pub mod runtime;

#[cfg(test)]
mod testing;

pub use bridge::Bridge;
pub use config::BridgeConfig;
pub use plugin::{EntryPoint, MethodDescriptor, PluginInstance, build_type_reference};

use std::ffi::{c_char, c_int};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::Path;
use std::sync::OnceLock;

use netbridge_shared::{Error, Handle, InvokeStatus, RawHandle, Result, decode_narrow_ptr};

static BRIDGE: OnceLock<Bridge> = OnceLock::new();

/// The process-wide bridge behind the exported functions.
fn bridge() -> &'static Bridge {
    BRIDGE.get_or_init(|| Bridge::new(BridgeConfig::from_env()))
}

/// Run `f`, logging errors and panics instead of letting them cross the ABI.
fn guard<T>(export: &str, fallback: T, f: impl FnOnce() -> Result<T>) -> T {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(value)) => value,
        Ok(Err(e)) => {
            tracing::error!("{}: {}", export, e);
            fallback
        }
        Err(payload) => {
            tracing::error!("{}: panicked: {}", export, panic_message(payload.as_ref()));
            fallback
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        msg
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg
    } else {
        "non-string panic payload"
    }
}

fn invoke_status(err: &Error) -> InvokeStatus {
    match err {
        Error::NotRegistered(_) => InvokeStatus::NotRegistered,
        Error::RuntimeClosed => InvokeStatus::RuntimeClosed,
        Error::InvalidString(_) | Error::InvalidMethodDescriptor(_) => {
            InvokeStatus::InvalidArgument
        }
        _ => InvokeStatus::EntryPointNotFound,
    }
}

/// Collapse an invocation result into a `runMethod` status. The managed
/// method's own return value is not reported through the ABI.
fn report_invoke(export: &str, result: Result<i32>) -> c_int {
    match result {
        Ok(managed) => {
            tracing::debug!("{}: managed code returned {}", export, managed);
            InvokeStatus::Ok.code()
        }
        Err(e) => {
            tracing::error!("{}: {}", export, e);
            invoke_status(&e).code()
        }
    }
}

/// Register a plugin assembly, starting the runtime on first use.
///
/// A relative `assembly_path` is resolved against `plugin_dir` when one is
/// given. Returns the plugin handle, or 0 on failure.
///
/// # Safety
///
/// `assembly_path` must be a valid nul-terminated string; `plugin_dir` must be
/// null or one.
#[unsafe(no_mangle)]
#[allow(non_snake_case)]
pub unsafe extern "C" fn clrInit(
    assembly_path: *const c_char,
    plugin_dir: *const c_char,
    enable_debug: bool,
) -> RawHandle {
    if enable_debug {
        logging::enable_debug_output();
    }

    guard("clrInit", Handle::NULL.into_raw(), || {
        let assembly_path = unsafe { decode_narrow_ptr(assembly_path) }?;
        let plugin_dir = if plugin_dir.is_null() {
            None
        } else {
            Some(unsafe { decode_narrow_ptr(plugin_dir) }?)
        };
        tracing::debug!("clrInit({}, {:?})", assembly_path, plugin_dir);

        let path = registry::resolve_assembly_path(
            Path::new(&assembly_path),
            plugin_dir.as_deref().map(Path::new),
        );
        bridge().register(&path).map(Handle::into_raw)
    })
}

/// Close the runtime. Returns whether one was open.
///
/// Must not be called while a `runMethod` call is in progress.
#[unsafe(no_mangle)]
#[allow(non_snake_case)]
pub extern "C" fn clrDeInit(handle: RawHandle) -> bool {
    guard("clrDeInit", false, || {
        Ok(bridge().close(Handle::from_raw(handle)))
    })
}

/// Call `type_name::method_name` in the plugin `handle`.
///
/// Returns 0 on success, or a negative [`InvokeStatus`].
///
/// # Safety
///
/// Both strings must be null or valid nul-terminated strings.
#[unsafe(no_mangle)]
#[allow(non_snake_case)]
pub unsafe extern "C" fn runMethod(
    handle: RawHandle,
    type_name: *const c_char,
    method_name: *const c_char,
) -> c_int {
    guard("runMethod", InvokeStatus::EntryPointNotFound.code(), || {
        let type_name = unsafe { decode_narrow_ptr(type_name) };
        let method_name = unsafe { decode_narrow_ptr(method_name) };
        let result = type_name.and_then(|type_name| {
            let method_name = method_name?;
            bridge().invoke(Handle::from_raw(handle), &type_name, &method_name)
        });
        Ok(report_invoke("runMethod", result))
    })
}

/// Call the method named by a `Namespace.Type:Method` descriptor.
///
/// # Safety
///
/// `method_desc` must be null or a valid nul-terminated string.
#[unsafe(no_mangle)]
#[allow(non_snake_case)]
pub unsafe extern "C" fn runMethodDesc(handle: RawHandle, method_desc: *const c_char) -> c_int {
    guard("runMethodDesc", InvokeStatus::EntryPointNotFound.code(), || {
        let result = unsafe { decode_narrow_ptr(method_desc) }
            .and_then(|desc| desc.parse::<MethodDescriptor>())
            .and_then(|desc| bridge().invoke_desc(Handle::from_raw(handle), &desc));
        Ok(report_invoke("runMethodDesc", result))
    })
}
