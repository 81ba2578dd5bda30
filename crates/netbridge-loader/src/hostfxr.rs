//! hostfxr hosting interfaces for .NET Core / .NET 5+.
//!
//! These mirror `hostfxr.h` and `coreclr_delegates.h`, which ship with the .NET
//! SDK as C headers only, so we define them manually.

use std::ffi::c_void;
use std::path::Path;

use netbridge_shared::{DynamicLibrary, NativeChar, Result};

/// Opaque context handle returned by `hostfxr_initialize_for_runtime_config`.
pub type HostfxrHandle = *mut c_void;

/// `hostfxr_initialize_parameters`
#[repr(C)]
#[derive(Debug)]
pub struct HostfxrInitializeParameters {
    pub size: usize,
    pub host_path: *const NativeChar,
    pub dotnet_root: *const NativeChar,
}

/// `hostfxr_delegate_type`
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(dead_code)]
pub enum HostfxrDelegateType {
    ComActivation = 0,
    LoadInMemoryAssembly = 1,
    WinrtActivation = 2,
    ComRegister = 3,
    ComUnregister = 4,
    LoadAssemblyAndGetFunctionPointer = 5,
    GetFunctionPointer = 6,
}

// Function names exported by hostfxr
pub const INITIALIZE_FOR_RUNTIME_CONFIG_SYMBOL: &str = "hostfxr_initialize_for_runtime_config";
pub const GET_RUNTIME_DELEGATE_SYMBOL: &str = "hostfxr_get_runtime_delegate";
pub const CLOSE_SYMBOL: &str = "hostfxr_close";

/// `hostfxr_initialize_for_runtime_config_fn`
pub type InitializeForRuntimeConfigFn = unsafe extern "C" fn(
    runtime_config_path: *const NativeChar,
    parameters: *const HostfxrInitializeParameters,
    host_context_handle: *mut HostfxrHandle,
) -> i32;

/// `hostfxr_get_runtime_delegate_fn`
pub type GetRuntimeDelegateFn = unsafe extern "C" fn(
    host_context_handle: HostfxrHandle,
    delegate_type: HostfxrDelegateType,
    delegate: *mut *mut c_void,
) -> i32;

/// `hostfxr_close_fn`
pub type CloseFn = unsafe extern "C" fn(host_context_handle: HostfxrHandle) -> i32;

/// `load_assembly_and_get_function_pointer_fn`
///
/// A null `delegate_type_name` selects [`ComponentEntryPointFn`].
pub type LoadAssemblyAndGetFunctionPointerFn = unsafe extern "system" fn(
    assembly_path: *const NativeChar,
    type_name: *const NativeChar,
    method_name: *const NativeChar,
    delegate_type_name: *const NativeChar,
    reserved: *mut c_void,
    delegate: *mut *mut c_void,
) -> i32;

/// `component_entry_point_fn`, i.e. `int Method(IntPtr args, int sizeBytes)`
pub type ComponentEntryPointFn =
    unsafe extern "system" fn(args: *mut c_void, size_bytes: i32) -> i32;

/// The three hostfxr entry points the bridge needs.
#[derive(Debug)]
pub struct HostfxrApi {
    pub initialize_for_runtime_config: InitializeForRuntimeConfigFn,
    pub get_runtime_delegate: GetRuntimeDelegateFn,
    pub close: CloseFn,
    // Keeps the function pointers above mapped.
    _library: Option<DynamicLibrary>,
}

impl HostfxrApi {
    /// Build an API table from function pointers that are not backed by a
    /// library we own (statically linked or in-process implementations).
    pub fn from_fns(
        initialize_for_runtime_config: InitializeForRuntimeConfigFn,
        get_runtime_delegate: GetRuntimeDelegateFn,
        close: CloseFn,
    ) -> Self {
        Self {
            initialize_for_runtime_config,
            get_runtime_delegate,
            close,
            _library: None,
        }
    }
}

/// Load hostfxr from `resolver_path` and resolve all three entry points.
///
/// Either every symbol resolves or the whole bootstrap fails.
pub fn bootstrap(resolver_path: &Path) -> Result<HostfxrApi> {
    let library = DynamicLibrary::open(resolver_path)?;

    // SAFETY: the signatures match hostfxr.h.
    let (initialize_for_runtime_config, get_runtime_delegate, close) = unsafe {
        (
            library.resolve::<InitializeForRuntimeConfigFn>(INITIALIZE_FOR_RUNTIME_CONFIG_SYMBOL)?,
            library.resolve::<GetRuntimeDelegateFn>(GET_RUNTIME_DELEGATE_SYMBOL)?,
            library.resolve::<CloseFn>(CLOSE_SYMBOL)?,
        )
    };

    tracing::debug!("Resolved hostfxr entry points from {}", library.path().display());

    Ok(HostfxrApi {
        initialize_for_runtime_config,
        get_runtime_delegate,
        close,
        _library: Some(library),
    })
}

/// Source of [`HostfxrApi`] tables. The bridge bootstraps through this so the
/// resolver can be swapped out.
pub trait ResolverLoader: Send + Sync {
    fn load(&self, resolver_path: &Path) -> Result<HostfxrApi>;
}

/// Loads hostfxr from disk via [`bootstrap`].
#[derive(Debug, Default, Clone, Copy)]
pub struct LibraryResolver;

impl ResolverLoader for LibraryResolver {
    fn load(&self, resolver_path: &Path) -> Result<HostfxrApi> {
        bootstrap(resolver_path)
    }
}
