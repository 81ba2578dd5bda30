//! The hosted runtime: one per process, created by the first registration.

use std::ffi::c_void;
use std::path::PathBuf;
use std::ptr;
use std::sync::atomic::{AtomicBool, Ordering};

use netbridge_shared::{Error, NativeString, Result, to_native_path};

use crate::hostfxr::{
    CloseFn, HostfxrApi, HostfxrDelegateType, HostfxrHandle, HostfxrInitializeParameters,
    LoadAssemblyAndGetFunctionPointerFn,
};

/// Inputs for `hostfxr_initialize_for_runtime_config`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeParams {
    pub runtime_config: PathBuf,
    pub host_path: PathBuf,
    pub dotnet_root: PathBuf,
}

/// An initialized hosting runtime and the delegate used to bind entry points.
#[derive(Debug)]
pub struct RuntimeContext {
    handle: HostfxrHandle,
    load_assembly: LoadAssemblyAndGetFunctionPointerFn,
    close_fn: CloseFn,
    closed: AtomicBool,
    // Keeps hostfxr loaded for as long as the pointers above are reachable.
    _api: HostfxrApi,
}

// SAFETY: the handle is an opaque token owned by hostfxr, which accepts it from
// any thread. The `closed` flag is the only mutable state.
unsafe impl Send for RuntimeContext {}
unsafe impl Sync for RuntimeContext {}

impl RuntimeContext {
    /// Initialize the runtime described by `params` and fetch the
    /// load-assembly delegate. No retry; on failure nothing stays open.
    pub fn initialize(api: HostfxrApi, params: &RuntimeParams) -> Result<Self> {
        let runtime_config = NativeString::from_path(&to_native_path(&params.runtime_config)?)?;
        let host_path = NativeString::from_path(&to_native_path(&params.host_path)?)?;
        let dotnet_root = NativeString::from_path(&to_native_path(&params.dotnet_root)?)?;

        let init_params = HostfxrInitializeParameters {
            size: std::mem::size_of::<HostfxrInitializeParameters>(),
            host_path: host_path.as_ptr(),
            dotnet_root: dotnet_root.as_ptr(),
        };

        tracing::debug!(
            "Initializing runtime: config={:?} host={:?} root={:?}",
            runtime_config,
            host_path,
            dotnet_root
        );

        let mut handle: HostfxrHandle = ptr::null_mut();
        let rc = unsafe {
            (api.initialize_for_runtime_config)(runtime_config.as_ptr(), &init_params, &mut handle)
        };
        if rc < 0 || handle.is_null() {
            tracing::error!("Failed to initialize dotnet core (status 0x{:08X})", rc);
            if !handle.is_null() {
                unsafe { (api.close)(handle) };
            }
            return Err(Error::RuntimeInit { code: rc });
        }
        if rc != 0 {
            tracing::debug!("Runtime initialized with status 0x{:08X}", rc);
        }

        let mut delegate: *mut c_void = ptr::null_mut();
        let rc = unsafe {
            (api.get_runtime_delegate)(
                handle,
                HostfxrDelegateType::LoadAssemblyAndGetFunctionPointer,
                &mut delegate,
            )
        };
        if rc < 0 || delegate.is_null() {
            tracing::error!(
                "Failed to acquire load_assembly_and_get_function_pointer (status 0x{:08X})",
                rc
            );
            unsafe { (api.close)(handle) };
            return Err(Error::DelegateUnavailable { code: rc });
        }

        // SAFETY: hostfxr hands out exactly this signature for
        // hdt_load_assembly_and_get_function_pointer.
        let load_assembly = unsafe {
            std::mem::transmute::<*mut c_void, LoadAssemblyAndGetFunctionPointerFn>(delegate)
        };

        Ok(Self {
            handle,
            load_assembly,
            close_fn: api.close,
            closed: AtomicBool::new(false),
            _api: api,
        })
    }

    /// The load-assembly delegate, unless the runtime has been closed.
    pub fn load_assembly_fn(&self) -> Result<LoadAssemblyAndGetFunctionPointerFn> {
        if self.is_closed() {
            return Err(Error::RuntimeClosed);
        }
        Ok(self.load_assembly)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Close the runtime. Returns `false` if it was already closed.
    ///
    /// Must not race with an invocation running through this runtime.
    pub fn close(&self) -> bool {
        if self.closed.swap(true, Ordering::AcqRel) {
            return false;
        }
        let rc = unsafe { (self.close_fn)(self.handle) };
        if rc < 0 {
            tracing::warn!("hostfxr_close returned 0x{:08X}", rc);
        }
        true
    }
}
