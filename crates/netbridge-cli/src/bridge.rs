//! The loader library as seen from a native host.

use std::ffi::{CString, c_char};
use std::path::Path;

use netbridge_shared::abi::{
    CLR_DEINIT_SYMBOL, CLR_INIT_SYMBOL, ClrDeInitFn, ClrInitFn, RUN_METHOD_DESC_SYMBOL,
    RUN_METHOD_SYMBOL, RunMethodDescFn, RunMethodFn,
};
use netbridge_shared::{DynamicLibrary, Error, Handle, InvokeStatus, Result, to_native_path};

fn c_string(what: &str, s: &str) -> Result<CString> {
    CString::new(s)
        .map_err(|_| Error::InvalidString(format!("{} contains a NUL byte: {:?}", what, s)))
}

fn path_c_string(what: &str, path: &Path) -> Result<CString> {
    let s = path.to_str().ok_or_else(|| {
        Error::InvalidString(format!("{} is not valid UTF-8: {}", what, path.display()))
    })?;
    c_string(what, s)
}

/// The loader's exports, resolved once.
pub struct LoadedBridge {
    init: ClrInitFn,
    deinit: ClrDeInitFn,
    run_method: RunMethodFn,
    run_method_desc: RunMethodDescFn,
    library: DynamicLibrary,
}

impl LoadedBridge {
    pub fn load(loader_path: &Path) -> Result<Self> {
        let native = to_native_path(loader_path)?;
        let library = DynamicLibrary::open(&native)?;

        let init = unsafe { library.resolve::<ClrInitFn>(CLR_INIT_SYMBOL) }?;
        let deinit = unsafe { library.resolve::<ClrDeInitFn>(CLR_DEINIT_SYMBOL) }?;
        let run_method = unsafe { library.resolve::<RunMethodFn>(RUN_METHOD_SYMBOL) }?;
        let run_method_desc =
            unsafe { library.resolve::<RunMethodDescFn>(RUN_METHOD_DESC_SYMBOL) }?;

        Ok(Self {
            init,
            deinit,
            run_method,
            run_method_desc,
            library,
        })
    }

    pub fn path(&self) -> &Path {
        self.library.path()
    }

    /// Register `assembly_path`, resolving it against `plugin_dir` if relative.
    pub fn init(
        &self,
        assembly_path: &Path,
        plugin_dir: Option<&Path>,
        debug: bool,
    ) -> Result<Handle> {
        let assembly = path_c_string("assembly path", assembly_path)?;
        let dir = plugin_dir
            .map(|dir| path_c_string("plugin directory", dir))
            .transpose()?;
        let dir_ptr: *const c_char = dir.as_ref().map_or(std::ptr::null(), |d| d.as_ptr());

        let handle = Handle::from_raw(unsafe { (self.init)(assembly.as_ptr(), dir_ptr, debug) });
        if handle.is_null() {
            return Err(Error::Other(format!(
                "Failed to register {}",
                assembly_path.display()
            )));
        }
        Ok(handle)
    }

    pub fn run_method(
        &self,
        handle: Handle,
        type_name: &str,
        method_name: &str,
    ) -> Result<InvokeStatus> {
        let type_name = c_string("type name", type_name)?;
        let method_name = c_string("method name", method_name)?;
        let status = unsafe {
            (self.run_method)(handle.into_raw(), type_name.as_ptr(), method_name.as_ptr())
        };
        InvokeStatus::try_from(status)
    }

    /// Run the method named by a `Namespace.Type:Method` descriptor.
    pub fn run_method_desc(&self, handle: Handle, desc: &str) -> Result<InvokeStatus> {
        let desc = c_string("method descriptor", desc)?;
        let status = unsafe { (self.run_method_desc)(handle.into_raw(), desc.as_ptr()) };
        InvokeStatus::try_from(status)
    }

    pub fn deinit(&self, handle: Handle) -> bool {
        unsafe { (self.deinit)(handle.into_raw()) }
    }
}
