//! In-process stand-in for hostfxr and a managed assembly.
//!
//! The functions here have the exact hostfxr / delegate signatures, so tests
//! drive the same FFI calls the real runtime would receive. Call counters are
//! process-wide; tests that assert on them run under `#[serial]`.

use std::ffi::c_void;
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use netbridge_shared::encoding::native_ptr_to_string;
use netbridge_shared::{Error, NativeChar, Result};

use crate::hostfxr::{
    ComponentEntryPointFn, HostfxrApi, HostfxrDelegateType, HostfxrHandle,
    HostfxrInitializeParameters, LoadAssemblyAndGetFunctionPointerFn, ResolverLoader,
};

pub static INIT_CALLS: AtomicUsize = AtomicUsize::new(0);
pub static DELEGATE_CALLS: AtomicUsize = AtomicUsize::new(0);
pub static CLOSE_CALLS: AtomicUsize = AtomicUsize::new(0);
pub static ENTRY_CALLS: AtomicUsize = AtomicUsize::new(0);

pub static LAST_RUNTIME_CONFIG: Mutex<Option<String>> = Mutex::new(None);
pub static LAST_DOTNET_ROOT: Mutex<Option<String>> = Mutex::new(None);
pub static LAST_ASSEMBLY: Mutex<Option<String>> = Mutex::new(None);
pub static LAST_TYPE_NAME: Mutex<Option<String>> = Mutex::new(None);

/// Status the fake entry point returns.
pub const ENTRY_STATUS: i32 = 42;
/// `COR_E_TYPELOAD`, what the real delegate reports for unknown types.
pub const TYPE_LOAD_ERROR: i32 = 0x80131522u32 as i32;
/// `InvalidConfigFile`
pub const INVALID_CONFIG: i32 = 0x80008093u32 as i32;

static RUNTIME_TOKEN: u8 = 0;

pub fn reset() {
    for counter in [&INIT_CALLS, &DELEGATE_CALLS, &CLOSE_CALLS, &ENTRY_CALLS] {
        counter.store(0, Ordering::SeqCst);
    }
    for slot in [
        &LAST_RUNTIME_CONFIG,
        &LAST_DOTNET_ROOT,
        &LAST_ASSEMBLY,
        &LAST_TYPE_NAME,
    ] {
        *slot.lock().unwrap() = None;
    }
}

pub fn last(slot: &Mutex<Option<String>>) -> Option<String> {
    slot.lock().unwrap().clone()
}

fn fake_handle() -> HostfxrHandle {
    &RUNTIME_TOKEN as *const u8 as HostfxrHandle
}

unsafe fn read(ptr: *const NativeChar) -> Option<String> {
    unsafe { native_ptr_to_string(ptr) }
}

/// Accepts any runtime config whose path does not contain "broken".
unsafe extern "C" fn fake_initialize(
    runtime_config_path: *const NativeChar,
    parameters: *const HostfxrInitializeParameters,
    host_context_handle: *mut HostfxrHandle,
) -> i32 {
    INIT_CALLS.fetch_add(1, Ordering::SeqCst);

    let config = unsafe { read(runtime_config_path) }.unwrap_or_default();
    let params = unsafe { &*parameters };
    assert_eq!(params.size, std::mem::size_of::<HostfxrInitializeParameters>());
    *LAST_DOTNET_ROOT.lock().unwrap() = unsafe { read(params.dotnet_root) };
    *LAST_RUNTIME_CONFIG.lock().unwrap() = Some(config.clone());

    if config.contains("broken") {
        return INVALID_CONFIG;
    }
    unsafe { *host_context_handle = fake_handle() };
    0
}

unsafe extern "C" fn fake_get_delegate(
    host_context_handle: HostfxrHandle,
    delegate_type: HostfxrDelegateType,
    delegate: *mut *mut c_void,
) -> i32 {
    DELEGATE_CALLS.fetch_add(1, Ordering::SeqCst);
    assert_eq!(host_context_handle, fake_handle());

    if delegate_type != HostfxrDelegateType::LoadAssemblyAndGetFunctionPointer {
        return -1;
    }
    let load_assembly: LoadAssemblyAndGetFunctionPointerFn = fake_load_assembly;
    unsafe { *delegate = load_assembly as *mut c_void };
    0
}

unsafe extern "C" fn fake_get_delegate_unavailable(
    _host_context_handle: HostfxrHandle,
    _delegate_type: HostfxrDelegateType,
    _delegate: *mut *mut c_void,
) -> i32 {
    DELEGATE_CALLS.fetch_add(1, Ordering::SeqCst);
    0x80008081u32 as i32
}

unsafe extern "C" fn fake_close(host_context_handle: HostfxrHandle) -> i32 {
    CLOSE_CALLS.fetch_add(1, Ordering::SeqCst);
    assert_eq!(host_context_handle, fake_handle());
    0
}

/// Knows exactly one entry point: `Good.Type::GoodMethod`, in any assembly.
unsafe extern "system" fn fake_load_assembly(
    assembly_path: *const NativeChar,
    type_name: *const NativeChar,
    method_name: *const NativeChar,
    delegate_type_name: *const NativeChar,
    reserved: *mut c_void,
    delegate: *mut *mut c_void,
) -> i32 {
    assert!(delegate_type_name.is_null());
    assert!(reserved.is_null());

    let type_name = unsafe { read(type_name) }.unwrap_or_default();
    let method_name = unsafe { read(method_name) }.unwrap_or_default();
    *LAST_ASSEMBLY.lock().unwrap() = unsafe { read(assembly_path) };
    *LAST_TYPE_NAME.lock().unwrap() = Some(type_name.clone());

    if type_name.starts_with("Good.Type,") && method_name == "GoodMethod" {
        let entry: ComponentEntryPointFn = fake_entry_point;
        unsafe { *delegate = entry as *mut c_void };
        0
    } else {
        unsafe { *delegate = std::ptr::null_mut() };
        TYPE_LOAD_ERROR
    }
}

unsafe extern "system" fn fake_entry_point(args: *mut c_void, size_bytes: i32) -> i32 {
    ENTRY_CALLS.fetch_add(1, Ordering::SeqCst);
    if args.is_null() {
        ENTRY_STATUS
    } else {
        size_bytes
    }
}

/// A working hostfxr.
pub fn api() -> HostfxrApi {
    HostfxrApi::from_fns(fake_initialize, fake_get_delegate, fake_close)
}

/// A hostfxr whose runtime never hands out the load delegate.
pub fn api_without_delegate() -> HostfxrApi {
    HostfxrApi::from_fns(fake_initialize, fake_get_delegate_unavailable, fake_close)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FakeKind {
    Working,
    NoDelegate,
    /// Behaves like a hostfxr file that is not there.
    Missing,
}

/// [`ResolverLoader`] handing out the fake API, counting bootstraps.
#[derive(Debug)]
pub struct FakeResolver {
    kind: FakeKind,
    loads: AtomicUsize,
    last_path: Mutex<Option<std::path::PathBuf>>,
}

impl FakeResolver {
    pub fn new(kind: FakeKind) -> Self {
        Self {
            kind,
            loads: AtomicUsize::new(0),
            last_path: Mutex::new(None),
        }
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn last_path(&self) -> Option<std::path::PathBuf> {
        self.last_path.lock().unwrap().clone()
    }
}

impl ResolverLoader for FakeResolver {
    fn load(&self, resolver_path: &Path) -> Result<HostfxrApi> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        *self.last_path.lock().unwrap() = Some(resolver_path.to_path_buf());
        match self.kind {
            FakeKind::Working => Ok(api()),
            FakeKind::NoDelegate => Ok(api_without_delegate()),
            FakeKind::Missing => Err(Error::Other(format!(
                "no resolver at {}",
                resolver_path.display()
            ))),
        }
    }
}
