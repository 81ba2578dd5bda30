//! Registered plugins and their managed entry points.

use std::ffi::c_void;
use std::fmt;
use std::path::{Path, PathBuf};
use std::ptr;
use std::str::FromStr;
use std::sync::Arc;

use netbridge_shared::{Error, NativeString, Result, to_native_path};

use crate::hostfxr::ComponentEntryPointFn;
use crate::runtime::RuntimeContext;

/// `"{type},{assembly}"`, the form the load delegate needs to find a type in a
/// specific assembly.
pub fn build_type_reference(type_name: &str, assembly_name: &str) -> String {
    format!("{},{}", type_name, assembly_name)
}

/// A `Namespace.Type:Method` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDescriptor {
    pub type_name: String,
    pub method_name: String,
}

impl FromStr for MethodDescriptor {
    type Err = Error;

    fn from_str(desc: &str) -> Result<Self> {
        match desc.split_once(':') {
            Some((type_name, method_name)) if !type_name.is_empty() && !method_name.is_empty() => {
                Ok(Self {
                    type_name: type_name.to_string(),
                    method_name: method_name.to_string(),
                })
            }
            _ => Err(Error::InvalidMethodDescriptor(desc.to_string())),
        }
    }
}

impl fmt::Display for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.type_name, self.method_name)
    }
}

/// A resolved managed method with the `ComponentEntryPoint` signature
/// (`int Method(IntPtr args, int sizeBytes)`).
///
/// The load delegate only ever hands out this signature, because the bridge
/// always passes a null delegate type name.
#[derive(Debug, Clone, Copy)]
pub struct EntryPoint {
    func: ComponentEntryPointFn,
}

impl EntryPoint {
    /// # Safety
    ///
    /// `ptr` must be null or a `component_entry_point_fn` returned by the load
    /// delegate.
    pub unsafe fn from_raw(ptr: *mut c_void) -> Option<Self> {
        if ptr.is_null() {
            return None;
        }
        let func = unsafe { std::mem::transmute::<*mut c_void, ComponentEntryPointFn>(ptr) };
        Some(Self { func })
    }

    /// Call the managed method with `args` as its argument block. An empty
    /// block is passed as `(NULL, 0)`.
    pub fn call(&self, args: &mut [u8]) -> Result<i32> {
        let size = i32::try_from(args.len())
            .map_err(|_| Error::Other(format!("argument block too large: {} bytes", args.len())))?;
        let ptr = if args.is_empty() {
            ptr::null_mut()
        } else {
            args.as_mut_ptr().cast::<c_void>()
        };
        Ok(unsafe { (self.func)(ptr, size) })
    }
}

/// One managed assembly registered with the bridge.
#[derive(Debug)]
pub struct PluginInstance {
    assembly_path: PathBuf,
    name: String,
    runtime: Arc<RuntimeContext>,
}

impl PluginInstance {
    pub fn new(assembly_path: PathBuf, name: String, runtime: Arc<RuntimeContext>) -> Self {
        Self {
            assembly_path,
            name,
            runtime,
        }
    }

    pub fn assembly_path(&self) -> &Path {
        &self.assembly_path
    }

    /// Assembly base name, e.g. `HILib` for `HILib.dll`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Resolve `type_name::method_name` in this assembly.
    pub fn resolve(&self, type_name: &str, method_name: &str) -> Result<EntryPoint> {
        let load_assembly = self.runtime.load_assembly_fn()?;

        let assembly_path = NativeString::from_path(&to_native_path(&self.assembly_path)?)?;
        let type_ref = NativeString::new(&build_type_reference(type_name, &self.name))?;
        let method = NativeString::new(method_name)?;

        tracing::debug!(
            "Loading {:?}, then resolving {} in {:?}",
            assembly_path,
            method_name,
            type_ref
        );

        let mut entry: *mut c_void = ptr::null_mut();
        let rc = unsafe {
            load_assembly(
                assembly_path.as_ptr(),
                type_ref.as_ptr(),
                method.as_ptr(),
                ptr::null(),
                ptr::null_mut(),
                &mut entry,
            )
        };

        let not_found = || Error::EntryPointNotFound {
            type_name: type_name.to_string(),
            method: method_name.to_string(),
            code: rc,
        };
        if rc < 0 {
            tracing::debug!("Failed to locate '{}:{}' (0x{:08X})", type_name, method_name, rc);
            return Err(not_found());
        }
        unsafe { EntryPoint::from_raw(entry) }.ok_or_else(not_found)
    }

    /// Resolve and call an entry point with no arguments, returning the
    /// managed method's status.
    ///
    /// Must not race with closing the runtime.
    pub fn invoke(&self, type_name: &str, method_name: &str) -> Result<i32> {
        let entry = self.resolve(type_name, method_name)?;
        let status = entry.call(&mut [])?;
        tracing::debug!("{}:{} returned {}", type_name, method_name, status);
        Ok(status)
    }

    pub fn invoke_desc(&self, desc: &MethodDescriptor) -> Result<i32> {
        self.invoke(&desc.type_name, &desc.method_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::RuntimeParams;
    use crate::testing;
    use serial_test::serial;
    use std::sync::atomic::Ordering;

    fn plugin(path: &str) -> PluginInstance {
        let params = RuntimeParams {
            runtime_config: PathBuf::from("/srv/plugins/plugin.runtimeconfig.json"),
            host_path: PathBuf::from("/srv/plugins"),
            dotnet_root: PathBuf::from("/srv/plugins"),
        };
        let runtime = Arc::new(RuntimeContext::initialize(testing::api(), &params).unwrap());
        let path = PathBuf::from(path);
        let name = path.file_stem().unwrap().to_string_lossy().into_owned();
        PluginInstance::new(path, name, runtime)
    }

    #[test]
    fn type_reference_is_type_comma_assembly() {
        assert_eq!(build_type_reference("Foo.Bar", "plugin"), "Foo.Bar,plugin");
        assert_eq!(
            build_type_reference("HILib.HiClass", "HILib"),
            "HILib.HiClass,HILib"
        );
    }

    #[test]
    fn method_descriptor_splits_at_first_colon() {
        let desc: MethodDescriptor = "HILib.HiClass:Entry1".parse().unwrap();
        assert_eq!(desc.type_name, "HILib.HiClass");
        assert_eq!(desc.method_name, "Entry1");
        assert_eq!(desc.to_string(), "HILib.HiClass:Entry1");

        let desc: MethodDescriptor = "A.B:C:D".parse().unwrap();
        assert_eq!(desc.method_name, "C:D");
    }

    #[test]
    fn malformed_method_descriptors_are_rejected() {
        for bad in ["HILib.HiClass", ":Entry1", "HILib.HiClass:", ""] {
            assert!(
                matches!(
                    bad.parse::<MethodDescriptor>(),
                    Err(Error::InvalidMethodDescriptor(_))
                ),
                "{bad:?} should not parse"
            );
        }
    }

    #[test]
    fn null_entry_point_is_none() {
        assert!(unsafe { EntryPoint::from_raw(ptr::null_mut()) }.is_none());
    }

    #[test]
    #[serial]
    fn invoke_resolves_and_calls_with_no_arguments() {
        testing::reset();
        let plugin = plugin("/srv/plugins/plugin.dll");

        let status = plugin.invoke("Good.Type", "GoodMethod").unwrap();
        assert_eq!(status, testing::ENTRY_STATUS);
        assert_eq!(testing::ENTRY_CALLS.load(Ordering::SeqCst), 1);
        assert_eq!(
            testing::last(&testing::LAST_TYPE_NAME).as_deref(),
            Some("Good.Type,plugin")
        );
        assert_eq!(
            testing::last(&testing::LAST_ASSEMBLY).as_deref(),
            Some("/srv/plugins/plugin.dll")
        );
    }

    #[test]
    #[serial]
    fn unknown_method_is_entry_point_not_found() {
        testing::reset();
        let plugin = plugin("/srv/plugins/plugin.dll");

        match plugin.invoke("Missing.Type", "NoMethod") {
            Err(Error::EntryPointNotFound {
                type_name,
                method,
                code,
            }) => {
                assert_eq!(type_name, "Missing.Type");
                assert_eq!(method, "NoMethod");
                assert_eq!(code, testing::TYPE_LOAD_ERROR);
            }
            other => panic!("expected EntryPointNotFound, got {other:?}"),
        }
        assert_eq!(testing::ENTRY_CALLS.load(Ordering::SeqCst), 0);
    }

    #[test]
    #[serial]
    fn entry_point_receives_argument_block() {
        testing::reset();
        let plugin = plugin("/srv/plugins/plugin.dll");

        let entry = plugin.resolve("Good.Type", "GoodMethod").unwrap();
        let mut args = [1u8, 2, 3, 4, 5];
        // The fake echoes the block size when it gets one.
        assert_eq!(entry.call(&mut args).unwrap(), 5);
    }

    #[test]
    #[serial]
    fn invoke_desc_uses_both_halves() {
        testing::reset();
        let plugin = plugin("/srv/plugins/plugin.dll");
        let desc: MethodDescriptor = "Good.Type:GoodMethod".parse().unwrap();

        assert_eq!(plugin.invoke_desc(&desc).unwrap(), testing::ENTRY_STATUS);
    }
}
