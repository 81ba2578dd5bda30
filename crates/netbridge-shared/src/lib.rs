//! Shared types for netbridge
//!
//! Everything both sides of the loader's shared-library boundary need:
//!
//! - [`abi`] - handle type, export names and signatures, status codes
//! - [`encoding`] - narrow <-> `char_t` string conversion
//! - [`path`] - POSIX to native path translation
//! - [`library`] - dynamic library loading and symbol resolution

pub mod abi;
pub mod encoding;
pub mod error;
pub mod library;
pub mod path;

pub use abi::{Handle, InvokeStatus, RawHandle};
pub use encoding::{NativeChar, NativeString, decode_narrow, decode_narrow_ptr};
pub use error::{Error, Result};
pub use library::{DynamicLibrary, library_file_name};
pub use path::to_native_path;
