//! Error types for netbridge.

use std::path::PathBuf;

use thiserror::Error;

use crate::abi::Handle;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Failed to load library {}: {source}", path.display())]
    LibraryLoad {
        path: PathBuf,
        #[source]
        source: libloading::Error,
    },

    #[error("Symbol `{symbol}` not found in {}: {source}", path.display())]
    SymbolNotFound {
        symbol: String,
        path: PathBuf,
        #[source]
        source: libloading::Error,
    },

    #[error("Runtime failed to initialize (status 0x{code:08X})")]
    RuntimeInit { code: i32 },

    #[error("Delegate acquisition failed (status 0x{code:08X})")]
    DelegateUnavailable { code: i32 },

    #[error("Entry point {type_name}::{method} not found (status 0x{code:08X})")]
    EntryPointNotFound {
        type_name: String,
        method: String,
        code: i32,
    },

    #[error("No plugin registered for handle {0}")]
    NotRegistered(Handle),

    #[error("Handle {handle} for `{name}` collides with registered plugin `{existing}`")]
    HandleCollision {
        handle: Handle,
        name: String,
        existing: String,
    },

    #[error("Hosting runtime has been closed")]
    RuntimeClosed,

    #[error("Invalid string: {0}")]
    InvalidString(String),

    #[error("Failed to translate path {}: {source}", path.display())]
    PathTranslation {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unknown status code {0}")]
    UnknownStatus(i32),

    #[error("Invalid method descriptor `{0}`, expected `Type:Method`")]
    InvalidMethodDescriptor(String),

    #[cfg(windows)]
    #[error("Windows API error: {0}")]
    WindowsError(#[from] windows::core::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
