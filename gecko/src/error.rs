use std::{io, path::PathBuf};

use dol::DolError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GeckoError {
    #[error("code list does not start with the 00D0C0DE 00D0C0DE magic")]
    MissingMagic,
    #[error("record at offset {offset:#x} needs {needed:#x} bytes but only {available:#x} remain")]
    TruncatedRecord {
        offset: usize,
        needed: u64,
        available: usize,
    },
    #[error("code list has no F0000000 00000000 terminator")]
    MissingTerminator,
    #[error("serial write at {address:#010x} has size type {size}, expected 0, 1 or 2")]
    InvalidSerialSize { address: u32, size: u8 },
    #[error(transparent)]
    Dol(#[from] DolError),
}

#[derive(Debug, Error)]
pub enum CodeListError {
    #[error("failed to read {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{} is not a .txt or .gct file", .0.display())]
    UnsupportedFileType(PathBuf),
    #[error("{} is not a valid .gct file: {reason}", .path.display())]
    MalformedGct { path: PathBuf, reason: String },
    #[error("no gecko codes found in {}", .0.display())]
    EmptyCodeList(PathBuf),
    #[error(transparent)]
    Stream(#[from] GeckoError),
}

impl CodeListError {
    pub fn is_io(&self) -> bool {
        matches!(self, CodeListError::Io { .. })
    }
}
