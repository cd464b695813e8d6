use std::{io, path::PathBuf};

use dol::DolError;
use gecko::{CodeListError, GeckoError};
use thiserror::Error;

use crate::hook::HookType;

#[derive(Debug, Error)]
pub enum HookError {
    #[error("no {0} hook signature found in any text section")]
    NotFound(HookType),
    #[error("hook address {address:#010x} holds {word:#010x}, expected blr (0x4e800020)")]
    NotBlr { address: u32, word: u32 },
    #[error("hook address {address:#010x} is a conditional branch")]
    ConditionalBranch { address: u32 },
    #[error(transparent)]
    Dol(#[from] DolError),
}

#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("loader blob has no {0} token")]
    MissingToken(&'static str),
    #[error("code handler is {len:#x} bytes, too short to hold its code list pointer")]
    HandlerTooShort { len: usize },
    #[error("code handler has no 00DEDEDE variable slot")]
    MissingVariableSlot,
    #[error("hook instruction {word:#010x} cannot be moved into the code handler")]
    UnrelocatableHook { word: u32 },
    #[error("init address {0:#010x} is already used by a section of the DOL")]
    InitAddressClobber(u32),
    #[error("{what} address {address:#010x} is outside of 0x80000000..0x81800000")]
    AddressOutOfRange { what: &'static str, address: u32 },
    #[error("there are no unused text or data sections left")]
    NoFreeSections,
    #[error(transparent)]
    Dol(#[from] DolError),
}

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("failed to access {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid DOL")]
    Dol(#[from] DolError),
    #[error("invalid code list")]
    CodeList(#[from] CodeListError),
    #[error("failed to process code list")]
    Gecko(#[from] GeckoError),
    #[error("failed to place code handler hook")]
    Hook(#[from] HookError),
    #[error("failed to assemble loader")]
    Loader(#[from] LoaderError),
}

impl BuildError {
    /// `1` for I/O failures, `2` for everything that failed validation.
    pub fn exit_code(&self) -> u8 {
        match self {
            BuildError::Io { .. } => 1,
            BuildError::CodeList(err) if err.is_io() => 1,
            _ => 2,
        }
    }
}
