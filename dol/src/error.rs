use thiserror::Error;

use crate::SectionKind;

#[derive(Debug, Error)]
pub enum DolError {
    #[error("malformed DOL header: {0}")]
    MalformedHeader(String),
    #[error("address {0:#010x} is not inside any section")]
    UnmappedAddress(u32),
    #[error("access of {len:#x} bytes at {address:#010x} crosses the section end at {end:#010x}")]
    SectionOverflow { address: u32, len: usize, end: u64 },
    #[error("all {max} {kind} section slots are in use")]
    SectionCountFull { kind: SectionKind, max: usize },
    #[error("new section at {address:#010x} (size {size:#x}) overlaps an existing section")]
    SectionOverlap { address: u32, size: usize },
    #[error("no free {len:#x} byte gap at or after {from:#010x}")]
    NoFreeGap { from: u32, len: u32 },
    #[error("instruction {word:#010x} at {address:#010x} is not a branch")]
    NotABranch { address: u32, word: u32 },
}
