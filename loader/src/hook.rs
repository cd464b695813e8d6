use std::{fmt, str::FromStr};

use dol::{Dol, DolError};
use ppc32::encode::BLR;
use tracing::debug;

use crate::HookError;

/// Which interrupt-driven routine the handler is called from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HookType {
    #[default]
    Vi,
    Gx,
    Pad,
}

impl FromStr for HookType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "VI" => Ok(HookType::Vi),
            "GX" => Ok(HookType::Gx),
            "PAD" => Ok(HookType::Pad),
            _ => Err(format!("invalid hook type: {s}")),
        }
    }
}

impl fmt::Display for HookType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HookType::Vi => f.write_str("VI"),
            HookType::Gx => f.write_str("GX"),
            HookType::Pad => f.write_str("PAD"),
        }
    }
}

pub const GCN_VI: [u8; 32] = [
    0x7C, 0x03, 0x00, 0x34, 0x38, 0x83, 0x00, 0x20, 0x54, 0x85, 0x08, 0x3C, 0x7C, 0x7F, 0x2A, 0x14,
    0xA0, 0x03, 0x00, 0x00, 0x7C, 0x7D, 0x2A, 0x14, 0x20, 0xA4, 0x00, 0x3F, 0xB0, 0x03, 0x00, 0x00,
];
pub const WII_VI: [u8; 16] = [
    0x7C, 0xE3, 0x3B, 0x78, 0x38, 0x87, 0x00, 0x34, 0x38, 0xA7, 0x00, 0x38, 0x38, 0xC7, 0x00, 0x4C,
];
pub const GCN_GX: [u8; 16] = [
    0x38, 0x00, 0x00, 0x61, 0x3C, 0xA0, 0xCC, 0x01, 0x3C, 0x80, 0x45, 0x00, 0x98, 0x05, 0x80, 0x00,
];
pub const WII_GX: [u8; 16] = [
    0x3C, 0xA0, 0xCC, 0x01, 0x38, 0x00, 0x00, 0x61, 0x3C, 0x80, 0x45, 0x00, 0x98, 0x05, 0x80, 0x00,
];
pub const GCN_PAD: [u8; 16] = [
    0x3A, 0xB5, 0x00, 0x01, 0x2C, 0x15, 0x00, 0x04, 0x3B, 0x18, 0x00, 0x0C, 0x3B, 0xFF, 0x00, 0x0C,
];
pub const WII_PAD: [u8; 16] = [
    0x3A, 0xB5, 0x00, 0x01, 0x3A, 0x73, 0x00, 0x0C, 0x2C, 0x15, 0x00, 0x04, 0x3B, 0x18, 0x00, 0x0C,
];

impl HookType {
    /// GameCube signature first, then Wii.
    pub fn signatures(self) -> [&'static [u8]; 2] {
        match self {
            HookType::Vi => [&GCN_VI, &WII_VI],
            HookType::Gx => [&GCN_GX, &WII_GX],
            HookType::Pad => [&GCN_PAD, &WII_PAD],
        }
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Finds the `blr` that ends the routine matching `hook_type`.
///
/// Text sections are searched in slot order; within a section the GameCube
/// signature wins over the Wii one.
pub fn locate(dol: &Dol, hook_type: HookType) -> Result<u32, HookError> {
    for section in dol.text_sections() {
        let bytes = dol.section_bytes(section);
        let Some(start) = hook_type
            .signatures()
            .into_iter()
            .find_map(|signature| find(bytes, signature))
        else {
            continue;
        };

        let blr = bytes[start..]
            .chunks_exact(4)
            .position(|word| word == BLR.to_be_bytes());
        if let Some(index) = blr {
            let address = section.load_address + (start + index * 4) as u32;
            debug!("found {hook_type} hook in text{} at {address:#010x}", section.slot);
            return Ok(address);
        }
    }

    Err(HookError::NotFound(hook_type))
}

/// Checks a user supplied hook address and returns the word found there.
pub fn verify_manual(dol: &mut Dol, address: u32) -> Result<u32, HookError> {
    dol.seek_to_address(address)?;
    let word = dol.read_u32()?;
    if word == BLR {
        return Ok(word);
    }

    match dol.extract_branch_target(address) {
        Ok(branch) if branch.conditional => Err(HookError::ConditionalBranch { address }),
        Ok(_) => Ok(word),
        Err(DolError::NotABranch { word, .. }) => Err(HookError::NotBlr { address, word }),
        Err(err) => Err(err.into()),
    }
}
