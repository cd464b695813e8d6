use std::{fmt, str::FromStr};

use ppc32::{
    Instruction,
    decoder::decode_word,
    encode,
    instruction::Immediate,
};
use tracing::debug;

use crate::LoaderError;

/// Offset of the handler's entry point from its base.
pub const ENTRY_OFFSET: u32 = 0xA8;

// `lis`/`ori` pair loading the code list address; the immediates sit in the low
// halves of the two words.
const CODE_LIST_UPPER: usize = 0xFA;
const CODE_LIST_LOWER: usize = 0xFE;

const VARIABLE_SLOT: [u8; 4] = [0x00, 0xDE, 0xDE, 0xDE];
const MINI_LIMIT: usize = 0x900;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerVariant {
    Mini,
    Full,
}

impl FromStr for HandlerVariant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "MINI" => Ok(HandlerVariant::Mini),
            "FULL" => Ok(HandlerVariant::Full),
            _ => Err(format!("invalid code handler: {s}")),
        }
    }
}

impl fmt::Display for HandlerVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandlerVariant::Mini => f.write_str("MINI"),
            HandlerVariant::Full => f.write_str("FULL"),
        }
    }
}

/// The code handler binary, with its load address split off.
#[derive(Debug, Clone)]
pub struct CodeHandler {
    base: u32,
    payload: Vec<u8>,
}

impl CodeHandler {
    /// Parses a handler blob: a big-endian base address followed by the payload.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, LoaderError> {
        let Some((base, payload)) = bytes.split_first_chunk::<4>() else {
            return Err(LoaderError::HandlerTooShort { len: bytes.len() });
        };
        if payload.len() < CODE_LIST_LOWER + 2 {
            return Err(LoaderError::HandlerTooShort { len: payload.len() });
        }

        Ok(Self {
            base: u32::from_be_bytes(*base),
            payload: payload.to_vec(),
        })
    }

    pub fn base(&self) -> u32 {
        self.base
    }

    /// Where the hook branches to.
    pub fn entry(&self) -> u32 {
        self.base.wrapping_add(ENTRY_OFFSET)
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    pub fn variant(&self) -> HandlerVariant {
        if self.payload.len() < MINI_LIMIT {
            HandlerVariant::Mini
        } else {
            HandlerVariant::Full
        }
    }

    fn u32_at(&self, offset: usize) -> u32 {
        u32::from_be_bytes([
            self.payload[offset],
            self.payload[offset + 1],
            self.payload[offset + 2],
            self.payload[offset + 3],
        ])
    }

    fn set_u16(&mut self, offset: usize, value: u16) {
        self.payload[offset..offset + 2].copy_from_slice(&value.to_be_bytes());
    }

    fn set_u32(&mut self, offset: usize, value: u32) {
        self.payload[offset..offset + 4].copy_from_slice(&value.to_be_bytes());
    }

    /// The address loaded by the `lis`/`ori` pair, `None` if the words there are
    /// something else.
    pub fn code_list_pointer(&self) -> Option<u32> {
        let upper = decode_word(self.u32_at(CODE_LIST_UPPER - 2)).ok()?;
        let lower = decode_word(self.u32_at(CODE_LIST_LOWER - 2)).ok()?;
        match (upper, lower) {
            (
                Instruction::Addis {
                    add: None,
                    imm: Immediate(upper),
                    ..
                },
                Instruction::Ori {
                    imm: Immediate(lower),
                    ..
                },
            ) => Some(u32::from(upper as u16) << 16 | u32::from(lower)),
            _ => None,
        }
    }

    pub fn set_code_list_pointer(&mut self, address: u32) {
        self.set_u16(CODE_LIST_UPPER, encode::hi(address));
        self.set_u16(CODE_LIST_LOWER, encode::lo(address));
    }

    fn variable_slot(&self) -> Option<usize> {
        self.payload
            .chunks_exact(4)
            .position(|word| word == VARIABLE_SLOT)
            .map(|index| index * 4)
    }

    /// Moves the instruction replaced at `hook` into the handler and makes the
    /// handler return to the instruction after it.
    ///
    /// `blr` is copied as is, an unconditional branch is re-targeted from its new
    /// address. Anything else cannot run from inside the handler.
    pub fn install_trampoline(&mut self, hook: u32, original: u32) -> Result<(), LoaderError> {
        let offset = self.variable_slot().ok_or(LoaderError::MissingVariableSlot)?;
        if offset + 8 > self.payload.len() {
            return Err(LoaderError::MissingVariableSlot);
        }
        let slot = self.base.wrapping_add(offset as u32);

        let moved = if original == encode::BLR {
            original
        } else {
            match decode_word(original) {
                Ok(ins @ Instruction::Branch { link, .. }) => {
                    let target = ins
                        .branch_target(hook)
                        .ok_or(LoaderError::UnrelocatableHook { word: original })?;
                    encode::branch(slot, target, link)
                }
                _ => return Err(LoaderError::UnrelocatableHook { word: original }),
            }
        };

        self.set_u32(offset, moved);
        self.set_u32(
            offset + 4,
            encode::branch(slot + 4, hook.wrapping_add(4), false),
        );
        debug!("trampoline at {slot:#010x} returns to {:#010x}", hook.wrapping_add(4));
        Ok(())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.payload
    }
}
