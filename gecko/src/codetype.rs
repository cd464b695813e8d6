/// Opcode families, keyed by the first byte of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeType {
    /// 00/01/10/11: 8-bit fill.
    Write8,
    /// 02/03/12/13: 16-bit fill.
    Write16,
    /// 04/05/14/15
    Write32,
    /// 06/07/16/17: byte string, padded to a whole line.
    WriteString,
    /// 08/09/18/19: serial write, one extra line.
    SerialWrite,
    /// 20..=3F
    If,
    /// C0..=C5 and D0..=D5: `operand` lines of code follow.
    Assembly,
    /// C6/C7: branch from the target address to `operand`.
    InsertBranch,
    EndIf,
    Terminator,
    /// F2..=F5: line count in the upper half of the operand.
    ChecksumAssembly,
    /// F6: line count in the full operand.
    Search,
    Other(u8),
}

impl CodeType {
    pub fn from_opcode(opcode: u8) -> Self {
        match opcode {
            0x00 | 0x01 | 0x10 | 0x11 => CodeType::Write8,
            0x02 | 0x03 | 0x12 | 0x13 => CodeType::Write16,
            0x04 | 0x05 | 0x14 | 0x15 => CodeType::Write32,
            0x06 | 0x07 | 0x16 | 0x17 => CodeType::WriteString,
            0x08 | 0x09 | 0x18 | 0x19 => CodeType::SerialWrite,
            0x20..=0x3F => CodeType::If,
            0xC0..=0xC5 | 0xD0..=0xD5 => CodeType::Assembly,
            0xC6 | 0xC7 => CodeType::InsertBranch,
            0xE0 => CodeType::EndIf,
            0xF0 => CodeType::Terminator,
            0xF2..=0xF5 => CodeType::ChecksumAssembly,
            0xF6 => CodeType::Search,
            other => CodeType::Other(other),
        }
    }

    /// Total record length in bytes, including the first line.
    ///
    /// Widened to `u64` since the operand is untrusted and `8 + 8 * n` must not wrap.
    pub fn record_length(self, operand: u32) -> u64 {
        let operand = u64::from(operand);
        match self {
            CodeType::WriteString => 8 + operand.next_multiple_of(8),
            CodeType::SerialWrite => 16,
            CodeType::Assembly | CodeType::Search => 8 + 8 * operand,
            CodeType::ChecksumAssembly => 8 + 8 * (operand >> 16),
            _ => 8,
        }
    }
}

/// Address a record targets, always inside `[0x80000000, 0x82000000)`.
pub fn target_address(word0: u32) -> u32 {
    0x8000_0000 | (word0 & 0x01FF_FFFF)
}
