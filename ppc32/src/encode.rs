//! Encoders for the handful of instruction words the patcher writes.

/// `blr`
pub const BLR: u32 = 0x4E80_0020;

const BRANCH_OPCODE: u32 = 0x4800_0000;
const BRANCH_DISPLACEMENT_MASK: u32 = 0x03FF_FFFC;

/// Encodes `b`/`bl` from `from` to `to`.
///
/// The displacement is truncated to 26 bits, so targets further than
/// +/-32 MiB wrap. Every address in the console's main memory is in range.
pub fn branch(from: u32, to: u32, link: bool) -> u32 {
    (to.wrapping_sub(from) & BRANCH_DISPLACEMENT_MASK) | BRANCH_OPCODE | u32::from(link)
}

/// Upper half of `addr` for a `lis`/`addi` style pair (`addr@ha`).
///
/// The lower half is sign-extended by the CPU, so the upper half is bumped
/// by one whenever bit 15 of the lower half is set.
pub fn ha(addr: u32) -> u16 {
    let upper = (addr >> 16) as u16;
    if addr & 0x8000 != 0 {
        upper.wrapping_add(1)
    } else {
        upper
    }
}

/// Lower half of `addr` (`addr@l`).
pub fn lo(addr: u32) -> u16 {
    addr as u16
}

/// Upper half of `addr` for a `lis`/`ori` pair (`addr@h`), no adjustment.
pub fn hi(addr: u32) -> u16 {
    (addr >> 16) as u16
}

/// Reassembles an address from a `@ha`/`@l` pair the way the CPU would.
pub fn join_ha(upper: u16, lower: u16) -> u32 {
    (u32::from(upper) << 16).wrapping_add_signed(i32::from(lower as i16))
}
