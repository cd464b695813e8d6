use std::{fmt, str::FromStr};

use dol::{Dol, DolError, SectionInfo, SectionKind};
use tracing::debug;

use crate::LoaderError;

/// End of the low memory area a LEGACY handler and its codes must fit below.
pub const LEGACY_LIMIT: u32 = 0x8000_3000;

/// Addressable main memory on the console.
const MEMORY_START: u32 = 0x8000_0000;
const MEMORY_END: u32 = 0x8180_0000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Placement {
    /// LEGACY if everything fits below [`LEGACY_LIMIT`], ARENA otherwise.
    #[default]
    Auto,
    /// Handler and codes at the handler's own base, no loader.
    Legacy,
    /// Loader, handler and codes in a free gap, started before the game.
    Arena,
}

impl FromStr for Placement {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "AUTO" => Ok(Placement::Auto),
            "LEGACY" => Ok(Placement::Legacy),
            "ARENA" => Ok(Placement::Arena),
            _ => Err(format!("invalid code placement: {s}")),
        }
    }
}

impl fmt::Display for Placement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Placement::Auto => f.write_str("AUTO"),
            Placement::Legacy => f.write_str("LEGACY"),
            Placement::Arena => f.write_str("ARENA"),
        }
    }
}

impl Placement {
    /// Turns [`Placement::Auto`] into a concrete placement.
    pub fn resolve(self, handler_base: u32, handler_len: usize, codes_len: usize) -> Placement {
        match self {
            Placement::Auto => {
                let end = u64::from(handler_base) + handler_len as u64 + codes_len as u64;
                if end <= u64::from(LEGACY_LIMIT) {
                    Placement::Legacy
                } else {
                    Placement::Arena
                }
            }
            other => other,
        }
    }
}

pub fn check_address(what: &'static str, address: u32) -> Result<u32, LoaderError> {
    if (MEMORY_START..MEMORY_END).contains(&address) {
        Ok(address)
    } else {
        Err(LoaderError::AddressOutOfRange { what, address })
    }
}

/// Picks the loader's address: `manual` if it is free, else the first gap of
/// `buffer` bytes at or after the middle of BSS.
pub fn init_address(dol: &Dol, manual: Option<u32>, buffer: u32) -> Result<u32, LoaderError> {
    if let Some(address) = manual {
        check_address("init", address)?;
        return match dol.resolve_address(address) {
            Ok(_) => Err(LoaderError::InitAddressClobber(address)),
            Err(_) => Ok(address),
        };
    }

    let start = dol.bss_address().wrapping_add(dol.bss_size() / 2) & !0xFF;
    let address = dol.seek_safe_address(start, buffer)?;
    debug!("first {buffer:#x} byte gap after {start:#010x} is at {address:#010x}");
    check_address("init", address)
}

/// Default allocation: handler plus codes, rounded up to 8 bytes.
pub fn default_allocation(handler_len: usize, codes_len: usize) -> u32 {
    ((handler_len + codes_len + 7) & !7) as u32
}

/// Space left for codes behind a LEGACY handler.
pub fn legacy_allocation(handler_base: u32, handler_len: usize) -> u32 {
    LEGACY_LIMIT.saturating_sub(handler_base.wrapping_add(handler_len as u32))
}

/// Fails early when there is no slot left for the payload section.
pub fn ensure_free_slot(dol: &Dol) -> Result<(), LoaderError> {
    if dol.free_slots(SectionKind::Text) + dol.free_slots(SectionKind::Data) == 0 {
        return Err(LoaderError::NoFreeSections);
    }
    Ok(())
}

/// Adds `payload` at `address` as a text section, or a data section once all
/// text slots are taken.
pub fn install(dol: &mut Dol, payload: &[u8], address: u32) -> Result<SectionInfo, LoaderError> {
    match dol.append_text_section(payload, address) {
        Err(DolError::SectionCountFull { .. }) => {}
        other => return Ok(other?),
    }
    match dol.append_data_section(payload, address) {
        Err(DolError::SectionCountFull { .. }) => Err(LoaderError::NoFreeSections),
        other => Ok(other?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dol() -> Dol {
        let mut dol = Dol::empty();
        dol.append_text_section(&[0; 0x100], 0x8000_3100).unwrap();
        dol.append_data_section(&[0; 0x1000], 0x8010_8000).unwrap();
        dol.set_bss(0x8010_0000, 0x10000);
        dol
    }

    #[test]
    fn auto_prefers_legacy_when_it_fits() {
        assert_eq!(
            Placement::Auto.resolve(0x8000_1800, 0x1000, 0x800),
            Placement::Legacy
        );
        assert_eq!(
            Placement::Auto.resolve(0x8000_1800, 0x1000, 0x801),
            Placement::Arena
        );
        assert_eq!(
            Placement::Legacy.resolve(0x8000_1800, 0x1000, 0x10000),
            Placement::Legacy
        );
    }

    #[test]
    fn init_address_starts_at_bss_midpoint() {
        let dol = dol();
        // 0x80108000 is taken by data0, the next gap starts behind it
        assert_eq!(init_address(&dol, None, 0x400).unwrap(), 0x8010_9000);
    }

    #[test]
    fn automatic_init_must_land_in_memory() {
        let mut dol = Dol::empty();
        dol.set_bss(0x817F_0000, 0x20000);
        assert!(matches!(
            init_address(&dol, None, 0x400),
            Err(LoaderError::AddressOutOfRange { what: "init", address: 0x8180_0000 })
        ));

        let mut dol = Dol::empty();
        dol.append_text_section(&[0; 0x100], 0xFFFF_FF00).unwrap();
        dol.set_bss(0xFFFF_FE00, 0x200);
        assert!(matches!(
            init_address(&dol, None, 0x10),
            Err(LoaderError::Dol(DolError::NoFreeGap { .. }))
        ));
    }

    #[test]
    fn manual_init_must_be_free() {
        let dol = dol();
        assert_eq!(init_address(&dol, Some(0x8020_0000), 0x400).unwrap(), 0x8020_0000);
        assert!(matches!(
            init_address(&dol, Some(0x8000_3180), 0x400),
            Err(LoaderError::InitAddressClobber(0x8000_3180))
        ));
        assert!(matches!(
            init_address(&dol, Some(0x9000_0000), 0x400),
            Err(LoaderError::AddressOutOfRange { .. })
        ));
    }

    #[test]
    fn allocations() {
        assert_eq!(default_allocation(0x200, 0x18), 0x218);
        assert_eq!(default_allocation(0x201, 0x18), 0x220);
        assert_eq!(legacy_allocation(0x8000_1800, 0x200), 0x1600);
    }

    #[test]
    fn install_falls_back_to_data_then_fails() {
        let mut dol = Dol::empty();
        for i in 0..7 {
            dol.append_text_section(&[0; 4], 0x8000_4000 + i * 0x10).unwrap();
        }
        let section = install(&mut dol, &[1; 8], 0x8020_0000).unwrap();
        assert_eq!(section.kind, SectionKind::Data);

        for i in 1..11 {
            dol.append_data_section(&[0; 4], 0x8000_5000 + i * 0x10).unwrap();
        }
        assert!(matches!(ensure_free_slot(&dol), Err(LoaderError::NoFreeSections)));
        assert!(matches!(
            install(&mut dol, &[1; 8], 0x8030_0000),
            Err(LoaderError::NoFreeSections)
        ));
    }
}
