use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionKind {
    Text,
    Data,
}

impl fmt::Display for SectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SectionKind::Text => f.write_str("text"),
            SectionKind::Data => f.write_str("data"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionInfo {
    pub kind: SectionKind,
    /// Header slot, 0..7 for text and 7..18 for data.
    pub slot: usize,
    pub file_offset: u32,
    pub load_address: u32,
    pub size: u32,
}

impl SectionInfo {
    /// One past the last load address, widened so a section ending at the top of
    /// the address space cannot overflow.
    pub fn end_address(&self) -> u64 {
        u64::from(self.load_address) + u64::from(self.size)
    }

    pub fn contains_addr(&self, addr: u32) -> bool {
        addr >= self.load_address && u64::from(addr) < self.end_address()
    }

    pub fn file_offset_of_addr(&self, addr: u32) -> u32 {
        assert!(self.contains_addr(addr));
        self.file_offset + (addr - self.load_address)
    }

    /// Whether `[addr, addr + len)` shares at least one byte with this section.
    /// An empty range is treated as the single byte at `addr`.
    pub fn intersects(&self, addr: u32, len: u32) -> bool {
        let start = u64::from(addr);
        let end = start + u64::from(len.max(1));
        self.size != 0 && start < self.end_address() && end > u64::from(self.load_address)
    }
}
