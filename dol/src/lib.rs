mod error;
mod section;

pub use error::DolError;
pub use section::{SectionInfo, SectionKind};

use ppc32::{decoder::decode_word, encode};

pub const HEADER_SIZE: usize = 0x100;
pub const MAX_TEXT_SECTIONS: usize = 7;
pub const MAX_DATA_SECTIONS: usize = 11;
const SECTION_COUNT: usize = MAX_TEXT_SECTIONS + MAX_DATA_SECTIONS;
const SECTION_FILE_ALIGNMENT: usize = 0x100;

/// Where [`Dol::seek`] moves the cursor to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekFrom {
    /// An absolute virtual address.
    Address(u32),
    /// A byte delta from the current cursor.
    Current(i32),
}

/// What [`Dol::extract_branch_target`] found at an address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BranchInfo {
    /// Absolute target, `None` for branches through `lr`/`ctr`.
    pub target: Option<u32>,
    pub conditional: bool,
}

#[derive(Debug, Clone, Copy)]
struct Cursor {
    address: u32,
    /// Section the address was resolved in when the cursor was last seeked.
    section: Option<SectionInfo>,
}

/// A DOL executable, edited in place.
///
/// The header bytes are the single source of truth for the section table, so an
/// image that is parsed and written back without edits is byte-identical.
#[derive(Debug, Clone)]
pub struct Dol {
    bytes: Vec<u8>,
    text: Vec<SectionInfo>,
    data: Vec<SectionInfo>,
    cursor: Cursor,
}

impl Dol {
    /*
    Start 	End 	Length 	Description
    0x0 	0x3 	4 	File offset to start of Text0
    0x04 	0x1b 	24 	File offsets for Text1..6
    0x1c 	0x47 	44 	File offsets for Data0..10
    0x48 	0x4B 	4 	Loading address for Text0
    0x4C 	0x8F 	68 	Loading addresses for Text1..6, Data0..10
    0x90 	0xD7 	72 	Section sizes for Text0..6, Data0..10
    0xD8 	0xDB 	4 	BSS address
    0xDC 	0xDF 	4 	BSS size
    0xE0 	0xE3 	4 	Entry point
    0xE4 	0xFF 		padding
    */
    const BSS_ADDR_OFF: usize = 0xD8;
    const BSS_SIZE_OFF: usize = 0xDC;
    const SECTION_OFFSET_OFF: usize = 0;
    const SECTION_ADDRESS_OFF: usize = 0x48;
    const SECTION_SIZE_OFF: usize = 0x90;
    const ENTRYPOINT_OFF: usize = 0xE0;

    /// Create a new DOL from the given bytes, validating it in the process.
    pub fn new(bytes: Vec<u8>) -> Result<Self, DolError> {
        if bytes.len() < HEADER_SIZE {
            return Err(DolError::MalformedHeader(format!(
                "file is {:#x} bytes, smaller than the {HEADER_SIZE:#x} byte header",
                bytes.len()
            )));
        }

        let text = Self::used_prefix(&bytes, SectionKind::Text, 0..MAX_TEXT_SECTIONS);
        let data = Self::used_prefix(&bytes, SectionKind::Data, MAX_TEXT_SECTIONS..SECTION_COUNT);

        let mut dol = Self {
            bytes,
            text,
            data,
            cursor: Cursor {
                address: 0,
                section: None,
            },
        };
        dol.validate_sections()?;

        if let Some(first) = dol.sections().min_by_key(|s| s.file_offset) {
            dol.cursor = Cursor {
                address: first.load_address,
                section: Some(first),
            };
        }

        Ok(dol)
    }

    /// A DOL with a zeroed header and no sections.
    pub fn empty() -> Self {
        Self {
            bytes: vec![0; HEADER_SIZE],
            text: Vec::new(),
            data: Vec::new(),
            cursor: Cursor {
                address: 0,
                section: None,
            },
        }
    }

    fn u32_at(bytes: &[u8], off: usize) -> u32 {
        let mut word = [0; 4];
        word.copy_from_slice(&bytes[off..][..4]);
        u32::from_be_bytes(word)
    }

    fn u32(&self, off: usize) -> u32 {
        Self::u32_at(&self.bytes, off)
    }

    fn set_u32(&mut self, off: usize, value: u32) {
        self.bytes[off..][..4].copy_from_slice(&value.to_be_bytes());
    }

    fn slot(bytes: &[u8], kind: SectionKind, slot: usize) -> SectionInfo {
        SectionInfo {
            kind,
            slot,
            file_offset: Self::u32_at(bytes, Self::SECTION_OFFSET_OFF + slot * 4),
            load_address: Self::u32_at(bytes, Self::SECTION_ADDRESS_OFF + slot * 4),
            size: Self::u32_at(bytes, Self::SECTION_SIZE_OFF + slot * 4),
        }
    }

    /// Reads slots in order and stops at the first one with a zero file offset.
    fn used_prefix(
        bytes: &[u8],
        kind: SectionKind,
        slots: std::ops::Range<usize>,
    ) -> Vec<SectionInfo> {
        slots
            .map(|slot| Self::slot(bytes, kind, slot))
            .take_while(|s| s.file_offset != 0)
            .collect()
    }

    fn validate_sections(&self) -> Result<(), DolError> {
        let sections: Vec<SectionInfo> = self.sections().collect();

        for s in &sections {
            let file_end = u64::from(s.file_offset) + u64::from(s.size);
            if (s.file_offset as usize) < HEADER_SIZE || file_end > self.bytes.len() as u64 {
                return Err(DolError::MalformedHeader(format!(
                    "{} section in slot {} spans file bytes {:#x}..{file_end:#x}, outside of the {:#x} byte file",
                    s.kind,
                    s.slot,
                    s.file_offset,
                    self.bytes.len()
                )));
            }
        }

        for (i, a) in sections.iter().enumerate() {
            if let Some(b) = sections[i + 1..]
                .iter()
                .find(|b| a.intersects(b.load_address, b.size) && b.size != 0)
            {
                return Err(DolError::MalformedHeader(format!(
                    "sections in slots {} and {} overlap at {:#010x}",
                    a.slot,
                    b.slot,
                    a.load_address.max(b.load_address)
                )));
            }
        }

        Ok(())
    }

    pub fn text_sections(&self) -> &[SectionInfo] {
        &self.text
    }

    pub fn data_sections(&self) -> &[SectionInfo] {
        &self.data
    }

    /// All used sections, text first.
    pub fn sections(&self) -> impl Iterator<Item = SectionInfo> + '_ {
        self.text.iter().chain(self.data.iter()).copied()
    }

    pub fn free_slots(&self, kind: SectionKind) -> usize {
        match kind {
            SectionKind::Text => MAX_TEXT_SECTIONS - self.text.len(),
            SectionKind::Data => MAX_DATA_SECTIONS - self.data.len(),
        }
    }

    pub fn section_bytes(&self, section: &SectionInfo) -> &[u8] {
        &self.bytes[section.file_offset as usize..][..section.size as usize]
    }

    /// Returns the section that houses `addr`, searching text sections first.
    pub fn resolve_address(&self, addr: u32) -> Result<SectionInfo, DolError> {
        self.sections()
            .find(|s| s.contains_addr(addr))
            .ok_or(DolError::UnmappedAddress(addr))
    }

    /// Checks that `[addr, addr + len)` lies inside a single section.
    pub fn resolve_range(&self, addr: u32, len: usize) -> Result<SectionInfo, DolError> {
        let section = self.resolve_address(addr)?;
        if u64::from(addr) + len as u64 > section.end_address() {
            return Err(DolError::SectionOverflow {
                address: addr,
                len,
                end: section.end_address(),
            });
        }
        Ok(section)
    }

    pub fn seek(&mut self, to: SeekFrom) -> Result<u32, DolError> {
        let address = match to {
            SeekFrom::Address(address) => address,
            SeekFrom::Current(delta) => self.cursor.address.wrapping_add_signed(delta),
        };
        let section = self.resolve_address(address)?;

        self.cursor = Cursor {
            address,
            section: Some(section),
        };
        Ok(address)
    }

    pub fn seek_to_address(&mut self, address: u32) -> Result<u32, DolError> {
        self.seek(SeekFrom::Address(address))
    }

    pub fn advance_bytes(&mut self, delta: i32) -> Result<u32, DolError> {
        self.seek(SeekFrom::Current(delta))
    }

    pub fn tell(&self) -> u32 {
        self.cursor.address
    }

    /// File offset of the cursor, if `len` bytes fit before the end of its section.
    fn cursor_span(&self, len: usize) -> Result<usize, DolError> {
        let address = self.cursor.address;
        let section = self.cursor.section.ok_or(DolError::UnmappedAddress(address))?;

        if u64::from(address) + len as u64 > section.end_address() {
            return Err(DolError::SectionOverflow {
                address,
                len,
                end: section.end_address(),
            });
        }

        Ok(section.file_offset as usize + (address - section.load_address) as usize)
    }

    pub fn read(&mut self, len: usize) -> Result<&[u8], DolError> {
        let start = self.cursor_span(len)?;
        self.cursor.address = self.cursor.address.wrapping_add(len as u32);
        Ok(&self.bytes[start..start + len])
    }

    pub fn read_u32(&mut self) -> Result<u32, DolError> {
        let bytes = self.read(4)?;
        Ok(Self::u32_at(bytes, 0))
    }

    pub fn write(&mut self, data: &[u8]) -> Result<(), DolError> {
        let start = self.cursor_span(data.len())?;
        self.bytes[start..start + data.len()].copy_from_slice(data);
        self.cursor.address = self.cursor.address.wrapping_add(data.len() as u32);
        Ok(())
    }

    pub fn write_u32(&mut self, value: u32) -> Result<(), DolError> {
        self.write(&value.to_be_bytes())
    }

    /// Returns the smallest address at or after `addr` where `buffer` bytes can be
    /// placed without touching any used section.
    ///
    /// Fails with [`DolError::NoFreeGap`] once the region would run past the top
    /// of the address space.
    pub fn seek_safe_address(&self, addr: u32, buffer: u32) -> Result<u32, DolError> {
        let top = u64::from(u32::MAX) + 1;
        let mut candidate = u64::from(addr);
        // Every hit moves `candidate` past the end of the section it hit, so this
        // terminates after at most one hit per section.
        while candidate + u64::from(buffer.max(1)) <= top {
            match self.sections().find(|s| s.intersects(candidate as u32, buffer)) {
                Some(hit) => candidate = hit.end_address(),
                None => return Ok(candidate as u32),
            }
        }
        Err(DolError::NoFreeGap { from: addr, len: buffer })
    }

    pub fn append_text_section(
        &mut self,
        payload: &[u8],
        load_address: u32,
    ) -> Result<SectionInfo, DolError> {
        self.append_section(SectionKind::Text, payload, load_address)
    }

    pub fn append_data_section(
        &mut self,
        payload: &[u8],
        load_address: u32,
    ) -> Result<SectionInfo, DolError> {
        self.append_section(SectionKind::Data, payload, load_address)
    }

    fn append_section(
        &mut self,
        kind: SectionKind,
        payload: &[u8],
        load_address: u32,
    ) -> Result<SectionInfo, DolError> {
        let (used, max, first_slot) = match kind {
            SectionKind::Text => (self.text.len(), MAX_TEXT_SECTIONS, 0),
            SectionKind::Data => (self.data.len(), MAX_DATA_SECTIONS, MAX_TEXT_SECTIONS),
        };
        if used >= max {
            return Err(DolError::SectionCountFull { kind, max });
        }

        let size = u32::try_from(payload.len()).map_err(|_| DolError::SectionOverlap {
            address: load_address,
            size: payload.len(),
        })?;
        if self.sections().any(|s| s.intersects(load_address, size)) {
            return Err(DolError::SectionOverlap {
                address: load_address,
                size: payload.len(),
            });
        }

        let padded = self.bytes.len().next_multiple_of(SECTION_FILE_ALIGNMENT);
        self.bytes.resize(padded, 0);
        let file_offset = padded as u32;
        self.bytes.extend_from_slice(payload);

        let section = SectionInfo {
            kind,
            slot: first_slot + used,
            file_offset,
            load_address,
            size,
        };
        self.set_u32(Self::SECTION_OFFSET_OFF + section.slot * 4, file_offset);
        self.set_u32(Self::SECTION_ADDRESS_OFF + section.slot * 4, load_address);
        self.set_u32(Self::SECTION_SIZE_OFF + section.slot * 4, size);

        match kind {
            SectionKind::Text => self.text.push(section),
            SectionKind::Data => self.data.push(section),
        }
        Ok(section)
    }

    pub fn entrypoint(&self) -> u32 {
        self.u32(Self::ENTRYPOINT_OFF)
    }

    pub fn set_entry_point(&mut self, addr: u32) {
        self.set_u32(Self::ENTRYPOINT_OFF, addr);
    }

    pub fn bss_address(&self) -> u32 {
        self.u32(Self::BSS_ADDR_OFF)
    }

    pub fn bss_size(&self) -> u32 {
        self.u32(Self::BSS_SIZE_OFF)
    }

    pub fn set_bss(&mut self, address: u32, size: u32) {
        self.set_u32(Self::BSS_ADDR_OFF, address);
        self.set_u32(Self::BSS_SIZE_OFF, size);
    }

    /// Writes `b target` (or `bl` with `link`) at `from` and leaves the cursor after it.
    pub fn insert_branch(&mut self, target: u32, from: u32, link: bool) -> Result<(), DolError> {
        self.seek_to_address(from)?;
        self.write_u32(encode::branch(from, target, link))
    }

    /// Decodes the branch at `addr`. Fails with [`DolError::NotABranch`] for anything
    /// outside the `b`/`bc`/`bclr`/`bcctr` family.
    pub fn extract_branch_target(&mut self, addr: u32) -> Result<BranchInfo, DolError> {
        self.seek_to_address(addr)?;
        let word = self.read_u32()?;

        match decode_word(word) {
            Ok(ins) if ins.is_branch() => Ok(BranchInfo {
                target: ins.branch_target(addr),
                conditional: ins.is_conditional_branch(),
            }),
            _ => Err(DolError::NotABranch {
                address: addr,
                word,
            }),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}
