use dol::{Dol, SectionKind};
use pretty_assertions::assert_eq;

fn base_image() -> Vec<u8> {
    let mut dol = Dol::empty();
    dol.append_text_section(&[0x60; 0x124], 0x8000_3100).unwrap();
    dol.append_data_section(&[0x11; 0x30], 0x8040_0000).unwrap();
    dol.set_bss(0x8050_0000, 0x2000);
    dol.set_entry_point(0x8000_3100);
    dol.into_bytes()
}

#[test]
fn appended_section_is_aligned_and_addressable() {
    let original = base_image();
    let mut dol = Dol::new(original.clone()).unwrap();
    let payload: Vec<u8> = (0..0x45u8).collect();

    let section = dol.append_text_section(&payload, 0x8060_0000).unwrap();
    assert_eq!(section.kind, SectionKind::Text);
    assert_eq!(section.slot, 1);
    assert_eq!(section.file_offset % 0x100, 0);
    assert_eq!(section.load_address, 0x8060_0000);
    assert_eq!(section.size, payload.len() as u32);

    for k in 0..payload.len() as u32 {
        let resolved = dol.resolve_address(0x8060_0000 + k).unwrap();
        assert_eq!(resolved.file_offset_of_addr(0x8060_0000 + k), section.file_offset + k);
    }

    // existing sections and header fields are untouched
    let bytes = dol.into_bytes();
    let reparsed = Dol::new(bytes.clone()).unwrap();
    assert_eq!(reparsed.text_sections().len(), 2);
    assert_eq!(reparsed.entrypoint(), 0x8000_3100);
    let old = Dol::new(original).unwrap();
    for section in old.sections() {
        assert_eq!(reparsed.section_bytes(&section), old.section_bytes(&section));
    }
    assert_eq!(reparsed.section_bytes(&reparsed.text_sections()[1]), &payload[..]);
}

#[test]
fn data_section_fills_next_data_slot() {
    let mut dol = Dol::new(base_image()).unwrap();
    let section = dol.append_data_section(&[1, 2, 3, 4], 0x8060_0000).unwrap();
    assert_eq!(section.slot, 8);

    let bytes = dol.into_bytes();
    assert_eq!(&bytes[0x20..0x24], &section.file_offset.to_be_bytes());
    assert_eq!(&bytes[0x68..0x6C], &[0x80, 0x60, 0x00, 0x00]);
    assert_eq!(&bytes[0xB0..0xB4], &[0, 0, 0, 4]);
}
