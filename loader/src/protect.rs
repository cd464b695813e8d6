//! A C0 record run before any other code that keeps the game's own Gecko
//! handler copy from overwriting ours.

/// `C0000000 00000017` followed by 0x17 lines of PowerPC.
pub const PROTECT_STUB: [u8; 192] = [
    0xC0, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x17, //
    0x7C, 0x08, 0x02, 0xA6, 0x94, 0x21, 0xFF, 0x70, //
    0x90, 0x01, 0x00, 0x08, 0xBC, 0x61, 0x00, 0x0C, //
    0x48, 0x00, 0x00, 0x0D, 0x00, 0xD0, 0xC0, 0xDE, //
    0x00, 0xD0, 0xDE, 0xAD, 0x7F, 0xE8, 0x02, 0xA6, //
    0x3B, 0xDF, 0x00, 0x08, 0x3C, 0x60, 0x80, 0x00, //
    0x38, 0x80, 0x11, 0x00, 0x38, 0xA0, 0x00, 0x00, //
    0x60, 0x63, 0x1E, 0xF8, 0x7C, 0x89, 0x03, 0xA6, //
    0x38, 0x80, 0x00, 0x00, 0x7D, 0x03, 0x22, 0x14, //
    0x54, 0xE9, 0x06, 0x3E, 0x89, 0x08, 0x00, 0x08, //
    0x7D, 0x3F, 0x48, 0xAE, 0x38, 0xE7, 0x00, 0x01, //
    0x7C, 0x08, 0x48, 0x40, 0x41, 0x82, 0x00, 0x0C, //
    0x60, 0xA7, 0x00, 0x00, 0x48, 0x00, 0x00, 0x04, //
    0x54, 0xE8, 0x06, 0x3E, 0x28, 0x08, 0x00, 0x03, //
    0x41, 0x81, 0x00, 0x10, 0x38, 0x84, 0x00, 0x01, //
    0x42, 0x00, 0xFF, 0xCC, 0x48, 0x00, 0x00, 0x2C, //
    0x38, 0xA0, 0x00, 0x08, 0x7C, 0x84, 0x1A, 0x14, //
    0x7C, 0xA9, 0x03, 0xA6, 0x38, 0x60, 0x00, 0x00, //
    0x38, 0x84, 0xFF, 0xFF, 0x54, 0x66, 0x07, 0xBE, //
    0x7C, 0xDE, 0x30, 0xAE, 0x38, 0x63, 0x00, 0x01, //
    0x9C, 0xC4, 0x00, 0x01, 0x42, 0x00, 0xFF, 0xF0, //
    0xB8, 0x61, 0x00, 0x0C, 0x80, 0x01, 0x00, 0x08, //
    0x38, 0x21, 0x00, 0x90, 0x7C, 0x08, 0x03, 0xA6, //
    0x4E, 0x80, 0x00, 0x20, 0x00, 0x00, 0x00, 0x00, //
];

#[cfg(test)]
mod tests {
    use super::*;
    use gecko::{CodeType, GeckoCodeStream};

    #[test]
    fn is_a_single_assembly_record() {
        let stream = GeckoCodeStream::from_body(&PROTECT_STUB).unwrap();
        let records: Vec<_> = stream.records().collect();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].code_type(), CodeType::Assembly);
        assert_eq!(records[0].bytes().len(), PROTECT_STUB.len());
    }
}
