#![allow(dead_code)]

use dol::Dol;
use gecko::{GeckoCodeStream, MAGIC, TERMINATOR};
use loader::{CodeHandler, LoaderBlob, hook};
use ppc32::encode::BLR;

pub const TEXT_ADDRESS: u32 = 0x8000_3100;
pub const SIGNATURE_ADDRESS: u32 = 0x8000_3140;
pub const HOOK_ADDRESS: u32 = 0x8000_3168;
pub const HANDLER_ENTRY: u32 = 0x8000_18A8;
pub const HANDLER_LEN: usize = 0x200;

/// Base 0x80001800, code list pointer at 0xF8, variable slot at 0x100.
pub fn handler_bytes() -> Vec<u8> {
    let mut bytes = 0x8000_1800u32.to_be_bytes().to_vec();
    let mut payload = vec![0x60; HANDLER_LEN];
    payload[0xF8..0xFC].copy_from_slice(&[0x3C, 0x60, 0x80, 0x00]);
    payload[0xFC..0x100].copy_from_slice(&[0x60, 0x63, 0x30, 0x00]);
    payload[0x100..0x104].copy_from_slice(&[0x00, 0xDE, 0xDE, 0xDE]);
    payload[0x104..0x108].fill(0);
    bytes.extend_from_slice(&payload);
    bytes
}

pub fn handler() -> CodeHandler {
    CodeHandler::from_bytes(handler_bytes()).unwrap()
}

pub fn loader_bytes() -> Vec<u8> {
    let parts: &[&[u8]] = &[
        b"HEAP", b"LSIZ", b"HSIZ", b"CSIZ", b"HOOK", b"CRPT", b"CYPT", //
        &[0x3C, 0x60], b"GH", &[0x38, 0x63], b"GL", //
        &[0x3C, 0x80], b"DH", &[0x38, 0x84], b"DL", //
        &[0x3C, 0xA0], b"IH", &[0x38, 0xA5], b"IL", //
        &[0x4E, 0x80, 0x00, 0x20],
    ];
    parts.concat()
}

pub fn loader() -> LoaderBlob {
    LoaderBlob::from_bytes(loader_bytes()).unwrap()
}

/// One text section at 0x80003100 with a GameCube VI routine at 0x80003140
/// that returns at 0x80003168, BSS at 0x80100000.
pub fn game() -> Dol {
    let mut text = vec![0x60; 0x100];
    let signature = 0x40;
    text[signature..signature + hook::GCN_VI.len()].copy_from_slice(&hook::GCN_VI);
    text[0x68..0x6C].copy_from_slice(&BLR.to_be_bytes());

    let mut dol = Dol::empty();
    dol.append_text_section(&text, TEXT_ADDRESS).unwrap();
    dol.set_bss(0x8010_0000, 0x10000);
    dol.set_entry_point(TEXT_ADDRESS);
    dol
}

pub fn record(word0: u32, word1: u32) -> [u8; 8] {
    let mut record = [0; 8];
    record[..4].copy_from_slice(&word0.to_be_bytes());
    record[4..].copy_from_slice(&word1.to_be_bytes());
    record
}

pub fn codes(records: &[[u8; 8]]) -> GeckoCodeStream {
    GeckoCodeStream::from_body(&records.concat()).unwrap()
}

pub fn gct(records: &[[u8; 8]]) -> Vec<u8> {
    let body = records.concat();
    [&MAGIC[..], body.as_slice(), &TERMINATOR[..]].concat()
}

pub fn word_at(dol: &mut Dol, address: u32) -> u32 {
    dol.seek_to_address(address).unwrap();
    dol.read_u32().unwrap()
}
