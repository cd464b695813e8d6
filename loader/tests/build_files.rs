mod common;

use std::{fs, path::Path};

use common::*;
use dol::Dol;
use gecko::TextSelection;
use loader::{BuildError, BuildOptions, PatchSettings, Placement, build};
use pretty_assertions::assert_eq;

fn options(dir: &Path, codes: &str) -> BuildOptions {
    BuildOptions {
        dol_path: dir.join("main.dol"),
        codes_path: dir.join(codes),
        handler_path: dir.join("codehandler.bin"),
        loader_path: dir.join("geckoloader.bin"),
        dest: Some(dir.join("out")),
        txt_codes: TextSelection::Active,
        settings: PatchSettings {
            placement: Placement::Arena,
            optimize: true,
            ..Default::default()
        },
    }
}

fn write_inputs(dir: &Path) {
    fs::write(dir.join("main.dol"), game().into_bytes()).unwrap();
    fs::write(dir.join("codehandler.bin"), handler_bytes()).unwrap();
    fs::write(dir.join("geckoloader.bin"), loader_bytes()).unwrap();
}

#[test]
fn builds_from_text_codes_into_destination_directory() {
    let dir = tempfile::tempdir().unwrap();
    write_inputs(dir.path());
    fs::write(
        dir.path().join("codes.txt"),
        "$Moon jump\n04900000 00000001\n04003120 DEADBEEF\n",
    )
    .unwrap();

    let (dest, report) = build(&options(dir.path(), "codes.txt")).unwrap();
    assert_eq!(dest, dir.path().join("out").join("main.dol"));
    assert_eq!(report.hook_address, Some(HOOK_ADDRESS));

    let mut dol = Dol::new(fs::read(&dest).unwrap()).unwrap();
    assert_eq!(dol.entrypoint(), report.init_address.unwrap());
    assert_eq!(word_at(&mut dol, 0x8000_3120), 0xDEAD_BEEF);

    // inputs are never modified
    assert_eq!(fs::read(dir.path().join("main.dol")).unwrap(), game().into_bytes());
}

#[test]
fn fully_absorbed_gct_adds_no_sections() {
    let dir = tempfile::tempdir().unwrap();
    write_inputs(dir.path());
    fs::write(
        dir.path().join("codes.gct"),
        gct(&[record(0x0400_3120, 0xDEAD_BEEF)]),
    )
    .unwrap();

    let mut options = options(dir.path(), "codes.gct");
    options.dest = Some(dir.path().join("patched.dol"));
    let (dest, report) = build(&options).unwrap();

    assert!(report.fully_absorbed());
    let dol = Dol::new(fs::read(dest).unwrap()).unwrap();
    assert_eq!(dol.text_sections().len(), 1);
    assert_eq!(dol.entrypoint(), TEXT_ADDRESS);
}

#[test]
fn missing_input_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    write_inputs(dir.path());
    fs::remove_file(dir.path().join("geckoloader.bin")).unwrap();
    fs::write(dir.path().join("codes.gct"), gct(&[record(0x0490_0000, 1)])).unwrap();

    let err = build(&options(dir.path(), "codes.gct")).unwrap_err();
    assert!(matches!(err, BuildError::Io { .. }));
    assert_eq!(err.exit_code(), 1);
    assert!(!dir.path().join("out").exists());
}

#[test]
fn missing_code_list_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    write_inputs(dir.path());

    let err = build(&options(dir.path(), "codes.txt")).unwrap_err();
    assert!(matches!(err, BuildError::CodeList(_)));
    assert_eq!(err.exit_code(), 1);
}

#[test]
fn invalid_dol_is_a_validation_error() {
    let dir = tempfile::tempdir().unwrap();
    write_inputs(dir.path());
    fs::write(dir.path().join("main.dol"), [0u8; 0x20]).unwrap();
    fs::write(dir.path().join("codes.gct"), gct(&[record(0x0490_0000, 1)])).unwrap();

    let err = build(&options(dir.path(), "codes.gct")).unwrap_err();
    assert!(matches!(err, BuildError::Dol(_)));
    assert_eq!(err.exit_code(), 2);
}
