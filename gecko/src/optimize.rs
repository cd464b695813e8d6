use dol::{Dol, DolError};
use ppc32::encode;
use tracing::{debug, trace};

use crate::{
    GeckoError,
    codetype::CodeType,
    stream::{GeckoCodeStream, Record},
};

/// Counts from one [`GeckoCodeStream::optimize_against`] pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct OptimizeReport {
    /// Records written into the DOL and dropped from the stream.
    pub applied: usize,
    /// Static writes kept because their target is not backed by a section.
    pub unmapped: usize,
    /// Everything else, copied through unchanged.
    pub kept: usize,
}

/// Bytes a record would write at an absolute address.
struct Patch {
    address: u32,
    bytes: Vec<u8>,
}

fn read_u32(bytes: &[u8]) -> u32 {
    u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

/// The writes `record` performs, or `None` if it cannot be applied ahead of time.
fn plan(record: &Record<'_>) -> Result<Option<Vec<Patch>>, GeckoError> {
    let address = record.address();
    let operand = record.operand();
    // fills repeat `count + 1` times, count in the upper half of the operand
    let repeat = (operand >> 16) as usize + 1;

    let patches = match record.code_type() {
        CodeType::Write8 => vec![Patch {
            address,
            bytes: vec![operand as u8; repeat],
        }],
        CodeType::Write16 => vec![Patch {
            address,
            bytes: (operand as u16).to_be_bytes().repeat(repeat),
        }],
        CodeType::Write32 => vec![Patch {
            address,
            bytes: operand.to_be_bytes().to_vec(),
        }],
        CodeType::WriteString => vec![Patch {
            address,
            bytes: record.payload()[..operand as usize].to_vec(),
        }],
        CodeType::SerialWrite => {
            let payload = record.payload();
            let control = read_u32(payload);
            let size = (control >> 28) as u8;
            let count = (control >> 16) & 0xFFF;
            let address_step = control & 0xFFFF;
            let value_step = read_u32(&payload[4..]);

            let mut value = operand;
            let mut target = address;
            let mut patches = Vec::with_capacity(count as usize + 1);
            for _ in 0..=count {
                let bytes = match size {
                    0 => vec![value as u8],
                    1 => (value as u16).to_be_bytes().to_vec(),
                    2 => value.to_be_bytes().to_vec(),
                    _ => return Err(GeckoError::InvalidSerialSize { address, size }),
                };
                patches.push(Patch {
                    address: target,
                    bytes,
                });
                target = target.wrapping_add(address_step);
                value = value.wrapping_add(value_step);
            }
            patches
        }
        CodeType::InsertBranch => vec![Patch {
            address,
            bytes: encode::branch(address, operand, false).to_be_bytes().to_vec(),
        }],
        _ => return Ok(None),
    };

    Ok(Some(patches))
}

/// Whether every patch lands inside a single section.
fn is_mapped(dol: &Dol, patches: &[Patch]) -> Result<bool, GeckoError> {
    for patch in patches {
        match dol.resolve_range(patch.address, patch.bytes.len()) {
            Ok(_) => {}
            Err(DolError::UnmappedAddress(_) | DolError::SectionOverflow { .. }) => {
                return Ok(false);
            }
            Err(err) => return Err(err.into()),
        }
    }
    Ok(true)
}

impl GeckoCodeStream {
    /// Applies every static write outside of an IF block directly to `dol` and
    /// returns the stream of what is left.
    ///
    /// A write whose target is not fully inside one section stays in the stream and
    /// leaves the DOL untouched. A serial write with a size type of 3 or more is fatal.
    pub fn optimize_against(
        self,
        dol: &mut Dol,
    ) -> Result<(GeckoCodeStream, OptimizeReport), GeckoError> {
        let mut body = Vec::with_capacity(self.body().len());
        let mut report = OptimizeReport::default();
        let mut depth = 0usize;

        for record in self.records() {
            let patches = if depth == 0 { plan(&record)? } else { None };
            if let Some(patches) = patches {
                if is_mapped(dol, &patches)? {
                    for patch in &patches {
                        dol.seek_to_address(patch.address)?;
                        dol.write(&patch.bytes)?;
                    }
                    trace!(
                        "applied {:02X} record at {:#010x}",
                        record.opcode(),
                        record.address()
                    );
                    report.applied += 1;
                } else {
                    debug!(
                        "keeping {:02X} record, {:#010x} is outside the DOL",
                        record.opcode(),
                        record.address()
                    );
                    report.unmapped += 1;
                    body.extend_from_slice(record.bytes());
                }
                continue;
            }

            match record.code_type() {
                CodeType::If => depth += 1,
                CodeType::EndIf => depth = depth.saturating_sub(1),
                _ => {}
            }
            report.kept += 1;
            body.extend_from_slice(record.bytes());
        }

        debug!(
            "optimized code list: {} applied, {} unmapped, {} kept",
            report.applied, report.unmapped, report.kept
        );
        Ok((GeckoCodeStream::from_validated_body(&body), report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn dol() -> Dol {
        let mut dol = Dol::empty();
        dol.append_text_section(&[0; 0x100], 0x8000_3100).unwrap();
        dol.append_data_section(&[0; 0x100], 0x8000_4000).unwrap();
        dol
    }

    fn read(dol: &mut Dol, address: u32, len: usize) -> Vec<u8> {
        dol.seek_to_address(address).unwrap();
        dol.read(len).unwrap().to_vec()
    }

    fn optimize(body: &[u8], dol: &mut Dol) -> (GeckoCodeStream, OptimizeReport) {
        GeckoCodeStream::from_body(body)
            .unwrap()
            .optimize_against(dol)
            .unwrap()
    }

    #[test]
    fn absorbs_32bit_write() {
        let mut dol = dol();
        let (stream, report) = optimize(&[0x04, 0x00, 0x31, 0x20, 0xDE, 0xAD, 0xBE, 0xEF], &mut dol);

        assert!(stream.is_fully_absorbed());
        assert_eq!(report.applied, 1);
        assert_eq!(read(&mut dol, 0x8000_3120, 4), [0xDE, 0xAD, 0xBE, 0xEF]);
    }

    #[test]
    fn fills_bytes_and_halfwords() {
        let mut dol = dol();
        let body = [
            // three bytes of 0xAB
            0x00, 0x00, 0x31, 0x00, 0x00, 0x02, 0x00, 0xAB,
            // two halfwords of 0x1234
            0x02, 0x00, 0x40, 0x10, 0x00, 0x01, 0x12, 0x34,
        ];
        let (stream, report) = optimize(&body, &mut dol);

        assert!(stream.is_fully_absorbed());
        assert_eq!(report.applied, 2);
        assert_eq!(read(&mut dol, 0x8000_3100, 4), [0xAB, 0xAB, 0xAB, 0x00]);
        assert_eq!(read(&mut dol, 0x8000_4010, 6), [0x12, 0x34, 0x12, 0x34, 0, 0]);
    }

    #[test]
    fn writes_strings_without_padding() {
        let mut dol = dol();
        let body = [
            0x06, 0x00, 0x31, 0x10, 0x00, 0x00, 0x00, 0x03,
            0x11, 0x22, 0x33, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF,
        ];
        optimize(&body, &mut dol);
        assert_eq!(read(&mut dol, 0x8000_3110, 4), [0x11, 0x22, 0x33, 0x00]);
    }

    #[test]
    fn serial_write_steps_address_and_value() {
        let mut dol = dol();
        let body = [
            0x08, 0x00, 0x40, 0x00, 0x00, 0x00, 0x00, 0x10,
            // size 1 (u16), count 2, address step 4
            0x10, 0x02, 0x00, 0x04, 0x00, 0x00, 0x00, 0x01,
        ];
        let (stream, _) = optimize(&body, &mut dol);

        assert!(stream.is_fully_absorbed());
        assert_eq!(
            read(&mut dol, 0x8000_4000, 12),
            [0x00, 0x10, 0, 0, 0x00, 0x11, 0, 0, 0x00, 0x12, 0, 0]
        );
    }

    #[test]
    fn serial_write_rejects_size_three() {
        let mut dol = dol();
        let body = [
            0x08, 0x00, 0x40, 0x00, 0x00, 0x00, 0x00, 0x10,
            0x30, 0x00, 0x00, 0x04, 0x00, 0x00, 0x00, 0x01,
        ];
        let err = GeckoCodeStream::from_body(&body)
            .unwrap()
            .optimize_against(&mut dol)
            .unwrap_err();
        assert!(matches!(
            err,
            GeckoError::InvalidSerialSize {
                address: 0x8000_4000,
                size: 3
            }
        ));
    }

    #[test]
    fn inserts_branches() {
        let mut dol = dol();
        let body = [0xC6, 0x00, 0x31, 0x40, 0x80, 0x00, 0x31, 0x00];
        optimize(&body, &mut dol);
        assert_eq!(read(&mut dol, 0x8000_3140, 4), [0x4B, 0xFF, 0xFF, 0xC0]);
    }

    #[test]
    fn keeps_unmapped_and_spilling_writes() {
        let mut dol = dol();
        let body = [
            // unmapped
            0x04, 0x90, 0x00, 0x00, 0xCA, 0xFE, 0xBA, 0xBE,
            // last two bytes would cross the end of text0
            0x04, 0x00, 0x31, 0xFE, 0xCA, 0xFE, 0xBA, 0xBE,
        ];
        let before = dol.as_bytes().to_vec();
        let (stream, report) = optimize(&body, &mut dol);

        assert_eq!(stream.body(), &body[..]);
        assert_eq!(report.unmapped, 2);
        assert_eq!(dol.as_bytes(), &before[..]);
    }

    #[test]
    fn leaves_if_blocks_alone() {
        let mut dol = dol();
        let body = [
            0x28, 0x00, 0x30, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x04, 0x00, 0x31, 0x00, 0xDE, 0xAD, 0xBE, 0xEF,
            0xE0, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            // back at depth zero
            0x04, 0x00, 0x31, 0x04, 0x01, 0x02, 0x03, 0x04,
        ];
        let (stream, report) = optimize(&body, &mut dol);

        assert_eq!(stream.body(), &body[..24]);
        assert_eq!(report.kept, 3);
        assert_eq!(report.applied, 1);
        assert_eq!(read(&mut dol, 0x8000_3100, 8), [0, 0, 0, 0, 1, 2, 3, 4]);
    }

    #[test]
    fn stray_endif_does_not_underflow() {
        let mut dol = dol();
        let body = [
            0xE0, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x04, 0x00, 0x31, 0x00, 0x01, 0x02, 0x03, 0x04,
        ];
        let (stream, _) = optimize(&body, &mut dol);
        assert_eq!(stream.body(), &body[..8]);
        assert_eq!(read(&mut dol, 0x8000_3100, 4), [1, 2, 3, 4]);
    }
}
