use tracing::warn;

use crate::{
    GeckoError,
    codetype::{CodeType, target_address},
};

pub const MAGIC: [u8; 8] = [0x00, 0xD0, 0xC0, 0xDE, 0x00, 0xD0, 0xC0, 0xDE];
pub const TERMINATOR: [u8; 8] = [0xF0, 0, 0, 0, 0, 0, 0, 0];

/// One code, borrowed out of a stream together with its trailing lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Record<'a> {
    offset: usize,
    bytes: &'a [u8],
}

impl<'a> Record<'a> {
    fn word(&self, index: usize) -> u32 {
        let mut word = [0; 4];
        word.copy_from_slice(&self.bytes[index * 4..][..4]);
        u32::from_be_bytes(word)
    }

    /// Offset of the record inside the stream it was read from.
    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn bytes(&self) -> &'a [u8] {
        self.bytes
    }

    pub fn opcode(&self) -> u8 {
        self.bytes[0]
    }

    pub fn code_type(&self) -> CodeType {
        CodeType::from_opcode(self.opcode())
    }

    pub fn address(&self) -> u32 {
        target_address(self.word(0))
    }

    pub fn operand(&self) -> u32 {
        self.word(1)
    }

    /// Everything after the first line.
    pub fn payload(&self) -> &'a [u8] {
        &self.bytes[8..]
    }
}

fn read_record(bytes: &[u8], offset: usize) -> Result<Record<'_>, GeckoError> {
    let rest = &bytes[offset..];
    let Some((head, _)) = rest.split_first_chunk::<8>() else {
        return Err(GeckoError::TruncatedRecord {
            offset,
            needed: 8,
            available: rest.len(),
        });
    };

    let operand = u32::from_be_bytes([head[4], head[5], head[6], head[7]]);
    let needed = CodeType::from_opcode(head[0]).record_length(operand);
    if needed > rest.len() as u64 {
        return Err(GeckoError::TruncatedRecord {
            offset,
            needed,
            available: rest.len(),
        });
    }

    Ok(Record {
        offset,
        bytes: &rest[..needed as usize],
    })
}

/// Walks the records behind the magic, up to but excluding the terminator.
struct Records<'a> {
    bytes: &'a [u8],
    offset: usize,
    done: bool,
}

impl<'a> Records<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            offset: MAGIC.len(),
            done: false,
        }
    }
}

impl<'a> Iterator for Records<'a> {
    type Item = Result<Record<'a>, GeckoError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if self.offset >= self.bytes.len() {
            self.done = true;
            return Some(Err(GeckoError::MissingTerminator));
        }

        match read_record(self.bytes, self.offset) {
            Ok(record) if record.code_type() == CodeType::Terminator => {
                self.done = true;
                None
            }
            Ok(record) => {
                self.offset += record.bytes.len();
                Some(Ok(record))
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

/// A complete code list: magic, records, terminator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeckoCodeStream {
    bytes: Vec<u8>,
}

impl GeckoCodeStream {
    /// Validates a raw stream (the contents of a `.gct`).
    ///
    /// Every record must fit inside the buffer. Bytes behind the terminator are
    /// dropped.
    pub fn from_bytes(mut bytes: Vec<u8>) -> Result<Self, GeckoError> {
        if !bytes.starts_with(&MAGIC) {
            return Err(GeckoError::MissingMagic);
        }

        let mut terminator = MAGIC.len();
        for record in Records::new(&bytes) {
            let record = record?;
            terminator = record.offset + record.bytes.len();
        }

        let end = terminator + TERMINATOR.len();
        if bytes.len() > end {
            warn!(
                "ignoring {:#x} bytes after the code list terminator",
                bytes.len() - end
            );
            bytes.truncate(end);
        }

        Ok(Self { bytes })
    }

    /// Wraps bare records with the magic and terminator.
    pub fn from_body(body: &[u8]) -> Result<Self, GeckoError> {
        Self::from_bytes(Self::from_validated_body(body).bytes)
    }

    /// Builds a stream from records that were already validated.
    pub(crate) fn from_validated_body(body: &[u8]) -> Self {
        let mut bytes = Vec::with_capacity(body.len() + MAGIC.len() + TERMINATOR.len());
        bytes.extend_from_slice(&MAGIC);
        bytes.extend_from_slice(body);
        bytes.extend_from_slice(&TERMINATOR);
        Self { bytes }
    }

    pub fn records(&self) -> impl Iterator<Item = Record<'_>> {
        // validated on construction
        Records::new(&self.bytes).map_while(Result::ok)
    }

    /// The records without magic and terminator.
    pub fn body(&self) -> &[u8] {
        &self.bytes[MAGIC.len()..self.bytes.len() - TERMINATOR.len()]
    }

    /// Inserts `records` directly behind the magic.
    pub fn prepend(&mut self, records: &[u8]) -> Result<(), GeckoError> {
        let mut body = Vec::with_capacity(records.len() + self.body().len());
        body.extend_from_slice(records);
        body.extend_from_slice(self.body());
        *self = Self::from_body(&body)?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.body().is_empty()
    }

    /// Whether nothing but magic and terminator is left, so there is nothing to install.
    pub fn is_fully_absorbed(&self) -> bool {
        self.len() <= MAGIC.len() + TERMINATOR.len()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn stream(body: &[u8]) -> Vec<u8> {
        [&MAGIC[..], body, &TERMINATOR[..]].concat()
    }

    #[test]
    fn walks_records_with_trailing_lines() {
        let body = [
            // 04 write
            &[0x04u8, 0x00, 0x31, 0x20, 0xDE, 0xAD, 0xBE, 0xEF][..],
            // 06 string, 3 bytes padded to a line
            &[0x06, 0x00, 0x31, 0x40, 0x00, 0x00, 0x00, 0x03][..],
            &[0x11, 0x22, 0x33, 0x00, 0x00, 0x00, 0x00, 0x00][..],
            // C2 with two lines
            &[0xC2, 0x00, 0x31, 0x00, 0x00, 0x00, 0x00, 0x02][..],
            &[0x60, 0x00, 0x00, 0x00, 0x60, 0x00, 0x00, 0x00][..],
            &[0x60, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00][..],
        ]
        .concat();
        let stream = GeckoCodeStream::from_bytes(stream(&body)).unwrap();

        let records: Vec<_> = stream.records().collect();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].address(), 0x8000_3120);
        assert_eq!(records[0].operand(), 0xDEAD_BEEF);
        assert_eq!(records[1].code_type(), CodeType::WriteString);
        assert_eq!(records[1].payload(), &[0x11, 0x22, 0x33, 0, 0, 0, 0, 0]);
        assert_eq!(records[2].offset(), 8 + 8 + 16);
        assert_eq!(records[2].bytes().len(), 24);

        // each record's length is exactly how far the walk advances
        let mut expected = MAGIC.len();
        for record in stream.records() {
            assert_eq!(record.offset(), expected);
            expected += record.code_type().record_length(record.operand()) as usize;
        }
        assert_eq!(expected, stream.len() - TERMINATOR.len());
    }

    #[test]
    fn rejects_missing_magic() {
        assert!(matches!(
            GeckoCodeStream::from_bytes(TERMINATOR.to_vec()),
            Err(GeckoError::MissingMagic)
        ));
    }

    #[test]
    fn rejects_missing_terminator() {
        let record: [u8; 8] = [0x04, 0, 0, 0, 0, 0, 0, 0];
        let bytes = [&MAGIC[..], &record[..]].concat();
        assert!(matches!(
            GeckoCodeStream::from_bytes(bytes),
            Err(GeckoError::MissingTerminator)
        ));
    }

    #[test]
    fn rejects_truncated_record() {
        // C2 claims four lines but only one follows
        let body: [u8; 16] = [0xC2, 0, 0, 0, 0, 0, 0, 4, 0, 0, 0, 0, 0, 0, 0, 0];
        let err = GeckoCodeStream::from_bytes([&MAGIC[..], &body[..]].concat()).unwrap_err();
        assert!(matches!(
            err,
            GeckoError::TruncatedRecord {
                offset: 8,
                needed: 40,
                available: 16
            }
        ));
    }

    #[test]
    fn drops_bytes_after_terminator() {
        let mut bytes = stream(&[]);
        bytes.extend_from_slice(&[0xAA; 8]);
        let stream = GeckoCodeStream::from_bytes(bytes).unwrap();
        assert_eq!(stream.as_bytes(), &[&MAGIC[..], &TERMINATOR[..]].concat()[..]);
        assert!(stream.is_fully_absorbed());
        assert!(stream.is_empty());
    }

    #[test]
    fn prepends_behind_magic() {
        let mut stream =
            GeckoCodeStream::from_body(&[0x04, 0, 0, 0, 1, 2, 3, 4]).unwrap();
        stream.prepend(&[0x04, 0, 0, 4, 5, 6, 7, 8]).unwrap();

        assert_eq!(
            stream.body(),
            &[0x04, 0, 0, 4, 5, 6, 7, 8, 0x04, 0, 0, 0, 1, 2, 3, 4]
        );
        assert_eq!(stream.records().count(), 2);
    }
}
