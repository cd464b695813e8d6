use thiserror::Error;

use crate::{instruction::Instruction, word::Word};

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("unhandled instruction {:#010x} at offset {offset:#x}", .word.0)]
    UnhandledOpcode { word: Word, offset: usize },
    #[error("unexpected end of input at offset {offset:#x}")]
    UnexpectedEof { offset: usize },
}

pub struct Decoder<'a> {
    input: &'a [u8],
    offset: usize,
}

impl<'a> Decoder<'a> {
    pub fn new(input: &'a [u8]) -> Self {
        Self { input, offset: 0 }
    }

    /// Decodes the next word.
    fn word(&mut self) -> Option<Word> {
        let (bytes, rest) = self.input.split_first_chunk::<4>()?;
        self.input = rest;
        self.offset += 4;
        Some(Word::from_be_bytes(*bytes))
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn decode_instruction(&mut self) -> Result<Instruction, DecodeError> {
        let Some(word) = self.word() else {
            return Err(DecodeError::UnexpectedEof {
                offset: self.offset,
            });
        };

        self.decode_from_word(word)
    }
}

/// Decodes a single instruction word.
pub fn decode_word(word: u32) -> Result<Instruction, DecodeError> {
    Decoder::new(&word.to_be_bytes()).decode_instruction()
}

#[cfg(test)]
mod tests {
    use super::{DecodeError, Decoder};

    #[test]
    fn walks_words_and_reports_eof() {
        let bytes = [0x48, 0x00, 0x00, 0x04, 0x4E, 0x80, 0x00, 0x20, 0x00];
        let mut decoder = Decoder::new(&bytes);

        assert!(decoder.decode_instruction().is_ok());
        assert!(decoder.decode_instruction().is_ok());
        assert_eq!(decoder.offset(), 8);
        assert!(matches!(
            decoder.decode_instruction(),
            Err(DecodeError::UnexpectedEof { offset: 8 })
        ));
    }

    #[test]
    fn reports_offset_of_unhandled_word() {
        let bytes = [0x48, 0x00, 0x00, 0x04, 0x7C, 0x08, 0x02, 0xA6];
        let mut decoder = Decoder::new(&bytes);
        decoder.decode_instruction().unwrap();

        let err = decoder.decode_instruction().unwrap_err();
        assert!(matches!(err, DecodeError::UnhandledOpcode { offset: 4, .. }));
    }
}
