//! The bootstrap loader blob and its placeholder tokens.
//!
//! Four byte tokens sit at word aligned offsets and are replaced by whole words.
//! Two byte tokens are the immediates of `lis`/`addi` pairs and get the `@ha`
//! and `@l` halves of an absolute address.

use ppc32::encode;
use tracing::trace;

use crate::LoaderError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    /// `HEAP`: bytes reserved for handler and codes.
    Heap,
    /// `LSIZ`
    LoaderSize,
    /// `HSIZ`
    HandlerSize,
    /// `CSIZ`
    CodeSize,
    /// `HOOK`
    Hook,
    /// `CRPT`: whether the code list is encrypted.
    Crypt,
    /// `CYPT`: the obfuscated key.
    Key,
    /// `GH`/`GL`: address of the `HEAP` word.
    DataUpper,
    DataLower,
    /// `DH`/`DL`: address of the `CYPT` word.
    KeyUpper,
    KeyLower,
    /// `IH`/`IL`: the game's original entry point.
    EntryUpper,
    EntryLower,
}

const WORD_TOKENS: [(&[u8; 4], Token); 7] = [
    (b"HEAP", Token::Heap),
    (b"LSIZ", Token::LoaderSize),
    (b"HSIZ", Token::HandlerSize),
    (b"CSIZ", Token::CodeSize),
    (b"HOOK", Token::Hook),
    (b"CRPT", Token::Crypt),
    (b"CYPT", Token::Key),
];

const HALF_TOKENS: [(&[u8; 2], Token); 6] = [
    (b"GH", Token::DataUpper),
    (b"GL", Token::DataLower),
    (b"DH", Token::KeyUpper),
    (b"DL", Token::KeyLower),
    (b"IH", Token::EntryUpper),
    (b"IL", Token::EntryLower),
];

enum Fill {
    Word(u32),
    Half(u16),
}

/// Values written over the tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoaderValues {
    /// Where the loader itself is placed.
    pub init_address: u32,
    pub allocation: u32,
    pub handler_len: u32,
    pub codes_len: u32,
    pub hook_address: u32,
    pub encrypted: bool,
    /// Already obfuscated.
    pub key: u32,
    pub entry_point: u32,
}

/// A pristine loader blob with the location of every token in it.
#[derive(Debug, Clone)]
pub struct LoaderBlob {
    bytes: Vec<u8>,
    tokens: Vec<(usize, Token)>,
    heap_offset: usize,
    key_offset: usize,
}

impl LoaderBlob {
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, LoaderError> {
        let mut tokens = Vec::new();

        for (index, word) in bytes.chunks_exact(4).enumerate() {
            if let Some(&(_, token)) = WORD_TOKENS.iter().find(|(name, _)| word == name.as_slice()) {
                tokens.push((index * 4, token));
            }
        }

        let mut halves = Vec::new();
        for (index, half) in bytes.chunks_exact(2).enumerate() {
            let offset = index * 2;
            // skip halves of a word token
            if tokens.iter().any(|&(word, _)| offset == word || offset == word + 2) {
                continue;
            }
            if let Some(&(_, token)) = HALF_TOKENS.iter().find(|(name, _)| half == name.as_slice()) {
                halves.push((offset, token));
            }
        }
        tokens.extend(halves);

        let first = |wanted: Token| {
            tokens
                .iter()
                .find(|&&(_, token)| token == wanted)
                .map(|&(offset, _)| offset)
        };
        let heap_offset = first(Token::Heap).ok_or(LoaderError::MissingToken("HEAP"))?;
        let key_offset = first(Token::Key).ok_or(LoaderError::MissingToken("CYPT"))?;

        trace!("loader tokens: {tokens:x?}");
        Ok(Self {
            bytes,
            tokens,
            heap_offset,
            key_offset,
        })
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn heap_offset(&self) -> usize {
        self.heap_offset
    }

    pub fn key_offset(&self) -> usize {
        self.key_offset
    }

    /// Returns a copy of the blob with every token replaced.
    pub fn patch(&self, values: &LoaderValues) -> Vec<u8> {
        let data = values.init_address.wrapping_add(self.heap_offset as u32);
        let key = values.init_address.wrapping_add(self.key_offset as u32);

        let mut bytes = self.bytes.clone();
        for &(offset, token) in &self.tokens {
            let fill = match token {
                Token::Heap => Fill::Word(values.allocation),
                Token::LoaderSize => Fill::Word(self.bytes.len() as u32),
                Token::HandlerSize => Fill::Word(values.handler_len),
                Token::CodeSize => Fill::Word(values.codes_len),
                Token::Hook => Fill::Word(values.hook_address),
                Token::Crypt => Fill::Word(u32::from(values.encrypted)),
                Token::Key => Fill::Word(values.key),
                Token::DataUpper => Fill::Half(encode::ha(data)),
                Token::DataLower => Fill::Half(encode::lo(data)),
                Token::KeyUpper => Fill::Half(encode::ha(key)),
                Token::KeyLower => Fill::Half(encode::lo(key)),
                Token::EntryUpper => Fill::Half(encode::ha(values.entry_point)),
                Token::EntryLower => Fill::Half(encode::lo(values.entry_point)),
            };
            match fill {
                Fill::Word(word) => bytes[offset..offset + 4].copy_from_slice(&word.to_be_bytes()),
                Fill::Half(half) => bytes[offset..offset + 2].copy_from_slice(&half.to_be_bytes()),
            }
        }
        bytes
    }
}
