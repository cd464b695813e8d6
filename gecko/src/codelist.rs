use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use encoding_rs::{UTF_8, WINDOWS_1252};
use tracing::{debug, warn};

use crate::{CodeListError, stream::GeckoCodeStream};

/// Which lines of an OcarinaManager text file are taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextSelection {
    /// Only lines whose code is marked with `*`.
    #[default]
    Active,
    All,
}

impl FromStr for TextSelection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "ACTIVE" => Ok(TextSelection::Active),
            "ALL" => Ok(TextSelection::All),
            _ => Err(format!("invalid text code selection: {s}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dialect {
    /// `$Name` headers, codes on their own lines.
    Dolphin,
    /// Codes enabled by a leading `*`.
    OcarinaManager,
}

fn is_delimiter(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | 0x0C)
}

fn is_space(b: u8) -> bool {
    b.is_ascii_whitespace() || b == 0x0B
}

/// Parses `XXXXXXXX YYYYYYYY` at the start of `bytes`.
fn code_at(bytes: &[u8]) -> Option<[u8; 8]> {
    let bytes = bytes.get(..17)?;
    let (word0, rest) = bytes.split_at(8);
    let (delimiter, word1) = rest.split_at(1);

    if !is_delimiter(delimiter[0])
        || !word0.iter().all(u8::is_ascii_hexdigit)
        || !word1.iter().all(u8::is_ascii_hexdigit)
    {
        return None;
    }

    // all ascii hex digits at this point
    let parse = |word: &[u8]| {
        std::str::from_utf8(word)
            .ok()
            .and_then(|s| u32::from_str_radix(s, 16).ok())
    };
    let mut code = [0; 8];
    code[..4].copy_from_slice(&parse(word0)?.to_be_bytes());
    code[4..].copy_from_slice(&parse(word1)?.to_be_bytes());
    Some(code)
}

/// First code anywhere in the line.
fn first_code(line: &[u8]) -> Option<[u8; 8]> {
    (0..line.len()).find_map(|i| code_at(&line[i..]))
}

/// First code that directly follows a `*` and optional whitespace.
fn first_active_code(line: &[u8]) -> Option<[u8; 8]> {
    line.iter()
        .enumerate()
        .filter(|&(_, &b)| b == b'*')
        .find_map(|(star, _)| {
            let start = line[star + 1..]
                .iter()
                .position(|&b| !is_space(b))
                .map_or(line.len(), |skip| star + 1 + skip);
            code_at(&line[start..])
        })
}

/// First code that is not glued to a `$` or `*`.
fn first_unmarked_code(line: &[u8]) -> Option<[u8; 8]> {
    (0..line.len())
        .filter(|&i| i == 0 || !matches!(line[i - 1], b'$' | b'*'))
        .find_map(|i| code_at(&line[i..]))
}

/// Decodes a text code list as UTF-8, falling back to Windows-1252 for legacy files.
fn decode_text(bytes: &[u8]) -> String {
    let (text, _, had_errors) = UTF_8.decode(bytes);
    if !had_errors {
        return text.into_owned();
    }

    debug!("code list is not valid UTF-8, decoding as Windows-1252");
    let (text, _, _) = WINDOWS_1252.decode(bytes);
    text.into_owned()
}

/// Assembles a [`GeckoCodeStream`] from `.txt`, `.gct` or a directory of both.
#[derive(Debug, Clone, Copy, Default)]
pub struct CodeListBuilder {
    selection: TextSelection,
}

impl CodeListBuilder {
    pub fn new(selection: TextSelection) -> Self {
        Self { selection }
    }

    pub fn build(&self, path: &Path) -> Result<GeckoCodeStream, CodeListError> {
        let body = if path.is_dir() {
            self.directory_body(path)?
        } else {
            match extension(path).as_deref() {
                Some("txt") => self.text_body(&read(path)?),
                Some("gct") => gct_body(path)?,
                _ => return Err(CodeListError::UnsupportedFileType(path.to_owned())),
            }
        };

        if body.is_empty() {
            return Err(CodeListError::EmptyCodeList(path.to_owned()));
        }

        let stream = GeckoCodeStream::from_body(&body)?;
        debug!(
            "code list {} is {:#x} bytes",
            path.display(),
            stream.len()
        );
        Ok(stream)
    }

    fn directory_body(&self, dir: &Path) -> Result<Vec<u8>, CodeListError> {
        let io_err = |source| CodeListError::Io {
            path: dir.to_owned(),
            source,
        };

        let mut files = fs::read_dir(dir)
            .map_err(io_err)?
            .map(|entry| entry.map(|entry| entry.path()))
            .collect::<Result<Vec<PathBuf>, _>>()
            .map_err(io_err)?;
        files.retain(|path| path.is_file());
        files.sort();

        let mut body = Vec::new();
        for file in files {
            match extension(&file).as_deref() {
                Some("txt") => body.extend(self.text_body(&read(&file)?)),
                Some("gct") => body.extend(gct_body(&file)?),
                _ => warn!("skipping {}: not a .txt or .gct file", file.display()),
            }
        }
        Ok(body)
    }

    /// Extracts the raw records from a text code list.
    pub fn text_body(&self, bytes: &[u8]) -> Vec<u8> {
        let text = decode_text(bytes);
        let mut detected = None;
        let mut body = Vec::new();

        for line in text.lines() {
            // blank lines, including whitespace-only ones, never pick the dialect
            if line.trim().is_empty() {
                continue;
            }

            let dialect = *detected.get_or_insert(if line.starts_with(['$', '[']) {
                Dialect::Dolphin
            } else {
                Dialect::OcarinaManager
            });

            let line = line.as_bytes();
            let code = match (dialect, self.selection) {
                (Dialect::Dolphin, _) => {
                    if line.starts_with(b"$") || line.starts_with(b"*") || line.starts_with(b"[") {
                        continue;
                    }
                    first_unmarked_code(line)
                }
                (Dialect::OcarinaManager, TextSelection::All) => first_code(line),
                (Dialect::OcarinaManager, TextSelection::Active) => first_active_code(line),
            };

            if let Some(code) = code {
                body.extend_from_slice(&code);
            }
        }

        body
    }
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
}

/// The records of a `.gct` file, without its magic and terminator.
fn gct_body(path: &Path) -> Result<Vec<u8>, CodeListError> {
    let stream =
        GeckoCodeStream::from_bytes(read(path)?).map_err(|err| CodeListError::MalformedGct {
            path: path.to_owned(),
            reason: err.to_string(),
        })?;
    Ok(stream.body().to_vec())
}

fn read(path: &Path) -> Result<Vec<u8>, CodeListError> {
    fs::read(path).map_err(|source| CodeListError::Io {
        path: path.to_owned(),
        source,
    })
}
