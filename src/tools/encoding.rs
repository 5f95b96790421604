//! Rewrites song sheets as clean UTF-8
//!
//! Sheets arrive from many editors: UTF-8 with or without a BOM, UTF-16 from
//! Windows tools, or Windows-1252. Decoders are tried in order and the first
//! that succeeds wins.

use std::{
    fmt,
    path::{Path, PathBuf},
};

use log::{debug, info};
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use crate::domain::title::fold_to_ascii;

static EXCESS_NEWLINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{4,}").unwrap());

#[derive(Debug, Error)]
pub enum RepairError {
    #[error("failed to read {}: {source}", path.to_string_lossy())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {}: {source}", path.to_string_lossy())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{} could not be decoded with any known encoding", .0.to_string_lossy())]
    Undecodable(PathBuf),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceEncoding {
    Utf8,
    Utf16Le,
    Utf16Be,
    Windows1252,
}

impl fmt::Display for SourceEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SourceEncoding::Utf8 => "utf-8",
            SourceEncoding::Utf16Le => "utf-16-le",
            SourceEncoding::Utf16Be => "utf-16-be",
            SourceEncoding::Windows1252 => "windows-1252",
        };
        f.write_str(name)
    }
}

type Decoder = fn(&[u8]) -> Option<String>;

/// Decoders in the order they are tried
const DECODERS: &[(SourceEncoding, Decoder)] = &[
    (SourceEncoding::Utf8, decode_utf8),
    (SourceEncoding::Utf16Le, decode_utf16le),
    (SourceEncoding::Utf16Be, decode_utf16be),
    (SourceEncoding::Windows1252, decode_windows1252),
];

fn decode_utf8(bytes: &[u8]) -> Option<String> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    String::from_utf8(bytes.to_vec()).ok()
}

/// Share of zero bytes at odd (`offset` 1) or even (`offset` 0) positions
fn zero_share(bytes: &[u8], offset: usize) -> f64 {
    let total = bytes.iter().skip(offset).step_by(2).count();
    if total == 0 {
        return 0.0;
    }
    let zeros = bytes.iter().skip(offset).step_by(2).filter(|b| **b == 0).count();
    zeros as f64 / total as f64
}

fn decode_utf16(
    bytes: &[u8],
    bom: &[u8],
    zeros_at: usize,
    unit: fn([u8; 2]) -> u16,
) -> Option<String> {
    let body = match bytes.strip_prefix(bom) {
        Some(body) => body,
        None if bytes.len() > 10 && zero_share(bytes, zeros_at) > 0.3 => bytes,
        None => return None,
    };
    if body.len() % 2 != 0 {
        return None;
    }
    let units = body.chunks_exact(2).map(|c| unit([c[0], c[1]]));
    char::decode_utf16(units).collect::<Result<String, _>>().ok()
}

fn decode_utf16le(bytes: &[u8]) -> Option<String> {
    decode_utf16(bytes, b"\xFF\xFE", 1, u16::from_le_bytes)
}

fn decode_utf16be(bytes: &[u8]) -> Option<String> {
    decode_utf16(bytes, b"\xFE\xFF", 0, u16::from_be_bytes)
}

/// Characters of 0x80..=0x9F; bytes Windows-1252 leaves undefined map to the
/// matching C1 control like Latin-1.
const WINDOWS_1252_HIGH: [char; 32] = [
    '\u{20AC}', '\u{81}', '\u{201A}', '\u{0192}', '\u{201E}', '\u{2026}', '\u{2020}', '\u{2021}',
    '\u{02C6}', '\u{2030}', '\u{0160}', '\u{2039}', '\u{0152}', '\u{8D}', '\u{017D}', '\u{8F}',
    '\u{90}', '\u{2018}', '\u{2019}', '\u{201C}', '\u{201D}', '\u{2022}', '\u{2013}', '\u{2014}',
    '\u{02DC}', '\u{2122}', '\u{0161}', '\u{203A}', '\u{0153}', '\u{9D}', '\u{017E}', '\u{0178}',
];

fn decode_windows1252(bytes: &[u8]) -> Option<String> {
    Some(
        bytes
            .iter()
            .map(|&b| match b {
                0x80..=0x9F => WINDOWS_1252_HIGH[(b - 0x80) as usize],
                _ => char::from(b),
            })
            .collect(),
    )
}

/// Runs the decoder chain, stopping at the first success
pub fn decode(bytes: &[u8]) -> Option<(SourceEncoding, String)> {
    DECODERS.iter().find_map(|(encoding, decoder)| {
        let text = decoder(bytes);
        if text.is_none() {
            debug!("not {encoding}");
        }
        text.map(|t| (*encoding, t))
    })
}

/// Normalizes line endings, drops NULs and BOMs, folds typographic
/// punctuation to ASCII and collapses long runs of blank lines.
pub fn clean_text(text: &str) -> String {
    let text = text
        .trim_start_matches('\u{FEFF}')
        .replace('\0', "")
        .replace("\r\n", "\n")
        .replace('\r', "\n");
    let text = fold_to_ascii(&text);
    EXCESS_NEWLINES.replace_all(&text, "\n\n\n").into_owned()
}

#[derive(Debug, PartialEq, Eq)]
pub enum RepairOutcome {
    AlreadyClean,
    Rewritten(SourceEncoding),
}

pub fn repair_file(path: &Path) -> Result<RepairOutcome, RepairError> {
    let bytes = std::fs::read(path).map_err(|source| RepairError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let (encoding, text) =
        decode(&bytes).ok_or_else(|| RepairError::Undecodable(path.to_path_buf()))?;
    let cleaned = clean_text(&text);

    if cleaned.as_bytes() == bytes.as_slice() {
        debug!("{} is already clean UTF-8", path.to_string_lossy());
        return Ok(RepairOutcome::AlreadyClean);
    }

    std::fs::write(path, cleaned).map_err(|source| RepairError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    info!(
        "converted {} from {encoding} to clean UTF-8",
        path.to_string_lossy()
    );
    Ok(RepairOutcome::Rewritten(encoding))
}
