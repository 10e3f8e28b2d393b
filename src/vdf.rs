//! Binary codec for Steam's `shortcuts.vdf`.
//!
//! The file is a tree of tagged nodes. Every node starts with a kind byte
//! followed by a NUL-terminated name:
//!
//! * `0x00` opens a nested block (the entry index keys and `tags` are blocks)
//! * `0x01` is a string field, its value is NUL-terminated text
//! * `0x02` is a scalar field, its value is a little-endian `u32`
//! * `0x08` closes the innermost open block
//!
//! Only this subset is understood. Anything else is reported as malformed.

use std::collections::BTreeSet;
use std::ops::Range;
use std::path::is_separator;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const TERMINATOR: u8 = 0x00;
pub const STRING: u8 = 0x01;
pub const SCALAR: u8 = 0x02;
pub const BLOCK_END: u8 = 0x08;

/// Every well-formed ledger opens with the `shortcuts` block.
pub const HEADER: &[u8] = b"\x00shortcuts\x00";

/// Deepest block nesting accepted below the `shortcuts` block. Entries
/// only need two levels (the entry and its `tags`).
const MAX_DEPTH: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field<'a> {
    Block(&'a str),
    Str(&'a str, &'a str),
    Scalar(&'a str, u32),
    End,
}

impl Field<'_> {
    fn write_to(&self, out: &mut Vec<u8>) -> Result<()> {
        match *self {
            Field::Block(name) => {
                out.push(TERMINATOR);
                push_text(out, name, name)?;
            }
            Field::Str(name, value) => {
                out.push(STRING);
                push_text(out, name, name)?;
                push_text(out, name, value)?;
            }
            Field::Scalar(name, value) => {
                out.push(SCALAR);
                push_text(out, name, name)?;
                out.extend_from_slice(&value.to_le_bytes());
            }
            Field::End => out.push(BLOCK_END),
        }
        Ok(())
    }
}

fn push_text(out: &mut Vec<u8>, field: &str, text: &str) -> Result<()> {
    if let Some(&byte) = text
        .as_bytes()
        .iter()
        .find(|&&b| b == TERMINATOR || b == BLOCK_END)
    {
        return Err(Error::Encoding {
            field: field.to_string(),
            byte,
        });
    }
    out.extend_from_slice(text.as_bytes());
    out.push(TERMINATOR);
    Ok(())
}

/// Serializes a flat run of fields. All ledger bytes written by this crate
/// are produced here.
pub fn encode(fields: &[Field<'_>]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    for field in fields {
        field.write_to(&mut out)?;
    }
    Ok(out)
}

pub fn has_header(bytes: &[u8]) -> bool {
    bytes.starts_with(HEADER)
}

/// One non-Steam game shortcut as supplied by the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Shortcut {
    pub app_name: String,
    pub exe: String,
    pub start_dir: String,
    pub icon: String,
    pub shortcut_path: String,
}

impl Shortcut {
    pub fn new(
        app_name: impl Into<String>,
        exe: impl Into<String>,
        start_dir: impl Into<String>,
    ) -> Self {
        Shortcut {
            app_name: app_name.into(),
            exe: exe.into(),
            start_dir: start_dir.into(),
            ..Default::default()
        }
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = icon.into();
        self
    }

    pub fn with_shortcut_path(mut self, shortcut_path: impl Into<String>) -> Self {
        self.shortcut_path = shortcut_path.into();
        self
    }
}

fn quoted(value: &str) -> String {
    format!("\"{value}\"")
}

/// Appends the platform separator unless the directory already ends in one.
/// An empty directory stays empty.
fn with_trailing_separator(dir: &str) -> String {
    match dir.chars().last() {
        None => String::new(),
        Some(last) if is_separator(last) => dir.to_string(),
        Some(_) => format!("{dir}{}", std::path::MAIN_SEPARATOR),
    }
}

/// Encodes a complete entry block, closed together with its enclosing
/// `shortcuts` block and the document.
pub fn encode_entry(index: u32, shortcut: &Shortcut) -> Result<Vec<u8>> {
    let index = index.to_string();
    let exe = quoted(&shortcut.exe);
    let start_dir = with_trailing_separator(&shortcut.start_dir);
    let icon = quoted(&shortcut.icon);

    encode(&[
        Field::Block(&index),
        Field::Scalar("appid", 0),
        Field::Str("AppName", &shortcut.app_name),
        Field::Str("Exe", &exe),
        Field::Str("StartDir", &start_dir),
        Field::Str("icon", &icon),
        Field::Str("ShortcutPath", &shortcut.shortcut_path),
        Field::Str("LaunchOptions", ""),
        Field::Scalar("IsHidden", 0),
        Field::Scalar("AllowDesktopConfig", 1),
        Field::Scalar("AllowOverlay", 1),
        Field::Scalar("OpenVR", 0),
        Field::Scalar("Devkit", 0),
        Field::Str("DevkitGameID", ""),
        Field::Scalar("DevkitOverrideAppID", 0),
        Field::Scalar("LastPlayTime", 0),
        Field::Str("FlatpakAppID", ""),
        Field::Block("tags"),
        Field::End, // tags
        Field::End, // entry
        Field::End, // shortcuts
        Field::End, // document
    ])
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Str(String),
    Scalar(u32),
    Block(Vec<(String, Value)>),
}

/// A top-level entry of the `shortcuts` block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedEntry {
    pub key: String,
    /// Byte range of the entry, kind byte through its closing byte.
    pub span: Range<usize>,
    pub fields: Vec<(String, Value)>,
}

impl DecodedEntry {
    /// The numeric index, if the key is a canonical decimal number.
    pub fn index(&self) -> Option<u32> {
        self.key
            .parse::<u32>()
            .ok()
            .filter(|index| index.to_string() == self.key)
    }

    fn value(&self, name: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(field, _)| field.eq_ignore_ascii_case(name))
            .map(|(_, value)| value)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        match self.value(name) {
            Some(Value::Str(text)) => Some(text),
            _ => None,
        }
    }

    pub fn scalar(&self, name: &str) -> Option<u32> {
        match self.value(name) {
            Some(Value::Scalar(value)) => Some(*value),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub entries: Vec<DecodedEntry>,
    /// Offset where the `shortcuts` block closes, or the input length when
    /// the block was left open (a header-only ledger).
    pub body_end: usize,
}

impl Document {
    pub fn indices(&self) -> Vec<u32> {
        self.entries.iter().filter_map(DecodedEntry::index).collect()
    }
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn byte(&mut self) -> Option<u8> {
        let byte = *self.bytes.get(self.pos)?;
        self.pos += 1;
        Some(byte)
    }

    fn text(&mut self) -> Result<String> {
        let rest = &self.bytes[self.pos..];
        let len = rest
            .iter()
            .position(|&b| b == TERMINATOR)
            .ok_or_else(|| Error::structural(self.pos, "unterminated text"))?;
        let text = String::from_utf8_lossy(&rest[..len]).into_owned();
        self.pos += len + 1;
        Ok(text)
    }

    fn scalar(&mut self) -> Result<u32> {
        let raw = self
            .bytes
            .get(self.pos..self.pos + 4)
            .ok_or_else(|| Error::structural(self.pos, "truncated scalar"))?;
        let mut buf = [0u8; 4];
        buf.copy_from_slice(raw);
        self.pos += 4;
        Ok(u32::from_le_bytes(buf))
    }

    /// Reads nodes until the closing byte of the current block.
    fn block(&mut self, depth: usize) -> Result<Vec<(String, Value)>> {
        if depth > MAX_DEPTH {
            return Err(Error::structural(self.pos, "nesting too deep"));
        }
        let mut fields = Vec::new();
        loop {
            let at = self.pos;
            match self.byte() {
                None => return Err(Error::structural(at, "unclosed block")),
                Some(BLOCK_END) => return Ok(fields),
                Some(TERMINATOR) => {
                    let name = self.text()?;
                    let inner = self.block(depth + 1)?;
                    fields.push((name, Value::Block(inner)));
                }
                Some(STRING) => {
                    let name = self.text()?;
                    let value = self.text()?;
                    fields.push((name, Value::Str(value)));
                }
                Some(SCALAR) => {
                    let name = self.text()?;
                    let value = self.scalar()?;
                    fields.push((name, Value::Scalar(value)));
                }
                Some(kind) => {
                    return Err(Error::structural(
                        at,
                        format!("unknown field kind {kind:#04x}"),
                    ))
                }
            }
        }
    }
}

/// Decodes the entries of a ledger in a single forward pass.
///
/// The `shortcuts` block may be left open at end of input; every entry
/// inside it must be closed.
pub fn decode(bytes: &[u8]) -> Result<Document> {
    if !has_header(bytes) {
        return Err(Error::structural(0, "missing shortcuts header"));
    }

    let mut reader = Reader {
        bytes,
        pos: HEADER.len(),
    };
    let mut entries = Vec::new();

    loop {
        let start = reader.pos;
        match reader.byte() {
            None => {
                return Ok(Document {
                    entries,
                    body_end: start,
                })
            }
            Some(BLOCK_END) => {
                // The document closer is optional; nothing may follow it.
                if reader.byte().is_some_and(|b| b != BLOCK_END) || reader.pos < bytes.len() {
                    return Err(Error::structural(
                        reader.pos.min(bytes.len()).saturating_sub(1),
                        "unexpected bytes after the shortcuts block",
                    ));
                }
                return Ok(Document {
                    entries,
                    body_end: start,
                });
            }
            Some(TERMINATOR) => {
                let key = reader.text()?;
                let fields = reader.block(1)?;
                entries.push(DecodedEntry {
                    key,
                    span: start..reader.pos,
                    fields,
                });
            }
            Some(kind) => {
                return Err(Error::structural(
                    start,
                    format!("expected an entry block, found kind {kind:#04x}"),
                ))
            }
        }
    }
}

/// How the index of a new entry is chosen from the existing ones.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum IndexPolicy {
    /// Smallest index not yet taken.
    #[default]
    FirstGap,
    /// One past the highest index taken.
    AfterMax,
}

pub fn next_index(indices: &[u32], policy: IndexPolicy) -> Result<u32> {
    match policy {
        IndexPolicy::FirstGap => {
            let taken: BTreeSet<u32> = indices.iter().copied().collect();
            let mut next = 0;
            while taken.contains(&next) {
                next += 1;
            }
            Ok(next)
        }
        IndexPolicy::AfterMax => match indices.iter().max() {
            None => Ok(0),
            Some(max) => max
                .checked_add(1)
                .ok_or_else(|| Error::InvalidInput("entry index space exhausted".to_string())),
        },
    }
}
