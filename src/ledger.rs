use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::vdf::{self, IndexPolicy, Shortcut};

/// Ledger bytes as read from disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Loaded {
    pub bytes: Vec<u8>,
    /// The file did not exist and `bytes` is a fresh header-only ledger.
    pub created: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Appended {
    pub index: u32,
    pub bytes: Vec<u8>,
}

/// Case-sensitive substring test of the name's UTF-8 bytes.
pub fn duplicate_exists(ledger: &[u8], name: &str) -> bool {
    let needle = name.as_bytes();
    let exists = needle.is_empty() || ledger.windows(needle.len()).any(|w| w == needle);
    if exists {
        info!("The game '{}' already exists in the shortcuts file.", name);
    }
    exists
}

/// Returns a copy of `ledger` with one more entry.
///
/// Empty input is treated as a header-only ledger. The `shortcuts` block and
/// document closers are cut off and the new entry, which carries its own
/// closers, is spliced in after the last existing entry.
pub fn append_entry(ledger: &[u8], shortcut: &Shortcut, policy: IndexPolicy) -> Result<Appended> {
    let mut bytes = if ledger.is_empty() {
        vdf::HEADER.to_vec()
    } else {
        ledger.to_vec()
    };

    let document = vdf::decode(&bytes)?;
    let index = vdf::next_index(&document.indices(), policy)?;
    let entry = vdf::encode_entry(index, shortcut)?;

    bytes.truncate(document.body_end);
    bytes.extend_from_slice(&entry);
    debug!(
        existing = document.entries.len(),
        index, "spliced new shortcut entry"
    );

    info!(
        "Added new non-Steam game entry for '{}' with index {}.",
        shortcut.app_name, index
    );
    Ok(Appended { index, bytes })
}

pub fn load_or_create(path: &Path) -> Result<Loaded> {
    match fs::read(path) {
        Ok(bytes) => Ok(Loaded {
            bytes,
            created: false,
        }),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            info!("Shortcuts file {} not found, creating a new one.", path.display());
            Ok(Loaded {
                bytes: empty(),
                created: true,
            })
        }
        Err(e) => Err(Error::io(path, e)),
    }
}

/// A header-only ledger.
pub fn empty() -> Vec<u8> {
    vdf::HEADER.to_vec()
}

pub fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".bak");
    path.with_file_name(name)
}

/// Copies an existing ledger next to itself as `<name>.bak`.
pub fn backup(path: &Path) -> Result<Option<PathBuf>> {
    if !path.exists() {
        return Ok(None);
    }
    let target = backup_path(path);
    fs::copy(path, &target).map_err(|e| Error::io(&target, e))?;
    debug!("Backed up {} to {}", path.display(), target.display());
    Ok(Some(target))
}

pub fn store(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }
    fs::write(path, bytes).map_err(|e| Error::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vdf::{decode, DecodedEntry, Field};
    use tempfile::TempDir;

    fn half_life() -> Shortcut {
        Shortcut::new("Half-Life 2", r"C:\hl2\hl2.exe", r"C:\hl2")
    }

    fn portal() -> Shortcut {
        Shortcut::new("Portal", r"C:\portal\portal.exe", r"C:\portal")
    }

    fn contains(haystack: &[u8], needle: &[u8]) -> bool {
        haystack.windows(needle.len()).any(|w| w == needle)
    }

    fn entries(bytes: &[u8]) -> Vec<DecodedEntry> {
        decode(bytes).unwrap().entries
    }

    #[test]
    fn test_append_to_empty_bytes() {
        let appended = append_entry(b"", &half_life(), IndexPolicy::FirstGap).unwrap();
        assert_eq!(appended.index, 0);
        assert!(appended.bytes.starts_with(vdf::HEADER));
        assert!(appended.bytes[vdf::HEADER.len()..].starts_with(b"\x000\x00"));

        let entries = entries(&appended.bytes);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].index(), Some(0));
        assert_eq!(entries[0].text("AppName"), Some("Half-Life 2"));
        assert_eq!(entries[0].text("Exe"), Some("\"C:\\hl2\\hl2.exe\""));
    }

    #[test]
    fn test_second_entry_leaves_first_untouched() {
        let first = append_entry(b"", &half_life(), IndexPolicy::FirstGap).unwrap();
        let second = append_entry(&first.bytes, &portal(), IndexPolicy::FirstGap).unwrap();
        assert_eq!(second.index, 1);

        let before = entries(&first.bytes);
        let after = entries(&second.bytes);
        assert_eq!(after.len(), 2);
        assert_eq!(after[0].index(), Some(0));
        assert_eq!(after[1].index(), Some(1));
        assert_eq!(after[1].text("AppName"), Some("Portal"));

        assert_eq!(before[0].span, after[0].span);
        assert_eq!(
            first.bytes[before[0].span.clone()],
            second.bytes[after[0].span.clone()]
        );
        assert_eq!(before[0].fields, after[0].fields);
    }

    #[test]
    fn test_matches_reference_byte_layout() {
        let first = append_entry(b"", &half_life(), IndexPolicy::FirstGap).unwrap();
        let second = append_entry(&first.bytes, &portal(), IndexPolicy::FirstGap).unwrap();

        // Trailing closers stripped, previous entry re-closed, then the new entry.
        let mut expected = first.bytes.clone();
        while expected.last() == Some(&vdf::BLOCK_END) {
            expected.pop();
        }
        expected.extend_from_slice(b"\x08\x08");
        expected.extend_from_slice(&vdf::encode_entry(1, &portal()).unwrap());
        assert_eq!(second.bytes, expected);
    }

    #[test]
    fn test_duplicate_check() {
        let first = append_entry(b"", &half_life(), IndexPolicy::FirstGap).unwrap();
        let ledger = append_entry(&first.bytes, &portal(), IndexPolicy::FirstGap)
            .unwrap()
            .bytes;

        assert!(duplicate_exists(&ledger, "Half-Life 2"));
        assert!(duplicate_exists(&ledger, "Portal"));
        assert!(!duplicate_exists(&ledger, "Portal 2"));
        assert!(!duplicate_exists(&ledger, "half-life 2"));
        assert!(!duplicate_exists(vdf::HEADER, "Portal"));
    }

    #[test]
    fn test_sequential_indices() {
        let mut ledger = Vec::new();
        for k in 0..12u32 {
            let shortcut = Shortcut::new(format!("Game {k:02}"), "/bin/game", "/games");
            let appended = append_entry(&ledger, &shortcut, IndexPolicy::FirstGap).unwrap();
            assert_eq!(appended.index, k);

            // Earlier entries keep their offsets, bytes and fields.
            let before = entries(&ledger);
            let after = entries(&appended.bytes);
            assert_eq!(after.len(), before.len() + 1);
            for (old, new) in before.iter().zip(&after) {
                assert_eq!(old.span, new.span);
                assert_eq!(
                    ledger[old.span.clone()],
                    appended.bytes[new.span.clone()]
                );
                assert_eq!(old.fields, new.fields);
            }
            ledger = appended.bytes;
        }

        let indices: Vec<_> = entries(&ledger).iter().map(|e| e.index()).collect();
        let expected: Vec<_> = (0..12u32).map(Some).collect();
        assert_eq!(indices, expected);
    }

    #[test]
    fn test_quoted_fields_are_contiguous() {
        let shortcut = half_life().with_icon(r"C:\hl2\hl2.ico");
        let bytes = append_entry(b"", &shortcut, IndexPolicy::FirstGap)
            .unwrap()
            .bytes;
        assert!(contains(&bytes, b"Half-Life 2"));
        assert!(contains(&bytes, b"\"C:\\hl2\\hl2.exe\""));
        assert!(contains(&bytes, b"\"C:\\hl2\\hl2.ico\""));
    }

    #[test]
    fn test_gapped_ledger_under_both_policies() {
        // Entries 0, 1 and 3 are present.
        let mut ledger = vdf::HEADER.to_vec();
        for (key, name) in [("0", "A"), ("1", "B"), ("3", "D")] {
            ledger.extend_from_slice(
                &vdf::encode(&[
                    Field::Block(key),
                    Field::Str("AppName", name),
                    Field::End,
                ])
                .unwrap(),
            );
        }
        ledger.extend_from_slice(b"\x08\x08");
        let shortcut = Shortcut::new("E", "/e", "/");

        let filled = append_entry(&ledger, &shortcut, IndexPolicy::FirstGap).unwrap();
        assert_eq!(filled.index, 2);
        let after_max = append_entry(&ledger, &shortcut, IndexPolicy::AfterMax).unwrap();
        assert_eq!(after_max.index, 4);

        for appended in [filled, after_max] {
            let entries = entries(&appended.bytes);
            assert_eq!(entries.len(), 4);
            assert_eq!(entries[3].text("AppName"), Some("E"));
            assert_eq!(entries[2].text("AppName"), Some("D"));
        }
    }

    #[test]
    fn test_missing_first_index_still_closes_previous_entry() {
        let mut ledger = vdf::HEADER.to_vec();
        ledger.extend_from_slice(b"\x001\x00\x01AppName\x00B\x00\x00tags\x00\x08\x08\x08\x08");

        let appended = append_entry(&ledger, &portal(), IndexPolicy::FirstGap).unwrap();
        assert_eq!(appended.index, 0);
        let entries = entries(&appended.bytes);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].text("AppName"), Some("B"));
        assert_eq!(entries[1].index(), Some(0));
    }

    #[test]
    fn test_append_rejects_unknown_bytes() {
        let err = append_entry(b"\x01garbage\x00", &portal(), IndexPolicy::FirstGap).unwrap_err();
        assert!(matches!(err, Error::Structural { .. }));
    }

    #[test]
    fn test_append_rejects_reserved_bytes_in_name() {
        let shortcut = Shortcut::new("Bad\0Name", "/bad", "/");
        let err = append_entry(b"", &shortcut, IndexPolicy::FirstGap).unwrap_err();
        assert!(matches!(err, Error::Encoding { .. }));
    }

    #[test]
    fn test_load_or_create() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let dir = TempDir::new()?;
        let path = dir.path().join("shortcuts.vdf");

        let loaded = load_or_create(&path)?;
        assert!(loaded.created);
        assert_eq!(loaded.bytes, vdf::HEADER);
        assert!(!path.exists());

        store(&path, b"\x00shortcuts\x00\x08\x08")?;
        let loaded = load_or_create(&path)?;
        assert!(!loaded.created);
        assert_eq!(loaded.bytes, b"\x00shortcuts\x00\x08\x08");
        Ok(())
    }

    #[test]
    fn test_load_unreadable_path_is_an_error() {
        let dir = TempDir::new().unwrap();
        // A directory cannot be read as a file.
        let err = load_or_create(dir.path()).unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }

    #[test]
    fn test_backup_copies_existing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config").join("shortcuts.vdf");
        assert_eq!(backup(&path).unwrap(), None);

        store(&path, vdf::HEADER).unwrap();
        let target = backup(&path).unwrap().unwrap();
        assert_eq!(target, dir.path().join("config").join("shortcuts.vdf.bak"));
        assert_eq!(fs::read(target).unwrap(), vdf::HEADER);
    }
}
