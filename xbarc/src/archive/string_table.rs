//! The table of archive paths.
//!
//! Each record is `{ length: u8, hash: u8, path: [u8], 0 }` where `length` counts the characters
//! in the path and `hash` is [`path_hash()`] of the path. Records appear in FST order.

use super::{Corruption, Error, Result};
use crate::common::io::{read_cstring, write_cstring};
use std::convert::TryFrom;
use std::io::{self, Cursor};

/// Computes the integrity hash of a path. The hash starts at 0 and, for each character, is rotated
/// left by one bit and XOR'd with the low byte of the character's code point.
pub fn path_hash(path: &str) -> u8 {
    path.chars().fold(0, |hash: u8, c| hash.rotate_left(1) ^ (u32::from(c) as u8))
}

/// The paths of every file in an archive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StringTable {
    paths: Vec<String>,
}

impl StringTable {
    /// Constructs an empty `StringTable`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a decompressed string table, verifying each record's length and hash.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut reader = Cursor::new(bytes);
        let mut paths = vec![];
        while (reader.position() as usize) < bytes.len() {
            let index = paths.len();
            let mut header = [0u8; 2];
            read_record(|| io::Read::read_exact(&mut reader, &mut header))?;
            let [expected_len, expected_hash] = header;
            let raw = read_record(|| read_cstring(&mut reader))?;
            let path = String::from_utf8(raw).map_err(|_| Corruption::InvalidUtf8(index))?;

            let actual_len = path.chars().count();
            if actual_len != usize::from(expected_len) {
                return Err(Corruption::LengthMismatch {
                    index,
                    expected: expected_len,
                    actual: actual_len,
                }
                .into());
            }
            let actual_hash = path_hash(&path);
            if actual_hash != expected_hash {
                return Err(Corruption::HashMismatch {
                    index,
                    expected: expected_hash,
                    actual: actual_hash,
                }
                .into());
            }
            paths.push(path);
        }
        Ok(Self { paths })
    }

    /// Serializes the table. Fails if a path has more than 255 characters.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut bytes = vec![];
        for path in &self.paths {
            let len = u8::try_from(path.chars().count())
                .map_err(|_| Error::PathTooLong(path.clone()))?;
            bytes.extend([len, path_hash(path)]);
            write_cstring(&mut bytes, path.as_bytes())
                .map_err(|_| Error::InvalidPath(path.clone()))?;
        }
        Ok(bytes)
    }

    /// Adds a path to the end of the table.
    pub fn push(&mut self, path: impl Into<String>) {
        self.paths.push(path.into());
    }

    /// Returns the paths in the table.
    pub fn paths(&self) -> &[String] {
        &self.paths
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn into_paths(self) -> Vec<String> {
        self.paths
    }
}

impl<S: Into<String>> FromIterator<S> for StringTable {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self { paths: iter.into_iter().map(Into::into).collect() }
    }
}

/// Runs a record read, treating a premature end of the table as corruption.
fn read_record<T>(read: impl FnOnce() -> io::Result<T>) -> Result<T> {
    read().map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => Corruption::Truncated.into(),
        _ => e.into(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_hash() {
        assert_eq!(path_hash(""), 0);
        assert_eq!(path_hash("a"), 0x61);
        assert_eq!(path_hash("abc"), 0x22);
        assert_eq!(path_hash("..\\data\\a.bin"), path_hash("..\\data\\a.bin"));
        assert_ne!(path_hash("ab"), path_hash("ba"));
    }

    #[test]
    fn test_to_bytes() -> Result<()> {
        let table: StringTable = ["abc", "d"].into_iter().collect();
        let bytes = table.to_bytes()?;
        assert_eq!(bytes, &[3, 0x22, b'a', b'b', b'c', 0, 1, b'd', b'd', 0]);
        Ok(())
    }

    #[test]
    fn test_from_bytes() -> Result<()> {
        let table: StringTable = ["..\\x\\y.bin", "\u{e9}t\u{e9}", "z"].into_iter().collect();
        let parsed = StringTable::from_bytes(&table.to_bytes()?)?;
        assert_eq!(parsed, table);
        assert_eq!(parsed.len(), 3);
        assert!(StringTable::from_bytes(&[])?.is_empty());
        Ok(())
    }

    #[test]
    fn test_non_ascii_length_counts_chars() -> Result<()> {
        let table: StringTable = ["\u{e9}"].into_iter().collect();
        let bytes = table.to_bytes()?;
        assert_eq!(bytes[0], 1);
        assert_eq!(bytes[1], 0xe9);
        Ok(())
    }

    #[test]
    fn test_hash_mismatch() -> Result<()> {
        let table: StringTable = ["abc", "def"].into_iter().collect();
        let mut bytes = table.to_bytes()?;
        bytes[6 + 1] ^= 0x01;
        let result = StringTable::from_bytes(&bytes);
        assert!(matches!(
            result,
            Err(Error::BadArchive(c)) if matches!(*c, Corruption::HashMismatch { index: 1, .. })
        ));
        Ok(())
    }

    #[test]
    fn test_length_mismatch() -> Result<()> {
        let mut bytes = StringTable::from_iter(["abc"]).to_bytes()?;
        bytes[0] = 4;
        let result = StringTable::from_bytes(&bytes);
        assert!(matches!(
            result,
            Err(Error::BadArchive(c))
                if matches!(*c, Corruption::LengthMismatch { index: 0, expected: 4, actual: 3 })
        ));
        Ok(())
    }

    #[test]
    fn test_truncated() -> Result<()> {
        let bytes = StringTable::from_iter(["abc"]).to_bytes()?;
        for len in 1..bytes.len() {
            let result = StringTable::from_bytes(&bytes[..len]);
            assert!(matches!(
                result,
                Err(Error::BadArchive(c)) if matches!(*c, Corruption::Truncated)
            ));
        }
        Ok(())
    }

    #[test]
    fn test_invalid_utf8() {
        let result = StringTable::from_bytes(&[1, 0xff, 0xff, 0]);
        assert!(matches!(
            result,
            Err(Error::BadArchive(c)) if matches!(*c, Corruption::InvalidUtf8(0))
        ));
    }

    #[test]
    fn test_path_too_long() {
        let table: StringTable = ["a".repeat(256)].into_iter().collect();
        assert!(matches!(table.to_bytes(), Err(Error::PathTooLong(_))));
        let table: StringTable = ["a".repeat(255)].into_iter().collect();
        assert!(table.to_bytes().is_ok());
    }
}
