use super::{Error, Result};
use crate::compression::Compression;
use std::fmt;

/// A file stored in an archive.
///
/// Paths use `\` as the separator. Any `/` passed to [`XbFile::new()`] is converted.
#[derive(Clone, PartialEq, Eq)]
pub struct XbFile {
    path: String,
    data: Vec<u8>,
    compression: Compression,
}

impl XbFile {
    /// Creates a new file which will be stored using `compression`. The data must not be empty.
    pub fn new(
        path: impl Into<String>,
        data: impl Into<Vec<u8>>,
        compression: Compression,
    ) -> Result<Self> {
        let path = normalize_path(&path.into());
        if path.is_empty() || path.contains('\0') {
            return Err(Error::InvalidPath(path));
        }
        let data = data.into();
        if data.is_empty() {
            return Err(Error::EmptyFile(path));
        }
        Ok(Self { path, data, compression })
    }

    /// Creates a file from data which was already validated by the archive reader.
    pub(super) fn from_archive(path: String, data: Vec<u8>, compression: Compression) -> Self {
        Self { path, data, compression }
    }

    /// The file's path inside the archive.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The file's decompressed contents.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// The compression method used to store the file.
    pub fn compression(&self) -> Compression {
        self.compression
    }

    /// The length of the decompressed data.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Always `false`, files cannot be empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Consumes the file and returns its data.
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }
}

impl fmt::Debug for XbFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("XbFile")
            .field("path", &self.path)
            .field("data", &format_args!("[{} bytes]", self.data.len()))
            .field("compression", &self.compression)
            .finish()
    }
}

/// Converts forward slashes in `path` to backslashes.
pub(super) fn normalize_path(path: &str) -> String {
    path.replace('/', "\\")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_file() -> Result<()> {
        let file = XbFile::new("data/ui/logo.bin", b"abc".to_vec(), Compression::Lzs)?;
        assert_eq!(file.path(), "data\\ui\\logo.bin");
        assert_eq!(file.data(), b"abc");
        assert_eq!(file.compression(), Compression::Lzs);
        assert_eq!(file.len(), 3);
        Ok(())
    }

    #[test]
    fn test_empty_file() {
        let result = XbFile::new("empty.bin", vec![], Compression::None);
        assert!(matches!(result, Err(Error::EmptyFile(p)) if p == "empty.bin"));
    }

    #[test]
    fn test_invalid_path() {
        assert!(matches!(
            XbFile::new("", b"x".to_vec(), Compression::None),
            Err(Error::InvalidPath(_))
        ));
        assert!(matches!(
            XbFile::new("a\0b", b"x".to_vec(), Compression::None),
            Err(Error::InvalidPath(_))
        ));
    }

    #[test]
    fn test_debug_omits_data() {
        let file = XbFile::new("a", vec![1u8; 100], Compression::None).unwrap();
        let debug = format!("{:?}", file);
        assert!(debug.contains("[100 bytes]"));
    }
}
