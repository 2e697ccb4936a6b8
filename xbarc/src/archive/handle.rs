use super::file::normalize_path;
use super::{ArchiveBuilder, ArchiveReader, Error, Result, Variant, XbFile};
use crate::compression::{self, Compression};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, trace, warn};

/// How an archive on disk is opened.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum OpenMode {
    /// Read an existing archive (`"r"`).
    Read,
    /// Create a new archive, replacing any existing file (`"w"`).
    Write,
    /// Create a new archive, failing if the file exists (`"x"`).
    Create,
}

impl OpenMode {
    pub fn is_writable(self) -> bool {
        self != Self::Read
    }
}

impl FromStr for OpenMode {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "r" => Ok(Self::Read),
            "w" => Ok(Self::Write),
            "x" => Ok(Self::Create),
            _ => Err(Error::InvalidOpenMode(s.to_owned())),
        }
    }
}

/// An archive file on disk.
///
/// Opening an archive for reading loads and validates every file up front. Archives opened for
/// writing collect files in memory and are written out by [`Archive::close()`]. An archive which is
/// dropped without being closed is not written.
pub struct Archive {
    path: PathBuf,
    mode: OpenMode,
    variant: Variant,
    files: Vec<XbFile>,
    stream: Option<File>,
}

impl Archive {
    /// Opens the archive at `path` following `variant`'s conventions.
    pub fn open(path: impl AsRef<Path>, mode: OpenMode, variant: Variant) -> Result<Self> {
        let path = path.as_ref();
        let file = match mode {
            OpenMode::Read => File::open(path).map_err(|e| match e.kind() {
                io::ErrorKind::NotFound => Error::ArchiveNotFound(path.to_owned()),
                _ => e.into(),
            })?,
            OpenMode::Write => File::create(path)?,
            OpenMode::Create => {
                OpenOptions::new().write(true).create_new(true).open(path).map_err(|e| {
                    match e.kind() {
                        io::ErrorKind::AlreadyExists => Error::ArchiveExists(path.to_owned()),
                        _ => e.into(),
                    }
                })?
            }
        };

        let (stream, files) = if mode.is_writable() {
            (file, vec![])
        } else {
            let reader = ArchiveReader::open(file, &variant)?;
            (reader.reader, reader.files)
        };
        debug!(
            "Opened {} archive {} ({:?}, {} files)",
            variant.name,
            path.display(),
            mode,
            files.len()
        );
        Ok(Self { path: path.to_owned(), mode, variant, files, stream: Some(stream) })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    pub fn variant(&self) -> &Variant {
        &self.variant
    }

    /// Returns the files in the archive in FST order.
    pub fn files(&self) -> &[XbFile] {
        &self.files
    }

    /// Looks up a file by its archive path.
    pub fn file_at(&self, path: &str) -> Option<&XbFile> {
        let path = normalize_path(path);
        self.files.iter().find(|f| f.path() == path)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Returns whether [`Archive::close()`] has been called.
    pub fn is_closed(&self) -> bool {
        self.stream.is_none()
    }

    /// Reads a file from disk and adds it to the archive. `archive_path` defaults to `local_path`.
    /// Returns `false` if the variant's path transform omitted the file.
    pub fn add_file(
        &mut self,
        local_path: impl AsRef<Path>,
        archive_path: Option<&str>,
        compression: Compression,
    ) -> Result<bool> {
        self.check_writable()?;
        check_compression(compression)?;
        let local_path = local_path.as_ref();
        let data = fs::read(local_path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => Error::FileNotFound(local_path.to_owned()),
            _ => e.into(),
        })?;
        let archive_path = match archive_path {
            Some(path) => path.to_owned(),
            None => local_archive_path(local_path),
        };
        self.add_data(&archive_path, data, compression)
    }

    /// Adds in-memory data to the archive at `path`.
    /// Returns `false` if the variant's path transform omitted the file.
    pub fn add_data(
        &mut self,
        path: &str,
        data: impl Into<Vec<u8>>,
        compression: Compression,
    ) -> Result<bool> {
        self.check_writable()?;
        check_compression(compression)?;
        let Some(path) = (self.variant.on_add)(&normalize_path(path)) else {
            trace!("Skipping {:?}", path);
            return Ok(false);
        };
        trace!("Adding {:?} ({})", path, compression);
        self.files.push(XbFile::new(path, data, compression)?);
        Ok(true)
    }

    /// Adds every file under `dir` in sorted order and returns the number of files added.
    /// Subdirectories are only visited if `recursive` is set.
    ///
    /// Files are stored under `archive_dir`, which defaults to `dir` itself.
    pub fn add_dir(
        &mut self,
        dir: impl AsRef<Path>,
        archive_dir: Option<&str>,
        compression: Compression,
        recursive: bool,
    ) -> Result<usize> {
        self.check_writable()?;
        check_compression(compression)?;
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(Error::FileNotFound(dir.to_owned()));
        }
        let mut paths = vec![];
        collect_files(dir, recursive, &mut paths)?;
        let prefix = match archive_dir {
            Some(prefix) => prefix.to_owned(),
            None => local_archive_path(dir),
        };
        let prefix = prefix.trim_end_matches(|c| c == '\\' || c == '/');
        let mut added = 0;
        for path in paths {
            let relative = path.strip_prefix(dir).unwrap_or(&path).to_string_lossy();
            let archive_path = if prefix.is_empty() {
                relative.into_owned()
            } else {
                format!("{}\\{}", prefix, relative)
            };
            if self.add_file(&path, Some(&archive_path), compression)? {
                added += 1;
            }
        }
        debug!("Added {} files from {}", added, dir.display());
        Ok(added)
    }

    /// Writes `file` under `dest` at the path produced by the variant's extract transform.
    /// Returns the path which was written, or `None` if the transform omitted the file.
    pub fn extract(&self, file: &XbFile, dest: impl AsRef<Path>) -> Result<Option<PathBuf>> {
        self.check_open()?;
        let Some(path) = (self.variant.on_extract)(file.path()) else {
            trace!("Skipping {:?}", file.path());
            return Ok(None);
        };
        let out_path = dest.as_ref().join(safe_relative_path(&path)?);
        trace!("Extracting {:?} to {}", file.path(), out_path.display());
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = File::create(&out_path)?;
        out.write_all(file.data())?;
        out.flush()?;
        Ok(Some(out_path))
    }

    /// Extracts every file in the archive and returns the number of files written.
    pub fn extract_all(&self, dest: impl AsRef<Path>) -> Result<usize> {
        self.extract_files(&self.files, dest)
    }

    /// Extracts a subset of files and returns the number of files written.
    pub fn extract_files<'f>(
        &self,
        files: impl IntoIterator<Item = &'f XbFile>,
        dest: impl AsRef<Path>,
    ) -> Result<usize> {
        self.check_open()?;
        let dest = dest.as_ref();
        let mut extracted = 0;
        for file in files {
            if self.extract(file, dest)?.is_some() {
                extracted += 1;
            }
        }
        debug!("Extracted {} files to {}", extracted, dest.display());
        Ok(extracted)
    }

    /// Closes the archive, writing it out if it was opened for writing. The underlying file is
    /// released even if writing fails. Closing an archive more than once does nothing.
    pub fn close(&mut self) -> Result<()> {
        let Some(mut stream) = self.stream.take() else {
            return Ok(());
        };
        if self.mode.is_writable() {
            debug!("Writing {} files to {}", self.files.len(), self.path.display());
            ArchiveBuilder::new(&self.variant).extend(&self.files).write_to(&mut stream)?;
            stream.sync_all()?;
        }
        Ok(())
    }

    fn check_open(&self) -> Result<()> {
        if self.is_closed() {
            Err(Error::Closed)
        } else {
            Ok(())
        }
    }

    fn check_writable(&self) -> Result<()> {
        self.check_open()?;
        if self.mode.is_writable() {
            Ok(())
        } else {
            Err(Error::NotWritable)
        }
    }
}

impl Drop for Archive {
    fn drop(&mut self) {
        if self.mode.is_writable() && !self.is_closed() {
            warn!("Archive {} was not closed and will not be written", self.path.display());
        }
    }
}

fn check_compression(compression: Compression) -> Result<()> {
    if compression.can_compress() {
        Ok(())
    } else {
        Err(compression::Error::Unsupported(compression).into())
    }
}

/// Converts a local path into a relative archive path, dropping any root and `.` components.
fn local_archive_path(path: &Path) -> String {
    let path = path
        .components()
        .filter(|c| matches!(c, Component::Normal(_) | Component::ParentDir))
        .collect::<PathBuf>();
    path.to_string_lossy().into_owned()
}

/// Recursively lists the files under `dir` in sorted order.
fn collect_files(dir: &Path, recursive: bool, out: &mut Vec<PathBuf>) -> Result<()> {
    let mut entries =
        fs::read_dir(dir)?.map(|e| e.map(|e| e.path())).collect::<io::Result<Vec<_>>>()?;
    entries.sort_unstable();
    for path in entries {
        if path.is_dir() {
            if recursive {
                collect_files(&path, recursive, out)?;
            }
        } else {
            out.push(path);
        }
    }
    Ok(())
}

/// Converts an archive path into a relative filesystem path, rejecting anything which could
/// escape the destination directory.
fn safe_relative_path(path: &str) -> Result<PathBuf> {
    let mut result = PathBuf::new();
    for name in path.split(|c| c == '\\' || c == '/') {
        if name.is_empty() || name == "." || name == ".." || name.contains(':') {
            return Err(Error::UnsafePath(path.to_owned()));
        }
        result.push(name);
    }
    if !result.components().all(|c| matches!(c, Component::Normal(_))) {
        return Err(Error::UnsafePath(path.to_owned()));
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::{Corruption, Game};
    use crate::common::Endian;
    use tempfile::tempdir;

    fn test_variant() -> Variant {
        Variant::new("test", Endian::Big)
    }

    #[test]
    fn test_parse_open_mode() -> Result<()> {
        assert_eq!("r".parse::<OpenMode>()?, OpenMode::Read);
        assert_eq!("w".parse::<OpenMode>()?, OpenMode::Write);
        assert_eq!("x".parse::<OpenMode>()?, OpenMode::Create);
        assert!(matches!("a".parse::<OpenMode>(), Err(Error::InvalidOpenMode(m)) if m == "a"));
        assert!(matches!("rw".parse::<OpenMode>(), Err(Error::InvalidOpenMode(_))));
        Ok(())
    }

    #[test]
    fn test_local_archive_path() {
        let expected = Path::new("data").join("a.bin");
        assert_eq!(local_archive_path(&Path::new(".").join(&expected)), expected.to_string_lossy());
        assert_eq!(local_archive_path(Path::new("a.bin")), "a.bin");
        let rooted = Path::new("/").join(&expected);
        assert_eq!(local_archive_path(&rooted), expected.to_string_lossy());
    }

    #[test]
    fn test_safe_relative_path() -> Result<()> {
        assert_eq!(safe_relative_path("a\\b\\c.bin")?, Path::new("a").join("b").join("c.bin"));
        assert_eq!(safe_relative_path("a/b")?, Path::new("a").join("b"));
        for path in ["..\\a", "a\\..\\..\\b", "\\a", "a\\\\b", ".\\a", "C:\\a", "a\\", ""] {
            assert!(
                matches!(safe_relative_path(path), Err(Error::UnsafePath(_))),
                "{:?} should be unsafe",
                path
            );
        }
        Ok(())
    }

    #[test]
    fn test_write_then_read() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("test.xb");
        let mut archive = Archive::open(&path, OpenMode::Create, test_variant())?;
        assert!(archive.add_data("a/b.bin", b"hello".to_vec(), Compression::Lzs)?);
        assert!(archive.add_data("c.bin", b"world".to_vec(), Compression::None)?);
        archive.close()?;
        archive.close()?;
        assert!(archive.is_closed());

        let archive = Archive::open(&path, OpenMode::Read, test_variant())?;
        let paths = archive.files().iter().map(|f| f.path()).collect::<Vec<_>>();
        assert_eq!(paths, &["a\\b.bin", "c.bin"]);
        assert_eq!(archive.file_at("a/b.bin").map(|f| f.data()), Some(&b"hello"[..]));
        Ok(())
    }

    #[test]
    fn test_open_errors() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("missing.xb");
        assert!(matches!(
            Archive::open(&path, OpenMode::Read, test_variant()),
            Err(Error::ArchiveNotFound(p)) if p == path
        ));

        fs::write(&path, b"not an archive")?;
        assert!(matches!(
            Archive::open(&path, OpenMode::Create, test_variant()),
            Err(Error::ArchiveExists(p)) if p == path
        ));
        assert!(matches!(
            Archive::open(&path, OpenMode::Read, test_variant()),
            Err(Error::NotAnArchive)
        ));
        Ok(())
    }

    #[test]
    fn test_write_mode_truncates() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("test.xb");
        fs::write(&path, vec![0xffu8; 1000])?;
        let mut archive = Archive::open(&path, OpenMode::Write, test_variant())?;
        archive.add_data("a", b"1".to_vec(), Compression::None)?;
        archive.close()?;
        let archive = Archive::open(&path, OpenMode::Read, test_variant())?;
        assert_eq!(archive.len(), 1);
        assert!(fs::metadata(&path)?.len() < 1000);
        Ok(())
    }

    #[test]
    fn test_misuse() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("test.xb");
        let mut archive = Archive::open(&path, OpenMode::Create, test_variant())?;
        assert!(matches!(
            archive.add_data("a", b"1".to_vec(), Compression::Huffman),
            Err(Error::Compression(e))
                if *e == compression::Error::Unsupported(Compression::Huffman)
        ));
        assert!(matches!(
            archive.add_data("a", vec![], Compression::None),
            Err(Error::EmptyFile(_))
        ));
        assert!(matches!(
            archive.add_file(dir.path().join("nope"), None, Compression::None),
            Err(Error::FileNotFound(_))
        ));
        archive.close()?;
        assert!(matches!(
            archive.add_data("a", b"1".to_vec(), Compression::None),
            Err(Error::Closed)
        ));

        let mut archive = Archive::open(&path, OpenMode::Read, test_variant())?;
        assert!(archive.is_empty());
        assert!(matches!(
            archive.add_data("a", b"1".to_vec(), Compression::None),
            Err(Error::NotWritable)
        ));
        archive.close()?;
        assert!(matches!(archive.extract_all(dir.path()), Err(Error::Closed)));
        Ok(())
    }

    #[test]
    fn test_drop_without_close() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("test.xb");
        let mut archive = Archive::open(&path, OpenMode::Create, test_variant())?;
        archive.add_data("a", b"1".to_vec(), Compression::None)?;
        drop(archive);
        assert_eq!(fs::metadata(&path)?.len(), 0);
        Ok(())
    }

    #[test]
    fn test_add_dir_and_extract() -> Result<()> {
        let dir = tempdir()?;
        let src = dir.path().join("src");
        fs::create_dir_all(src.join("sub").join("deeper"))?;
        fs::write(src.join("b.bin"), b"bbb")?;
        fs::write(src.join("a.bin"), b"aaa")?;
        fs::write(src.join("sub").join("c.bin"), b"ccc")?;
        fs::write(src.join("sub").join("deeper").join("d.bin"), b"ddd")?;

        let path = dir.path().join("test.xb");
        let mut archive = Archive::open(&path, OpenMode::Create, Game::Mngp.variant()?)?;
        assert_eq!(archive.add_dir(&src, Some("data"), Compression::Lzs, false)?, 2);
        let sub = src.join("sub");
        assert_eq!(archive.add_dir(sub, Some("data/sub/"), Compression::None, true)?, 2);
        let stored = archive.files().iter().map(|f| f.path()).collect::<Vec<_>>();
        assert_eq!(
            stored,
            &[
                "..\\data\\a.bin",
                "..\\data\\b.bin",
                "..\\data\\sub\\c.bin",
                "..\\data\\sub\\deeper\\d.bin"
            ]
        );
        archive.close()?;

        let archive = Archive::open(&path, OpenMode::Read, Game::Mngp.variant()?)?;
        let out = dir.path().join("out");
        let file = archive.files()[0].clone();
        let written = archive.extract(&file, &out)?.unwrap();
        assert_eq!(written, out.join("data").join("a.bin"));
        assert_eq!(fs::read(&written)?, b"aaa");

        assert_eq!(archive.extract_all(&out)?, 4);
        assert_eq!(fs::read(out.join("data").join("sub").join("deeper").join("d.bin"))?, b"ddd");
        Ok(())
    }

    #[test]
    fn test_extract_rejects_unsafe_paths() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("test.xb");
        let mut archive = Archive::open(&path, OpenMode::Create, test_variant())?;
        archive.add_data("..\\escape.bin", b"x".to_vec(), Compression::None)?;
        archive.close()?;

        let archive = Archive::open(&path, OpenMode::Read, test_variant())?;
        let out = dir.path().join("out");
        assert!(matches!(archive.extract_all(&out), Err(Error::UnsafePath(_))));
        assert!(!dir.path().join("escape.bin").exists());
        Ok(())
    }

    #[test]
    fn test_corrupt_archive_is_bad() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("test.xb");
        let mut archive = Archive::open(&path, OpenMode::Create, test_variant())?;
        archive.add_data("a", b"abc".to_vec(), Compression::None)?;
        archive.close()?;

        let mut bytes = fs::read(&path)?;
        bytes.truncate(bytes.len() - 2);
        fs::write(&path, &bytes)?;
        assert!(matches!(
            Archive::open(&path, OpenMode::Read, test_variant()),
            Err(Error::BadArchive(c)) if matches!(*c, Corruption::Truncated)
        ));
        Ok(())
    }
}
