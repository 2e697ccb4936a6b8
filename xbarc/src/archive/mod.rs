//! Reading and writing XB archives.
//!
//! An XB archive is laid out as:
//!
//! ```text
//! signature          4 bytes
//! file count         u32
//! FST                file count * { decompressed length: u32, packed tag and offset: u32 }
//! string table       { decompressed size: u32, compressed size: u32 } + LZS or raw records
//! file data          each file's payload, 4-byte aligned, compressed payloads prefixed
//!                    with { decompressed size: u32, compressed size: u32 }
//! ```
//!
//! All integers use the byte order of the title the archive belongs to.

mod builder;
mod file;
mod handle;
mod reader;

pub mod fst;
pub mod string_table;
pub mod variant;

pub use builder::ArchiveBuilder;
pub use file::XbFile;
pub use fst::FstEntry;
pub use handle::{Archive, OpenMode};
pub use reader::ArchiveReader;
pub use string_table::{path_hash, StringTable};
pub use variant::{Game, PathTransform, StringTableLayout, Variant};

use crate::common::{Endian, ReadEndianExt, ReadFrom, WriteEndianExt, WriteTo};
use crate::compression;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use thiserror::Error;

/// The magic bytes at the start of every archive.
pub const SIGNATURE: [u8; 4] = [0x78, 0x65, 0x00, 0x01];

/// The size of the archive header.
const HEADER_SIZE: u64 = 8;
/// The size of a `{ decompressed size, compressed size }` block header.
const BLOCK_HEADER_SIZE: u64 = 8;
/// File data and the string table are aligned to this boundary.
const DATA_ALIGN: u64 = 4;

/// The result type for archive operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The error type for archive operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error("invalid archive open mode: {0:?}")]
    InvalidOpenMode(String),

    #[error("unrecognized compression tag: {0}")]
    UnrecognizedCompression(u8),

    #[error("offset is not 4-byte aligned: {0:#x}")]
    MisalignedOffset(u64),

    #[error("file has no data: {0:?}")]
    EmptyFile(String),

    #[error("invalid file path: {0:?}")]
    InvalidPath(String),

    #[error("path is too long to be stored in an archive: {0:?}")]
    PathTooLong(String),

    #[error("path is unsafe to extract: {0:?}")]
    UnsafePath(String),

    #[error("archive does not exist: {}", .0.display())]
    ArchiveNotFound(PathBuf),

    #[error("archive already exists: {}", .0.display())]
    ArchiveExists(PathBuf),

    #[error("file does not exist: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("not an XB archive")]
    NotAnArchive,

    #[error("archive is corrupt: {0}")]
    BadArchive(Box<Corruption>),

    #[error("file data is too large: offset {0:#x} does not fit in 28 bits")]
    Capacity(u64),

    #[error("archive is closed")]
    Closed,

    #[error("archive is not open for writing")]
    NotWritable,

    #[error("unrecognized game: {0:?}")]
    UnrecognizedGame(String),

    #[error("{0} archives are not supported")]
    UnsupportedGame(Game),

    #[error(transparent)]
    Compression(Box<compression::Error>),

    #[error(transparent)]
    Io(Box<io::Error>),
}

from_error_boxed!(Error::BadArchive, Corruption);
from_error_boxed!(Error::Compression, compression::Error);
from_error_boxed!(Error::Io, io::Error);

/// Describes why an archive failed to parse.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Corruption {
    #[error("file {index} offset {offset:#x} is beyond the end of the archive ({len:#x})")]
    OffsetOutOfRange { index: usize, offset: u64, len: u64 },

    #[error("file {index} has unrecognized compression tag {tag}")]
    UnrecognizedCompression { index: usize, tag: u8 },

    #[error("string table has {strings} entries but the FST has {files}")]
    CountMismatch { files: usize, strings: usize },

    #[error("string table entry {index} has length {expected} but the string has {actual}")]
    LengthMismatch { index: usize, expected: u8, actual: usize },

    #[error("string table entry {index} has hash {expected:#04x} but hashes to {actual:#04x}")]
    HashMismatch { index: usize, expected: u8, actual: u8 },

    #[error("string table entry {0} is not valid UTF-8")]
    InvalidUtf8(usize),

    #[error("string table is stored without compression")]
    UncompressedStringTable,

    #[error("string table could not be decompressed: {0}")]
    StringTableData(compression::Error),

    #[error(
        "file {index} has an invalid block header: \
         decompressed={decompressed:#x} compressed={compressed:#x}"
    )]
    InvalidBlockHeader { index: usize, decompressed: u32, compressed: u32 },

    #[error("file {index} could not be decompressed: {source}")]
    FileData { index: usize, source: compression::Error },

    #[error("file {index} decompressed to {actual:#x} bytes but {expected:#x} were expected")]
    SizeMismatch { index: usize, expected: u32, actual: usize },

    #[error("file {0} is empty")]
    EmptyFile(usize),

    #[error("archive data ended unexpectedly")]
    Truncated,
}

/// The archive header.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
struct Header {
    file_count: u32,
}

impl<R: Read + ?Sized> ReadFrom<R> for Header {
    type Error = Error;
    fn read_from(reader: &mut R, endian: Endian) -> Result<Self> {
        let mut signature = [0u8; 4];
        match reader.read_exact(&mut signature) {
            Ok(()) => (),
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Err(Error::NotAnArchive),
            Err(e) => return Err(e.into()),
        }
        if signature != SIGNATURE {
            return Err(Error::NotAnArchive);
        }
        Ok(Self { file_count: reader.read_u32_in(endian)? })
    }
}

impl<W: Write + ?Sized> WriteTo<W> for Header {
    type Error = Error;
    fn write_to(&self, writer: &mut W, endian: Endian) -> Result<()> {
        writer.write_all(&SIGNATURE)?;
        writer.write_u32_in(endian, self.file_count)?;
        Ok(())
    }
}

/// A `{ decompressed size, compressed size }` pair which precedes compressed data.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
struct BlockHeader {
    decompressed_size: u32,
    compressed_size: u32,
}

impl<R: Read + ?Sized> ReadFrom<R> for BlockHeader {
    type Error = Error;
    fn read_from(reader: &mut R, endian: Endian) -> Result<Self> {
        Ok(Self {
            decompressed_size: reader.read_u32_in(endian)?,
            compressed_size: reader.read_u32_in(endian)?,
        })
    }
}

impl<W: Write + ?Sized> WriteTo<W> for BlockHeader {
    type Error = Error;
    fn write_to(&self, writer: &mut W, endian: Endian) -> Result<()> {
        writer.write_u32_in(endian, self.decompressed_size)?;
        writer.write_u32_in(endian, self.compressed_size)?;
        Ok(())
    }
}
