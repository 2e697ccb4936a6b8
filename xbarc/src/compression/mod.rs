pub mod deflate;
pub mod huffman;
pub mod lzs;

use crate::common::Endian;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// The result type for compression operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The error type for compression operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    #[error("{0} compression is not supported")]
    Unsupported(Compression),

    #[error("invalid decompressed size: {0:#x}")]
    InvalidSize(u32),

    #[error("back-reference distance {distance:#x} is out of range at {offset:#x}")]
    InvalidDistance { distance: usize, offset: usize },

    #[error("decompressed data overruns the declared size of {0:#x}")]
    OutputOverrun(usize),

    #[error("compressed data ended unexpectedly")]
    UnexpectedEof,

    #[error("Huffman code table is malformed")]
    MalformedTable,

    #[error("Huffman code {0:#05x} has no table entry")]
    UnpopulatedSlot(usize),

    #[error("invalid LZS block header: decompressed={0:#x} compressed={1:#x}")]
    InvalidBlockHeader(u32, u32),
}

/// Compression methods which can be applied to an archived file.
/// The discriminants are the tags stored in the high nibble of a file's packed offset.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum Compression {
    /// Huffman over LZS
    Deflate = 0,
    Huffman = 1,
    Lzs = 2,
    None = 3,
}

impl Compression {
    /// Returns whether data can be compressed with this method.
    pub fn can_compress(self) -> bool {
        matches!(self, Self::None | Self::Lzs)
    }

    /// Returns whether archived data with this method is prefixed by a size header.
    pub fn has_header(self) -> bool {
        self != Self::None
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Deflate => "deflate",
            Self::Huffman => "huffman",
            Self::Lzs => "lzs",
            Self::None => "none",
        }
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The error returned when a compression name cannot be parsed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unrecognized compression: {0:?}")]
pub struct ParseCompressionError(pub String);

impl FromStr for Compression {
    type Err = ParseCompressionError;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "deflate" => Ok(Self::Deflate),
            "huffman" => Ok(Self::Huffman),
            "lzs" | "lz" => Ok(Self::Lzs),
            "none" => Ok(Self::None),
            _ => Err(ParseCompressionError(s.to_owned())),
        }
    }
}

/// Compresses `data` with `method`. The result does not include a size header.
pub fn compress(method: Compression, data: &[u8], endian: Endian) -> Result<Vec<u8>> {
    match method {
        Compression::None => Ok(data.to_vec()),
        Compression::Lzs => Ok(lzs::compress(data)),
        Compression::Huffman => huffman::compress(data),
        Compression::Deflate => deflate::compress(data, endian),
    }
}

/// Decompresses `src` with `method`, producing exactly `size` bytes.
pub fn decompress(method: Compression, src: &[u8], size: usize, endian: Endian) -> Result<Vec<u8>> {
    match method {
        Compression::None => match src.get(..size) {
            Some(data) => Ok(data.to_vec()),
            None => Err(Error::UnexpectedEof),
        },
        Compression::Lzs => lzs::decompress(src, size),
        Compression::Huffman => huffman::decompress(src, size, endian),
        Compression::Deflate => deflate::decompress(src, size, endian),
    }
}
