//! "Deflate" is a Huffman block wrapped around an LZS block. The Huffman stage expands to an
//! LZS block header (decompressed size and compressed size) followed by the LZS stream.

use super::{huffman, lzs, Compression, Error, Result};
use crate::common::{Endian, ReadEndianExt, WriteEndianExt};
use tracing::{instrument, trace};

const BLOCK_HEADER_SIZE: usize = 8;

/// Decompresses a Deflate block in `src`. `size` is the size of the Huffman stage's output, which
/// is the size recorded in the block's own header. The size of the returned data comes from the
/// inner LZS header.
#[instrument(level = "trace", skip_all)]
pub fn decompress(src: &[u8], size: usize, endian: Endian) -> Result<Vec<u8>> {
    let block = huffman::decompress(src, size, endian)?;
    let mut header = block.get(..BLOCK_HEADER_SIZE).ok_or(Error::UnexpectedEof)?;
    let decompressed_size = header.read_u32_in(endian).map_err(|_| Error::UnexpectedEof)?;
    let compressed_size = header.read_u32_in(endian).map_err(|_| Error::UnexpectedEof)?;
    trace!(
        "Inner LZS block: decompressed={:#x} compressed={:#x}",
        decompressed_size,
        compressed_size
    );
    if decompressed_size == 0 || compressed_size == 0 {
        return Err(Error::InvalidBlockHeader(decompressed_size, compressed_size));
    }
    let end = BLOCK_HEADER_SIZE + compressed_size as usize;
    let stream = block.get(BLOCK_HEADER_SIZE..end).ok_or(Error::UnexpectedEof)?;
    lzs::decompress(stream, decompressed_size as usize)
}

/// Compresses `data` with LZS and then Huffman. Because Huffman compression is not implemented,
/// this always fails.
pub fn compress(data: &[u8], endian: Endian) -> Result<Vec<u8>> {
    let stream = lzs::compress(data);
    let mut block = Vec::with_capacity(BLOCK_HEADER_SIZE + stream.len());
    for size in [data.len(), stream.len()] {
        let size = u32::try_from(size).map_err(|_| Error::Unsupported(Compression::Deflate))?;
        block.write_u32_in(endian, size).map_err(|_| Error::Unsupported(Compression::Deflate))?;
    }
    block.extend(stream);
    huffman::compress(&block).map_err(|_| Error::Unsupported(Compression::Deflate))
}
