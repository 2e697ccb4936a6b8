use super::fst::{self, FstEntry, FST_ENTRY_SIZE, MAX_PACKED_OFFSET};
use super::{
    ArchiveReader, BlockHeader, Error, Header, Result, StringTable, StringTableLayout, Variant,
    XbFile, BLOCK_HEADER_SIZE, DATA_ALIGN, HEADER_SIZE,
};
use crate::common::io::pad_vec;
use crate::common::{Endian, WriteTo};
use crate::compression::{self, lzs, Compression};
use std::convert::TryFrom;
use std::io::{BufWriter, Read, Seek, SeekFrom, Write};
use tracing::{debug, instrument, trace};

/// A file's data as it will be stored on disk.
struct Block<'f> {
    file: &'f XbFile,
    decompressed_size: u32,
    header: Option<BlockHeader>,
    /// Compressed data padded to `DATA_ALIGN`.
    data: Vec<u8>,
}

impl<'f> Block<'f> {
    fn compress(file: &'f XbFile, endian: Endian) -> Result<Self> {
        let decompressed_size = to_u32(file.len())?;
        let mut data = compression::compress(file.compression(), file.data(), endian)?;
        let header = if file.compression().has_header() {
            Some(BlockHeader { decompressed_size, compressed_size: to_u32(data.len())? })
        } else {
            None
        };
        pad_vec(&mut data, DATA_ALIGN);
        Ok(Self { file, decompressed_size, header, data })
    }

    fn disk_size(&self) -> u64 {
        let header_size = if self.header.is_some() { BLOCK_HEADER_SIZE } else { 0 };
        header_size + self.data.len() as u64
    }
}

/// Builds archive files.
pub struct ArchiveBuilder<'a> {
    variant: Variant,
    /// The files to put in the archive, in FST order.
    files: Vec<&'a XbFile>,
}

impl<'a> ArchiveBuilder<'a> {
    /// Constructs a new `ArchiveBuilder` which writes archives using `variant`'s conventions.
    pub fn new(variant: &Variant) -> Self {
        Self { variant: *variant, files: vec![] }
    }

    /// Constructs a new `ArchiveBuilder` which imports files from `archive`.
    pub fn with_archive<R: Read + Seek>(archive: &'a ArchiveReader<R>, variant: &Variant) -> Self {
        let mut builder = Self::new(variant);
        builder.extend(&archive.files);
        builder
    }

    /// Adds a file to the end of the archive.
    pub fn add(&mut self, file: &'a XbFile) -> &mut Self {
        self.files.push(file);
        self
    }

    /// Adds several files to the end of the archive.
    pub fn extend(&mut self, files: impl IntoIterator<Item = &'a XbFile>) -> &mut Self {
        self.files.extend(files);
        self
    }

    /// Returns the number of files which will be written.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Writes out an archive file.
    ///
    /// Every file is compressed and laid out before anything is written, so a file which cannot
    /// be stored leaves `writer` untouched.
    #[instrument(level = "trace", skip_all)]
    pub fn write_to(&self, mut writer: (impl Write + Seek)) -> Result<()> {
        let endian = self.variant.endian;
        debug!("Writing {} files to a {} archive", self.files.len(), self.variant.name);

        let strings: StringTable = self.files.iter().map(|f| f.path()).collect();
        let (table_header, table_data) =
            encode_string_table(&strings.to_bytes()?, self.variant.string_table)?;

        let blocks =
            self.files.iter().map(|f| Block::compress(f, endian)).collect::<Result<Vec<_>>>()?;
        let data_offset = HEADER_SIZE
            + FST_ENTRY_SIZE * blocks.len() as u64
            + BLOCK_HEADER_SIZE
            + table_data.len() as u64;
        let entries = assign_offsets(
            data_offset,
            blocks.iter().map(|b| (b.decompressed_size, b.file.compression(), b.disk_size())),
        )?;

        writer.seek(SeekFrom::Start(0))?;
        let mut buf = BufWriter::new(&mut writer);
        Header { file_count: to_u32(blocks.len())? }.write_to(&mut buf, endian)?;
        FstEntry::write_all_to(&mut buf, &entries, endian)?;
        table_header.write_to(&mut buf, endian)?;
        buf.write_all(&table_data)?;
        for (block, entry) in blocks.iter().zip(&entries) {
            trace!("Writing archive entry \"{}\" at {:#x}", block.file.path(), entry.offset);
            if let Some(header) = &block.header {
                header.write_to(&mut buf, endian)?;
            }
            buf.write_all(&block.data)?;
        }
        buf.flush()?;
        Ok(())
    }
}

/// Computes the FST entries for files whose stored data starts at `start` and runs back-to-back.
/// Each item is `(decompressed length, compression, stored size)`. Fails with `Capacity` if an
/// offset cannot be packed.
fn assign_offsets(
    start: u64,
    blocks: impl IntoIterator<Item = (u32, Compression, u64)>,
) -> Result<Vec<FstEntry>> {
    let mut offset = start;
    let mut entries = vec![];
    for (len, compression, disk_size) in blocks {
        fst::pack(compression.into(), offset)?;
        entries.push(FstEntry::new(len, compression, offset));
        offset += disk_size;
        if offset / DATA_ALIGN > u64::from(MAX_PACKED_OFFSET) {
            return Err(Error::Capacity(offset));
        }
    }
    Ok(entries)
}

/// Prepares the string table for writing, returning its header and padded data.
fn encode_string_table(bytes: &[u8], layout: StringTableLayout) -> Result<(BlockHeader, Vec<u8>)> {
    if bytes.is_empty() {
        return Ok((BlockHeader { decompressed_size: 0, compressed_size: 0 }, vec![]));
    }
    let decompressed_size = to_u32(bytes.len())?;
    let compressed = lzs::compress(bytes);
    let (compressed_size, mut data) = match layout {
        StringTableLayout::CompressedOrRaw if compressed.len() >= bytes.len() => {
            (0, bytes.to_vec())
        }
        _ => (to_u32(compressed.len())?, compressed),
    };
    trace!("String table: decompressed={:#x} compressed={:#x}", decompressed_size, compressed_size);
    pad_vec(&mut data, DATA_ALIGN);
    Ok((BlockHeader { decompressed_size, compressed_size }, data))
}

fn to_u32(len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| Error::Capacity(len as u64))
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIMIT: u64 = (MAX_PACKED_OFFSET as u64) * 4;

    #[test]
    fn test_assign_offsets() -> Result<()> {
        let entries = assign_offsets(
            0x40,
            [(5, Compression::None, 8), (100, Compression::Lzs, 0x24)],
        )?;
        assert_eq!(
            entries,
            &[
                FstEntry::new(5, Compression::None, 0x40),
                FstEntry::new(100, Compression::Lzs, 0x48),
            ]
        );
        Ok(())
    }

    #[test]
    fn test_assign_offsets_at_limit() -> Result<()> {
        let blocks = [(1, Compression::None, 4), (1, Compression::None, 4)];
        let entries = assign_offsets(LIMIT - 8, blocks)?;
        assert_eq!(entries[1].offset, LIMIT - 4);

        // The last file starts in range but its data ends past the limit
        let result = assign_offsets(LIMIT - 8, [(1, Compression::None, 12)]);
        assert!(matches!(result, Err(Error::Capacity(offset)) if offset == LIMIT + 4));
        let result = assign_offsets(LIMIT - 4, [(0x100, Compression::Lzs, 0x100)]);
        assert!(matches!(result, Err(Error::Capacity(offset)) if offset == LIMIT + 0xfc));
        Ok(())
    }

    #[test]
    fn test_assign_offsets_capacity() {
        let blocks =
            [(1, Compression::None, 8), (1, Compression::None, 8), (1, Compression::None, 4)];
        let result = assign_offsets(LIMIT - 8, blocks);
        assert!(matches!(result, Err(Error::Capacity(offset)) if offset == LIMIT + 8));
    }

    #[test]
    fn test_encode_string_table() -> Result<()> {
        let (header, data) = encode_string_table(&[], StringTableLayout::Compressed)?;
        assert_eq!(header, BlockHeader { decompressed_size: 0, compressed_size: 0 });
        assert!(data.is_empty());

        // Short tables do not get smaller with LZS
        let bytes = [1, b'a', b'a', 0];
        let (header, data) = encode_string_table(&bytes, StringTableLayout::Compressed)?;
        assert_eq!(header.decompressed_size, 4);
        assert_eq!(header.compressed_size as usize, lzs::compress(&bytes).len());
        assert_eq!(data.len() % 4, 0);

        let (header, data) = encode_string_table(&bytes, StringTableLayout::CompressedOrRaw)?;
        assert_eq!(header, BlockHeader { decompressed_size: 4, compressed_size: 0 });
        assert_eq!(data, &bytes);

        let long = [b'x'; 64];
        let (header, _) = encode_string_table(&long, StringTableLayout::CompressedOrRaw)?;
        assert_ne!(header.compressed_size, 0);
        Ok(())
    }
}
