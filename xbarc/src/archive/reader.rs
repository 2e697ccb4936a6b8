use super::fst::{FstEntry, FST_ENTRY_SIZE};
use super::{
    BlockHeader, Corruption, Error, Header, Result, StringTable, StringTableLayout, Variant,
    XbFile, HEADER_SIZE,
};
use crate::common::io::stream_len;
use crate::common::{Endian, ReadFrom};
use crate::compression::{self, lzs, Compression};
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use tracing::{debug, instrument, trace};

/// Reads an entire archive into memory.
#[non_exhaustive]
pub struct ArchiveReader<R: Read + Seek> {
    pub reader: R,
    /// The files in FST order.
    pub files: Vec<XbFile>,
}

impl<R: Read + Seek> ArchiveReader<R> {
    /// Reads and validates every file in the archive stored in `reader`.
    /// `ArchiveReader` does its own buffering, so `reader` should not be buffered.
    pub fn open(reader: R, variant: &Variant) -> Result<Self> {
        let mut buf = BufReader::new(reader);
        let files = match read_files(&mut buf, variant) {
            Err(Error::Io(e)) if e.kind() == io::ErrorKind::UnexpectedEof => {
                return Err(Corruption::Truncated.into())
            }
            result => result?,
        };
        Ok(Self { reader: buf.into_inner(), files })
    }

    /// Consumes the reader and returns the files.
    pub fn into_files(self) -> Vec<XbFile> {
        self.files
    }
}

#[instrument(level = "trace", skip_all)]
fn read_files(reader: &mut (impl Read + Seek), variant: &Variant) -> Result<Vec<XbFile>> {
    let endian = variant.endian;
    let len = stream_len(&mut *reader)?;
    reader.seek(SeekFrom::Start(0))?;
    let header = Header::read_from(reader, endian)?;
    debug!("Reading {} archive entries", header.file_count);

    let count = header.file_count as usize;
    if HEADER_SIZE + FST_ENTRY_SIZE * (count as u64) > len {
        return Err(Corruption::Truncated.into());
    }
    let mut entries = Vec::with_capacity(count);
    for index in 0..count {
        let entry = FstEntry::read_from(reader, endian).map_err(|e| match e {
            Error::UnrecognizedCompression(tag) => {
                Corruption::UnrecognizedCompression { index, tag }.into()
            }
            e => e,
        })?;
        if entry.offset >= len {
            return Err(Corruption::OffsetOutOfRange { index, offset: entry.offset, len }.into());
        }
        trace!("FST entry {}: {:?}", index, entry);
        entries.push(entry);
    }

    let strings = read_string_table(reader, variant, len)?;
    if strings.len() != entries.len() {
        let (files, strings) = (entries.len(), strings.len());
        return Err(Corruption::CountMismatch { files, strings }.into());
    }

    let mut files = Vec::with_capacity(count);
    for (index, (entry, path)) in entries.iter().zip(strings.into_paths()).enumerate() {
        trace!("Reading {:?} at {:#x}", path, entry.offset);
        reader.seek(SeekFrom::Start(entry.offset))?;
        let data = read_file_data(reader, entry, index, len, endian)?;
        files.push(XbFile::from_archive(path, data, entry.compression));
    }
    Ok(files)
}

/// Reads and decompresses the string table which follows the FST.
fn read_string_table(
    reader: &mut (impl Read + Seek),
    variant: &Variant,
    len: u64,
) -> Result<StringTable> {
    let header = BlockHeader::read_from(reader, variant.endian)?;
    trace!(
        "String table: decompressed={:#x} compressed={:#x}",
        header.decompressed_size,
        header.compressed_size
    );
    if header.decompressed_size == 0 {
        return Ok(StringTable::new());
    }
    let bytes = if header.compressed_size == 0 {
        if variant.string_table == StringTableLayout::Compressed {
            return Err(Corruption::UncompressedStringTable.into());
        }
        read_bytes(reader, header.decompressed_size, len)?
    } else {
        let src = read_bytes(reader, header.compressed_size, len)?;
        lzs::decompress(&src, header.decompressed_size as usize)
            .map_err(Corruption::StringTableData)?
    };
    StringTable::from_bytes(&bytes)
}

/// Reads a file's stored data and decompresses it.
fn read_file_data(
    reader: &mut (impl Read + Seek),
    entry: &FstEntry,
    index: usize,
    len: u64,
    endian: Endian,
) -> Result<Vec<u8>> {
    let expected = entry.decompressed_len;
    if expected == 0 {
        return Err(Corruption::EmptyFile(index).into());
    }
    let data = if entry.compression.has_header() {
        let header = BlockHeader::read_from(reader, endian)?;
        let BlockHeader { decompressed_size, compressed_size } = header;
        if decompressed_size == 0 || compressed_size == 0 {
            return Err(Corruption::InvalidBlockHeader {
                index,
                decompressed: decompressed_size,
                compressed: compressed_size,
            }
            .into());
        }
        // Deflate headers describe the Huffman stage, which has its own size.
        if entry.compression != Compression::Deflate && decompressed_size != expected {
            return Err(Corruption::SizeMismatch {
                index,
                expected,
                actual: decompressed_size as usize,
            }
            .into());
        }
        let src = read_bytes(reader, compressed_size, len)?;
        compression::decompress(entry.compression, &src, decompressed_size as usize, endian)
            .map_err(|source| Corruption::FileData { index, source })?
    } else {
        read_bytes(reader, expected, len)?
    };
    if data.len() != expected as usize {
        return Err(Corruption::SizeMismatch { index, expected, actual: data.len() }.into());
    }
    Ok(data)
}

/// Reads `size` bytes, failing before allocating if they would extend past the end of the stream.
fn read_bytes(reader: &mut (impl Read + Seek), size: u32, len: u64) -> Result<Vec<u8>> {
    let offset = reader.stream_position()?;
    if offset + u64::from(size) > len {
        return Err(Corruption::Truncated.into());
    }
    let mut bytes = vec![0u8; size as usize];
    reader.read_exact(&mut bytes)?;
    Ok(bytes)
}
