//! The filesystem table (FST) which locates each file's data.

use super::{Error, Result, DATA_ALIGN};
use crate::common::{Endian, ReadEndianExt, ReadFrom, WriteEndianExt, WriteTo};
use crate::compression::Compression;
use std::convert::TryFrom;
use std::io::{Read, Write};

/// The size of an FST entry on disk.
pub const FST_ENTRY_SIZE: u64 = 8;

/// The largest offset (in 4-byte words) which can be packed into an entry.
pub const MAX_PACKED_OFFSET: u32 = 0x0fff_ffff;

const TAG_SHIFT: u32 = 28;
const MAX_TAG: u8 = 0xf;

/// Packs a compression tag and a 4-byte aligned offset into a single word.
/// The tag is stored in the high nibble and the offset divided by 4 in the low 28 bits.
pub fn pack(tag: u8, offset: u64) -> Result<u32> {
    if tag > MAX_TAG {
        return Err(Error::UnrecognizedCompression(tag));
    }
    if offset % DATA_ALIGN != 0 {
        return Err(Error::MisalignedOffset(offset));
    }
    match u32::try_from(offset / DATA_ALIGN) {
        Ok(words) if words <= MAX_PACKED_OFFSET => Ok((u32::from(tag) << TAG_SHIFT) | words),
        _ => Err(Error::Capacity(offset)),
    }
}

/// Splits a packed word into its compression tag and byte offset.
pub fn unpack(packed: u32) -> (u8, u64) {
    let tag = (packed >> TAG_SHIFT) as u8;
    let offset = u64::from(packed & MAX_PACKED_OFFSET) * DATA_ALIGN;
    (tag, offset)
}

/// An entry in the FST.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct FstEntry {
    /// The length of the file's data after decompression.
    pub decompressed_len: u32,
    /// The compression method used to store the file.
    pub compression: Compression,
    /// The byte offset of the file's stored data from the start of the archive.
    pub offset: u64,
}

impl FstEntry {
    pub fn new(decompressed_len: u32, compression: Compression, offset: u64) -> Self {
        Self { decompressed_len, compression, offset }
    }
}

impl<R: Read + ?Sized> ReadFrom<R> for FstEntry {
    type Error = Error;
    fn read_from(reader: &mut R, endian: Endian) -> Result<Self> {
        let decompressed_len = reader.read_u32_in(endian)?;
        let (tag, offset) = unpack(reader.read_u32_in(endian)?);
        let compression =
            Compression::try_from(tag).map_err(|_| Error::UnrecognizedCompression(tag))?;
        Ok(Self { decompressed_len, compression, offset })
    }
}

impl<W: Write + ?Sized> WriteTo<W> for FstEntry {
    type Error = Error;
    fn write_to(&self, writer: &mut W, endian: Endian) -> Result<()> {
        let packed = pack(self.compression.into(), self.offset)?;
        writer.write_u32_in(endian, self.decompressed_len)?;
        writer.write_u32_in(endian, packed)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_pack_unpack() -> Result<()> {
        for tag in 0..=MAX_TAG {
            for &offset in &[0, 4, 0x1234, 0x3fff_fffc] {
                let packed = pack(tag, offset)?;
                assert_eq!(unpack(packed), (tag, offset));
            }
        }
        assert_eq!(pack(2, 0x100)?, 0x2000_0040);
        assert_eq!(unpack(0x3000_0010), (3, 0x40));
        Ok(())
    }

    #[test]
    fn test_pack_errors() {
        assert!(matches!(pack(16, 0), Err(Error::UnrecognizedCompression(16))));
        assert!(matches!(pack(0, 6), Err(Error::MisalignedOffset(6))));
        assert!(matches!(pack(0, 0x4000_0000), Err(Error::Capacity(0x4000_0000))));
    }

    #[test]
    fn test_read_write_entry() -> Result<()> {
        let entry = FstEntry::new(0x1234, Compression::Lzs, 0x80);
        let mut bytes = vec![];
        entry.write_to(&mut bytes, Endian::Little)?;
        assert_eq!(bytes, &[0x34, 0x12, 0x00, 0x00, 0x20, 0x00, 0x00, 0x20]);
        assert_eq!(FstEntry::read_from(&mut Cursor::new(&bytes), Endian::Little)?, entry);

        let mut bytes = vec![];
        entry.write_to(&mut bytes, Endian::Big)?;
        assert_eq!(bytes, &[0x00, 0x00, 0x12, 0x34, 0x20, 0x00, 0x00, 0x20]);
        assert_eq!(FstEntry::read_from(&mut Cursor::new(&bytes), Endian::Big)?, entry);
        Ok(())
    }

    #[test]
    fn test_read_unrecognized_tag() {
        let bytes = [0u8, 0, 0, 1, 0x40, 0, 0, 0];
        let result = FstEntry::read_from(&mut Cursor::new(&bytes), Endian::Big);
        assert!(matches!(result, Err(Error::UnrecognizedCompression(4))));
    }
}
