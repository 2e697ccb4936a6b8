//! Canonical Huffman byte coding. Only decompression is supported.
//!
//! A compressed block begins with the code table: the maximum code length followed by, for each
//! length starting at 1, a count of symbols and then the symbol bytes themselves. Codes are
//! assigned canonically in the order the symbols appear. The table is padded to a 2-byte
//! boundary and followed by the code stream, which is read 16 bits at a time, least significant
//! bit first.

use super::{Compression, Error, Result};
use crate::common::{Endian, ReadEndianExt};
use byteorder::ReadBytesExt;
use std::io::{self, Cursor, Read};
use tracing::{instrument, trace};

/// The number of bits used to index the decode table.
const MAX_DEPTH: u32 = 10;
const TABLE_SIZE: usize = 1 << MAX_DEPTH;
const TABLE_MASK: u32 = TABLE_SIZE as u32 - 1;

/// A populated slot in the flat decode table.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
struct Symbol {
    /// The length of the code in bits. Lengths beyond `MAX_DEPTH` mark a literal escape.
    length: u8,
    value: u8,
}

/// A flat table indexed by the next `MAX_DEPTH` bits of the stream. Codes shorter than the
/// table depth are repeated in every slot which shares their bits.
struct DecodeTable {
    slots: [Option<Symbol>; TABLE_SIZE],
}

impl DecodeTable {
    /// Reads the code table from `reader` and builds the decode table.
    fn read_from(reader: &mut impl Read) -> Result<Self> {
        let mut slots = [None; TABLE_SIZE];
        let max_length = reader.read_u8().map_err(eof_error)?;
        if max_length == 0 {
            return Err(Error::MalformedTable);
        }

        // Codes longer than the table depth stop advancing, so every one of them lands in the
        // slot belonging to the first code past the end of the table
        let mut code = 0u32;
        for length in 1..=max_length {
            let count = reader.read_u8().map_err(eof_error)?;
            for _ in 0..count {
                let value = reader.read_u8().map_err(eof_error)?;
                let depth = (length as u32).min(MAX_DEPTH);
                let mut index = reverse_bits(code, depth) as usize;
                let step = if (length as u32) < MAX_DEPTH { 1 << length } else { TABLE_SIZE };
                while index < TABLE_SIZE {
                    slots[index] = Some(Symbol { length, value });
                    index += step;
                }
                if length as u32 <= MAX_DEPTH {
                    code += 1;
                }
            }
            if (length as u32) < MAX_DEPTH {
                code <<= 1;
            }
        }
        Ok(Self { slots })
    }

    fn get(&self, bits: u32) -> Result<Symbol> {
        let index = (bits & TABLE_MASK) as usize;
        self.slots[index].ok_or(Error::UnpopulatedSlot(index))
    }
}

/// Reverses the low `len` bits of `code`.
fn reverse_bits(code: u32, len: u32) -> u32 {
    (0..len).fold(0, |index, i| (index << 1) | ((code >> i) & 1))
}

/// Reads bits least significant first from a stream of 16-bit words.
struct BitReader<'a> {
    reader: Cursor<&'a [u8]>,
    endian: Endian,
    bits: u64,
    len: u32,
}

impl<'a> BitReader<'a> {
    fn new(reader: Cursor<&'a [u8]>, endian: Endian) -> Self {
        Self { reader, endian, bits: 0, len: 0 }
    }

    /// Makes sure at least `min` bits are buffered.
    fn fill(&mut self, min: u32) -> Result<()> {
        if self.len < min {
            let word = self.reader.read_u16_in(self.endian).map_err(eof_error)?;
            self.bits |= (word as u64) << self.len;
            self.len += 16;
        }
        Ok(())
    }

    fn peek(&self) -> u32 {
        self.bits as u32
    }

    fn consume(&mut self, count: u32) {
        self.bits >>= count;
        self.len -= count;
    }
}

fn eof_error(_: io::Error) -> Error {
    Error::UnexpectedEof
}

/// Decompresses a Huffman block in `src` which expands to exactly `size` bytes. 16-bit words in
/// the code stream are read using `endian`.
#[instrument(level = "trace", skip_all)]
pub fn decompress(src: &[u8], size: usize, endian: Endian) -> Result<Vec<u8>> {
    trace!("Decompressing Huffman block: src={:#x} size={:#x}", src.len(), size);
    let mut reader = Cursor::new(src);
    let table = DecodeTable::read_from(&mut reader)?;
    if reader.position() % 2 != 0 {
        reader.set_position(reader.position() + 1);
    }

    // Every code is at least one bit long
    let mut out = Vec::with_capacity(size.min(src.len().saturating_mul(8)));
    let mut bits = BitReader::new(reader, endian);
    while out.len() < size {
        bits.fill(MAX_DEPTH)?;
        let symbol = table.get(bits.peek())?;
        if symbol.length as u32 <= MAX_DEPTH {
            out.push(symbol.value);
            bits.consume(symbol.length as u32);
        } else {
            // Escape code: the next 8 bits are a literal byte
            bits.consume(MAX_DEPTH);
            bits.fill(16)?;
            out.push(bits.peek() as u8);
            bits.consume(8);
        }
    }
    Ok(out)
}

/// Huffman compression is not implemented and always fails.
pub fn compress(_data: &[u8]) -> Result<Vec<u8>> {
    Err(Error::Unsupported(Compression::Huffman))
}
