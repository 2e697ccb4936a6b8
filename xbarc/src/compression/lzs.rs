//! LZS is a byte-oriented LZ77 variant. Every unit in a stream begins with a control byte whose
//! low two bits select between a literal run, a short back-reference, and a long back-reference.
//!
//! | Kind        | Bits | Layout (little-endian)                                  |
//! |-------------|------|---------------------------------------------------------|
//! | Literal     | 8    | `[7:2]` run length - 1, followed by the literal bytes   |
//! | Short run   | 16   | `[3:1]` run length - 3, `[15:4]` distance               |
//! | Long run    | 24   | `[11:2]` run length - 3, `[23:12]` distance             |

use super::{Error, Result};
use tracing::{instrument, trace};

/// The shortest run which can be encoded as a back-reference.
const MIN_RUN: usize = 3;
/// The longest literal run which fits in a control byte.
const MAX_LITERAL_RUN: usize = 0x40;
/// The longest run which fits in a short back-reference.
const MAX_SHORT_RUN: usize = MIN_RUN + 0x7;
/// The longest run which fits in a long back-reference.
const MAX_LONG_RUN: usize = MIN_RUN + 0x3ff;
/// The farthest distance a back-reference can reach.
const MAX_DISTANCE: usize = 0xfff;
/// No unit expands to more than this many bytes per input byte.
const MAX_EXPANSION: usize = MAX_LONG_RUN / 3 + 1;

const KIND_MASK: u8 = 0b11;
const KIND_LITERAL: u8 = 0b00;
const KIND_LONG: u8 = 0b10;
/// Any control byte with this bit set is a short run.
const FLAG_SHORT: u8 = 0b01;

/// The number of bits in a match finder hash.
const HASH_BITS: u32 = 12;
/// The maximum number of earlier positions to try for each match.
const MAX_CHAIN: usize = 64;
const NO_POS: usize = usize::MAX;

/// Decompresses an LZS stream in `src` which expands to exactly `size` bytes.
#[instrument(level = "trace", skip_all)]
pub fn decompress(src: &[u8], size: usize) -> Result<Vec<u8>> {
    trace!("Decompressing LZS stream: src={:#x} size={:#x}", src.len(), size);
    if size > src.len().saturating_mul(MAX_EXPANSION) {
        return Err(Error::UnexpectedEof);
    }
    let mut out = vec![0u8; size];
    let mut pos = 0;
    let mut input = 0;
    while pos < size {
        let code = *src.get(input).ok_or(Error::UnexpectedEof)?;
        input += 1;

        if code & KIND_MASK == KIND_LITERAL {
            let len = (code >> 2) as usize + 1;
            let literal = src.get(input..(input + len)).ok_or(Error::UnexpectedEof)?;
            let dest = out.get_mut(pos..(pos + len)).ok_or(Error::OutputOverrun(size))?;
            dest.copy_from_slice(literal);
            input += len;
            pos += len;
            continue;
        }

        let (len, distance) = if code & FLAG_SHORT != 0 {
            let hi = *src.get(input).ok_or(Error::UnexpectedEof)?;
            input += 1;
            let value = u16::from_le_bytes([code, hi]) as usize;
            (((value >> 1) & 0x7) + MIN_RUN, value >> 4)
        } else {
            let rest = src.get(input..(input + 2)).ok_or(Error::UnexpectedEof)?;
            input += 2;
            let value = u32::from_le_bytes([code, rest[0], rest[1], 0]) as usize;
            (((value >> 2) & 0x3ff) + MIN_RUN, value >> 12)
        };
        if distance > pos {
            return Err(Error::InvalidDistance { distance, offset: pos });
        }
        if pos + len > size {
            return Err(Error::OutputOverrun(size));
        }

        // Copy one byte at a time so that overlapping runs repeat their pattern
        let start = pos - distance;
        for i in 0..len {
            out[pos + i] = out[start + i];
        }
        pos += len;
    }
    Ok(out)
}

/// Compresses `data` into an LZS stream.
#[instrument(level = "trace", skip_all)]
pub fn compress(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + data.len() / MAX_LITERAL_RUN + 1);
    let mut matcher = Matcher::new(data);
    let mut literal_start = 0;
    let mut pos = 0;
    while pos < data.len() {
        match matcher.find(pos) {
            Some((len, distance)) => {
                write_literals(&mut out, &data[literal_start..pos]);
                write_run(&mut out, len, distance);
                for p in pos..(pos + len) {
                    matcher.insert(p);
                }
                pos += len;
                literal_start = pos;
            }
            None => {
                matcher.insert(pos);
                pos += 1;
            }
        }
    }
    write_literals(&mut out, &data[literal_start..]);
    trace!("Compressed {:#x} bytes into {:#x} LZS bytes", data.len(), out.len());
    out
}

fn write_literals(out: &mut Vec<u8>, literals: &[u8]) {
    for chunk in literals.chunks(MAX_LITERAL_RUN) {
        out.push((((chunk.len() - 1) as u8) << 2) | KIND_LITERAL);
        out.extend_from_slice(chunk);
    }
}

fn write_run(out: &mut Vec<u8>, len: usize, distance: usize) {
    debug_assert!((MIN_RUN..=MAX_LONG_RUN).contains(&len));
    debug_assert!((1..=MAX_DISTANCE).contains(&distance));
    if len <= MAX_SHORT_RUN {
        let value = (distance << 4) | ((len - MIN_RUN) << 1) | FLAG_SHORT as usize;
        out.extend_from_slice(&(value as u16).to_le_bytes());
    } else {
        let value = (distance << 12) | ((len - MIN_RUN) << 2) | KIND_LONG as usize;
        out.extend_from_slice(&(value as u32).to_le_bytes()[..3]);
    }
}

/// Greedy match finder which chains together positions sharing a 3-byte hash.
struct Matcher<'a> {
    data: &'a [u8],
    head: Vec<usize>,
    prev: Vec<usize>,
}

impl<'a> Matcher<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, head: vec![NO_POS; 1 << HASH_BITS], prev: vec![NO_POS; data.len()] }
    }

    fn hash(&self, pos: usize) -> usize {
        let d = &self.data[pos..(pos + MIN_RUN)];
        let key = (d[0] as u32) << 16 | (d[1] as u32) << 8 | d[2] as u32;
        (key.wrapping_mul(0x9e3779b1) >> (32 - HASH_BITS)) as usize
    }

    fn insert(&mut self, pos: usize) {
        if pos + MIN_RUN <= self.data.len() {
            let hash = self.hash(pos);
            self.prev[pos] = self.head[hash];
            self.head[hash] = pos;
        }
    }

    /// Finds the longest earlier run matching the bytes at `pos` and returns `(len, distance)`.
    fn find(&self, pos: usize) -> Option<(usize, usize)> {
        if pos + MIN_RUN > self.data.len() {
            return None;
        }
        let max_len = (self.data.len() - pos).min(MAX_LONG_RUN);
        let mut best = (0, 0);
        let mut candidate = self.head[self.hash(pos)];
        let mut chain = 0;
        while candidate != NO_POS && chain < MAX_CHAIN {
            let distance = pos - candidate;
            if distance > MAX_DISTANCE {
                break;
            }
            let len = (0..max_len)
                .take_while(|&i| self.data[candidate + i] == self.data[pos + i])
                .count();
            if len > best.0 {
                best = (len, distance);
                if len == max_len {
                    break;
                }
            }
            candidate = self.prev[candidate];
            chain += 1;
        }
        (best.0 >= MIN_RUN).then_some(best)
    }
}
