use std::io::{self, ErrorKind, Read, Seek, SeekFrom, Write};

/// Rounds `offset` up to the next multiple of `align`, which must be a power of two.
pub fn align(offset: u64, align: u64) -> u64 {
    (offset + align - 1) & !(align - 1)
}

/// Pads a byte buffer with zeros until its length is a multiple of `align`.
pub fn pad_vec(bytes: &mut Vec<u8>, align: u64) {
    let len = self::align(bytes.len() as u64, align) as usize;
    bytes.resize(len, 0);
}

/// Reads a null-terminated string from `reader` and returns its bytes without the terminator.
/// Running out of data before the terminator is an `UnexpectedEof` error.
pub fn read_cstring(mut reader: impl Read) -> io::Result<Vec<u8>> {
    let mut bytes = vec![];
    let mut b = [0u8];
    loop {
        reader.read_exact(&mut b)?;
        if b[0] == 0 {
            return Ok(bytes);
        }
        bytes.push(b[0]);
    }
}

/// Writes `bytes` to `writer` followed by a null terminator.
pub fn write_cstring(mut writer: impl Write, bytes: &[u8]) -> io::Result<()> {
    if bytes.contains(&0) {
        return Err(io::Error::new(ErrorKind::InvalidInput, "string contains a null byte"));
    }
    writer.write_all(bytes)?;
    writer.write_all(&[0])
}

/// Returns the total length of a seekable stream without changing its position.
pub fn stream_len(mut stream: impl Seek) -> io::Result<u64> {
    let offset = stream.stream_position()?;
    let len = stream.seek(SeekFrom::End(0))?;
    if offset != len {
        stream.seek(SeekFrom::Start(offset))?;
    }
    Ok(len)
}
