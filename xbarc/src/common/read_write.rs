use super::Endian;
use std::io::{Read, Write};

/// Trait for an object which can be read from a stream in a runtime byte order.
pub trait ReadFrom<R: Read + ?Sized>: Sized {
    /// The error type returned from `read_from()`.
    type Error;

    /// Reads an instance of this object from `reader` using `endian`.
    fn read_from(reader: &mut R, endian: Endian) -> Result<Self, Self::Error>;
}

/// Trait for an object which can be written to a stream in a runtime byte order.
pub trait WriteTo<W: Write + ?Sized>: Sized {
    /// The error type returned from `write_to()`.
    type Error;

    /// Writes this object to `writer` using `endian`.
    fn write_to(&self, writer: &mut W, endian: Endian) -> Result<(), Self::Error>;

    /// Writes a slice of instances of this object to `writer`.
    fn write_all_to(writer: &mut W, buf: &[Self], endian: Endian) -> Result<(), Self::Error> {
        for elem in buf {
            elem.write_to(writer, endian)?;
        }
        Ok(())
    }
}
