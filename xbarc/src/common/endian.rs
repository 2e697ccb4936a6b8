use byteorder::{ReadBytesExt, WriteBytesExt, BE, LE};
use std::fmt;
use std::io::{self, Read, Write};
use std::str::FromStr;
use thiserror::Error;

/// The error returned when a byte order string cannot be parsed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid byte order: {0:?}")]
pub struct ParseEndianError(pub String);

/// A byte order which is selected at runtime.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Endian {
    Little,
    Big,
}

impl FromStr for Endian {
    type Err = ParseEndianError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "<" | "little" => Ok(Self::Little),
            ">" | "big" => Ok(Self::Big),
            _ => Err(ParseEndianError(s.to_owned())),
        }
    }
}

impl fmt::Display for Endian {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Little => "<",
            Self::Big => ">",
        })
    }
}

/// `Read` extension for reading integers with an endianness selected at runtime.
pub trait ReadEndianExt: Read {
    fn read_u16_in(&mut self, endian: Endian) -> io::Result<u16> {
        match endian {
            Endian::Little => self.read_u16::<LE>(),
            Endian::Big => self.read_u16::<BE>(),
        }
    }

    fn read_u32_in(&mut self, endian: Endian) -> io::Result<u32> {
        match endian {
            Endian::Little => self.read_u32::<LE>(),
            Endian::Big => self.read_u32::<BE>(),
        }
    }
}
impl<R: Read + ?Sized> ReadEndianExt for R {}

/// `Write` extension for writing integers with an endianness selected at runtime.
pub trait WriteEndianExt: Write {
    fn write_u16_in(&mut self, endian: Endian, value: u16) -> io::Result<()> {
        match endian {
            Endian::Little => self.write_u16::<LE>(value),
            Endian::Big => self.write_u16::<BE>(value),
        }
    }

    fn write_u32_in(&mut self, endian: Endian, value: u32) -> io::Result<()> {
        match endian {
            Endian::Little => self.write_u32::<LE>(value),
            Endian::Big => self.write_u32::<BE>(value),
        }
    }
}
impl<W: Write + ?Sized> WriteEndianExt for W {}
