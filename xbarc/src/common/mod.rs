mod read_write;

pub mod endian;
pub mod io;

pub use endian::{Endian, ReadEndianExt, WriteEndianExt};
pub use read_write::*;
