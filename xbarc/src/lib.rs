#![warn(
    absolute_paths_not_starting_with_crate,
    elided_lifetimes_in_paths,
    explicit_outlives_requirements,
    trivial_casts,
    trivial_numeric_casts,
    unconditional_recursion,
    unreachable_patterns,
    unreachable_pub,
    unused_import_braces,
    unused_lifetimes,
    unused_must_use,
    unused_qualifications,
    variant_size_differences
)]

//! Reading and writing XB archives.
//!
//! XB archives are the file containers used by the Everybody's Golf (Minna no Golf) series. Each
//! archive holds a flat list of files which may be stored raw or compressed with LZS, Huffman, or
//! "deflate" (Huffman over LZS).

#[macro_use]
pub mod macros;

pub mod archive;
pub mod common;
pub mod compression;

pub use archive::{Archive, ArchiveBuilder, ArchiveReader, Game, OpenMode, Variant, XbFile};
pub use common::Endian;
pub use compression::Compression;
