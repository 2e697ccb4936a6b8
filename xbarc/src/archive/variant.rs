//! Per-title archive conventions.

use super::{Error, Result};
use crate::common::Endian;
use std::fmt;
use std::str::FromStr;

/// A function which rewrites a path as it enters or leaves an archive.
/// Returning `None` omits the file.
pub type PathTransform = fn(&str) -> Option<String>;

/// How the string table is allowed to be stored.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum StringTableLayout {
    /// The table is always LZS-compressed.
    Compressed,
    /// The table is LZS-compressed unless compression would not make it smaller, in which case
    /// it is stored raw with a compressed size of 0.
    CompressedOrRaw,
}

/// The conventions an archive follows for a particular title.
#[derive(Debug, Copy, Clone)]
pub struct Variant {
    pub name: &'static str,
    pub endian: Endian,
    pub string_table: StringTableLayout,
    /// Applied to each path which is added to an archive.
    pub on_add: PathTransform,
    /// Applied to each path before a file is extracted.
    pub on_extract: PathTransform,
}

impl Variant {
    /// Constructs a variant which leaves paths unchanged and always compresses the string table.
    pub fn new(name: &'static str, endian: Endian) -> Self {
        Self {
            name,
            endian,
            string_table: StringTableLayout::Compressed,
            on_add: keep_path,
            on_extract: keep_path,
        }
    }

    pub fn with_string_table(mut self, layout: StringTableLayout) -> Self {
        self.string_table = layout;
        self
    }

    pub fn with_transforms(mut self, on_add: PathTransform, on_extract: PathTransform) -> Self {
        self.on_add = on_add;
        self.on_extract = on_extract;
        self
    }
}

impl Default for Variant {
    /// The MNGP conventions.
    fn default() -> Self {
        mngp_variant(Game::Mngp)
    }
}

/// Titles which use XB archives.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Game {
    Mng3,
    Mng4,
    Mng5,
    Mng6,
    Mngp,
    /// MNGP archives served by the web server, which do not prefix paths with `..\`.
    MngpWeb,
}

impl Game {
    /// Every known title.
    pub const ALL: [Game; 6] =
        [Self::Mng3, Self::Mng4, Self::Mng5, Self::Mng6, Self::Mngp, Self::MngpWeb];

    pub fn name(self) -> &'static str {
        match self {
            Self::Mng3 => "mng3",
            Self::Mng4 => "mng4",
            Self::Mng5 => "mng5",
            Self::Mng6 => "mng6",
            Self::Mngp => "mngp",
            Self::MngpWeb => "mngp-web",
        }
    }

    /// Returns whether archives from this title can be read and written.
    pub fn is_supported(self) -> bool {
        matches!(self, Self::Mng5 | Self::Mngp | Self::MngpWeb)
    }

    /// Returns the archive conventions for this title.
    pub fn variant(self) -> Result<Variant> {
        match self {
            Self::Mngp => Ok(mngp_variant(self)),
            Self::MngpWeb => {
                Ok(mngp_variant(self).with_transforms(keep_path, strip_outside_prefix))
            }
            Self::Mng5 => Ok(Variant::new(self.name(), Endian::Big)),
            Self::Mng3 | Self::Mng4 | Self::Mng6 => Err(Error::UnsupportedGame(self)),
        }
    }
}

impl fmt::Display for Game {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Game {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self> {
        let lower = s.to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|game| game.name() == lower)
            .ok_or_else(|| Error::UnrecognizedGame(s.to_owned()))
    }
}

/// Paths in MNGP archives are relative to a directory next to the game's data directory.
const OUTSIDE_PREFIX: &str = "..\\";

fn mngp_variant(game: Game) -> Variant {
    Variant::new(game.name(), Endian::Little)
        .with_string_table(StringTableLayout::CompressedOrRaw)
        .with_transforms(add_outside_prefix, strip_outside_prefix)
}

fn keep_path(path: &str) -> Option<String> {
    Some(path.to_owned())
}

fn add_outside_prefix(path: &str) -> Option<String> {
    if path.starts_with(OUTSIDE_PREFIX) {
        Some(path.to_owned())
    } else {
        Some(format!("{}{}", OUTSIDE_PREFIX, path))
    }
}

fn strip_outside_prefix(path: &str) -> Option<String> {
    Some(path.trim_start_matches(OUTSIDE_PREFIX).to_owned())
}
