use anyhow::Result;
use log::info;
use std::io::Cursor;
use xbarc::archive::{ArchiveBuilder, ArchiveReader, Corruption, Error, Game, Variant, XbFile};
use xbarc::Compression;
use xbarc_test as common;

fn small_archive(variant: &Variant) -> Result<(Vec<XbFile>, Vec<u8>)> {
    // The last file has no padding, so every truncation cuts into data
    let files = vec![
        XbFile::new("a.txt", common::text(200), Compression::Lzs)?,
        XbFile::new("b.txt", common::text(10), Compression::Lzs)?,
        XbFile::new("c.bin", common::noise(32, 1), Compression::None)?,
    ];
    let mut cursor = Cursor::new(vec![]);
    ArchiveBuilder::new(variant).extend(&files).write_to(&mut cursor)?;
    Ok((files, cursor.into_inner()))
}

fn open(bytes: &[u8], variant: &Variant) -> xbarc::archive::Result<Vec<XbFile>> {
    Ok(ArchiveReader::open(Cursor::new(bytes), variant)?.files)
}

#[test]
fn test_truncated_archives_are_rejected() -> Result<()> {
    common::init_logging();
    for game in [Game::Mngp, Game::Mng5] {
        let variant = game.variant()?;
        let (_, bytes) = small_archive(&variant)?;
        info!("Truncating a {:#x}-byte {} archive", bytes.len(), game);
        for len in 0..bytes.len() {
            match open(&bytes[..len], &variant) {
                Err(Error::NotAnArchive) | Err(Error::BadArchive(_)) => (),
                other => panic!("length {:#x}: {:?}", len, other.map(|f| f.len())),
            }
        }
    }
    Ok(())
}

#[test]
fn test_bit_flips_never_panic() -> Result<()> {
    common::init_logging();
    let variant = Game::Mng5.variant()?;
    let (files, bytes) = small_archive(&variant)?;
    let mut rejected = 0;
    for offset in 0..bytes.len() {
        for bit in [0x01u8, 0x10, 0x80] {
            let mut corrupt = bytes.clone();
            corrupt[offset] ^= bit;
            match open(&corrupt, &variant) {
                Ok(read) => assert_eq!(read.len(), files.len()),
                Err(Error::NotAnArchive) | Err(Error::BadArchive(_)) => rejected += 1,
                Err(e) => panic!("offset {:#x}: unexpected error: {:#}", offset, e),
            }
        }
    }
    info!("Rejected {} of {} corrupt archives", rejected, bytes.len() * 3);
    assert!(rejected > 0);
    Ok(())
}

#[test]
fn test_string_table_integrity() -> Result<()> {
    common::init_logging();
    // Short string tables are stored raw by MNGP archives
    let variant = Game::Mngp.variant()?;
    let files = [
        XbFile::new("x", b"1".to_vec(), Compression::None)?,
        XbFile::new("y", b"2".to_vec(), Compression::None)?,
    ];
    let mut cursor = Cursor::new(vec![]);
    ArchiveBuilder::new(&variant).extend(&files).write_to(&mut cursor)?;
    let bytes = cursor.into_inner();
    let table = 8 + 8 * files.len() + 8;
    assert_eq!(&bytes[table..(table + 8)], &[1, b'x', b'x', 0, 1, b'y', b'y', 0]);

    // Changing a path without fixing its hash is detected
    let mut corrupt = bytes.clone();
    corrupt[table + 2] = b'z';
    match open(&corrupt, &variant) {
        Err(Error::BadArchive(c)) => {
            assert!(matches!(*c, Corruption::HashMismatch { index: 0, .. }), "{:?}", c)
        }
        other => panic!("expected a hash mismatch, got {:?}", other.map(|f| f.len())),
    }

    // So is a wrong length
    let mut corrupt = bytes;
    corrupt[table + 4] = 2;
    match open(&corrupt, &variant) {
        Err(Error::BadArchive(c)) => {
            assert!(matches!(*c, Corruption::LengthMismatch { index: 1, .. }), "{:?}", c)
        }
        other => panic!("expected a length mismatch, got {:?}", other.map(|f| f.len())),
    }
    Ok(())
}

#[test]
fn test_wrong_game_is_rejected() -> Result<()> {
    common::init_logging();
    let (_, bytes) = small_archive(&Game::Mngp.variant()?)?;
    assert!(open(&bytes, &Game::Mng5.variant()?).is_err());
    Ok(())
}
