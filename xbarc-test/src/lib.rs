use anyhow::Result;
use simplelog::{Color, ColorChoice, ConfigBuilder, Level, LevelFilter, TermLogger, TerminalMode};
use std::fs;
use std::path::Path;
use std::sync::Once;
use time::macros::format_description;

static INIT_LOGGING: Once = Once::new();

/// Configures logging at the beginning of a test.
pub fn init_logging() {
    INIT_LOGGING.call_once(|| {
        let config = ConfigBuilder::new()
            .set_time_format_custom(format_description!(
                "[hour]:[minute]:[second].[subsecond digits:3]"
            ))
            .set_level_color(Level::Info, Some(Color::Green))
            .build();
        TermLogger::init(LevelFilter::Debug, config, TerminalMode::Stderr, ColorChoice::Auto)
            .unwrap();
    });
}

/// Deterministic pseudo-random bytes which do not compress well.
pub fn noise(len: usize, seed: u32) -> Vec<u8> {
    let mut state = seed;
    (0..len)
        .map(|_| {
            state = state.wrapping_mul(1103515245).wrapping_add(12345);
            (state >> 16) as u8
        })
        .collect()
}

/// Text-like bytes which compress well.
pub fn text(len: usize) -> Vec<u8> {
    const WORDS: &[&str] = &["tee ", "green ", "birdie ", "eagle ", "bogey ", "fairway ", "par "];
    let mut bytes = vec![];
    let mut i = 0;
    while bytes.len() < len {
        bytes.extend_from_slice(WORDS[(i * 7 + i / 3) % WORDS.len()].as_bytes());
        i += 1;
    }
    bytes.truncate(len);
    bytes
}

/// Writes `data` to `root/path`, creating parent directories.
pub fn write_file(root: &Path, path: &str, data: &[u8]) -> Result<()> {
    let path = root.join(path);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, data)?;
    Ok(())
}

/// Compares every file under `expected` with the file at the same relative path under `actual`.
/// Returns the number of files compared.
pub fn compare_dirs(expected: &Path, actual: &Path) -> Result<usize> {
    let mut count = 0;
    for entry in fs::read_dir(expected)? {
        let entry = entry?;
        let other = actual.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            count += compare_dirs(&entry.path(), &other)?;
        } else {
            anyhow::ensure!(
                fs::read(entry.path())? == fs::read(&other)?,
                "{} differs from {}",
                other.display(),
                entry.path().display()
            );
            count += 1;
        }
    }
    Ok(count)
}
