#![allow(clippy::needless_pass_by_value)]

use crate::opt::{Command, CreateOpt, ExtractOpt, ListOpt};
use anyhow::{bail, Result};
use humansize::{FormatSize, BINARY};
use log::{debug, info};
use std::fs;
use std::path::{Path, PathBuf};
use xbarc::archive::{Archive, OpenMode, Variant, XbFile};
use xbarc::{Compression, Endian};

/// Returns whether `file` is named by `path`, either as stored or as it would be extracted.
fn path_matches(variant: &Variant, file: &XbFile, path: &str, prefix: bool) -> bool {
    let path = path.replace('/', "\\");
    let extracted = (variant.on_extract)(file.path());
    let names = [Some(file.path()), extracted.as_deref()];
    let matches = names.into_iter().flatten().any(|name| {
        if prefix {
            name.starts_with(&path)
        } else {
            name == path
        }
    });
    matches
}

/// The `info` CLI command.
pub fn command_info(variant: Variant, path: &Path) -> Result<()> {
    let archive = Archive::open(path, OpenMode::Read, variant)?;
    let size = fs::metadata(path)?.len();
    let data_size: u64 = archive.files().iter().map(|f| f.len() as u64).sum();
    let endian = match variant.endian {
        Endian::Little => "little-endian",
        Endian::Big => "big-endian",
    };
    println!("{}: {} XB archive ({})", path.display(), variant.name, endian);
    println!("Size: {}", size.format_size(BINARY));
    println!("Decompressed Size: {}", data_size.format_size(BINARY));
    println!("File Entries: {}", archive.len());
    for method in [Compression::None, Compression::Lzs, Compression::Huffman, Compression::Deflate]
    {
        let count = archive.files().iter().filter(|f| f.compression() == method).count();
        if count > 0 {
            println!("  {}: {}", method, count);
        }
    }
    Ok(())
}

/// The `list` CLI command.
pub fn command_list(variant: Variant, opt: ListOpt) -> Result<()> {
    let archive = Archive::open(&opt.path, OpenMode::Read, variant)?;
    let selected = |f: &XbFile| opt.paths.iter().any(|p| path_matches(&variant, f, p, true));
    let mut files = archive
        .files()
        .iter()
        .filter(|f| opt.paths.is_empty() || selected(f))
        .collect::<Vec<_>>();
    if files.is_empty() {
        bail!("No files found");
    }
    if opt.by_size {
        files.sort_by_key(|f| f.len());
    }
    if opt.reverse {
        files.reverse();
    }
    for file in files {
        if opt.long {
            println!("{:<8x} {:<8} {}", file.len(), file.compression(), file.path());
        } else {
            println!("{}", file.path());
        }
    }
    Ok(())
}

/// The `extract` CLI command.
pub fn command_extract(variant: Variant, opt: ExtractOpt) -> Result<()> {
    let archive = Archive::open(&opt.path, OpenMode::Read, variant)?;
    let files = if opt.paths.is_empty() {
        archive.files().iter().collect::<Vec<_>>()
    } else {
        let mut files = vec![];
        for path in &opt.paths {
            match archive.files().iter().find(|f| path_matches(&variant, f, path, false)) {
                Some(file) => files.push(file),
                None => bail!("{} is not in the archive", path),
            }
        }
        files
    };
    if files.is_empty() {
        bail!("Nothing to extract");
    }

    let out_dir = opt.output.unwrap_or_else(|| PathBuf::from("."));
    fs::create_dir_all(&out_dir)?;
    for file in files {
        match archive.extract(file, &out_dir)? {
            Some(out_path) => info!("Extracting {}", out_path.display()),
            None => debug!("Skipped {}", file.path()),
        }
    }
    Ok(())
}

/// Adds every input to `archive`.
fn add_inputs(archive: &mut Archive, opt: &CreateOpt) -> Result<()> {
    for input in &opt.inputs {
        if input.is_dir() {
            let count = archive.add_dir(input, None, opt.compression, !opt.no_recurse)?;
            info!("Adding {} ({} files)", input.display(), count);
        } else {
            info!("Adding {}", input.display());
            archive.add_file(input, None, opt.compression)?;
        }
    }
    Ok(())
}

/// The `create` CLI command.
pub fn command_create(variant: Variant, opt: CreateOpt) -> Result<()> {
    if !opt.compression.can_compress() {
        bail!("{} compression is not supported when creating archives", opt.compression);
    }
    for input in &opt.inputs {
        if !input.exists() {
            bail!("{} does not exist", input.display());
        }
    }

    let mode = if opt.force { OpenMode::Write } else { OpenMode::Create };
    let mut archive = Archive::open(&opt.path, mode, variant)?;
    if let Err(e) = add_inputs(&mut archive, &opt) {
        drop(archive);
        if let Err(remove_err) = fs::remove_file(&opt.path) {
            debug!("Could not remove {}: {:#}", opt.path.display(), remove_err);
        }
        return Err(e);
    }

    info!("Writing {}", opt.path.display());
    archive.close()?;
    let size = fs::metadata(&opt.path)?.len();
    info!("Wrote {} files ({})", archive.len(), size.format_size(BINARY));
    Ok(())
}

/// Runs a CLI command using `variant`'s archive conventions.
pub fn execute(variant: Variant, command: Command) -> Result<()> {
    match command {
        Command::Info { path } => command_info(variant, &path),
        Command::List(opt) => command_list(variant, opt),
        Command::Extract(opt) => command_extract(variant, opt),
        Command::Create(opt) => command_create(variant, opt),
    }
}
