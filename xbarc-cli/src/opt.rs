use clap::{ArgAction, Args, Parser};
use std::path::PathBuf;
use xbarc::{Compression, Game};

#[derive(Parser)]
#[command(name = "xbarc", version)]
#[command(about = "XB archive toolkit for the Everybody's Golf series")]
pub struct Opt {
    /// Enables debug logging
    ///
    /// Use -vv to enable trace logging
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// The game the archive belongs to (mngp, mngp-web, mng5)
    #[arg(short, long, value_name = "GAME", default_value = "mngp", global = true)]
    pub game: Game,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(clap::Subcommand)]
pub enum Command {
    /// Shows information about an archive
    Info {
        /// Path to the XB archive
        path: PathBuf,
    },

    /// Lists the files in an archive
    List(ListOpt),

    /// Extracts files from an archive
    Extract(ExtractOpt),

    /// Creates a new archive from files and directories
    Create(CreateOpt),
}

#[derive(Args)]
pub struct ListOpt {
    /// Path to the XB archive
    pub path: PathBuf,

    /// Lists file sizes and compression methods
    #[arg(short, long)]
    pub long: bool,

    /// Sorts files by size instead of archive order
    #[arg(long)]
    pub by_size: bool,

    /// Reverses the sorting order
    #[arg(long)]
    pub reverse: bool,

    /// Only list files whose paths start with one of these prefixes
    pub paths: Vec<String>,
}

#[derive(Args)]
pub struct ExtractOpt {
    /// Path to the XB archive
    pub path: PathBuf,

    /// The directory to extract files to
    #[arg(short, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Archive paths of the files to extract (all files if omitted)
    pub paths: Vec<String>,
}

#[derive(Args)]
pub struct CreateOpt {
    /// Path to the XB archive to create
    pub path: PathBuf,

    /// Files and directories to add
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// How to compress files (none, lzs)
    #[arg(short, long, value_name = "METHOD", default_value = "none")]
    pub compression: Compression,

    /// Only add the files directly inside each input directory
    #[arg(long)]
    pub no_recurse: bool,

    /// Overwrite the archive if it already exists
    #[arg(short, long)]
    pub force: bool,
}
