use anyhow::Result;
use clap::Parser;
use log::error;
use std::process;
use xbarc_cli::opt::Opt;
use xbarc_cli::{commands, terminal};

fn run_app() -> Result<()> {
    let opt = Opt::parse();
    terminal::init_logging(opt.verbose);
    let variant = opt.game.variant()?;
    commands::execute(variant, opt.command)
}

fn main() {
    process::exit(match run_app() {
        Ok(_) => 0,
        Err(err) => {
            error!("Fatal: {:#}", err);
            1
        }
    });
}
