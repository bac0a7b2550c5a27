use clap::Parser;
use linearblock::cli::{run, Cli};

fn main() -> anyhow::Result<()> {
    env_logger::init();
    run(Cli::parse())
}
