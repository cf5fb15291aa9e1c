//! CLI entry point for loopy belief propagation image completion

use clap::Parser;
use lbpfill::io::cli::{Cli, FileProcessor};

fn main() -> lbpfill::Result<()> {
    let cli = Cli::parse();
    env_logger::Builder::new()
        .filter_level(cli.log_level())
        .parse_default_env()
        .init();

    let mut processor = FileProcessor::new(cli);
    processor.process()
}
