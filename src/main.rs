use std::process::ExitCode;

use clap::{Parser, Subcommand};
use combiplex::command;

#[derive(Parser)]
#[command(version, about = "Demultiplex reads carrying combinatorial cell barcodes")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Two barcode segments around a fixed primer, corrected against references
    Combinatorial(command::Combinatorial),
    /// Cell barcode and UMI at fixed positions of read 1
    Dropseq(command::Dropseq),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Combinatorial(mut cmd) => cmd.try_execute(),
        Commands::Dropseq(mut cmd) => cmd.try_execute(),
    };

    if let Err(e) = result {
        log::error!("{:?}", e);
        eprintln!("Error: {}", e);
        return ExitCode::FAILURE;
    }
    return ExitCode::SUCCESS;
}
