use clap::Parser;
use eyre::Result;
use scripts::{cli::Cli, commands::migrate};

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt().pretty().init();

    migrate(&cli)?;
    Ok(())
}
