//! Tilescape CLI - render slippy-map viewports to image files.

mod commands;
mod error;

use clap::{Parser, Subcommand};

use crate::error::CliError;

#[derive(Parser)]
#[command(
    name = "tilescape",
    version,
    about = "Slippy-map raster compositor - render tile pyramids to pixels"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Composite a viewport of procedurally painted tiles into a PNG
    Render(commands::render::RenderArgs),
}

fn main() {
    tilescape::telemetry::init_logging();

    let cli = Cli::parse();
    let result: Result<(), CliError> = match cli.command {
        Commands::Render(args) => commands::render::run(args),
    };

    if let Err(err) = result {
        eprintln!("Error: {}", err);
        std::process::exit(1);
    }
}
