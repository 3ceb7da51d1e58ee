//! Pulsegrid CLI entry point.

use pulsegrid_lib::cli::{self, Cli};
use pulsegrid_lib::core::Result;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();
    cli::execute(cli).await
}
