//! Photo matte CLI tool
//!
//! Command-line interface for compositing mattes over photos and replaying scripted
//! captures through the capture session tracker.

#[cfg(feature = "cli")]
use photo_matte::cli;

#[cfg(feature = "cli")]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cli::main().await
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI feature not enabled. Please rebuild with --features cli");
    std::process::exit(1);
}
