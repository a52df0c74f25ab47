//! bgseg CLI Tool
//!
//! Offline inspection of the format negotiation performed before an image is
//! handed to a segmentation backend.

#[cfg(feature = "cli")]
use bgseg::cli;

#[cfg(feature = "cli")]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cli::main().await
}

#[cfg(not(feature = "cli"))]
fn main() {
    panic!("CLI feature not enabled. Please rebuild with --features cli");
}
