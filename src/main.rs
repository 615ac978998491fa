use anyhow::Result;
use slotwatch::cli;

#[tokio::main]
async fn main() -> Result<()> {
    cli::run().await
}
