use anyhow::Result;
use clap::Parser;
use promptrelay::args::CliArgs;

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    promptrelay::run(args).await
}
