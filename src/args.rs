use clap::Parser;

#[derive(Debug, Parser, Clone, PartialEq, Eq)]
#[command(name = "promptrelay")]
#[command(
    about = "Backend proxy that persists a system prompt and forwards chat and image requests to an LLM provider"
)]
pub struct CliArgs {
    /// Listen on this port instead of $PORT (default 5000).
    #[arg(long, value_name = "PORT")]
    pub port: Option<u16>,

    /// SQLite database path instead of $DATABASE_PATH.
    #[arg(long, value_name = "PATH")]
    pub database: Option<String>,
}
