use clap::Parser;
use semantic_image_cache::cli::{self, Cli, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command.unwrap_or(Command::Serve(cli::serve::ServeArgs::default())) {
        Command::Serve(args) => cli::serve::run(args).await,
        Command::Encode(args) => cli::encode::run(args).await,
    }
}
