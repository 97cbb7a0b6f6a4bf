//! CLI module for the semantic image cache
//!
//! Provides subcommands:
//! - `serve`: HTTP server (default)
//! - `encode`: compare two prompts with the configured encoder

pub mod encode;
pub mod serve;

use clap::{Parser, Subcommand};

/// Semantic image cache - reuse generated images for similar prompts
#[derive(Parser)]
#[command(name = "semantic-image-cache")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the HTTP server
    Serve(serve::ServeArgs),

    /// Encode two prompts and report their similarity
    Encode(encode::EncodeArgs),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_subcommand() {
        let cli = Cli::try_parse_from(["semantic-image-cache"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_serve_port_override() {
        let cli = Cli::try_parse_from(["semantic-image-cache", "serve", "--port", "8080"]).unwrap();

        match cli.command {
            Some(Command::Serve(args)) => assert_eq!(args.port, Some(8080)),
            _ => panic!("expected serve"),
        }
    }

    #[test]
    fn test_encode_args() {
        let cli =
            Cli::try_parse_from(["semantic-image-cache", "encode", "a red fox", "a fox"]).unwrap();

        match cli.command {
            Some(Command::Encode(args)) => {
                assert_eq!(args.first, "a red fox");
                assert_eq!(args.second, "a fox");
            }
            _ => panic!("expected encode"),
        }
    }
}
