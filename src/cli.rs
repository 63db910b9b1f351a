//! Command-line interface

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Claude wrapper - upstream credential resolution and inbound API-key protection
#[derive(Parser, Debug)]
#[command(name = "claude-wrapper")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short, long, env = "CLAUDE_WRAPPER_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(
        long,
        default_value = "info",
        env = "CLAUDE_WRAPPER_LOG_LEVEL",
        global = true
    )]
    pub log_level: String,

    /// Log format (text, json)
    #[arg(long, env = "CLAUDE_WRAPPER_LOG_FORMAT", global = true)]
    pub log_format: Option<String>,

    /// Subcommand (optional - defaults to server mode)
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the HTTP server (default)
    Serve(ServeArgs),

    /// Resolve upstream authentication, print the outcome and exit
    Auth {
        /// Only check credential format, no network calls
        #[arg(long)]
        offline: bool,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print a freshly generated API key
    GenerateKey {
        /// Key length
        #[arg(short, long, default_value_t = 32)]
        length: usize,
    },
}

/// Server options
#[derive(Args, Debug, Default)]
pub struct ServeArgs {
    /// Host to bind to
    #[arg(long)]
    pub host: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Require `Authorization: Bearer <key>` on protected routes
    #[arg(long)]
    pub require_api_key: bool,

    /// Generate a runtime key when protection is required and none is set
    #[arg(long)]
    pub generate_api_key: bool,

    /// Length of a generated key
    #[arg(long)]
    pub api_key_length: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn serve_flags_parse() {
        let cli = Cli::parse_from([
            "claude-wrapper",
            "--log-level",
            "debug",
            "serve",
            "--port",
            "9000",
            "--require-api-key",
            "--generate-api-key",
            "--api-key-length",
            "48",
        ]);
        assert_eq!(cli.log_level, "debug");
        let Some(Command::Serve(args)) = cli.command else {
            panic!("expected serve");
        };
        assert_eq!(args.port, Some(9000));
        assert!(args.require_api_key && args.generate_api_key);
        assert_eq!(args.api_key_length, Some(48));
    }

    #[test]
    fn no_subcommand_means_serve() {
        let cli = Cli::parse_from(["claude-wrapper"]);
        assert!(cli.command.is_none());
    }

    #[test]
    fn generate_key_default_length() {
        let cli = Cli::parse_from(["claude-wrapper", "generate-key"]);
        assert!(matches!(cli.command, Some(Command::GenerateKey { length: 32 })));
    }
}
