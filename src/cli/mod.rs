// src/cli/mod.rs — CLI definition (clap derive)

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "tripwise", about = "Travel assistant with self-correcting answers", version)]
pub struct Cli {
    /// Config file path (default: <config dir>/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Start the HTTP server (default)
    Serve {
        /// Bind address, overrides [server].host
        #[arg(long)]
        host: Option<String>,
        /// Port, overrides [server].port
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Send one message through the assistant and print the reply
    Ask {
        /// User name the conversation belongs to
        #[arg(short, long)]
        user: String,
        /// Session id (default: "default")
        #[arg(short, long)]
        session: Option<String>,
        /// The message
        #[arg(trailing_var_arg = true, required = true)]
        message: Vec<String>,
    },
}

impl Cli {
    /// The subcommand to run, `serve` when none was given.
    pub fn command(&self) -> Commands {
        self.command.clone().unwrap_or(Commands::Serve {
            host: None,
            port: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_serve() {
        let cli = Cli::parse_from(["tripwise"]);
        assert!(matches!(cli.command(), Commands::Serve { host: None, port: None }));
    }

    #[test]
    fn test_serve_overrides() {
        let cli = Cli::parse_from(["tripwise", "serve", "--host", "0.0.0.0", "-p", "9000"]);
        match cli.command() {
            Commands::Serve { host, port } => {
                assert_eq!(host.as_deref(), Some("0.0.0.0"));
                assert_eq!(port, Some(9000));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_ask_joins_message() {
        let cli = Cli::parse_from([
            "tripwise", "--config", "/tmp/t.toml", "ask", "-u", "alice", "What", "to", "pack?",
        ]);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/t.toml")));
        match cli.command() {
            Commands::Ask {
                user,
                session,
                message,
            } => {
                assert_eq!(user, "alice");
                assert_eq!(session, None);
                assert_eq!(message.join(" "), "What to pack?");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
