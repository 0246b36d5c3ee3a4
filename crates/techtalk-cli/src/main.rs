//! TechTalk CLI - a command line client for the TechTalk social network.
//!
//! Each subcommand starts the session store, restores any stored credential,
//! and then acts as one screen of the client.

mod commands;
mod output;

use std::io;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use techtalk_core::auth::open_storage;
use techtalk_core::{ApiClient, Config, SessionStore};

#[derive(Parser)]
#[command(name = "techtalk", version, about = "Command line client for TechTalk")]
struct Cli {
    /// Backend base URL (overrides config and TECHTALK_API_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Log in with an email or username
    Login {
        identifier: Option<String>,
    },
    /// Create an account and log in
    Register {
        username: String,
        email: String,
        /// Security question number, 0-5; prompted for when omitted
        #[arg(long)]
        question: Option<usize>,
    },
    /// Forget the stored credential
    Logout,
    /// Show the logged-in user
    Whoami,
    /// Show or edit your profile
    Profile {
        #[arg(long)]
        bio: Option<String>,
        /// Profile picture URL
        #[arg(long)]
        avatar: Option<String>,
    },
    /// Show another user's profile
    User {
        user_id: i64,
    },
    /// Show the home feed (public feed when logged out)
    Feed {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Publish a post
    Post {
        content: String,
        #[arg(long)]
        image: Option<String>,
        /// Comma-separated tags
        #[arg(long, value_delimiter = ',')]
        tags: Vec<String>,
    },
    /// Show one post with its comments
    Show {
        post_id: i64,
    },
    Like {
        post_id: i64,
    },
    Unlike {
        post_id: i64,
    },
    Comment {
        post_id: i64,
        content: String,
    },
    Follow {
        user_id: i64,
    },
    Unfollow {
        user_id: i64,
    },
    /// List notifications
    Notifications {
        /// Mark every notification as read
        #[arg(long)]
        read_all: bool,
    },
    /// List conversations, or read and write one
    Messages {
        /// Open the conversation with this user
        #[arg(long = "with")]
        with_user: Option<i64>,
        /// Send a message to the `--with` user
        #[arg(long, requires = "with_user")]
        send: Option<String>,
    },
    /// Search users and posts
    Search {
        query: String,
    },
    /// Trending tags and users
    Trending {
        #[arg(long, default_value_t = 10)]
        limit: u32,
    },
    /// Reset a forgotten password with the security answer
    ResetPassword {
        email: String,
    },
}

/// Initialize the tracing subscriber for logging
fn init_tracing() {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    init_tracing();

    let cli = Cli::parse();

    let mut config = Config::load()?;
    if let Some(url) = cli.api_url {
        config.api_url = url;
    }
    info!(api_url = %config.api_url, backend = ?config.credential_backend, "TechTalk starting");

    let api = ApiClient::from_config(&config)?;
    let storage = open_storage(&config)?;
    let session = SessionStore::spawn(&api, storage);

    let ctx = commands::Context {
        session,
        config,
        json: cli.json,
    };

    if let Err(e) = commands::run(&ctx, cli.command).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_messages_send() {
        let cli = Cli::try_parse_from(["techtalk", "messages", "--with", "7", "--send", "hi"]).unwrap();
        match cli.command {
            Command::Messages { with_user, send } => {
                assert_eq!(with_user, Some(7));
                assert_eq!(send.as_deref(), Some("hi"));
            }
            _ => panic!("expected messages"),
        }
    }

    #[test]
    fn test_send_requires_recipient() {
        assert!(Cli::try_parse_from(["techtalk", "messages", "--send", "hi"]).is_err());
    }

    #[test]
    fn test_parse_post_tags() {
        let cli = Cli::try_parse_from(["techtalk", "post", "Hello", "--tags", "rust,tokio"]).unwrap();
        match cli.command {
            Command::Post { content, tags, image } => {
                assert_eq!(content, "Hello");
                assert_eq!(tags, vec!["rust", "tokio"]);
                assert!(image.is_none());
            }
            _ => panic!("expected post"),
        }
    }

    #[test]
    fn test_global_flags() {
        let cli = Cli::try_parse_from(["techtalk", "feed", "--json", "--api-url", "http://example.test"]).unwrap();
        assert!(cli.json);
        assert_eq!(cli.api_url.as_deref(), Some("http://example.test"));
        assert!(matches!(cli.command, Command::Feed { limit: 20 }));
    }
}
