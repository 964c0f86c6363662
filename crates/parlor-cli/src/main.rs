//! parlor - command-line client for Parlor chat sessions.
//!
//! Logs in, restores and refreshes the stored session, and answers route
//! guard questions the same way the chat front end does.

mod app;

use std::io;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use app::App;

const USAGE: &str = "\
Usage: parlor <command> [args]

Commands:
  status                      Restore the session and print it as JSON
  whoami                      Print the signed-in user's profile
  login [username]            Sign in (password from PARLOR_PASSWORD or prompt)
  logout                      Sign out and forget the stored token
  register <username> <email> Create an account
  refresh                     Exchange the current token for a new one
  watch                       Refresh the token on schedule until Ctrl-C
  navigate <path>             Show what the route guard decides for <path>";

/// Initialize the tracing subscriber for logging
fn init_tracing() {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));

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

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first().map(String::as_str) else {
        eprintln!("{}", USAGE);
        std::process::exit(2);
    };

    let mut app = App::new()?;
    info!(command, "parlor starting");

    match (command, &args[1..]) {
        ("status", []) => app.status().await,
        ("whoami", []) => app.whoami().await,
        ("login", []) => app.login(None).await,
        ("login", [username]) => app.login(Some(username.clone())).await,
        ("logout", []) => app.logout().await,
        ("register", [username, email]) => app.register(username.clone(), email.clone()).await,
        ("refresh", []) => app.refresh().await,
        ("watch", []) => app.watch().await,
        ("navigate", [path]) => app.navigate(path).await,
        ("help" | "--help" | "-h", _) => {
            println!("{}", USAGE);
            Ok(())
        }
        _ => {
            eprintln!("{}", USAGE);
            std::process::exit(2);
        }
    }
}
