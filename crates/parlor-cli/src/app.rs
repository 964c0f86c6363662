//! Application wiring for the parlor CLI.
//!
//! `App` owns the configuration, the session controller and the route
//! guard, and implements each subcommand on top of them.

use std::io::{self, Write};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use parlor_core::auth::{open_store, spawn_refresh_loop, RefreshOutcome, SessionController};
use parlor_core::guard::{default_routes, Navigation, RouteGuard};
use parlor_core::{ApiClient, Config, Credentials, Registration};

/// Environment variable consulted before prompting for a password.
const ENV_PASSWORD: &str = "PARLOR_PASSWORD";

pub struct App {
    config: Config,
    controller: Arc<SessionController>,
    guard: RouteGuard,
}

impl App {
    pub fn new() -> Result<Self> {
        let config = match Config::load() {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, "Failed to load config, using defaults");
                Config::default()
            }
        };
        debug!(api_url = %config.api_url, store = ?config.credential_store, "Config loaded");

        let api = ApiClient::from_config(&config).context("Failed to build HTTP client")?;
        let store = open_store(&config)?;
        let controller = Arc::new(
            SessionController::new(Arc::new(api), store).with_ttl_days(config.cookie_ttl_days),
        );
        let guard = RouteGuard::new(controller.clone(), default_routes());

        Ok(Self {
            config,
            controller,
            guard,
        })
    }

    pub async fn status(&self) -> Result<()> {
        self.controller.init().await;
        let snapshot = self.controller.session().snapshot();
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        Ok(())
    }

    pub async fn whoami(&self) -> Result<()> {
        self.controller.init().await;
        match self.controller.session().user() {
            Some(user) => println!("{}", serde_json::to_string_pretty(&user)?),
            None => println!("Not logged in"),
        }
        Ok(())
    }

    pub async fn login(&mut self, username: Option<String>) -> Result<()> {
        let username = match username.or_else(|| self.config.last_username.clone()) {
            Some(u) if !u.is_empty() => u,
            _ => prompt("Username: ")?,
        };
        let password = read_password()?;

        match self
            .controller
            .login(&Credentials::new(username.clone(), password))
            .await
        {
            Ok(user) => {
                self.config.last_username = Some(username);
                if let Err(e) = self.config.save() {
                    warn!(error = %e, "Failed to save config");
                }
                println!(
                    "Logged in as {}",
                    user.username().unwrap_or("(unnamed user)")
                );
                Ok(())
            }
            Err(e) => Err(anyhow::anyhow!(e.user_message())),
        }
    }

    pub async fn register(&self, username: String, email: String) -> Result<()> {
        let password = read_password()?;
        self.controller
            .register(&Registration::new(username, email, password))
            .await
            .map_err(|e| anyhow::anyhow!(e.user_message()))?;
        println!("Registration successful. You can now log in.");
        Ok(())
    }

    pub async fn logout(&self) -> Result<()> {
        self.controller.logout().await;
        println!("Logged out");
        Ok(())
    }

    pub async fn refresh(&self) -> Result<()> {
        self.controller.init().await;
        match self.controller.refresh_token().await {
            RefreshOutcome::Refreshed => println!("Token refreshed"),
            RefreshOutcome::NotAuthenticated => println!("Not logged in"),
            RefreshOutcome::LoggedOut => println!("Session expired. Please log in again."),
            outcome => println!("Refresh skipped ({:?})", outcome),
        }
        Ok(())
    }

    /// Keep the session fresh on the configured schedule until Ctrl-C.
    pub async fn watch(&self) -> Result<()> {
        self.controller.init().await;
        if !self.controller.session().is_authenticated() {
            println!("Not logged in");
            return Ok(());
        }

        let interval = self.config.refresh_interval();
        let handle = spawn_refresh_loop(
            self.controller.clone(),
            interval,
            self.config.refresh_buffer(),
        );
        info!(interval_secs = interval.as_secs(), "Watching session");
        println!("Keeping session alive, Ctrl-C to stop");

        tokio::signal::ctrl_c()
            .await
            .context("Failed to listen for Ctrl-C")?;
        handle.stop().await;

        let snapshot = self.controller.session().snapshot();
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        Ok(())
    }

    pub async fn navigate(&self, path: &str) -> Result<()> {
        match self.guard.check(path).await {
            Navigation::Proceed => println!("proceed {}", path),
            Navigation::Redirect(to) => println!("redirect {}", to),
        }
        Ok(())
    }
}

fn prompt(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

fn read_password() -> Result<String> {
    if let Ok(password) = std::env::var(ENV_PASSWORD) {
        if !password.is_empty() {
            return Ok(password);
        }
    }
    let password = rpassword::prompt_password("Password: ")?;
    Ok(password)
}
