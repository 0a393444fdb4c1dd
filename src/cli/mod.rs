//! Command-line interface for managing sessions.

pub mod auth;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Sign in to an OpenID Connect provider and manage stored sessions.
#[derive(Parser, Debug)]
#[command(name = "oidc-session", version, about = "OpenID Connect session CLI")]
pub struct Cli {
    /// Provider configuration file (TOML); environment variables are used when omitted
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory holding session files (default: ~/.oidc-session/sessions)
    #[arg(long, global = true)]
    pub sessions_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Sign in with username and password
    Login(LoginArgs),
    /// Sign in through the provider's login page
    BrowserLogin,
    /// Show stored sessions without refreshing them
    Status(StatusArgs),
    /// Refresh a session's access token if it is close to expiry
    Refresh(SessionArgs),
    /// End a session locally and at the provider
    Logout(SessionArgs),
}

/// Arguments for `oidc-session login`.
#[derive(Parser, Debug)]
pub struct LoginArgs {
    /// Username to sign in with
    pub username: String,

    /// Password (read from stdin when omitted)
    #[arg(short, long)]
    pub password: Option<String>,
}

/// Arguments for `oidc-session status`.
#[derive(Parser, Debug)]
pub struct StatusArgs {
    /// Session to show; all sessions are listed when omitted
    pub session_id: Option<String>,
}

/// Arguments naming a single session.
#[derive(Parser, Debug)]
pub struct SessionArgs {
    /// Session identifier printed by `login`
    pub session_id: String,
}
