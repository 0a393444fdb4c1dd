//! CLI command handlers.

use std::io::Write;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::{Cli, Commands, LoginArgs, SessionArgs, StatusArgs};
use crate::auth::error::AuthError;
use crate::config::OidcConfig;
use crate::session::{FileSessionStore, SessionId, SessionManager, StoredSession};

/// Run a parsed command line.
pub async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let sessions = build_manager(&cli)?;
    match cli.command {
        Commands::Login(args) => handle_login(&sessions, args).await,
        Commands::BrowserLogin => handle_browser_login(&sessions).await,
        Commands::Status(args) => handle_status(&sessions, args),
        Commands::Refresh(args) => handle_refresh(&sessions, args).await,
        Commands::Logout(args) => handle_logout(&sessions, args).await,
    }
}

fn build_manager(cli: &Cli) -> Result<SessionManager, AuthError> {
    let config = match &cli.config {
        Some(path) => OidcConfig::from_toml_file(path)?,
        None => OidcConfig::from_env()?,
    };
    let store = match &cli.sessions_dir {
        Some(dir) => FileSessionStore::new(dir.clone()),
        None => FileSessionStore::new_default(),
    };
    SessionManager::keycloak(config, Arc::new(store))
}

async fn handle_login(
    sessions: &SessionManager,
    args: LoginArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let password = match args.password {
        Some(password) => password,
        None => prompt("Password: ")?,
    };
    let session = sessions
        .sign_in_with_password(&args.username, &password)
        .await?;
    println!("Signed in as {}", display_user(&session.user));
    println!("Session: {}", session.id);
    Ok(())
}

async fn handle_browser_login(
    sessions: &SessionManager,
) -> Result<(), Box<dyn std::error::Error>> {
    let authorization = sessions.start_browser_sign_in()?;
    println!("Visit: {}", authorization.authorize_url);
    println!("After signing in, paste the URL you were redirected to:");
    let callback = prompt("> ")?;
    if callback.is_empty() {
        return Err("no callback provided".into());
    }
    let session = sessions
        .sign_in_with_callback(&authorization, &callback)
        .await?;
    println!("Signed in as {}", display_user(&session.user));
    println!("Session: {}", session.id);
    Ok(())
}

fn handle_status(
    sessions: &SessionManager,
    args: StatusArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let ids = match args.session_id {
        Some(id) => vec![SessionId::from(id)],
        None => sessions.list_sessions()?,
    };
    if ids.is_empty() {
        println!("No sessions");
        return Ok(());
    }
    for id in ids {
        match sessions.inspect(&id)? {
            Some(stored) => println!("{}", describe(&id, &stored, Utc::now())),
            None => println!("{id}: not found"),
        }
    }
    Ok(())
}

async fn handle_refresh(
    sessions: &SessionManager,
    args: SessionArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let id = SessionId::from(args.session_id);
    match sessions.current_session(&id).await? {
        Some(session) => {
            let expiry = session
                .expires_at
                .map(|at| at.to_rfc3339())
                .unwrap_or_else(|| "unknown".to_string());
            println!("{id}: valid until {expiry}");
            Ok(())
        }
        None => Err(format!("{id}: session expired or unknown, sign in again").into()),
    }
}

async fn handle_logout(
    sessions: &SessionManager,
    args: SessionArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let id = SessionId::from(args.session_id);
    if sessions.sign_out(&id).await? {
        println!("{id}: signed out");
    } else {
        println!("{id}: not found");
    }
    Ok(())
}

fn prompt(label: &str) -> std::io::Result<String> {
    eprint!("{label}");
    std::io::stderr().flush()?;
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

fn display_user(user: &crate::auth::UserProfile) -> &str {
    user.display_name().unwrap_or("unknown user")
}

fn describe(id: &SessionId, stored: &StoredSession, now: DateTime<Utc>) -> String {
    let user = display_user(&stored.user);
    if let Some(error) = &stored.record.error {
        return format!("{id}: {user}, failed ({error})");
    }
    match stored.record.expires_at_utc() {
        Some(expires_at) if expires_at > now => format!(
            "{id}: {user}, access token expires in {}s",
            (expires_at - now).num_seconds()
        ),
        Some(_) => format!("{id}: {user}, access token expired (refresh pending)"),
        None => format!("{id}: {user}, no expiry"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{TokenRecord, UserProfile, REFRESH_ACCESS_TOKEN_ERROR};

    fn stored(expires_at: Option<i64>, error: Option<&str>) -> StoredSession {
        StoredSession {
            record: TokenRecord {
                access_token: Some("access".to_string()),
                expires_at,
                error: error.map(str::to_string),
                ..Default::default()
            },
            user: UserProfile {
                preferred_username: Some("hyurt".to_string()),
                ..Default::default()
            },
            created_at: Utc::now(),
        }
    }

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(secs, 0).unwrap()
    }

    #[test]
    fn describe_reports_remaining_lifetime() {
        let id = SessionId::from("s1");
        assert_eq!(
            describe(&id, &stored(Some(1_300), None), at(1_000)),
            "s1: hyurt, access token expires in 300s"
        );
    }

    #[test]
    fn describe_reports_expired_and_failed() {
        let id = SessionId::from("s1");
        assert!(describe(&id, &stored(Some(900), None), at(1_000)).contains("expired"));
        assert!(describe(
            &id,
            &stored(Some(900), Some(REFRESH_ACCESS_TOKEN_ERROR)),
            at(1_000)
        )
        .contains(REFRESH_ACCESS_TOKEN_ERROR));
        assert!(describe(&id, &stored(None, None), at(1_000)).ends_with("no expiry"));
    }
}
