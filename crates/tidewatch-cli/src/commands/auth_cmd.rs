use std::path::Path;

use tidewatch_core::auth::SessionPersistence;

use crate::auth::{auth_client, load_stored_session, supabase_project, SessionStore};
use crate::commands::common::load_config;
use crate::error::CliError;

pub async fn run_auth_login(email: &str, password: &str, config_path: &Path) -> Result<(), CliError> {
    let config = load_config(config_path)?;
    let client = auth_client(&config)
        .map_err(|error| CliError::Auth(error.to_string()))?
        .ok_or(CliError::SyncNotConfigured)?;

    let session = client
        .sign_in(email, password)
        .await
        .map_err(|error| CliError::Auth(error.to_string()))?;
    let email_label = session.user.email.as_deref().unwrap_or("(no email)");
    println!("Signed in as {email_label}");
    Ok(())
}

pub fn run_auth_status(config_path: &Path) -> Result<(), CliError> {
    let config = load_config(config_path)?;
    if supabase_project(&config)
        .map_err(|error| CliError::Auth(error.to_string()))?
        .is_none()
    {
        println!("Sync is not configured.");
        return Ok(());
    }

    match load_stored_session(&config).map_err(|error| CliError::Auth(error.to_string()))? {
        Some(session) => {
            let email_label = session.user.email.as_deref().unwrap_or("(no email)");
            let state = if session.is_expired() {
                "expired; refreshed on next sync"
            } else {
                "active"
            };
            println!(
                "Signed in as {email_label} (user_id={}, {state})",
                session.user_id()
            );
        }
        None => println!("Not signed in."),
    }
    Ok(())
}

pub async fn run_auth_logout(config_path: &Path) -> Result<(), CliError> {
    let config = load_config(config_path)?;
    let Some((supabase_url, _)) =
        supabase_project(&config).map_err(|error| CliError::Auth(error.to_string()))?
    else {
        println!("Not signed in.");
        return Ok(());
    };
    let store = SessionStore::for_project(&supabase_url);
    let Some(session) = store
        .load_session()
        .map_err(|error| CliError::Auth(error.to_string()))?
    else {
        println!("Not signed in.");
        return Ok(());
    };

    let client = auth_client(&config)
        .map_err(|error| CliError::Auth(error.to_string()))?
        .ok_or(CliError::SyncNotConfigured)?;
    if let Err(error) = client.sign_out(&session.access_token).await {
        // The local session goes away even when the server is unreachable
        tracing::warn!("Remote sign-out failed: {}", error);
        store
            .clear_session()
            .map_err(|error| CliError::Auth(error.to_string()))?;
    }

    println!("Signed out");
    Ok(())
}
