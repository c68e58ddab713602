//! CLI Supabase session helpers with secure keychain persistence.

#[cfg(test)]
use std::collections::HashMap;
#[cfg(test)]
use std::sync::{Mutex, OnceLock};

#[cfg(not(test))]
use keyring::Entry;

use tidewatch_core::auth::{
    resolve_optional_supabase_config, AuthError, AuthResult, AuthSession, SessionPersistence,
    SupabaseAuthClient,
};
use tidewatch_core::config::TidewatchConfig;

#[cfg(not(test))]
const KEYRING_SERVICE_NAME: &str = "tidewatch-cli";
const SESSION_ACCOUNT: &str = "supabase_session";

/// Session storage keyed by Supabase project, so switching projects never
/// reuses a foreign token.
#[derive(Clone)]
pub struct SessionStore {
    username: String,
}

impl SessionStore {
    pub fn for_project(supabase_url: &str) -> Self {
        Self {
            username: format!("{SESSION_ACCOUNT}:{}", supabase_url.trim_end_matches('/')),
        }
    }

    #[cfg(test)]
    fn test_store() -> &'static Mutex<HashMap<String, String>> {
        static STORE: OnceLock<Mutex<HashMap<String, String>>> = OnceLock::new();
        STORE.get_or_init(|| Mutex::new(HashMap::new()))
    }

    #[cfg(not(test))]
    fn entry(&self) -> AuthResult<Entry> {
        Entry::new(KEYRING_SERVICE_NAME, &self.username)
            .map_err(|error| AuthError::SecureStorage(error.to_string()))
    }
}

impl SessionPersistence for SessionStore {
    #[cfg(not(test))]
    fn load_session(&self) -> AuthResult<Option<AuthSession>> {
        let entry = self.entry()?;
        match entry.get_password() {
            Ok(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(error) => Err(AuthError::SecureStorage(error.to_string())),
        }
    }

    #[cfg(test)]
    fn load_session(&self) -> AuthResult<Option<AuthSession>> {
        let guard = Self::test_store()
            .lock()
            .map_err(|error| AuthError::SecureStorage(error.to_string()))?;
        guard
            .get(&self.username)
            .map(|raw| serde_json::from_str(raw))
            .transpose()
            .map_err(AuthError::from)
    }

    #[cfg(not(test))]
    fn save_session(&self, session: &AuthSession) -> AuthResult<()> {
        let raw = serde_json::to_string(session)?;
        self.entry()?
            .set_password(&raw)
            .map_err(|error| AuthError::SecureStorage(error.to_string()))
    }

    #[cfg(test)]
    fn save_session(&self, session: &AuthSession) -> AuthResult<()> {
        let raw = serde_json::to_string(session)?;
        Self::test_store()
            .lock()
            .map_err(|error| AuthError::SecureStorage(error.to_string()))?
            .insert(self.username.clone(), raw);
        Ok(())
    }

    #[cfg(not(test))]
    fn clear_session(&self) -> AuthResult<()> {
        match self.entry()?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(error) => Err(AuthError::SecureStorage(error.to_string())),
        }
    }

    #[cfg(test)]
    fn clear_session(&self) -> AuthResult<()> {
        Self::test_store()
            .lock()
            .map_err(|error| AuthError::SecureStorage(error.to_string()))?
            .remove(&self.username);
        Ok(())
    }
}

/// Supabase URL and anon key, if the config names a project
pub fn supabase_project(config: &TidewatchConfig) -> AuthResult<Option<(String, String)>> {
    resolve_optional_supabase_config(
        config.supabase_url.clone(),
        config.supabase_anon_key.clone(),
    )
}

pub fn auth_client(config: &TidewatchConfig) -> AuthResult<Option<SupabaseAuthClient<SessionStore>>> {
    let Some((url, anon_key)) = supabase_project(config)? else {
        return Ok(None);
    };
    let store = SessionStore::for_project(&url);
    Ok(Some(SupabaseAuthClient::new(&url, anon_key, store)?))
}

/// Stored session without touching the network (may be expired)
pub fn load_stored_session(config: &TidewatchConfig) -> AuthResult<Option<AuthSession>> {
    match supabase_project(config)? {
        Some((url, _)) => SessionStore::for_project(&url).load_session(),
        None => Ok(None),
    }
}

/// Owner to stamp on local writes: the signed-in user, if any
pub fn current_owner(config: &TidewatchConfig) -> Option<String> {
    match load_stored_session(config) {
        Ok(session) => session.map(|session| session.user.id),
        Err(error) => {
            tracing::warn!("Could not read stored session: {}", error);
            None
        }
    }
}
