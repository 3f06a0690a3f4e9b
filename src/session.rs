//! Browser sessions.
//!
//! A session maps an opaque random token, handed to the browser in the
//! [`SESSION_COOKIE`] cookie, to the name of the user that logged in with it.
//! Only the username is kept; the user record stays in the credential store.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use rand::{distributions::Alphanumeric, Rng};
use tracing::info;

use crate::credential_store::CredentialStore;
use crate::error::AppError;

pub const SESSION_COOKIE: &str = "sid";

const TOKEN_LENGTH: usize = 32;

pub type SessionToken = String;

#[derive(Debug)]
struct Session {
    username: String,
    created_at: DateTime<Utc>,
}

pub struct SessionManager {
    ttl: Duration,
    sessions: Mutex<HashMap<SessionToken, Session>>,
}

impl SessionManager {
    pub fn new(ttl: Duration) -> SessionManager {
        SessionManager {
            ttl,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Checks the credentials and opens a new session for the user.
    ///
    /// Fails with [`AppError::UnknownUser`] or [`AppError::WrongPassword`];
    /// nothing is stored in that case.
    pub fn login(
        &self,
        store: &CredentialStore,
        username: &str,
        password: &str,
    ) -> Result<SessionToken, AppError> {
        let user = store
            .find_by_username(username)?
            .ok_or(AppError::UnknownUser)?;

        if !store.verify_password(&user, password) {
            return Err(AppError::WrongPassword);
        }

        let token = new_token();
        let session = Session {
            username: user.username,
            created_at: Utc::now(),
        };

        info!("{} logged in", session.username);
        self.lock().insert(token.clone(), session);
        Ok(token)
    }

    pub fn resolve(&self, token: &str) -> Option<String> {
        let now = Utc::now();
        let mut sessions = self.lock();

        match sessions.get(token) {
            Some(session) if !self.is_expired(session, now) => {
                return Some(session.username.clone())
            }
            Some(_) => {}
            None => return None,
        }

        sessions.remove(token);
        None
    }

    pub fn logout(&self, token: &str) {
        if let Some(session) = self.lock().remove(token) {
            info!("{} logged out", session.username);
        }
    }

    /// Drops every expired session and returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let mut sessions = self.lock();
        let before = sessions.len();
        sessions.retain(|_, session| !self.is_expired(session, now));
        before - sessions.len()
    }

    fn is_expired(&self, session: &Session, now: DateTime<Utc>) -> bool {
        now - session.created_at >= self.ttl
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<SessionToken, Session>> {
        self.sessions.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn new_token() -> SessionToken {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LENGTH)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_alice() -> CredentialStore {
        let store = CredentialStore::open_in_memory().unwrap();
        store.register("alice", "pw1").unwrap();
        store
    }

    #[test]
    fn login_then_resolve() {
        let store = store_with_alice();
        let sessions = SessionManager::new(Duration::hours(1));

        let token = sessions.login(&store, "alice", "pw1").unwrap();
        assert_eq!(token.len(), TOKEN_LENGTH);
        assert_eq!(sessions.resolve(&token).as_deref(), Some("alice"));
    }

    #[test]
    fn unknown_user_and_wrong_password_are_distinct() {
        let store = store_with_alice();
        let sessions = SessionManager::new(Duration::hours(1));

        assert!(matches!(
            sessions.login(&store, "bob", "pw1"),
            Err(AppError::UnknownUser)
        ));
        assert!(matches!(
            sessions.login(&store, "alice", "wrongpw"),
            Err(AppError::WrongPassword)
        ));
        assert!(sessions.lock().is_empty());
    }

    #[test]
    fn logout_invalidates_token_and_is_idempotent() {
        let store = store_with_alice();
        let sessions = SessionManager::new(Duration::hours(1));
        let token = sessions.login(&store, "alice", "pw1").unwrap();

        sessions.logout(&token);
        assert_eq!(sessions.resolve(&token), None);
        sessions.logout(&token);
        assert_eq!(sessions.resolve(&token), None);
    }

    #[test]
    fn each_login_gets_its_own_session() {
        let store = store_with_alice();
        let sessions = SessionManager::new(Duration::hours(1));
        let first = sessions.login(&store, "alice", "pw1").unwrap();
        let second = sessions.login(&store, "alice", "pw1").unwrap();

        assert_ne!(first, second);
        sessions.logout(&first);
        assert_eq!(sessions.resolve(&second).as_deref(), Some("alice"));
    }

    #[test]
    fn unknown_token_resolves_to_nobody() {
        let sessions = SessionManager::new(Duration::hours(1));
        assert_eq!(sessions.resolve("nope"), None);
        assert_eq!(sessions.resolve(""), None);
    }

    #[test]
    fn expired_sessions_are_dropped() {
        let store = store_with_alice();
        let sessions = SessionManager::new(Duration::zero());
        let token = sessions.login(&store, "alice", "pw1").unwrap();

        assert_eq!(sessions.resolve(&token), None);
        assert!(sessions.lock().is_empty());
    }

    #[test]
    fn purge_removes_only_expired_sessions() {
        let store = store_with_alice();
        let sessions = SessionManager::new(Duration::hours(1));
        let live = sessions.login(&store, "alice", "pw1").unwrap();
        sessions.lock().insert(
            "stale".to_string(),
            Session {
                username: "alice".to_string(),
                created_at: Utc::now() - Duration::hours(2),
            },
        );

        assert_eq!(sessions.purge_expired(), 1);
        assert_eq!(sessions.resolve("stale"), None);
        assert_eq!(sessions.resolve(&live).as_deref(), Some("alice"));
    }
}
