//! Session tokens and the request authorization gate.
//!
//! The session table is an explicit value owned by the application state and
//! passed into the gate by reference — process-wide lifetime, but no ambient
//! singleton. Tokens live for the lifetime of the process; restarting the
//! server invalidates them all.

use crate::constants::TOKEN_PREFIX;
use crate::{StoreConfig, StoreError, StoreResult};
use docstore_uuid::StorageId;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

/// In-memory access-token → username table.
#[derive(Debug, Default)]
pub struct SessionStore {
    tokens: RwLock<HashMap<String, String>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issues a fresh session token for `username`.
    ///
    /// Used by the test-mode login endpoint; a real identity provider would
    /// call this after its own exchange completes.
    pub fn issue(&self, username: &str) -> String {
        let token = format!("{}{}", TOKEN_PREFIX, StorageId::new());
        self.tokens
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(token.clone(), username.to_string());
        tracing::info!(username, "issued session token");
        token
    }

    /// Resolves a token to its username, if the session exists.
    pub fn resolve(&self, token: &str) -> Option<String> {
        self.tokens
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(token)
            .cloned()
    }
}

/// Authorizes a request against `path_username` and returns the
/// authenticated username.
///
/// Gate rules:
/// - With auth or test-auth enabled, `token` must resolve to a session,
///   otherwise [`StoreError::Unauthenticated`].
/// - With real auth enabled, the session's user must be in the allowed-users
///   list, otherwise [`StoreError::NotApproved`].
/// - The authenticated user must match the user named in the request path,
///   otherwise [`StoreError::Ownership`] — a caller can never address
///   another user's documents even with a valid token.
/// - With both auth modes disabled the path username is trusted as-is (open
///   mode for local single-user deployments).
pub fn authorize_request(
    cfg: &StoreConfig,
    sessions: &SessionStore,
    token: Option<&str>,
    path_username: &str,
) -> StoreResult<String> {
    if !cfg.auth_enabled() && !cfg.test_auth() {
        return Ok(path_username.to_string());
    }

    let username = token
        .and_then(|token| sessions.resolve(token))
        .ok_or(StoreError::Unauthenticated)?;

    if cfg.auth_enabled() && !cfg.allowed_users().iter().any(|u| u == &username) {
        tracing::warn!(username, "rejected user outside allowed list");
        return Err(StoreError::NotApproved);
    }

    if username != path_username {
        return Err(StoreError::Ownership);
    }

    Ok(username)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn config(auth_enabled: bool, test_auth: bool, allowed: &[&str]) -> StoreConfig {
        StoreConfig::new(
            PathBuf::from("/tmp/docstore-test"),
            auth_enabled,
            test_auth,
            allowed.iter().map(|u| u.to_string()).collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_issue_and_resolve() {
        let sessions = SessionStore::new();
        let token = sessions.issue("user1");
        assert!(token.starts_with("token-"));
        assert_eq!(sessions.resolve(&token).as_deref(), Some("user1"));
    }

    #[test]
    fn test_resolve_unknown_token() {
        let sessions = SessionStore::new();
        assert_eq!(sessions.resolve("token-bogus"), None);
    }

    #[test]
    fn test_tokens_are_unique() {
        let sessions = SessionStore::new();
        assert_ne!(sessions.issue("user1"), sessions.issue("user1"));
    }

    #[test]
    fn test_open_mode_trusts_path_user() {
        let cfg = config(false, false, &[]);
        let sessions = SessionStore::new();
        let user = authorize_request(&cfg, &sessions, None, "user1").unwrap();
        assert_eq!(user, "user1");
    }

    #[test]
    fn test_test_auth_requires_token() {
        let cfg = config(false, true, &[]);
        let sessions = SessionStore::new();

        let result = authorize_request(&cfg, &sessions, None, "user1");
        assert!(matches!(result, Err(StoreError::Unauthenticated)));

        let result = authorize_request(&cfg, &sessions, Some("token-bogus"), "user1");
        assert!(matches!(result, Err(StoreError::Unauthenticated)));

        let token = sessions.issue("user1");
        let user = authorize_request(&cfg, &sessions, Some(&token), "user1").unwrap();
        assert_eq!(user, "user1");
    }

    #[test]
    fn test_path_user_mismatch_is_ownership_error() {
        let cfg = config(false, true, &[]);
        let sessions = SessionStore::new();
        let token = sessions.issue("user1");

        let result = authorize_request(&cfg, &sessions, Some(&token), "user2");
        assert!(matches!(result, Err(StoreError::Ownership)));
    }

    #[test]
    fn test_auth_enabled_checks_allowed_users() {
        let cfg = config(true, false, &["alice"]);
        let sessions = SessionStore::new();

        let token = sessions.issue("mallory");
        let result = authorize_request(&cfg, &sessions, Some(&token), "mallory");
        assert!(matches!(result, Err(StoreError::NotApproved)));

        let token = sessions.issue("alice");
        let user = authorize_request(&cfg, &sessions, Some(&token), "alice").unwrap();
        assert_eq!(user, "alice");
    }
}
