//! Core runtime configuration.
//!
//! Configuration is resolved once at process startup and passed into services
//! by reference. Nothing in this crate reads process-wide environment
//! variables during request handling; doing so leads to inconsistent
//! behaviour in multi-threaded runtimes and test harnesses.

use crate::constants::DATABASE_FILE_NAME;
use crate::{StoreError, StoreResult};
use std::path::{Path, PathBuf};

/// Startup-resolved configuration for the document store.
#[derive(Clone, Debug)]
pub struct StoreConfig {
    storage_root: PathBuf,
    auth_enabled: bool,
    test_auth: bool,
    allowed_users: Vec<String>,
}

impl StoreConfig {
    /// Create a new `StoreConfig`.
    ///
    /// `storage_root` is where the metadata index, document payloads, and
    /// thumbnails live. `allowed_users` is only consulted when `auth_enabled`
    /// is set; `test_auth` enables issuing test-mode session tokens.
    pub fn new(
        storage_root: PathBuf,
        auth_enabled: bool,
        test_auth: bool,
        allowed_users: Vec<String>,
    ) -> StoreResult<Self> {
        if storage_root.as_os_str().is_empty() {
            return Err(StoreError::Validation(
                "storage_root cannot be empty".into(),
            ));
        }

        Ok(Self {
            storage_root,
            auth_enabled,
            test_auth,
            allowed_users,
        })
    }

    pub fn storage_root(&self) -> &Path {
        &self.storage_root
    }

    /// Location of the metadata index: `{root}/database.db`.
    pub fn database_path(&self) -> PathBuf {
        self.storage_root.join(DATABASE_FILE_NAME)
    }

    pub fn auth_enabled(&self) -> bool {
        self.auth_enabled
    }

    pub fn test_auth(&self) -> bool {
        self.test_auth
    }

    pub fn allowed_users(&self) -> &[String] {
        &self.allowed_users
    }
}

/// Parse a boolean configuration value from an optional env string.
///
/// Only the literal `"true"` (after trimming) enables a flag; everything
/// else, including absence, is `false`.
pub fn bool_from_env_value(value: Option<String>) -> bool {
    value.map(|v| v.trim() == "true").unwrap_or(false)
}

/// Parse a comma-separated user list from an optional env string.
///
/// Empty segments are dropped, so `"alice,,bob,"` yields two users.
pub fn users_from_env_value(value: Option<String>) -> Vec<String> {
    value
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|u| !u.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
