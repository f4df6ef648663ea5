//! Bearer token storage and the logged-in user.
//!
//! Claims are decoded without verifying the signature. The subject is only a
//! display label here; every authorization decision is made by the backend.

use std::fmt::Debug;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::Deserialize;
use tracing::{debug, error, info, warn};

use crate::config::TOKEN_KEY;
use crate::error::{StorageError, TokenError};

#[derive(Debug, Deserialize)]
struct Claims {
    #[serde(default)]
    sub: Option<String>,
}

/// Read the `sub` claim from a JWT-shaped token.
pub fn decode_subject(token: &str) -> Result<String, TokenError> {
    let parts: Vec<&str> = token.trim().split('.').collect();
    if parts.len() != 3 {
        return Err(TokenError::Malformed(format!("expected 3 segments, found {}", parts.len())));
    }
    let payload = URL_SAFE_NO_PAD
        .decode(parts[1].trim_end_matches('='))
        .map_err(|e| TokenError::Malformed(e.to_string()))?;
    let claims: Claims =
        serde_json::from_slice(&payload).map_err(|e| TokenError::Malformed(e.to_string()))?;
    match claims.sub {
        Some(sub) if !sub.is_empty() => Ok(sub),
        _ => Err(TokenError::MissingSubject),
    }
}

/// Durable home of the single persisted token.
pub trait TokenStorage: Send + Sync + Debug {
    fn load(&self) -> Result<Option<String>, StorageError>;
    fn save(&self, token: &str) -> Result<(), StorageError>;
    fn remove(&self) -> Result<(), StorageError>;
}

/// Token kept in one file, typically `<data dir>/questionmate/authToken`.
#[derive(Debug, Clone)]
pub struct FileTokenStorage {
    path: PathBuf,
}

impl FileTokenStorage {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

impl TokenStorage for FileTokenStorage {
    fn load(&self) -> Result<Option<String>, StorageError> {
        match fs::read_to_string(&self.path) {
            Ok(content) => {
                let token = content.trim();
                Ok((!token.is_empty()).then(|| token.to_string()))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, token: &str) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, token)?;
        Ok(())
    }

    fn remove(&self) -> Result<(), StorageError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-process storage; clones share the same slot.
#[derive(Debug, Clone, Default)]
pub struct MemoryTokenStorage {
    slot: Arc<Mutex<Option<String>>>,
}

impl MemoryTokenStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Some(token.into()))),
        }
    }

    pub fn stored(&self) -> Option<String> {
        self.slot.lock().ok().and_then(|s| s.clone())
    }
}

fn poisoned() -> StorageError {
    StorageError::Io(std::io::Error::new(std::io::ErrorKind::Other, "token slot poisoned"))
}

impl TokenStorage for MemoryTokenStorage {
    fn load(&self) -> Result<Option<String>, StorageError> {
        Ok(self.slot.lock().map_err(|_| poisoned())?.clone())
    }

    fn save(&self, token: &str) -> Result<(), StorageError> {
        *self.slot.lock().map_err(|_| poisoned())? = Some(token.to_string());
        Ok(())
    }

    fn remove(&self) -> Result<(), StorageError> {
        *self.slot.lock().map_err(|_| poisoned())? = None;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub username: String,
}

/// The token/user pair, passed explicitly to whatever needs it.
///
/// Built with [`AuthContext::initialize`], which restores from storage, and
/// torn down with [`AuthContext::clear`].
#[derive(Debug)]
pub struct AuthContext {
    storage: Box<dyn TokenStorage>,
    token: Option<String>,
    user: Option<User>,
}

impl AuthContext {
    /// An empty, logged-out context. Nothing is read from storage.
    pub fn new(storage: Box<dyn TokenStorage>) -> Self {
        Self {
            storage,
            token: None,
            user: None,
        }
    }

    /// Create a context and restore any persisted token.
    pub fn initialize(storage: Box<dyn TokenStorage>) -> Self {
        let mut ctx = Self::new(storage);
        ctx.restore();
        ctx
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn username(&self) -> Option<&str> {
        self.user.as_ref().map(|u| u.username.as_str())
    }

    pub fn is_logged_in(&self) -> bool {
        self.token.is_some()
    }

    /// Adopt a freshly issued token.
    ///
    /// Undecodable tokens and tokens without a subject are logged and ignored;
    /// nothing changes. Returns whether the token was accepted.
    pub fn set(&mut self, token: &str) -> bool {
        let username = match decode_subject(token) {
            Ok(username) => username,
            Err(e) => {
                warn!(error = %e, "Failed to decode token");
                return false;
            }
        };
        if let Err(e) = self.storage.save(token) {
            error!(error = %e, key = TOKEN_KEY, "Failed to persist token");
            return false;
        }
        info!(username = %username, "Logged in");
        self.token = Some(token.to_string());
        self.user = Some(User { username });
        true
    }

    /// Load the persisted token, if any, without re-persisting it.
    ///
    /// A persisted token that cannot be decoded is removed from storage.
    pub fn restore(&mut self) {
        self.token = None;
        self.user = None;

        let stored = match self.storage.load() {
            Ok(Some(token)) => token,
            Ok(None) => {
                debug!(key = TOKEN_KEY, "No stored token");
                return;
            }
            Err(e) => {
                error!(error = %e, key = TOKEN_KEY, "Failed to read stored token");
                return;
            }
        };

        match decode_subject(&stored) {
            Ok(username) => {
                debug!(username = %username, "Restored session from stored token");
                self.token = Some(stored);
                self.user = Some(User { username });
            }
            Err(e) => {
                warn!(error = %e, key = TOKEN_KEY, "Invalid token in storage; removing it");
                if let Err(e) = self.storage.remove() {
                    error!(error = %e, "Failed to remove invalid token");
                }
            }
        }
    }

    /// Log out: forget the token in memory and in storage.
    pub fn clear(&mut self) {
        if let Err(e) = self.storage.remove() {
            error!(error = %e, key = TOKEN_KEY, "Failed to remove stored token");
        }
        self.token = None;
        self.user = None;
        info!("Logged out");
    }
}
