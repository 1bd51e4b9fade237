//! Login session persistence.
//!
//! A session is created by a successful login and read back by every other
//! command through a [`SessionStore`]. Reading goes through
//! [`current_session`], which validates the stored record and expires it.

use crate::models::{LoginUser, Role};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// The logged-in user and the validity window of the login.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub email: String,
    pub role: Role,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// Session for `user`, valid for `ttl` from `now`.
    pub fn new(user: LoginUser, now: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            email: user.email,
            role: user.role,
            issued_at: now,
            expires_at: now + ttl,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// A stored record is usable only with an email and a sane window.
    fn is_well_formed(&self) -> bool {
        !self.email.trim().is_empty() && self.expires_at > self.issued_at
    }

    /// Fails with [`SessionError::Forbidden`] unless the role may see reports.
    pub fn require_report_access(&self) -> Result<(), SessionError> {
        if self.role.can_view_reports() {
            Ok(())
        } else {
            Err(SessionError::Forbidden { role: self.role })
        }
    }
}

/// Errors from loading, storing or checking a session.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("No hay ninguna sesión iniciada (usa `leadboard login`)")]
    NotLoggedIn,

    #[error("La sesión caducó el {expired_at}; vuelve a iniciar sesión")]
    Expired { expired_at: DateTime<Utc> },

    #[error("El rol '{role}' no tiene acceso a los informes")]
    Forbidden { role: Role },

    #[error("Session file {path} is not valid: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to access session file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize session: {0}")]
    Serialize(#[source] serde_json::Error),
}

/// Storage backend for the current session.
pub trait SessionStore {
    /// The stored session, or `None` when nobody is logged in.
    fn load(&self) -> Result<Option<Session>, SessionError>;

    fn save(&self, session: &Session) -> Result<(), SessionError>;

    /// Remove the stored session. Clearing an empty store is not an error.
    fn clear(&self) -> Result<(), SessionError>;
}

/// Session stored as a JSON file.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> SessionError {
        SessionError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self) -> Result<Option<Session>, SessionError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.io_error(e)),
        };

        serde_json::from_str(&content)
            .map(Some)
            .map_err(|source| SessionError::Corrupt {
                path: self.path.clone(),
                source,
            })
    }

    fn save(&self, session: &Session) -> Result<(), SessionError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
            }
        }

        let json = serde_json::to_string_pretty(session).map_err(SessionError::Serialize)?;
        std::fs::write(&self.path, json).map_err(|e| self.io_error(e))?;
        debug!("Session saved to {}", self.path.display());
        Ok(())
    }

    fn clear(&self) -> Result<(), SessionError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.io_error(e)),
        }
    }
}

/// In-process session store.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    session: std::cell::RefCell<Option<Session>>,
}

#[cfg(test)]
impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session(session: Session) -> Self {
        Self {
            session: std::cell::RefCell::new(Some(session)),
        }
    }
}

#[cfg(test)]
impl SessionStore for MemorySessionStore {
    fn load(&self) -> Result<Option<Session>, SessionError> {
        Ok(self.session.borrow().clone())
    }

    fn save(&self, session: &Session) -> Result<(), SessionError> {
        *self.session.borrow_mut() = Some(session.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), SessionError> {
        self.session.borrow_mut().take();
        Ok(())
    }
}

/// Load, validate and expire the stored session.
///
/// Expired and malformed records are removed from the store. A corrupt
/// store is cleared and treated as logged out.
pub fn current_session<S: SessionStore>(
    store: &S,
    now: DateTime<Utc>,
) -> Result<Session, SessionError> {
    let session = match store.load() {
        Ok(Some(session)) => session,
        Ok(None) => return Err(SessionError::NotLoggedIn),
        Err(e @ SessionError::Corrupt { .. }) => {
            warn!("Discarding unreadable session: {}", e);
            store.clear()?;
            return Err(SessionError::NotLoggedIn);
        }
        Err(e) => return Err(e),
    };

    if !session.is_well_formed() {
        warn!("Discarding malformed session for '{}'", session.email);
        store.clear()?;
        return Err(SessionError::NotLoggedIn);
    }

    if session.is_expired(now) {
        debug!("Session for {} expired at {}", session.email, session.expires_at);
        store.clear()?;
        return Err(SessionError::Expired {
            expired_at: session.expires_at,
        });
    }

    Ok(session)
}
