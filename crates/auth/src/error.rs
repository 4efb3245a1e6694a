//! Fehler der Token-Verifikation

use thiserror::Error;

/// Fehler beim Verifizieren von Bearer-Tokens
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Token unbekannt oder abgelaufen")]
    TokenUngueltig,

    #[error("Interner Auth-Fehler: {0}")]
    Intern(String),
}

impl AuthError {
    pub fn intern(msg: impl Into<String>) -> Self {
        Self::Intern(msg.into())
    }
}

/// Result-Alias fuer die Auth-Crate
pub type AuthResult<T> = Result<T, AuthError>;
