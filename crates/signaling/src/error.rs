//! Fehlerkontrakt des Signaling-Service
//!
//! Buendelt die Fehler der Kollaborateure (Auth, Chat, IO) mit den
//! signaling-eigenen Zustaenden. Richtung Client wird daraus ueber
//! [`chat_fehlercode`] bzw. die Handler ein `ErrorCode` im Protokoll.

use duplex_auth::AuthError;
use duplex_chat::ChatError;
use duplex_protocol::control::ErrorCode;
use thiserror::Error;

/// Fehler im Signaling-Service
#[derive(Debug, Error)]
pub enum SignalingError {
    #[error("Socket-Fehler: {0}")]
    Io(#[from] std::io::Error),

    #[error("Authentifizierung: {0}")]
    Auth(#[from] AuthError),

    #[error("Chat: {0}")]
    Chat(#[from] ChatError),

    /// Gegenstelle hat die Verbindung aufgegeben
    #[error("Client hat die Verbindung getrennt")]
    VerbindungGetrennt,

    /// Frame war lesbar, ergab aber im aktuellen Zustand keinen Sinn
    #[error("Protokollverletzung: {0}")]
    Protokoll(String),

    /// Teilnehmer steckt bereits in einem Anruf
    #[error("Besetzt")]
    Besetzt,

    /// Zielbenutzer haelt keine aktive Session
    #[error("Nicht erreichbar")]
    NichtErreichbar,

    #[error("Client-Limit erreicht")]
    ServerVoll,

    /// Send-Queue des Clients ist geschlossen oder voll
    #[error("Zustellung an Client fehlgeschlagen")]
    SendFehler,

    #[error("Zeitueberschreitung")]
    Timeout,

    #[error("Interner Fehler im Signaling: {0}")]
    Intern(String),
}

impl SignalingError {
    pub fn intern(msg: impl Into<String>) -> Self {
        Self::Intern(msg.into())
    }

    pub fn protokoll(msg: impl Into<String>) -> Self {
        Self::Protokoll(msg.into())
    }
}

/// Uebersetzt einen ChatError in den passenden Protokoll-Fehlercode
pub fn chat_fehlercode(fehler: &ChatError) -> ErrorCode {
    match fehler {
        ChatError::RaumNichtGefunden(_) | ChatError::NachrichtNichtGefunden(_) => {
            ErrorCode::NotFound
        }
        ChatError::KeineBerechtigung(_) => ErrorCode::AccessDenied,
        ChatError::UngueltigeEingabe(_) => ErrorCode::ValidationFailed,
        ChatError::Upstream(_) => ErrorCode::UpstreamFailed,
        ChatError::Anyhow(_) => ErrorCode::InternalError,
    }
}

/// Result-Alias der Signaling-Crate
pub type SignalingResult<T> = Result<T, SignalingError>;
