//! Fehler der Persistenzschicht

use thiserror::Error;

/// Ergebnis-Alias fuer Store-Operationen
pub type StoreResult<T> = Result<T, StoreError>;

/// Fehler, die ein ConversationStore melden kann
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Datensatz fehlt: {0}")]
    NichtGefunden(String),

    #[error("Daten nicht verwertbar: {0}")]
    UngueltigeDaten(String),

    #[error("JSON-Verarbeitung fehlgeschlagen: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Interner Store-Fehler: {0}")]
    Intern(String),
}

impl StoreError {
    pub fn nicht_gefunden(msg: impl Into<String>) -> Self {
        Self::NichtGefunden(msg.into())
    }

    pub fn ungueltige_daten(msg: impl Into<String>) -> Self {
        Self::UngueltigeDaten(msg.into())
    }

    pub fn intern(msg: impl Into<String>) -> Self {
        Self::Intern(msg.into())
    }
}
