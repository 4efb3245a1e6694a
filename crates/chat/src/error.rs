//! Fehler der Chat-Domaene

use thiserror::Error;

/// Fehler beim Arbeiten mit Konversationen und Nachrichten
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Konversation nicht gefunden: {0}")]
    RaumNichtGefunden(String),

    #[error("Nachricht unbekannt: {0}")]
    NachrichtNichtGefunden(String),

    #[error("Dazu fehlt die Berechtigung: {0}")]
    KeineBerechtigung(String),

    #[error("Eingabe abgelehnt: {0}")]
    UngueltigeEingabe(String),

    /// Fehler aus dem darunterliegenden ConversationStore
    #[error("Fehler im Speicher-Backend: {0}")]
    Upstream(#[from] duplex_store::StoreError),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

pub type ChatResult<T> = Result<T, ChatError>;
