//! Gemeinsamer Fehlertyp fuer Duplex
//!
//! Die Fach-Crates definieren eigene, engere Fehler-Enums; dieser Typ
//! ist das Vokabular an den Naehten dazwischen (etwa fuer externe
//! Kollaborateure wie Push-Sinks) und fuer alles, was keine eigene
//! Fehlerdomaene rechtfertigt.

use thiserror::Error;

/// Globaler Result-Alias fuer Duplex
pub type Result<T> = std::result::Result<T, DuplexError>;

/// Fehlerzustaende, die ueber Crate-Grenzen hinweg auftauchen
#[derive(Debug, Error)]
pub enum DuplexError {
    #[error("Verbindungsaufbau fehlgeschlagen: {0}")]
    Verbindung(String),

    #[error("Gegenstelle hat die Verbindung beendet: {0}")]
    Getrennt(String),

    #[error("Wartezeit abgelaufen: {0}")]
    Zeitlimit(String),

    #[error("Unerwarteter interner Fehler: {0}")]
    Intern(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl DuplexError {
    /// Interner Fehler mit frei formulierter Nachricht
    pub fn intern(msg: impl Into<String>) -> Self {
        Self::Intern(msg.into())
    }

    /// Ob ein erneuter Versuch Aussicht auf Erfolg hat
    ///
    /// Transiente Netzwerkfehler ja, alles andere nein.
    pub fn ist_wiederholbar(&self) -> bool {
        matches!(
            self,
            Self::Verbindung(_) | Self::Getrennt(_) | Self::Zeitlimit(_)
        )
    }
}
