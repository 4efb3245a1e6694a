//! Speicher-Modelle fuer Duplex
//!
//! Diese Typen repraesentieren Datensaetze aus dem Nachrichten-Speicher.
//! Sie sind von den Protokoll-Typen getrennt und dienen als reine
//! Datenuebertragungsobjekte.

use chrono::{DateTime, Utc};
use duplex_core::types::NachrichtenTyp;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Konversationen
// ---------------------------------------------------------------------------

/// Konversations-Datensatz
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KonversationRecord {
    pub id: Uuid,
    /// Teilnehmer der Konversation (genau zwei bei Direkt-Konversationen)
    pub participants: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Nachrichten
// ---------------------------------------------------------------------------

/// Zustell-Quittung eines Empfaengers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Zustellung {
    pub user_id: Uuid,
    pub delivered_at: DateTime<Utc>,
}

/// Lese-Quittung eines Empfaengers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeseQuittung {
    pub user_id: Uuid,
    pub read_at: DateTime<Utc>,
}

/// Nachrichten-Datensatz aus dem Speicher
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NachrichtRecord {
    pub id: Uuid,
    pub room_id: Uuid,
    pub sender_id: Uuid,
    /// Original-Inhalt, auch nach Soft-Delete erhalten
    pub content: String,
    pub message_type: NachrichtenTyp,
    pub created_at: DateTime<Utc>,
    pub edited_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub delivered_to: Vec<Zustellung>,
    pub read_by: Vec<LeseQuittung>,
}

impl NachrichtRecord {
    /// Ob die Nachricht bereits von diesem Benutzer gelesen wurde
    pub fn ist_gelesen_von(&self, user_id: Uuid) -> bool {
        self.read_by.iter().any(|q| q.user_id == user_id)
    }

    /// Ob die Zustellung an diesen Benutzer bereits quittiert wurde
    pub fn ist_zugestellt_an(&self, user_id: Uuid) -> bool {
        self.delivered_to.iter().any(|z| z.user_id == user_id)
    }
}

/// Daten zum Anlegen einer neuen Nachricht
#[derive(Debug, Clone)]
pub struct NeueNachricht<'a> {
    pub room_id: Uuid,
    pub sender_id: Uuid,
    pub content: &'a str,
    pub message_type: NachrichtenTyp,
    pub created_at: DateTime<Utc>,
}

/// Daten zum Aktualisieren einer Nachricht
#[derive(Debug, Clone, Default)]
pub struct NachrichtPatch {
    pub content: Option<String>,
    pub edited_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub add_delivery: Option<Zustellung>,
    pub add_read_receipt: Option<LeseQuittung>,
}

/// Filter fuer Verlaufs-Abfragen
#[derive(Debug, Clone, Default)]
pub struct NachrichtenFilter {
    /// Nur Nachrichten vor diesem Zeitpunkt
    pub before: Option<DateTime<Utc>>,
    /// Maximale Anzahl (Standard: 50)
    pub limit: Option<i64>,
}
