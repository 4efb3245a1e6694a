//! Anfrage- und Ergebnistypen des Chat-Service

use chrono::{DateTime, Utc};
use duplex_core::types::NachrichtenTyp;
use duplex_store::{LeseQuittung, Zustellung};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Eine Chat-Nachricht (Domain-Typ, nicht Speicher-Record)
///
/// Bei geloeschten Nachrichten ist `content` bereits redigiert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatNachricht {
    pub id: Uuid,
    pub room_id: Uuid,
    pub sender_id: Uuid,
    pub content: String,
    pub message_type: NachrichtenTyp,
    pub created_at: DateTime<Utc>,
    pub is_edited: bool,
    pub edited_at: Option<DateTime<Utc>>,
    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub delivered_to: Vec<Zustellung>,
    pub read_by: Vec<LeseQuittung>,
}

/// Cursor-basierte Paginierung fuer den Nachrichtenverlauf
#[derive(Debug, Clone, Default)]
pub struct HistoryAnfrage {
    pub room_id: Uuid,
    /// Nur Nachrichten aelter als dieser Zeitstempel
    pub before: Option<DateTime<Utc>>,
    /// Obergrenze pro Seite, ohne Angabe 50
    pub limit: Option<i64>,
}

/// Ergebnis einer Sende- oder Bearbeiten-Operation
///
/// Traegt die Teilnehmerliste mit, damit der Aufrufer den Broadcast
/// ohne zweiten Speicher-Zugriff adressieren kann.
#[derive(Debug, Clone)]
pub struct NachrichtErgebnis {
    pub nachricht: ChatNachricht,
    pub teilnehmer: Vec<Uuid>,
}

/// Ergebnis einer Loesch-Operation
#[derive(Debug, Clone)]
pub struct LoeschErgebnis {
    /// `false` wenn die Nachricht bereits geloescht war
    pub neu_geloescht: bool,
    pub deleted_at: DateTime<Utc>,
    pub teilnehmer: Vec<Uuid>,
}

/// Ergebnis einer Gelesen-Markierung
#[derive(Debug, Clone)]
pub struct GelesenErgebnis {
    /// IDs der Nachrichten die neu als gelesen markiert wurden
    pub markiert: Vec<Uuid>,
    pub teilnehmer: Vec<Uuid>,
}

/// Ergebnis einer Zustell-Quittung
#[derive(Debug, Clone)]
pub struct ZustellungErgebnis {
    /// Verfasser der quittierten Nachricht
    pub sender_id: Uuid,
    pub delivered_at: DateTime<Utc>,
}
