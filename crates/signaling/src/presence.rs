//! Presence-Tracker – Online-Status und Zuletzt-gesehen-Zeitpunkte
//!
//! Wer ist online, abwesend, offline? Der Tracker haelt pro Benutzer den
//! zuletzt gemeldeten Status und benachrichtigt Abonnenten bei jeder
//! Aenderung. Eintraege entstehen beim ersten Status-Event und bleiben
//! nach dem Trennen als Offline-Eintrag mit Zeitstempel erhalten.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use duplex_core::types::UserId;
use duplex_protocol::control::PresenceStatus;
use std::sync::Arc;
use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// Presence-Daten
// ---------------------------------------------------------------------------

/// Presence-Eintrag eines Benutzers
#[derive(Debug, Clone, PartialEq)]
pub struct PresenceRecord {
    pub status: PresenceStatus,
    pub last_seen: Option<DateTime<Utc>>,
}

impl Default for PresenceRecord {
    fn default() -> Self {
        Self {
            status: PresenceStatus::Offline,
            last_seen: None,
        }
    }
}

/// Event bei jeder Status-Aenderung
#[derive(Debug, Clone)]
pub struct PresenceEvent {
    pub user_id: UserId,
    pub status: PresenceStatus,
    pub last_seen: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// PresenceTracker
// ---------------------------------------------------------------------------

/// Kapazitaet des Event-Kanals; Nachzuegler verlieren die aeltesten Events
const PRESENCE_KANAL_GROESSE: usize = 256;

/// Verwaltet den Presence-Status aller bekannten Benutzer
///
/// Haelt die Eintraege in einer DashMap; Clones zeigen auf denselben Tracker.
#[derive(Clone)]
pub struct PresenceTracker {
    inner: Arc<PresenceTrackerInner>,
}

struct PresenceTrackerInner {
    /// Letzter gemeldeter Status, indiziert nach UserId
    records: DashMap<UserId, PresenceRecord>,
    /// Broadcast-Sender fuer Status-Aenderungen
    event_tx: broadcast::Sender<PresenceEvent>,
}

impl PresenceTracker {
    /// Erstellt einen neuen PresenceTracker
    pub fn neu() -> Self {
        let (event_tx, _) = broadcast::channel(PRESENCE_KANAL_GROESSE);
        Self {
            inner: Arc::new(PresenceTrackerInner {
                records: DashMap::new(),
                event_tx,
            }),
        }
    }

    /// Setzt den Status eines Benutzers und gibt den neuen Eintrag zurueck
    ///
    /// Der Zeitstempel wird bei jedem Event aktualisiert; der letzte Melder
    /// gewinnt, es findet keine Konfliktaufloesung statt.
    pub fn status_setzen(&self, user_id: UserId, status: PresenceStatus) -> PresenceRecord {
        let record = PresenceRecord {
            status,
            last_seen: Some(Utc::now()),
        };
        self.inner.records.insert(user_id, record.clone());

        tracing::debug!(user_id = %user_id, status = %status, "Presence-Status gesetzt");
        let _ = self.inner.event_tx.send(PresenceEvent {
            user_id,
            status,
            last_seen: record.last_seen,
        });

        record
    }

    /// Markiert einen Benutzer als offline (Verbindung getrennt)
    ///
    /// Setzt den Zeitstempel auf jetzt, unabhaengig vom vorherigen Status.
    pub fn client_getrennt(&self, user_id: UserId) -> PresenceRecord {
        tracing::info!(user_id = %user_id, "Benutzer nun offline");
        self.status_setzen(user_id, PresenceStatus::Offline)
    }

    /// Gibt den Presence-Eintrag eines Benutzers zurueck
    ///
    /// Unbekannte Benutzer gelten als offline ohne Zuletzt-gesehen-Zeitpunkt.
    pub fn abfragen(&self, user_id: &UserId) -> PresenceRecord {
        self.inner
            .records
            .get(user_id)
            .map(|e| e.clone())
            .unwrap_or_default()
    }

    /// Gibt die Anzahl der bekannten Presence-Eintraege zurueck
    pub fn eintrag_anzahl(&self) -> usize {
        self.inner.records.len()
    }

    /// Liefert einen Empfaenger fuer kuenftige Status-Aenderungen
    pub fn events_abonnieren(&self) -> broadcast::Receiver<PresenceEvent> {
        self.inner.event_tx.subscribe()
    }
}

impl Default for PresenceTracker {
    fn default() -> Self {
        Self::neu()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unbekannter_benutzer_ist_offline() {
        let tracker = PresenceTracker::neu();
        let record = tracker.abfragen(&UserId::new());

        assert_eq!(record.status, PresenceStatus::Offline);
        assert!(record.last_seen.is_none());
    }

    #[test]
    fn status_setzen_aktualisiert_eintrag() {
        let tracker = PresenceTracker::neu();
        let uid = UserId::new();

        tracker.status_setzen(uid, PresenceStatus::Online);
        assert_eq!(tracker.abfragen(&uid).status, PresenceStatus::Online);

        tracker.status_setzen(uid, PresenceStatus::Away);
        let record = tracker.abfragen(&uid);
        assert_eq!(record.status, PresenceStatus::Away);
        assert!(record.last_seen.is_some());
    }

    #[test]
    fn trennen_setzt_offline_mit_zeitstempel() {
        let tracker = PresenceTracker::neu();
        let uid = UserId::new();

        tracker.status_setzen(uid, PresenceStatus::Online);
        let record = tracker.client_getrennt(uid);

        assert_eq!(record.status, PresenceStatus::Offline);
        assert!(record.last_seen.is_some(), "Trennen muss zuletzt-gesehen setzen");
        assert_eq!(tracker.abfragen(&uid), record, "Eintrag bleibt nach dem Trennen erhalten");
    }

    #[test]
    fn clones_sehen_dieselben_eintraege() {
        let t1 = PresenceTracker::neu();
        let t2 = t1.clone();
        let uid = UserId::new();

        t1.status_setzen(uid, PresenceStatus::Online);
        assert_eq!(t2.abfragen(&uid).status, PresenceStatus::Online);
        assert_eq!(t2.eintrag_anzahl(), 1);
    }

    #[tokio::test]
    async fn abonnenten_erhalten_status_events() {
        let tracker = PresenceTracker::neu();
        let mut rx = tracker.events_abonnieren();
        let uid = UserId::new();

        tracker.status_setzen(uid, PresenceStatus::Away);

        let event = rx.try_recv().expect("Status-Event muss anliegen");
        assert_eq!(event.user_id, uid);
        assert_eq!(event.status, PresenceStatus::Away);
    }
}
