//! Typing-Tracker – ephemere Tipp-Indikatoren pro Raum
//!
//! Haelt pro Raum die Menge der gerade tippenden Benutzer. Eintraege
//! verschwinden nur durch explizites Stoppen oder durch das Trennen der
//! Verbindung; es gibt keinen zeitbasierten Ablauf. Alle Methoden melden
//! zurueck, ob sich der Zustand tatsaechlich geaendert hat, damit der
//! Aufrufer Wiederholungen nicht erneut in den Raum sendet.

use dashmap::DashMap;
use duplex_core::types::{RoomId, UserId};
use std::sync::Arc;

/// Verwaltet die Tipp-Zustaende aller Raeume
///
/// DashMap hinter Arc; ein Clone ist derselbe Tracker.
#[derive(Clone)]
pub struct TypingTracker {
    inner: Arc<TypingTrackerInner>,
}

struct TypingTrackerInner {
    /// Raum -> Liste der gerade tippenden Benutzer
    tippende: DashMap<RoomId, Vec<UserId>>,
}

impl TypingTracker {
    /// Erstellt einen neuen TypingTracker
    pub fn neu() -> Self {
        Self {
            inner: Arc::new(TypingTrackerInner {
                tippende: DashMap::new(),
            }),
        }
    }

    /// Markiert einen Benutzer als tippend
    ///
    /// Gibt `true` zurueck wenn der Benutzer vorher nicht tippte.
    pub fn beginnen(&self, user_id: UserId, room_id: RoomId) -> bool {
        let mut eintrag = self.inner.tippende.entry(room_id).or_default();
        if eintrag.contains(&user_id) {
            return false;
        }
        eintrag.push(user_id);
        tracing::trace!(user_id = %user_id, room_id = %room_id, "Tippen begonnen");
        true
    }

    /// Entfernt die Tipp-Markierung eines Benutzers
    ///
    /// Gibt `true` zurueck wenn der Benutzer tatsaechlich tippte;
    /// das Entfernen eines fehlenden Eintrags ist ein No-Op.
    pub fn stoppen(&self, user_id: &UserId, room_id: &RoomId) -> bool {
        let entfernt = match self.inner.tippende.get_mut(room_id) {
            Some(mut eintrag) => {
                let vorher = eintrag.len();
                eintrag.retain(|uid| uid != user_id);
                eintrag.len() < vorher
            }
            None => false,
        };
        self.inner.tippende.retain(|_, nutzer| !nutzer.is_empty());
        entfernt
    }

    /// Entfernt einen Benutzer aus allen Raeumen (Verbindung getrennt)
    ///
    /// Gibt die Raeume zurueck, in denen er tippte, damit der Aufrufer
    /// jeweils genau ein Stopp-Event verteilen kann.
    pub fn alle_stoppen(&self, user_id: &UserId) -> Vec<RoomId> {
        let mut raeume = Vec::new();
        self.inner.tippende.iter_mut().for_each(|mut entry| {
            let vorher = entry.value().len();
            entry.value_mut().retain(|uid| uid != user_id);
            if entry.value().len() < vorher {
                raeume.push(*entry.key());
            }
        });
        self.inner.tippende.retain(|_, nutzer| !nutzer.is_empty());

        if !raeume.is_empty() {
            tracing::debug!(
                user_id = %user_id,
                raeume = raeume.len(),
                "Tipp-Zustaende beim Trennen bereinigt"
            );
        }
        raeume
    }

    /// Gibt alle gerade tippenden Benutzer eines Raums zurueck
    pub fn tippende_in(&self, room_id: &RoomId) -> Vec<UserId> {
        self.inner
            .tippende
            .get(room_id)
            .map(|nutzer| nutzer.clone())
            .unwrap_or_default()
    }
}

impl Default for TypingTracker {
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
    fn beginnen_und_stoppen() {
        let tracker = TypingTracker::neu();
        let uid = UserId::new();
        let raum = RoomId::new();

        assert!(tracker.beginnen(uid, raum));
        assert_eq!(tracker.tippende_in(&raum), vec![uid]);

        assert!(tracker.stoppen(&uid, &raum));
        assert!(tracker.tippende_in(&raum).is_empty());
    }

    #[test]
    fn doppeltes_beginnen_meldet_keine_aenderung() {
        let tracker = TypingTracker::neu();
        let uid = UserId::new();
        let raum = RoomId::new();

        assert!(tracker.beginnen(uid, raum));
        assert!(!tracker.beginnen(uid, raum));
        assert_eq!(tracker.tippende_in(&raum).len(), 1);
    }

    #[test]
    fn stoppen_ohne_eintrag_ist_no_op() {
        let tracker = TypingTracker::neu();
        let uid = UserId::new();
        let raum = RoomId::new();

        assert!(!tracker.stoppen(&uid, &raum));
    }

    #[test]
    fn alle_stoppen_liefert_betroffene_raeume() {
        let tracker = TypingTracker::neu();
        let uid = UserId::new();
        let anderer = UserId::new();
        let raum_a = RoomId::new();
        let raum_b = RoomId::new();
        let raum_c = RoomId::new();

        tracker.beginnen(uid, raum_a);
        tracker.beginnen(uid, raum_b);
        tracker.beginnen(anderer, raum_c);

        let mut raeume = tracker.alle_stoppen(&uid);
        raeume.sort_by_key(|r| r.inner());
        let mut erwartet = vec![raum_a, raum_b];
        erwartet.sort_by_key(|r| r.inner());

        assert_eq!(raeume, erwartet);
        assert!(tracker.tippende_in(&raum_a).is_empty());
        assert_eq!(tracker.tippende_in(&raum_c), vec![anderer], "andere Benutzer bleiben");
    }

    #[test]
    fn alle_stoppen_ist_idempotent() {
        let tracker = TypingTracker::neu();
        let uid = UserId::new();
        let raum = RoomId::new();

        tracker.beginnen(uid, raum);
        assert_eq!(tracker.alle_stoppen(&uid).len(), 1);
        assert!(tracker.alle_stoppen(&uid).is_empty(), "zweiter Lauf findet nichts mehr");
    }
}
