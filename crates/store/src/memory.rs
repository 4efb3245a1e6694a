//! In-Memory-Backend fuer den Nachrichten-Speicher
//!
//! Haelt Konversationen und Nachrichten in DashMaps. Gedacht fuer
//! Single-Instance-Betrieb und Tests; die Daten ueberleben keinen
//! Neustart.

use chrono::Utc;
use dashmap::DashMap;
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};
use crate::models::{
    KonversationRecord, NachrichtPatch, NachrichtRecord, NachrichtenFilter, NeueNachricht,
};
use crate::repository::ConversationStore;

/// Standard-Limit fuer Verlaufs-Abfragen
const DEFAULT_HISTORY_LIMIT: i64 = 50;

/// In-Memory-Implementierung des `ConversationStore`
#[derive(Debug, Default)]
pub struct MemoryStore {
    /// Konversationen nach ID
    konversationen: DashMap<Uuid, KonversationRecord>,
    /// Nachrichten je Konversation, in Ankunftsreihenfolge
    nachrichten: DashMap<Uuid, Vec<NachrichtRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Legt eine neue Konversation an und gibt ihre ID zurueck
    pub fn konversation_anlegen(&self, participants: Vec<Uuid>) -> Uuid {
        let id = Uuid::new_v4();
        self.konversationen.insert(
            id,
            KonversationRecord {
                id,
                participants,
                created_at: Utc::now(),
            },
        );
        id
    }

    /// Anzahl gespeicherter Nachrichten in einer Konversation
    pub fn nachrichten_anzahl(&self, room_id: Uuid) -> usize {
        self.nachrichten
            .get(&room_id)
            .map(|v| v.len())
            .unwrap_or(0)
    }
}

impl ConversationStore for MemoryStore {
    async fn get_participants(&self, room_id: Uuid) -> StoreResult<Option<Vec<Uuid>>> {
        Ok(self
            .konversationen
            .get(&room_id)
            .map(|k| k.participants.clone()))
    }

    async fn append_message(&self, data: NeueNachricht<'_>) -> StoreResult<NachrichtRecord> {
        if !self.konversationen.contains_key(&data.room_id) {
            return Err(StoreError::nicht_gefunden(format!(
                "Konversation {}",
                data.room_id
            )));
        }

        let record = NachrichtRecord {
            id: Uuid::new_v4(),
            room_id: data.room_id,
            sender_id: data.sender_id,
            content: data.content.to_string(),
            message_type: data.message_type,
            created_at: data.created_at,
            edited_at: None,
            deleted_at: None,
            delivered_to: Vec::new(),
            read_by: Vec::new(),
        };

        self.nachrichten
            .entry(data.room_id)
            .or_default()
            .push(record.clone());

        Ok(record)
    }

    async fn get_message(
        &self,
        room_id: Uuid,
        message_id: Uuid,
    ) -> StoreResult<Option<NachrichtRecord>> {
        Ok(self.nachrichten.get(&room_id).and_then(|liste| {
            liste.iter().find(|n| n.id == message_id).cloned()
        }))
    }

    async fn mutate_message(
        &self,
        room_id: Uuid,
        message_id: Uuid,
        patch: NachrichtPatch,
    ) -> StoreResult<Option<NachrichtRecord>> {
        let mut liste = match self.nachrichten.get_mut(&room_id) {
            Some(l) => l,
            None => return Ok(None),
        };

        let nachricht = match liste.iter_mut().find(|n| n.id == message_id) {
            Some(n) => n,
            None => return Ok(None),
        };

        if let Some(content) = patch.content {
            nachricht.content = content;
        }
        if let Some(edited_at) = patch.edited_at {
            nachricht.edited_at = Some(edited_at);
        }
        if let Some(deleted_at) = patch.deleted_at {
            nachricht.deleted_at = Some(deleted_at);
        }
        // Quittungen sind idempotent: Duplikate werden verworfen
        if let Some(zustellung) = patch.add_delivery {
            if !nachricht.ist_zugestellt_an(zustellung.user_id) {
                nachricht.delivered_to.push(zustellung);
            }
        }
        if let Some(quittung) = patch.add_read_receipt {
            if !nachricht.ist_gelesen_von(quittung.user_id) {
                nachricht.read_by.push(quittung);
            }
        }

        Ok(Some(nachricht.clone()))
    }

    async fn get_history(
        &self,
        room_id: Uuid,
        filter: NachrichtenFilter,
    ) -> StoreResult<Vec<NachrichtRecord>> {
        let limit = filter.limit.unwrap_or(DEFAULT_HISTORY_LIMIT).max(0) as usize;

        let liste = match self.nachrichten.get(&room_id) {
            Some(l) => l,
            None => return Ok(Vec::new()),
        };

        // Neueste zuerst sammeln, dann chronologisch zurueckgeben.
        // Geloeschte Nachrichten bleiben als Tombstones enthalten; die
        // Redigierung des Inhalts passiert in der Domain-Schicht.
        let mut treffer: Vec<NachrichtRecord> = liste
            .iter()
            .filter(|n| filter.before.map(|b| n.created_at < b).unwrap_or(true))
            .cloned()
            .collect();
        treffer.sort_by_key(|n| n.created_at);
        if treffer.len() > limit {
            treffer.drain(..treffer.len() - limit);
        }

        Ok(treffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LeseQuittung, Zustellung};
    use duplex_core::types::NachrichtenTyp;
    use std::sync::Arc;

    fn neue_nachricht(room_id: Uuid, sender_id: Uuid, content: &str) -> NeueNachricht<'_> {
        NeueNachricht {
            room_id,
            sender_id,
            content,
            message_type: NachrichtenTyp::Text,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn konversation_anlegen_und_teilnehmer() {
        let store = MemoryStore::new();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let room = store.konversation_anlegen(vec![alice, bob]);

        let teilnehmer = store.get_participants(room).await.unwrap().unwrap();
        assert_eq!(teilnehmer, vec![alice, bob]);

        assert!(store
            .get_participants(Uuid::new_v4())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn append_und_get_message() {
        let store = MemoryStore::new();
        let alice = Uuid::new_v4();
        let room = store.konversation_anlegen(vec![alice, Uuid::new_v4()]);

        let record = store
            .append_message(neue_nachricht(room, alice, "hallo"))
            .await
            .unwrap();
        assert_eq!(record.content, "hallo");
        assert!(record.edited_at.is_none());

        let geladen = store.get_message(room, record.id).await.unwrap().unwrap();
        assert_eq!(geladen.id, record.id);
        assert_eq!(geladen.sender_id, alice);
    }

    #[tokio::test]
    async fn append_in_unbekannte_konversation_schlaegt_fehl() {
        let store = MemoryStore::new();
        let err = store
            .append_message(neue_nachricht(Uuid::new_v4(), Uuid::new_v4(), "x"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NichtGefunden(_)));
    }

    #[tokio::test]
    async fn mutate_setzt_content_und_edited_at() {
        let store = MemoryStore::new();
        let alice = Uuid::new_v4();
        let room = store.konversation_anlegen(vec![alice, Uuid::new_v4()]);
        let record = store
            .append_message(neue_nachricht(room, alice, "alt"))
            .await
            .unwrap();

        let jetzt = Utc::now();
        let patch = NachrichtPatch {
            content: Some("neu".to_string()),
            edited_at: Some(jetzt),
            ..Default::default()
        };
        let aktualisiert = store
            .mutate_message(room, record.id, patch)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(aktualisiert.content, "neu");
        assert_eq!(aktualisiert.edited_at, Some(jetzt));
    }

    #[tokio::test]
    async fn mutate_unbekannte_nachricht_gibt_none() {
        let store = MemoryStore::new();
        let room = store.konversation_anlegen(vec![Uuid::new_v4()]);
        let ergebnis = store
            .mutate_message(room, Uuid::new_v4(), NachrichtPatch::default())
            .await
            .unwrap();
        assert!(ergebnis.is_none());
    }

    #[tokio::test]
    async fn quittungen_sind_idempotent() {
        let store = MemoryStore::new();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let room = store.konversation_anlegen(vec![alice, bob]);
        let record = store
            .append_message(neue_nachricht(room, alice, "hi"))
            .await
            .unwrap();

        for _ in 0..3 {
            store
                .mutate_message(
                    room,
                    record.id,
                    NachrichtPatch {
                        add_delivery: Some(Zustellung {
                            user_id: bob,
                            delivered_at: Utc::now(),
                        }),
                        add_read_receipt: Some(LeseQuittung {
                            user_id: bob,
                            read_at: Utc::now(),
                        }),
                        ..Default::default()
                    },
                )
                .await
                .unwrap();
        }

        let geladen = store.get_message(room, record.id).await.unwrap().unwrap();
        assert_eq!(geladen.delivered_to.len(), 1);
        assert_eq!(geladen.read_by.len(), 1);
    }

    #[tokio::test]
    async fn verlauf_chronologisch_mit_limit() {
        let store = MemoryStore::new();
        let alice = Uuid::new_v4();
        let room = store.konversation_anlegen(vec![alice, Uuid::new_v4()]);

        for i in 0..5 {
            store
                .append_message(NeueNachricht {
                    room_id: room,
                    sender_id: alice,
                    content: &format!("nachricht {i}"),
                    message_type: NachrichtenTyp::Text,
                    created_at: Utc::now() + chrono::Duration::seconds(i),
                })
                .await
                .unwrap();
        }

        let verlauf = store
            .get_history(
                room,
                NachrichtenFilter {
                    limit: Some(3),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        // Die 3 neuesten, aelteste zuerst
        assert_eq!(verlauf.len(), 3);
        assert_eq!(verlauf[0].content, "nachricht 2");
        assert_eq!(verlauf[2].content, "nachricht 4");
    }

    #[tokio::test]
    async fn verlauf_behaelt_geloeschte_als_tombstone() {
        let store = MemoryStore::new();
        let alice = Uuid::new_v4();
        let room = store.konversation_anlegen(vec![alice, Uuid::new_v4()]);

        let erste = store
            .append_message(neue_nachricht(room, alice, "bleibt"))
            .await
            .unwrap();
        let zweite = store
            .append_message(neue_nachricht(room, alice, "entfernt"))
            .await
            .unwrap();
        store
            .mutate_message(
                room,
                zweite.id,
                NachrichtPatch {
                    deleted_at: Some(Utc::now()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let verlauf = store
            .get_history(room, NachrichtenFilter::default())
            .await
            .unwrap();
        assert_eq!(verlauf.len(), 2);
        assert_eq!(verlauf[0].id, erste.id);
        assert!(verlauf[0].deleted_at.is_none());
        assert!(verlauf[1].deleted_at.is_some(), "Tombstone bleibt im Verlauf");
    }

    #[tokio::test]
    async fn gleichzeitige_appends_gehen_nicht_verloren() {
        let store = Arc::new(MemoryStore::new());
        let alice = Uuid::new_v4();
        let room = store.konversation_anlegen(vec![alice, Uuid::new_v4()]);

        let mut handles = Vec::new();
        for i in 0..32 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                let inhalt = format!("parallel {i}");
                store
                    .append_message(NeueNachricht {
                        room_id: room,
                        sender_id: alice,
                        content: &inhalt,
                        message_type: NachrichtenTyp::Text,
                        created_at: Utc::now(),
                    })
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(store.nachrichten_anzahl(room), 32);

        // Der Verlauf liefert alle Nachrichten in nicht-fallender Reihenfolge
        let verlauf = store
            .get_history(room, NachrichtenFilter::default())
            .await
            .unwrap();
        assert_eq!(verlauf.len(), 32);
        assert!(verlauf
            .windows(2)
            .all(|w| w[0].created_at <= w[1].created_at));
    }
}
