//! ChatService – Nachrichten senden, bearbeiten, loeschen, quittieren

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use duplex_core::types::NachrichtenTyp;
use duplex_store::{
    ConversationStore, LeseQuittung, NachrichtPatch, NachrichtRecord, NachrichtenFilter,
    NeueNachricht, Zustellung,
};

use crate::{
    error::{ChatError, ChatResult},
    types::{
        ChatNachricht, GelesenErgebnis, HistoryAnfrage, LoeschErgebnis, NachrichtErgebnis,
        ZustellungErgebnis,
    },
};

/// Maximale Nachrichtenlaenge
pub const MAX_NACHRICHT_ZEICHEN: usize = 4096;

/// Platzhalter fuer den Inhalt geloeschter Nachrichten
pub const GELOESCHT_PLATZHALTER: &str = "Message deleted";

/// Fenster fuer den Ungelesen-Scan beim Gelesen-Markieren
const UNGELESEN_SCAN_LIMIT: i64 = 500;

/// ChatService verwaltet Nachrichten in Konversationen
pub struct ChatService<R: ConversationStore> {
    store: Arc<R>,
}

impl<R: ConversationStore> ChatService<R> {
    /// ChatService ueber dem gegebenen Store
    pub fn neu(store: Arc<R>) -> Arc<Self> {
        Arc::new(Self { store })
    }

    /// Prueft ob ein Benutzer Teilnehmer der Konversation ist
    ///
    /// Gibt bei Erfolg die vollstaendige Teilnehmerliste zurueck.
    pub async fn teilnehmer_pruefen(&self, room_id: Uuid, user_id: Uuid) -> ChatResult<Vec<Uuid>> {
        let teilnehmer = self
            .store
            .get_participants(room_id)
            .await?
            .ok_or_else(|| ChatError::RaumNichtGefunden(room_id.to_string()))?;

        if !teilnehmer.contains(&user_id) {
            return Err(ChatError::KeineBerechtigung(
                "Kein Teilnehmer dieser Konversation".into(),
            ));
        }

        Ok(teilnehmer)
    }

    /// Nachricht in einer Konversation senden
    pub async fn nachricht_senden(
        &self,
        room_id: Uuid,
        sender_id: Uuid,
        content: &str,
        message_type: NachrichtenTyp,
    ) -> ChatResult<NachrichtErgebnis> {
        inhalt_pruefen(content)?;
        let teilnehmer = self.teilnehmer_pruefen(room_id, sender_id).await?;

        let record = self
            .store
            .append_message(NeueNachricht {
                room_id,
                sender_id,
                content,
                message_type,
                created_at: Utc::now(),
            })
            .await?;

        Ok(NachrichtErgebnis {
            nachricht: record_to_nachricht(record),
            teilnehmer,
        })
    }

    /// Nachricht bearbeiten (nur der Verfasser)
    pub async fn nachricht_bearbeiten(
        &self,
        room_id: Uuid,
        message_id: Uuid,
        bearbeiter_id: Uuid,
        new_content: &str,
    ) -> ChatResult<NachrichtErgebnis> {
        inhalt_pruefen(new_content)?;
        let teilnehmer = self.teilnehmer_pruefen(room_id, bearbeiter_id).await?;

        let existing = self
            .store
            .get_message(room_id, message_id)
            .await?
            .ok_or_else(|| ChatError::NachrichtNichtGefunden(message_id.to_string()))?;

        if existing.sender_id != bearbeiter_id {
            return Err(ChatError::KeineBerechtigung(
                "Bearbeiten darf nur der Verfasser".into(),
            ));
        }

        if existing.deleted_at.is_some() {
            return Err(ChatError::NachrichtNichtGefunden(message_id.to_string()));
        }

        let record = self
            .store
            .mutate_message(
                room_id,
                message_id,
                NachrichtPatch {
                    content: Some(new_content.to_string()),
                    edited_at: Some(Utc::now()),
                    ..Default::default()
                },
            )
            .await?
            .ok_or_else(|| ChatError::NachrichtNichtGefunden(message_id.to_string()))?;

        Ok(NachrichtErgebnis {
            nachricht: record_to_nachricht(record),
            teilnehmer,
        })
    }

    /// Nachricht weich loeschen (Soft-Delete, nur der Verfasser)
    ///
    /// Wiederholtes Loeschen ist erlaubt und meldet `neu_geloescht = false`,
    /// damit der Aufrufer den Broadcast nicht dupliziert.
    pub async fn nachricht_loeschen(
        &self,
        room_id: Uuid,
        message_id: Uuid,
        anforderer_id: Uuid,
    ) -> ChatResult<LoeschErgebnis> {
        let teilnehmer = self.teilnehmer_pruefen(room_id, anforderer_id).await?;

        let existing = self
            .store
            .get_message(room_id, message_id)
            .await?
            .ok_or_else(|| ChatError::NachrichtNichtGefunden(message_id.to_string()))?;

        if existing.sender_id != anforderer_id {
            return Err(ChatError::KeineBerechtigung(
                "Loeschen darf nur der Verfasser".into(),
            ));
        }

        if let Some(deleted_at) = existing.deleted_at {
            return Ok(LoeschErgebnis {
                neu_geloescht: false,
                deleted_at,
                teilnehmer,
            });
        }

        let jetzt = Utc::now();
        self.store
            .mutate_message(
                room_id,
                message_id,
                NachrichtPatch {
                    deleted_at: Some(jetzt),
                    ..Default::default()
                },
            )
            .await?
            .ok_or_else(|| ChatError::NachrichtNichtGefunden(message_id.to_string()))?;

        Ok(LoeschErgebnis {
            neu_geloescht: true,
            deleted_at: jetzt,
            teilnehmer,
        })
    }

    /// Markiert alle ungelesenen fremden Nachrichten als gelesen
    ///
    /// Bereits gelesene und eigene Nachrichten werden uebersprungen.
    pub async fn gelesen_markieren(
        &self,
        room_id: Uuid,
        leser_id: Uuid,
    ) -> ChatResult<GelesenErgebnis> {
        let teilnehmer = self.teilnehmer_pruefen(room_id, leser_id).await?;

        let records = self
            .store
            .get_history(
                room_id,
                NachrichtenFilter {
                    before: None,
                    limit: Some(UNGELESEN_SCAN_LIMIT),
                },
            )
            .await?;

        let jetzt = Utc::now();
        let mut markiert = Vec::new();
        for record in records {
            // Eigene, bereits gelesene und geloeschte Nachrichten ueberspringen
            if record.sender_id == leser_id
                || record.ist_gelesen_von(leser_id)
                || record.deleted_at.is_some()
            {
                continue;
            }
            let patch = NachrichtPatch {
                add_read_receipt: Some(LeseQuittung {
                    user_id: leser_id,
                    read_at: jetzt,
                }),
                ..Default::default()
            };
            if self
                .store
                .mutate_message(room_id, record.id, patch)
                .await?
                .is_some()
            {
                markiert.push(record.id);
            }
        }

        Ok(GelesenErgebnis {
            markiert,
            teilnehmer,
        })
    }

    /// Quittiert die Zustellung einer Nachricht an einen Empfaenger
    ///
    /// Gibt den Verfasser zurueck, damit der Aufrufer ihn benachrichtigen kann.
    pub async fn zustellung_bestaetigen(
        &self,
        room_id: Uuid,
        message_id: Uuid,
        empfaenger_id: Uuid,
    ) -> ChatResult<ZustellungErgebnis> {
        self.teilnehmer_pruefen(room_id, empfaenger_id).await?;

        let existing = self
            .store
            .get_message(room_id, message_id)
            .await?
            .ok_or_else(|| ChatError::NachrichtNichtGefunden(message_id.to_string()))?;

        let jetzt = Utc::now();
        self.store
            .mutate_message(
                room_id,
                message_id,
                NachrichtPatch {
                    add_delivery: Some(Zustellung {
                        user_id: empfaenger_id,
                        delivered_at: jetzt,
                    }),
                    ..Default::default()
                },
            )
            .await?
            .ok_or_else(|| ChatError::NachrichtNichtGefunden(message_id.to_string()))?;

        Ok(ZustellungErgebnis {
            sender_id: existing.sender_id,
            delivered_at: jetzt,
        })
    }

    /// Nachrichtenverlauf einer Konversation laden (Cursor-Pagination)
    pub async fn verlauf_laden(&self, anfrage: HistoryAnfrage) -> ChatResult<Vec<ChatNachricht>> {
        let records = self
            .store
            .get_history(
                anfrage.room_id,
                NachrichtenFilter {
                    before: anfrage.before,
                    limit: anfrage.limit,
                },
            )
            .await?;

        Ok(records.into_iter().map(record_to_nachricht).collect())
    }
}

/// Prueft Laenge und Nicht-Leere des Nachrichteninhalts
fn inhalt_pruefen(content: &str) -> ChatResult<()> {
    if content.trim().is_empty() {
        return Err(ChatError::UngueltigeEingabe(
            "Leere Nachrichten sind nicht zulaessig".into(),
        ));
    }

    if content.len() > MAX_NACHRICHT_ZEICHEN {
        return Err(ChatError::UngueltigeEingabe(format!(
            "Nachricht zu lang: {} Zeichen (Maximum: {})",
            content.len(),
            MAX_NACHRICHT_ZEICHEN
        )));
    }

    Ok(())
}

/// Konvertiert einen Speicher-Record in den Domain-Typ
///
/// Geloeschte Nachrichten werden redigiert: der Inhalt wird durch einen
/// Platzhalter ersetzt, die Quittungen bleiben erhalten.
pub fn record_to_nachricht(record: NachrichtRecord) -> ChatNachricht {
    let is_deleted = record.deleted_at.is_some();
    let content = if is_deleted {
        GELOESCHT_PLATZHALTER.to_string()
    } else {
        record.content
    };

    ChatNachricht {
        id: record.id,
        room_id: record.room_id,
        sender_id: record.sender_id,
        content,
        message_type: record.message_type,
        created_at: record.created_at,
        is_edited: record.edited_at.is_some(),
        edited_at: record.edited_at,
        is_deleted,
        deleted_at: record.deleted_at,
        delivered_to: record.delivered_to,
        read_by: record.read_by,
    }
}
