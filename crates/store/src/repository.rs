//! Repository-Trait fuer Konversationen und Nachrichten
//!
//! Die Geschaeftslogik spricht nur gegen diesen Trait und bleibt damit
//! unabhaengig vom konkreten Speicher. Der Server injiziert ein Backend
//! beim Start; fuer Tests und Single-Instance-Betrieb steht `MemoryStore`
//! bereit.

use uuid::Uuid;

use crate::error::StoreResult;
use crate::models::{NachrichtPatch, NachrichtRecord, NachrichtenFilter, NeueNachricht};

/// Speicher-Backend fuer Konversationen und Nachrichten
///
/// Alle Methoden sind fehlbar: ein ausgefallenes Backend darf den
/// Server nicht zum Absturz bringen, die Aufrufer behandeln Fehler
/// als Upstream-Ausfall.
#[allow(async_fn_in_trait)]
pub trait ConversationStore: Send + Sync {
    /// Laedt die Teilnehmerliste einer Konversation
    ///
    /// `None` wenn die Konversation nicht existiert.
    async fn get_participants(&self, room_id: Uuid) -> StoreResult<Option<Vec<Uuid>>>;

    /// Haengt eine neue Nachricht an eine Konversation an
    async fn append_message(&self, data: NeueNachricht<'_>) -> StoreResult<NachrichtRecord>;

    /// Laedt eine einzelne Nachricht
    ///
    /// `None` wenn die Nachricht nicht in dieser Konversation existiert.
    async fn get_message(&self, room_id: Uuid, message_id: Uuid)
        -> StoreResult<Option<NachrichtRecord>>;

    /// Wendet einen Patch auf eine Nachricht an
    ///
    /// Gibt den aktualisierten Datensatz zurueck, `None` wenn die
    /// Nachricht nicht existiert.
    async fn mutate_message(
        &self,
        room_id: Uuid,
        message_id: Uuid,
        patch: NachrichtPatch,
    ) -> StoreResult<Option<NachrichtRecord>>;

    /// Laedt den Verlauf einer Konversation (chronologisch, aelteste zuerst)
    async fn get_history(
        &self,
        room_id: Uuid,
        filter: NachrichtenFilter,
    ) -> StoreResult<Vec<NachrichtRecord>>;
}
