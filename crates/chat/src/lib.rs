//! duplex-chat – Nachrichten-Logik
//!
//! Hier lebt die Fachlogik rund um Nachrichten:
//! - der ChatService mit Senden, Bearbeiten und Soft-Delete
//! - Lese- und Zustell-Quittungen samt Ungelesen-Zaehlung
//! - Verlaufsabfragen mit Cursor-Pagination
//!
//! Der Speicher ist hinter `duplex_store::ConversationStore` austauschbar.

pub mod error;
pub mod service;
pub mod types;

#[cfg(test)]
mod tests;

// Re-Exporte der oeffentlichen Flaeche
pub use error::{ChatError, ChatResult};
pub use service::{ChatService, GELOESCHT_PLATZHALTER, MAX_NACHRICHT_ZEICHEN};
pub use types::{
    ChatNachricht, GelesenErgebnis, HistoryAnfrage, LoeschErgebnis, NachrichtErgebnis,
    ZustellungErgebnis,
};
