//! duplex-store – Nachrichten-Speicher-Abstraktion
//!
//! Persistenzschicht fuer Konversationen und Nachrichten nach dem
//! Repository-Pattern: der Server injiziert beim Start ein Backend
//! hinter dem `ConversationStore`-Trait. `MemoryStore` ist die
//! eingebaute Implementierung fuer Single-Instance-Betrieb und Tests.

pub mod error;
pub mod memory;
pub mod models;
pub mod repository;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use models::{
    KonversationRecord, LeseQuittung, NachrichtPatch, NachrichtRecord, NachrichtenFilter,
    NeueNachricht, Zustellung,
};
pub use repository::ConversationStore;
