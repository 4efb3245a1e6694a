//! duplex-core – Gemeinsame Typen und Fehlertypen
//!
//! Der kleinste gemeinsame Nenner des Workspaces: Identifikatoren,
//! Nachrichtenarten und der Fehlertyp fuer Schnittstellen, die keiner
//! einzelnen Fach-Crate gehoeren.

pub mod error;
pub mod types;

// Kurzpfade fuer die gaengigen Typen
pub use error::{DuplexError, Result};
pub use types::{CallId, MessageId, NachrichtenTyp, RoomId, UserId};
