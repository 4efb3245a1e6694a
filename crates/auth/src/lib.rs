//! duplex-auth – Token-Verifikation
//!
//! Prueft Bearer-Tokens gegen eine Registry und liefert die Identitaet
//! des Aufrufers. Der `TokenVerifier`-Trait haelt die Pruefung
//! austauschbar; die eingebaute `TokenRegistry` wird beim Start aus der
//! Konfiguration befuellt und stellt neue Tokens mit 256 Bit Entropie aus.

pub mod error;
pub mod token;

// Re-Exporte
pub use error::{AuthError, AuthResult};
pub use token::{Identitaet, TokenRegistry, TokenVerifier};
