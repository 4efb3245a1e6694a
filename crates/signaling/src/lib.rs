//! duplex-signaling – TCP Control Layer
//!
//! Session- und Vermittlungsdienst von Duplex: nimmt TCP-Verbindungen an,
//! prueft Bearer-Tokens, stellt Chat-Nachrichten zu, verfolgt Praesenz
//! und Tipp-Indikatoren und vermittelt WebRTC-Anrufe zwischen genau zwei
//! Teilnehmern.
//!
//! ## Aufbau
//!
//! ```text
//! SignalingServer (TCP Listener)
//!     v
//! ClientConnection         ein Task pro Verbindung; zuerst Authenticate,
//!     v                    danach Session-Registrierung
//! MessageDispatcher
//!     +-- AuthHandler      (Authenticate)
//!     +-- ChatHandler      (Join, Leave, Send, Edit, Delete, Read, Delivered)
//!     +-- TypingHandler    (Start, Stop, Clear)
//!     +-- PresenceHandler  (Online, Away)
//!     +-- CallHandler      (Offer, Answer, ICE, Reject, End)
//! ```
//!
//! Daneben halten vier Registries den fluechtigen Zustand: die
//! `SessionRegistry` (eine Session pro Benutzer samt Raum-Abonnements),
//! der `PresenceTracker` (Online-Status und Zuletzt-gesehen), der
//! `TypingTracker` (wer tippt wo) und die `CallRegistry` (hoechstens ein
//! aktiver Anruf pro Benutzer).

pub mod call;
pub mod connection;
pub mod dispatcher;
pub mod error;
pub mod handlers;
pub mod presence;
pub mod push;
pub mod registry;
pub mod server_state;
pub mod tcp;
pub mod typing;

// Meistgenutzte Typen direkt auf Crate-Ebene
pub use call::{CallPhase, CallRegistry, CallSession};
pub use connection::ClientConnection;
pub use dispatcher::{DispatcherContext, MessageDispatcher};
pub use error::{SignalingError, SignalingResult};
pub use presence::{PresenceRecord, PresenceTracker};
pub use push::{LogPushSink, PushSink, PushZusammenfassung};
pub use registry::{SessionAnmeldung, SessionRegistry};
pub use server_state::{SignalingConfig, SignalingState};
pub use tcp::SignalingServer;
pub use typing::TypingTracker;
