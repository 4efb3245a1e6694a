//! Nachrichten-Handler des Dispatchers
//!
//! Pro Nachrichtenfamilie ein Handler; alle arbeiten auf dem geteilten
//! SignalingState und liefern die Antwort-Payloads an den Dispatcher.

pub mod auth_handler;
pub mod call_handler;
pub mod chat_handler;
pub mod presence_handler;
pub mod typing_handler;
