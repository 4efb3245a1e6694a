//! Gemeinsame Typen fuer Duplex
//!
//! Jede ID ist ein eigener Newtype um eine UUID, damit der Compiler
//! vertauschte ID-Arten abfaengt. Daneben liegt hier der Nachrichtentyp,
//! den Protokoll, Speicher und Chat-Service gemeinsam verwenden.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifiziert einen Benutzer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub Uuid);

impl UserId {
    /// Neue zufaellige UserId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Die rohe UUID hinter der ID
    pub fn inner(&self) -> Uuid {
        self.0
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "user:{}", self.0)
    }
}

/// Identifiziert einen Raum, d. h. eine Zwei-Personen-Konversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoomId(pub Uuid);

impl RoomId {
    /// Neue zufaellige RoomId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Die rohe UUID hinter der ID
    pub fn inner(&self) -> Uuid {
        self.0
    }
}

impl Default for RoomId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RoomId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "room:{}", self.0)
    }
}

/// Identifiziert eine einzelne Nachricht
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub Uuid);

impl MessageId {
    /// Neue zufaellige MessageId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Die rohe UUID hinter der ID
    pub fn inner(&self) -> Uuid {
        self.0
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "msg:{}", self.0)
    }
}

/// Identifiziert einen Anruf
///
/// Wird vom anrufenden Client vergeben und begleitet den Anruf durch
/// Offer, Answer, ICE-Austausch und Teardown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallId(pub Uuid);

impl CallId {
    /// Neue zufaellige CallId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Die rohe UUID hinter der ID
    pub fn inner(&self) -> Uuid {
        self.0
    }
}

impl Default for CallId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CallId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "call:{}", self.0)
    }
}

/// Art einer Chat-Nachricht
///
/// Auf dem Draht klein geschrieben ("text", "image", ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NachrichtenTyp {
    Text,
    Image,
    File,
    System,
}

impl Default for NachrichtenTyp {
    fn default() -> Self {
        Self::Text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn neue_user_ids_kollidieren_nicht() {
        let a = UserId::new();
        let b = UserId::new();
        assert_ne!(a, b, "new() darf keine Duplikate liefern");
    }

    #[test]
    fn neue_room_ids_kollidieren_nicht() {
        let a = RoomId::new();
        let b = RoomId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn call_id_display() {
        let id = CallId(Uuid::nil());
        assert!(id.to_string().starts_with("call:"));
    }

    #[test]
    fn ids_ueberleben_die_json_reise() {
        let mid = MessageId::new();
        let json = serde_json::to_string(&mid).unwrap();
        let mid2: MessageId = serde_json::from_str(&json).unwrap();
        assert_eq!(mid, mid2);
    }

    #[test]
    fn nachrichtentyp_kleingeschrieben() {
        let json = serde_json::to_string(&NachrichtenTyp::Image).unwrap();
        assert_eq!(json, "\"image\"");
        let zurueck: NachrichtenTyp = serde_json::from_str("\"system\"").unwrap();
        assert_eq!(zurueck, NachrichtenTyp::System);
    }
}
