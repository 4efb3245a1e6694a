//! Control-Protokoll (TCP)
//!
//! Definiert alle Ereignisse die ueber die TCP-Verbindung zwischen Client
//! und Server ausgetauscht werden: Chat, Tipp-Indikatoren, Praesenz und
//! WebRTC-Anruf-Signalisierung.
//!
//! ## Eckpunkte
//! - Jede Nachricht traegt eine `request_id: u32`; Server-Broadcasts nutzen 0
//! - Kodierung als JSON via serde; der Control-Pfad ist nicht zeitkritisch
//! - Tagged Enum: der `type`-Tag ist der snake_case-Ereignisname
//! - SDP-Offers/Answers und ICE-Kandidaten sind opake JSON-Werte und werden
//!   unveraendert weitergereicht

use chrono::{DateTime, Utc};
use duplex_core::types::{CallId, MessageId, NachrichtenTyp, RoomId, UserId};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Fehlercodes
// ---------------------------------------------------------------------------

/// Standardisierte Fehler-Codes fuer Error-Events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Querschnitt
    InternalError,
    InvalidRequest,
    NotFound,
    ValidationFailed,
    // Auth
    AuthenticationFailed,
    AlreadyAuthenticated,
    AccessDenied,
    // Anrufe
    Busy,
    Unreachable,
    // Collaborator
    UpstreamFailed,
}

// ---------------------------------------------------------------------------
// Praesenz
// ---------------------------------------------------------------------------

/// Praesenz-Status eines Benutzers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceStatus {
    Online,
    Away,
    Offline,
}

impl std::fmt::Display for PresenceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Online => "online",
            Self::Away => "away",
            Self::Offline => "offline",
        };
        write!(f, "{}", s)
    }
}

/// Praesenz-Aenderung eines Benutzers (Broadcast an alle Sessions)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserStatusChangedEvent {
    pub user_id: UserId,
    pub status: PresenceStatus,
    /// Zeitpunkt der letzten Aktivitaet (None wenn nie gesehen)
    pub last_seen: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Auth-Handshake
// ---------------------------------------------------------------------------

/// Authentifizierung mit Bearer-Token (erster Frame jeder Verbindung)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticateRequest {
    pub token: String,
}

/// Erfolgreiche Authentifizierung
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticatedResponse {
    pub user_id: UserId,
    pub email: String,
}

// ---------------------------------------------------------------------------
// Chat-Ereignisse
// ---------------------------------------------------------------------------

/// Raum betreten (abonniert die Broadcasts des Raums)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinChatRequest {
    pub room_id: RoomId,
}

/// Bestaetigung des Raum-Beitritts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinedChatResponse {
    pub room_id: RoomId,
}

/// Raum verlassen (beendet das Abonnement)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaveChatRequest {
    pub room_id: RoomId,
}

/// Nachricht senden
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendMessageRequest {
    pub room_id: RoomId,
    pub content: String,
    pub message_type: NachrichtenTyp,
}

/// Nachricht bearbeiten (nur der Verfasser)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditMessageRequest {
    pub room_id: RoomId,
    pub message_id: MessageId,
    pub new_content: String,
}

/// Nachricht loeschen (Soft-Delete, nur der Verfasser)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteMessageRequest {
    pub room_id: RoomId,
    pub message_id: MessageId,
}

/// Alle ungelesenen Nachrichten eines Raums als gelesen markieren
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkMessagesReadRequest {
    pub room_id: RoomId,
}

/// Zustell-Quittung (beide Richtungen)
///
/// Client -> Server: bestaetigt den Empfang einer Nachricht, `user_id` und
/// `delivered_at` bleiben leer. Server -> Urheber: beide Felder gefuellt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageDeliveredMessage {
    pub room_id: RoomId,
    pub message_id: MessageId,
    pub user_id: Option<UserId>,
    pub delivered_at: Option<DateTime<Utc>>,
}

/// Zustell-Eintrag einer Nachricht
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryInfo {
    pub user_id: UserId,
    pub delivered_at: DateTime<Utc>,
}

/// Lese-Eintrag einer Nachricht
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadInfo {
    pub user_id: UserId,
    pub read_at: DateTime<Utc>,
}

/// Nachricht in Protokoll-Darstellung
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageInfo {
    pub id: MessageId,
    pub room_id: RoomId,
    pub sender_id: UserId,
    /// Bei geloeschten Nachrichten bereits redigiert
    pub content: String,
    pub message_type: NachrichtenTyp,
    /// Server-seitig beim Empfang vergeben
    pub created_at: DateTime<Utc>,
    pub is_edited: bool,
    pub edited_at: Option<DateTime<Utc>>,
    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub delivered_to: Vec<DeliveryInfo>,
    pub read_by: Vec<ReadInfo>,
}

/// Neue Nachricht im Raum (Broadcast, inklusive Absender)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMessageEvent {
    pub room_id: RoomId,
    pub message: MessageInfo,
}

/// Nachricht wurde bearbeitet (Broadcast mit aktualisierter Nachricht)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageEditedEvent {
    pub room_id: RoomId,
    pub message: MessageInfo,
}

/// Nachricht wurde geloescht (Broadcast)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageDeletedEvent {
    pub room_id: RoomId,
    pub message_id: MessageId,
    pub deleted_at: DateTime<Utc>,
}

/// Ein Benutzer hat den Raum gelesen (genau ein Event pro markiertem Lesen)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagesReadEvent {
    pub room_id: RoomId,
    pub user_id: UserId,
}

// ---------------------------------------------------------------------------
// Tipp-Indikatoren
// ---------------------------------------------------------------------------

/// Tipp-Zustand melden (start, stop, clear)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypingRequest {
    pub room_id: RoomId,
}

/// Tipp-Indikator-Broadcast (ohne den Ausloeser)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypingEvent {
    pub room_id: RoomId,
    pub user_id: UserId,
}

// ---------------------------------------------------------------------------
// Anruf-Signalisierung
// ---------------------------------------------------------------------------

/// Medien-Konfiguration eines Anrufs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallConfig {
    pub audio: bool,
    pub video: bool,
}

/// Anruf starten (Offer an den Empfaenger)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallOfferRequest {
    pub recipient_id: UserId,
    /// Vom Anrufer vergeben, begleitet den Anruf bis zum Teardown
    pub call_id: CallId,
    /// Opakes SDP-Offer
    pub offer: serde_json::Value,
    pub config: CallConfig,
}

/// Eingehender Anruf (Relay an den Empfaenger)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncomingCallEvent {
    pub call_id: CallId,
    pub caller_id: UserId,
    pub caller_email: String,
    pub offer: serde_json::Value,
    pub config: CallConfig,
}

/// Anruf annehmen (Answer an den Anrufer)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallAnswerRequest {
    pub call_id: CallId,
    /// Opakes SDP-Answer
    pub answer: serde_json::Value,
}

/// Answer-Relay an den Anrufer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallAnsweredEvent {
    pub call_id: CallId,
    pub answer: serde_json::Value,
}

/// ICE-Kandidat (beide Richtungen, wird unveraendert weitergereicht)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IceCandidateMessage {
    pub call_id: CallId,
    pub candidate: serde_json::Value,
}

/// Anruf ablehnen
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RejectCallRequest {
    pub call_id: CallId,
    pub reason: Option<String>,
}

/// Ablehnung-Relay an den Anrufer (auch fuer automatische Busy-Ablehnung)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallRejectedEvent {
    pub call_id: CallId,
    pub reason: Option<String>,
}

/// Anruf beenden
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndCallRequest {
    pub call_id: CallId,
}

/// Anruf wurde beendet (Relay an den anderen Teilnehmer)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallEndedEvent {
    pub call_id: CallId,
}

/// Anruf fehlgeschlagen (z.B. Teardown durch Verbindungsabbruch)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallFailedEvent {
    pub call_id: CallId,
    pub reason: String,
}

// ---------------------------------------------------------------------------
// Keepalive
// ---------------------------------------------------------------------------

/// Keepalive-Ping, beide Seiten duerfen ihn schicken
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PingMessage {
    /// Millisekunden seit der Unix-Epoche, Basis der RTT-Messung
    pub timestamp_ms: u64,
}

/// Antwort auf einen Ping
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PongMessage {
    /// Zeitstempel des ausloesenden Pings, unveraendert zurueckgespiegelt
    pub echo_timestamp_ms: u64,
    /// Sendezeitpunkt der Antwort
    pub server_timestamp_ms: u64,
}

// ---------------------------------------------------------------------------
// Haupt-Enum: ControlPayload
// ---------------------------------------------------------------------------

/// Alle Ereignisse des Protokolls (typsicher via Tagged Enum)
///
/// Der serde-Tag ergibt den snake_case-Ereignisnamen auf dem Draht,
/// z.B. `CallOffer` -> `"call_offer"`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlPayload {
    // Auth
    Authenticate(AuthenticateRequest),
    Authenticated(AuthenticatedResponse),

    // Chat
    JoinChat(JoinChatRequest),
    JoinedChat(JoinedChatResponse),
    LeaveChat(LeaveChatRequest),
    SendMessage(SendMessageRequest),
    NewMessage(NewMessageEvent),
    EditMessage(EditMessageRequest),
    MessageEdited(MessageEditedEvent),
    DeleteMessage(DeleteMessageRequest),
    MessageDeleted(MessageDeletedEvent),
    MarkMessagesRead(MarkMessagesReadRequest),
    MessagesRead(MessagesReadEvent),
    MessageDelivered(MessageDeliveredMessage),

    // Tipp-Indikatoren
    TypingStart(TypingRequest),
    TypingStop(TypingRequest),
    ClearTyping(TypingRequest),
    UserTyping(TypingEvent),
    UserStoppedTyping(TypingEvent),

    // Praesenz
    UserOnline,
    UserAway,
    UserStatusChanged(UserStatusChangedEvent),

    // Anrufe
    CallOffer(CallOfferRequest),
    IncomingCall(IncomingCallEvent),
    CallAnswer(CallAnswerRequest),
    CallAnswered(CallAnsweredEvent),
    IceCandidate(IceCandidateMessage),
    RejectCall(RejectCallRequest),
    CallRejected(CallRejectedEvent),
    EndCall(EndCallRequest),
    CallEnded(CallEndedEvent),
    CallFailed(CallFailedEvent),

    // Keepalive
    Ping(PingMessage),
    Pong(PongMessage),

    // Error
    Error(ErrorResponse),
}

/// Standardisiertes Fehler-Event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: ErrorCode,
    pub message: String,
    /// Maschinell auswertbare Zusatzinformationen, falls vorhanden
    pub details: Option<serde_json::Value>,
}

// ---------------------------------------------------------------------------
// ControlMessage – der Frame-Umschlag
// ---------------------------------------------------------------------------

/// Umschlag um jede Payload auf dem Draht
///
/// Der Client vergibt die `request_id` und findet sie in der Antwort
/// des Servers wieder; so lassen sich Request und Response auch bei
/// mehreren offenen Anfragen zuordnen. Broadcasts tragen die ID 0.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlMessage {
    /// Korrelations-ID, vom Client vergeben; 0 bei Broadcasts
    pub request_id: u32,
    /// Die eigentliche Payload
    pub payload: ControlPayload,
}

impl ControlMessage {
    /// Nachricht mit expliziter Korrelations-ID
    pub fn new(request_id: u32, payload: ControlPayload) -> Self {
        Self {
            request_id,
            payload,
        }
    }

    /// Erstellt einen Broadcast (request_id 0)
    pub fn broadcast(payload: ControlPayload) -> Self {
        Self::new(0, payload)
    }

    /// Ping mit dem gegebenen Zeitstempel
    pub fn ping(request_id: u32, timestamp_ms: u64) -> Self {
        Self::new(
            request_id,
            ControlPayload::Ping(PingMessage { timestamp_ms }),
        )
    }

    /// Pong zu einem empfangenen Ping
    pub fn pong(request_id: u32, echo_timestamp_ms: u64, server_timestamp_ms: u64) -> Self {
        Self::new(
            request_id,
            ControlPayload::Pong(PongMessage {
                echo_timestamp_ms,
                server_timestamp_ms,
            }),
        )
    }

    /// Erstellt ein Fehler-Event
    pub fn error(request_id: u32, code: ErrorCode, message: impl Into<String>) -> Self {
        Self::new(
            request_id,
            ControlPayload::Error(ErrorResponse {
                code,
                message: message.into(),
                details: None,
            }),
        )
    }

    /// Die Nachricht als JSON-Text
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Parst eine Nachricht aus JSON-Text
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
