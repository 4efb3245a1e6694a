//! Geteilter Zustand des Signaling-Service
//!
//! Ein `SignalingState` pro Serverprozess; jede Verbindung und jeder
//! Handler greift ueber dieselbe Arc-Instanz auf Services und
//! Registries zu.

use duplex_auth::TokenVerifier;
use duplex_chat::ChatService;
use duplex_store::ConversationStore;
use std::sync::Arc;
use std::time::Instant;

use crate::call::CallRegistry;
use crate::presence::PresenceTracker;
use crate::push::PushSink;
use crate::registry::SessionRegistry;
use crate::typing::TypingTracker;

/// Laufzeit-Konfiguration des Signaling-Service
#[derive(Debug, Clone)]
pub struct SignalingConfig {
    /// Name, unter dem sich der Server meldet
    pub server_name: String,
    /// Obergrenze gleichzeitig verbundener Clients
    pub max_clients: u32,
    /// Abstand zwischen zwei Keepalive-Pings in Sekunden
    pub keepalive_sek: u64,
    /// Sekunden ohne Lebenszeichen, nach denen eine Verbindung faellt
    pub verbindungs_timeout_sek: u64,
}

impl Default for SignalingConfig {
    fn default() -> Self {
        Self {
            server_name: "Duplex Server".to_string(),
            max_clients: 512,
            keepalive_sek: 30,
            verbindungs_timeout_sek: 90,
        }
    }
}

/// Geteilter Zustand: Services plus In-Memory-Registries
///
/// Die Registries (Sessions, Presence, Typing, Calls) sind intern
/// bereits Arc-geteilt; der State selbst wird einmal gebaut und als
/// Arc herumgereicht.
pub struct SignalingState<S, V, P>
where
    S: ConversationStore + 'static,
    V: TokenVerifier + 'static,
    P: PushSink + 'static,
{
    /// Konfiguration, eingefroren beim Start
    pub config: Arc<SignalingConfig>,
    /// Token-Verifizierung (Auth-Kollaborateur)
    pub verifier: Arc<V>,
    /// Push-Benachrichtigungen fuer Offline-Empfaenger
    pub push: Arc<P>,
    /// Chat-Service (Nachrichten senden, Quittungen, Verlauf)
    pub chat_service: Arc<ChatService<S>>,
    /// Session-Registry (wer ist verbunden, Send-Queues)
    pub sessions: SessionRegistry,
    /// Presence-Tracker (online/away/offline, zuletzt gesehen)
    pub presence: PresenceTracker,
    /// Typing-Tracker (wer tippt in welchem Raum)
    pub typing: TypingTracker,
    /// Call-Registry (aktive Anrufe, ein Anruf pro Benutzer)
    pub calls: CallRegistry,
    /// Startzeitpunkt des Prozesses
    pub start_time: Instant,
}

impl<S, V, P> SignalingState<S, V, P>
where
    S: ConversationStore + 'static,
    V: TokenVerifier + 'static,
    P: PushSink + 'static,
{
    /// Baut den Zustand aus Konfiguration und Kollaborateuren
    pub fn neu(
        config: SignalingConfig,
        store: Arc<S>,
        verifier: Arc<V>,
        push: Arc<P>,
    ) -> Arc<Self> {
        Arc::new(Self {
            config: Arc::new(config),
            verifier,
            push,
            chat_service: ChatService::neu(store),
            sessions: SessionRegistry::neu(),
            presence: PresenceTracker::neu(),
            typing: TypingTracker::neu(),
            calls: CallRegistry::neu(),
            start_time: Instant::now(),
        })
    }

    /// Sekunden seit dem Prozessstart
    pub fn uptime_sek(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
