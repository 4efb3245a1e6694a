//! Presence-Handler – vom Client gemeldete Statuswechsel
//!
//! Online wird beim Verbindungsaufbau automatisch gesetzt, Offline beim
//! Trennen. Hier landen nur die explizit gemeldeten Wechsel (online
//! nach Rueckkehr, away bei Inaktivitaet), die an alle Sessions
//! weitergereicht werden.

use duplex_auth::TokenVerifier;
use duplex_core::types::UserId;
use duplex_protocol::control::{
    ControlMessage, ControlPayload, PresenceStatus, UserStatusChangedEvent,
};
use duplex_store::ConversationStore;
use std::sync::Arc;

use crate::push::PushSink;
use crate::server_state::SignalingState;

/// Setzt den gemeldeten Status und verteilt ihn an alle Sessions
pub async fn handle_status_wechsel<S, V, P>(
    status: PresenceStatus,
    request_id: u32,
    user_id: UserId,
    state: &Arc<SignalingState<S, V, P>>,
) -> ControlMessage
where
    S: ConversationStore + 'static,
    V: TokenVerifier + 'static,
    P: PushSink + 'static,
{
    let eintrag = state.presence.status_setzen(user_id, status);

    let event = UserStatusChangedEvent {
        user_id,
        status: eintrag.status,
        last_seen: eintrag.last_seen,
    };
    state.sessions.an_alle_ausser_senden(
        &user_id,
        ControlMessage::broadcast(ControlPayload::UserStatusChanged(event.clone())),
    );

    ControlMessage::new(request_id, ControlPayload::UserStatusChanged(event))
}
