//! Typing-Handler – fluechtige Tipp-Indikatoren
//!
//! Tipp-Zustand lebt nur im Speicher und nur fuer die Dauer der
//! Session. Broadcasts gehen ausschliesslich bei echten
//! Zustandswechseln raus; wiederholte Starts desselben Users bleiben
//! stumm.

use duplex_auth::TokenVerifier;
use duplex_core::types::UserId;
use duplex_protocol::control::{ControlMessage, ControlPayload, TypingEvent, TypingRequest};
use duplex_store::ConversationStore;
use std::sync::Arc;

use crate::push::PushSink;
use crate::server_state::SignalingState;

/// Meldet den Beginn des Tippens im Raum
pub async fn handle_typing_start<S, V, P>(
    request: TypingRequest,
    request_id: u32,
    user_id: UserId,
    state: &Arc<SignalingState<S, V, P>>,
) -> ControlMessage
where
    S: ConversationStore + 'static,
    V: TokenVerifier + 'static,
    P: PushSink + 'static,
{
    if state.typing.beginnen(user_id, request.room_id) {
        let event = ControlMessage::broadcast(ControlPayload::UserTyping(TypingEvent {
            room_id: request.room_id,
            user_id,
        }));
        state
            .sessions
            .an_raum_ausser_senden(&request.room_id, &user_id, event);
    }
    ControlMessage::new(request_id, ControlPayload::TypingStart(request))
}

/// Meldet das Ende des Tippens im Raum
pub async fn handle_typing_stop<S, V, P>(
    request: TypingRequest,
    request_id: u32,
    user_id: UserId,
    state: &Arc<SignalingState<S, V, P>>,
) -> ControlMessage
where
    S: ConversationStore + 'static,
    V: TokenVerifier + 'static,
    P: PushSink + 'static,
{
    if state.typing.stoppen(&user_id, &request.room_id) {
        let event = ControlMessage::broadcast(ControlPayload::UserStoppedTyping(TypingEvent {
            room_id: request.room_id,
            user_id,
        }));
        state
            .sessions
            .an_raum_ausser_senden(&request.room_id, &user_id, event);
    }
    ControlMessage::new(request_id, ControlPayload::TypingStop(request))
}

/// Raeumt den Tipp-Indikator explizit ab, etwa nach dem Absenden
///
/// Wirkt wie ein Stop; der getrennte Payload erlaubt Clients, das
/// Abraeumen vom manuellen Aufhoeren zu unterscheiden.
pub async fn handle_clear_typing<S, V, P>(
    request: TypingRequest,
    request_id: u32,
    user_id: UserId,
    state: &Arc<SignalingState<S, V, P>>,
) -> ControlMessage
where
    S: ConversationStore + 'static,
    V: TokenVerifier + 'static,
    P: PushSink + 'static,
{
    if state.typing.stoppen(&user_id, &request.room_id) {
        let event = ControlMessage::broadcast(ControlPayload::UserStoppedTyping(TypingEvent {
            room_id: request.room_id,
            user_id,
        }));
        state
            .sessions
            .an_raum_ausser_senden(&request.room_id, &user_id, event);
    }
    ControlMessage::new(request_id, ControlPayload::ClearTyping(request))
}
