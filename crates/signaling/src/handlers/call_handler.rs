//! Call-Handler – WebRTC-Signaling zwischen genau zwei Teilnehmern
//!
//! Der Server vermittelt nur: SDP-Angebote, Antworten und
//! ICE-Kandidaten werden unveraendert zum jeweiligen Gegenueber
//! durchgereicht, die Medien laufen anschliessend peer-to-peer. Pro
//! Benutzer ist hoechstens ein Anruf gleichzeitig erlaubt.

use chrono::Utc;
use duplex_auth::TokenVerifier;
use duplex_core::types::UserId;
use duplex_protocol::control::{
    CallAnswerRequest, CallAnsweredEvent, CallEndedEvent, CallOfferRequest, CallRejectedEvent,
    ControlMessage, ControlPayload, EndCallRequest, ErrorCode, IceCandidateMessage,
    IncomingCallEvent, RejectCallRequest,
};
use duplex_store::ConversationStore;
use std::sync::Arc;

use crate::call::AnrufStart;
use crate::push::PushSink;
use crate::server_state::SignalingState;

/// Startet einen Anruf und stellt dem Angerufenen das SDP-Angebot zu
pub async fn handle_call_offer<S, V, P>(
    request: CallOfferRequest,
    request_id: u32,
    user_id: UserId,
    state: &Arc<SignalingState<S, V, P>>,
) -> ControlMessage
where
    S: ConversationStore + 'static,
    V: TokenVerifier + 'static,
    P: PushSink + 'static,
{
    if request.recipient_id == user_id {
        return ControlMessage::error(
            request_id,
            ErrorCode::InvalidRequest,
            "Anruf an sich selbst ist nicht moeglich",
        );
    }

    if !state.sessions.ist_registriert(&request.recipient_id) {
        tracing::debug!(
            anrufer = %user_id,
            angerufener = %request.recipient_id,
            "Anruf an nicht verbundenen Benutzer"
        );
        return ControlMessage::error(
            request_id,
            ErrorCode::Unreachable,
            "Benutzer ist nicht erreichbar",
        );
    }

    match state.calls.anruf_starten(
        user_id,
        request.recipient_id,
        request.call_id,
        request.config,
    ) {
        AnrufStart::InitiatorBesetzt => ControlMessage::error(
            request_id,
            ErrorCode::Busy,
            "Es laeuft bereits ein Anruf",
        ),
        AnrufStart::AngerufenerBesetzt => {
            tracing::debug!(
                anrufer = %user_id,
                angerufener = %request.recipient_id,
                "Angerufener ist besetzt"
            );
            ControlMessage::new(
                request_id,
                ControlPayload::CallRejected(CallRejectedEvent {
                    call_id: request.call_id,
                    reason: Some("Busy".to_string()),
                }),
            )
        }
        AnrufStart::Bereit => {
            let event = IncomingCallEvent {
                call_id: request.call_id,
                caller_id: user_id,
                caller_email: state.sessions.email_von(&user_id).unwrap_or_default(),
                offer: request.offer.clone(),
                config: request.config,
            };
            let zugestellt = state.sessions.an_user_senden(
                &request.recipient_id,
                ControlMessage::broadcast(ControlPayload::IncomingCall(event)),
            );
            if !zugestellt {
                // Session zwischen Pruefung und Zustellung verschwunden
                state.calls.anruf_beenden(&user_id, &request.call_id);
                return ControlMessage::error(
                    request_id,
                    ErrorCode::Unreachable,
                    "Benutzer ist nicht erreichbar",
                );
            }

            tracing::info!(
                call_id = %request.call_id,
                anrufer = %user_id,
                angerufener = %request.recipient_id,
                "Anruf gestartet"
            );
            ControlMessage::new(request_id, ControlPayload::CallOffer(request))
        }
    }
}

/// Nimmt einen eingehenden Anruf an und reicht die SDP-Antwort durch
pub async fn handle_call_answer<S, V, P>(
    request: CallAnswerRequest,
    request_id: u32,
    user_id: UserId,
    state: &Arc<SignalingState<S, V, P>>,
) -> ControlMessage
where
    S: ConversationStore + 'static,
    V: TokenVerifier + 'static,
    P: PushSink + 'static,
{
    match state.calls.anruf_annehmen(&user_id, &request.call_id) {
        Some(session) => {
            state.sessions.an_user_senden(
                &session.anrufer,
                ControlMessage::broadcast(ControlPayload::CallAnswered(CallAnsweredEvent {
                    call_id: request.call_id,
                    answer: request.answer.clone(),
                })),
            );
            tracing::info!(
                call_id = %request.call_id,
                angerufener = %user_id,
                "Anruf angenommen"
            );
            ControlMessage::new(request_id, ControlPayload::CallAnswer(request))
        }
        None => ControlMessage::error(
            request_id,
            ErrorCode::NotFound,
            "Anruf existiert nicht mehr",
        ),
    }
}

/// Reicht einen ICE-Kandidaten zum Gegenueber durch
///
/// Kandidaten ohne passenden Anruf werden kommentarlos verworfen; der
/// Austausch ist inhaerent racig (Trickle-ICE nach dem Auflegen) und
/// verdient keine Fehlerantwort.
pub async fn handle_ice_candidate<S, V, P>(
    nachricht: IceCandidateMessage,
    user_id: UserId,
    state: &Arc<SignalingState<S, V, P>>,
) where
    S: ConversationStore + 'static,
    V: TokenVerifier + 'static,
    P: PushSink + 'static,
{
    match state.calls.kandidat_ziel(&user_id, &nachricht.call_id) {
        Some(ziel) => {
            state.sessions.an_user_senden(
                &ziel,
                ControlMessage::broadcast(ControlPayload::IceCandidate(nachricht)),
            );
        }
        None => {
            tracing::trace!(
                user_id = %user_id,
                call_id = %nachricht.call_id,
                "ICE-Kandidat ohne aktiven Anruf verworfen"
            );
        }
    }
}

/// Lehnt einen eingehenden Anruf ab
pub async fn handle_reject_call<S, V, P>(
    request: RejectCallRequest,
    request_id: u32,
    user_id: UserId,
    state: &Arc<SignalingState<S, V, P>>,
) -> ControlMessage
where
    S: ConversationStore + 'static,
    V: TokenVerifier + 'static,
    P: PushSink + 'static,
{
    match state.calls.anruf_ablehnen(&user_id, &request.call_id) {
        Some(session) => {
            state.sessions.an_user_senden(
                &session.anrufer,
                ControlMessage::broadcast(ControlPayload::CallRejected(CallRejectedEvent {
                    call_id: request.call_id,
                    reason: request.reason.clone(),
                })),
            );
            tracing::info!(
                call_id = %request.call_id,
                angerufener = %user_id,
                "Anruf abgelehnt"
            );
            ControlMessage::new(request_id, ControlPayload::RejectCall(request))
        }
        None => ControlMessage::error(
            request_id,
            ErrorCode::NotFound,
            "Anruf existiert nicht mehr",
        ),
    }
}

/// Beendet einen Anruf, egal in welcher Phase er sich befindet
pub async fn handle_end_call<S, V, P>(
    request: EndCallRequest,
    request_id: u32,
    user_id: UserId,
    state: &Arc<SignalingState<S, V, P>>,
) -> ControlMessage
where
    S: ConversationStore + 'static,
    V: TokenVerifier + 'static,
    P: PushSink + 'static,
{
    match state.calls.anruf_beenden(&user_id, &request.call_id) {
        Some(session) => {
            let partner = session.partner_von(&user_id);
            state.sessions.an_user_senden(
                &partner,
                ControlMessage::broadcast(ControlPayload::CallEnded(CallEndedEvent {
                    call_id: request.call_id,
                })),
            );
            let dauer = Utc::now().signed_duration_since(session.gestartet_um);
            tracing::info!(
                call_id = %request.call_id,
                user_id = %user_id,
                dauer_sek = dauer.num_seconds(),
                "Anruf beendet"
            );
            ControlMessage::new(request_id, ControlPayload::EndCall(request))
        }
        None => ControlMessage::error(
            request_id,
            ErrorCode::NotFound,
            "Anruf existiert nicht mehr",
        ),
    }
}
