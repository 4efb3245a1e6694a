//! Message-Dispatcher – verteilt ControlMessages auf die Handler
//!
//! Die ClientConnection reicht jede dekodierte ControlMessage hier
//! herein; der Dispatcher waehlt anhand der Payload den Handler und
//! liefert dessen Antwort zurueck an die Verbindung.
//!
//! ## Anmelde-Schranke
//! Vor der Authentifizierung kommen nur `Authenticate` und Ping/Pong
//! durch; alles andere wird mit einem Fehler beantwortet. Nach
//! erfolgreicher Anmeldung routet `dispatch_authenticated` unter der
//! verifizierten User-ID.

use duplex_auth::{Identitaet, TokenVerifier};
use duplex_core::types::UserId;
use duplex_protocol::control::{
    CallFailedEvent, ControlMessage, ControlPayload, ErrorCode, PresenceStatus, TypingEvent,
    UserStatusChangedEvent,
};
use duplex_store::ConversationStore;
use std::sync::Arc;

use crate::handlers::{
    auth_handler, call_handler, chat_handler, presence_handler, typing_handler,
};
use crate::push::PushSink;
use crate::registry::SessionAnmeldung;
use crate::server_state::SignalingState;

/// Dispatcher-Kontext – Verbindungszustand einer einzelnen Session
#[derive(Default)]
pub struct DispatcherContext {
    /// Verifizierte Identitaet (None solange nicht authentifiziert)
    pub identitaet: Option<Identitaet>,
    /// Signalisiert der Verbindung, dass sie nach der Antwort schliessen soll
    pub beenden: bool,
}

/// Verteilt eingehende ControlMessages auf die Handler
///
/// Eine Instanz pro Verbindung; der eigentliche Zustand liegt im
/// geteilten `SignalingState`.
pub struct MessageDispatcher<S, V, P>
where
    S: ConversationStore + 'static,
    V: TokenVerifier + 'static,
    P: PushSink + 'static,
{
    state: Arc<SignalingState<S, V, P>>,
}

impl<S, V, P> MessageDispatcher<S, V, P>
where
    S: ConversationStore + 'static,
    V: TokenVerifier + 'static,
    P: PushSink + 'static,
{
    /// Dispatcher ueber dem geteilten Zustand
    pub fn neu(state: Arc<SignalingState<S, V, P>>) -> Self {
        Self { state }
    }

    /// Nimmt eine ControlMessage entgegen und liefert die Antwort
    ///
    /// `None` heisst: an den Absender geht nichts zurueck, etwa bei
    /// ICE-Kandidaten, die nur an die Gegenseite weitergereicht werden.
    pub async fn dispatch(
        &self,
        message: ControlMessage,
        ctx: &mut DispatcherContext,
    ) -> Option<ControlMessage> {
        let request_id = message.request_id;

        match message.payload {
            // -------------------------------------------------------------------
            // Auth-Handshake (immer erlaubt)
            // -------------------------------------------------------------------
            ControlPayload::Authenticate(req) => {
                if ctx.identitaet.is_some() {
                    return Some(ControlMessage::error(
                        request_id,
                        ErrorCode::AlreadyAuthenticated,
                        "Diese Verbindung ist bereits angemeldet",
                    ));
                }

                let (antwort, identitaet) =
                    auth_handler::handle_authenticate(req, request_id, &self.state).await;

                match identitaet {
                    Some(id) => {
                        tracing::debug!(user_id = %id.user_id, "Anmeldung erfolgreich");
                        ctx.identitaet = Some(id);
                    }
                    // Fehlgeschlagene Anmeldung beendet die Verbindung
                    None => ctx.beenden = true,
                }

                Some(antwort)
            }

            // -------------------------------------------------------------------
            // Keepalive
            // -------------------------------------------------------------------
            ControlPayload::Ping(ping) => {
                let server_ts = chrono::Utc::now().timestamp_millis() as u64;
                Some(ControlMessage::pong(
                    request_id,
                    ping.timestamp_ms,
                    server_ts,
                ))
            }

            ControlPayload::Pong(_) => {
                // Der Client misst seine RTT selbst, mehr als Trace braucht es nicht
                tracing::trace!("Pong empfangen");
                None
            }

            // -------------------------------------------------------------------
            // Alles Weitere verlangt eine angemeldete Session
            // -------------------------------------------------------------------
            payload => {
                let user_id = match &ctx.identitaet {
                    Some(id) => id.user_id,
                    None => {
                        // Vor der Anmeldung ist nur der Handshake zulaessig
                        ctx.beenden = true;
                        return Some(ControlMessage::error(
                            request_id,
                            ErrorCode::AuthenticationFailed,
                            "Anmeldung erforderlich",
                        ));
                    }
                };

                self.dispatch_authenticated(payload, request_id, user_id)
                    .await
            }
        }
    }

    /// Verteilung fuer alles hinter der Anmelde-Schranke
    async fn dispatch_authenticated(
        &self,
        payload: ControlPayload,
        request_id: u32,
        user_id: UserId,
    ) -> Option<ControlMessage> {
        match payload {
            // -------------------------------------------------------------------
            // Chat
            // -------------------------------------------------------------------
            ControlPayload::JoinChat(req) => Some(
                chat_handler::handle_join_chat(req, request_id, user_id, &self.state).await,
            ),

            ControlPayload::LeaveChat(req) => Some(
                chat_handler::handle_leave_chat(req, request_id, user_id, &self.state).await,
            ),

            ControlPayload::SendMessage(req) => Some(
                chat_handler::handle_send_message(req, request_id, user_id, &self.state).await,
            ),

            ControlPayload::EditMessage(req) => Some(
                chat_handler::handle_edit_message(req, request_id, user_id, &self.state).await,
            ),

            ControlPayload::DeleteMessage(req) => Some(
                chat_handler::handle_delete_message(req, request_id, user_id, &self.state).await,
            ),

            ControlPayload::MarkMessagesRead(req) => Some(
                chat_handler::handle_mark_read(req, request_id, user_id, &self.state).await,
            ),

            ControlPayload::MessageDelivered(msg) => Some(
                chat_handler::handle_message_delivered(msg, request_id, user_id, &self.state)
                    .await,
            ),

            // -------------------------------------------------------------------
            // Tipp-Indikatoren
            // -------------------------------------------------------------------
            ControlPayload::TypingStart(req) => Some(
                typing_handler::handle_typing_start(req, request_id, user_id, &self.state).await,
            ),

            ControlPayload::TypingStop(req) => Some(
                typing_handler::handle_typing_stop(req, request_id, user_id, &self.state).await,
            ),

            ControlPayload::ClearTyping(req) => Some(
                typing_handler::handle_clear_typing(req, request_id, user_id, &self.state).await,
            ),

            // -------------------------------------------------------------------
            // Praesenz
            // -------------------------------------------------------------------
            ControlPayload::UserOnline => Some(
                presence_handler::handle_status_wechsel(
                    PresenceStatus::Online,
                    request_id,
                    user_id,
                    &self.state,
                )
                .await,
            ),

            ControlPayload::UserAway => Some(
                presence_handler::handle_status_wechsel(
                    PresenceStatus::Away,
                    request_id,
                    user_id,
                    &self.state,
                )
                .await,
            ),

            // -------------------------------------------------------------------
            // Anruf-Signaling
            // -------------------------------------------------------------------
            ControlPayload::CallOffer(req) => Some(
                call_handler::handle_call_offer(req, request_id, user_id, &self.state).await,
            ),

            ControlPayload::CallAnswer(req) => Some(
                call_handler::handle_call_answer(req, request_id, user_id, &self.state).await,
            ),

            ControlPayload::IceCandidate(msg) => {
                call_handler::handle_ice_candidate(msg, user_id, &self.state).await;
                None
            }

            ControlPayload::RejectCall(req) => Some(
                call_handler::handle_reject_call(req, request_id, user_id, &self.state).await,
            ),

            ControlPayload::EndCall(req) => Some(
                call_handler::handle_end_call(req, request_id, user_id, &self.state).await,
            ),

            // -------------------------------------------------------------------
            // Server-Events, die ein Client gar nicht schicken duerfte
            // -------------------------------------------------------------------
            ControlPayload::Authenticated(_)
            | ControlPayload::JoinedChat(_)
            | ControlPayload::NewMessage(_)
            | ControlPayload::MessageEdited(_)
            | ControlPayload::MessageDeleted(_)
            | ControlPayload::MessagesRead(_)
            | ControlPayload::UserTyping(_)
            | ControlPayload::UserStoppedTyping(_)
            | ControlPayload::UserStatusChanged(_)
            | ControlPayload::IncomingCall(_)
            | ControlPayload::CallAnswered(_)
            | ControlPayload::CallRejected(_)
            | ControlPayload::CallEnded(_)
            | ControlPayload::CallFailed(_)
            | ControlPayload::Error(_) => {
                tracing::warn!(
                    request_id,
                    user_id = %user_id,
                    "Client schickt ein Server-Event"
                );
                Some(ControlMessage::error(
                    request_id,
                    ErrorCode::InvalidRequest,
                    "Nachricht in diesem Zustand nicht zulaessig",
                ))
            }

            // Ping/Pong nimmt schon `dispatch` ab, hier kommen sie nie an
            ControlPayload::Ping(_) | ControlPayload::Pong(_) => None,

            // Authenticate im authentifizierten Zustand – Fehlermeldung
            ControlPayload::Authenticate(_) => Some(ControlMessage::error(
                request_id,
                ErrorCode::AlreadyAuthenticated,
                "Diese Verbindung ist bereits angemeldet",
            )),
        }
    }

    /// Registriert eine frisch authentifizierte Session
    ///
    /// Verdraengt eine bestehende Session desselben Benutzers: deren
    /// fluechtiger Zustand (Tipp-Indikatoren, Anrufe, Raum-Abonnements)
    /// wird vorher abgeraeumt, der Benutzer bleibt dabei durchgehend
    /// online. Der Rest der Welt erfaehrt vom Statuswechsel per
    /// Broadcast.
    pub fn client_registrieren(&self, identitaet: &Identitaet) -> SessionAnmeldung {
        if self.state.sessions.ist_registriert(&identitaet.user_id) {
            tracing::info!(
                user_id = %identitaet.user_id,
                "Session-Wechsel – Zustand der alten Session wird abgeraeumt"
            );
            self.benutzer_zustand_abraeumen(&identitaet.user_id);
        }

        let anmeldung = self.state.sessions.registrieren(identitaet);

        let eintrag = self
            .state
            .presence
            .status_setzen(identitaet.user_id, PresenceStatus::Online);
        self.state.sessions.an_alle_ausser_senden(
            &identitaet.user_id,
            ControlMessage::broadcast(ControlPayload::UserStatusChanged(UserStatusChangedEvent {
                user_id: identitaet.user_id,
                status: eintrag.status,
                last_seen: eintrag.last_seen,
            })),
        );

        tracing::info!(
            user_id = %identitaet.user_id,
            email = %identitaet.email,
            "Session angemeldet"
        );
        anmeldung
    }

    /// Abbau beim Trennen einer Verbindung
    ///
    /// Nur die Session, die den Zustand angelegt hat, darf ihn auch
    /// abraeumen: stimmt die Generation nicht mehr, wurde die Session
    /// zwischenzeitlich verdraengt und die Bereinigung entfaellt.
    pub fn client_cleanup(&self, user_id: &UserId, generation: u64) {
        if !self.state.sessions.generation_aktuell(user_id, generation) {
            tracing::debug!(
                user_id = %user_id,
                generation,
                "Bereinigung uebersprungen – Session wurde ersetzt"
            );
            return;
        }

        let eintrag = self.state.presence.client_getrennt(*user_id);
        self.state.sessions.an_alle_ausser_senden(
            user_id,
            ControlMessage::broadcast(ControlPayload::UserStatusChanged(UserStatusChangedEvent {
                user_id: *user_id,
                status: eintrag.status,
                last_seen: eintrag.last_seen,
            })),
        );

        self.benutzer_zustand_abraeumen(user_id);
        self.state.sessions.entfernen(user_id, generation);

        tracing::debug!(user_id = %user_id, "Fluechtiger Zustand abgeraeumt");
    }

    /// Raeumt den fluechtigen Zustand eines Benutzers ab
    ///
    /// Tipp-Indikatoren werden pro Raum als gestoppt gemeldet, ein
    /// laufender Anruf wird dem Gegenueber als gescheitert signalisiert,
    /// Raum-Abonnements enden.
    fn benutzer_zustand_abraeumen(&self, user_id: &UserId) {
        for room_id in self.state.typing.alle_stoppen(user_id) {
            self.state.sessions.an_raum_ausser_senden(
                &room_id,
                user_id,
                ControlMessage::broadcast(ControlPayload::UserStoppedTyping(TypingEvent {
                    room_id,
                    user_id: *user_id,
                })),
            );
        }

        if let Some(session) = self.state.calls.teilnehmer_trennen(user_id) {
            let partner = session.partner_von(user_id);
            self.state.sessions.an_user_senden(
                &partner,
                ControlMessage::broadcast(ControlPayload::CallFailed(CallFailedEvent {
                    call_id: session.call_id,
                    reason: "Peer disconnected".to_string(),
                })),
            );
            tracing::info!(
                call_id = %session.call_id,
                user_id = %user_id,
                "Laufender Anruf durch Trennung beendet"
            );
        }

        self.state.sessions.alle_raeume_verlassen(user_id);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
