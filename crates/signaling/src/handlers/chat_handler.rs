//! Chat-Handler – Raum-Abonnements, Nachrichten und Quittungen
//!
//! Routet Chat-Ereignisse ueber den ChatService und verteilt die
//! Ergebnisse an die Abonnenten des Raums. Der Ausloeser bekommt seine
//! Kopie als direkte Antwort auf die request_id, der Rest des Raums als
//! Broadcast; so erhaelt jede Session genau eine Zustellung.

use duplex_auth::TokenVerifier;
use duplex_chat::{ChatError, ChatNachricht};
use duplex_core::types::{MessageId, RoomId, UserId};
use duplex_protocol::control::{
    ControlMessage, ControlPayload, DeliveryInfo, DeleteMessageRequest, EditMessageRequest,
    JoinChatRequest, JoinedChatResponse, LeaveChatRequest, MarkMessagesReadRequest,
    MessageDeletedEvent, MessageDeliveredMessage, MessageEditedEvent, MessageInfo,
    MessagesReadEvent, NewMessageEvent, ReadInfo, SendMessageRequest,
};
use duplex_store::ConversationStore;
use std::sync::Arc;

use crate::error::chat_fehlercode;
use crate::push::{PushSink, PushZusammenfassung};
use crate::server_state::SignalingState;

/// Verarbeitet einen Raum-Beitritt
///
/// Prueft gegen die Teilnehmerliste der Konversation und abonniert die
/// Session erst bei Erfolg.
pub async fn handle_join_chat<S, V, P>(
    request: JoinChatRequest,
    request_id: u32,
    user_id: UserId,
    state: &Arc<SignalingState<S, V, P>>,
) -> ControlMessage
where
    S: ConversationStore + 'static,
    V: TokenVerifier + 'static,
    P: PushSink + 'static,
{
    match state
        .chat_service
        .teilnehmer_pruefen(request.room_id.inner(), user_id.inner())
        .await
    {
        Ok(_) => {
            state.sessions.raum_beitreten(user_id, request.room_id);
            tracing::debug!(user_id = %user_id, room_id = %request.room_id, "Raum abonniert");
            ControlMessage::new(
                request_id,
                ControlPayload::JoinedChat(JoinedChatResponse {
                    room_id: request.room_id,
                }),
            )
        }
        Err(e) => chat_fehler(request_id, "Raum konnte nicht betreten werden", &e),
    }
}

/// Verarbeitet das Verlassen eines Raums
///
/// Das Abonnement endet bedingungslos; einen Raum zu verlassen, den man
/// nicht abonniert hat, ist ein No-Op.
pub async fn handle_leave_chat<S, V, P>(
    request: LeaveChatRequest,
    request_id: u32,
    user_id: UserId,
    state: &Arc<SignalingState<S, V, P>>,
) -> ControlMessage
where
    S: ConversationStore + 'static,
    V: TokenVerifier + 'static,
    P: PushSink + 'static,
{
    state.sessions.raum_verlassen(&user_id, &request.room_id);
    tracing::debug!(user_id = %user_id, room_id = %request.room_id, "Raum verlassen");
    ControlMessage::new(request_id, ControlPayload::LeaveChat(request))
}

/// Verarbeitet das Senden einer Nachricht
///
/// Der Zeitstempel wird serverseitig vergeben. Nicht verbundene
/// Teilnehmer werden best-effort ueber den Push-Sink benachrichtigt;
/// ein Fehler dort laesst das Senden nicht scheitern.
pub async fn handle_send_message<S, V, P>(
    request: SendMessageRequest,
    request_id: u32,
    user_id: UserId,
    state: &Arc<SignalingState<S, V, P>>,
) -> ControlMessage
where
    S: ConversationStore + 'static,
    V: TokenVerifier + 'static,
    P: PushSink + 'static,
{
    let ergebnis = match state
        .chat_service
        .nachricht_senden(
            request.room_id.inner(),
            user_id.inner(),
            &request.content,
            request.message_type.clone(),
        )
        .await
    {
        Ok(ergebnis) => ergebnis,
        Err(e) => {
            tracing::warn!(
                user_id = %user_id,
                fehler = %e,
                "Senden der Nachricht gescheitert"
            );
            return chat_fehler(request_id, "Nachricht konnte nicht gesendet werden", &e);
        }
    };

    let info = nachricht_zu_info(&ergebnis.nachricht);

    // Nachricht an die uebrigen Abonnenten des Raums verteilen
    let event = ControlMessage::broadcast(ControlPayload::NewMessage(NewMessageEvent {
        room_id: request.room_id,
        message: info.clone(),
    }));
    let zugestellt = state
        .sessions
        .an_raum_ausser_senden(&request.room_id, &user_id, event);

    // Offline-Teilnehmer best-effort benachrichtigen
    for teilnehmer in &ergebnis.teilnehmer {
        let empfaenger = UserId(*teilnehmer);
        if empfaenger == user_id || state.sessions.ist_registriert(&empfaenger) {
            continue;
        }
        let zusammenfassung =
            PushZusammenfassung::aus_nachricht(request.room_id, user_id, &info.content);
        if let Err(e) = state.push.notify_offline(&empfaenger, &zusammenfassung).await {
            tracing::error!(
                empfaenger = %empfaenger,
                fehler = %e,
                wiederholbar = e.ist_wiederholbar(),
                "Push-Benachrichtigung fehlgeschlagen"
            );
        }
    }

    tracing::debug!(
        user_id = %user_id,
        room_id = %request.room_id,
        message_id = %info.id,
        zugestellt,
        "Nachricht gesendet"
    );

    ControlMessage::new(
        request_id,
        ControlPayload::NewMessage(NewMessageEvent {
            room_id: request.room_id,
            message: info,
        }),
    )
}

/// Verarbeitet das Bearbeiten einer Nachricht (nur der Verfasser)
pub async fn handle_edit_message<S, V, P>(
    request: EditMessageRequest,
    request_id: u32,
    user_id: UserId,
    state: &Arc<SignalingState<S, V, P>>,
) -> ControlMessage
where
    S: ConversationStore + 'static,
    V: TokenVerifier + 'static,
    P: PushSink + 'static,
{
    match state
        .chat_service
        .nachricht_bearbeiten(
            request.room_id.inner(),
            request.message_id.inner(),
            user_id.inner(),
            &request.new_content,
        )
        .await
    {
        Ok(ergebnis) => {
            let info = nachricht_zu_info(&ergebnis.nachricht);

            let event = ControlMessage::broadcast(ControlPayload::MessageEdited(
                MessageEditedEvent {
                    room_id: request.room_id,
                    message: info.clone(),
                },
            ));
            state
                .sessions
                .an_raum_ausser_senden(&request.room_id, &user_id, event);

            tracing::debug!(
                user_id = %user_id,
                message_id = %request.message_id,
                "Nachricht bearbeitet"
            );

            ControlMessage::new(
                request_id,
                ControlPayload::MessageEdited(MessageEditedEvent {
                    room_id: request.room_id,
                    message: info,
                }),
            )
        }
        Err(e) => chat_fehler(request_id, "Nachricht konnte nicht bearbeitet werden", &e),
    }
}

/// Verarbeitet das Loeschen einer Nachricht (Soft-Delete, nur der Verfasser)
///
/// Wiederholtes Loeschen broadcastet nicht erneut.
pub async fn handle_delete_message<S, V, P>(
    request: DeleteMessageRequest,
    request_id: u32,
    user_id: UserId,
    state: &Arc<SignalingState<S, V, P>>,
) -> ControlMessage
where
    S: ConversationStore + 'static,
    V: TokenVerifier + 'static,
    P: PushSink + 'static,
{
    match state
        .chat_service
        .nachricht_loeschen(
            request.room_id.inner(),
            request.message_id.inner(),
            user_id.inner(),
        )
        .await
    {
        Ok(ergebnis) => {
            if ergebnis.neu_geloescht {
                let event = ControlMessage::broadcast(ControlPayload::MessageDeleted(
                    MessageDeletedEvent {
                        room_id: request.room_id,
                        message_id: request.message_id,
                        deleted_at: ergebnis.deleted_at,
                    },
                ));
                state
                    .sessions
                    .an_raum_ausser_senden(&request.room_id, &user_id, event);
            }

            tracing::debug!(
                user_id = %user_id,
                message_id = %request.message_id,
                neu = ergebnis.neu_geloescht,
                "Nachricht geloescht"
            );

            ControlMessage::new(
                request_id,
                ControlPayload::MessageDeleted(MessageDeletedEvent {
                    room_id: request.room_id,
                    message_id: request.message_id,
                    deleted_at: ergebnis.deleted_at,
                }),
            )
        }
        Err(e) => chat_fehler(request_id, "Nachricht konnte nicht geloescht werden", &e),
    }
}

/// Markiert alle ungelesenen fremden Nachrichten eines Raums als gelesen
///
/// Der Raum bekommt genau ein Sammel-Event statt einer Quittung pro
/// Nachricht.
pub async fn handle_mark_read<S, V, P>(
    request: MarkMessagesReadRequest,
    request_id: u32,
    user_id: UserId,
    state: &Arc<SignalingState<S, V, P>>,
) -> ControlMessage
where
    S: ConversationStore + 'static,
    V: TokenVerifier + 'static,
    P: PushSink + 'static,
{
    match state
        .chat_service
        .gelesen_markieren(request.room_id.inner(), user_id.inner())
        .await
    {
        Ok(ergebnis) => {
            let event = ControlMessage::broadcast(ControlPayload::MessagesRead(
                MessagesReadEvent {
                    room_id: request.room_id,
                    user_id,
                },
            ));
            state
                .sessions
                .an_raum_ausser_senden(&request.room_id, &user_id, event);

            tracing::debug!(
                user_id = %user_id,
                room_id = %request.room_id,
                markiert = ergebnis.markiert.len(),
                "Nachrichten als gelesen markiert"
            );

            ControlMessage::new(
                request_id,
                ControlPayload::MessagesRead(MessagesReadEvent {
                    room_id: request.room_id,
                    user_id,
                }),
            )
        }
        Err(e) => chat_fehler(request_id, "Lesen konnte nicht markiert werden", &e),
    }
}

/// Quittiert die Zustellung einer Nachricht
///
/// Die Quittung geht punkt-zu-punkt an den Verfasser, nicht in den Raum.
pub async fn handle_message_delivered<S, V, P>(
    request: MessageDeliveredMessage,
    request_id: u32,
    user_id: UserId,
    state: &Arc<SignalingState<S, V, P>>,
) -> ControlMessage
where
    S: ConversationStore + 'static,
    V: TokenVerifier + 'static,
    P: PushSink + 'static,
{
    match state
        .chat_service
        .zustellung_bestaetigen(
            request.room_id.inner(),
            request.message_id.inner(),
            user_id.inner(),
        )
        .await
    {
        Ok(ergebnis) => {
            let quittung = MessageDeliveredMessage {
                room_id: request.room_id,
                message_id: request.message_id,
                user_id: Some(user_id),
                delivered_at: Some(ergebnis.delivered_at),
            };

            let verfasser = UserId(ergebnis.sender_id);
            if verfasser != user_id {
                state.sessions.an_user_senden(
                    &verfasser,
                    ControlMessage::broadcast(ControlPayload::MessageDelivered(quittung.clone())),
                );
            }

            tracing::trace!(
                user_id = %user_id,
                message_id = %request.message_id,
                "Zustellung quittiert"
            );

            ControlMessage::new(request_id, ControlPayload::MessageDelivered(quittung))
        }
        Err(e) => chat_fehler(request_id, "Zustellung konnte nicht quittiert werden", &e),
    }
}

/// Konvertiert den Domain-Typ in die Protokoll-Darstellung
pub fn nachricht_zu_info(nachricht: &ChatNachricht) -> MessageInfo {
    MessageInfo {
        id: MessageId(nachricht.id),
        room_id: RoomId(nachricht.room_id),
        sender_id: UserId(nachricht.sender_id),
        content: nachricht.content.clone(),
        message_type: nachricht.message_type.clone(),
        created_at: nachricht.created_at,
        is_edited: nachricht.is_edited,
        edited_at: nachricht.edited_at,
        is_deleted: nachricht.is_deleted,
        deleted_at: nachricht.deleted_at,
        delivered_to: nachricht
            .delivered_to
            .iter()
            .map(|z| DeliveryInfo {
                user_id: UserId(z.user_id),
                delivered_at: z.delivered_at,
            })
            .collect(),
        read_by: nachricht
            .read_by
            .iter()
            .map(|q| ReadInfo {
                user_id: UserId(q.user_id),
                read_at: q.read_at,
            })
            .collect(),
    }
}

/// Baut die Fehlerantwort zu einem ChatError
fn chat_fehler(request_id: u32, kontext: &str, fehler: &ChatError) -> ControlMessage {
    ControlMessage::error(
        request_id,
        chat_fehlercode(fehler),
        format!("{}: {}", kontext, fehler),
    )
}
