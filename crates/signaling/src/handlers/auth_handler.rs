//! Auth-Handler – Token-Verifikation beim Verbindungsaufbau
//!
//! Verarbeitet den Authenticate-Handshake und delegiert an den
//! TokenVerifier. Bei Erfolg uebernimmt die Verbindung die Identitaet
//! in ihren Kontext und registriert sich in der SessionRegistry.

use duplex_auth::{Identitaet, TokenVerifier};
use duplex_protocol::control::{
    AuthenticateRequest, AuthenticatedResponse, ControlMessage, ControlPayload, ErrorCode,
};
use duplex_store::ConversationStore;
use std::sync::Arc;

use crate::error::SignalingResult;
use crate::push::PushSink;
use crate::server_state::SignalingState;

/// Verarbeitet eine Authenticate-Anfrage
///
/// Gibt bei Erfolg die verifizierte Identitaet zurueck, damit die
/// Verbindung sie registrieren kann. Bei einem ungueltigen Token wird
/// die Verbindung nach dem Fehler-Event geschlossen.
pub async fn handle_authenticate<S, V, P>(
    request: AuthenticateRequest,
    request_id: u32,
    state: &Arc<SignalingState<S, V, P>>,
) -> (ControlMessage, Option<Identitaet>)
where
    S: ConversationStore + 'static,
    V: TokenVerifier + 'static,
    P: PushSink + 'static,
{
    match token_pruefen(&request.token, state).await {
        Ok(identitaet) => {
            tracing::info!(
                user_id = %identitaet.user_id,
                email = %identitaet.email,
                "Authentifizierung erfolgreich"
            );
            let antwort = ControlMessage::new(
                request_id,
                ControlPayload::Authenticated(AuthenticatedResponse {
                    user_id: identitaet.user_id,
                    email: identitaet.email.clone(),
                }),
            );
            (antwort, Some(identitaet))
        }
        Err(e) => {
            tracing::warn!(fehler = %e, "Anmeldeversuch abgewiesen");
            (
                ControlMessage::error(
                    request_id,
                    ErrorCode::AuthenticationFailed,
                    "Token unbekannt oder abgelaufen",
                ),
                None,
            )
        }
    }
}

/// Verifiziert einen Token und gibt die Identitaet zurueck
pub async fn token_pruefen<S, V, P>(
    token: &str,
    state: &Arc<SignalingState<S, V, P>>,
) -> SignalingResult<Identitaet>
where
    S: ConversationStore + 'static,
    V: TokenVerifier + 'static,
    P: PushSink + 'static,
{
    let identitaet = state.verifier.verify(token).await?;
    Ok(identitaet)
}
