//! Client-Connection – der Lebenszyklus einer TCP-Verbindung
//!
//! Pro akzeptierter Verbindung laeuft eine `ClientConnection` in ihrem
//! eigenen tokio-Task. Erst nach dem Authenticate-Frame wird die Session
//! im Registry angemeldet und mit ihrem Postfach verbunden.
//!
//! ## Lebenszeichen
//! Der Server pingt alle `keepalive_sek`. Sendet der Client laenger als
//! `verbindungs_timeout_sek` gar nichts (auch kein Pong), gilt die
//! Verbindung als tot und wird abgebaut.
//!
//! ## Verdraengung
//! Meldet sich derselbe Benutzer erneut an, verdraengt die neue Session
//! die alte: deren Verbindung bekommt eine Abschiedsnachricht und wird
//! geschlossen, ohne den Zustand des Nachfolgers anzutasten.

use duplex_auth::TokenVerifier;
use duplex_core::types::UserId;
use duplex_protocol::{
    control::{ControlMessage, ErrorCode},
    wire::FrameCodec,
};
use duplex_store::ConversationStore;
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio_util::codec::Framed;

use crate::dispatcher::{DispatcherContext, MessageDispatcher};
use crate::push::PushSink;
use crate::server_state::SignalingState;

/// Groesse der ausgehenden Nachrichten-Queue pro Verbindung
const SENDE_QUEUE_GROESSE: usize = 64;

/// Treibt eine einzelne TCP-Verbindung
///
/// Dekodiert Frames mit dem `FrameCodec`, reicht sie an den
/// `MessageDispatcher` und schreibt dessen Antworten zurueck auf den
/// Stream. Laeuft in einem eigenen tokio-Task.
pub struct ClientConnection<S, V, P>
where
    S: ConversationStore + 'static,
    V: TokenVerifier + 'static,
    P: PushSink + 'static,
{
    state: Arc<SignalingState<S, V, P>>,
    peer_addr: SocketAddr,
}

impl<S, V, P> ClientConnection<S, V, P>
where
    S: ConversationStore + 'static,
    V: TokenVerifier + 'static,
    P: PushSink + 'static,
{
    /// Verbindung fuer die gegebene Gegenstelle
    pub fn neu(state: Arc<SignalingState<S, V, P>>, peer_addr: SocketAddr) -> Self {
        Self { state, peer_addr }
    }

    /// Nimmt den Stream in Besitz und treibt ihn bis zum Ende
    ///
    /// Kehrt zurueck, wenn die Verbindung getrennt wird, die Session
    /// verdraengt wird oder ein Shutdown-Signal eingeht.
    pub async fn verarbeiten(
        self,
        stream: TcpStream,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        let peer_addr = self.peer_addr;
        let ping_intervall = Duration::from_secs(self.state.config.keepalive_sek);
        let stille_limit = Duration::from_secs(self.state.config.verbindungs_timeout_sek);

        tracing::info!(peer = %peer_addr, "Client verbunden");

        let mut framed = Framed::new(stream, FrameCodec::new());

        // Ausgehende Nachrichten-Queue (Session-Postfach -> TCP)
        // Wird nach der Anmeldung mit dem Registry-Postfach verknuepft
        let (sende_tx, mut sende_rx) = mpsc::channel::<ControlMessage>(SENDE_QUEUE_GROESSE);

        // Verdraengungs-Signal; bis zur Anmeldung ein Platzhalter der nie feuert
        let (_trennung_halter, mut trennung_rx) = watch::channel(false);

        let mut ctx = DispatcherContext::default();
        let dispatcher = MessageDispatcher::neu(Arc::clone(&self.state));

        // Registrierte Session dieser Verbindung (User-ID plus Generation)
        let mut session: Option<(UserId, u64)> = None;

        let mut zuletzt_gehoert = Instant::now();
        let mut ping_faellig = Instant::now() + ping_intervall;
        let mut ping_request_id: u32 = 0;

        loop {
            let jetzt = Instant::now();

            // Wer zu lange gar nichts sendet, gilt als tot
            if jetzt.duration_since(zuletzt_gehoert) > stille_limit {
                tracing::warn!(peer = %peer_addr, "Keine Aktivitaet – Verbindung wird getrennt");
                break;
            }

            let ping_wartezeit = ping_faellig.saturating_duration_since(jetzt);

            tokio::select! {
                // Naechster Frame des Clients
                frame = framed.next() => {
                    match frame {
                        Some(Ok(nachricht)) => {
                            zuletzt_gehoert = Instant::now();
                            tracing::trace!(
                                peer = %peer_addr,
                                request_id = nachricht.request_id,
                                "Frame empfangen"
                            );

                            if let Some(antwort) = dispatcher.dispatch(nachricht, &mut ctx).await {
                                if let Err(e) = framed.send(antwort).await {
                                    tracing::warn!(
                                        peer = %peer_addr,
                                        fehler = %e,
                                        "Antwort-Senden fehlgeschlagen"
                                    );
                                    break;
                                }
                            }

                            if ctx.beenden {
                                tracing::info!(peer = %peer_addr, "Verbindung wird serverseitig beendet");
                                break;
                            }

                            // Nach erfolgreicher Anmeldung: Session registrieren
                            // und das Postfach mit dieser Verbindung verknuepfen
                            if session.is_none() {
                                if let Some(identitaet) = &ctx.identitaet {
                                    let anmeldung = dispatcher.client_registrieren(identitaet);
                                    session = Some((identitaet.user_id, anmeldung.generation));
                                    trennung_rx = anmeldung.trennung;

                                    let mut empfang = anmeldung.empfang;
                                    let postfach_tx = sende_tx.clone();
                                    tokio::spawn(async move {
                                        while let Some(msg) = empfang.recv().await {
                                            if postfach_tx.send(msg).await.is_err() {
                                                break;
                                            }
                                        }
                                    });
                                }
                            }
                        }
                        Some(Err(e)) => {
                            tracing::warn!(
                                peer = %peer_addr,
                                fehler = %e,
                                "Lesefehler auf dem Stream"
                            );
                            break;
                        }
                        None => {
                            tracing::info!(peer = %peer_addr, "Client hat die Verbindung geschlossen");
                            break;
                        }
                    }
                }

                // Ausgehende Nachricht aus dem Session-Postfach
                Some(ausgehend) = sende_rx.recv() => {
                    if let Err(e) = framed.send(ausgehend).await {
                        tracing::warn!(
                            peer = %peer_addr,
                            fehler = %e,
                            "Event-Senden fehlgeschlagen"
                        );
                        break;
                    }
                }

                // Keepalive-Ping, sobald er faellig ist
                _ = tokio::time::sleep(ping_wartezeit) => {
                    ping_request_id = ping_request_id.wrapping_add(1);
                    let ts = chrono::Utc::now().timestamp_millis() as u64;

                    if let Err(e) = framed.send(ControlMessage::ping(ping_request_id, ts)).await {
                        tracing::warn!(
                            peer = %peer_addr,
                            fehler = %e,
                            "Keepalive-Ping fehlgeschlagen"
                        );
                        break;
                    }
                    ping_faellig = Instant::now() + ping_intervall;
                }

                // Session wurde durch neue Anmeldung verdraengt
                Ok(()) = trennung_rx.changed() => {
                    if *trennung_rx.borrow() {
                        tracing::info!(peer = %peer_addr, "Session verdraengt – Verbindung wird getrennt");
                        let abschied = ControlMessage::error(
                            0,
                            ErrorCode::AuthenticationFailed,
                            "Session wurde durch neue Anmeldung ersetzt",
                        );
                        let _ = framed.send(abschied).await;
                        break;
                    }
                }

                // Shutdown-Signal
                Ok(()) = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        tracing::info!(peer = %peer_addr, "Server faehrt herunter – Verbindung wird geschlossen");
                        let abschied = ControlMessage::error(
                            0,
                            ErrorCode::InternalError,
                            "Server faehrt herunter",
                        );
                        let _ = framed.send(abschied).await;
                        break;
                    }
                }
            }
        }

        // Cleanup beim Verbindungsende; verdraengte Sessions erkennen das
        // an der Generation und lassen den Nachfolger unangetastet
        if let Some((user_id, generation)) = session {
            dispatcher.client_cleanup(&user_id, generation);
        }

        tracing::info!(peer = %peer_addr, "Verbindung abgebaut");
    }
}
