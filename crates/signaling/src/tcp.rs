//! TCP-Annahmeschleife des Signaling-Dienstes
//!
//! Bindet den konfigurierten Socket und startet pro eingehender
//! Verbindung eine `ClientConnection` als eigenen Task.
//!
//! ## Nebenlaeufigkeit
//! Die Collaborator-Traits (ConversationStore, TokenVerifier, PushSink)
//! nutzen async fn im Trait und geben damit keine Send-Garantie.
//! Saemtliche Verbindungs-Tasks laufen deshalb ueber `spawn_local` in
//! einer `tokio::task::LocalSet` auf einem single-threaded Executor;
//! fuer einen einzelnen Serverprozess reicht das aus.

use duplex_auth::TokenVerifier;
use duplex_store::ConversationStore;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::LocalSet;

use crate::connection::ClientConnection;
use crate::push::PushSink;
use crate::server_state::SignalingState;

/// Pause nach einem fehlgeschlagenen accept(), bevor es weitergeht
const ACCEPT_FEHLER_PAUSE: Duration = Duration::from_millis(10);

/// Lauschender Endpunkt des Signaling-Dienstes
///
/// Nimmt Verbindungen an, solange das Client-Limit nicht erreicht ist,
/// und beendet sich auf das Shutdown-Signal hin.
pub struct SignalingServer<S, V, P>
where
    S: ConversationStore + 'static,
    V: TokenVerifier + 'static,
    P: PushSink + 'static,
{
    state: Arc<SignalingState<S, V, P>>,
    bind_addr: SocketAddr,
}

impl<S, V, P> SignalingServer<S, V, P>
where
    S: ConversationStore + 'static,
    V: TokenVerifier + 'static,
    P: PushSink + 'static,
{
    /// Server fuer die gegebene Adresse; gebunden wird erst in `starten`
    pub fn neu(state: Arc<SignalingState<S, V, P>>, bind_addr: SocketAddr) -> Self {
        Self { state, bind_addr }
    }

    /// Bindet den Socket und nimmt Verbindungen an, bis `shutdown_rx`
    /// ein `true` liefert
    ///
    /// Alle Verbindungs-Tasks leben in der hier aufgespannten `LocalSet`.
    pub async fn starten(self, shutdown_rx: watch::Receiver<bool>) -> std::io::Result<()> {
        let local = LocalSet::new();
        local.run_until(self.annahme_schleife(shutdown_rx)).await
    }

    async fn annahme_schleife(
        self,
        mut shutdown_rx: watch::Receiver<bool>,
    ) -> std::io::Result<()> {
        let listener = TcpListener::bind(self.bind_addr).await?;
        tracing::info!(
            adresse = %listener.local_addr()?,
            limit = self.state.config.max_clients,
            "Signaling-Server lauscht"
        );

        loop {
            tokio::select! {
                eingehend = listener.accept() => match eingehend {
                    Ok((stream, peer_addr)) => {
                        self.verbindung_annehmen(stream, peer_addr, &shutdown_rx);
                    }
                    Err(e) => {
                        tracing::error!(fehler = %e, "accept() fehlgeschlagen");
                        tokio::time::sleep(ACCEPT_FEHLER_PAUSE).await;
                    }
                },
                Ok(()) = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        tracing::info!("Shutdown-Signal empfangen – Annahmeschleife endet");
                        break;
                    }
                }
            }
        }

        tracing::info!("Signaling-Server beendet");
        Ok(())
    }

    /// Prueft das Client-Limit und startet die Verbindung als lokalen Task
    fn verbindung_annehmen(
        &self,
        stream: TcpStream,
        peer_addr: SocketAddr,
        shutdown_rx: &watch::Receiver<bool>,
    ) {
        // Limit greift, bevor die Verbindung einen Task bekommt;
        // Drop schliesst den Stream
        let aktiv = self.state.sessions.session_anzahl() as u32;
        if aktiv >= self.state.config.max_clients {
            tracing::warn!(
                peer = %peer_addr,
                aktiv,
                max = self.state.config.max_clients,
                "Verbindung abgelehnt: Client-Limit erreicht"
            );
            return;
        }

        tracing::debug!(peer = %peer_addr, "Neue Verbindung angenommen");
        let verbindung = ClientConnection::neu(Arc::clone(&self.state), peer_addr);
        let shutdown_rx = shutdown_rx.clone();
        tokio::task::spawn_local(async move {
            verbindung.verarbeiten(stream, shutdown_rx).await;
        });
    }

    /// Adresse, auf der der Server lauschen wird
    pub fn bind_addr(&self) -> SocketAddr {
        self.bind_addr
    }
}
