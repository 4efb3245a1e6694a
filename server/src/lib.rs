//! duplex-server – Bibliotheks-Root
//!
//! Verdrahtet Store, Token-Registry, Push-Sink und Signaling-Server zu
//! einem lauffaehigen Prozess und stellt den Einstiegspunkt fuer
//! Integrationstests bereit.

pub mod config;

use anyhow::Result;
use config::ServerConfig;
use duplex_auth::{Identitaet, TokenRegistry};
use duplex_core::types::UserId;
use duplex_signaling::{LogPushSink, SignalingConfig, SignalingServer, SignalingState};
use duplex_store::MemoryStore;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;

/// Der zusammengebaute Serverprozess
pub struct Server {
    pub config: ServerConfig,
}

impl Server {
    /// Server aus einer geladenen Konfiguration
    pub fn neu(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Faehrt alle Subsysteme hoch und blockiert bis zum Shutdown
    ///
    /// Der Aufbau laeuft in dieser Abfolge:
    /// 1. Store und Token-Registry aufbauen (Tokens aus der Konfiguration)
    /// 2. Signaling-Zustand verdrahten
    /// 3. TCP-Listener starten (Control-Protokoll)
    /// 4. Auf Ctrl-C warten und den Shutdown an alle Verbindungen verteilen
    pub async fn starten(self) -> Result<()> {
        tracing::info!(
            server_name = %self.config.server.name,
            tcp = %self.config.tcp_bind_adresse(),
            max_clients = self.config.server.max_clients,
            "Server faehrt hoch"
        );

        // Collaborators: In-Memory-Store und statische Token-Registry
        let store = Arc::new(MemoryStore::new());
        let verifier = TokenRegistry::neu();
        for eintrag in &self.config.auth.tokens {
            verifier
                .hinterlegen(
                    eintrag.token.clone(),
                    Identitaet {
                        user_id: UserId(eintrag.user_id),
                        email: eintrag.email.clone(),
                    },
                )
                .await;
        }
        tracing::info!(
            tokens = self.config.auth.tokens.len(),
            "Token-Registry befuellt"
        );

        // Ohne persistente Provisionierung bekommt jedes Paar konfigurierter
        // Benutzer eine Konversation; die room_id steht im Log
        let mut benutzer: Vec<_> = self
            .config
            .auth
            .tokens
            .iter()
            .map(|t| t.user_id)
            .collect();
        benutzer.sort();
        benutzer.dedup();
        for (i, erster) in benutzer.iter().enumerate() {
            for zweiter in &benutzer[i + 1..] {
                let room_id = store.konversation_anlegen(vec![*erster, *zweiter]);
                tracing::info!(
                    room_id = %room_id,
                    teilnehmer = %format!("{erster}, {zweiter}"),
                    "Konversation angelegt"
                );
            }
        }

        let push = Arc::new(LogPushSink::default());

        let signaling_config = SignalingConfig {
            server_name: self.config.server.name.clone(),
            max_clients: self.config.server.max_clients,
            keepalive_sek: self.config.netzwerk.keepalive_sek,
            verbindungs_timeout_sek: self.config.netzwerk.verbindungs_timeout_sek,
        };
        let state = SignalingState::neu(signaling_config, store, verifier, push);

        // Praesenz-Wechsel im Log sichtbar machen
        let mut presence_events = state.presence.events_abonnieren();
        tokio::spawn(async move {
            while let Ok(event) = presence_events.recv().await {
                tracing::debug!(
                    user_id = %event.user_id,
                    status = %event.status,
                    "Praesenz-Wechsel"
                );
            }
        });

        let bind_addr: SocketAddr = self.config.tcp_bind_adresse().parse()?;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        // Ctrl-C loest den geordneten Shutdown aus
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Ctrl-C empfangen – Shutdown beginnt");
                let _ = shutdown_tx.send(true);
            }
        });

        let server = SignalingServer::neu(Arc::clone(&state), bind_addr);
        server.starten(shutdown_rx).await?;

        tracing::info!(
            uptime_sek = state.uptime_sek(),
            sessions = state.sessions.session_anzahl(),
            "Server beendet"
        );
        Ok(())
    }
}
