//! Konfiguration des Duplex-Servers
//!
//! Eine TOML-Datei mit den Abschnitten `[server]`, `[netzwerk]`,
//! `[logging]` und `[auth]`. Jeder Abschnitt traegt Standardwerte;
//! eine fehlende Datei ist deshalb kein Startfehler.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;
use uuid::Uuid;

const STANDARD_TCP_PORT: u16 = 9470;
const STANDARD_MAX_CLIENTS: u32 = 512;
const STANDARD_KEEPALIVE_SEK: u64 = 30;
const STANDARD_TIMEOUT_SEK: u64 = 90;

/// Saemtliche Einstellungen des Serverprozesses
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub server: ServerEinstellungen,
    pub netzwerk: NetzwerkEinstellungen,
    pub logging: LoggingEinstellungen,
    /// Statische Token-Eintraege fuer die Anmeldung
    pub auth: AuthEinstellungen,
}

/// Abschnitt `[server]`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerEinstellungen {
    /// Name, mit dem sich der Server meldet
    pub name: String,
    /// Obergrenze gleichzeitig verbundener Clients
    pub max_clients: u32,
}

impl Default for ServerEinstellungen {
    fn default() -> Self {
        Self {
            name: "Duplex Server".into(),
            max_clients: STANDARD_MAX_CLIENTS,
        }
    }
}

/// Abschnitt `[netzwerk]`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetzwerkEinstellungen {
    /// Adresse, auf der der TCP-Listener gebunden wird
    pub bind_adresse: String,
    /// Port des Control-Protokolls
    pub tcp_port: u16,
    /// Abstand zwischen zwei Keepalive-Pings in Sekunden
    pub keepalive_sek: u64,
    /// Sekunden ohne jedes Lebenszeichen, nach denen getrennt wird
    pub verbindungs_timeout_sek: u64,
}

impl Default for NetzwerkEinstellungen {
    fn default() -> Self {
        Self {
            bind_adresse: "0.0.0.0".into(),
            tcp_port: STANDARD_TCP_PORT,
            keepalive_sek: STANDARD_KEEPALIVE_SEK,
            verbindungs_timeout_sek: STANDARD_TIMEOUT_SEK,
        }
    }
}

/// Abschnitt `[logging]`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    /// Eines von "trace", "debug", "info", "warn", "error"
    pub level: String,
    /// "text" fuer lesbare Ausgabe, "json" fuer maschinenlesbare
    pub format: String,
}

impl Default for LoggingEinstellungen {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

/// Abschnitt `[auth]`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthEinstellungen {
    /// Beim Start in die Token-Registry uebernommene Bearer-Tokens
    pub tokens: Vec<TokenEintrag>,
}

/// Ein statischer Token mit zugehoeriger Identitaet
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenEintrag {
    pub token: String,
    pub user_id: Uuid,
    pub email: String,
}

impl ServerConfig {
    /// Laedt die Konfiguration von `pfad`
    ///
    /// Existiert die Datei nicht, laeuft der Server mit Standardwerten
    /// weiter; nur eine vorhandene, aber kaputte Datei ist ein Fehler.
    pub fn laden(pfad: impl AsRef<Path>) -> anyhow::Result<Self> {
        let pfad = pfad.as_ref();
        match std::fs::read_to_string(pfad) {
            Ok(inhalt) => toml::from_str(&inhalt)
                .with_context(|| format!("Konfiguration '{}' ist kein gueltiges TOML", pfad.display())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    pfad = %pfad.display(),
                    "Keine Konfigurationsdatei gefunden, starte mit Standardwerten"
                );
                Ok(Self::default())
            }
            Err(e) => {
                Err(e).with_context(|| format!("Konfiguration '{}' nicht lesbar", pfad.display()))
            }
        }
    }

    /// Bind-Adresse samt Port fuer den TCP-Listener
    pub fn tcp_bind_adresse(&self) -> String {
        format!("{}:{}", self.netzwerk.bind_adresse, self.netzwerk.tcp_port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_ergeben_brauchbare_config() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.server.max_clients, 512);
        assert_eq!(cfg.netzwerk.tcp_port, 9470);
        assert_eq!(cfg.netzwerk.keepalive_sek, 30);
        assert_eq!(cfg.logging.level, "info");
        assert!(cfg.auth.tokens.is_empty());
    }

    #[test]
    fn bind_adresse() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.tcp_bind_adresse(), "0.0.0.0:9470");
    }

    #[test]
    fn toml_text_wird_geparst() {
        let toml = r#"
            [server]
            name = "Mein Duplex"
            max_clients = 64

            [netzwerk]
            tcp_port = 9999
        "#;
        let cfg: ServerConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.server.name, "Mein Duplex");
        assert_eq!(cfg.server.max_clients, 64);
        assert_eq!(cfg.netzwerk.tcp_port, 9999);
        // Alles Ungenannte faellt auf die Defaults zurueck
        assert_eq!(cfg.netzwerk.keepalive_sek, 30);
        assert_eq!(cfg.netzwerk.bind_adresse, "0.0.0.0");
    }

    #[test]
    fn tokens_aus_toml() {
        let toml = r#"
            [[auth.tokens]]
            token = "dx_alice"
            user_id = "6c5e28f4-0f57-4a30-9d2e-6f9c3df0a111"
            email = "alice@example.com"

            [[auth.tokens]]
            token = "dx_bob"
            user_id = "0e9b1c7a-2d48-4c3f-8b5a-1f2e3d4c5b6a"
            email = "bob@example.com"
        "#;
        let cfg: ServerConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.auth.tokens.len(), 2);
        assert_eq!(cfg.auth.tokens[0].token, "dx_alice");
        assert_eq!(cfg.auth.tokens[1].email, "bob@example.com");
    }

    #[test]
    fn fehlende_datei_liefert_standard() {
        let cfg = ServerConfig::laden("/gibt/es/nicht/config.toml").unwrap();
        assert_eq!(cfg.server.name, "Duplex Server");
    }

    #[test]
    fn datei_wird_geladen() {
        let dir = tempfile::tempdir().unwrap();
        let pfad = dir.path().join("config.toml");
        std::fs::write(
            &pfad,
            r#"
                [server]
                name = "Aus Datei"

                [logging]
                level = "debug"
                format = "json"
            "#,
        )
        .unwrap();

        let cfg = ServerConfig::laden(&pfad).unwrap();
        assert_eq!(cfg.server.name, "Aus Datei");
        assert_eq!(cfg.logging.level, "debug");
        assert_eq!(cfg.logging.format, "json");
    }

    #[test]
    fn kaputtes_toml_ist_ein_fehler() {
        let dir = tempfile::tempdir().unwrap();
        let pfad = dir.path().join("config.toml");
        std::fs::write(&pfad, "[server\nname = ").unwrap();

        assert!(ServerConfig::laden(&pfad).is_err());
    }
}
