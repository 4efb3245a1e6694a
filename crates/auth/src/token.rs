//! Token-Verifikation fuer Duplex
//!
//! Clients authentifizieren sich mit einem Bearer-Token als erstem Frame
//! der Verbindung. Die Verifikation ist hinter dem `TokenVerifier`-Trait
//! austauschbar; `TokenRegistry` ist die eingebaute In-Memory-Variante
//! die beim Start aus der Konfiguration befuellt wird.

use std::{collections::HashMap, sync::Arc};

use duplex_core::types::UserId;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::{AuthError, AuthResult};

/// Verifizierte Identitaet eines Benutzers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identitaet {
    pub user_id: UserId,
    pub email: String,
}

/// Verifiziert Bearer-Tokens zu Identitaeten
///
/// Der Server injiziert eine Implementierung beim Start. Eine fehlgeschlagene
/// Verifikation ist kein Serverfehler, sondern fuehrt beim Aufrufer zum
/// Verbindungsabbau.
#[allow(async_fn_in_trait)]
pub trait TokenVerifier: Send + Sync {
    /// Prueft einen Token und gibt die zugehoerige Identitaet zurueck
    async fn verify(&self, token: &str) -> AuthResult<Identitaet>;
}

/// In-Memory Token-Registry
///
/// Haelt Token -> Identitaet-Zuordnungen. Tokens werden beim Start aus der
/// Konfiguration hinterlegt oder zur Laufzeit ausgestellt.
#[derive(Debug, Default)]
pub struct TokenRegistry {
    /// token -> Identitaet
    tokens: RwLock<HashMap<String, Identitaet>>,
}

impl TokenRegistry {
    /// Leere Registry; Tokens kommen per `hinterlegen` dazu
    pub fn neu() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Hinterlegt einen vorgegebenen Token (z.B. aus der Konfiguration)
    pub async fn hinterlegen(&self, token: impl Into<String>, identitaet: Identitaet) {
        let mut tokens = self.tokens.write().await;
        tokens.insert(token.into(), identitaet);
    }

    /// Stellt einen neuen zufaelligen Token fuer eine Identitaet aus
    pub async fn ausstellen(&self, identitaet: Identitaet) -> String {
        let token = token_generieren();
        let user_id = identitaet.user_id;
        self.tokens.write().await.insert(token.clone(), identitaet);
        tracing::debug!(user_id = %user_id, "Neuer Token ausgestellt");
        token
    }

    /// Anzahl hinterlegter Tokens
    pub async fn anzahl(&self) -> usize {
        self.tokens.read().await.len()
    }
}

impl TokenVerifier for TokenRegistry {
    async fn verify(&self, token: &str) -> AuthResult<Identitaet> {
        let tokens = self.tokens.read().await;
        match tokens.get(token) {
            Some(identitaet) => Ok(identitaet.clone()),
            None => Err(AuthError::TokenUngueltig),
        }
    }
}

/// Generiert einen kryptografisch sicheren Token
///
/// Format: "dx_" + 43 Zeichen URL-sicheres Base64 (256 Bit Entropie)
fn token_generieren() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    let encoded = base64::Engine::encode(&base64::engine::general_purpose::URL_SAFE_NO_PAD, bytes);
    format!("dx_{}", encoded)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_identitaet() -> Identitaet {
        Identitaet {
            user_id: UserId::new(),
            email: "alice@example.com".into(),
        }
    }

    #[tokio::test]
    async fn hinterlegter_token_verifizierbar() {
        let registry = TokenRegistry::neu();
        let identitaet = test_identitaet();
        registry.hinterlegen("tok_alice", identitaet.clone()).await;

        let verifiziert = registry.verify("tok_alice").await.unwrap();
        assert_eq!(verifiziert, identitaet);
    }

    #[tokio::test]
    async fn unbekannter_token_abgelehnt() {
        let registry = TokenRegistry::neu();
        let ergebnis = registry.verify("gibt_es_nicht").await;
        assert!(matches!(ergebnis, Err(AuthError::TokenUngueltig)));
    }

    #[tokio::test]
    async fn ausgestellter_token_verifizierbar() {
        let registry = TokenRegistry::neu();
        let identitaet = test_identitaet();

        let token = registry.ausstellen(identitaet.clone()).await;
        assert!(token.starts_with("dx_"));

        let verifiziert = registry.verify(&token).await.unwrap();
        assert_eq!(verifiziert.user_id, identitaet.user_id);
    }

    #[tokio::test]
    async fn zwei_ausgestellte_tokens_unterscheiden_sich() {
        let registry = TokenRegistry::neu();
        let t1 = registry.ausstellen(test_identitaet()).await;
        let t2 = registry.ausstellen(test_identitaet()).await;
        assert_ne!(t1, t2, "Tokens muessen eindeutig sein");
        assert_eq!(registry.anzahl().await, 2);
    }
}
