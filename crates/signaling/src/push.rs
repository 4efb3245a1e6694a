//! Push-Sink – Benachrichtigungen fuer nicht verbundene Empfaenger
//!
//! Wer beim Eintreffen einer Nachricht keine aktive Session hat, bekommt
//! eine Push-Benachrichtigung ueber diesen Sink. Der Versand ist best-effort:
//! Fehler werden vom Aufrufer geloggt und verworfen, niemals an den Absender
//! der Nachricht durchgereicht.

use duplex_core::types::{RoomId, UserId};
use duplex_core::DuplexError;

/// Maximale Laenge der Textvorschau in einer Benachrichtigung
const VORSCHAU_MAX_ZEICHEN: usize = 120;

/// Kurzfassung einer Nachricht fuer die Benachrichtigung
#[derive(Debug, Clone)]
pub struct PushZusammenfassung {
    pub room_id: RoomId,
    pub absender: UserId,
    pub vorschau: String,
}

impl PushZusammenfassung {
    /// Baut die Zusammenfassung aus einem Nachrichteninhalt
    ///
    /// Der Inhalt wird auf eine Vorschaulaenge gekuerzt, an Zeichengrenzen.
    pub fn aus_nachricht(room_id: RoomId, absender: UserId, inhalt: &str) -> Self {
        let vorschau: String = inhalt.chars().take(VORSCHAU_MAX_ZEICHEN).collect();
        Self {
            room_id,
            absender,
            vorschau,
        }
    }
}

/// Schnittstelle zum Push-Dienst
///
/// Implementierungen duerfen blockierende Arbeit nur hinter await verrichten;
/// der Aufrufer wartet den Versand ab, behandelt Fehler aber nicht als
/// Fehlschlag der eigentlichen Operation.
#[allow(async_fn_in_trait)]
pub trait PushSink: Send + Sync {
    /// Benachrichtigt einen nicht verbundenen Empfaenger
    async fn notify_offline(
        &self,
        empfaenger: &UserId,
        zusammenfassung: &PushZusammenfassung,
    ) -> Result<(), DuplexError>;
}

/// Push-Sink der Benachrichtigungen nur ins Log schreibt
///
/// Standard-Sink solange kein echter Push-Dienst angebunden ist.
#[derive(Debug, Default, Clone)]
pub struct LogPushSink;

impl PushSink for LogPushSink {
    async fn notify_offline(
        &self,
        empfaenger: &UserId,
        zusammenfassung: &PushZusammenfassung,
    ) -> Result<(), DuplexError> {
        tracing::debug!(
            empfaenger = %empfaenger,
            room_id = %zusammenfassung.room_id,
            absender = %zusammenfassung.absender,
            "Push-Benachrichtigung (Log-Sink)"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vorschau_wird_gekuerzt() {
        let lang = "x".repeat(500);
        let z = PushZusammenfassung::aus_nachricht(RoomId::new(), UserId::new(), &lang);
        assert_eq!(z.vorschau.chars().count(), VORSCHAU_MAX_ZEICHEN);
    }

    #[test]
    fn vorschau_achtet_auf_zeichengrenzen() {
        let umlaute = "ü".repeat(200);
        let z = PushZusammenfassung::aus_nachricht(RoomId::new(), UserId::new(), &umlaute);
        assert_eq!(z.vorschau.chars().count(), VORSCHAU_MAX_ZEICHEN);
        assert!(z.vorschau.chars().all(|c| c == 'ü'));
    }

    #[tokio::test]
    async fn log_sink_meldet_erfolg() {
        let sink = LogPushSink;
        let z = PushZusammenfassung::aus_nachricht(RoomId::new(), UserId::new(), "hi");
        assert!(sink.notify_offline(&UserId::new(), &z).await.is_ok());
    }
}
