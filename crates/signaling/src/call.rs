//! Call-Registry – Zustandsmaschine fuer WebRTC-Anrufsignalisierung
//!
//! Verwaltet pro Benutzer hoechstens einen aktiven Anruf. Ein Anruf belegt
//! die Slots beider Teilnehmer vom Angebot bis zum Teardown; ein zweites
//! Angebot gegen einen belegten Slot wird als besetzt gemeldet statt
//! zugestellt.
//!
//! ## Zustaende
//! ```text
//! Anrufer:     Anrufend  -> Verbindend -> Verbunden
//! Angerufener: Eingehend -> Verbindend -> Verbunden
//! ```
//! Beendet, abgelehnt und fehlgeschlagen sind terminal: die Slots werden
//! entfernt. Rufen sich beide Seiten gleichzeitig an, entscheidet jede
//! Seite fuer sich anhand ihres Slots; es gibt keine verbindungsweite
//! Arbitrierung.

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use duplex_core::types::{CallId, UserId};
use duplex_protocol::control::CallConfig;
use std::sync::Arc;

// ---------------------------------------------------------------------------
// Anruf-Zustand
// ---------------------------------------------------------------------------

/// Phase eines aktiven Anrufs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallPhase {
    /// Angebot gesendet, Antwort steht aus (Anrufer-Sicht)
    Anrufend,
    /// Angebot empfangen, Annahme steht aus (Angerufenen-Sicht)
    Eingehend,
    /// Antwort ausgetauscht, ICE-Verhandlung laeuft
    Verbindend,
    /// Medienfluss bestaetigt
    Verbunden,
}

/// Aktiver Anruf zwischen zwei Benutzern
#[derive(Debug, Clone)]
pub struct CallSession {
    pub call_id: CallId,
    pub anrufer: UserId,
    pub angerufener: UserId,
    pub config: CallConfig,
    pub phase: CallPhase,
    pub gestartet_um: DateTime<Utc>,
}

impl CallSession {
    /// Gibt den jeweils anderen Teilnehmer zurueck
    pub fn partner_von(&self, user_id: &UserId) -> UserId {
        if self.anrufer == *user_id {
            self.angerufener
        } else {
            self.anrufer
        }
    }
}

/// Ergebnis eines Anrufversuchs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnrufStart {
    /// Beide Slots belegt, Angebot kann zugestellt werden
    Bereit,
    /// Der Anrufer haelt bereits einen aktiven Anruf
    InitiatorBesetzt,
    /// Der Angerufene haelt bereits einen aktiven Anruf
    AngerufenerBesetzt,
}

// ---------------------------------------------------------------------------
// CallRegistry
// ---------------------------------------------------------------------------

/// Verwaltet die aktiven Anrufe aller Benutzer
///
/// Alle Slots liegen in einer DashMap hinter Arc; Clone teilt den Zustand.
#[derive(Clone)]
pub struct CallRegistry {
    inner: Arc<CallRegistryInner>,
}

struct CallRegistryInner {
    /// Aktiver Anruf pro Benutzer; beide Teilnehmer halten einen Eintrag
    slots: DashMap<UserId, CallSession>,
}

impl CallRegistry {
    /// Erstellt eine neue CallRegistry
    pub fn neu() -> Self {
        Self {
            inner: Arc::new(CallRegistryInner {
                slots: DashMap::new(),
            }),
        }
    }

    /// Versucht einen Anruf zu starten und belegt beide Slots
    ///
    /// Prueft zuerst den Anrufer, dann den Angerufenen. Ist der Angerufene
    /// besetzt, wird der bereits belegte Anrufer-Slot zurueckgerollt.
    pub fn anruf_starten(
        &self,
        anrufer: UserId,
        angerufener: UserId,
        call_id: CallId,
        config: CallConfig,
    ) -> AnrufStart {
        let gestartet_um = Utc::now();

        match self.inner.slots.entry(anrufer) {
            Entry::Occupied(_) => return AnrufStart::InitiatorBesetzt,
            Entry::Vacant(eintrag) => {
                eintrag.insert(CallSession {
                    call_id,
                    anrufer,
                    angerufener,
                    config,
                    phase: CallPhase::Anrufend,
                    gestartet_um,
                });
            }
        }

        match self.inner.slots.entry(angerufener) {
            Entry::Occupied(_) => {
                self.inner
                    .slots
                    .remove_if(&anrufer, |_, s| s.call_id == call_id);
                AnrufStart::AngerufenerBesetzt
            }
            Entry::Vacant(eintrag) => {
                eintrag.insert(CallSession {
                    call_id,
                    anrufer,
                    angerufener,
                    config,
                    phase: CallPhase::Eingehend,
                    gestartet_um,
                });
                tracing::debug!(
                    call_id = %call_id,
                    anrufer = %anrufer,
                    angerufener = %angerufener,
                    "Anruf gestartet"
                );
                AnrufStart::Bereit
            }
        }
    }

    /// Nimmt einen eingehenden Anruf an
    ///
    /// Gibt `None` zurueck wenn der Anruf nicht mehr existiert oder die
    /// call_id nicht zum Slot des Angerufenen passt (Anrufer hat bereits
    /// aufgelegt). Beide Seiten wechseln nach Verbindend.
    pub fn anruf_annehmen(&self, angerufener: &UserId, call_id: &CallId) -> Option<CallSession> {
        let session = {
            let mut eintrag = self.inner.slots.get_mut(angerufener)?;
            if eintrag.call_id != *call_id || eintrag.phase != CallPhase::Eingehend {
                return None;
            }
            eintrag.phase = CallPhase::Verbindend;
            eintrag.clone()
        };

        if let Some(mut anrufer_eintrag) = self.inner.slots.get_mut(&session.anrufer) {
            if anrufer_eintrag.call_id == *call_id {
                anrufer_eintrag.phase = CallPhase::Verbindend;
            }
        }

        tracing::debug!(call_id = %call_id, "Anruf angenommen");
        Some(session)
    }

    /// Lehnt einen eingehenden Anruf ab und raeumt beide Slots
    pub fn anruf_ablehnen(&self, angerufener: &UserId, call_id: &CallId) -> Option<CallSession> {
        let (_, session) = self.inner.slots.remove_if(angerufener, |_, s| {
            s.call_id == *call_id && s.phase == CallPhase::Eingehend
        })?;
        self.inner
            .slots
            .remove_if(&session.anrufer, |_, s| s.call_id == *call_id);

        tracing::debug!(call_id = %call_id, "Anruf abgelehnt");
        Some(session)
    }

    /// Beendet einen Anruf aus beliebiger Phase heraus
    ///
    /// Der Akteur kann Anrufer oder Angerufener sein. Beide Slots werden
    /// freigegeben, damit ein abgebrochener Anruf keine kuenftigen blockiert.
    pub fn anruf_beenden(&self, akteur: &UserId, call_id: &CallId) -> Option<CallSession> {
        let (_, session) = self
            .inner
            .slots
            .remove_if(akteur, |_, s| s.call_id == *call_id)?;
        let partner = session.partner_von(akteur);
        self.inner
            .slots
            .remove_if(&partner, |_, s| s.call_id == *call_id);

        tracing::debug!(call_id = %call_id, "Anruf beendet");
        Some(session)
    }

    /// Bestimmt das Ziel fuer einen ICE-Kandidaten
    ///
    /// Gibt `None` zurueck wenn der Absender keinen Anruf mit dieser
    /// call_id haelt; verspaetete Kandidaten werden so stillschweigend
    /// verworfen.
    pub fn kandidat_ziel(&self, absender: &UserId, call_id: &CallId) -> Option<UserId> {
        let eintrag = self.inner.slots.get(absender)?;
        if eintrag.call_id != *call_id {
            return None;
        }
        Some(eintrag.partner_von(absender))
    }

    /// Markiert einen Anruf als verbunden (Medienfluss bestaetigt)
    ///
    /// Das Signal kommt von der Medienschicht, nicht aus dem Protokoll.
    /// Gibt `false` zurueck wenn der Anruf nicht in Verbindend ist.
    pub fn verbunden_markieren(&self, akteur: &UserId, call_id: &CallId) -> bool {
        let partner = {
            let mut eintrag = match self.inner.slots.get_mut(akteur) {
                Some(e) => e,
                None => return false,
            };
            if eintrag.call_id != *call_id || eintrag.phase != CallPhase::Verbindend {
                return false;
            }
            eintrag.phase = CallPhase::Verbunden;
            eintrag.partner_von(akteur)
        };

        if let Some(mut eintrag) = self.inner.slots.get_mut(&partner) {
            if eintrag.call_id == *call_id {
                eintrag.phase = CallPhase::Verbunden;
            }
        }
        true
    }

    /// Raeumt den Anruf eines getrennten Benutzers ab
    ///
    /// Gibt die abgeraeumte Session zurueck, damit der Aufrufer den
    /// verbliebenen Teilnehmer benachrichtigen kann.
    pub fn teilnehmer_trennen(&self, user_id: &UserId) -> Option<CallSession> {
        let (_, session) = self.inner.slots.remove(user_id)?;
        let partner = session.partner_von(user_id);
        self.inner
            .slots
            .remove_if(&partner, |_, s| s.call_id == session.call_id);

        tracing::debug!(
            call_id = %session.call_id,
            user_id = %user_id,
            "Anruf durch Trennen abgeraeumt"
        );
        Some(session)
    }

    /// Gibt den aktiven Anruf eines Benutzers zurueck
    pub fn aktiver_anruf(&self, user_id: &UserId) -> Option<CallSession> {
        self.inner.slots.get(user_id).map(|e| e.clone())
    }
}

impl Default for CallRegistry {
    fn default() -> Self {
        Self::neu()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn audio_config() -> CallConfig {
        CallConfig {
            audio: true,
            video: false,
        }
    }

    #[test]
    fn anruf_lebenszyklus() {
        let registry = CallRegistry::neu();
        let a = UserId::new();
        let b = UserId::new();
        let call = CallId::new();

        let start = registry.anruf_starten(a, b, call, audio_config());
        assert_eq!(start, AnrufStart::Bereit);
        assert_eq!(registry.aktiver_anruf(&a).map(|s| s.phase), Some(CallPhase::Anrufend));
        assert_eq!(registry.aktiver_anruf(&b).map(|s| s.phase), Some(CallPhase::Eingehend));

        let session = registry.anruf_annehmen(&b, &call).expect("Annahme muss gelingen");
        assert_eq!(session.anrufer, a);
        assert_eq!(registry.aktiver_anruf(&a).map(|s| s.phase), Some(CallPhase::Verbindend));
        assert_eq!(registry.aktiver_anruf(&b).map(|s| s.phase), Some(CallPhase::Verbindend));

        assert!(registry.verbunden_markieren(&a, &call));
        assert_eq!(registry.aktiver_anruf(&b).map(|s| s.phase), Some(CallPhase::Verbunden));

        let beendet = registry.anruf_beenden(&a, &call).expect("Beenden muss gelingen");
        assert_eq!(beendet.call_id, call);
        assert!(registry.aktiver_anruf(&a).is_none());
        assert!(registry.aktiver_anruf(&b).is_none());
    }

    #[test]
    fn initiator_mit_aktivem_anruf_ist_besetzt() {
        let registry = CallRegistry::neu();
        let a = UserId::new();
        let b = UserId::new();
        let c = UserId::new();

        assert_eq!(
            registry.anruf_starten(a, b, CallId::new(), audio_config()),
            AnrufStart::Bereit
        );

        // Zweites Angebot scheitert an As eigenem Slot, bevor C etwas sieht
        assert_eq!(
            registry.anruf_starten(a, c, CallId::new(), audio_config()),
            AnrufStart::InitiatorBesetzt
        );
        assert!(registry.aktiver_anruf(&c).is_none());
    }

    #[test]
    fn besetzter_angerufener_bekommt_kein_angebot() {
        let registry = CallRegistry::neu();
        let a = UserId::new();
        let b = UserId::new();
        let c = UserId::new();

        assert_eq!(
            registry.anruf_starten(a, b, CallId::new(), audio_config()),
            AnrufStart::Bereit
        );

        // B ist besetzt; Cs Slot muss zurueckgerollt werden
        assert_eq!(
            registry.anruf_starten(c, b, CallId::new(), audio_config()),
            AnrufStart::AngerufenerBesetzt
        );
        assert!(registry.aktiver_anruf(&c).is_none(), "Rollback muss Cs Slot freigeben");
        assert_eq!(
            registry.aktiver_anruf(&b).map(|s| s.anrufer),
            Some(a),
            "Bs bestehender Anruf bleibt unveraendert"
        );
    }

    #[test]
    fn gegenseitige_anrufe_loesen_sich_pro_seite_auf() {
        let registry = CallRegistry::neu();
        let a = UserId::new();
        let b = UserId::new();

        assert_eq!(
            registry.anruf_starten(a, b, CallId::new(), audio_config()),
            AnrufStart::Bereit
        );
        // Bs Gegenanruf scheitert an Bs eigenem (eingehendem) Slot
        assert_eq!(
            registry.anruf_starten(b, a, CallId::new(), audio_config()),
            AnrufStart::InitiatorBesetzt
        );
    }

    #[test]
    fn annehmen_mit_falscher_call_id_scheitert() {
        let registry = CallRegistry::neu();
        let a = UserId::new();
        let b = UserId::new();

        registry.anruf_starten(a, b, CallId::new(), audio_config());
        assert!(registry.anruf_annehmen(&b, &CallId::new()).is_none());
    }

    #[test]
    fn annehmen_nach_auflegen_scheitert() {
        let registry = CallRegistry::neu();
        let a = UserId::new();
        let b = UserId::new();
        let call = CallId::new();

        registry.anruf_starten(a, b, call, audio_config());
        registry.anruf_beenden(&a, &call);

        assert!(registry.anruf_annehmen(&b, &call).is_none());
    }

    #[test]
    fn ablehnen_raeumt_beide_slots() {
        let registry = CallRegistry::neu();
        let a = UserId::new();
        let b = UserId::new();
        let call = CallId::new();

        registry.anruf_starten(a, b, call, audio_config());
        let session = registry.anruf_ablehnen(&b, &call).expect("Ablehnen muss gelingen");

        assert_eq!(session.anrufer, a);
        assert!(registry.aktiver_anruf(&a).is_none());
        assert!(registry.aktiver_anruf(&b).is_none());
    }

    #[test]
    fn nur_der_angerufene_kann_ablehnen() {
        let registry = CallRegistry::neu();
        let a = UserId::new();
        let b = UserId::new();
        let call = CallId::new();

        registry.anruf_starten(a, b, call, audio_config());
        assert!(registry.anruf_ablehnen(&a, &call).is_none(), "Anrufer-Slot ist nicht Eingehend");
        assert!(registry.aktiver_anruf(&b).is_some());
    }

    #[test]
    fn kandidat_ziel_nach_ende_ist_none() {
        let registry = CallRegistry::neu();
        let a = UserId::new();
        let b = UserId::new();
        let call = CallId::new();

        registry.anruf_starten(a, b, call, audio_config());
        assert_eq!(registry.kandidat_ziel(&a, &call), Some(b));
        assert_eq!(registry.kandidat_ziel(&b, &call), Some(a));

        registry.anruf_beenden(&b, &call);
        assert!(registry.kandidat_ziel(&a, &call).is_none(), "verspaetete Kandidaten laufen ins Leere");
    }

    #[test]
    fn trennen_raeumt_beide_slots() {
        let registry = CallRegistry::neu();
        let a = UserId::new();
        let b = UserId::new();
        let call = CallId::new();

        registry.anruf_starten(a, b, call, audio_config());
        let session = registry.teilnehmer_trennen(&a).expect("aktiver Anruf vorhanden");

        assert_eq!(session.partner_von(&a), b);
        assert!(registry.aktiver_anruf(&b).is_none(), "Partner-Slot muss frei werden");
        assert!(registry.teilnehmer_trennen(&a).is_none(), "zweiter Lauf ist No-Op");
    }
}
