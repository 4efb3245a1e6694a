//! Session-Registry – verwaltet verbundene Clients und ihre Send-Queues
//!
//! Die SessionRegistry haelt pro Benutzer genau eine aktive Session.
//! Meldet sich ein Benutzer erneut an, wird die alte Session verdraengt:
//! ihr Trenn-Signal feuert und die Verbindung schliesst sich.
//!
//! Zustellung laeuft ueber die `an_*_senden`-Familie: punkt-zu-punkt
//! (`an_user_senden`), raum-weit mit und ohne Absender
//! (`an_raum_senden`, `an_raum_ausser_senden`) sowie an alle Sessions
//! (`an_alle_senden`, `an_alle_ausser_senden`).

use dashmap::DashMap;
use duplex_auth::Identitaet;
use duplex_core::types::{RoomId, UserId};
use duplex_protocol::control::ControlMessage;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

// ---------------------------------------------------------------------------
// Konstanten
// ---------------------------------------------------------------------------

/// Kapazitaet des Session-Postfachs
const POSTFACH_GROESSE: usize = 64;

// ---------------------------------------------------------------------------
// SessionEintrag
// ---------------------------------------------------------------------------

/// Registrierte Session eines verbundenen Benutzers
#[derive(Clone, Debug)]
struct SessionEintrag {
    email: String,
    tx: mpsc::Sender<ControlMessage>,
    trennen_tx: watch::Sender<bool>,
    /// Monoton steigende Kennung; unterscheidet verdraengte von aktiven Sessions
    generation: u64,
}

impl SessionEintrag {
    /// Legt eine Nachricht nicht-blockierend ins Postfach
    ///
    /// `false` heisst verworfen: Postfach voll (langsamer Client) oder
    /// bereits geschlossen.
    fn senden(&self, user_id: &UserId, nachricht: ControlMessage) -> bool {
        match self.tx.try_send(nachricht) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(user_id = %user_id, "Postfach voll – Nachricht verworfen");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!(user_id = %user_id, "Postfach bereits geschlossen");
                false
            }
        }
    }
}

/// Handles, die eine frisch registrierte Verbindung erhaelt
pub struct SessionAnmeldung {
    /// Queue mit ausgehenden Nachrichten fuer diesen Client
    pub empfang: mpsc::Receiver<ControlMessage>,
    /// Feuert `true` wenn die Session von einem neuen Login verdraengt wurde
    pub trennung: watch::Receiver<bool>,
    /// Generation dieser Session (fuer das spaetere Aufraeumen)
    pub generation: u64,
}

// ---------------------------------------------------------------------------
// SessionRegistry
// ---------------------------------------------------------------------------

/// Zentrale Registry fuer alle verbundenen Clients
///
/// Clone ist billig und zeigt auf denselben Zustand; die Maps dahinter
/// sind DashMaps und brauchen kein aeusseres Lock.
#[derive(Clone)]
pub struct SessionRegistry {
    inner: Arc<SessionRegistryInner>,
}

struct SessionRegistryInner {
    /// Aktive Sessions, indiziert nach UserId
    sessions: DashMap<UserId, SessionEintrag>,
    /// Raum-Abonnements: room_id -> Vec<UserId>
    raum_mitglieder: DashMap<RoomId, Vec<UserId>>,
    /// Zaehler fuer Session-Generationen
    generation_zaehler: AtomicU64,
}

impl SessionRegistry {
    /// Erstellt eine neue SessionRegistry
    pub fn neu() -> Self {
        Self {
            inner: Arc::new(SessionRegistryInner {
                sessions: DashMap::new(),
                raum_mitglieder: DashMap::new(),
                generation_zaehler: AtomicU64::new(1),
            }),
        }
    }

    /// Registriert eine Session und verdraengt eine eventuell bestehende
    ///
    /// Die alte Session (falls vorhanden) bekommt ihr Trenn-Signal; ihre
    /// Verbindung schliesst sich beim naechsten Select-Durchlauf und raeumt
    /// dank Generations-Pruefung nicht den Nachfolger ab.
    pub fn registrieren(&self, identitaet: &Identitaet) -> SessionAnmeldung {
        let (tx, rx) = mpsc::channel(POSTFACH_GROESSE);
        let (trennen_tx, trennen_rx) = watch::channel(false);
        let generation = self.inner.generation_zaehler.fetch_add(1, Ordering::Relaxed);

        let eintrag = SessionEintrag {
            email: identitaet.email.clone(),
            tx,
            trennen_tx,
            generation,
        };

        if let Some(alt) = self.inner.sessions.insert(identitaet.user_id, eintrag) {
            tracing::warn!(
                user_id = %identitaet.user_id,
                alte_generation = alt.generation,
                neue_generation = generation,
                "Bestehende Session verdraengt"
            );
            let _ = alt.trennen_tx.send(true);
        } else {
            tracing::debug!(user_id = %identitaet.user_id, "Session registriert");
        }

        SessionAnmeldung {
            empfang: rx,
            trennung: trennen_rx,
            generation,
        }
    }

    /// Entfernt eine Session, aber nur wenn die Generation noch stimmt
    ///
    /// Eine verdraengte Verbindung darf beim Aufraeumen nicht die Session
    /// ihres Nachfolgers loeschen. Gibt `true` zurueck wenn entfernt wurde.
    pub fn entfernen(&self, user_id: &UserId, generation: u64) -> bool {
        let entfernt = self
            .inner
            .sessions
            .remove_if(user_id, |_, eintrag| eintrag.generation == generation)
            .is_some();

        if entfernt {
            // Raum-Abonnements nur fuer die echte letzte Session aufloesen
            self.inner.raum_mitglieder.iter_mut().for_each(|mut entry| {
                entry.value_mut().retain(|uid| uid != user_id);
            });
            self.inner
                .raum_mitglieder
                .retain(|_, mitglieder| !mitglieder.is_empty());
            tracing::debug!(user_id = %user_id, "Session entfernt");
        }
        entfernt
    }

    /// Prueft ob ein Benutzer eine aktive Session hat
    pub fn ist_registriert(&self, user_id: &UserId) -> bool {
        self.inner.sessions.contains_key(user_id)
    }

    /// Prueft ob die angegebene Generation noch die aktive Session ist
    pub fn generation_aktuell(&self, user_id: &UserId, generation: u64) -> bool {
        self.inner
            .sessions
            .get(user_id)
            .map(|eintrag| eintrag.generation == generation)
            .unwrap_or(false)
    }

    /// Gibt die E-Mail-Adresse eines verbundenen Benutzers zurueck
    pub fn email_von(&self, user_id: &UserId) -> Option<String> {
        self.inner
            .sessions
            .get(user_id)
            .map(|eintrag| eintrag.email.clone())
    }

    /// Abonniert einen Raum (fuer selektives Broadcasting)
    ///
    /// Ein Benutzer kann mehrere Raeume gleichzeitig abonniert haben.
    pub fn raum_beitreten(&self, user_id: UserId, room_id: RoomId) {
        let mut mitglieder = self.inner.raum_mitglieder.entry(room_id).or_default();
        if !mitglieder.contains(&user_id) {
            mitglieder.push(user_id);
        }
    }

    /// Beendet das Abonnement eines Raums
    pub fn raum_verlassen(&self, user_id: &UserId, room_id: &RoomId) {
        if let Some(mut mitglieder) = self.inner.raum_mitglieder.get_mut(room_id) {
            mitglieder.retain(|uid| uid != user_id);
        }
        self.inner
            .raum_mitglieder
            .retain(|_, mitglieder| !mitglieder.is_empty());
    }

    /// Beendet alle Raum-Abonnements und gibt die betroffenen Raeume zurueck
    pub fn alle_raeume_verlassen(&self, user_id: &UserId) -> Vec<RoomId> {
        let mut raeume = Vec::new();
        self.inner.raum_mitglieder.iter_mut().for_each(|mut entry| {
            let vorher = entry.value().len();
            entry.value_mut().retain(|uid| uid != user_id);
            if entry.value().len() < vorher {
                raeume.push(*entry.key());
            }
        });
        self.inner
            .raum_mitglieder
            .retain(|_, mitglieder| !mitglieder.is_empty());
        raeume
    }

    /// Prueft ob ein Benutzer einen Raum abonniert hat
    pub fn ist_im_raum(&self, user_id: &UserId, room_id: &RoomId) -> bool {
        self.inner
            .raum_mitglieder
            .get(room_id)
            .map(|mitglieder| mitglieder.contains(user_id))
            .unwrap_or(false)
    }

    /// Gibt alle User-IDs zurueck, die einen Raum abonniert haben
    pub fn mitglieder_in_raum(&self, room_id: &RoomId) -> Vec<UserId> {
        self.inner
            .raum_mitglieder
            .get(room_id)
            .map(|mitglieder| mitglieder.clone())
            .unwrap_or_default()
    }

    /// Stellt eine Nachricht punkt-zu-punkt zu
    ///
    /// `true` nur, wenn der Benutzer verbunden ist und die Nachricht
    /// sein Postfach erreicht hat.
    pub fn an_user_senden(&self, user_id: &UserId, nachricht: ControlMessage) -> bool {
        match self.inner.sessions.get(user_id) {
            Some(eintrag) => eintrag.senden(user_id, nachricht),
            None => {
                tracing::debug!(user_id = %user_id, "Senden an nicht verbundenen Benutzer");
                false
            }
        }
    }

    /// Stellt eine Nachricht an alle Abonnenten eines Raums zu
    ///
    /// Liefert die Anzahl erreichter Postfaecher.
    pub fn an_raum_senden(&self, room_id: &RoomId, nachricht: ControlMessage) -> usize {
        let user_ids = match self.inner.raum_mitglieder.get(room_id) {
            Some(ids) => ids.clone(),
            None => return 0,
        };

        let mut gesendet = 0;
        for user_id in &user_ids {
            if let Some(eintrag) = self.inner.sessions.get(user_id) {
                if eintrag.senden(user_id, nachricht.clone()) {
                    gesendet += 1;
                }
            }
        }
        gesendet
    }

    /// Sendet eine Nachricht an alle Abonnenten eines Raums ausser einem
    ///
    /// Nuetzlich um Ereignisse zu verteilen ohne den Ausloeser zu informieren.
    pub fn an_raum_ausser_senden(
        &self,
        room_id: &RoomId,
        ausgeschlossen: &UserId,
        nachricht: ControlMessage,
    ) -> usize {
        let user_ids = match self.inner.raum_mitglieder.get(room_id) {
            Some(ids) => ids.clone(),
            None => return 0,
        };

        let mut gesendet = 0;
        for user_id in &user_ids {
            if user_id == ausgeschlossen {
                continue;
            }
            if let Some(eintrag) = self.inner.sessions.get(user_id) {
                if eintrag.senden(user_id, nachricht.clone()) {
                    gesendet += 1;
                }
            }
        }
        gesendet
    }

    /// Stellt eine Nachricht an saemtliche Sessions zu
    ///
    /// Liefert die Anzahl erreichter Postfaecher.
    pub fn an_alle_senden(&self, nachricht: ControlMessage) -> usize {
        let mut gesendet = 0;
        self.inner.sessions.iter().for_each(|entry| {
            if entry.value().senden(entry.key(), nachricht.clone()) {
                gesendet += 1;
            }
        });
        gesendet
    }

    /// Zustellung an jede Session ausser der ausgeschlossenen
    pub fn an_alle_ausser_senden(&self, ausgeschlossen: &UserId, nachricht: ControlMessage) -> usize {
        let mut gesendet = 0;
        self.inner.sessions.iter().for_each(|entry| {
            if entry.key() == ausgeschlossen {
                return;
            }
            if entry.value().senden(entry.key(), nachricht.clone()) {
                gesendet += 1;
            }
        });
        gesendet
    }

    /// Gibt die Anzahl der aktiven Sessions zurueck
    pub fn session_anzahl(&self) -> usize {
        self.inner.sessions.len()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::neu()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
