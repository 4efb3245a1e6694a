//! Verhaltens-Tests des ChatService gegen den MemoryStore

use std::sync::Arc;

use duplex_core::types::NachrichtenTyp;
use duplex_store::MemoryStore;
use uuid::Uuid;

use crate::{
    error::ChatError,
    service::{ChatService, GELOESCHT_PLATZHALTER},
    types::HistoryAnfrage,
};

fn setup() -> (Arc<ChatService<MemoryStore>>, Uuid, Uuid, Uuid) {
    let store = Arc::new(MemoryStore::new());
    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();
    let room = store.konversation_anlegen(vec![alice, bob]);
    (ChatService::neu(store), room, alice, bob)
}

#[tokio::test]
async fn test_senden_liefert_gespeicherte_nachricht() {
    let (service, room, alice, bob) = setup();

    let ergebnis = service
        .nachricht_senden(room, alice, "Hallo Welt!", NachrichtenTyp::Text)
        .await
        .expect("Senden muss gelingen");

    assert_eq!(ergebnis.nachricht.content, "Hallo Welt!");
    assert_eq!(ergebnis.nachricht.room_id, room);
    assert_eq!(ergebnis.nachricht.sender_id, alice);
    assert!(!ergebnis.nachricht.is_edited);
    assert!(!ergebnis.nachricht.is_deleted);
    assert_eq!(ergebnis.teilnehmer, vec![alice, bob]);
}

#[tokio::test]
async fn test_nachricht_von_fremdem_abgelehnt() {
    let (service, room, _, _) = setup();
    let fremder = Uuid::new_v4();

    let result = service
        .nachricht_senden(room, fremder, "Eindringling", NachrichtenTyp::Text)
        .await;

    assert!(matches!(result, Err(ChatError::KeineBerechtigung(_))));
}

#[tokio::test]
async fn test_nachricht_an_unbekannten_raum() {
    let (service, _, alice, _) = setup();

    let result = service
        .nachricht_senden(Uuid::new_v4(), alice, "Ins Leere", NachrichtenTyp::Text)
        .await;

    assert!(matches!(result, Err(ChatError::RaumNichtGefunden(_))));
}

#[tokio::test]
async fn test_leerer_inhalt_abgelehnt() {
    let (service, room, alice, _) = setup();

    let result = service
        .nachricht_senden(room, alice, "   ", NachrichtenTyp::Text)
        .await;

    assert!(matches!(result, Err(ChatError::UngueltigeEingabe(_))));
}

#[tokio::test]
async fn test_ueberlanger_inhalt_abgelehnt() {
    let (service, room, alice, _) = setup();

    let zu_lang = "x".repeat(4097);
    let result = service
        .nachricht_senden(room, alice, &zu_lang, NachrichtenTyp::Text)
        .await;

    assert!(matches!(result, Err(ChatError::UngueltigeEingabe(_))));
}

#[tokio::test]
async fn test_nachricht_bearbeiten() {
    let (service, room, alice, _) = setup();

    let original = service
        .nachricht_senden(room, alice, "Original", NachrichtenTyp::Text)
        .await
        .unwrap();

    let bearbeitet = service
        .nachricht_bearbeiten(room, original.nachricht.id, alice, "Bearbeitet")
        .await
        .expect("Bearbeiten muss gelingen");

    assert_eq!(bearbeitet.nachricht.content, "Bearbeitet");
    assert!(bearbeitet.nachricht.is_edited);
    assert!(bearbeitet.nachricht.edited_at.is_some());
}

#[tokio::test]
async fn test_fremde_nachricht_nicht_bearbeitbar() {
    let (service, room, alice, bob) = setup();

    let original = service
        .nachricht_senden(room, alice, "Von Alice", NachrichtenTyp::Text)
        .await
        .unwrap();

    let result = service
        .nachricht_bearbeiten(room, original.nachricht.id, bob, "Von Bob uebernommen")
        .await;

    assert!(matches!(result, Err(ChatError::KeineBerechtigung(_))));
}

#[tokio::test]
async fn test_geloeschte_nachricht_nicht_bearbeitbar() {
    let (service, room, alice, _) = setup();

    let original = service
        .nachricht_senden(room, alice, "Gleich wieder weg", NachrichtenTyp::Text)
        .await
        .unwrap();
    service
        .nachricht_loeschen(room, original.nachricht.id, alice)
        .await
        .unwrap();

    let result = service
        .nachricht_bearbeiten(room, original.nachricht.id, alice, "Zombie")
        .await;

    assert!(matches!(result, Err(ChatError::NachrichtNichtGefunden(_))));
}

#[tokio::test]
async fn test_loeschen_redigiert_inhalt() {
    let (service, room, alice, _) = setup();

    let original = service
        .nachricht_senden(room, alice, "Geheim", NachrichtenTyp::Text)
        .await
        .unwrap();

    let geloescht = service
        .nachricht_loeschen(room, original.nachricht.id, alice)
        .await
        .expect("Loeschen muss gelingen");
    assert!(geloescht.neu_geloescht);

    // Verlauf behaelt die Nachricht als redigierten Tombstone
    let verlauf = service
        .verlauf_laden(HistoryAnfrage {
            room_id: room,
            ..Default::default()
        })
        .await
        .unwrap();
    let tombstone = verlauf
        .iter()
        .find(|n| n.id == original.nachricht.id)
        .expect("Tombstone muss im Verlauf bleiben");
    assert!(tombstone.is_deleted);
    assert_eq!(tombstone.content, GELOESCHT_PLATZHALTER);
}

#[tokio::test]
async fn test_loeschen_ist_idempotent() {
    let (service, room, alice, _) = setup();

    let original = service
        .nachricht_senden(room, alice, "Zweimal weg", NachrichtenTyp::Text)
        .await
        .unwrap();

    let erste = service
        .nachricht_loeschen(room, original.nachricht.id, alice)
        .await
        .unwrap();
    let zweite = service
        .nachricht_loeschen(room, original.nachricht.id, alice)
        .await
        .expect("Wiederholtes Loeschen muss erlaubt sein");

    assert!(erste.neu_geloescht);
    assert!(!zweite.neu_geloescht);
    assert_eq!(erste.deleted_at, zweite.deleted_at);
}

#[tokio::test]
async fn test_loeschen_durch_fremde_abgelehnt() {
    let (service, room, alice, bob) = setup();

    let original = service
        .nachricht_senden(room, alice, "Von Alice", NachrichtenTyp::Text)
        .await
        .unwrap();

    let result = service
        .nachricht_loeschen(room, original.nachricht.id, bob)
        .await;

    assert!(matches!(result, Err(ChatError::KeineBerechtigung(_))));
}

#[tokio::test]
async fn test_gelesen_markieren_nur_ungelesene() {
    let (service, room, alice, bob) = setup();

    for i in 1..=3 {
        service
            .nachricht_senden(room, alice, &format!("Eintrag {i}"), NachrichtenTyp::Text)
            .await
            .unwrap();
    }

    let erste = service.gelesen_markieren(room, bob).await.unwrap();
    assert_eq!(erste.markiert.len(), 3);

    // Zweiter Durchlauf findet nichts Neues
    let zweite = service.gelesen_markieren(room, bob).await.unwrap();
    assert!(zweite.markiert.is_empty());
}

#[tokio::test]
async fn test_gelesen_markieren_ignoriert_geloeschte() {
    let (service, room, alice, bob) = setup();

    service
        .nachricht_senden(room, alice, "Bleibt", NachrichtenTyp::Text)
        .await
        .unwrap();
    let geloescht = service
        .nachricht_senden(room, alice, "Verschwindet", NachrichtenTyp::Text)
        .await
        .unwrap();
    service
        .nachricht_loeschen(room, geloescht.nachricht.id, alice)
        .await
        .unwrap();

    let ergebnis = service.gelesen_markieren(room, bob).await.unwrap();
    assert_eq!(ergebnis.markiert.len(), 1, "Tombstones bekommen keine Quittung");
}

#[tokio::test]
async fn test_gelesen_markieren_ignoriert_eigene() {
    let (service, room, alice, bob) = setup();

    service
        .nachricht_senden(room, alice, "Von Alice", NachrichtenTyp::Text)
        .await
        .unwrap();
    service
        .nachricht_senden(room, bob, "Von Bob", NachrichtenTyp::Text)
        .await
        .unwrap();

    let ergebnis = service.gelesen_markieren(room, bob).await.unwrap();
    assert_eq!(ergebnis.markiert.len(), 1, "Nur fremde Nachrichten zaehlen");
}

#[tokio::test]
async fn test_zustellung_bestaetigen() {
    let (service, room, alice, bob) = setup();

    let gesendet = service
        .nachricht_senden(room, alice, "Zustellbar", NachrichtenTyp::Text)
        .await
        .unwrap();

    let quittung = service
        .zustellung_bestaetigen(room, gesendet.nachricht.id, bob)
        .await
        .expect("Quittieren muss gelingen");
    assert_eq!(quittung.sender_id, alice);

    let verlauf = service
        .verlauf_laden(HistoryAnfrage {
            room_id: room,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(verlauf[0].delivered_to.len(), 1);
    assert_eq!(verlauf[0].delivered_to[0].user_id, bob);
}

#[tokio::test]
async fn test_verlauf_chronologisch() {
    let (service, room, alice, _) = setup();

    for i in 1..=5 {
        service
            .nachricht_senden(room, alice, &format!("Eintrag {i}"), NachrichtenTyp::Text)
            .await
            .unwrap();
    }

    let verlauf = service
        .verlauf_laden(HistoryAnfrage {
            room_id: room,
            before: None,
            limit: Some(10),
        })
        .await
        .unwrap();

    assert_eq!(verlauf.len(), 5);
    assert!(verlauf.windows(2).all(|w| w[0].created_at <= w[1].created_at));
}

#[tokio::test]
async fn test_geloeschter_platzhalter() {
    use duplex_store::ConversationStore;

    let store = Arc::new(MemoryStore::new());
    let alice = Uuid::new_v4();
    let room = store.konversation_anlegen(vec![alice, Uuid::new_v4()]);
    let service = ChatService::neu(Arc::clone(&store));

    let original = service
        .nachricht_senden(room, alice, "Vertraulich", NachrichtenTyp::Text)
        .await
        .unwrap();
    service
        .nachricht_loeschen(room, original.nachricht.id, alice)
        .await
        .unwrap();

    // Original-Inhalt bleibt im Speicher, die Domain-Sicht ist redigiert
    let record = store
        .get_message(room, original.nachricht.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.content, "Vertraulich");

    let sicht = crate::service::record_to_nachricht(record);
    assert!(sicht.is_deleted);
    assert_eq!(sicht.content, GELOESCHT_PLATZHALTER);
}
