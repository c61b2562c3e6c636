//! End-zu-End-Tests: Anmeldefluesse gegen SQLite und den In-Memory-KV

use std::sync::Arc;

use autohaus_auth::konfig::{JwtEinstellungen, PasscodeSalze};
use autohaus_auth::{
    AuthError, BerechtigungsDienst, KundenAuthDienst, MitarbeiterAuthDienst, OtpDienst,
    PasscodeDienst, TokenDienst,
};
use autohaus_core::Nutzerart;
use autohaus_db::models::NeuerMitarbeiter;
use autohaus_db::{MemoryKv, MitarbeiterRepository, SqliteDb};

struct Umgebung {
    db: SqliteDb,
    kunden: Arc<KundenAuthDienst<MemoryKv, SqliteDb, SqliteDb>>,
    mitarbeiter: Arc<MitarbeiterAuthDienst<MemoryKv, SqliteDb, SqliteDb>>,
    berechtigungen: Arc<BerechtigungsDienst<SqliteDb>>,
}

async fn umgebung() -> Umgebung {
    let db = SqliteDb::in_memory().await.expect("In-Memory-DB");
    let kv = MemoryKv::neu();
    let jwt = JwtEinstellungen {
        schluessel: "test-schluessel-mit-mindestens-32-zeichen!".into(),
        issuer: "autohaus".into(),
        audience: "autohaus-clients".into(),
    };
    let salze = PasscodeSalze {
        kunden_salt: "kunden-salt-test".into(),
        mitarbeiter_salt: "mitarbeiter-salt-test".into(),
    };

    let otp = OtpDienst::neu(Arc::clone(&kv), true);
    let tokens = TokenDienst::neu(kv, &jwt);
    let passcodes = PasscodeDienst::neu(Arc::new(db.clone()), salze);

    Umgebung {
        kunden: KundenAuthDienst::neu(
            Arc::clone(&otp),
            Arc::clone(&tokens),
            Arc::clone(&passcodes),
            Arc::new(db.clone()),
        ),
        mitarbeiter: MitarbeiterAuthDienst::neu(otp, tokens, passcodes, Arc::new(db.clone())),
        berechtigungen: BerechtigungsDienst::neu(Arc::new(db.clone())),
        db,
    }
}

#[tokio::test]
async fn kunde_von_null_bis_token_paar() {
    let umgebung = umgebung().await;
    let phone = "+491701234567";

    let code = umgebung
        .kunden
        .otp_senden(phone)
        .await
        .expect("OTP senden")
        .expect("Code im Entwicklungsmodus");
    let verifikation = umgebung
        .kunden
        .otp_verifizieren(phone, &code)
        .await
        .expect("OTP verifizieren");
    assert!(verifikation.erste_anmeldung);

    let anmeldung = umgebung
        .kunden
        .authentifizieren(&verifikation.login_token, "1234")
        .await
        .expect("authentifizieren");
    assert!(anmeldung.passcode_angelegt);

    // Rotation: das alte Refresh-Token stirbt mit dem Tausch
    let neues_paar = umgebung
        .kunden
        .tokens_erneuern(&anmeldung.token_paar.refresh_token)
        .await
        .expect("erneuern");
    let ergebnis = umgebung
        .kunden
        .tokens_erneuern(&anmeldung.token_paar.refresh_token)
        .await;
    assert!(matches!(ergebnis, Err(AuthError::TokenWiderrufen)));

    let prinzipal = umgebung
        .kunden
        .access_pruefen(&neues_paar.access_token)
        .expect("Access-Token");
    assert_eq!(prinzipal.art, Nutzerart::Kunde);
    assert_eq!(prinzipal.phone, phone);
}

#[tokio::test]
async fn mitarbeiter_mit_rolle_und_berechtigungspruefung() {
    let umgebung = umgebung().await;
    let phone = "+491709999999";

    let record = MitarbeiterRepository::erstellen(
        &umgebung.db,
        NeuerMitarbeiter {
            phone,
            name: "Erika Beispiel",
            email: "erika@beispiel.de",
        },
    )
    .await
    .expect("Mitarbeiter anlegen");

    let rolle = umgebung
        .db
        .rolle_anlegen("Verkauf", "Verkaufsteam")
        .await
        .expect("Rolle");
    let berechtigung = umgebung
        .db
        .berechtigung_anlegen("fahrzeuge.erstellen", "fahrzeuge", "erstellen")
        .await
        .expect("Berechtigung");
    umgebung
        .db
        .berechtigung_zuordnen(rolle.id, berechtigung.id)
        .await
        .expect("zuordnen");
    umgebung
        .db
        .rolle_zuweisen(record.id, rolle.id)
        .await
        .expect("zuweisen");

    let code = umgebung
        .mitarbeiter
        .otp_senden(phone)
        .await
        .expect("OTP senden")
        .expect("Code im Entwicklungsmodus");
    let login_token = umgebung
        .mitarbeiter
        .otp_verifizieren(phone, &code)
        .await
        .expect("OTP verifizieren");

    let anmeldung = umgebung
        .mitarbeiter
        .authentifizieren(&login_token, "5678")
        .await
        .expect("authentifizieren");
    assert_eq!(
        anmeldung.rolle.as_ref().map(|r| r.rolle.name.as_str()),
        Some("Verkauf")
    );

    let prinzipal = umgebung
        .mitarbeiter
        .access_pruefen(&anmeldung.token_paar.access_token)
        .expect("Access-Token");
    assert_eq!(prinzipal.rolle.as_deref(), Some("Verkauf"));

    // Die Berechtigung kommt aus der Datenbank, nie aus dem Token
    assert!(umgebung
        .berechtigungen
        .pruefen(record.id, "FAHRZEUGE", "Erstellen")
        .await
        .expect("pruefen"));
    assert!(!umgebung
        .berechtigungen
        .pruefen(record.id, "fahrzeuge", "loeschen")
        .await
        .expect("pruefen"));
}

#[tokio::test]
async fn rollenentzug_wirkt_sofort_auf_die_pruefung() {
    let umgebung = umgebung().await;

    let record = MitarbeiterRepository::erstellen(
        &umgebung.db,
        NeuerMitarbeiter {
            phone: "+491708888888",
            name: "Erika Beispiel",
            email: "erika@beispiel.de",
        },
    )
    .await
    .expect("Mitarbeiter anlegen");

    let rolle = umgebung.db.rolle_anlegen("Verkauf", "").await.expect("Rolle");
    let berechtigung = umgebung
        .db
        .berechtigung_anlegen("fahrzeuge.lesen", "fahrzeuge", "lesen")
        .await
        .expect("Berechtigung");
    umgebung
        .db
        .berechtigung_zuordnen(rolle.id, berechtigung.id)
        .await
        .expect("zuordnen");
    umgebung
        .db
        .rolle_zuweisen(record.id, rolle.id)
        .await
        .expect("zuweisen");

    assert!(umgebung
        .berechtigungen
        .pruefen(record.id, "fahrzeuge", "lesen")
        .await
        .expect("pruefen"));

    umgebung
        .db
        .zuweisung_deaktivieren(record.id)
        .await
        .expect("deaktivieren");

    assert!(!umgebung
        .berechtigungen
        .pruefen(record.id, "fahrzeuge", "lesen")
        .await
        .expect("pruefen"));
}

#[tokio::test]
async fn widerruf_ueberlebt_einen_fehlgeschlagenen_tausch() {
    let umgebung = umgebung().await;
    let phone = "+491706666666";

    let code = umgebung
        .kunden
        .otp_senden(phone)
        .await
        .expect("OTP senden")
        .expect("Code im Entwicklungsmodus");
    let verifikation = umgebung
        .kunden
        .otp_verifizieren(phone, &code)
        .await
        .expect("OTP verifizieren");
    let anmeldung = umgebung
        .kunden
        .authentifizieren(&verifikation.login_token, "1234")
        .await
        .expect("authentifizieren");

    // Der Mitarbeiter-Fluss lehnt das Kunden-Refresh-Token ab, hat es
    // zu diesem Zeitpunkt aber bereits widerrufen
    let ergebnis = umgebung
        .mitarbeiter
        .tokens_erneuern(&anmeldung.token_paar.refresh_token)
        .await;
    assert!(matches!(ergebnis, Err(AuthError::TokenUngueltig(_))));

    // Auch der eigentlich passende Fluss darf es danach nicht mehr annehmen
    let ergebnis = umgebung
        .kunden
        .tokens_erneuern(&anmeldung.token_paar.refresh_token)
        .await;
    assert!(matches!(ergebnis, Err(AuthError::TokenWiderrufen)));
}

#[tokio::test]
async fn kunde_und_mitarbeiter_teilen_die_nummer_aber_nicht_den_passcode() {
    let umgebung = umgebung().await;
    let phone = "+491707777777";

    MitarbeiterRepository::erstellen(
        &umgebung.db,
        NeuerMitarbeiter {
            phone,
            name: "Erika Beispiel",
            email: "erika@beispiel.de",
        },
    )
    .await
    .expect("Mitarbeiter anlegen");

    // Kundenfluss legt unter derselben Nummer einen eigenen Prinzipal an
    let code = umgebung
        .kunden
        .otp_senden(phone)
        .await
        .expect("OTP senden")
        .expect("Code im Entwicklungsmodus");
    let verifikation = umgebung
        .kunden
        .otp_verifizieren(phone, &code)
        .await
        .expect("OTP verifizieren");
    umgebung
        .kunden
        .authentifizieren(&verifikation.login_token, "1111")
        .await
        .expect("Kunde authentifizieren");

    // Der Mitarbeiter setzt seinen eigenen Passcode, "1111" gehoert dem Kunden
    let code = umgebung
        .mitarbeiter
        .otp_senden(phone)
        .await
        .expect("OTP senden")
        .expect("Code im Entwicklungsmodus");
    let login_token = umgebung
        .mitarbeiter
        .otp_verifizieren(phone, &code)
        .await
        .expect("OTP verifizieren");
    let anmeldung = umgebung
        .mitarbeiter
        .authentifizieren(&login_token, "2222")
        .await
        .expect("Mitarbeiter authentifizieren");
    assert!(anmeldung.passcode_angelegt);
}
