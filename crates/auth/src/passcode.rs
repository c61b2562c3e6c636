//! Passcode-Credential-Verwaltung
//!
//! Der Passcode wird beim ersten Authenticate-Schritt implizit angelegt
//! ("lazy enrollment") und danach immer gegen den gespeicherten Hash
//! verifiziert. Der Hash ist deterministisch: SHA-256 ueber Passcode
//! plus einen nach Nutzerart gewaehlten Salt, Base64-kodiert.

use std::sync::Arc;

use base64::Engine;
use chrono::Utc;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use autohaus_core::Nutzerart;
use autohaus_db::models::NeuerPasscode;
use autohaus_db::PasscodeRepository;

use crate::error::{AuthError, AuthResult};
use crate::konfig::PasscodeSalze;

/// Ergebnis einer Passcode-Pruefung
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasscodeErgebnis {
    /// Erster Kontakt: Passcode wurde als Credential gespeichert
    Angelegt,
    /// Passcode stimmt mit dem gespeicherten Hash ueberein
    Verifiziert,
}

/// Passcode-Dienst – genau ein Credential je (Prinzipal, Nutzerart)
pub struct PasscodeDienst<P: PasscodeRepository> {
    repo: Arc<P>,
    salze: PasscodeSalze,
}

impl<P: PasscodeRepository> PasscodeDienst<P> {
    /// Erstellt einen neuen PasscodeDienst
    pub fn neu(repo: Arc<P>, salze: PasscodeSalze) -> Arc<Self> {
        Arc::new(Self { repo, salze })
    }

    /// Prueft den Passcode oder legt ihn beim ersten Mal an
    ///
    /// Fehlversuche werden gezaehlt und mit Zeitstempel festgehalten,
    /// fuehren aber zu keiner Sperre.
    pub async fn pruefen_oder_anlegen(
        &self,
        principal_id: Uuid,
        art: Nutzerart,
        passcode: &str,
    ) -> AuthResult<PasscodeErgebnis> {
        let hash = passcode_hashen(art, passcode, &self.salze);

        let Some(record) = self.repo.laden(principal_id, art).await? else {
            self.repo
                .erstellen(NeuerPasscode {
                    principal_id,
                    art,
                    hash: &hash,
                })
                .await?;
            tracing::info!(principal_id = %principal_id, art = %art, "Passcode angelegt");
            return Ok(PasscodeErgebnis::Angelegt);
        };

        if konstantzeit_gleich(&record.hash, &hash) {
            if record.failed_attempts > 0 {
                self.repo
                    .fehlversuche_zuruecksetzen(principal_id, art, Utc::now())
                    .await?;
            }
            tracing::debug!(principal_id = %principal_id, art = %art, "Passcode verifiziert");
            return Ok(PasscodeErgebnis::Verifiziert);
        }

        self.repo
            .fehlversuch_registrieren(principal_id, art, Utc::now())
            .await?;
        tracing::warn!(
            principal_id = %principal_id,
            art = %art,
            fehlversuche = record.failed_attempts + 1,
            "Passcode falsch"
        );
        Err(AuthError::PasscodeFalsch)
    }
}

/// Deterministischer Passcode-Hash: Base64(SHA-256(passcode + salt))
///
/// Der Salt wird nach Nutzerart gewaehlt, damit derselbe Passcode fuer
/// Kunde und Mitarbeiter unterschiedliche Hashes ergibt.
pub fn passcode_hashen(art: Nutzerart, passcode: &str, salze: &PasscodeSalze) -> String {
    let salt = match art {
        Nutzerart::Kunde => &salze.kunden_salt,
        Nutzerart::Mitarbeiter => &salze.mitarbeiter_salt,
    };
    let mut hasher = Sha256::new();
    hasher.update(passcode.as_bytes());
    hasher.update(salt.as_bytes());
    base64::engine::general_purpose::STANDARD.encode(hasher.finalize())
}

/// Vergleich in konstanter Zeit (XOR-Faltung ueber alle Bytes)
fn konstantzeit_gleich(a: &str, b: &str) -> bool {
    let a = a.as_bytes();
    let b = b.as_bytes();
    if a.len() != b.len() {
        return false;
    }
    let mut unterschied = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        unterschied |= x ^ y;
    }
    unterschied == 0
}
