//! Kunden-Anmeldefluss
//!
//! Drei Stationen: OTP anfordern, OTP verifizieren (legt beim ersten
//! Erfolg den Kunden an und liefert ein Login-Token), danach
//! Authentifizieren mit Login-Token plus Passcode. Der Passcode wird
//! beim ersten Authentifizieren implizit gesetzt.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use autohaus_core::{Nutzerart, Prinzipal};
use autohaus_db::models::KundeRecord;
use autohaus_db::{KundenRepository, KvStore, PasscodeRepository};

use crate::error::{AuthError, AuthResult};
use crate::otp::OtpDienst;
use crate::passcode::{PasscodeDienst, PasscodeErgebnis};
use crate::token::{TokenDienst, TokenPaar, TokenTyp};

/// Ergebnis der OTP-Verifikation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OtpVerifikation {
    /// Kurzlebiges Login-Token fuer den Authenticate-Schritt
    pub login_token: String,
    /// Der Kunde wurde bei dieser Verifikation neu angelegt
    pub erste_anmeldung: bool,
}

/// Ergebnis einer erfolgreichen Authentifizierung
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KundenAnmeldung {
    pub token_paar: TokenPaar,
    pub kunde: KundeRecord,
    /// Der Passcode wurde bei diesem Aufruf neu gesetzt
    pub passcode_angelegt: bool,
}

/// Orchestrator fuer den Kunden-Anmeldefluss
///
/// Saemtliche Store-Zugriffe laufen ueber die injizierten
/// Kollaborateure; der Dienst selbst haelt keinen Zustand.
pub struct KundenAuthDienst<K: KvStore, R: KundenRepository, P: PasscodeRepository> {
    otp: Arc<OtpDienst<K>>,
    tokens: Arc<TokenDienst<K>>,
    passcodes: Arc<PasscodeDienst<P>>,
    kunden: Arc<R>,
}

impl<K: KvStore, R: KundenRepository, P: PasscodeRepository> KundenAuthDienst<K, R, P> {
    /// Erstellt einen neuen KundenAuthDienst
    pub fn neu(
        otp: Arc<OtpDienst<K>>,
        tokens: Arc<TokenDienst<K>>,
        passcodes: Arc<PasscodeDienst<P>>,
        kunden: Arc<R>,
    ) -> Arc<Self> {
        Arc::new(Self {
            otp,
            tokens,
            passcodes,
            kunden,
        })
    }

    /// Fordert eine OTP-Challenge an
    ///
    /// Kunden muessen fuer den Versand noch nicht existieren. Der
    /// Klartext-Code wird nur im Entwicklungsmodus zurueckgegeben,
    /// sonst bleibt die Zustellung dem SMS-Versand ueberlassen.
    pub async fn otp_senden(&self, phone: &str) -> AuthResult<Option<String>> {
        let code = self.otp.generieren(phone).await?;
        Ok(self.otp.code_im_log().then_some(code))
    }

    /// Verifiziert den OTP-Code und stellt das Login-Token aus
    ///
    /// Beim ersten Erfolg wird der Kunde angelegt; ein Aktiv-Check
    /// findet erst beim Authentifizieren statt.
    pub async fn otp_verifizieren(&self, phone: &str, code: &str) -> AuthResult<OtpVerifikation> {
        self.otp.verifizieren(phone, code).await?;

        let erste_anmeldung = match self.kunden.laden_nach_phone(phone).await? {
            Some(_) => false,
            None => {
                let kunde = self.kunden.erstellen(phone).await?;
                tracing::info!(kunde_id = %kunde.id, "Kunde bei erster OTP-Verifikation angelegt");
                true
            }
        };

        Ok(OtpVerifikation {
            login_token: self.tokens.login_token_ausstellen(phone)?,
            erste_anmeldung,
        })
    }

    /// Tauscht Login-Token plus Passcode gegen ein Access/Refresh-Paar
    pub async fn authentifizieren(
        &self,
        login_token: &str,
        passcode: &str,
    ) -> AuthResult<KundenAnmeldung> {
        let phone = self.tokens.phone_aus_login_token(login_token)?;

        let kunde = self
            .kunden
            .laden_nach_phone(&phone)
            .await?
            .ok_or_else(|| AuthError::BenutzerNichtGefunden(phone.clone()))?;
        if !kunde.is_active {
            tracing::warn!(kunde_id = %kunde.id, "Anmeldung fuer deaktivierten Kunden abgelehnt");
            return Err(AuthError::BenutzerGesperrt);
        }

        let ergebnis = self
            .passcodes
            .pruefen_oder_anlegen(kunde.id, Nutzerart::Kunde, passcode)
            .await?;

        let prinzipal = Prinzipal::kunde(kunde.id, kunde.phone.clone());
        let token_paar = self.tokens.token_paar_ausstellen(&prinzipal)?;
        tracing::info!(kunde_id = %kunde.id, "Kunde angemeldet");

        Ok(KundenAnmeldung {
            token_paar,
            kunde,
            passcode_angelegt: ergebnis == PasscodeErgebnis::Angelegt,
        })
    }

    /// Tauscht ein Refresh-Token gegen ein frisches Paar
    ///
    /// Das eingereichte Token wird VOR der Neuausstellung widerrufen,
    /// damit es auch bei einem Abbruch dazwischen verbraucht ist.
    pub async fn tokens_erneuern(&self, refresh_token: &str) -> AuthResult<TokenPaar> {
        let claims = self.tokens.refresh_pruefen(refresh_token).await?;
        self.tokens.refresh_widerrufen(refresh_token, &claims).await?;

        if claims.art != Some(Nutzerart::Kunde) {
            return Err(AuthError::TokenUngueltig(
                "Refresh-Token gehoert nicht zu einem Kunden".into(),
            ));
        }
        let kunde_id = claims
            .sub
            .ok_or_else(|| AuthError::TokenUngueltig("Refresh-Token ohne sub-Claim".into()))?;

        let kunde = self
            .kunden
            .laden(kunde_id)
            .await?
            .ok_or_else(|| AuthError::BenutzerNichtGefunden(kunde_id.to_string()))?;
        if !kunde.is_active {
            return Err(AuthError::BenutzerGesperrt);
        }

        let prinzipal = Prinzipal::kunde(kunde.id, kunde.phone);
        let token_paar = self.tokens.token_paar_ausstellen(&prinzipal)?;
        tracing::debug!(kunde_id = %kunde_id, "Token-Paar erneuert");
        Ok(token_paar)
    }

    /// Validiert ein Access-Token und liefert den Kunden-Prinzipal
    pub fn access_pruefen(&self, access_token: &str) -> AuthResult<Prinzipal> {
        let claims = self.tokens.validieren(access_token, TokenTyp::Access)?;
        if claims.art != Some(Nutzerart::Kunde) {
            return Err(AuthError::TokenUngueltig(
                "Access-Token gehoert nicht zu einem Kunden".into(),
            ));
        }
        let id = claims
            .sub
            .ok_or_else(|| AuthError::TokenUngueltig("Access-Token ohne sub-Claim".into()))?;
        Ok(Prinzipal::kunde(id, claims.phone))
    }
}
