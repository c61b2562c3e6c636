//! Mitarbeiter-Anmeldefluss
//!
//! Gleiche Stationen wie beim Kunden, aber Mitarbeiter werden
//! administrativ angelegt: OTP-Versand und -Verifikation verlangen
//! einen existierenden, aktiven Datensatz. Beim Authentifizieren wird
//! die Rollenzuweisung aufgeloest – der Rollenname wandert ins
//! Access-Token, die Berechtigungen selbst nie.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use autohaus_core::{Nutzerart, Prinzipal};
use autohaus_db::models::{MitarbeiterRecord, RolleMitBerechtigungen};
use autohaus_db::{KvStore, MitarbeiterRepository, PasscodeRepository};

use crate::error::{AuthError, AuthResult};
use crate::otp::OtpDienst;
use crate::passcode::{PasscodeDienst, PasscodeErgebnis};
use crate::token::{TokenDienst, TokenPaar, TokenTyp};

/// Ergebnis einer erfolgreichen Mitarbeiter-Authentifizierung
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MitarbeiterAnmeldung {
    pub token_paar: TokenPaar,
    pub mitarbeiter: MitarbeiterRecord,
    /// Aufgeloeste Rollenzuweisung (None ohne aktive Zuweisung)
    pub rolle: Option<RolleMitBerechtigungen>,
    /// Der Passcode wurde bei diesem Aufruf neu gesetzt
    pub passcode_angelegt: bool,
}

/// Orchestrator fuer den Mitarbeiter-Anmeldefluss
pub struct MitarbeiterAuthDienst<K: KvStore, M: MitarbeiterRepository, P: PasscodeRepository> {
    otp: Arc<OtpDienst<K>>,
    tokens: Arc<TokenDienst<K>>,
    passcodes: Arc<PasscodeDienst<P>>,
    mitarbeiter: Arc<M>,
}

impl<K: KvStore, M: MitarbeiterRepository, P: PasscodeRepository>
    MitarbeiterAuthDienst<K, M, P>
{
    /// Erstellt einen neuen MitarbeiterAuthDienst
    pub fn neu(
        otp: Arc<OtpDienst<K>>,
        tokens: Arc<TokenDienst<K>>,
        passcodes: Arc<PasscodeDienst<P>>,
        mitarbeiter: Arc<M>,
    ) -> Arc<Self> {
        Arc::new(Self {
            otp,
            tokens,
            passcodes,
            mitarbeiter,
        })
    }

    /// Laedt den Mitarbeiter zur Nummer und prueft den Aktiv-Status
    async fn aktiven_mitarbeiter_laden(&self, phone: &str) -> AuthResult<MitarbeiterRecord> {
        let record = self
            .mitarbeiter
            .laden_nach_phone(phone)
            .await?
            .ok_or_else(|| AuthError::BenutzerNichtGefunden(phone.to_string()))?;
        if !record.is_active {
            tracing::warn!(mitarbeiter_id = %record.id, "Deaktivierter Mitarbeiter abgelehnt");
            return Err(AuthError::BenutzerGesperrt);
        }
        Ok(record)
    }

    /// Fordert eine OTP-Challenge an
    ///
    /// Anders als bei Kunden nur fuer bekannte, aktive Mitarbeiter.
    pub async fn otp_senden(&self, phone: &str) -> AuthResult<Option<String>> {
        self.aktiven_mitarbeiter_laden(phone).await?;
        let code = self.otp.generieren(phone).await?;
        Ok(self.otp.code_im_log().then_some(code))
    }

    /// Verifiziert den OTP-Code und stellt das Login-Token aus
    pub async fn otp_verifizieren(&self, phone: &str, code: &str) -> AuthResult<String> {
        self.aktiven_mitarbeiter_laden(phone).await?;
        self.otp.verifizieren(phone, code).await?;
        self.tokens.login_token_ausstellen(phone)
    }

    /// Tauscht Login-Token plus Passcode gegen ein Access/Refresh-Paar
    ///
    /// Loest die Rollenzuweisung auf und stempelt den letzten Login.
    pub async fn authentifizieren(
        &self,
        login_token: &str,
        passcode: &str,
    ) -> AuthResult<MitarbeiterAnmeldung> {
        let phone = self.tokens.phone_aus_login_token(login_token)?;
        let record = self.aktiven_mitarbeiter_laden(&phone).await?;

        let ergebnis = self
            .passcodes
            .pruefen_oder_anlegen(record.id, Nutzerart::Mitarbeiter, passcode)
            .await?;

        let rolle = self.aktive_rolle(record.id).await?;
        let prinzipal = Prinzipal::mitarbeiter(
            record.id,
            record.phone.clone(),
            rolle.as_ref().map(|r| r.rolle.name.clone()),
        );
        let token_paar = self.tokens.token_paar_ausstellen(&prinzipal)?;

        self.mitarbeiter.letzten_login_setzen(record.id).await?;
        tracing::info!(
            mitarbeiter_id = %record.id,
            rolle = ?prinzipal.rolle,
            "Mitarbeiter angemeldet"
        );

        Ok(MitarbeiterAnmeldung {
            token_paar,
            mitarbeiter: record,
            rolle,
            passcode_angelegt: ergebnis == PasscodeErgebnis::Angelegt,
        })
    }

    /// Tauscht ein Refresh-Token gegen ein frisches Paar
    ///
    /// Die Rolle wird neu aufgeloest, damit ein zwischenzeitlicher
    /// Rollenwechsel im naechsten Access-Token landet. Das eingereichte
    /// Token wird VOR der Neuausstellung widerrufen.
    pub async fn tokens_erneuern(&self, refresh_token: &str) -> AuthResult<TokenPaar> {
        let claims = self.tokens.refresh_pruefen(refresh_token).await?;
        self.tokens.refresh_widerrufen(refresh_token, &claims).await?;

        if claims.art != Some(Nutzerart::Mitarbeiter) {
            return Err(AuthError::TokenUngueltig(
                "Refresh-Token gehoert nicht zu einem Mitarbeiter".into(),
            ));
        }
        let mitarbeiter_id = claims
            .sub
            .ok_or_else(|| AuthError::TokenUngueltig("Refresh-Token ohne sub-Claim".into()))?;

        let record = self
            .mitarbeiter
            .laden(mitarbeiter_id)
            .await?
            .ok_or_else(|| AuthError::BenutzerNichtGefunden(mitarbeiter_id.to_string()))?;
        if !record.is_active {
            return Err(AuthError::BenutzerGesperrt);
        }

        let rolle = self.aktive_rolle(record.id).await?;
        let prinzipal = Prinzipal::mitarbeiter(
            record.id,
            record.phone,
            rolle.map(|r| r.rolle.name),
        );
        let token_paar = self.tokens.token_paar_ausstellen(&prinzipal)?;
        tracing::debug!(mitarbeiter_id = %mitarbeiter_id, "Token-Paar erneuert");
        Ok(token_paar)
    }

    /// Validiert ein Access-Token und liefert den Mitarbeiter-Prinzipal
    pub fn access_pruefen(&self, access_token: &str) -> AuthResult<Prinzipal> {
        let claims = self.tokens.validieren(access_token, TokenTyp::Access)?;
        if claims.art != Some(Nutzerart::Mitarbeiter) {
            return Err(AuthError::TokenUngueltig(
                "Access-Token gehoert nicht zu einem Mitarbeiter".into(),
            ));
        }
        let id = claims
            .sub
            .ok_or_else(|| AuthError::TokenUngueltig("Access-Token ohne sub-Claim".into()))?;
        Ok(Prinzipal::mitarbeiter(id, claims.phone, claims.rolle))
    }

    /// Liefert die Zuweisung nur wenn Zuweisung UND Rolle aktiv sind
    async fn aktive_rolle(
        &self,
        mitarbeiter_id: uuid::Uuid,
    ) -> AuthResult<Option<RolleMitBerechtigungen>> {
        Ok(self
            .mitarbeiter
            .rolle_aufloesen(mitarbeiter_id)
            .await?
            .filter(|z| z.zuweisung_aktiv && z.rolle.is_active))
    }
}
