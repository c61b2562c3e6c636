//! JWT-Ausstellung, -Validierung und Refresh-Widerruf
//!
//! Drei Token-Arten mit einem gemeinsamen symmetrischen Schluessel
//! (HS256): ein kurzlebiges Login-Token nach der OTP-Verifikation,
//! danach ein Access/Refresh-Paar. Refresh-Tokens sind Einweg-Tokens –
//! beim Erneuern wird das alte Token ueber eine Denylist im KV-Store
//! widerrufen, bevor das neue Paar ausgestellt wird.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use autohaus_core::{Nutzerart, Prinzipal};
use autohaus_db::KvStore;

use crate::error::{AuthError, AuthResult};
use crate::konfig::JwtEinstellungen;

/// Lebensdauer des Login-Tokens: 10 Minuten
const LOGIN_TTL_SEKUNDEN: i64 = 10 * 60;

/// Lebensdauer des Access-Tokens: 15 Minuten
const ACCESS_TTL_SEKUNDEN: i64 = 15 * 60;

/// Lebensdauer des Refresh-Tokens: 30 Tage
const REFRESH_TTL_SEKUNDEN: i64 = 30 * 24 * 60 * 60;

/// Token-Art im `typ`-Claim
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenTyp {
    /// Zwischenschritt nach der OTP-Verifikation
    Login,
    /// Autorisiert API-Zugriffe
    Access,
    /// Berechtigt zum Erneuern des Paars, einmal verwendbar
    Refresh,
}

impl std::fmt::Display for TokenTyp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Login => f.write_str("login"),
            Self::Access => f.write_str("access"),
            Self::Refresh => f.write_str("refresh"),
        }
    }
}

/// JWT-Claims aller drei Token-Arten
///
/// Login-Tokens tragen nur `phone`; Access/Refresh-Tokens zusaetzlich
/// `sub` und `art`, Mitarbeiter-Access-Tokens ausserdem `rolle`.
/// `jti` macht jedes Token als String eindeutig – `iat`/`exp` haben nur
/// Sekunden-Granularitaet, und die Widerrufsliste schluesselt auf den
/// exakten Token-String.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    pub typ: TokenTyp,
    pub jti: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub: Option<Uuid>,
    pub phone: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub art: Option<Nutzerart>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rolle: Option<String>,
    pub iss: String,
    pub aud: String,
    pub exp: i64,
    pub iat: i64,
}

/// Access/Refresh-Paar nach erfolgreicher Authentifizierung
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPaar {
    pub access_token: String,
    pub refresh_token: String,
    /// Restlaufzeit des Access-Tokens in Sekunden
    pub gueltig_sekunden: i64,
}

/// Token-Dienst – Ausstellung, Validierung und Widerruf
pub struct TokenDienst<K: KvStore> {
    kv: Arc<K>,
    kodierschluessel: EncodingKey,
    dekodierschluessel: DecodingKey,
    issuer: String,
    audience: String,
}

impl<K: KvStore> TokenDienst<K> {
    /// Erstellt einen neuen TokenDienst
    pub fn neu(kv: Arc<K>, jwt: &JwtEinstellungen) -> Arc<Self> {
        Arc::new(Self {
            kv,
            kodierschluessel: EncodingKey::from_secret(jwt.schluessel.as_bytes()),
            dekodierschluessel: DecodingKey::from_secret(jwt.schluessel.as_bytes()),
            issuer: jwt.issuer.clone(),
            audience: jwt.audience.clone(),
        })
    }

    /// Stellt das Login-Token nach erfolgreicher OTP-Verifikation aus
    ///
    /// Das Token traegt nur die verifizierte Telefonnummer – ein
    /// Prinzipal existiert zu diesem Zeitpunkt moeglicherweise noch gar
    /// nicht.
    pub fn login_token_ausstellen(&self, phone: &str) -> AuthResult<String> {
        let jetzt = Utc::now().timestamp();
        let claims = TokenClaims {
            typ: TokenTyp::Login,
            jti: Uuid::new_v4(),
            sub: None,
            phone: phone.to_string(),
            art: None,
            rolle: None,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            exp: jetzt + LOGIN_TTL_SEKUNDEN,
            iat: jetzt,
        };
        self.kodieren(&claims)
    }

    /// Stellt ein Access/Refresh-Paar fuer einen Prinzipal aus
    ///
    /// Ein einziger Pfad fuer beide Nutzerarten: der `rolle`-Claim
    /// landet nur im Access-Token und nur wenn der Prinzipal eine
    /// aktive Rolle traegt.
    pub fn token_paar_ausstellen(&self, prinzipal: &Prinzipal) -> AuthResult<TokenPaar> {
        let jetzt = Utc::now().timestamp();
        let access = TokenClaims {
            typ: TokenTyp::Access,
            jti: Uuid::new_v4(),
            sub: Some(prinzipal.id),
            phone: prinzipal.phone.clone(),
            art: Some(prinzipal.art),
            rolle: prinzipal.rolle.clone(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            exp: jetzt + ACCESS_TTL_SEKUNDEN,
            iat: jetzt,
        };
        let refresh = TokenClaims {
            typ: TokenTyp::Refresh,
            jti: Uuid::new_v4(),
            sub: Some(prinzipal.id),
            phone: prinzipal.phone.clone(),
            art: Some(prinzipal.art),
            rolle: None,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            exp: jetzt + REFRESH_TTL_SEKUNDEN,
            iat: jetzt,
        };
        Ok(TokenPaar {
            access_token: self.kodieren(&access)?,
            refresh_token: self.kodieren(&refresh)?,
            gueltig_sekunden: ACCESS_TTL_SEKUNDEN,
        })
    }

    /// Validiert Signatur, Ablauf, Issuer/Audience und Token-Art
    pub fn validieren(&self, token: &str, erwartet: TokenTyp) -> AuthResult<TokenClaims> {
        let mut validierung = Validation::new(Algorithm::HS256);
        validierung.leeway = 0;
        validierung.set_issuer(&[&self.issuer]);
        validierung.set_audience(&[&self.audience]);

        let daten = decode::<TokenClaims>(token, &self.dekodierschluessel, &validierung)
            .map_err(|e| AuthError::TokenUngueltig(e.to_string()))?;

        if daten.claims.typ != erwartet {
            return Err(AuthError::TokenUngueltig(format!(
                "Erwartet {erwartet}, erhalten {}",
                daten.claims.typ
            )));
        }
        Ok(daten.claims)
    }

    /// Extrahiert die verifizierte Telefonnummer aus einem Login-Token
    pub fn phone_aus_login_token(&self, token: &str) -> AuthResult<String> {
        Ok(self.validieren(token, TokenTyp::Login)?.phone)
    }

    /// Prueft ein Refresh-Token inklusive Widerrufs-Denylist
    pub async fn refresh_pruefen(&self, token: &str) -> AuthResult<TokenClaims> {
        let claims = self.validieren(token, TokenTyp::Refresh)?;
        if self.kv.existiert(&widerrufs_schluessel(token)).await? {
            tracing::warn!(sub = ?claims.sub, "Widerrufenes Refresh-Token abgelehnt");
            return Err(AuthError::TokenWiderrufen);
        }
        Ok(claims)
    }

    /// Setzt ein Refresh-Token auf die Denylist
    ///
    /// Der Denylist-Eintrag lebt genau so lange wie das Token selbst
    /// noch gueltig waere; ein bereits abgelaufenes Token braucht
    /// keinen Eintrag.
    pub async fn refresh_widerrufen(&self, token: &str, claims: &TokenClaims) -> AuthResult<()> {
        let restlaufzeit = claims.exp - Utc::now().timestamp();
        if restlaufzeit <= 0 {
            return Ok(());
        }
        self.kv
            .setzen_mit_ablauf(
                &widerrufs_schluessel(token),
                "widerrufen",
                Duration::from_secs(restlaufzeit as u64),
            )
            .await?;
        tracing::info!(sub = ?claims.sub, "Refresh-Token widerrufen");
        Ok(())
    }

    fn kodieren(&self, claims: &TokenClaims) -> AuthResult<String> {
        encode(&Header::default(), claims, &self.kodierschluessel)
            .map_err(|e| AuthError::TokenErstellung(e.to_string()))
    }
}

/// Denylist-Schluessel eines widerrufenen Refresh-Tokens
fn widerrufs_schluessel(token: &str) -> String {
    format!("widerrufen:refresh:{token}")
}
