//! OTP-Challenge-Verwaltung
//!
//! Erzeugt, speichert und verifiziert kurzlebige 6-stellige Codes.
//! Gespeichert wird nur der SHA-256-Hash des Codes plus ein
//! Versuchszaehler; nach fuenf Fehlversuchen wird die Verifikation
//! fuer zwei Minuten gesperrt – auch gegen den korrekten Code.

use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use chrono::Utc;
use rand::Rng;
use sha2::{Digest, Sha256};

use autohaus_db::KvStore;

use crate::error::{AuthError, AuthResult};

/// Lebensdauer einer OTP-Challenge: 5 Minuten
const OTP_TTL: Duration = Duration::from_secs(5 * 60);

/// Maximale Fehlversuche bis zur Sperre
const MAX_VERSUCHE: i64 = 5;

/// Sperrdauer nach zu vielen Fehlversuchen: 2 Minuten
const SPERRDAUER_SEKUNDEN: i64 = 2 * 60;

/// OTP-Dienst – eine aktive Challenge je Telefonnummer
pub struct OtpDienst<K: KvStore> {
    kv: Arc<K>,
    /// Klartext-Code loggen (nur Entwicklungsumgebungen)
    code_im_log: bool,
}

impl<K: KvStore> OtpDienst<K> {
    /// Erstellt einen neuen OtpDienst
    pub fn neu(kv: Arc<K>, code_im_log: bool) -> Arc<Self> {
        Arc::new(Self { kv, code_im_log })
    }

    /// Ob Klartext-Codes nach aussen sichtbar sein duerfen
    pub fn code_im_log(&self) -> bool {
        self.code_im_log
    }

    /// Erzeugt eine neue Challenge fuer die Telefonnummer
    ///
    /// Eine bestehende Challenge wird ersetzt, egal in welchem Zustand
    /// sie ist. Der Klartext-Code geht an den Aufrufer (SMS-Versand
    /// liegt ausserhalb des Kerns).
    pub async fn generieren(&self, phone: &str) -> AuthResult<String> {
        // Kryptografisch sicherer 6-stelliger Code, gleichverteilt
        let code = rand::thread_rng().gen_range(100_000..1_000_000).to_string();

        let schluessel = otp_schluessel(phone);
        // Alten Eintrag entfernen, damit keine Sperr-Felder uebrig bleiben
        self.kv.loeschen(&schluessel).await?;
        self.kv
            .hash_setzen(&schluessel, "hash", &code_hash_base64(&code))
            .await?;
        self.kv.hash_setzen(&schluessel, "versuche", "0").await?;
        self.kv.ablauf_setzen(&schluessel, OTP_TTL).await?;

        if self.code_im_log {
            tracing::info!(phone = %phone, code = %code, "OTP erzeugt (Entwicklungsmodus)");
        } else {
            tracing::debug!(phone = %phone, "OTP erzeugt");
        }

        Ok(code)
    }

    /// Verifiziert einen eingereichten Code
    ///
    /// Reihenfolge: Existenz, Sperre (OHNE Code-Vergleich), Vergleich in
    /// konstanter Zeit. Bei Erfolg wird die Challenge geloescht (one-shot);
    /// bei Fehlschlag wird der Zaehler atomar erhoeht und ab dem fuenften
    /// Fehlversuch eine Sperre gesetzt.
    pub async fn verifizieren(&self, phone: &str, code: &str) -> AuthResult<()> {
        let schluessel = otp_schluessel(phone);

        if !self.kv.existiert(&schluessel).await? {
            tracing::warn!(phone = %phone, "Kein OTP gefunden");
            return Err(AuthError::OtpNichtGefunden);
        }

        // Eine aktive Sperre gilt auch fuer den korrekten Code
        if let Some(gesperrt_bis) = self.kv.hash_lesen(&schluessel, "gesperrt_bis").await? {
            if let Ok(bis) = gesperrt_bis.parse::<i64>() {
                if Utc::now().timestamp() < bis {
                    tracing::warn!(phone = %phone, "OTP-Verifikation gesperrt");
                    return Err(AuthError::OtpGesperrt);
                }
            }
        }

        let Some(gespeicherter_hash) = self.kv.hash_lesen(&schluessel, "hash").await? else {
            tracing::warn!(phone = %phone, "OTP-Eintrag unvollstaendig");
            return Err(AuthError::OtpNichtGefunden);
        };

        if konstantzeit_gleich(&gespeicherter_hash, &code_hash_base64(code)) {
            self.kv.loeschen(&schluessel).await?;
            tracing::info!(phone = %phone, "OTP erfolgreich verifiziert");
            return Ok(());
        }

        // Inkrementieren und Lesen als eine Operation, damit zwei
        // gleichzeitige Fehlversuche nicht unterzaehlen
        let versuche = self
            .kv
            .hash_inkrementieren(&schluessel, "versuche", 1)
            .await?;
        if versuche >= MAX_VERSUCHE {
            let gesperrt_bis = Utc::now().timestamp() + SPERRDAUER_SEKUNDEN;
            self.kv
                .hash_setzen(&schluessel, "gesperrt_bis", &gesperrt_bis.to_string())
                .await?;
            tracing::warn!(phone = %phone, versuche, "OTP gesperrt nach zu vielen Fehlversuchen");
        } else {
            tracing::warn!(phone = %phone, versuche, "OTP ungueltig");
        }

        Err(AuthError::OtpUngueltig)
    }
}

/// Storage-Schluessel einer Challenge – ein Eintrag je Telefonnummer
fn otp_schluessel(phone: &str) -> String {
    format!("otp:{phone}")
}

/// SHA-256-Hash des Codes, Base64-kodiert
fn code_hash_base64(code: &str) -> String {
    let hash = Sha256::digest(code.as_bytes());
    base64::engine::general_purpose::STANDARD.encode(hash)
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
