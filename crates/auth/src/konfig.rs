//! Konfiguration des Auth-Kerns
//!
//! Wird beim Start aus einer TOML-Datei geladen. Alle Felder haben
//! Standardwerte fuer den Entwicklungsbetrieb; fuer den Produktivbetrieb
//! MUESSEN Schluessel und Salze ueberschrieben werden.

use serde::{Deserialize, Serialize};

/// Mindestlaenge des JWT-Schluessels in Bytes
const JWT_SCHLUESSEL_MINDESTLAENGE: usize = 32;

/// Vollstaendige Auth-Konfiguration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AuthKonfig {
    /// JWT-Einstellungen (Schluessel, Issuer, Audience)
    pub jwt: JwtEinstellungen,
    /// Passcode-Salze (eines je Nutzerart)
    pub passcode: PasscodeSalze,
    /// OTP-Einstellungen
    pub otp: OtpEinstellungen,
}

/// JWT-Einstellungen
///
/// Ein gemeinsamer symmetrischer Schluessel fuer alle drei Token-Klassen.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JwtEinstellungen {
    /// Symmetrischer Signierschluessel (HS256, mindestens 32 Bytes)
    pub schluessel: String,
    /// Issuer-Claim aller Tokens
    pub issuer: String,
    /// Audience-Claim aller Tokens
    pub audience: String,
}

impl Default for JwtEinstellungen {
    fn default() -> Self {
        Self {
            schluessel: "entwicklungs-schluessel-nicht-produktiv-nutzen!".into(),
            issuer: "autohaus".into(),
            audience: "autohaus-clients".into(),
        }
    }
}

/// Passcode-Salze
///
/// Zwei getrennte Salze, damit derselbe Passcode fuer einen Kunden und
/// einen Mitarbeiter mit gleicher Telefonnummer verschiedene Hashes ergibt.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PasscodeSalze {
    pub kunden_salt: String,
    pub mitarbeiter_salt: String,
}

impl Default for PasscodeSalze {
    fn default() -> Self {
        Self {
            kunden_salt: "kunden-salt-entwicklung".into(),
            mitarbeiter_salt: "mitarbeiter-salt-entwicklung".into(),
        }
    }
}

/// OTP-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct OtpEinstellungen {
    /// Klartext-Code loggen und im Versand-Ergebnis zurueckgeben.
    /// NUR fuer Entwicklungsumgebungen – im Produktivbetrieb bleibt der
    /// Code ausschliesslich beim SMS-Versand.
    pub code_im_log: bool,
}

impl AuthKonfig {
    /// Laedt die Konfiguration aus einer TOML-Datei und validiert sie
    pub fn aus_datei(pfad: &std::path::Path) -> anyhow::Result<Self> {
        let inhalt = std::fs::read_to_string(pfad)?;
        let konfig: Self = toml::from_str(&inhalt)?;
        konfig.validieren()?;
        Ok(konfig)
    }

    /// Prueft die Konfiguration auf offensichtliche Fehler
    pub fn validieren(&self) -> anyhow::Result<()> {
        if self.jwt.schluessel.len() < JWT_SCHLUESSEL_MINDESTLAENGE {
            anyhow::bail!(
                "JWT-Schluessel zu kurz: mindestens {JWT_SCHLUESSEL_MINDESTLAENGE} Bytes erforderlich"
            );
        }
        if self.jwt.issuer.is_empty() || self.jwt.audience.is_empty() {
            anyhow::bail!("JWT-Issuer und -Audience duerfen nicht leer sein");
        }
        if self.passcode.kunden_salt.is_empty() || self.passcode.mitarbeiter_salt.is_empty() {
            anyhow::bail!("Passcode-Salze duerfen nicht leer sein");
        }
        Ok(())
    }
}
