//! Store-Modelle fuer den Autohaus-Auth-Kern
//!
//! Diese Typen repraesentieren Datensaetze aus dem relationalen Store.
//! Sie sind von den Domain-Typen getrennt und dienen als reine
//! Datenuebertragungsobjekte.

use autohaus_core::Nutzerart;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Kunden
// ---------------------------------------------------------------------------

/// Kunden-Datensatz
///
/// Kunden entstehen implizit bei der ersten erfolgreichen OTP-Verifikation,
/// es gibt keine separate Registrierung.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KundeRecord {
    pub id: Uuid,
    pub phone: String,
    pub created_at: DateTime<Utc>,
    pub is_active: bool,
}

// ---------------------------------------------------------------------------
// Mitarbeiter
// ---------------------------------------------------------------------------

/// Mitarbeiter-Datensatz (administrativ angelegt)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MitarbeiterRecord {
    pub id: Uuid,
    pub phone: String,
    pub name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
    pub is_active: bool,
}

/// Daten zum Anlegen eines neuen Mitarbeiters
#[derive(Debug, Clone)]
pub struct NeuerMitarbeiter<'a> {
    pub phone: &'a str,
    pub name: &'a str,
    pub email: &'a str,
}

// ---------------------------------------------------------------------------
// Passcodes
// ---------------------------------------------------------------------------

/// Passcode-Datensatz
///
/// Genau ein Eintrag pro (principal_id, art). Der Passcode wird beim ersten
/// Authenticate-Schritt implizit gesetzt, danach immer verifiziert.
/// `failed_attempts` wird nur gezaehlt, nie durchgesetzt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PasscodeRecord {
    pub id: Uuid,
    pub principal_id: Uuid,
    pub art: Nutzerart,
    pub hash: String,
    pub failed_attempts: i64,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub is_active: bool,
}

/// Daten zum Anlegen eines neuen Passcodes
#[derive(Debug, Clone)]
pub struct NeuerPasscode<'a> {
    pub principal_id: Uuid,
    pub art: Nutzerart,
    pub hash: &'a str,
}

// ---------------------------------------------------------------------------
// Rollen und Berechtigungen
// ---------------------------------------------------------------------------

/// Rollen-Datensatz
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RolleRecord {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub is_active: bool,
}

/// Berechtigungs-Datensatz
///
/// `resource`/`action` bilden die fachliche Identitaet (z.B. "fahrzeuge"
/// + "erstellen"); der Vergleich erfolgt case-insensitiv.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BerechtigungRecord {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub resource: String,
    pub action: String,
    pub is_active: bool,
}

/// Aufgeloeste Rollenzuweisung eines Mitarbeiters
///
/// Ein Mitarbeiter hat hoechstens eine Zuweisung; ist sie oder die Rolle
/// inaktiv, darf der Auswerter keine Berechtigung gewaehren.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RolleMitBerechtigungen {
    pub rolle: RolleRecord,
    pub berechtigungen: Vec<BerechtigungRecord>,
    pub zuweisung_aktiv: bool,
}
