//! Fehlertypen fuer den Auth-Kern
//!
//! Jeder Fehlerzustand verlaesst den Kern als typisiertes Ergebnis,
//! nie als Panik. Sperr- und Fehlversuchszustaende sind keine Fehler
//! zum schnellen Wiederholen – Aufrufer muessen das Zeitfenster abwarten.

use thiserror::Error;

/// Alle moeglichen Fehler im Auth-Kern
#[derive(Debug, Error)]
pub enum AuthError {
    // --- OTP ---
    #[error("OTP nicht gefunden oder abgelaufen")]
    OtpNichtGefunden,

    #[error("Zu viele OTP-Versuche, bitte spaeter erneut versuchen")]
    OtpGesperrt,

    #[error("OTP ungueltig")]
    OtpUngueltig,

    // --- Tokens ---
    #[error("Token ungueltig: {0}")]
    TokenUngueltig(String),

    #[error("Refresh-Token wurde bereits verwendet")]
    TokenWiderrufen,

    #[error("Token-Erstellung fehlgeschlagen: {0}")]
    TokenErstellung(String),

    // --- Passcode ---
    #[error("Passcode falsch")]
    PasscodeFalsch,

    // --- Prinzipale ---
    #[error("Benutzer nicht gefunden: {0}")]
    BenutzerNichtGefunden(String),

    #[error("Benutzerkonto deaktiviert")]
    BenutzerGesperrt,

    // --- Berechtigungen ---
    #[error("Zugriff verweigert: Berechtigung '{0}' fehlt")]
    ZugriffVerweigert(String),

    // --- Stores ---
    #[error("Store-Fehler: {0}")]
    Datenbank(#[from] autohaus_db::DbError),
}

/// Result-Alias fuer den Auth-Kern
pub type AuthResult<T> = Result<T, AuthError>;
