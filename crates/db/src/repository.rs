//! Repository-Trait-Definitionen
//!
//! Das Repository-Pattern entkoppelt die Auth-Logik von der konkreten
//! Store-Implementierung. Die Services erhalten die Traits als
//! Konstruktor-Parameter – es gibt keine prozessweiten Handles.

use autohaus_core::Nutzerart;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::DbResult;
use crate::models::{
    KundeRecord, MitarbeiterRecord, NeuerMitarbeiter, NeuerPasscode, PasscodeRecord,
    RolleMitBerechtigungen,
};

/// Repository fuer Kunden-Datenzugriffe
///
/// Kunden werden bei der ersten erfolgreichen OTP-Verifikation angelegt.
#[allow(async_fn_in_trait)]
pub trait KundenRepository: Send + Sync {
    /// Einen Kunden anhand seiner ID laden
    async fn laden(&self, id: Uuid) -> DbResult<Option<KundeRecord>>;

    /// Einen Kunden anhand seiner Telefonnummer laden
    async fn laden_nach_phone(&self, phone: &str) -> DbResult<Option<KundeRecord>>;

    /// Einen neuen Kunden anlegen (Telefonnummer ist eindeutig)
    async fn erstellen(&self, phone: &str) -> DbResult<KundeRecord>;
}

/// Repository fuer Mitarbeiter-Datenzugriffe
#[allow(async_fn_in_trait)]
pub trait MitarbeiterRepository: Send + Sync {
    /// Einen Mitarbeiter anhand seiner ID laden
    async fn laden(&self, id: Uuid) -> DbResult<Option<MitarbeiterRecord>>;

    /// Einen Mitarbeiter anhand seiner Telefonnummer laden
    async fn laden_nach_phone(&self, phone: &str) -> DbResult<Option<MitarbeiterRecord>>;

    /// Einen neuen Mitarbeiter anlegen (administrative Provisionierung)
    async fn erstellen(&self, daten: NeuerMitarbeiter<'_>) -> DbResult<MitarbeiterRecord>;

    /// Zeitpunkt des letzten Logins setzen
    async fn letzten_login_setzen(&self, id: Uuid) -> DbResult<()>;

    /// Die Rollenzuweisung eines Mitarbeiters samt Berechtigungen aufloesen
    ///
    /// Gibt `None` zurueck wenn keine Zuweisung existiert. Eine inaktive
    /// Zuweisung wird mit `zuweisung_aktiv = false` geliefert, damit der
    /// Auswerter sie ablehnen kann.
    async fn rolle_aufloesen(&self, mitarbeiter_id: Uuid)
        -> DbResult<Option<RolleMitBerechtigungen>>;
}

/// Repository fuer Passcode-Datenzugriffe
///
/// Genau ein Datensatz pro (principal_id, art).
#[allow(async_fn_in_trait)]
pub trait PasscodeRepository: Send + Sync {
    /// Den Passcode eines Prinzipals laden
    async fn laden(&self, principal_id: Uuid, art: Nutzerart) -> DbResult<Option<PasscodeRecord>>;

    /// Einen neuen Passcode anlegen
    async fn erstellen(&self, daten: NeuerPasscode<'_>) -> DbResult<PasscodeRecord>;

    /// Fehlversuch registrieren (Zaehler hoch, Zeitstempel setzen)
    async fn fehlversuch_registrieren(
        &self,
        principal_id: Uuid,
        art: Nutzerart,
        zeitpunkt: DateTime<Utc>,
    ) -> DbResult<()>;

    /// Fehlversuche nach erfolgreicher Verifikation zuruecksetzen
    async fn fehlversuche_zuruecksetzen(
        &self,
        principal_id: Uuid,
        art: Nutzerart,
        zeitpunkt: DateTime<Utc>,
    ) -> DbResult<()>;
}
