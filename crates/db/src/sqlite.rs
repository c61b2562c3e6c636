//! SQLite-Implementierung der Repositories
//!
//! Standard-Backend fuer Single-Instance-Betrieb. IDs werden als
//! UUID-Strings gespeichert, Zeitstempel als UTC-Text. Alle Abfragen
//! laufen als einfache `sqlx::query`-Aufrufe ohne Compile-Time-Checks,
//! damit das Crate ohne laufende Datenbank baut.

use std::str::FromStr;

use autohaus_core::Nutzerart;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::models::{
    BerechtigungRecord, KundeRecord, MitarbeiterRecord, NeuerMitarbeiter, NeuerPasscode,
    PasscodeRecord, RolleMitBerechtigungen, RolleRecord,
};
use crate::repository::{KundenRepository, MitarbeiterRepository, PasscodeRepository};

/// SQLite-Datenbank mit Verbindungs-Pool
#[derive(Debug, Clone)]
pub struct SqliteDb {
    pool: SqlitePool,
}

impl SqliteDb {
    /// Oeffnet eine In-Memory-Datenbank und spielt die Migrationen ein
    ///
    /// Der Pool ist auf eine Verbindung begrenzt, da jede Verbindung
    /// ihre eigene `:memory:`-Datenbank bekommen wuerde.
    pub async fn in_memory() -> DbResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| DbError::NichtErreichbar(e.to_string()))?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    /// Oeffnet (und erstellt bei Bedarf) eine Datei-Datenbank
    pub async fn verbinden(url: &str) -> DbResult<Self> {
        let optionen = SqliteConnectOptions::from_str(url)
            .map_err(|e| DbError::UngueltigeDaten(format!("Ungueltige Datenbank-URL: {e}")))?
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(optionen)
            .await
            .map_err(|e| DbError::NichtErreichbar(e.to_string()))?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::info!(url = %url, "SQLite-Datenbank verbunden");
        Ok(Self { pool })
    }

    // --- Administrative Provisionierung (Rollen/Berechtigungen) ---

    /// Legt eine Rolle an
    pub async fn rolle_anlegen(&self, name: &str, description: &str) -> DbResult<RolleRecord> {
        let record = RolleRecord {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: description.to_string(),
            is_active: true,
        };
        sqlx::query("INSERT INTO rollen (id, name, description, is_active) VALUES (?, ?, ?, 1)")
            .bind(record.id.to_string())
            .bind(&record.name)
            .bind(&record.description)
            .execute(&self.pool)
            .await
            .map_err(|e| DbError::aus_einfuegen(e, &format!("Rolle '{name}' existiert bereits")))?;
        Ok(record)
    }

    /// Legt eine Berechtigung an
    pub async fn berechtigung_anlegen(
        &self,
        name: &str,
        resource: &str,
        action: &str,
    ) -> DbResult<BerechtigungRecord> {
        let record = BerechtigungRecord {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: String::new(),
            resource: resource.to_string(),
            action: action.to_string(),
            is_active: true,
        };
        sqlx::query(
            "INSERT INTO berechtigungen (id, name, description, resource, action, is_active) \
             VALUES (?, ?, ?, ?, ?, 1)",
        )
        .bind(record.id.to_string())
        .bind(&record.name)
        .bind(&record.description)
        .bind(&record.resource)
        .bind(&record.action)
        .execute(&self.pool)
        .await?;
        Ok(record)
    }

    /// Ordnet einer Rolle eine Berechtigung zu
    pub async fn berechtigung_zuordnen(&self, rolle_id: Uuid, berechtigung_id: Uuid) -> DbResult<()> {
        sqlx::query(
            "INSERT INTO rollen_berechtigungen (rolle_id, berechtigung_id) VALUES (?, ?)",
        )
        .bind(rolle_id.to_string())
        .bind(berechtigung_id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| DbError::aus_einfuegen(e, "Berechtigung ist der Rolle bereits zugeordnet"))?;
        Ok(())
    }

    /// Weist einem Mitarbeiter eine Rolle zu (ersetzt eine bestehende Zuweisung)
    pub async fn rolle_zuweisen(&self, mitarbeiter_id: Uuid, rolle_id: Uuid) -> DbResult<()> {
        sqlx::query(
            "INSERT INTO mitarbeiter_rollen (mitarbeiter_id, rolle_id, assigned_at, is_active) \
             VALUES (?, ?, ?, 1) \
             ON CONFLICT (mitarbeiter_id) DO UPDATE SET \
                 rolle_id = excluded.rolle_id, \
                 assigned_at = excluded.assigned_at, \
                 is_active = 1",
        )
        .bind(mitarbeiter_id.to_string())
        .bind(rolle_id.to_string())
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        tracing::info!(mitarbeiter_id = %mitarbeiter_id, rolle_id = %rolle_id, "Rolle zugewiesen");
        Ok(())
    }

    /// Deaktiviert die Rollenzuweisung eines Mitarbeiters
    pub async fn zuweisung_deaktivieren(&self, mitarbeiter_id: Uuid) -> DbResult<bool> {
        let ergebnis = sqlx::query(
            "UPDATE mitarbeiter_rollen SET is_active = 0 WHERE mitarbeiter_id = ?",
        )
        .bind(mitarbeiter_id.to_string())
        .execute(&self.pool)
        .await?;
        Ok(ergebnis.rows_affected() > 0)
    }

    /// Deaktiviert eine Rolle
    pub async fn rolle_deaktivieren(&self, rolle_id: Uuid) -> DbResult<bool> {
        let ergebnis = sqlx::query("UPDATE rollen SET is_active = 0 WHERE id = ?")
            .bind(rolle_id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(ergebnis.rows_affected() > 0)
    }

    /// Deaktiviert einen Mitarbeiter
    pub async fn mitarbeiter_deaktivieren(&self, id: Uuid) -> DbResult<bool> {
        let ergebnis = sqlx::query("UPDATE mitarbeiter SET is_active = 0 WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(ergebnis.rows_affected() > 0)
    }
}

impl KundenRepository for SqliteDb {
    async fn laden(&self, id: Uuid) -> DbResult<Option<KundeRecord>> {
        let zeile = sqlx::query("SELECT id, phone, created_at, is_active FROM kunden WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        zeile.map(|z| kunde_aus_zeile(&z)).transpose()
    }

    async fn laden_nach_phone(&self, phone: &str) -> DbResult<Option<KundeRecord>> {
        let zeile =
            sqlx::query("SELECT id, phone, created_at, is_active FROM kunden WHERE phone = ?")
                .bind(phone)
                .fetch_optional(&self.pool)
                .await?;
        zeile.map(|z| kunde_aus_zeile(&z)).transpose()
    }

    async fn erstellen(&self, phone: &str) -> DbResult<KundeRecord> {
        let record = KundeRecord {
            id: Uuid::new_v4(),
            phone: phone.to_string(),
            created_at: Utc::now(),
            is_active: true,
        };
        sqlx::query("INSERT INTO kunden (id, phone, created_at, is_active) VALUES (?, ?, ?, 1)")
            .bind(record.id.to_string())
            .bind(&record.phone)
            .bind(record.created_at)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                DbError::aus_einfuegen(e, &format!("Kunde mit Nummer {phone} existiert bereits"))
            })?;
        Ok(record)
    }
}

impl MitarbeiterRepository for SqliteDb {
    async fn laden(&self, id: Uuid) -> DbResult<Option<MitarbeiterRecord>> {
        let zeile = sqlx::query(
            "SELECT id, phone, name, email, created_at, last_login, is_active \
             FROM mitarbeiter WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;
        zeile.map(|z| mitarbeiter_aus_zeile(&z)).transpose()
    }

    async fn laden_nach_phone(&self, phone: &str) -> DbResult<Option<MitarbeiterRecord>> {
        let zeile = sqlx::query(
            "SELECT id, phone, name, email, created_at, last_login, is_active \
             FROM mitarbeiter WHERE phone = ?",
        )
        .bind(phone)
        .fetch_optional(&self.pool)
        .await?;
        zeile.map(|z| mitarbeiter_aus_zeile(&z)).transpose()
    }

    async fn erstellen(&self, daten: NeuerMitarbeiter<'_>) -> DbResult<MitarbeiterRecord> {
        let record = MitarbeiterRecord {
            id: Uuid::new_v4(),
            phone: daten.phone.to_string(),
            name: daten.name.to_string(),
            email: daten.email.to_string(),
            created_at: Utc::now(),
            last_login: None,
            is_active: true,
        };
        sqlx::query(
            "INSERT INTO mitarbeiter (id, phone, name, email, created_at, is_active) \
             VALUES (?, ?, ?, ?, ?, 1)",
        )
        .bind(record.id.to_string())
        .bind(&record.phone)
        .bind(&record.name)
        .bind(&record.email)
        .bind(record.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            DbError::aus_einfuegen(
                e,
                &format!("Mitarbeiter mit Nummer {} existiert bereits", daten.phone),
            )
        })?;
        Ok(record)
    }

    async fn letzten_login_setzen(&self, id: Uuid) -> DbResult<()> {
        sqlx::query("UPDATE mitarbeiter SET last_login = ? WHERE id = ?")
            .bind(Utc::now())
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn rolle_aufloesen(
        &self,
        mitarbeiter_id: Uuid,
    ) -> DbResult<Option<RolleMitBerechtigungen>> {
        let zeile = sqlx::query(
            "SELECT mr.is_active AS zuweisung_aktiv, \
                    r.id, r.name, r.description, r.is_active \
             FROM mitarbeiter_rollen mr \
             JOIN rollen r ON r.id = mr.rolle_id \
             WHERE mr.mitarbeiter_id = ?",
        )
        .bind(mitarbeiter_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        let Some(zeile) = zeile else {
            return Ok(None);
        };

        let rolle = RolleRecord {
            id: uuid_aus_zeile(&zeile, "id")?,
            name: zeile.get("name"),
            description: zeile.get("description"),
            is_active: zeile.get("is_active"),
        };
        let zuweisung_aktiv: bool = zeile.get("zuweisung_aktiv");

        let zeilen = sqlx::query(
            "SELECT b.id, b.name, b.description, b.resource, b.action, b.is_active \
             FROM rollen_berechtigungen rb \
             JOIN berechtigungen b ON b.id = rb.berechtigung_id \
             WHERE rb.rolle_id = ?",
        )
        .bind(rolle.id.to_string())
        .fetch_all(&self.pool)
        .await?;

        let berechtigungen = zeilen
            .iter()
            .map(berechtigung_aus_zeile)
            .collect::<DbResult<Vec<_>>>()?;

        Ok(Some(RolleMitBerechtigungen {
            rolle,
            berechtigungen,
            zuweisung_aktiv,
        }))
    }
}

impl PasscodeRepository for SqliteDb {
    async fn laden(&self, principal_id: Uuid, art: Nutzerart) -> DbResult<Option<PasscodeRecord>> {
        let zeile = sqlx::query(
            "SELECT id, principal_id, art, hash, failed_attempts, last_attempt_at, \
                    created_at, is_active \
             FROM passcodes WHERE principal_id = ? AND art = ?",
        )
        .bind(principal_id.to_string())
        .bind(art.als_str())
        .fetch_optional(&self.pool)
        .await?;
        zeile.map(|z| passcode_aus_zeile(&z)).transpose()
    }

    async fn erstellen(&self, daten: NeuerPasscode<'_>) -> DbResult<PasscodeRecord> {
        let record = PasscodeRecord {
            id: Uuid::new_v4(),
            principal_id: daten.principal_id,
            art: daten.art,
            hash: daten.hash.to_string(),
            failed_attempts: 0,
            last_attempt_at: None,
            created_at: Utc::now(),
            is_active: true,
        };
        sqlx::query(
            "INSERT INTO passcodes (id, principal_id, art, hash, failed_attempts, created_at, is_active) \
             VALUES (?, ?, ?, ?, 0, ?, 1)",
        )
        .bind(record.id.to_string())
        .bind(record.principal_id.to_string())
        .bind(record.art.als_str())
        .bind(&record.hash)
        .bind(record.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            DbError::aus_einfuegen(
                e,
                &format!(
                    "Passcode fuer ({}, {}) existiert bereits",
                    daten.principal_id, daten.art
                ),
            )
        })?;
        Ok(record)
    }

    async fn fehlversuch_registrieren(
        &self,
        principal_id: Uuid,
        art: Nutzerart,
        zeitpunkt: DateTime<Utc>,
    ) -> DbResult<()> {
        sqlx::query(
            "UPDATE passcodes SET failed_attempts = failed_attempts + 1, last_attempt_at = ? \
             WHERE principal_id = ? AND art = ?",
        )
        .bind(zeitpunkt)
        .bind(principal_id.to_string())
        .bind(art.als_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn fehlversuche_zuruecksetzen(
        &self,
        principal_id: Uuid,
        art: Nutzerart,
        zeitpunkt: DateTime<Utc>,
    ) -> DbResult<()> {
        sqlx::query(
            "UPDATE passcodes SET failed_attempts = 0, last_attempt_at = ? \
             WHERE principal_id = ? AND art = ?",
        )
        .bind(zeitpunkt)
        .bind(principal_id.to_string())
        .bind(art.als_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

// --- Zeilen-Mapping ---

fn uuid_aus_zeile(zeile: &SqliteRow, spalte: &str) -> DbResult<Uuid> {
    let wert: String = zeile.get(spalte);
    Uuid::parse_str(&wert)
        .map_err(|e| DbError::UngueltigeDaten(format!("Ungueltige UUID '{wert}': {e}")))
}

fn art_aus_zeile(zeile: &SqliteRow) -> DbResult<Nutzerart> {
    let wert: String = zeile.get("art");
    wert.parse().map_err(DbError::UngueltigeDaten)
}

fn kunde_aus_zeile(zeile: &SqliteRow) -> DbResult<KundeRecord> {
    Ok(KundeRecord {
        id: uuid_aus_zeile(zeile, "id")?,
        phone: zeile.get("phone"),
        created_at: zeile.get("created_at"),
        is_active: zeile.get("is_active"),
    })
}

fn mitarbeiter_aus_zeile(zeile: &SqliteRow) -> DbResult<MitarbeiterRecord> {
    Ok(MitarbeiterRecord {
        id: uuid_aus_zeile(zeile, "id")?,
        phone: zeile.get("phone"),
        name: zeile.get("name"),
        email: zeile.get("email"),
        created_at: zeile.get("created_at"),
        last_login: zeile.get("last_login"),
        is_active: zeile.get("is_active"),
    })
}

fn passcode_aus_zeile(zeile: &SqliteRow) -> DbResult<PasscodeRecord> {
    Ok(PasscodeRecord {
        id: uuid_aus_zeile(zeile, "id")?,
        principal_id: uuid_aus_zeile(zeile, "principal_id")?,
        art: art_aus_zeile(zeile)?,
        hash: zeile.get("hash"),
        failed_attempts: zeile.get("failed_attempts"),
        last_attempt_at: zeile.get("last_attempt_at"),
        created_at: zeile.get("created_at"),
        is_active: zeile.get("is_active"),
    })
}

fn berechtigung_aus_zeile(zeile: &SqliteRow) -> DbResult<BerechtigungRecord> {
    Ok(BerechtigungRecord {
        id: uuid_aus_zeile(zeile, "id")?,
        name: zeile.get("name"),
        description: zeile.get("description"),
        resource: zeile.get("resource"),
        action: zeile.get("action"),
        is_active: zeile.get("is_active"),
    })
}
