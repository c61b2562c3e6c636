//! Fehlertypen fuer das Store-Crate

use thiserror::Error;

/// Store-Fehlertypen (relational und Key-Value)
#[derive(Debug, Error)]
pub enum DbError {
    #[error("Eindeutigkeitsverletzung: {0}")]
    Eindeutigkeit(String),

    #[error("Ungueltige Daten: {0}")]
    UngueltigeDaten(String),

    #[error("Store nicht erreichbar: {0}")]
    NichtErreichbar(String),

    #[error("SQLx-Fehler: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("Migration-Fehler: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl DbError {
    /// Ordnet einen INSERT-Fehler der passenden Variante zu
    ///
    /// Verletzungen von UNIQUE-Constraints werden zu `Eindeutigkeit`,
    /// alles andere bleibt ein roher SQLx-Fehler.
    pub fn aus_einfuegen(fehler: sqlx::Error, kontext: &str) -> Self {
        if fehler
            .as_database_error()
            .is_some_and(|db| db.is_unique_violation())
        {
            Self::Eindeutigkeit(kontext.to_string())
        } else {
            Self::Sqlx(fehler)
        }
    }

    /// Gibt true zurueck wenn es sich um einen Eindeutigkeitsfehler handelt
    pub fn ist_eindeutigkeit(&self) -> bool {
        matches!(self, Self::Eindeutigkeit(_))
    }
}

/// Result-Alias fuer Store-Operationen
pub type DbResult<T> = Result<T, DbError>;
