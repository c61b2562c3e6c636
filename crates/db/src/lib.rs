//! autohaus-db – Store-Abstraktion fuer den Auth-Kern
//!
//! Dieses Crate stellt zwei Store-Familien hinter Traits bereit:
//! die relationalen Repositories (Kunden, Mitarbeiter, Passcodes,
//! Rollen) mit einer SQLite-Implementierung, und den Key-Value-Store
//! mit TTL und atomaren Hash-Feldern (OTP-Challenges, Token-Widerruf)
//! mit einer In-Memory-Implementierung.

pub mod error;
pub mod kv;
pub mod models;
pub mod repository;
pub mod sqlite;

// Bequeme Re-Exporte
pub use error::{DbError, DbResult};
pub use kv::{KvStore, MemoryKv};
pub use repository::{KundenRepository, MitarbeiterRepository, PasscodeRepository};
pub use sqlite::SqliteDb;
