//! autohaus-core – Gemeinsame Prinzipal-Typen
//!
//! Dieses Crate stellt die fundamentalen Typen bereit, die von den
//! Store- und Auth-Crates gemeinsam genutzt werden: die Nutzerart
//! (Kunde oder Mitarbeiter) und der daraus abgeleitete Prinzipal.

pub mod types;

// Re-Exporte fuer bequemen Zugriff
pub use types::{Nutzerart, Prinzipal};
