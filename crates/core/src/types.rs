//! Prinzipal-Typen fuer den Auth-Kern
//!
//! Eine Telefonnummer darf je Nutzerart genau einmal existieren –
//! dieselbe Nummer kann also gleichzeitig einen Kunden und einen
//! Mitarbeiter bezeichnen. Alle Stores schluesseln deshalb nach
//! (id, Nutzerart) bzw. (phone, Nutzerart).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Art des Prinzipals – bestimmt Namensraum, Passcode-Salt und Token-Claims
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Nutzerart {
    Kunde,
    Mitarbeiter,
}

impl Nutzerart {
    pub fn als_str(&self) -> &'static str {
        match self {
            Self::Kunde => "kunde",
            Self::Mitarbeiter => "mitarbeiter",
        }
    }
}

impl std::str::FromStr for Nutzerart {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "kunde" => Ok(Self::Kunde),
            "mitarbeiter" => Ok(Self::Mitarbeiter),
            other => Err(format!("Unbekannte Nutzerart: {other}")),
        }
    }
}

impl std::fmt::Display for Nutzerart {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.als_str())
    }
}

/// Ein authentifizierter Prinzipal
///
/// Eine getaggte Variante fuer beide Nutzerarten, sodass die
/// Token-Ausstellung mit einem einzigen Pfad auskommt. `rolle` ist nur
/// fuer Mitarbeiter mit aktiver Rollenzuweisung gesetzt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prinzipal {
    pub id: Uuid,
    pub phone: String,
    pub art: Nutzerart,
    /// Rollenname (nur Mitarbeiter, nur bei aktiver Zuweisung)
    pub rolle: Option<String>,
}

impl Prinzipal {
    /// Erstellt einen Kunden-Prinzipal (Kunden haben nie eine Rolle)
    pub fn kunde(id: Uuid, phone: impl Into<String>) -> Self {
        Self {
            id,
            phone: phone.into(),
            art: Nutzerart::Kunde,
            rolle: None,
        }
    }

    /// Erstellt einen Mitarbeiter-Prinzipal mit optionalem Rollennamen
    pub fn mitarbeiter(id: Uuid, phone: impl Into<String>, rolle: Option<String>) -> Self {
        Self {
            id,
            phone: phone.into(),
            art: Nutzerart::Mitarbeiter,
            rolle,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn nutzerart_roundtrip() {
        for art in [Nutzerart::Kunde, Nutzerart::Mitarbeiter] {
            let geparst = Nutzerart::from_str(art.als_str()).unwrap();
            assert_eq!(art, geparst);
        }
    }

    #[test]
    fn unbekannte_nutzerart_abgelehnt() {
        assert!(Nutzerart::from_str("admin").is_err());
        assert!(Nutzerart::from_str("").is_err());
    }

    #[test]
    fn prinzipal_kunde_ohne_rolle() {
        let p = Prinzipal::kunde(Uuid::new_v4(), "+491701234567");
        assert_eq!(p.art, Nutzerart::Kunde);
        assert!(p.rolle.is_none());
    }

    #[test]
    fn prinzipal_ist_serde_kompatibel() {
        let p = Prinzipal::mitarbeiter(Uuid::new_v4(), "+491701234567", Some("Verkauf".into()));
        let json = serde_json::to_string(&p).unwrap();
        let p2: Prinzipal = serde_json::from_str(&json).unwrap();
        assert_eq!(p, p2);
    }
}
