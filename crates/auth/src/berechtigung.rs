//! Rollenbasierte Berechtigungspruefung
//!
//! Ein Mitarbeiter hat hoechstens eine Rollenzuweisung. Gewaehrt wird
//! eine Berechtigung nur wenn Zuweisung, Rolle und Berechtigung aktiv
//! sind und (resource, action) case-insensitiv uebereinstimmen.
//! Alles andere ist eine Ablehnung – es gibt keinen Fallback.

use std::collections::HashMap;
use std::sync::Arc;

use uuid::Uuid;

use autohaus_db::MitarbeiterRepository;

use crate::error::{AuthError, AuthResult};

/// Praefix deklarativer Richtlinien-Namen
const RICHTLINIEN_PRAEFIX: &str = "Permission";

/// Berechtigungs-Auswerter ueber dem Mitarbeiter-Repository
pub struct BerechtigungsDienst<M: MitarbeiterRepository> {
    mitarbeiter: Arc<M>,
}

impl<M: MitarbeiterRepository> BerechtigungsDienst<M> {
    /// Erstellt einen neuen BerechtigungsDienst
    pub fn neu(mitarbeiter: Arc<M>) -> Arc<Self> {
        Arc::new(Self { mitarbeiter })
    }

    /// Prueft ob der Mitarbeiter die Berechtigung (resource, action) hat
    ///
    /// Default deny: keine Zuweisung, inaktive Zuweisung oder inaktive
    /// Rolle ergeben `false`, niemals einen Fehler.
    pub async fn pruefen(
        &self,
        mitarbeiter_id: Uuid,
        resource: &str,
        action: &str,
    ) -> AuthResult<bool> {
        let Some(zuweisung) = self.mitarbeiter.rolle_aufloesen(mitarbeiter_id).await? else {
            tracing::debug!(mitarbeiter_id = %mitarbeiter_id, "Keine Rollenzuweisung");
            return Ok(false);
        };

        if !zuweisung.zuweisung_aktiv || !zuweisung.rolle.is_active {
            tracing::debug!(
                mitarbeiter_id = %mitarbeiter_id,
                rolle = %zuweisung.rolle.name,
                "Zuweisung oder Rolle inaktiv"
            );
            return Ok(false);
        }

        let gewaehrt = zuweisung.berechtigungen.iter().any(|b| {
            b.is_active
                && b.resource.eq_ignore_ascii_case(resource)
                && b.action.eq_ignore_ascii_case(action)
        });
        tracing::debug!(
            mitarbeiter_id = %mitarbeiter_id,
            resource = %resource,
            action = %action,
            gewaehrt,
            "Berechtigung geprueft"
        );
        Ok(gewaehrt)
    }

    /// Wie [`pruefen`](Self::pruefen), lehnt aber mit `ZugriffVerweigert` ab
    pub async fn erfordern(
        &self,
        mitarbeiter_id: Uuid,
        resource: &str,
        action: &str,
    ) -> AuthResult<()> {
        if self.pruefen(mitarbeiter_id, resource, action).await? {
            Ok(())
        } else {
            Err(AuthError::ZugriffVerweigert(richtlinie(resource, action)))
        }
    }
}

/// Baut den deklarativen Richtlinien-Namen `Permission:<resource>:<action>`
pub fn richtlinie(resource: &str, action: &str) -> String {
    format!("{RICHTLINIEN_PRAEFIX}:{resource}:{action}")
}

/// Zerlegt einen Richtlinien-Namen in (resource, action)
///
/// Lehnt fremde Praefixe und leere Bestandteile ab.
pub fn richtlinie_parsen(name: &str) -> Option<(&str, &str)> {
    let mut teile = name.splitn(3, ':');
    let praefix = teile.next()?;
    let resource = teile.next()?;
    let action = teile.next()?;
    if praefix != RICHTLINIEN_PRAEFIX || resource.is_empty() || action.is_empty() {
        return None;
    }
    Some((resource, action))
}

/// Zuordnung von Routen-Tags zu (resource, action)
///
/// Eine reine Datentabelle: die HTTP-Schicht registriert ihre Routen
/// unter einem Tag, die Pruefung selbst bleibt ohne Web-Framework
/// testbar.
#[derive(Debug, Default, Clone)]
pub struct RoutenTabelle {
    eintraege: HashMap<String, (String, String)>,
}

impl RoutenTabelle {
    pub fn neu() -> Self {
        Self::default()
    }

    /// Registriert ein Routen-Tag mit seiner Berechtigung
    pub fn registrieren(
        &mut self,
        tag: impl Into<String>,
        resource: impl Into<String>,
        action: impl Into<String>,
    ) -> &mut Self {
        self.eintraege
            .insert(tag.into(), (resource.into(), action.into()));
        self
    }

    /// Loest ein Routen-Tag zu (resource, action) auf
    pub fn aufloesen(&self, tag: &str) -> Option<(&str, &str)> {
        self.eintraege
            .get(tag)
            .map(|(r, a)| (r.as_str(), a.as_str()))
    }
}
