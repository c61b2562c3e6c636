//! Key-Value-Store mit TTL und atomaren Hash-Feldern
//!
//! Der Auth-Kern braucht vom Key-Value-Store genau drei Dinge:
//! Schluessel-Ablauf (TTL), Existenzpruefung und ein atomares
//! Inkrementieren-und-Lesen auf Hash-Feldern (OTP-Versuchszaehler).
//! `MemoryKv` haelt alles im Speicher (RwLock-HashMap mit TTL);
//! abgelaufene Eintraege gelten beim Lesen als nicht vorhanden.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::error::{DbError, DbResult};

/// Schnittstelle zum geteilten Key-Value-Store
///
/// Wird fuer OTP-Challenges (Hash-Eintraege) und die Refresh-Token-
/// Widerrufsliste (Text-Eintraege mit TTL) verwendet.
#[allow(async_fn_in_trait)]
pub trait KvStore: Send + Sync {
    /// Prueft ob ein Schluessel existiert (und nicht abgelaufen ist)
    async fn existiert(&self, key: &str) -> DbResult<bool>;

    /// Loescht einen Schluessel; gibt `true` zurueck wenn er existierte
    async fn loeschen(&self, key: &str) -> DbResult<bool>;

    /// Setzt einen Text-Wert mit Ablaufzeit (plain overwrite, idempotent)
    async fn setzen_mit_ablauf(&self, key: &str, wert: &str, ttl: Duration) -> DbResult<()>;

    /// Setzt ein Feld eines Hash-Eintrags (legt den Eintrag bei Bedarf an)
    async fn hash_setzen(&self, key: &str, feld: &str, wert: &str) -> DbResult<()>;

    /// Liest ein Feld eines Hash-Eintrags
    async fn hash_lesen(&self, key: &str, feld: &str) -> DbResult<Option<String>>;

    /// Inkrementiert ein Hash-Feld atomar und gibt den NEUEN Wert zurueck
    ///
    /// Inkrementieren und Lesen sind eine Operation – zwei gleichzeitige
    /// Aufrufe duerfen sich nie denselben Zaehlerstand liefern.
    async fn hash_inkrementieren(&self, key: &str, feld: &str, um: i64) -> DbResult<i64>;

    /// Setzt die Ablaufzeit eines bestehenden Schluessels
    ///
    /// Gibt `false` zurueck wenn der Schluessel nicht existiert.
    async fn ablauf_setzen(&self, key: &str, ttl: Duration) -> DbResult<bool>;
}

/// Wert eines Eintrags: Text oder Hash (Feld -> Wert)
#[derive(Debug, Clone)]
enum KvWert {
    Text(String),
    Hash(HashMap<String, String>),
}

/// Ein Eintrag mit optionaler Ablaufzeit
#[derive(Debug, Clone)]
struct KvEintrag {
    wert: KvWert,
    laeuft_ab_am: Option<DateTime<Utc>>,
}

impl KvEintrag {
    fn ist_abgelaufen(&self) -> bool {
        self.laeuft_ab_am.is_some_and(|ablauf| ablauf <= Utc::now())
    }
}

/// In-Memory Key-Value-Store mit TTL-Unterstuetzung
///
/// Saemtliche Mutationen laufen unter einem einzigen Write-Lock, damit
/// `hash_inkrementieren` als eine Operation wirkt.
#[derive(Debug, Default)]
pub struct MemoryKv {
    eintraege: RwLock<HashMap<String, KvEintrag>>,
}

impl MemoryKv {
    /// Erstellt einen neuen leeren Store
    pub fn neu() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Entfernt abgelaufene Eintraege und gibt deren Anzahl zurueck
    pub async fn abgelaufene_bereinigen(&self) -> usize {
        let mut eintraege = self.eintraege.write().await;
        let vorher = eintraege.len();
        eintraege.retain(|_, e| !e.ist_abgelaufen());
        vorher - eintraege.len()
    }

    /// Gibt die Anzahl der aktiven (nicht abgelaufenen) Eintraege zurueck
    pub async fn anzahl_aktive(&self) -> usize {
        let eintraege = self.eintraege.read().await;
        eintraege.values().filter(|e| !e.ist_abgelaufen()).count()
    }
}

impl KvStore for MemoryKv {
    async fn existiert(&self, key: &str) -> DbResult<bool> {
        let eintraege = self.eintraege.read().await;
        Ok(eintraege.get(key).is_some_and(|e| !e.ist_abgelaufen()))
    }

    async fn loeschen(&self, key: &str) -> DbResult<bool> {
        let mut eintraege = self.eintraege.write().await;
        let existierte = eintraege
            .remove(key)
            .is_some_and(|e| !e.ist_abgelaufen());
        Ok(existierte)
    }

    async fn setzen_mit_ablauf(&self, key: &str, wert: &str, ttl: Duration) -> DbResult<()> {
        let mut eintraege = self.eintraege.write().await;
        eintraege.insert(
            key.to_string(),
            KvEintrag {
                wert: KvWert::Text(wert.to_string()),
                laeuft_ab_am: Some(Utc::now() + chrono::Duration::from_std(ttl).unwrap_or_default()),
            },
        );
        Ok(())
    }

    async fn hash_setzen(&self, key: &str, feld: &str, wert: &str) -> DbResult<()> {
        let mut eintraege = self.eintraege.write().await;
        match eintraege.get_mut(key).filter(|e| !e.ist_abgelaufen()) {
            Some(eintrag) => match &mut eintrag.wert {
                KvWert::Hash(felder) => {
                    felder.insert(feld.to_string(), wert.to_string());
                }
                KvWert::Text(_) => {
                    return Err(DbError::UngueltigeDaten(format!(
                        "Schluessel '{key}' ist kein Hash-Eintrag"
                    )));
                }
            },
            None => {
                let mut felder = HashMap::new();
                felder.insert(feld.to_string(), wert.to_string());
                eintraege.insert(
                    key.to_string(),
                    KvEintrag {
                        wert: KvWert::Hash(felder),
                        laeuft_ab_am: None,
                    },
                );
            }
        }
        Ok(())
    }

    async fn hash_lesen(&self, key: &str, feld: &str) -> DbResult<Option<String>> {
        let eintraege = self.eintraege.read().await;
        match eintraege.get(key).filter(|e| !e.ist_abgelaufen()) {
            None => Ok(None),
            Some(eintrag) => match &eintrag.wert {
                KvWert::Hash(felder) => Ok(felder.get(feld).cloned()),
                KvWert::Text(_) => Err(DbError::UngueltigeDaten(format!(
                    "Schluessel '{key}' ist kein Hash-Eintrag"
                ))),
            },
        }
    }

    async fn hash_inkrementieren(&self, key: &str, feld: &str, um: i64) -> DbResult<i64> {
        // Ein Write-Lock fuer Lesen+Schreiben: das Inkrement ist atomar.
        let mut eintraege = self.eintraege.write().await;
        let eintrag = eintraege
            .entry(key.to_string())
            .and_modify(|e| {
                if e.ist_abgelaufen() {
                    e.wert = KvWert::Hash(HashMap::new());
                    e.laeuft_ab_am = None;
                }
            })
            .or_insert_with(|| KvEintrag {
                wert: KvWert::Hash(HashMap::new()),
                laeuft_ab_am: None,
            });

        let felder = match &mut eintrag.wert {
            KvWert::Hash(felder) => felder,
            KvWert::Text(_) => {
                return Err(DbError::UngueltigeDaten(format!(
                    "Schluessel '{key}' ist kein Hash-Eintrag"
                )));
            }
        };

        let bisher = felder
            .get(feld)
            .and_then(|w| w.parse::<i64>().ok())
            .unwrap_or(0);
        let neu = bisher + um;
        felder.insert(feld.to_string(), neu.to_string());
        Ok(neu)
    }

    async fn ablauf_setzen(&self, key: &str, ttl: Duration) -> DbResult<bool> {
        let mut eintraege = self.eintraege.write().await;
        match eintraege.get_mut(key).filter(|e| !e.ist_abgelaufen()) {
            None => Ok(false),
            Some(eintrag) => {
                eintrag.laeuft_ab_am =
                    Some(Utc::now() + chrono::Duration::from_std(ttl).unwrap_or_default());
                Ok(true)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn text_setzen_und_existenz() {
        let kv = MemoryKv::neu();
        kv.setzen_mit_ablauf("a", "wert", Duration::from_secs(60))
            .await
            .unwrap();
        assert!(kv.existiert("a").await.unwrap());
        assert!(!kv.existiert("b").await.unwrap());
    }

    #[tokio::test]
    async fn abgelaufener_eintrag_gilt_als_fehlend() {
        let kv = MemoryKv::neu();
        kv.setzen_mit_ablauf("fluechtig", "x", Duration::from_secs(0))
            .await
            .unwrap();
        assert!(!kv.existiert("fluechtig").await.unwrap());
        assert_eq!(kv.hash_lesen("fluechtig", "f").await.unwrap(), None);
    }

    #[tokio::test]
    async fn hash_felder_setzen_und_lesen() {
        let kv = MemoryKv::neu();
        kv.hash_setzen("otp:+49170", "hash", "abc").await.unwrap();
        kv.hash_setzen("otp:+49170", "versuche", "0").await.unwrap();

        assert_eq!(
            kv.hash_lesen("otp:+49170", "hash").await.unwrap(),
            Some("abc".to_string())
        );
        assert_eq!(kv.hash_lesen("otp:+49170", "fehlt").await.unwrap(), None);
    }

    #[tokio::test]
    async fn inkrementieren_liefert_neuen_wert() {
        let kv = MemoryKv::neu();
        assert_eq!(kv.hash_inkrementieren("z", "n", 1).await.unwrap(), 1);
        assert_eq!(kv.hash_inkrementieren("z", "n", 1).await.unwrap(), 2);
        assert_eq!(kv.hash_inkrementieren("z", "n", 3).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn inkrementieren_ist_atomar_unter_konkurrenz() {
        let kv = MemoryKv::neu();
        let mut tasks = Vec::new();
        for _ in 0..50 {
            let kv = Arc::clone(&kv);
            tasks.push(tokio::spawn(async move {
                kv.hash_inkrementieren("zaehler", "n", 1).await.unwrap()
            }));
        }
        let mut gesehen = Vec::new();
        for task in tasks {
            gesehen.push(task.await.unwrap());
        }
        gesehen.sort_unstable();
        // Jeder Aufruf muss einen eindeutigen Zaehlerstand gesehen haben
        assert_eq!(gesehen, (1..=50).collect::<Vec<i64>>());
    }

    #[tokio::test]
    async fn text_eintrag_ist_kein_hash() {
        let kv = MemoryKv::neu();
        kv.setzen_mit_ablauf("t", "wert", Duration::from_secs(60))
            .await
            .unwrap();
        assert!(kv.hash_lesen("t", "f").await.is_err());
        assert!(kv.hash_inkrementieren("t", "f", 1).await.is_err());
    }

    #[tokio::test]
    async fn ablauf_setzen_und_bereinigen() {
        let kv = MemoryKv::neu();
        kv.hash_setzen("kurz", "f", "1").await.unwrap();
        assert!(kv.ablauf_setzen("kurz", Duration::from_secs(0)).await.unwrap());
        assert!(!kv.ablauf_setzen("fehlt", Duration::from_secs(1)).await.unwrap());

        let entfernt = kv.abgelaufene_bereinigen().await;
        assert_eq!(entfernt, 1);
        assert_eq!(kv.anzahl_aktive().await, 0);
    }

    #[tokio::test]
    async fn loeschen_meldet_existenz() {
        let kv = MemoryKv::neu();
        kv.hash_setzen("k", "f", "1").await.unwrap();
        assert!(kv.loeschen("k").await.unwrap());
        assert!(!kv.loeschen("k").await.unwrap());
    }
}
