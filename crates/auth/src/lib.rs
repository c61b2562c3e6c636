//! Auth-Kern des Autohaus-Backends
//!
//! Telefonnummer-zentrierte Authentifizierung in drei Stationen
//! (OTP anfordern, OTP verifizieren, Login-Token plus Passcode gegen
//! ein Access/Refresh-Paar tauschen) sowie rollenbasierte
//! Berechtigungspruefung fuer Mitarbeiter. Alle Stores kommen als
//! Trait-Objekte ueber die Konstruktoren herein; der Kern kennt weder
//! HTTP noch SMS-Versand.

pub mod berechtigung;
pub mod error;
pub mod konfig;
pub mod kunden;
pub mod mitarbeiter;
pub mod otp;
pub mod passcode;
pub mod token;

pub use berechtigung::{richtlinie, richtlinie_parsen, BerechtigungsDienst, RoutenTabelle};
pub use error::{AuthError, AuthResult};
pub use konfig::AuthKonfig;
pub use kunden::{KundenAnmeldung, KundenAuthDienst, OtpVerifikation};
pub use mitarbeiter::{MitarbeiterAnmeldung, MitarbeiterAuthDienst};
pub use otp::OtpDienst;
pub use passcode::{passcode_hashen, PasscodeDienst, PasscodeErgebnis};
pub use token::{TokenClaims, TokenDienst, TokenPaar, TokenTyp};
