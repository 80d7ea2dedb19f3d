//! Consent store.
//!
//! The tag manager must receive a `default` consent command before any
//! `update`, so [`ConsentStore::initialize`] pushes the denied-all default
//! before it even looks at the consent cookie.

use chrono::Duration;
use tracing::{debug, info, warn};
use crate::domain::value_objects::{Consent, ConsentCategory, ConsentUpdate};
use crate::services::tagging::TagSink;
use crate::storage::{default_expiry, KeyValueStore};

pub const CONSENT_COOKIE: &str = "consent";

pub struct ConsentStore<S, T> {
    storage: S,
    sink: T,
    current: Consent,
    has_stored_consent: bool,
    expiry: Duration,
}

impl<S: KeyValueStore, T: TagSink> ConsentStore<S, T> {
    /// Page-load initialization: default signal, then the stored choice if any.
    pub fn initialize(storage: S, mut sink: T) -> Self {
        let default = Consent::denied_all();
        sink.consent(ConsentUpdate::Default, &default);
        let mut store = Self { storage, sink, current: default, has_stored_consent: false, expiry: default_expiry() };
        if let Some(stored) = store.load() {
            store.current = stored;
            store.has_stored_consent = true;
            store.sink.consent(ConsentUpdate::Update, &store.current);
        }
        store
    }

    /// Reattach to a page whose tag manager already got its default signal.
    /// Loads the stored choice without pushing anything.
    pub fn resume(storage: S, sink: T) -> Self {
        let mut store = Self { storage, sink, current: Consent::denied_all(), has_stored_consent: false, expiry: default_expiry() };
        if let Some(stored) = store.load() {
            store.current = stored;
            store.has_stored_consent = true;
        }
        store
    }

    pub fn with_expiry(mut self, expiry: Duration) -> Self { self.expiry = expiry; self }

    pub fn current(&self) -> Consent { self.current }

    /// True once a consent cookie exists; the first-visit prompt shows otherwise.
    pub fn has_stored_consent(&self) -> bool { self.has_stored_consent }

    pub fn set_current(&mut self, consent: Consent) {
        self.current = consent;
        self.sink.consent(ConsentUpdate::Update, &self.current);
        match serde_json::to_string(&self.current) {
            Ok(text) => {
                self.storage.set(CONSENT_COOKIE, text, self.expiry);
                self.has_stored_consent = true;
            }
            Err(e) => warn!(error = %e, "could not serialize consent"),
        }
        let granted: Vec<_> = ConsentCategory::ALL.iter().filter(|c| consent.get(**c).is_granted()).map(|c| c.as_str()).collect();
        info!(granted = ?granted, "consent updated");
    }

    pub fn sink(&self) -> &T { &self.sink }
    pub fn into_parts(self) -> (S, T) { (self.storage, self.sink) }

    fn load(&self) -> Option<Consent> {
        let text = self.storage.get(CONSENT_COOKIE).filter(|t| !t.is_empty())?;
        match serde_json::from_str::<Consent>(&text) {
            Ok(consent) => { debug!(?consent, "loaded stored consent"); Some(consent) }
            Err(e) => { warn!(error = %e, "discarding unparseable consent cookie"); None }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::ConsentStatus;
    use crate::services::tagging::DataLayer;
    use crate::storage::MemoryStore;

    #[test]
    fn test_first_visit() {
        let store = ConsentStore::initialize(MemoryStore::new(), DataLayer::new());
        assert!(!store.has_stored_consent());
        assert_eq!(store.current(), Consent::denied_all());
        assert_eq!(store.sink().consent_commands(), vec![ConsentUpdate::Default]);
    }

    #[test]
    fn test_stored_consent_sends_update_after_default() {
        let mut storage = MemoryStore::new();
        storage.set(CONSENT_COOKIE, r#"{"ad_storage":"granted","ad_user_data":"denied","ad_personalization":"denied","analytics_storage":"granted"}"#.into(), default_expiry());
        let store = ConsentStore::initialize(storage, DataLayer::new());
        assert!(store.has_stored_consent());
        assert_eq!(store.current().analytics_storage, ConsentStatus::Granted);
        assert_eq!(store.sink().consent_commands(), vec![ConsentUpdate::Default, ConsentUpdate::Update]);
        assert_eq!(store.sink().entries()[0][2]["analytics_storage"], "denied");
        assert_eq!(store.sink().entries()[1][2]["analytics_storage"], "granted");
    }

    #[test]
    fn test_set_current_persists_and_updates() {
        let mut store = ConsentStore::initialize(MemoryStore::new(), DataLayer::new());
        store.set_current(Consent::granted_all());
        store.set_current(Consent::denied_all().with(ConsentCategory::AdStorage, ConsentStatus::Granted));
        assert!(store.has_stored_consent());
        let (storage, sink) = store.into_parts();
        assert_eq!(sink.consent_commands(), vec![ConsentUpdate::Default, ConsentUpdate::Update, ConsentUpdate::Update]);
        let saved: Consent = serde_json::from_str(&storage.get(CONSENT_COOKIE).unwrap()).unwrap();
        assert!(saved.ad_storage.is_granted());
        assert!(!saved.analytics_storage.is_granted());

        let reloaded = ConsentStore::initialize(storage, DataLayer::new());
        assert_eq!(reloaded.current(), saved);
    }

    #[test]
    fn test_malformed_cookie_falls_back_to_denied() {
        let mut storage = MemoryStore::new();
        storage.set(CONSENT_COOKIE, "granted?".into(), default_expiry());
        let store = ConsentStore::initialize(storage, DataLayer::new());
        assert!(!store.has_stored_consent());
        assert_eq!(store.current(), Consent::denied_all());
        assert_eq!(store.sink().consent_commands(), vec![ConsentUpdate::Default]);
    }

    #[test]
    fn test_resume_pushes_nothing() {
        let mut storage = MemoryStore::new();
        storage.set(CONSENT_COOKIE, serde_json::to_string(&Consent::granted_all()).unwrap(), default_expiry());
        let mut store = ConsentStore::resume(storage, DataLayer::new());
        assert!(store.sink().is_empty());
        assert_eq!(store.current(), Consent::granted_all());
        store.set_current(Consent::denied_all());
        assert_eq!(store.sink().consent_commands(), vec![ConsentUpdate::Update]);
    }
}
