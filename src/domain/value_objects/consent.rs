//! Consent categories understood by the tag manager

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsentStatus {
    Granted,
    #[default]
    Denied,
}

impl ConsentStatus {
    pub fn from_granted(granted: bool) -> Self { if granted { Self::Granted } else { Self::Denied } }
    pub fn is_granted(&self) -> bool { matches!(self, Self::Granted) }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsentCategory {
    AdStorage,
    AdUserData,
    AdPersonalization,
    AnalyticsStorage,
}

impl ConsentCategory {
    pub const ALL: [ConsentCategory; 4] = [
        Self::AdStorage,
        Self::AdUserData,
        Self::AdPersonalization,
        Self::AnalyticsStorage,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AdStorage => "ad_storage",
            Self::AdUserData => "ad_user_data",
            Self::AdPersonalization => "ad_personalization",
            Self::AnalyticsStorage => "analytics_storage",
        }
    }
}

impl fmt::Display for ConsentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// Kind of consent command sent to the tag manager.
///
/// A `Default` command must reach the tag manager before any `Update`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsentUpdate {
    Default,
    Update,
}

/// Visitor choice for every consent category. Missing categories read as denied.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Consent {
    pub ad_storage: ConsentStatus,
    pub ad_user_data: ConsentStatus,
    pub ad_personalization: ConsentStatus,
    pub analytics_storage: ConsentStatus,
}

impl Consent {
    pub fn denied_all() -> Self { Self::all(ConsentStatus::Denied) }
    pub fn granted_all() -> Self { Self::all(ConsentStatus::Granted) }

    pub fn all(status: ConsentStatus) -> Self {
        Self { ad_storage: status, ad_user_data: status, ad_personalization: status, analytics_storage: status }
    }

    pub fn get(&self, category: ConsentCategory) -> ConsentStatus {
        match category {
            ConsentCategory::AdStorage => self.ad_storage,
            ConsentCategory::AdUserData => self.ad_user_data,
            ConsentCategory::AdPersonalization => self.ad_personalization,
            ConsentCategory::AnalyticsStorage => self.analytics_storage,
        }
    }

    pub fn with(mut self, category: ConsentCategory, status: ConsentStatus) -> Self {
        match category {
            ConsentCategory::AdStorage => self.ad_storage = status,
            ConsentCategory::AdUserData => self.ad_user_data = status,
            ConsentCategory::AdPersonalization => self.ad_personalization = status,
            ConsentCategory::AnalyticsStorage => self.analytics_storage = status,
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_denied_everywhere() {
        let consent = Consent::default();
        assert!(ConsentCategory::ALL.iter().all(|c| consent.get(*c) == ConsentStatus::Denied));
        assert_eq!(consent, Consent::denied_all());
    }

    #[test]
    fn test_serialized_shape() {
        let consent = Consent::denied_all().with(ConsentCategory::AnalyticsStorage, ConsentStatus::Granted);
        let json = serde_json::to_value(consent).unwrap();
        assert_eq!(json["analytics_storage"], "granted");
        assert_eq!(json["ad_storage"], "denied");
    }

    #[test]
    fn test_partial_object_fills_denied() {
        let consent: Consent = serde_json::from_str(r#"{"ad_storage":"granted"}"#).unwrap();
        assert!(consent.ad_storage.is_granted());
        assert!(!consent.ad_user_data.is_granted());
    }
}
