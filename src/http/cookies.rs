//! Request cookies as a [`KeyValueStore`].
//!
//! Values are base64url-encoded so JSON text survives the cookie grammar.
//! Writes are collected and turned into `Set-Cookie` headers on the response.

use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::{HeaderMap, HeaderValue};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::Duration;
use std::collections::{BTreeMap, HashMap};
use tracing::warn;
use crate::storage::KeyValueStore;

#[derive(Clone, Debug, PartialEq, Eq)]
enum Change { Set { value: String, ttl: Duration }, Remove }

#[derive(Clone, Debug, Default)]
pub struct CookieJar {
    incoming: HashMap<String, String>,
    changes: BTreeMap<String, Change>,
}

impl CookieJar {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let mut incoming = HashMap::new();
        for header in headers.get_all(COOKIE) {
            let Ok(header) = header.to_str() else { continue };
            for pair in header.split(';') {
                if let Some((name, value)) = pair.split_once('=') {
                    incoming.insert(name.trim().to_string(), decode(value.trim()));
                }
            }
        }
        Self { incoming, changes: BTreeMap::new() }
    }

    pub fn into_headers(self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for (name, change) in self.changes {
            let cookie = match change {
                Change::Set { value, ttl } => format!(
                    "{name}={}; Path=/; Max-Age={}; SameSite=Lax",
                    URL_SAFE_NO_PAD.encode(value.as_bytes()), ttl.num_seconds().max(0),
                ),
                Change::Remove => format!("{name}=; Path=/; Max-Age=0"),
            };
            match HeaderValue::from_str(&cookie) {
                Ok(value) => { headers.append(SET_COOKIE, value); }
                Err(e) => warn!(cookie = %name, error = %e, "skipping unencodable cookie"),
            }
        }
        headers
    }
}

/// Undecodable values are kept verbatim so the stores see them as malformed.
fn decode(raw: &str) -> String {
    URL_SAFE_NO_PAD.decode(raw).ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .unwrap_or_else(|| raw.to_string())
}

impl KeyValueStore for CookieJar {
    fn get(&self, key: &str) -> Option<String> {
        match self.changes.get(key) {
            Some(Change::Set { value, .. }) => Some(value.clone()),
            Some(Change::Remove) => None,
            None => self.incoming.get(key).cloned(),
        }
    }

    fn set(&mut self, key: &str, value: String, ttl: Duration) {
        self.changes.insert(key.to_string(), Change::Set { value, ttl });
    }

    fn remove(&mut self, key: &str) { self.changes.insert(key.to_string(), Change::Remove); }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_through_headers() {
        let mut jar = CookieJar::default();
        jar.set("consent", r#"{"ad_storage":"granted"}"#.into(), Duration::days(365));
        jar.remove("basket-cookie");
        let headers = jar.into_headers();
        let set: Vec<_> = headers.get_all(SET_COOKIE).iter().map(|v| v.to_str().unwrap().to_string()).collect();
        assert_eq!(set.len(), 2);
        assert_eq!(set[0], "basket-cookie=; Path=/; Max-Age=0");
        assert!(set[1].starts_with("consent="));
        assert!(set[1].contains("Max-Age=31536000"));

        let pair = set[1].split(';').next().unwrap().to_string();
        let mut request = HeaderMap::new();
        request.insert(COOKIE, HeaderValue::from_str(&format!("other=1; {pair}")).unwrap());
        let jar = CookieJar::from_headers(&request);
        assert_eq!(jar.get("consent").as_deref(), Some(r#"{"ad_storage":"granted"}"#));
    }

    #[test]
    fn test_pending_changes_shadow_request() {
        let mut request = HeaderMap::new();
        request.insert(COOKIE, HeaderValue::from_static("basket-cookie=not-base64!"));
        let mut jar = CookieJar::from_headers(&request);
        assert_eq!(jar.get("basket-cookie").as_deref(), Some("not-base64!"));
        jar.remove("basket-cookie");
        assert!(jar.get("basket-cookie").is_none());
    }
}
