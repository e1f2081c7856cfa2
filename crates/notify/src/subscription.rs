//! Webhook subscriptions and the filters that gate which events they receive.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use platewatch_core::{ConsolidatedEvent, ListType};

/// Every non-empty field must accept the event. Empty fields match anything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SubscriptionFilters {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub channel_ids: Vec<String>,
    /// Requires the event's plate to have resolved to one of these list types.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub list_types: Vec<ListType>,
    /// Country codes, compared case-insensitively.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub countries: Vec<String>,
}

impl SubscriptionFilters {
    pub fn is_empty(&self) -> bool {
        self.channel_ids.is_empty() && self.list_types.is_empty() && self.countries.is_empty()
    }

    pub fn accepts(&self, event: &ConsolidatedEvent, list_type: Option<ListType>) -> bool {
        if !self.channel_ids.is_empty() && !self.channel_ids.contains(&event.channel_id) {
            return false;
        }
        if !self.list_types.is_empty() {
            match list_type {
                Some(t) if self.list_types.contains(&t) => {}
                _ => return false,
            }
        }
        if !self.countries.is_empty() {
            let Some(country) = event.country.as_deref() else {
                return false;
            };
            if !self.countries.iter().any(|c| c.eq_ignore_ascii_case(country)) {
                return false;
            }
        }
        true
    }
}

/// A registered webhook endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WebhookSubscription {
    #[serde(default = "new_id")]
    pub id: String,
    pub name: String,
    pub url: String,
    /// HMAC key. Never serialized back out.
    #[serde(default, skip_serializing)]
    pub secret: Option<String>,
    #[serde(default)]
    pub filters: SubscriptionFilters,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn default_true() -> bool {
    true
}

impl WebhookSubscription {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            name: name.into(),
            url: url.into(),
            secret: None,
            filters: SubscriptionFilters::default(),
            is_active: true,
            created_at: Utc::now(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }

    pub fn with_filters(mut self, filters: SubscriptionFilters) -> Self {
        self.filters = filters;
        self
    }

    /// Secret to sign with; blank secrets disable signing.
    pub fn signing_secret(&self) -> Option<&str> {
        self.secret.as_deref().filter(|s| !s.is_empty())
    }

    /// Active and accepted by its filters.
    pub fn wants(&self, event: &ConsolidatedEvent, list_type: Option<ListType>) -> bool {
        self.is_active && self.filters.accepts(event, list_type)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use uuid::Uuid;

    use super::*;

    fn event(channel: &str, country: Option<&str>) -> ConsolidatedEvent {
        ConsolidatedEvent {
            id: Uuid::new_v4(),
            channel_id: channel.to_string(),
            track_id: "t".to_string(),
            plate: Some("AB123".to_string()),
            confidence: 0.9,
            country: country.map(String::from),
            bbox: None,
            direction: None,
            image_url: None,
            frames_with_plate: 3,
            metadata: BTreeMap::new(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn empty_filters_accept_everything() {
        let filters = SubscriptionFilters::default();
        assert!(filters.is_empty());
        assert!(filters.accepts(&event("gate", None), None));
    }

    #[test]
    fn every_present_key_must_match() {
        let filters = SubscriptionFilters {
            channel_ids: vec!["gate".to_string()],
            list_types: vec![ListType::Black],
            countries: vec!["ru".to_string()],
        };
        let e = event("gate", Some("RU"));
        assert!(filters.accepts(&e, Some(ListType::Black)));
        assert!(!filters.accepts(&e, Some(ListType::White)));
        assert!(!filters.accepts(&e, None));
        assert!(!filters.accepts(&event("yard", Some("RU")), Some(ListType::Black)));
        assert!(!filters.accepts(&event("gate", None), Some(ListType::Black)));
        assert!(!filters.accepts(&event("gate", Some("KZ")), Some(ListType::Black)));
    }

    #[test]
    fn inactive_subscription_wants_nothing() {
        let mut sub = WebhookSubscription::new("desk", "http://localhost/hook");
        assert!(sub.wants(&event("gate", None), None));
        sub.is_active = false;
        assert!(!sub.wants(&event("gate", None), None));
    }

    #[test]
    fn blank_secret_disables_signing() {
        let sub = WebhookSubscription::new("desk", "http://localhost/hook").with_secret("");
        assert_eq!(sub.signing_secret(), None);
        let sub = sub.with_secret("k");
        assert_eq!(sub.signing_secret(), Some("k"));
    }

    #[test]
    fn secret_is_read_but_never_written() {
        let sub: WebhookSubscription = serde_yaml::from_str(
            "name: desk\nurl: http://localhost/hook\nsecret: k\nfilters:\n  list_types: [black]\n",
        )
        .unwrap();
        assert_eq!(sub.secret.as_deref(), Some("k"));
        assert!(sub.is_active);
        assert_eq!(sub.filters.list_types, vec![ListType::Black]);

        let json = serde_json::to_string(&sub).unwrap();
        assert!(!json.contains("secret"));
    }
}
