use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Timestamp layout consumed downstream: UTC wall clock, millisecond
/// precision, no timezone designator.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// A field owned by a later pipeline stage. Always serialized, as `null`
/// until that stage fills it in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Reserved(Option<Value>);

impl Reserved {
    #[cfg(test)]
    fn is_unset(&self) -> bool {
        self.0.is_none()
    }
}

/// The event published to the intake topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Envelope {
    pub id: String,
    pub content: String,
    pub timestamp: String,
    pub structured: Reserved,
    pub route: Reserved,
    pub support: Reserved,
    pub website: Reserved,
    pub finance: Reserved,
    pub comment: Reserved,
    pub error: Vec<String>,
}

impl Envelope {
    /// Wraps `content` in a fresh envelope. Empty content is accepted; callers
    /// validate input before building.
    pub fn build(content: impl Into<String>) -> Self {
        Envelope {
            id: Uuid::new_v4().simple().to_string(),
            content: content.into(),
            timestamp: Utc::now().format(TIMESTAMP_FORMAT).to_string(),
            structured: Reserved::default(),
            route: Reserved::default(),
            support: Reserved::default(),
            website: Reserved::default(),
            finance: Reserved::default(),
            comment: Reserved::default(),
            error: Vec::new(),
        }
    }

    /// Canonical UTF-8 JSON encoding sent as the message value.
    pub fn to_payload(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use chrono::NaiveDateTime;

    use super::*;

    fn is_hex_id(id: &str) -> bool {
        id.len() == 32 && id.chars().all(|c| matches!(c, '0'..='9' | 'a'..='f'))
    }

    #[test]
    fn build_sets_id_timestamp_and_reserved_defaults() {
        for content in ["Hello support", "", "multi\nline ünïcode"] {
            let env = Envelope::build(content);
            assert!(is_hex_id(&env.id), "bad id {}", env.id);
            assert_eq!(env.content, content);
            assert_eq!(env.timestamp.len(), 23);
            assert!(NaiveDateTime::parse_from_str(&env.timestamp, TIMESTAMP_FORMAT).is_ok());
            for field in [
                &env.structured,
                &env.route,
                &env.support,
                &env.website,
                &env.finance,
                &env.comment,
            ] {
                assert!(field.is_unset());
            }
            assert!(env.error.is_empty());
        }
    }

    #[test]
    fn ids_are_unique() {
        let ids: HashSet<String> = (0..10_000).map(|_| Envelope::build("x").id).collect();
        assert_eq!(ids.len(), 10_000);
    }

    #[test]
    fn payload_has_exact_field_set() {
        let env = Envelope::build("Hello support");
        let value: Value = serde_json::from_slice(&env.to_payload().unwrap()).unwrap();
        let obj = value.as_object().unwrap();

        let mut keys: Vec<&str> = obj.keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(
            keys,
            [
                "comment",
                "content",
                "error",
                "finance",
                "id",
                "route",
                "structured",
                "support",
                "timestamp",
                "website"
            ]
        );
        for reserved in ["structured", "route", "support", "website", "finance", "comment"] {
            assert_eq!(obj[reserved], Value::Null);
        }
        assert_eq!(obj["error"], Value::Array(vec![]));
        assert_eq!(obj["content"], "Hello support");
        assert_eq!(obj["id"], env.id.as_str());
    }

    #[test]
    fn payload_round_trips_through_downstream_shape() {
        let env = Envelope::build("I was charged twice");
        let back: Envelope = serde_json::from_slice(&env.to_payload().unwrap()).unwrap();
        assert_eq!(back, env);
    }
}
