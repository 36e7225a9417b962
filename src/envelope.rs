use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Routing key identifying a category of server-held content.
///
/// The set is open: the four built-in variants cover the stock endpoints,
/// while `Other` carries application-defined extensions. On the wire a
/// content type is always a plain lowercase string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ContentType {
    Nutrition,
    Faq,
    Vaccination,
    Schemes,
    Other(String),
}

impl ContentType {
    pub fn as_str(&self) -> &str {
        match self {
            ContentType::Nutrition => "nutrition",
            ContentType::Faq => "faq",
            ContentType::Vaccination => "vaccination",
            ContentType::Schemes => "schemes",
            ContentType::Other(s) => s.as_str(),
        }
    }
}

impl From<&str> for ContentType {
    fn from(s: &str) -> Self {
        match s {
            "nutrition" => ContentType::Nutrition,
            "faq" => ContentType::Faq,
            "vaccination" => ContentType::Vaccination,
            "schemes" => ContentType::Schemes,
            other => ContentType::Other(other.to_string()),
        }
    }
}

impl From<String> for ContentType {
    fn from(s: String) -> Self {
        ContentType::from(s.as_str())
    }
}

impl From<ContentType> for String {
    fn from(ct: ContentType) -> Self {
        ct.as_str().to_string()
    }
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happened to the content on the server side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateAction {
    Created,
    Updated,
    Deleted,
}

/// The atomic unit of update information flowing to subscribers.
///
/// Constructed once and never mutated; everything downstream of the
/// registry sees the same envelope by reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateEnvelope {
    #[serde(rename = "type")]
    pub content_type: ContentType,
    pub action: UpdateAction,
    pub data: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
    pub timestamp: DateTime<Utc>,
}

impl UpdateEnvelope {
    /// Build an envelope with a freshly generated timestamp.
    pub fn new(
        content_type: ContentType,
        action: UpdateAction,
        data: serde_json::Value,
        count: Option<u64>,
    ) -> Self {
        Self {
            content_type,
            action,
            data,
            count,
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_type_round_trips_as_string() {
        assert_eq!(ContentType::from("faq"), ContentType::Faq);
        assert_eq!(ContentType::Faq.as_str(), "faq");
        assert_eq!(
            ContentType::from("growth-charts"),
            ContentType::Other("growth-charts".to_string())
        );
    }

    #[test]
    fn envelope_wire_format_uses_type_and_data_fields() {
        let env = UpdateEnvelope::new(
            ContentType::Faq,
            UpdateAction::Updated,
            serde_json::json!([{"q": "?"}]),
            Some(5),
        );
        let value = serde_json::to_value(&env).unwrap();
        assert_eq!(value["type"], "faq");
        assert_eq!(value["action"], "updated");
        assert_eq!(value["count"], 5);
        assert!(value["data"].is_array());
        assert!(value["timestamp"].is_string());
    }

    #[test]
    fn count_is_omitted_when_absent() {
        let env = UpdateEnvelope::new(
            ContentType::Nutrition,
            UpdateAction::Deleted,
            serde_json::Value::Null,
            None,
        );
        let value = serde_json::to_value(&env).unwrap();
        assert!(value.get("count").is_none());
    }
}
