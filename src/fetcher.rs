//! Content fetcher - resolves a content type to its data endpoint and pulls
//! the current payload.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use serde::Deserialize;

use crate::envelope::{ContentType, UpdateAction, UpdateEnvelope};

/// Stock endpoint table. Configuration may add or override entries for
/// application-defined content types.
static STOCK_ENDPOINTS: Lazy<HashMap<ContentType, &'static str>> = Lazy::new(|| {
    HashMap::from([
        (ContentType::Nutrition, "/api/nutrition-data"),
        (ContentType::Faq, "/api/faq-data"),
        (ContentType::Vaccination, "/api/vaccination-data"),
        (ContentType::Schemes, "/api/schemes-data"),
    ])
});

#[derive(Debug, Deserialize)]
struct ContentResponse {
    success: bool,
    #[serde(default)]
    data: serde_json::Value,
    #[serde(default)]
    count: Option<u64>,
}

pub struct ContentFetcher {
    http: reqwest::Client,
    base_url: String,
    extra_endpoints: HashMap<ContentType, String>,
}

impl ContentFetcher {
    pub fn new(
        http: reqwest::Client,
        base_url: String,
        extra_endpoints: HashMap<ContentType, String>,
    ) -> Self {
        Self {
            http,
            base_url,
            extra_endpoints,
        }
    }

    /// Endpoint path for a content type, if one is known. Configured entries
    /// win over the stock table.
    pub fn resolve_endpoint(&self, content_type: &ContentType) -> Option<String> {
        self.extra_endpoints
            .get(content_type)
            .cloned()
            .or_else(|| STOCK_ENDPOINTS.get(content_type).map(|p| p.to_string()))
    }

    /// Fetch the current payload for `content_type` and wrap it in an
    /// envelope carrying `action` and a fresh timestamp.
    ///
    /// An unrecognized type resolves to no endpoint and yields `None`
    /// without issuing a request. Transport or decode failures are logged
    /// and yield `None`; retry, if any, waits for the next detection pass.
    pub async fn fetch(
        &self,
        content_type: &ContentType,
        action: UpdateAction,
    ) -> Option<UpdateEnvelope> {
        let path = self.resolve_endpoint(content_type)?;
        let url = format!("{}{}", self.base_url, path);

        let response = match self
            .http
            .get(&url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
        {
            Ok(response) => response,
            Err(err) => {
                tracing::warn!(content_type = %content_type, %err, "content fetch failed");
                return None;
            }
        };

        let body: ContentResponse = match response.json().await {
            Ok(body) => body,
            Err(err) => {
                tracing::warn!(content_type = %content_type, %err, "malformed content response");
                return None;
            }
        };

        if !body.success {
            tracing::warn!(content_type = %content_type, "content endpoint reported failure");
            return None;
        }

        Some(UpdateEnvelope::new(
            content_type.clone(),
            action,
            body.data,
            body.count,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fetcher(extra: HashMap<ContentType, String>) -> ContentFetcher {
        ContentFetcher::new(
            reqwest::Client::new(),
            "http://127.0.0.1:1".to_string(),
            extra,
        )
    }

    #[test]
    fn stock_types_resolve_to_fixed_endpoints() {
        let fetcher = fetcher(HashMap::new());
        assert_eq!(
            fetcher.resolve_endpoint(&ContentType::Nutrition).as_deref(),
            Some("/api/nutrition-data")
        );
        assert_eq!(
            fetcher.resolve_endpoint(&ContentType::Faq).as_deref(),
            Some("/api/faq-data")
        );
    }

    #[test]
    fn configured_endpoints_extend_and_override_the_table() {
        let extra = HashMap::from([
            (
                ContentType::Other("growth-charts".into()),
                "/api/growth-chart-data".to_string(),
            ),
            (ContentType::Faq, "/api/v2/faq-data".to_string()),
        ]);
        let fetcher = fetcher(extra);
        assert_eq!(
            fetcher
                .resolve_endpoint(&ContentType::Other("growth-charts".into()))
                .as_deref(),
            Some("/api/growth-chart-data")
        );
        assert_eq!(
            fetcher.resolve_endpoint(&ContentType::Faq).as_deref(),
            Some("/api/v2/faq-data")
        );
    }

    #[tokio::test]
    async fn unknown_type_yields_none_without_a_request() {
        // base_url points at a closed port; if a request were issued the
        // fetch would log a transport error, but an unknown type must short
        // circuit before that.
        let fetcher = fetcher(HashMap::new());
        let result = fetcher
            .fetch(&ContentType::Other("unknown".into()), UpdateAction::Updated)
            .await;
        assert!(result.is_none());
    }
}
