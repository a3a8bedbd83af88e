/// AI insights for a project
///
/// Assembling a request takes three calls: project detail, geocoding of its
/// location, then the insight endpoint. The answer is reduced to a single
/// recommendation string. Nothing here touches upload or timeline state.
use serde_json::Value;

use super::data::ProjectId;
use crate::api::models::{Coordinates, InsightRequest};
use crate::api::ApiClient;
use crate::error::FetchError;

pub const NO_INSIGHTS: &str = "No insights available.";
pub const INSIGHTS_FAILED: &str = "Failed to load insights.";

const DEMO_USER: &str = "demo_user";

/// Fetch and reduce the recommendation for `project`
pub async fn load_recommendation(api: ApiClient, project: ProjectId) -> Result<String, FetchError> {
    let detail = api.get_project(project).await?;

    let coordinates = match detail.location.as_deref().filter(|l| !l.trim().is_empty()) {
        Some(location) => api.geocode(location).await?,
        None => None,
    }
    .unwrap_or(Coordinates {
        latitude: 0.0,
        longitude: 0.0,
    });

    let request = InsightRequest {
        image_key: detail.latest_image_key.unwrap_or_default(),
        coordinates,
        user_id: DEMO_USER.to_string(),
    };
    tracing::debug!("Requesting AI insights for project {}", project);

    let answer = api.ai_insights(&request).await?;
    Ok(extract_recommendation(&answer))
}

/// Pull the advice text out of an insight answer
///
/// Looks for `recommendation.advice` or a plain `recommendation` string, at
/// the top level and then under `result`.
pub fn extract_recommendation(answer: &Value) -> String {
    [Some(answer), answer.get("result")]
        .into_iter()
        .flatten()
        .filter_map(|scope| scope.get("recommendation"))
        .find_map(|recommendation| match recommendation {
            Value::String(text) => Some(text.clone()),
            Value::Object(fields) => fields
                .get("advice")
                .and_then(Value::as_str)
                .map(str::to_string),
            _ => None,
        })
        .filter(|text| !text.trim().is_empty())
        .unwrap_or_else(|| NO_INSIGHTS.to_string())
}

/// Insight panel state for the project being viewed
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InsightPanel {
    project: Option<ProjectId>,
    loading: bool,
    text: Option<String>,
}

impl InsightPanel {
    pub fn begin(&mut self, project: ProjectId) {
        self.project = Some(project);
        self.loading = true;
        self.text = None;
    }

    /// Apply an answer; returns false when it belongs to another project
    pub fn finish(&mut self, project: ProjectId, result: Result<String, FetchError>) -> bool {
        if self.project != Some(project) {
            return false;
        }
        self.loading = false;
        self.text = Some(match result {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!("AI insights for project {} failed: {}", project, e);
                INSIGHTS_FAILED.to_string()
            }
        });
        true
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::spawn_backend;
    use axum::{
        routing::{get, post},
        Json, Router,
    };
    use serde_json::json;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    #[test]
    fn test_extract_from_nested_result() {
        let answer = json!({ "result": { "recommendation": { "advice": "Irrigate the north block." } } });
        assert_eq!(extract_recommendation(&answer), "Irrigate the north block.");
    }

    #[test]
    fn test_extract_plain_string_at_top_level() {
        let answer = json!({ "recommendation": "Scout for aphids." });
        assert_eq!(extract_recommendation(&answer), "Scout for aphids.");
    }

    #[test]
    fn test_extract_falls_back() {
        assert_eq!(extract_recommendation(&json!({ "result": {} })), NO_INSIGHTS);
        assert_eq!(extract_recommendation(&json!({ "recommendation": 4 })), NO_INSIGHTS);
        assert_eq!(extract_recommendation(&json!([])), NO_INSIGHTS);
    }

    #[test]
    fn test_panel_ignores_other_project() {
        let mut panel = InsightPanel::default();
        panel.begin(2);
        assert!(!panel.finish(1, Ok("old".to_string())));
        assert!(panel.is_loading());

        assert!(panel.finish(2, Err(FetchError::Status(500))));
        assert_eq!(panel.text(), Some(INSIGHTS_FAILED));
    }

    #[tokio::test]
    async fn test_request_is_assembled_from_project_and_geocode() {
        let seen = Arc::new(Mutex::new(None::<serde_json::Value>));
        let captured = Arc::clone(&seen);
        let router = Router::new()
            .route(
                "/projects/:id",
                get(|| async {
                    Json(json!({
                        "id": 3, "name": "North", "location": "Utrecht",
                        "latest_image_key": "ndvi/3/latest.tif"
                    }))
                }),
            )
            .route(
                "/geocode",
                get(|| async { Json(json!({ "latitude": 52.09, "longitude": 5.12 })) }),
            )
            .route(
                "/ai-insights",
                post(move |Json(body): Json<serde_json::Value>| {
                    let captured = Arc::clone(&captured);
                    async move {
                        *captured.lock().unwrap() = Some(body);
                        Json(json!({ "result": { "recommendation": { "advice": "All good." } } }))
                    }
                }),
            );
        let api = ApiClient::new(&spawn_backend(router).await, Duration::from_secs(5)).unwrap();

        let text = load_recommendation(api, 3).await.unwrap();

        assert_eq!(text, "All good.");
        let body = seen.lock().unwrap().clone().unwrap();
        assert_eq!(body["image_key"], "ndvi/3/latest.tif");
        assert_eq!(body["coordinates"]["latitude"], 52.09);
        assert_eq!(body["user_id"], "demo_user");
    }
}
