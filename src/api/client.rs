//! HTTP client for the NDVI backend
//!
//! Every call is fallible and asynchronous. A call only succeeds on a 2xx
//! status with a body of the expected shape; everything else maps to
//! [`FetchError`]. The upload endpoint lives in `state::transfer` because it
//! needs byte-level progress, but it shares this client's connection pool.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;

use super::models::{
    normalize_records, Coordinates, GeocodeResponse, InsightRequest, NewProject, ProjectDetail,
    ProjectSummary,
};
use crate::error::FetchError;
use crate::state::data::{NdviRecord, ProjectId};

const USER_AGENT: &str = concat!("field-monitor/", env!("CARGO_PKG_VERSION"));

/// Backend client; cheap to clone (shares the connection pool)
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    request_timeout: Duration,
}

impl ApiClient {
    /// Build a client for `base_url`
    ///
    /// `request_timeout` bounds ordinary fetches. Uploads are not bounded by
    /// it; the processing phase has its own timeout.
    pub fn new(base_url: &str, request_timeout: Duration) -> Result<Self, FetchError> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| FetchError::Network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            request_timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Absolute URL for a backend path
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, FetchError> {
        let response = request.timeout(self.request_timeout).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        response
            .json::<T>()
            .await
            .map_err(|e| FetchError::Malformed(e.to_string()))
    }

    /// `GET /projects`
    pub async fn list_projects(&self) -> Result<Vec<ProjectSummary>, FetchError> {
        self.send_json(self.http.get(self.url("/projects"))).await
    }

    /// `GET /projects/{id}`
    pub async fn get_project(&self, project: ProjectId) -> Result<ProjectDetail, FetchError> {
        self.send_json(self.http.get(self.url(&format!("/projects/{project}"))))
            .await
    }

    /// `POST /projects`
    pub async fn create_project(&self, project: &NewProject) -> Result<ProjectSummary, FetchError> {
        self.send_json(self.http.post(self.url("/projects")).json(project))
            .await
    }

    /// `GET /projects/{id}/ndvi`, validated but in payload order
    pub async fn fetch_ndvi(&self, project: ProjectId) -> Result<Vec<NdviRecord>, FetchError> {
        let payload: Value = self
            .send_json(self.http.get(self.url(&format!("/projects/{project}/ndvi"))))
            .await?;
        normalize_records(payload).map_err(FetchError::Malformed)
    }

    /// `GET /geocode?location=...`; Ok(None) when the location is unknown
    pub async fn geocode(&self, location: &str) -> Result<Option<Coordinates>, FetchError> {
        let response: GeocodeResponse = self
            .send_json(
                self.http
                    .get(self.url("/geocode"))
                    .query(&[("location", location)]),
            )
            .await?;
        Ok(response.into_coordinates())
    }

    /// `POST /ai-insights`, raw JSON answer
    pub async fn ai_insights(&self, request: &InsightRequest) -> Result<Value, FetchError> {
        self.send_json(self.http.post(self.url("/ai-insights")).json(request))
            .await
    }

    /// Download an image (absolute URL or backend-relative path)
    pub async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let url = if url.starts_with("http://") || url.starts_with("https://") {
            url.to_string()
        } else {
            self.url(url)
        };
        let response = self
            .http
            .get(url)
            .timeout(self.request_timeout)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        Ok(response.bytes().await?.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::spawn_backend;
    use axum::{
        extract::{Path, Query},
        http::StatusCode,
        routing::get,
        Json, Router,
    };
    use serde_json::json;
    use std::collections::HashMap;

    fn client(base: &str) -> ApiClient {
        ApiClient::new(base, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_url_joining() {
        let api = client("http://localhost:8000/");
        assert_eq!(api.url("/projects/3/ndvi"), "http://localhost:8000/projects/3/ndvi");
        assert_eq!(api.url("projects"), "http://localhost:8000/projects");
    }

    #[tokio::test]
    async fn test_fetch_ndvi_parses_records() {
        let router = Router::new().route(
            "/projects/:id/ndvi",
            get(|Path(id): Path<i64>| async move {
                Json(json!([
                    { "id": id * 10, "date": "March 15, 2025", "url": "a.jpg",
                      "ndviMin": -0.1, "ndviMax": 0.7, "ndviMean": 0.3 },
                    { "id": id * 10 + 1, "date": "March 01, 2025", "url": "b.jpg",
                      "ndviMin": -0.2, "ndviMax": 0.6, "ndviMean": 0.2 }
                ]))
            }),
        );
        let api = client(&spawn_backend(router).await);

        let records = api.fetch_ndvi(4).await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, 40);
    }

    #[tokio::test]
    async fn test_non_success_status_is_fetch_error() {
        let router = Router::new().route(
            "/projects/:id",
            get(|| async { (StatusCode::NOT_FOUND, Json(json!({ "detail": "Project not found" }))) }),
        );
        let api = client(&spawn_backend(router).await);

        assert_eq!(api.get_project(99).await.unwrap_err(), FetchError::Status(404));
    }

    #[tokio::test]
    async fn test_malformed_body_is_fetch_error() {
        let router = Router::new().route("/projects", get(|| async { "definitely not json" }));
        let api = client(&spawn_backend(router).await);

        assert!(matches!(api.list_projects().await, Err(FetchError::Malformed(_))));
    }

    #[tokio::test]
    async fn test_geocode_passes_location_query() {
        let router = Router::new().route(
            "/geocode",
            get(|Query(q): Query<HashMap<String, String>>| async move {
                if q.get("location").map(String::as_str) == Some("North Field, Utrecht") {
                    Json(json!({ "latitude": 52.09, "longitude": 5.12 }))
                } else {
                    Json(json!({ "latitude": null, "longitude": null }))
                }
            }),
        );
        let api = client(&spawn_backend(router).await);

        let hit = api.geocode("North Field, Utrecht").await.unwrap();
        assert_eq!(hit.map(|c| c.longitude), Some(5.12));
        assert_eq!(api.geocode("Atlantis").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_network_error() {
        let api = client("http://127.0.0.1:9");
        assert!(matches!(api.list_projects().await, Err(FetchError::Network(_))));
    }
}
