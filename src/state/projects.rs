/// Project list filtering and the new-project form
use crate::api::models::{NewProject, ProjectSummary};
use crate::api::ApiClient;
use crate::error::FetchError;

pub const GEOCODE_FAILED: &str = "Could not fetch coordinates for the location";

/// Projects whose name or status contains `query` (case-insensitive)
pub fn filter_projects<'a>(projects: &'a [ProjectSummary], query: &str) -> Vec<&'a ProjectSummary> {
    let query = query.trim().to_lowercase();
    projects
        .iter()
        .filter(|p| {
            query.is_empty()
                || p.name.to_lowercase().contains(&query)
                || p.status().to_lowercase().contains(&query)
        })
        .collect()
}

/// Editable fields of the "New Project" screen
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewProjectForm {
    pub name: String,
    pub location: String,
    pub description: String,
    pub submitting: bool,
    pub error: Option<String>,
}

impl NewProjectForm {
    /// First problem with the form, if any
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("Project name is required".to_string());
        }
        if self.location.trim().is_empty() {
            return Err("Location is required".to_string());
        }
        Ok(())
    }
}

/// Why creating a project failed
#[derive(Debug, Clone, PartialEq)]
pub enum CreateError {
    Geocode,
    Fetch(FetchError),
}

impl CreateError {
    pub fn user_message(&self) -> String {
        match self {
            CreateError::Geocode => GEOCODE_FAILED.to_string(),
            CreateError::Fetch(e) => format!("Failed to create project. ({e})"),
        }
    }
}

/// Geocode the location and create the project
pub async fn create_project(
    api: ApiClient,
    name: String,
    location: String,
    description: String,
) -> Result<ProjectSummary, CreateError> {
    let coordinates = match api.geocode(&location).await {
        Ok(Some(c)) => c,
        Ok(None) => return Err(CreateError::Geocode),
        Err(e) => {
            tracing::warn!("Geocoding '{}' failed: {}", location, e);
            return Err(CreateError::Geocode);
        }
    };

    let project = NewProject {
        name: name.trim().to_string(),
        location: location.trim().to_string(),
        description: description.trim().to_string(),
        latitude: coordinates.latitude,
        longitude: coordinates.longitude,
    };
    let created = api
        .create_project(&project)
        .await
        .map_err(CreateError::Fetch)?;
    tracing::info!("✅ Created project {} ({})", created.id, created.name);
    Ok(created)
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
    use std::time::Duration;

    fn project(id: i64, name: &str) -> ProjectSummary {
        ProjectSummary {
            id,
            name: name.to_string(),
            location: None,
            description: None,
            created_at: None,
        }
    }

    #[test]
    fn test_filter_by_name_and_status() {
        let projects = vec![project(1, "North Orchard"), project(2, "South Vineyard")];

        let hits = filter_projects(&projects, "orch");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, 1);

        assert_eq!(filter_projects(&projects, "ACTIVE").len(), 2);
        assert_eq!(filter_projects(&projects, "  ").len(), 2);
        assert!(filter_projects(&projects, "wheat").is_empty());
    }

    #[test]
    fn test_form_requires_name_and_location() {
        let mut form = NewProjectForm::default();
        assert!(form.validate().is_err());
        form.name = "North".to_string();
        assert_eq!(form.validate().unwrap_err(), "Location is required");
        form.location = "Utrecht".to_string();
        assert!(form.validate().is_ok());
    }

    #[tokio::test]
    async fn test_unknown_location_is_geocode_error() {
        let router = Router::new().route(
            "/geocode",
            get(|| async { Json(json!({ "latitude": null, "longitude": null })) }),
        );
        let api = ApiClient::new(&spawn_backend(router).await, Duration::from_secs(5)).unwrap();

        let err = create_project(api, "A".into(), "Nowhere".into(), String::new())
            .await
            .unwrap_err();
        assert_eq!(err.user_message(), GEOCODE_FAILED);
    }

    #[tokio::test]
    async fn test_create_posts_coordinates() {
        let router = Router::new()
            .route(
                "/geocode",
                get(|| async { Json(json!({ "latitude": 52.0, "longitude": 5.0 })) }),
            )
            .route(
                "/projects",
                post(|Json(body): Json<serde_json::Value>| async move {
                    Json(json!({
                        "id": 11,
                        "name": body["name"],
                        "location": body["location"],
                        "description": format!("{},{}", body["latitude"], body["longitude"])
                    }))
                }),
            );
        let api = ApiClient::new(&spawn_backend(router).await, Duration::from_secs(5)).unwrap();

        let created = create_project(api, " North ".into(), "Utrecht".into(), String::new())
            .await
            .unwrap();
        assert_eq!(created.id, 11);
        assert_eq!(created.name, "North");
        assert_eq!(created.description.as_deref(), Some("52.0,5.0"));
    }
}
