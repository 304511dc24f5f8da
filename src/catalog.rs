use futures::future;
use tracing::{error, info};

use crate::api::ApiService;
use crate::booking::replace_package;
use crate::error::ApiError;
use crate::models::{Destination, TravelPackage};

pub const LOAD_FAILED_MESSAGE: &str = "Failed to load data. Please try again later.";

// Featured destinations and packages shown on the landing page
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeaturedCatalog {
    pub destinations: Vec<Destination>,
    pub packages: Vec<TravelPackage>,
}

impl FeaturedCatalog {
    // Both lists are requested together; either failing fails the whole load
    pub async fn load(api: &ApiService) -> Result<Self, ApiError> {
        let result = future::try_join(
            api.get_featured_destinations(),
            api.get_featured_packages(),
        )
        .await;

        match result {
            Ok((destinations, packages)) => {
                info!(
                    destinations = destinations.len(),
                    packages = packages.len(),
                    "loaded featured catalog"
                );
                Ok(Self {
                    destinations,
                    packages,
                })
            }
            Err(e) => {
                error!(error = %e, "failed to load featured catalog");
                Err(ApiError::Other(LOAD_FAILED_MESSAGE.to_string()))
            }
        }
    }

    pub async fn refresh_package(&mut self, api: &ApiService, package_id: i64) -> Result<(), ApiError> {
        let fresh = api.get_package_by_id(package_id).await?;
        replace_package(&mut self.packages, fresh);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use crate::transport::mock_transport::MockTransport;
    use reqwest::Method;
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_load_featured_lists() {
        let mock = Arc::new(MockTransport::new());
        mock.respond_json(
            Method::GET,
            "/api/destinations/featured",
            200,
            json!([{"id": 1, "name": "Lisbon", "isFeatured": true}]),
        );
        mock.respond_json(
            Method::GET,
            "/api/packages/featured",
            200,
            json!([{"id": 10, "name": "Lisbon Weekend"}, {"id": 11, "name": "Porto Wine Tour"}]),
        );
        let api = ApiService::with_transport(&ClientConfig::default(), mock.clone()).unwrap();

        let catalog = FeaturedCatalog::load(&api).await.unwrap();

        assert_eq!(catalog.destinations.len(), 1);
        assert!(catalog.destinations[0].is_featured);
        assert_eq!(catalog.packages.len(), 2);
        assert_eq!(mock.request_count(), 2);
    }

    #[tokio::test]
    async fn test_any_failure_reports_generic_message() {
        let mock = Arc::new(MockTransport::new());
        mock.respond_json(Method::GET, "/api/destinations/featured", 200, json!([]));
        mock.respond_json(
            Method::GET,
            "/api/packages/featured",
            500,
            json!({"error": "database down"}),
        );
        let api = ApiService::with_transport(&ClientConfig::default(), mock.clone()).unwrap();

        let err = FeaturedCatalog::load(&api).await.unwrap_err();
        assert_eq!(err.to_string(), LOAD_FAILED_MESSAGE);
    }

    #[tokio::test]
    async fn test_refresh_package_after_booking() {
        let mock = Arc::new(MockTransport::new());
        mock.respond_json(
            Method::GET,
            "/api/packages/10",
            200,
            json!({"id": 10, "currentParticipants": 6}),
        );
        let api = ApiService::with_transport(&ClientConfig::default(), mock.clone()).unwrap();
        let mut catalog = FeaturedCatalog {
            destinations: vec![],
            packages: vec![TravelPackage {
                id: 10,
                current_participants: 3,
                ..Default::default()
            }],
        };

        catalog.refresh_package(&api, 10).await.unwrap();
        assert_eq!(catalog.packages[0].current_participants, 6);
    }
}
