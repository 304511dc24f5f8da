// Search and filter orchestration
// Picks the remote endpoint for a query and applies the filters the service doesn't support itself.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::api::ApiService;
use crate::booking::replace_package;
use crate::error::ApiError;
use crate::models::{Destination, PackageType, Priced, TravelPackage};
use crate::sequencer::RequestSequencer;

pub const EMPTY_CRITERIA_MESSAGE: &str = "Please enter search criteria";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchMode {
    #[default]
    Destinations,
    Packages,
}

// Inclusive price bounds; a missing minimum is 0 and a missing maximum is unbounded
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceRange {
    pub min: f64,
    pub max: f64,
}

impl PriceRange {
    pub fn new(min: Option<f64>, max: Option<f64>) -> Self {
        Self {
            min: min.unwrap_or(0.0),
            max: max.unwrap_or(f64::INFINITY),
        }
    }

    pub fn contains(&self, price: f64) -> bool {
        self.min <= price && price <= self.max
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchCriteria {
    pub term: String,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    // Only applies to package searches
    pub package_type: Option<PackageType>,
}

impl SearchCriteria {
    pub fn text(term: impl Into<String>) -> Self {
        Self {
            term: term.into(),
            ..Default::default()
        }
    }

    // Builds criteria from raw form fields. Blank fields are unset.
    pub fn from_inputs(
        term: &str,
        min_price: &str,
        max_price: &str,
        package_type: &str,
    ) -> Result<Self, ApiError> {
        let package_type = match package_type.trim() {
            "" => None,
            value => Some(PackageType::parse(value).ok_or_else(|| {
                ApiError::validation(format!("Unknown package type: {}", value))
            })?),
        };

        Ok(Self {
            term: term.to_string(),
            min_price: parse_price(min_price, "Min price")?,
            max_price: parse_price(max_price, "Max price")?,
            package_type,
        })
    }

    pub fn query(&self) -> Option<&str> {
        Some(self.term.trim()).filter(|t| !t.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.query().is_none()
            && self.min_price.is_none()
            && self.max_price.is_none()
            && self.package_type.is_none()
    }

    // Some only when at least one bound was given
    pub fn price_range(&self) -> Option<PriceRange> {
        if self.min_price.is_none() && self.max_price.is_none() {
            return None;
        }
        Some(PriceRange::new(self.min_price, self.max_price))
    }
}

fn parse_price(raw: &str, field: &str) -> Result<Option<f64>, ApiError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    match raw.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(Some(value)),
        _ => Err(ApiError::validation(format!(
            "{} must be a number: {}",
            field, raw
        ))),
    }
}

pub fn filter_by_price<T: Priced>(items: Vec<T>, range: &PriceRange) -> Vec<T> {
    items
        .into_iter()
        .filter(|item| range.contains(item.price()))
        .collect()
}

pub fn filter_by_type(packages: Vec<TravelPackage>, package_type: PackageType) -> Vec<TravelPackage> {
    packages
        .into_iter()
        .filter(|p| p.package_type == package_type)
        .collect()
}

// Text search when there is a query, otherwise the full list; then the price filter
pub async fn find_destinations(
    api: &ApiService,
    criteria: &SearchCriteria,
) -> Result<Vec<Destination>, ApiError> {
    let mut destinations = match criteria.query() {
        Some(query) => api.search_destinations(query).await?,
        None => api.get_destinations().await?,
    };
    if let Some(range) = criteria.price_range() {
        destinations = filter_by_price(destinations, &range);
    }
    Ok(destinations)
}

pub async fn find_packages(
    api: &ApiService,
    criteria: &SearchCriteria,
) -> Result<Vec<TravelPackage>, ApiError> {
    let mut packages = match criteria.query() {
        Some(query) => api.search_packages(query).await?,
        None => api.get_travel_packages().await?,
    };
    if let Some(range) = criteria.price_range() {
        packages = filter_by_price(packages, &range);
    }
    if let Some(package_type) = criteria.package_type {
        packages = filter_by_type(packages, package_type);
    }
    Ok(packages)
}

#[derive(Debug, Clone, Default)]
pub struct SearchState {
    pub mode: SearchMode,
    pub destinations: Vec<Destination>,
    pub packages: Vec<TravelPackage>,
    pub loading: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    Destinations(Vec<Destination>),
    Packages(Vec<TravelPackage>),
    // A newer search started before this one finished; its results were dropped
    Superseded,
}

pub struct SearchController {
    api: Arc<ApiService>,
    sequencer: RequestSequencer,
    state: Mutex<SearchState>,
}

impl SearchController {
    pub fn new(api: Arc<ApiService>) -> Self {
        Self {
            api,
            sequencer: RequestSequencer::new(),
            state: Mutex::new(SearchState::default()),
        }
    }

    pub fn mode(&self) -> SearchMode {
        self.state.lock().mode
    }

    pub fn set_mode(&self, mode: SearchMode) {
        self.state.lock().mode = mode;
    }

    pub fn state(&self) -> SearchState {
        self.state.lock().clone()
    }

    pub fn destinations(&self) -> Vec<Destination> {
        self.state.lock().destinations.clone()
    }

    pub fn packages(&self) -> Vec<TravelPackage> {
        self.state.lock().packages.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.state.lock().loading
    }

    pub fn error(&self) -> Option<String> {
        self.state.lock().error.clone()
    }

    pub async fn search(&self, criteria: &SearchCriteria) -> Result<SearchOutcome, ApiError> {
        if criteria.is_empty() {
            self.state.lock().error = Some(EMPTY_CRITERIA_MESSAGE.to_string());
            return Err(ApiError::validation(EMPTY_CRITERIA_MESSAGE));
        }

        let generation = self.sequencer.begin();
        let mode = {
            let mut state = self.state.lock();
            state.loading = true;
            state.error = None;
            state.mode
        };

        let result = match mode {
            SearchMode::Destinations => find_destinations(&self.api, criteria)
                .await
                .map(SearchOutcome::Destinations),
            SearchMode::Packages => find_packages(&self.api, criteria)
                .await
                .map(SearchOutcome::Packages),
        };

        if !self.sequencer.is_current(generation) {
            debug!(?generation, ?mode, "discarding superseded search response");
            return Ok(SearchOutcome::Superseded);
        }

        let mut state = self.state.lock();
        state.loading = false;
        match result {
            Ok(outcome) => {
                match &outcome {
                    SearchOutcome::Destinations(found) => state.destinations = found.clone(),
                    SearchOutcome::Packages(found) => state.packages = found.clone(),
                    SearchOutcome::Superseded => {}
                }
                Ok(outcome)
            }
            Err(e) => {
                state.error = Some(e.to_string());
                Err(e)
            }
        }
    }

    // Drops both result sets and any error; a search still in flight is discarded when it lands
    pub fn clear(&self) {
        self.sequencer.invalidate();
        let mut state = self.state.lock();
        state.destinations.clear();
        state.packages.clear();
        state.loading = false;
        state.error = None;
    }

    // Refetch one package (e.g. after a booking) and replace the local copy
    pub async fn refresh_package(&self, package_id: i64) -> Result<(), ApiError> {
        let fresh = self.api.get_package_by_id(package_id).await?;
        replace_package(&mut self.state.lock().packages, fresh);
        Ok(())
    }
}
