// API access layer: the single gateway to the remote travel service
// Each public method is one request/response call. Nothing is cached, deduplicated or retried.

use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, ACCEPT, CONTENT_LENGTH, CONTENT_TYPE,
};
use reqwest::{Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::error::{ApiError, ClientError};
use crate::models::{
    ApiResponse, Booking, BookingStatus, BookingUpdate, CreateBookingRequest, Destination,
    LoginRequest, PackageType, PaymentStatus, RegisterRequest, TravelPackage, User, UserUpdate,
};
use crate::transport::{HttpRequest, HttpResponse, ReqwestTransport, Transport};

const API_KEY_HEADER: &str = "x-api-key";

// Options for a single call: method, extra headers, query pairs and an optional JSON body
#[derive(Debug, Clone)]
pub(crate) struct RequestOptions {
    method: Method,
    headers: HeaderMap,
    query: Vec<(&'static str, String)>,
    body: Option<String>,
}

impl RequestOptions {
    fn new(method: Method) -> Self {
        Self {
            method,
            headers: HeaderMap::new(),
            query: Vec::new(),
            body: None,
        }
    }

    pub(crate) fn get() -> Self {
        Self::new(Method::GET).header(ACCEPT, HeaderValue::from_static("application/json"))
    }

    pub(crate) fn with_method(method: Method) -> Self {
        Self::new(method)
    }

    pub(crate) fn json<B: Serialize + ?Sized>(method: Method, body: &B) -> Result<Self, ApiError> {
        let mut options = Self::new(method);
        options.body = Some(serde_json::to_string(body)?);
        Ok(options)
    }

    pub(crate) fn query(mut self, key: &'static str, value: impl ToString) -> Self {
        self.query.push((key, value.to_string()));
        self
    }

    pub(crate) fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }
}

// Shape of an error body; anything unparsable collapses to the default
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

pub struct ApiService {
    base_url: Url,
    default_headers: HeaderMap,
    transport: Arc<dyn Transport>,
}

impl ApiService {
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        let transport = ReqwestTransport::new()?;
        Self::with_transport(config, Arc::new(transport))
    }

    pub fn with_transport(
        config: &ClientConfig,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, ClientError> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| ClientError::ConfigError(format!("{}: {}", config.base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::ConfigError(format!(
                "{} cannot be used as a base URL",
                config.base_url
            )));
        }

        let mut default_headers = HeaderMap::new();
        default_headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(api_key) = &config.api_key {
            let value = HeaderValue::from_str(api_key)
                .map_err(|e| ClientError::ConfigError(format!("invalid API key: {}", e)))?;
            default_headers.insert(HeaderName::from_static(API_KEY_HEADER), value);
        }

        Ok(Self {
            base_url,
            default_headers,
            transport,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // Base URL with the given path segments appended (each one percent-encoded)
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::Other(format!("cannot extend {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    // Request primitive. Returns None when the server signals an empty body.
    async fn send(
        &self,
        path: &[&str],
        options: RequestOptions,
    ) -> Result<Option<HttpResponse>, ApiError> {
        let mut url = self.endpoint(path)?;
        if !options.query.is_empty() {
            url.query_pairs_mut().extend_pairs(options.query.iter());
        }

        let mut headers = self.default_headers.clone();
        headers.extend(options.headers);

        let request = HttpRequest {
            method: options.method,
            url,
            headers,
            body: options.body,
        };
        let method = request.method.clone();
        let url = request.url.clone();

        let response = self.transport.send(request).await?;

        if !response.status.is_success() {
            let error_body: ErrorBody = serde_json::from_slice(&response.body).unwrap_or_default();
            let message = error_body
                .error
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| format!("HTTP error! status: {}", response.status.as_u16()));
            warn!(%method, %url, status = response.status.as_u16(), %message, "remote error");
            return Err(ApiError::Remote {
                status_code: response.status.as_u16(),
                message,
            });
        }

        if is_empty_body(&response) {
            debug!(%method, %url, "empty response body");
            return Ok(None);
        }

        Ok(Some(response))
    }

    async fn request<T>(&self, path: &[&str], options: RequestOptions) -> Result<T, ApiError>
    where
        T: DeserializeOwned + Default,
    {
        match self.send(path, options).await? {
            Some(response) => Ok(serde_json::from_slice(&response.body)?),
            None => Ok(T::default()),
        }
    }

    // Authentication

    pub async fn register(&self, user: &RegisterRequest) -> Result<ApiResponse<User>, ApiError> {
        let options = RequestOptions::json(Method::POST, user)?;
        self.request(&["auth", "register"], options).await
    }

    pub async fn login(&self, credentials: &LoginRequest) -> Result<ApiResponse<User>, ApiError> {
        let options = RequestOptions::json(Method::POST, credentials)?;
        self.request(&["auth", "login"], options).await
    }

    pub async fn get_user_profile(&self, user_id: i64) -> Result<User, ApiError> {
        let id = user_id.to_string();
        self.request(&["auth", "profile", id.as_str()], RequestOptions::get())
            .await
    }

    pub async fn update_user_profile(
        &self,
        user_id: i64,
        update: &UserUpdate,
    ) -> Result<User, ApiError> {
        let id = user_id.to_string();
        let options = RequestOptions::json(Method::PUT, update)?;
        self.request(&["auth", "profile", id.as_str()], options).await
    }

    // Destinations

    pub async fn get_destinations(&self) -> Result<Vec<Destination>, ApiError> {
        self.request(&["destinations"], RequestOptions::get()).await
    }

    pub async fn get_featured_destinations(&self) -> Result<Vec<Destination>, ApiError> {
        self.request(&["destinations", "featured"], RequestOptions::get())
            .await
    }

    pub async fn get_destination_by_id(&self, id: i64) -> Result<Destination, ApiError> {
        let id = id.to_string();
        self.request(&["destinations", id.as_str()], RequestOptions::get())
            .await
    }

    pub async fn get_destinations_by_country(
        &self,
        country: &str,
    ) -> Result<Vec<Destination>, ApiError> {
        self.request(&["destinations", "country", country], RequestOptions::get())
            .await
    }

    pub async fn get_destinations_by_city(&self, city: &str) -> Result<Vec<Destination>, ApiError> {
        self.request(&["destinations", "city", city], RequestOptions::get())
            .await
    }

    pub async fn search_destinations(&self, query: &str) -> Result<Vec<Destination>, ApiError> {
        let options = RequestOptions::get().query("q", query);
        self.request(&["destinations", "search"], options).await
    }

    pub async fn get_destinations_by_price_range(
        &self,
        min_price: f64,
        max_price: f64,
    ) -> Result<Vec<Destination>, ApiError> {
        let options = RequestOptions::get()
            .query("minPrice", min_price)
            .query("maxPrice", max_price);
        self.request(&["destinations", "price-range"], options)
            .await
    }

    // Travel packages

    pub async fn get_travel_packages(&self) -> Result<Vec<TravelPackage>, ApiError> {
        self.request(&["packages"], RequestOptions::get()).await
    }

    pub async fn get_featured_packages(&self) -> Result<Vec<TravelPackage>, ApiError> {
        self.request(&["packages", "featured"], RequestOptions::get())
            .await
    }

    pub async fn get_package_by_id(&self, id: i64) -> Result<TravelPackage, ApiError> {
        let id = id.to_string();
        self.request(&["packages", id.as_str()], RequestOptions::get()).await
    }

    pub async fn get_packages_by_destination(
        &self,
        destination_id: i64,
    ) -> Result<Vec<TravelPackage>, ApiError> {
        let id = destination_id.to_string();
        self.request(&["packages", "destination", id.as_str()], RequestOptions::get())
            .await
    }

    pub async fn get_packages_by_type(
        &self,
        package_type: PackageType,
    ) -> Result<Vec<TravelPackage>, ApiError> {
        self.request(
            &["packages", "type", package_type.as_str()],
            RequestOptions::get(),
        )
        .await
    }

    pub async fn get_available_packages(
        &self,
        start_date: NaiveDate,
    ) -> Result<Vec<TravelPackage>, ApiError> {
        let options = RequestOptions::get().query("startDate", start_date.format("%Y-%m-%d"));
        self.request(&["packages", "available"], options).await
    }

    pub async fn get_available_packages_with_space(
        &self,
    ) -> Result<Vec<TravelPackage>, ApiError> {
        self.request(&["packages", "available-space"], RequestOptions::get())
            .await
    }

    pub async fn search_packages(&self, query: &str) -> Result<Vec<TravelPackage>, ApiError> {
        let options = RequestOptions::get().query("q", query);
        self.request(&["packages", "search"], options).await
    }

    pub async fn get_packages_by_price_range(
        &self,
        min_price: f64,
        max_price: f64,
    ) -> Result<Vec<TravelPackage>, ApiError> {
        let options = RequestOptions::get()
            .query("minPrice", min_price)
            .query("maxPrice", max_price);
        self.request(&["packages", "price-range"], options).await
    }

    // Bookings. List endpoints return a bare array, not a paginated envelope.

    pub async fn get_bookings(&self) -> Result<Vec<Booking>, ApiError> {
        self.request(&["bookings"], RequestOptions::get()).await
    }

    pub async fn get_bookings_by_user(&self, user_id: i64) -> Result<Vec<Booking>, ApiError> {
        let id = user_id.to_string();
        self.request(&["bookings", "user", id.as_str()], RequestOptions::get())
            .await
    }

    pub async fn get_booking_by_id(&self, id: i64) -> Result<Booking, ApiError> {
        let id = id.to_string();
        self.request(&["bookings", id.as_str()], RequestOptions::get()).await
    }

    pub async fn get_booking_by_reference(&self, reference: &str) -> Result<Booking, ApiError> {
        self.request(&["bookings", "reference", reference], RequestOptions::get())
            .await
    }

    pub async fn get_bookings_by_status(
        &self,
        status: BookingStatus,
    ) -> Result<Vec<Booking>, ApiError> {
        self.request(&["bookings", "status", status.as_str()], RequestOptions::get())
            .await
    }

    pub async fn get_bookings_by_payment_status(
        &self,
        status: PaymentStatus,
    ) -> Result<Vec<Booking>, ApiError> {
        self.request(
            &["bookings", "payment-status", status.as_str()],
            RequestOptions::get(),
        )
        .await
    }

    pub async fn get_bookings_by_date_range(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<Booking>, ApiError> {
        let options = RequestOptions::get()
            .query("startDate", start.format("%Y-%m-%dT%H:%M:%S"))
            .query("endDate", end.format("%Y-%m-%dT%H:%M:%S"));
        self.request(&["bookings", "date-range"], options).await
    }

    pub async fn get_confirmed_bookings_by_user(
        &self,
        user_id: i64,
    ) -> Result<Vec<Booking>, ApiError> {
        let id = user_id.to_string();
        self.request(
            &["bookings", "user", id.as_str(), "confirmed"],
            RequestOptions::get(),
        )
        .await
    }

    pub async fn create_booking(&self, booking: &CreateBookingRequest) -> Result<Booking, ApiError> {
        let options = RequestOptions::json(Method::POST, booking)?;
        self.request(&["bookings"], options).await
    }

    pub async fn update_booking(
        &self,
        id: i64,
        update: &BookingUpdate,
    ) -> Result<Booking, ApiError> {
        let id = id.to_string();
        let options = RequestOptions::json(Method::PUT, update)?;
        self.request(&["bookings", id.as_str()], options).await
    }

    // The body is the bare status string, e.g. "CONFIRMED"
    pub async fn update_booking_status(
        &self,
        id: i64,
        status: BookingStatus,
    ) -> Result<Booking, ApiError> {
        let id = id.to_string();
        let options = RequestOptions::json(Method::PATCH, &status)?;
        self.request(&["bookings", id.as_str(), "status"], options).await
    }

    pub async fn update_payment_status(
        &self,
        id: i64,
        status: PaymentStatus,
    ) -> Result<Booking, ApiError> {
        let id = id.to_string();
        let options = RequestOptions::json(Method::PATCH, &status)?;
        self.request(&["bookings", id.as_str(), "payment-status"], options)
            .await
    }

    pub async fn cancel_booking(&self, id: i64) -> Result<Booking, ApiError> {
        let id = id.to_string();
        self.request(
            &["bookings", id.as_str(), "cancel"],
            RequestOptions::with_method(Method::PATCH),
        )
        .await
    }

    pub async fn delete_booking(&self, id: i64) -> Result<(), ApiError> {
        let id = id.to_string();
        self.send(&["bookings", id.as_str()], RequestOptions::with_method(Method::DELETE))
            .await?;
        Ok(())
    }
}

fn is_empty_body(response: &HttpResponse) -> bool {
    response.status == StatusCode::NO_CONTENT
        || response
            .headers
            .get(CONTENT_LENGTH)
            .map_or(false, |len| len.as_bytes() == b"0")
}
