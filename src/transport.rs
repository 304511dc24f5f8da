// HTTP seam between the API layer and the network
// The API layer only ever sees a fully-read response; status handling lives above this trait.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::HeaderMap;
use reqwest::{Client, Method, StatusCode, Url};
use tracing::{debug, error};

use crate::error::{ApiError, ClientError};

#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<String>,
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

#[async_trait]
pub trait Transport: Send + Sync + 'static {
    // One request, one response. No retry, no timeout, no cancellation.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ApiError>;
}

pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, ClientError> {
        let client = Client::builder()
            .build()
            .map_err(|e| ClientError::InitError(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        debug!(method = %request.method, url = %request.url, "sending request");

        let mut builder = self
            .client
            .request(request.method.clone(), request.url.clone())
            .headers(request.headers);
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(|e| {
            error!(method = %request.method, url = %request.url, error = %e, "API request failed");
            ApiError::from(e)
        })?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(|e| {
            error!(url = %request.url, error = %e, "failed to read response body");
            ApiError::from(e)
        })?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}
