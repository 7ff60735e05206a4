//! HTTP client for the order-creation endpoint.

use core::time::Duration;

use reqwest::header::CONTENT_TYPE;
use secrecy::{ExposeSecret, SecretString};
use url::Url;

use super::OrderBackend;
use crate::error::{FoodCartError, Result};
use crate::models::{CreateOrderRequest, OrderConfirmation, OrderEnvelope};

/// Order endpoint, relative to the base URL.
const ORDERS_PATH: &str = "orders";

/// Header mirroring the request body's idempotency key.
const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

/// Request timeout used when none is configured.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Builder for constructing an [`OrderClient`].
#[derive(Debug)]
pub struct OrderClientBuilder {
    /// Backend base URL, e.g. `https://api.example.com/v1/`.
    base_url: Option<String>,
    /// Bearer token, if the backend requires one.
    token: Option<SecretString>,
    /// Whole-request timeout.
    timeout: Option<Duration>,
}

impl OrderClientBuilder {
    /// Sets the backend base URL. Orders are posted to `<base_url>/orders`.
    #[inline]
    #[must_use]
    pub fn base_url<T: Into<String>>(mut self, url: T) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the bearer token sent with every request.
    #[inline]
    #[must_use]
    pub fn token<T: Into<String>>(mut self, token: T) -> Self {
        self.token = Some(SecretString::from(token.into()));
        self
    }

    /// Overrides the request timeout (default 30 seconds).
    #[inline]
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Builds the client.
    ///
    /// # Errors
    ///
    /// Returns [`FoodCartError::InvalidBaseUrl`] if the base URL is missing
    /// or cannot be parsed.
    /// Returns [`FoodCartError::Http`] if the HTTP client fails to build.
    #[inline]
    #[tracing::instrument(skip_all)]
    pub fn build(self) -> Result<OrderClient> {
        let mut base = Url::parse(self.base_url.as_deref().unwrap_or_default())?;
        if !base.path().ends_with('/') {
            let with_slash = format!("{}/", base.path());
            base.set_path(&with_slash);
        }
        let orders_url = base.join(ORDERS_PATH)?;
        tracing::debug!(url = %orders_url, "building order client");
        let http = reqwest::Client::builder()
            .timeout(self.timeout.unwrap_or(DEFAULT_TIMEOUT))
            .build()?;

        Ok(OrderClient {
            http,
            token: self.token,
            orders_url,
        })
    }
}

/// Async client for the order backend.
///
/// Use [`OrderClient::builder()`] to construct an instance.
#[derive(Debug)]
pub struct OrderClient {
    /// Underlying HTTP client.
    http: reqwest::Client,
    /// Bearer access token.
    token: Option<SecretString>,
    /// Fully resolved order endpoint.
    orders_url: Url,
}

impl OrderClient {
    /// Creates a new builder for configuring the client.
    #[inline]
    #[must_use]
    pub const fn builder() -> OrderClientBuilder {
        OrderClientBuilder {
            base_url: None,
            token: None,
            timeout: None,
        }
    }

    /// Sends the order and maps the response.
    ///
    /// A 2xx or 4xx response carrying `{ success: false, error }` is a
    /// business rejection. Everything else that is not a success envelope
    /// (timeouts, 5xx, undecodable bodies) is reported as a transport-class
    /// error.
    #[tracing::instrument(skip_all, fields(key = %request.idempotency_key))]
    async fn post_order(&self, request: &CreateOrderRequest) -> Result<OrderConfirmation> {
        let mut builder = self
            .http
            .post(self.orders_url.clone())
            .header(CONTENT_TYPE, "application/json")
            .header(IDEMPOTENCY_HEADER, request.idempotency_key.as_str())
            .json(request);
        if let Some(token) = self.token.as_ref() {
            builder = builder.bearer_auth(token.expose_secret());
        }
        tracing::trace!(lines = request.items.len(), "sending order");
        let response = builder.send().await?;

        let status = response.status();
        tracing::debug!(status = %status, "received response");
        let body = response.text().await?;
        tracing::trace!(body_len = body.len(), "parsing response body");

        if status.is_success() {
            let envelope: OrderEnvelope = serde_json::from_str(&body)?;
            return envelope.into_result(status.as_u16());
        }
        if status.is_client_error()
            && let Ok(envelope) = serde_json::from_str::<OrderEnvelope>(&body)
            && !envelope.success
        {
            return envelope.into_result(status.as_u16());
        }
        let message = if body.is_empty() {
            "unknown error".to_owned()
        } else {
            body
        };
        tracing::debug!(status = status.as_u16(), message = %message, "API error");
        Err(FoodCartError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

impl OrderBackend for OrderClient {
    #[inline]
    async fn create_order(&self, request: &CreateOrderRequest) -> Result<OrderConfirmation> {
        self.post_order(request).await
    }
}
