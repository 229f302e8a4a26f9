//! JSON-over-HTTP remote store client.
//!
//! Uses `reqwest` for transport. Every request carries the identity token in
//! the `token` header; responses are wrapped in a `{ "data": ... }` envelope
//! and converted into domain types by [`super::conversions`].

use std::sync::Arc;

use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::json;
use shopfront_core::{IdentityToken, ProductId, Quantity};
use tracing::{debug, instrument};
use url::Url;

use super::RemoteStore;
use super::conversions::{
    Envelope, WireCart, WireError, WireProductRef, convert_cart, convert_wishlist,
};
use crate::config::RemoteStoreConfig;
use crate::error::RemoteError;
use crate::model::{Cart, Product};

/// Maximum number of body characters kept in logs and error messages.
const BODY_LOG_LIMIT: usize = 500;

// =============================================================================
// HttpRemoteStore
// =============================================================================

/// Client for the remote store's REST API.
#[derive(Clone)]
pub struct HttpRemoteStore {
    inner: Arc<HttpRemoteStoreInner>,
}

struct HttpRemoteStoreInner {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpRemoteStore {
    /// Create a new client.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(config: &RemoteStoreConfig) -> Result<Self, RemoteError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        // Url::join drops the last path segment unless it ends with '/'
        let mut base_url = config.base_url.clone();
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self {
            inner: Arc::new(HttpRemoteStoreInner { client, base_url }),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, RemoteError> {
        self.inner
            .base_url
            .join(path)
            .map_err(|e| RemoteError::Rejected(format!("invalid path {path}: {e}")))
    }

    /// Execute a request and decode the response envelope.
    async fn execute<T: DeserializeOwned>(
        &self,
        identity: &IdentityToken,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<Envelope<T>, RemoteError> {
        let url = self.endpoint(path)?;

        let mut request = self
            .inner
            .client
            .request(method, url)
            .header("token", identity.expose())
            .header("Accept", "application/json");
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await?;
        let status = response.status();

        // Check for rate limiting
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(1);
            return Err(RemoteError::RateLimited(retry_after));
        }

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(RemoteError::Unauthorized);
        }

        // Get response body as text first for better error diagnostics
        let response_text = response.text().await?;

        if !status.is_success() {
            tracing::error!(
                status = %status,
                body = %truncate(&response_text),
                "Remote store returned non-success status"
            );
            let message = serde_json::from_str::<WireError>(&response_text)
                .ok()
                .and_then(|e| e.message)
                .unwrap_or_else(|| truncate(&response_text));
            return Err(RemoteError::Status {
                status: status.as_u16(),
                message,
            });
        }

        serde_json::from_str(&response_text).map_err(|e| {
            tracing::error!(
                error = %e,
                body = %truncate(&response_text),
                "Failed to parse remote store response"
            );
            RemoteError::Parse(e)
        })
    }

    async fn wishlist_call(
        &self,
        identity: &IdentityToken,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<Vec<Product>, RemoteError> {
        let envelope = self
            .execute::<Vec<WireProductRef>>(identity, method, path, body)
            .await?;
        let wishlist = convert_wishlist(envelope);
        debug!(items = wishlist.len(), "Wishlist response");
        Ok(wishlist)
    }

    async fn cart_call(
        &self,
        identity: &IdentityToken,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<Cart, RemoteError> {
        let envelope = self
            .execute::<WireCart>(identity, method, path, body)
            .await?;
        let cart = convert_cart(envelope);
        debug!(lines = cart.lines.len(), item_count = cart.item_count, "Cart response");
        Ok(cart)
    }
}

impl RemoteStore for HttpRemoteStore {
    #[instrument(skip(self, identity), fields(scope = %identity.scope()))]
    async fn fetch_wishlist(&self, identity: &IdentityToken) -> Result<Vec<Product>, RemoteError> {
        self.wishlist_call(identity, Method::GET, "wishlist", None)
            .await
    }

    #[instrument(skip(self, identity), fields(scope = %identity.scope(), product_id = %product_id))]
    async fn add_wishlist_item(
        &self,
        identity: &IdentityToken,
        product_id: &ProductId,
    ) -> Result<Vec<Product>, RemoteError> {
        let body = json!({ "productId": product_id });
        self.wishlist_call(identity, Method::POST, "wishlist", Some(body))
            .await
    }

    #[instrument(skip(self, identity), fields(scope = %identity.scope(), product_id = %product_id))]
    async fn remove_wishlist_item(
        &self,
        identity: &IdentityToken,
        product_id: &ProductId,
    ) -> Result<Vec<Product>, RemoteError> {
        let path = format!("wishlist/{}", urlencoding::encode(product_id.as_str()));
        self.wishlist_call(identity, Method::DELETE, &path, None)
            .await
    }

    #[instrument(skip(self, identity), fields(scope = %identity.scope()))]
    async fn fetch_cart(&self, identity: &IdentityToken) -> Result<Cart, RemoteError> {
        self.cart_call(identity, Method::GET, "cart", None).await
    }

    #[instrument(skip(self, identity), fields(scope = %identity.scope(), product_id = %product_id))]
    async fn add_cart_item(
        &self,
        identity: &IdentityToken,
        product_id: &ProductId,
    ) -> Result<Cart, RemoteError> {
        let body = json!({ "productId": product_id });
        self.cart_call(identity, Method::POST, "cart", Some(body))
            .await
    }

    #[instrument(
        skip(self, identity),
        fields(scope = %identity.scope(), product_id = %product_id, quantity = %quantity)
    )]
    async fn set_cart_item_quantity(
        &self,
        identity: &IdentityToken,
        product_id: &ProductId,
        quantity: Quantity,
    ) -> Result<Cart, RemoteError> {
        let path = format!("cart/{}", urlencoding::encode(product_id.as_str()));
        let body = json!({ "count": quantity.get() });
        self.cart_call(identity, Method::PUT, &path, Some(body))
            .await
    }

    #[instrument(skip(self, identity), fields(scope = %identity.scope(), product_id = %product_id))]
    async fn remove_cart_item(
        &self,
        identity: &IdentityToken,
        product_id: &ProductId,
    ) -> Result<Cart, RemoteError> {
        let path = format!("cart/{}", urlencoding::encode(product_id.as_str()));
        self.cart_call(identity, Method::DELETE, &path, None)
            .await
    }
}

fn truncate(body: &str) -> String {
    body.chars().take(BODY_LOG_LIMIT).collect()
}
