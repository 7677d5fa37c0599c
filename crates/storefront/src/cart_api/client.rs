//! GraphQL implementation of [`CartService`].
//!
//! Uses `graphql_client` request bodies with `reqwest` 0.13 for HTTP. Nothing
//! here is cached: carts are mutable server state, and caching is the remote
//! engine's job.

use std::sync::Arc;

use cartkeeper_core::CartSessionId;
use graphql_client::{GraphQLQuery, Response};
use secrecy::{ExposeSecret, SecretString};
use tracing::instrument;

use super::conversions::{convert_cart, convert_envelope};
use super::queries::{
    AddCartItem, ClearCart, GetCart, RemoveCartItem, UpdateCartItem, add_cart_item, clear_cart,
    get_cart, remove_cart_item, update_cart_item,
};
use super::{
    AddLineInput, CartService, GraphQLError, MutationEnvelope, RemoteCart, RemoveLineInput,
    ServiceError, UpdateLineInput,
};
use crate::config::CartApiConfig;

/// Header carrying the cart session token.
pub const CART_SESSION_HEADER: &str = "X-Cart-Session";

/// Client for the remote cart GraphQL endpoint.
#[derive(Clone)]
pub struct GraphQlCartService {
    inner: Arc<GraphQlCartServiceInner>,
}

struct GraphQlCartServiceInner {
    client: reqwest::Client,
    endpoint: String,
    access_token: Option<SecretString>,
}

impl GraphQlCartService {
    /// Create a new cart service client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &CartApiConfig) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            inner: Arc::new(GraphQlCartServiceInner {
                client,
                endpoint: config.endpoint.to_string(),
                access_token: config.access_token.clone(),
            }),
        })
    }

    /// Execute a GraphQL operation under the given cart session.
    async fn execute<Q: GraphQLQuery>(
        &self,
        session: Option<&CartSessionId>,
        variables: Q::Variables,
    ) -> Result<Q::ResponseData, ServiceError>
    where
        Q::Variables: serde::Serialize,
    {
        let request_body = Q::build_query(variables);

        let mut request = self
            .inner
            .client
            .post(&self.inner.endpoint)
            .header("Content-Type", "application/json");
        if let Some(token) = &self.inner.access_token {
            request = request.bearer_auth(token.expose_secret());
        }
        if let Some(session) = session {
            request = request.header(CART_SESSION_HEADER, session.as_str());
        }

        let response = request.json(&request_body).send().await?;
        let status = response.status();

        // Check for rate limiting
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(1);
            return Err(ServiceError::RateLimited(retry_after));
        }

        // Get response body as text first for better error diagnostics
        let response_text = response.text().await?;

        if !status.is_success() {
            tracing::error!(
                status = %status,
                body = %response_text.chars().take(500).collect::<String>(),
                "Cart service returned non-success status"
            );
            return Err(ServiceError::Status {
                status: status.as_u16(),
                body: response_text.chars().take(200).collect(),
            });
        }

        let response: Response<Q::ResponseData> = match serde_json::from_str(&response_text) {
            Ok(r) => r,
            Err(e) => {
                tracing::error!(
                    error = %e,
                    body = %response_text.chars().take(500).collect::<String>(),
                    "Failed to parse cart service response"
                );
                return Err(ServiceError::Parse(e));
            }
        };

        if let Some(errors) = response.errors
            && !errors.is_empty()
        {
            tracing::debug!(errors = ?errors, "GraphQL errors in response");

            return Err(ServiceError::GraphQL(
                errors
                    .into_iter()
                    .map(|e| GraphQLError {
                        message: e.message,
                        path: e.path.map_or_else(Vec::new, |p| {
                            p.into_iter()
                                .map(|fragment| match fragment {
                                    graphql_client::PathFragment::Key(s) => s,
                                    graphql_client::PathFragment::Index(i) => i.to_string(),
                                })
                                .collect()
                        }),
                    })
                    .collect(),
            ));
        }

        response.data.ok_or_else(|| {
            ServiceError::GraphQL(vec![GraphQLError {
                message: "No data in response".to_string(),
                path: vec![],
            }])
        })
    }
}

impl CartService for GraphQlCartService {
    #[instrument(skip(self, input), fields(sku = %input.sku))]
    async fn add_item(
        &self,
        session: Option<&CartSessionId>,
        input: AddLineInput,
    ) -> Result<MutationEnvelope, ServiceError> {
        let data = self
            .execute::<AddCartItem>(session, add_cart_item::Variables { input })
            .await?;
        Ok(convert_envelope(data.add_cart_item))
    }

    #[instrument(skip(self, input), fields(line = %input.cart_item_id))]
    async fn update_item(
        &self,
        session: Option<&CartSessionId>,
        input: UpdateLineInput,
    ) -> Result<MutationEnvelope, ServiceError> {
        let data = self
            .execute::<UpdateCartItem>(session, update_cart_item::Variables { input })
            .await?;
        Ok(convert_envelope(data.update_cart_item))
    }

    #[instrument(skip(self, input), fields(line = %input.cart_item_id))]
    async fn remove_item(
        &self,
        session: Option<&CartSessionId>,
        input: RemoveLineInput,
    ) -> Result<MutationEnvelope, ServiceError> {
        let data = self
            .execute::<RemoveCartItem>(session, remove_cart_item::Variables { input })
            .await?;
        Ok(convert_envelope(data.remove_cart_item))
    }

    #[instrument(skip(self))]
    async fn clear(
        &self,
        session: Option<&CartSessionId>,
    ) -> Result<MutationEnvelope, ServiceError> {
        let data = self
            .execute::<ClearCart>(session, clear_cart::Variables {})
            .await?;
        Ok(convert_envelope(data.clear_cart))
    }

    #[instrument(skip(self), fields(session = %session))]
    async fn fetch(&self, session: &CartSessionId) -> Result<Option<RemoteCart>, ServiceError> {
        let data = self
            .execute::<GetCart>(Some(session), get_cart::Variables {})
            .await?;
        Ok(data.cart.map(convert_cart))
    }
}
