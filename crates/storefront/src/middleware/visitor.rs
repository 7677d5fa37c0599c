//! Visitor identification.
//!
//! Every browser is a visitor with its own cart. The visitor id is a uuid v4
//! minted on first contact and kept in the session.

use axum::{
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use cartkeeper_core::VisitorId;
use tower_sessions::Session;
use uuid::Uuid;

/// Session key holding the visitor id.
pub const VISITOR_KEY: &str = "visitor_id";

/// Extractor yielding the current visitor, minting one if needed.
///
/// # Example
///
/// ```rust,ignore
/// async fn handler(Visitor(visitor): Visitor) -> impl IntoResponse {
///     format!("Hello, {visitor}!")
/// }
/// ```
pub struct Visitor(pub VisitorId);

/// The session layer is missing or the session store failed.
pub struct VisitorRejection;

impl IntoResponse for VisitorRejection {
    fn into_response(self) -> Response {
        (StatusCode::INTERNAL_SERVER_ERROR, "Session unavailable").into_response()
    }
}

impl<S> FromRequestParts<S> for Visitor
where
    S: Send + Sync,
{
    type Rejection = VisitorRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // Get the session from extensions (set by SessionManagerLayer)
        let session = parts
            .extensions
            .get::<Session>()
            .ok_or(VisitorRejection)?;

        let visitor = match session.get::<VisitorId>(VISITOR_KEY).await {
            Ok(Some(visitor)) => visitor,
            Ok(None) => {
                let visitor = VisitorId::new(Uuid::new_v4().to_string());
                if let Err(e) = session.insert(VISITOR_KEY, &visitor).await {
                    tracing::error!(error = %e, "Failed to store visitor in session");
                    return Err(VisitorRejection);
                }
                visitor
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to read visitor from session");
                return Err(VisitorRejection);
            }
        };

        // Set in Sentry scope for error correlation
        sentry::configure_scope(|scope| {
            scope.set_tag("visitor", visitor.as_str());
        });
        Ok(Self(visitor))
    }
}
