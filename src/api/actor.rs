use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap},
};
use std::convert::Infallible;

use crate::model::Actor;

pub const USER_HEADER: &str = "x-user-id";

/// Axum extractor for the [`Actor`] of a request.
///
/// The `X-User-Id` header is recorded verbatim in the journal. Requests
/// without it are attributed to nobody.
#[async_trait]
impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(actor_from_headers(&parts.headers))
    }
}

pub fn actor_from_headers(headers: &HeaderMap) -> Actor {
    match extract_header_value(headers, USER_HEADER) {
        Some(user) => Actor::named(user),
        None => Actor::anonymous(),
    }
}

fn extract_header_value(headers: &HeaderMap, header_name: &str) -> Option<String> {
    headers
        .get(header_name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(|value| value.to_string())
}
