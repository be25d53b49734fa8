//! Request extractors.
//!
//! The upstream auth layer resolves the session and forwards the caller as
//! two headers; [`Identity`] is rebuilt from them on every request.
//!
//! [`ApiJson`] and [`ApiQuery`] wrap axum's `Json` and `Query` so that a
//! body or query string that fails to deserialize is reported through
//! [`SettlementError`] like every other failure. A bad amount maps to
//! `invalid_amount`, anything else to `invalid_request`.

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{FromRequest, FromRequestParts, OptionalFromRequest, Query, Request};
use axum::http::HeaderMap;
use axum::http::request::Parts;
use serde::de::DeserializeOwned;

use crate::domain::{AMOUNT_ERROR_TAG, ActorId, Identity, Role};
use crate::error::SettlementError;

/// Header carrying the caller role (`brand`, `creator` or `admin`).
pub const ROLE_HEADER: &str = "x-actor-role";

/// Header carrying the caller account UUID.
pub const ACTOR_ID_HEADER: &str = "x-actor-id";

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Result<&'a str, SettlementError> {
    headers
        .get(name)
        .ok_or_else(|| SettlementError::Unauthenticated(format!("missing {name} header")))?
        .to_str()
        .map(str::trim)
        .map_err(|_| SettlementError::Unauthenticated(format!("{name} is not valid text")))
}

/// Reads the caller identity from request headers.
///
/// # Errors
///
/// Returns [`SettlementError::Unauthenticated`] if a header is missing or
/// malformed.
pub fn identity_from_headers(headers: &HeaderMap) -> Result<Identity, SettlementError> {
    let role: Role = header(headers, ROLE_HEADER)?
        .parse()
        .map_err(|_| SettlementError::Unauthenticated("unknown actor role".to_string()))?;
    let actor_id = header(headers, ACTOR_ID_HEADER)?
        .parse::<uuid::Uuid>()
        .map_err(|_| SettlementError::Unauthenticated("x-actor-id is not a UUID".to_string()))?;
    Ok(Identity::new(role, ActorId::from_uuid(actor_id)))
}

impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = SettlementError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        identity_from_headers(&parts.headers)
    }
}

/// JSON request body whose rejection is a [`SettlementError`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiJson<T>(pub T);

/// Query string whose rejection is a [`SettlementError`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiQuery<T>(pub T);

fn deserialize_failure(text: String) -> SettlementError {
    if text.contains(AMOUNT_ERROR_TAG) {
        SettlementError::InvalidAmount(text)
    } else {
        SettlementError::InvalidRequest(text)
    }
}

impl From<JsonRejection> for SettlementError {
    fn from(rejection: JsonRejection) -> Self {
        deserialize_failure(rejection.body_text())
    }
}

impl From<QueryRejection> for SettlementError {
    fn from(rejection: QueryRejection) -> Self {
        deserialize_failure(rejection.body_text())
    }
}

impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = SettlementError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = <Json<T> as FromRequest<S>>::from_request(req, state).await?;
        Ok(Self(value))
    }
}

impl<S, T> OptionalFromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = SettlementError;

    async fn from_request(req: Request, state: &S) -> Result<Option<Self>, Self::Rejection> {
        let body = <Json<T> as OptionalFromRequest<S>>::from_request(req, state).await?;
        Ok(body.map(|Json(value)| Self(value)))
    }
}

impl<S, T> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = SettlementError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = <Query<T> as FromRequestParts<S>>::from_request_parts(parts, state).await?;
        Ok(Self(value))
    }
}
