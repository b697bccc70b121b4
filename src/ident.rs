use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
};
use uuid::Uuid;

/// Caller identity, taken from the `X-User-Id` header the upstream gateway
/// sets after authenticating the request. This service never sees
/// credentials.
#[derive(Debug)]
pub struct UserId(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for UserId
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, String);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get("x-user-id")
            .and_then(|v| v.to_str().ok())
            .ok_or((
                StatusCode::UNAUTHORIZED,
                "Missing X-User-Id header".to_string(),
            ))?;

        let id = Uuid::parse_str(raw).map_err(|_| {
            (
                StatusCode::UNAUTHORIZED,
                "Invalid X-User-Id header".to_string(),
            )
        })?;

        Ok(UserId(id))
    }
}
