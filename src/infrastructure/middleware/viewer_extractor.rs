// Viewer extractor - the authenticated caller of a request

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};

use crate::app_state::AppState;
use crate::core::strong_types::{DocId, SessionToken};
use crate::error::AppError;

/// Bearer token from the `Authorization` header, if any
fn bearer_token(headers: &HeaderMap) -> Result<Option<SessionToken>, AppError> {
    let Some(value) = headers.get(AUTHORIZATION) else {
        return Ok(None);
    };
    let value = value
        .to_str()
        .map_err(|_| AppError::BadValues("Authorization header is not valid text".to_string()))?;
    match value.strip_prefix("Bearer ") {
        Some(token) if !token.trim().is_empty() => Ok(Some(SessionToken::from(token.trim()))),
        _ => Err(AppError::Unauthorized(
            "Authorization must be a Bearer session token".to_string(),
        )),
    }
}

/// The logged-in user issuing the request.
///
/// Extraction fails with `Unauthorized` when no token is sent or the token
/// names no live session, so handlers taking a `Viewer` never run anonymously.
#[derive(Debug, Clone)]
pub struct Viewer {
    pub user: DocId,
    pub session: SessionToken,
}

impl FromRequestParts<AppState> for Viewer {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let session = bearer_token(&parts.headers)?
            .ok_or_else(|| AppError::Unauthorized("Must be logged in!".to_string()))?;
        let user = state.sessions.current_user(&session).await?;
        Ok(Viewer { user, session })
    }
}

/// Whatever session token the caller sent, validated or not
#[derive(Debug, Clone)]
pub struct SessionHeader(pub Option<SessionToken>);

impl<S> FromRequestParts<S> for SessionHeader
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(SessionHeader(bearer_token(&parts.headers)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_bearer_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers).unwrap(), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        assert_eq!(bearer_token(&headers).unwrap(), Some(SessionToken::from("abc")));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert!(matches!(bearer_token(&headers), Err(AppError::Unauthorized(_))));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert!(bearer_token(&headers).is_err());
    }
}
