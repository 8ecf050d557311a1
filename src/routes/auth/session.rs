use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
};
use axum_extra::extract::cookie::CookieJar;
use uuid::Uuid;

use crate::routes::auth::claims::Claims;
use crate::utils::jwt::{decode_jwt, JwtKeyProvider};

#[derive(Debug, PartialEq)]
pub struct AuthSession(pub Claims);

impl AuthSession {
    /// Authenticated user id; tokens without a UUID subject are rejected at extraction.
    pub fn user_id(&self) -> Uuid {
        self.0.user_id().unwrap_or_default()
    }
}

fn bearer_token(parts: &Parts) -> Option<String> {
    parts
        .headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(|t| t.trim().to_string())
}

impl<S> FromRequestParts<S> for AuthSession
where
    S: JwtKeyProvider + Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let token = jar
            .get("auth_token")
            .map(|c| c.value().to_string())
            .or_else(|| bearer_token(parts))
            .ok_or(StatusCode::UNAUTHORIZED)?;

        let claims = decode_jwt(
            &token,
            state.jwt_keys(),
            state.jwt_issuer(),
            state.jwt_audience(),
        )
        .map_err(|_| StatusCode::UNAUTHORIZED)?
        .claims;
        if claims.user_id().is_none() {
            return Err(StatusCode::UNAUTHORIZED);
        }

        Ok(AuthSession(claims))
    }
}
