use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("bearer token is invalid: {0}")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),
    #[error("bearer token has no subject claim")]
    MissingSubject,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Option<String>,
    pub exp: u64,
}

/// Pulls a bearer credential off the upgrade request: `Authorization`
/// header first, then the `token` query parameter.
pub fn bearer_from_request(headers: &HeaderMap, token_param: Option<&str>) -> Option<String> {
    if let Some(value) = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()) {
        if value.len() > 7 && value[..7].eq_ignore_ascii_case("bearer ") {
            return Some(value[7..].to_string());
        }
    }
    token_param.map(|t| t.to_string())
}

/// Validates an HS256 bearer token and returns its subject. This is the
/// whole identity contract: validate or reject, nothing more.
pub fn verify_bearer(token: &str, secret: &SecretString) -> Result<String, AuthError> {
    let key = DecodingKey::from_secret(secret.expose_secret().as_bytes());
    let data = decode::<Claims>(token, &key, &Validation::new(Algorithm::HS256))?;
    data.claims.sub.ok_or(AuthError::MissingSubject)
}
