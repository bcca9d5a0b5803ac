use std::future::{ready, Ready};

use actix_web::http::header;
use actix_web::web::Data;
use actix_web::{FromRequest, HttpRequest};
use chrono::{Duration, Utc};
use diesel::backend::Backend;
use diesel::deserialize::{self, FromSql, FromSqlRow};
use diesel::expression::AsExpression;
use diesel::serialize::{self, IsNull, Output, ToSql};
use diesel::sql_types::Text;
use diesel::sqlite::Sqlite;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::services::db_models::User;
use crate::services::db_utils::AppState;
use crate::types::ApiError;

pub const TOKEN_TTL_HOURS: i64 = 24;

/// Capability tag carried by an authenticated caller. Stored as text in the
/// users table and inside token claims, but only ever compared as this enum.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsExpression, FromSqlRow,
)]
#[diesel(sql_type = Text)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Viewer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Viewer => "viewer",
        }
    }
}

impl ToSql<Text, Sqlite> for Role {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Sqlite>) -> serialize::Result {
        out.set_value(self.as_str());
        Ok(IsNull::No)
    }
}

impl FromSql<Text, Sqlite> for Role {
    fn from_sql(bytes: <Sqlite as Backend>::RawValue<'_>) -> deserialize::Result<Self> {
        let value = <String as FromSql<Text, Sqlite>>::from_sql(bytes)?;
        match value.as_str() {
            "admin" => Ok(Role::Admin),
            "viewer" => Ok(Role::Viewer),
            other => Err(format!("unrecognized role: {other}").into()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,
    pub username: String,
    pub role: Role,
    pub exp: i64,
    pub iat: i64,
}

pub fn issue_token(user: &User, secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now();
    let claims = Claims {
        sub: user.id,
        username: user.username.clone(),
        role: user.role,
        exp: (now + Duration::hours(TOKEN_TTL_HOURS)).timestamp(),
        iat: now.timestamp(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

pub fn validate_token(token: &str, secret: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )
    .map(|data| data.claims)
}

pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    use argon2::password_hash::{rand_core::OsRng, PasswordHasher, SaltString};
    use argon2::Argon2;

    let salt = SaltString::generate(&mut OsRng);
    Ok(Argon2::default()
        .hash_password(password.as_bytes(), &salt)?
        .to_string())
}

pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    use argon2::password_hash::{PasswordHash, PasswordVerifier};
    use argon2::Argon2;

    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

/// Verified caller identity. A missing Authorization header is 401; a token
/// that fails validation is 403.
#[derive(Debug, Clone)]
pub struct AuthedUser {
    pub id: i64,
    pub username: String,
    pub role: Role,
}

impl FromRequest for AuthedUser {
    type Error = ApiError;
    type Future = Ready<Result<Self, ApiError>>;

    fn from_request(req: &HttpRequest, _payload: &mut actix_web::dev::Payload) -> Self::Future {
        ready(extract_user(req))
    }
}

fn extract_user(req: &HttpRequest) -> Result<AuthedUser, ApiError> {
    let state = req
        .app_data::<Data<AppState>>()
        .ok_or_else(|| ApiError::Internal("application state missing".to_owned()))?;

    let header_value = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| ApiError::Unauthorized("Authorization header missing".to_owned()))?;

    let token = header_value
        .strip_prefix("Bearer ")
        .ok_or_else(|| ApiError::Unauthorized("Authorization header missing".to_owned()))?;

    let claims = validate_token(token, &state.config.jwt_secret)
        .map_err(|_| ApiError::Forbidden("Invalid or expired token".to_owned()))?;

    Ok(AuthedUser {
        id: claims.sub,
        username: claims.username,
        role: claims.role,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user() -> User {
        User {
            id: 7,
            username: "admin".to_owned(),
            password: "unused".to_owned(),
            role: Role::Admin,
        }
    }

    #[test]
    fn issued_tokens_validate_and_carry_the_identity() {
        let token = issue_token(&sample_user(), "test-secret").unwrap();
        let claims = validate_token(&token, "test-secret").unwrap();
        assert_eq!(claims.sub, 7);
        assert_eq!(claims.username, "admin");
        assert_eq!(claims.role, Role::Admin);
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn tokens_signed_with_another_secret_are_rejected() {
        let token = issue_token(&sample_user(), "test-secret").unwrap();
        assert!(validate_token(&token, "other-secret").is_err());
    }

    #[test]
    fn password_hashing_round_trips() {
        let hash = hash_password("hunter2").unwrap();
        assert!(verify_password("hunter2", &hash));
        assert!(!verify_password("hunter3", &hash));
        assert!(!verify_password("hunter2", "not-a-phc-string"));
    }
}
