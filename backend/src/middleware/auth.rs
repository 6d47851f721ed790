//! Authentication middleware
//!
//! Bearer JWT verification and role checks. Tokens are issued elsewhere;
//! this service only verifies them with the shared secret.

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::{IntoResponse, Response},
};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use shared::{Actor, Role, UserId};

use crate::error::{AppError, AppResult};
use crate::AppState;

/// Authenticated user information extracted from JWT
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: UserId,
    pub role: Role,
}

impl AuthUser {
    /// The identity movements and imports are attributed to
    pub fn actor(&self) -> Actor {
        Actor::user(self.user_id, self.role)
    }
}

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: Role,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    pub fn new(user_id: UserId, role: Role, ttl: chrono::Duration) -> Self {
        let now = chrono::Utc::now();
        Self {
            sub: user_id.to_string(),
            role,
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
        }
    }
}

/// Sign claims with the shared secret
pub fn encode_jwt(claims: &Claims, secret: &str) -> AppResult<String> {
    encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(e.into()))
}

/// Decode and validate JWT token
pub fn decode_jwt(token: &str, secret: &str) -> AppResult<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| {
        tracing::debug!("Rejected token: {}", e);
        AppError::InvalidToken
    })
}

/// Authentication middleware that validates JWT tokens and stores the
/// [`AuthUser`] in the request extensions
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let auth_header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let token = match auth_header.and_then(|h| h.strip_prefix("Bearer ")) {
        Some(token) => token,
        None => {
            return AppError::Unauthorized("Missing or invalid Authorization header".to_string())
                .into_response();
        }
    };

    let claims = match decode_jwt(token, &state.config.jwt.secret) {
        Ok(claims) => claims,
        Err(err) => return err.into_response(),
    };

    let user_id = match claims.sub.parse::<UserId>() {
        Ok(id) => id,
        Err(_) => {
            return AppError::Unauthorized("Invalid user ID in token".to_string()).into_response()
        }
    };

    request.extensions_mut().insert(AuthUser {
        user_id,
        role: claims.role,
    });

    next.run(request).await
}

/// Extractor for authenticated user
/// Use this in handlers to get the current user
#[derive(Clone, Debug)]
pub struct CurrentUser(pub AuthUser);

#[axum::async_trait]
impl<S> axum::extract::FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .map(CurrentUser)
            .ok_or_else(|| AppError::Unauthorized("Authentication required".to_string()))
    }
}

/// Bulk imports and transfers are reserved for admins and managers
pub fn require_stock_manager(user: &AuthUser) -> AppResult<()> {
    if user.role.can_manage_stock() {
        Ok(())
    } else {
        Err(AppError::InsufficientPermissions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_round_trip_keeps_role() {
        let claims = Claims::new(42, Role::Manager, chrono::Duration::hours(1));
        let token = encode_jwt(&claims, "secret").unwrap();

        let decoded = decode_jwt(&token, "secret").unwrap();
        assert_eq!(decoded.sub, "42");
        assert_eq!(decoded.role, Role::Manager);
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let claims = Claims::new(1, Role::Admin, chrono::Duration::hours(1));
        let token = encode_jwt(&claims, "secret").unwrap();

        assert!(matches!(decode_jwt(&token, "other"), Err(AppError::InvalidToken)));
    }

    #[test]
    fn test_staff_cannot_manage_stock() {
        let staff = AuthUser { user_id: 7, role: Role::Staff };
        assert!(matches!(
            require_stock_manager(&staff),
            Err(AppError::InsufficientPermissions)
        ));
        assert_eq!(staff.actor(), Actor::user(7, Role::Staff));
    }
}
