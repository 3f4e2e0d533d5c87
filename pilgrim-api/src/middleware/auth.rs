use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use pilgrim_core::AuthGate;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::state::AppState;

// ============================================================================
// JWT Claims
// ============================================================================

/// Verified admin session. Tokens are issued out of band and signed with the
/// shared HS256 secret.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AdminClaims {
    pub sub: String,
    pub role: String,
    pub exp: usize,
}

impl AuthGate for AdminClaims {
    fn is_admin(&self) -> bool {
        self.role == "ADMIN" || self.role == "SUPER_ADMIN"
    }

    fn subject(&self) -> Option<&str> {
        Some(&self.sub)
    }
}

pub fn verify_admin_token(token: &str, secret: &str) -> Result<AdminClaims, AppError> {
    let token_data = decode::<AdminClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )
    .map_err(|e| AppError::AuthenticationError(format!("Invalid admin token: {}", e)))?;

    Ok(token_data.claims)
}

// ============================================================================
// Admin Authentication Middleware
// ============================================================================

pub async fn admin_auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    // 1. Extract token
    let token = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .ok_or_else(|| AppError::AuthenticationError("Admin session required".into()))?;

    // 2. Decode JWT
    let claims = verify_admin_token(token, &state.auth.secret)?;

    // 3. Check role
    if !claims.is_admin() {
        return Err(AppError::AuthorizationError("Admin role required".into()));
    }

    // 4. Inject claims
    req.extensions_mut().insert(claims);

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn token(role: &str, secret: &str) -> String {
        let claims = AdminClaims {
            sub: "ops@pilgrim.example".into(),
            role: role.into(),
            exp: (chrono::Utc::now().timestamp() + 600) as usize,
        };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
    }

    #[test]
    fn test_verify_admin_token() {
        let claims = verify_admin_token(&token("ADMIN", "s3cret"), "s3cret").unwrap();
        assert!(claims.is_admin());
        assert_eq!(claims.subject(), Some("ops@pilgrim.example"));

        let viewer = verify_admin_token(&token("VIEWER", "s3cret"), "s3cret").unwrap();
        assert!(!viewer.is_admin());

        assert!(matches!(
            verify_admin_token(&token("ADMIN", "other"), "s3cret"),
            Err(AppError::AuthenticationError(_))
        ));
    }
}
