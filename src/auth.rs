use axum::http::HeaderMap;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::errors::AppError;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Role {
    Patient,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Patient => "patient",
            Role::Admin => "admin",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "admin" => Role::Admin,
            _ => Role::Patient,
        }
    }
}

/// The authenticated caller, as handed to handlers. Token issuance lives in
/// the identity service; this module only validates.
#[derive(Debug, Clone, Copy)]
pub struct Principal {
    pub id: i64,
    pub role: Role,
}

impl Principal {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[derive(Serialize, Deserialize)]
struct Claims {
    sub: i64,
    role: String,
    exp: i64,
}

/// Validate the bearer token and return the caller. HS256, verified manually
/// so a malformed token never panics.
pub fn authenticate(headers: &HeaderMap, secret: &str) -> Result<Principal, AppError> {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let token = auth.strip_prefix("Bearer ").unwrap_or("");
    if token.is_empty() {
        return Err(AppError::Unauthorized);
    }

    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return Err(AppError::Unauthorized);
    }

    let signature = URL_SAFE_NO_PAD
        .decode(parts[2])
        .map_err(|_| AppError::Unauthorized)?;

    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| AppError::Unauthorized)?;
    mac.update(format!("{}.{}", parts[0], parts[1]).as_bytes());
    if mac.verify_slice(&signature).is_err() {
        tracing::debug!("token signature verification failed");
        return Err(AppError::Unauthorized);
    }

    let claims_json = URL_SAFE_NO_PAD
        .decode(parts[1])
        .map_err(|_| AppError::Unauthorized)?;
    let claims: Claims =
        serde_json::from_slice(&claims_json).map_err(|_| AppError::Unauthorized)?;

    if claims.exp < Utc::now().timestamp() {
        tracing::debug!("token expired at {}", claims.exp);
        return Err(AppError::Unauthorized);
    }

    Ok(Principal {
        id: claims.sub,
        role: Role::parse(&claims.role),
    })
}

pub fn require_admin(principal: &Principal) -> Result<(), AppError> {
    if principal.is_admin() {
        Ok(())
    } else {
        Err(AppError::Forbidden)
    }
}

/// Mint a token. Used by the identity service binary and by the test suite.
pub fn issue_token(user_id: i64, role: Role, secret: &str, ttl_secs: i64) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let claims = Claims {
        sub: user_id,
        role: role.as_str().to_string(),
        exp: Utc::now().timestamp() + ttl_secs,
    };
    let claims_b64 =
        URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims).expect("claims serialize"));

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("hmac key");
    mac.update(format!("{header}.{claims_b64}").as_bytes());
    let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

    format!("{header}.{claims_b64}.{signature}")
}
