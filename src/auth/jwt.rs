use std::time::{SystemTime, UNIX_EPOCH};

use crate::models::{Claims, LmsUserSql, TokenType};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use uuid::Uuid;

fn now() -> usize {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs() as usize
}

/// Identity carried into a token, built either from the user row at login or
/// from the old claims at refresh.
pub struct TokenIdentity {
    pub lms_user_id: u64,
    pub login_id: String,
    pub user_name: String,
    pub role: u8,
    pub account_id: u64,
    pub course_id: u64,
}

impl From<&LmsUserSql> for TokenIdentity {
    fn from(user: &LmsUserSql) -> Self {
        TokenIdentity {
            lms_user_id: user.lms_user_id,
            login_id: user.login_id.clone(),
            user_name: user.user_name.clone(),
            role: user.role_id,
            account_id: user.account_id,
            course_id: user.course_id,
        }
    }
}

impl From<&Claims> for TokenIdentity {
    fn from(claims: &Claims) -> Self {
        TokenIdentity {
            lms_user_id: claims.lms_user_id,
            login_id: claims.sub.clone(),
            user_name: claims.user_name.clone(),
            role: claims.role,
            account_id: claims.account_id,
            course_id: claims.course_id,
        }
    }
}

fn build_claims(identity: &TokenIdentity, ttl: usize, token_type: TokenType) -> Claims {
    Claims {
        lms_user_id: identity.lms_user_id,
        sub: identity.login_id.clone(),
        user_name: identity.user_name.clone(),
        role: identity.role,
        account_id: identity.account_id,
        course_id: identity.course_id,
        exp: now() + ttl,
        jti: Uuid::new_v4().to_string(),
        token_type,
    }
}

pub fn generate_access_token(identity: &TokenIdentity, secret: &str, ttl: usize) -> String {
    let claims = build_claims(identity, ttl, TokenType::Access);

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}

pub fn generate_refresh_token(
    identity: &TokenIdentity,
    secret: &str,
    ttl: usize,
) -> (String, Claims) {
    let claims = build_claims(identity, ttl, TokenType::Refresh);

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap();

    (token, claims)
}

pub fn verify_token(token: &str, secret: &str) -> Result<Claims, String> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| e.to_string())
}
