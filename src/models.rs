use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Deserialize)]
pub struct LoginReqDto {
    pub login_id: String,
    pub password: String,
}

#[derive(FromRow)]
pub struct LmsUserSql {
    pub lms_user_id: u64, // 👈 matches BIGINT UNSIGNED
    pub login_id: String,
    pub password: String,
    pub user_name: String,
    pub role_id: u8,
    pub account_id: u64,
    pub course_id: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub lms_user_id: u64,
    pub sub: String, // login id
    pub user_name: String,
    pub role: u8, // role id
    pub account_id: u64,
    pub course_id: u64,
    pub exp: usize,
    pub jti: String,

    pub token_type: TokenType,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub enum TokenType {
    Access,
    Refresh,
}
