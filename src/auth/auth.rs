use crate::{model::role::Role, models::Claims};
use actix_web::{FromRequest, HttpRequest, dev::Payload, error::ErrorUnauthorized, web::Data};
use futures::future::{Ready, ready};
use jsonwebtoken::decode;
use jsonwebtoken::{DecodingKey, Validation};
use crate::config::Config;

/// Authenticated LMS user, extracted from the bearer token. Passed into the
/// core as an explicit parameter; there is no request-scoped ambient user.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub lms_user_id: u64,
    pub login_id: String,
    pub user_name: String,
    pub role: Role,
    pub account_id: u64,
    pub course_id: u64,
}

impl FromRequest for AuthUser {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let token = match req
            .headers()
            .get("Authorization")
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "))
        {
            Some(t) => t,
            None => return ready(Err(ErrorUnauthorized("Missing token"))),
        };

        let config = match req.app_data::<Data<Config>>() {
            Some(c) => c,
            None => {
                return ready(Err(
                    actix_web::error::ErrorInternalServerError("Config missing"),
                ))
            }
        };

        let data = match decode::<Claims>(
            token,
            &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            &Validation::default(),
        ) {
            Ok(d) => d,
            Err(_) => return ready(Err(ErrorUnauthorized("Invalid token"))),
        };

        let role = match Role::from_id(data.claims.role) {
            Some(r) => r,
            None => return ready(Err(ErrorUnauthorized("Invalid role"))),
        };

        ready(Ok(AuthUser {
            lms_user_id: data.claims.lms_user_id,
            login_id: data.claims.sub,
            user_name: data.claims.user_name,
            role,
            account_id: data.claims.account_id,
            course_id: data.claims.course_id,
        }))
    }
}

impl AuthUser {
    pub fn require_teacher_or_admin(&self) -> actix_web::Result<()> {
        if matches!(self.role, Role::Admin | Role::Teacher) {
            Ok(())
        } else {
            Err(actix_web::error::ErrorForbidden("Teacher/Admin only"))
        }
    }

    /// Returns true if the user attends a course as a student
    pub fn is_student(&self) -> bool {
        self.role == Role::Student
    }
}
