use std::future::{ready, Ready};

use actix_web::dev::Payload;
use actix_web::http::header::AUTHORIZATION;
use actix_web::web::Data;
use actix_web::{FromRequest, HttpRequest};

use crate::error::Error;
use crate::user::{Role, UserId};

pub mod endpoints;
pub mod jwt;
pub mod manager;
pub mod password;
pub use endpoints::*;

use self::jwt::JwtKeys;

/// The caller identified by the bearer token. Extracting it from a request
/// without a valid token fails the request with 401.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: UserId,
    pub role: Role,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn require_role(&self, roles: &[Role]) -> Result<(), Error> {
        if self.is_admin() || roles.contains(&self.role) {
            Ok(())
        } else {
            Err(Error::InsufficientRole {
                required: roles.to_vec(),
                actual: self.role,
            })
        }
    }

    pub fn require_admin(&self) -> Result<(), Error> {
        self.require_role(&[Role::Admin])
    }

    pub fn require_owner_or_admin(&self, owner: UserId) -> Result<(), Error> {
        if self.is_admin() || self.user_id == owner {
            Ok(())
        } else {
            Err(Error::NotResourceOwner)
        }
    }
}

impl FromRequest for AuthUser {
    type Error = Error;
    type Future = Ready<Result<AuthUser, Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(authenticate(req))
    }
}

fn authenticate(req: &HttpRequest) -> Result<AuthUser, Error> {
    let keys = req
        .app_data::<Data<JwtKeys>>()
        .ok_or_else(|| Error::ExistentialState("jwt keys are not registered".into()))?;

    let token = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(Error::MissingToken)?;

    let claims = keys.verify(token)?;

    Ok(AuthUser {
        user_id: claims.sub,
        role: claims.role,
    })
}
