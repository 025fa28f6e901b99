use actix_web::web::{Data, Json};
use actix_web::{get, post};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::database::Database;
use crate::error::Error;
use crate::user::{manager as user_manager, Role, UserBody};

use super::jwt::JwtKeys;
use super::{manager, AuthUser};

#[derive(Clone, Debug, Serialize, Deserialize, Validate)]
pub struct RegisterBody {
    #[validate(length(min = 1, max = 80))]
    pub name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8, message = "password must be at least 8 characters"))]
    pub password: String,
    pub role: Option<Role>,
}

#[derive(Clone, Debug, Serialize, Deserialize, Validate)]
pub struct LoginBody {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TokenBody {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: UserBody,
}

#[post("/auth/register")]
#[tracing::instrument(skip(db, keys, body))]
pub async fn register(
    db: Data<Box<dyn Database>>,
    keys: Data<JwtKeys>,
    body: Json<RegisterBody>,
) -> Result<Json<TokenBody>, Error> {
    let body = body.into_inner();
    body.validate()?;

    let user = manager::register(
        &***db,
        body.name,
        body.email,
        &body.password,
        body.role.unwrap_or(Role::User),
    )
    .await?;
    let (token, expires_at) = keys.issue(user.id, user.role)?;

    Ok(Json(TokenBody {
        token,
        expires_at,
        user: UserBody::render(user),
    }))
}

#[post("/auth/login")]
#[tracing::instrument(skip(db, keys, body))]
pub async fn login(
    db: Data<Box<dyn Database>>,
    keys: Data<JwtKeys>,
    body: Json<LoginBody>,
) -> Result<Json<TokenBody>, Error> {
    let body = body.into_inner();
    body.validate()?;

    let (user, token, expires_at) =
        manager::login(&***db, &keys, &body.email, &body.password).await?;

    Ok(Json(TokenBody {
        token,
        expires_at,
        user: UserBody::render(user),
    }))
}

#[get("/auth/me")]
#[tracing::instrument(skip(db))]
pub async fn me(db: Data<Box<dyn Database>>, auth: AuthUser) -> Result<Json<UserBody>, Error> {
    let user = user_manager::expect_user_by_id(&***db, auth.user_id).await?;

    Ok(Json(UserBody::render(user)))
}
