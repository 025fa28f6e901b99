use chrono::{DateTime, Utc};

use crate::database::Database;
use crate::error::{invalid_field, Error};
use crate::user::{Role, User, UserId, UserStatus};

use super::jwt::JwtKeys;
use super::password::{hash_password, verify_password};

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[tracing::instrument(skip(db, password))]
pub async fn register(
    db: &dyn Database,
    name: String,
    email: String,
    password: &str,
    role: Role,
) -> Result<User, Error> {
    if role == Role::Admin {
        return Err(invalid_field("role", "admin accounts cannot be self-registered"));
    }

    let email = normalize_email(&email);
    if db.users().fetch_user_by_email(&email).await?.is_some() {
        return Err(Error::EmailAlreadyRegistered { email });
    }

    let now = Utc::now();
    let user = User {
        id: UserId::new(),
        name,
        email,
        password_hash: hash_password(password)?,
        role,
        status: UserStatus::Active,
        avatar: None,
        bio: None,
        location: None,
        interests: vec![],
        friends: vec![],
        followers: vec![],
        following: vec![],
        created_at: now,
        modified_at: now,
    };

    db.users().insert_user(&user).await?;

    Ok(user)
}

#[tracing::instrument(skip(db, keys, password))]
pub async fn login(
    db: &dyn Database,
    keys: &JwtKeys,
    email: &str,
    password: &str,
) -> Result<(User, String, DateTime<Utc>), Error> {
    let user = db
        .users()
        .fetch_user_by_email(&normalize_email(email))
        .await?
        .ok_or(Error::InvalidCredentials)?;

    if !verify_password(password, &user.password_hash)? {
        return Err(Error::InvalidCredentials);
    }

    if user.status == UserStatus::Suspended {
        return Err(Error::AccountSuspended { user_id: user.id });
    }

    let (token, expires_at) = keys.issue(user.id, user.role)?;

    Ok((user, token, expires_at))
}
