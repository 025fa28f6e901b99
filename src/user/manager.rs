use crate::database::Database;
use crate::error::Error;

use super::{Role, User, UserId, UserStatus};

#[derive(Clone, Debug, Default)]
pub struct ProfileChanges {
    pub name: Option<String>,
    pub avatar: Option<String>,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub interests: Option<Vec<String>>,
}

#[tracing::instrument(skip(db))]
pub async fn expect_user_by_id(db: &dyn Database, user_id: UserId) -> Result<User, Error> {
    db.users()
        .fetch_user_by_id(user_id)
        .await?
        .ok_or(Error::UserNotFound { user_id })
}

#[tracing::instrument(skip(db))]
pub async fn get_users(db: &dyn Database, role: Option<Role>) -> Result<Vec<User>, Error> {
    db.users().fetch_users(role).await
}

#[tracing::instrument(skip(db))]
pub async fn update_profile(
    db: &dyn Database,
    user_id: UserId,
    changes: ProfileChanges,
) -> Result<User, Error> {
    let mut user = expect_user_by_id(db, user_id).await?;

    if let Some(name) = changes.name {
        user.name = name;
    }
    if let Some(avatar) = changes.avatar {
        user.avatar = Some(avatar);
    }
    if let Some(bio) = changes.bio {
        user.bio = Some(bio);
    }
    if let Some(location) = changes.location {
        user.location = Some(location);
    }
    if let Some(interests) = changes.interests {
        user.interests = interests;
    }

    db.users().update_user(user).await
}

#[tracing::instrument(skip(db))]
pub async fn set_user_status(
    db: &dyn Database,
    user_id: UserId,
    status: UserStatus,
) -> Result<User, Error> {
    let mut user = expect_user_by_id(db, user_id).await?;
    user.status = status;

    db.users().update_user(user).await
}

#[tracing::instrument(skip(db))]
pub async fn set_user_role(db: &dyn Database, user_id: UserId, role: Role) -> Result<User, Error> {
    let mut user = expect_user_by_id(db, user_id).await?;
    user.role = role;

    db.users().update_user(user).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test::{sample_user, MockDatabase};

    #[tokio::test]
    async fn update_profile_only_touches_given_fields() {
        let mut db = MockDatabase::new();
        let mut user = sample_user(Role::User);
        user.bio = Some("old bio".into());
        let user_id = user.id;
        db.users.on_fetch_user_by_id = Box::new(move |_| Ok(Some(user.clone())));
        db.users.on_update_user = Box::new(Ok);

        let changes = ProfileChanges {
            name: Some("New Name".into()),
            interests: Some(vec!["jazz".into()]),
            ..Default::default()
        };
        let user = update_profile(&db, user_id, changes).await.unwrap();

        assert_eq!(user.name, "New Name");
        assert_eq!(user.bio.as_deref(), Some("old bio"));
        assert_eq!(user.interests, vec!["jazz".to_string()]);
    }

    #[tokio::test]
    async fn missing_user_is_not_found() {
        let mut db = MockDatabase::new();
        db.users.on_fetch_user_by_id = Box::new(|_| Ok(None));
        let user_id = UserId::new();

        let result = set_user_status(&db, user_id, UserStatus::Suspended).await;

        assert_eq!(result.unwrap_err(), Error::UserNotFound { user_id });
    }
}
