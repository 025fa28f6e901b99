use actix_web::web::{Data, Json, Path};
use actix_web::{get, patch};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::auth::AuthUser;
use crate::database::Database;
use crate::error::Error;

use super::manager::{self, ProfileChanges};
use super::{Role, User, UserId, UserStatus};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UserBody {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub status: UserStatus,
    pub avatar: Option<String>,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub interests: Vec<String>,
    pub friends: Vec<UserId>,
    pub followers: Vec<UserId>,
    pub following: Vec<UserId>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl UserBody {
    pub fn render(user: User) -> UserBody {
        UserBody {
            id: user.id,
            name: user.name,
            email: user.email,
            role: user.role,
            status: user.status,
            avatar: user.avatar,
            bio: user.bio,
            location: user.location,
            interests: user.interests,
            friends: user.friends,
            followers: user.followers,
            following: user.following,
            created_at: user.created_at,
            modified_at: user.modified_at,
        }
    }
}

/// What other users get to see.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProfileBody {
    pub id: UserId,
    pub name: String,
    pub role: Role,
    pub avatar: Option<String>,
    pub bio: Option<String>,
    pub followers: usize,
    pub following: usize,
}

impl ProfileBody {
    pub fn render(user: User) -> ProfileBody {
        ProfileBody {
            id: user.id,
            name: user.name,
            role: user.role,
            avatar: user.avatar,
            bio: user.bio,
            followers: user.followers.len(),
            following: user.following.len(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Validate)]
pub struct UpdateProfileBody {
    #[validate(length(min = 1, max = 80))]
    pub name: Option<String>,
    #[validate(url)]
    pub avatar: Option<String>,
    #[validate(length(max = 500))]
    pub bio: Option<String>,
    #[validate(length(min = 1, max = 120))]
    pub location: Option<String>,
    pub interests: Option<Vec<String>>,
}

#[get("/users/{user_id}")]
#[tracing::instrument(skip(db))]
pub async fn get_user_profile(
    db: Data<Box<dyn Database>>,
    _auth: AuthUser,
    params: Path<UserId>,
) -> Result<Json<ProfileBody>, Error> {
    let user = manager::expect_user_by_id(&***db, params.into_inner()).await?;

    Ok(Json(ProfileBody::render(user)))
}

#[patch("/users/me")]
#[tracing::instrument(skip(db))]
pub async fn update_my_profile(
    db: Data<Box<dyn Database>>,
    auth: AuthUser,
    body: Json<UpdateProfileBody>,
) -> Result<Json<UserBody>, Error> {
    let body = body.into_inner();
    body.validate()?;

    let changes = ProfileChanges {
        name: body.name,
        avatar: body.avatar,
        bio: body.bio,
        location: body.location,
        interests: body.interests,
    };
    let user = manager::update_profile(&***db, auth.user_id, changes).await?;

    Ok(Json(UserBody::render(user)))
}
