use actix_web::web::{Data, Json, Path};
use actix_web::{delete, get, post};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::auth::AuthUser;
use crate::database::Database;
use crate::error::Error;
use crate::user::UserId;
use crate::utils::SuccessBody;

use super::manager;
use super::{Story, StoryId, StoryMedia, StoryMediaType};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoryBody {
    pub id: StoryId,
    pub user: UserId,
    pub media: StoryMedia,
    pub caption: Option<String>,
    pub views: usize,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl StoryBody {
    pub fn render(story: Story) -> StoryBody {
        StoryBody {
            id: story.id,
            user: story.user,
            media: story.media,
            caption: story.caption,
            views: story.viewers.len(),
            expires_at: story.expires_at,
            created_at: story.created_at,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Validate)]
pub struct StoryMediaInput {
    pub media_type: StoryMediaType,
    #[validate(url)]
    pub url: String,
}

#[derive(Clone, Debug, Deserialize, Validate)]
pub struct CreateStoryBody {
    #[validate(nested)]
    pub media: StoryMediaInput,
    #[validate(length(max = 300))]
    pub caption: Option<String>,
}

#[post("/stories")]
#[tracing::instrument(skip(db))]
pub async fn create_story(
    db: Data<Box<dyn Database>>,
    auth: AuthUser,
    body: Json<CreateStoryBody>,
) -> Result<Json<StoryBody>, Error> {
    let body = body.into_inner();
    body.validate()?;

    let media = StoryMedia {
        media_type: body.media.media_type,
        url: body.media.url,
    };
    let story = manager::create_story(&***db, auth.user_id, media, body.caption, Utc::now()).await?;

    Ok(Json(StoryBody::render(story)))
}

#[get("/stories/feed")]
#[tracing::instrument(skip(db))]
pub async fn get_feed(
    db: Data<Box<dyn Database>>,
    auth: AuthUser,
) -> Result<Json<Vec<StoryBody>>, Error> {
    let stories = manager::get_feed(&***db, auth.user_id, Utc::now()).await?;

    Ok(Json(stories.into_iter().map(StoryBody::render).collect()))
}

#[get("/stories/user/{user_id}")]
#[tracing::instrument(skip(db))]
pub async fn get_stories_by_user(
    db: Data<Box<dyn Database>>,
    _auth: AuthUser,
    params: Path<UserId>,
) -> Result<Json<Vec<StoryBody>>, Error> {
    let stories = manager::get_stories_by_user(&***db, params.into_inner(), Utc::now()).await?;

    Ok(Json(stories.into_iter().map(StoryBody::render).collect()))
}

#[get("/stories/{story_id}")]
#[tracing::instrument(skip(db))]
pub async fn get_story_by_id(
    db: Data<Box<dyn Database>>,
    _auth: AuthUser,
    params: Path<StoryId>,
) -> Result<Json<StoryBody>, Error> {
    let story = manager::expect_live_story(&***db, params.into_inner(), Utc::now()).await?;

    Ok(Json(StoryBody::render(story)))
}

#[post("/stories/{story_id}/view")]
#[tracing::instrument(skip(db))]
pub async fn view_story(
    db: Data<Box<dyn Database>>,
    auth: AuthUser,
    params: Path<StoryId>,
) -> Result<Json<StoryBody>, Error> {
    let story = manager::view_story(&***db, auth.user_id, params.into_inner(), Utc::now()).await?;

    Ok(Json(StoryBody::render(story)))
}

#[delete("/stories/{story_id}")]
#[tracing::instrument(skip(db))]
pub async fn delete_story(
    db: Data<Box<dyn Database>>,
    auth: AuthUser,
    params: Path<StoryId>,
) -> Result<Json<SuccessBody>, Error> {
    manager::delete_story(&***db, &auth, params.into_inner()).await?;

    Ok(Json(SuccessBody::ok()))
}
