use chrono::{DateTime, Utc};

use crate::auth::AuthUser;
use crate::database::{Database, MAX_SAVE_ATTEMPTS};
use crate::error::Error;
use crate::user::manager as users;
use crate::user::{add_unique, UserId};

use super::{story_lifetime, Story, StoryId, StoryMedia};

#[tracing::instrument(skip(db))]
pub async fn create_story(
    db: &dyn Database,
    user: UserId,
    media: StoryMedia,
    caption: Option<String>,
    now: DateTime<Utc>,
) -> Result<Story, Error> {
    let story = Story {
        id: StoryId::new(),
        user,
        media,
        caption,
        viewers: vec![],
        expires_at: now + story_lifetime(),
        created_at: now,
        modified_at: now,
    };

    db.stories().insert_story(&story).await?;

    Ok(story)
}

/// Expired stories are reported as not found even if the TTL index has not
/// removed them yet.
#[tracing::instrument(skip(db))]
pub async fn expect_live_story(
    db: &dyn Database,
    story_id: StoryId,
    now: DateTime<Utc>,
) -> Result<Story, Error> {
    db.stories()
        .fetch_story_by_id(story_id)
        .await?
        .filter(|story| !story.is_expired(now))
        .ok_or(Error::StoryNotFound { story_id })
}

/// The caller's own stories and those of everyone they follow.
#[tracing::instrument(skip(db))]
pub async fn get_feed(
    db: &dyn Database,
    user_id: UserId,
    now: DateTime<Utc>,
) -> Result<Vec<Story>, Error> {
    let user = users::expect_user_by_id(db, user_id).await?;

    let mut authors = user.following;
    add_unique(&mut authors, user.id);

    db.stories()
        .fetch_live_stories_by_users(&authors, now)
        .await
}

#[tracing::instrument(skip(db))]
pub async fn get_stories_by_user(
    db: &dyn Database,
    user_id: UserId,
    now: DateTime<Utc>,
) -> Result<Vec<Story>, Error> {
    db.stories()
        .fetch_live_stories_by_users(&[user_id], now)
        .await
}

/// Records that `viewer` has seen the story. Authors looking at their own
/// story and repeat views leave it untouched.
#[tracing::instrument(skip(db))]
pub async fn view_story(
    db: &dyn Database,
    viewer: UserId,
    story_id: StoryId,
    now: DateTime<Utc>,
) -> Result<Story, Error> {
    for _ in 0..MAX_SAVE_ATTEMPTS {
        let mut story = expect_live_story(db, story_id, now).await?;
        if story.user == viewer || !add_unique(&mut story.viewers, viewer) {
            return Ok(story);
        }

        match db.stories().update_story(story).await {
            Err(Error::ConcurrentModificationDetected) => continue,
            result => return result,
        }
    }

    Err(Error::ConcurrentModificationDetected)
}

#[tracing::instrument(skip(db))]
pub async fn delete_story(db: &dyn Database, auth: &AuthUser, story_id: StoryId) -> Result<(), Error> {
    let story = db
        .stories()
        .fetch_story_by_id(story_id)
        .await?
        .ok_or(Error::StoryNotFound { story_id })?;

    auth.require_owner_or_admin(story.user)?;

    db.stories().delete_story(story_id).await
}
