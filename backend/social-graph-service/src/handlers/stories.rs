/// Story handlers
use actix_web::{web, HttpResponse};
use serde_json::json;

use super::{parse_id, AppState};
use crate::domain::StoryItem;
use crate::error::Result;
use crate::middleware::UserId;
use crate::services::NewStory;

pub async fn create_story(
    state: web::Data<AppState>,
    user: UserId,
    payload: web::Json<NewStory>,
) -> Result<HttpResponse> {
    let story = state.stories.create_story(user.0, payload.into_inner()).await?;
    Ok(HttpResponse::Created().json(StoryItem::for_viewer(&story, user.0)))
}

/// Active stories of followed accounts, grouped per author
pub async fn story_tray(state: web::Data<AppState>, user: UserId) -> Result<HttpResponse> {
    let groups = state.stories.active_stories_for_viewer(user.0).await?;
    Ok(HttpResponse::Ok().json(groups))
}

pub async fn record_view(
    state: web::Data<AppState>,
    user: UserId,
    id: web::Path<String>,
) -> Result<HttpResponse> {
    let story_id = parse_id(&id, "story")?;
    let outcome = state.stories.record_view(story_id, user.0).await?;
    Ok(HttpResponse::Ok().json(json!({ "storyId": story_id, "outcome": outcome })))
}
