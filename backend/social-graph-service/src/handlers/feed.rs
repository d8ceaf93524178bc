/// Feed handlers - home feed, user posts, posts, comments and reactions
use actix_web::{web, HttpResponse};
use serde::Deserialize;

use super::{parse_id, AppState, PageQuery};
use crate::domain::ReactionType;
use crate::error::{AppError, Result};
use crate::middleware::{OptionalUserId, UserId};
use crate::services::{NewPost, PostPatch};

#[derive(Debug, Deserialize)]
pub struct NewComment {
    pub text: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReactionRequest {
    #[serde(default)]
    pub reaction_type: ReactionType,
}

/// Home feed of the caller
pub async fn home_feed(
    state: web::Data<AppState>,
    user: UserId,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse> {
    let feed = state.feed.get_feed(user.0, state.page(&query)).await?;
    Ok(HttpResponse::Ok().json(feed))
}

pub async fn user_posts(
    state: web::Data<AppState>,
    viewer: OptionalUserId,
    username: web::Path<String>,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse> {
    let posts = state
        .feed
        .get_user_posts(&username, viewer.0, state.page(&query))
        .await?;
    Ok(HttpResponse::Ok().json(posts))
}

pub async fn create_post(
    state: web::Data<AppState>,
    user: UserId,
    payload: web::Json<NewPost>,
) -> Result<HttpResponse> {
    let post = state.posts.create_post(user.0, payload.into_inner()).await?;
    Ok(HttpResponse::Created().json(post))
}

pub async fn get_post(
    state: web::Data<AppState>,
    viewer: OptionalUserId,
    id: web::Path<String>,
) -> Result<HttpResponse> {
    let post_id = parse_id(&id, "post")?;
    let item = state.feed.get_post(post_id, viewer.0).await?;
    Ok(HttpResponse::Ok().json(item))
}

pub async fn update_post(
    state: web::Data<AppState>,
    user: UserId,
    id: web::Path<String>,
    payload: web::Json<PostPatch>,
) -> Result<HttpResponse> {
    let post_id = parse_id(&id, "post")?;
    let post = state
        .posts
        .update_post(post_id, user.0, payload.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(post))
}

pub async fn delete_post(
    state: web::Data<AppState>,
    user: UserId,
    id: web::Path<String>,
) -> Result<HttpResponse> {
    let post_id = parse_id(&id, "post")?;
    state.posts.delete_post(post_id, user.0).await?;
    Ok(HttpResponse::NoContent().finish())
}

pub async fn add_comment(
    state: web::Data<AppState>,
    user: UserId,
    id: web::Path<String>,
    payload: web::Json<NewComment>,
) -> Result<HttpResponse> {
    let post_id = parse_id(&id, "post")?;
    let comment = state
        .posts
        .add_comment(post_id, user.0, payload.into_inner().text)
        .await?;
    Ok(HttpResponse::Created().json(comment))
}

pub async fn list_comments(
    state: web::Data<AppState>,
    viewer: OptionalUserId,
    id: web::Path<String>,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse> {
    let post_id = parse_id(&id, "post")?;
    let comments = state
        .posts
        .list_comments(post_id, viewer.0, state.page(&query))
        .await?;
    Ok(HttpResponse::Ok().json(comments))
}

pub async fn delete_comment(
    state: web::Data<AppState>,
    user: UserId,
    id: web::Path<String>,
) -> Result<HttpResponse> {
    let comment_id = parse_id(&id, "comment")?;
    state.posts.delete_comment(comment_id, user.0).await?;
    Ok(HttpResponse::NoContent().finish())
}

/// LIKE when the body is empty or names no type
fn reaction_type(body: &web::Bytes) -> Result<ReactionType> {
    if body.is_empty() {
        return Ok(ReactionType::default());
    }
    let request: ReactionRequest =
        serde_json::from_slice(body).map_err(|e| AppError::Validation(e.to_string()))?;
    Ok(request.reaction_type)
}

/// Toggle a reaction on a post
pub async fn react(
    state: web::Data<AppState>,
    user: UserId,
    id: web::Path<String>,
    body: web::Bytes,
) -> Result<HttpResponse> {
    let post_id = parse_id(&id, "post")?;
    let summary = state
        .posts
        .react(post_id, user.0, reaction_type(&body)?)
        .await?;
    Ok(HttpResponse::Ok().json(summary))
}

/// Toggle a reaction on a comment
pub async fn react_to_comment(
    state: web::Data<AppState>,
    user: UserId,
    id: web::Path<String>,
    body: web::Bytes,
) -> Result<HttpResponse> {
    let comment_id = parse_id(&id, "comment")?;
    let summary = state
        .posts
        .react_to_comment(comment_id, user.0, reaction_type(&body)?)
        .await?;
    Ok(HttpResponse::Ok().json(summary))
}

pub async fn comment_reactions(
    state: web::Data<AppState>,
    viewer: OptionalUserId,
    id: web::Path<String>,
) -> Result<HttpResponse> {
    let comment_id = parse_id(&id, "comment")?;
    let tally = state.posts.comment_reactions(comment_id, viewer.0).await?;
    Ok(HttpResponse::Ok().json(tally))
}
