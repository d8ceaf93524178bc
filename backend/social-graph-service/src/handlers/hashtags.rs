/// Hashtag handlers
use actix_web::{web, HttpResponse};
use serde::Deserialize;

use super::{AppState, LimitQuery, PageQuery};
use crate::error::Result;
use crate::middleware::OptionalUserId;

#[derive(Debug, Deserialize)]
pub struct ContentPayload {
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub query: String,
    pub limit: Option<usize>,
}

/// Extract tags and mentions from free text and bump trend counters
pub async fn process_content(
    state: web::Data<AppState>,
    payload: web::Json<ContentPayload>,
) -> Result<HttpResponse> {
    let processed = state.hashtags.process_content(&payload.content).await?;
    Ok(HttpResponse::Ok().json(processed))
}

pub async fn trending(
    state: web::Data<AppState>,
    query: web::Query<LimitQuery>,
) -> Result<HttpResponse> {
    let limit = query
        .limit
        .unwrap_or(state.limits.trending_default_limit)
        .clamp(1, state.limits.max_page_size as usize);
    let tags = state.hashtags.trending(limit).await?;
    Ok(HttpResponse::Ok().json(tags))
}

pub async fn search(
    state: web::Data<AppState>,
    query: web::Query<SearchQuery>,
) -> Result<HttpResponse> {
    let limit = query
        .limit
        .unwrap_or(state.limits.trending_default_limit)
        .clamp(1, state.limits.max_page_size as usize);
    let tags = state.hashtags.search(&query.query, limit).await?;
    Ok(HttpResponse::Ok().json(tags))
}

/// Visible posts carrying a tag, newest first
pub async fn tagged_posts(
    state: web::Data<AppState>,
    viewer: OptionalUserId,
    tag: web::Path<String>,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse> {
    let posts = state
        .feed
        .hashtag_posts(&tag, viewer.0, state.page(&query))
        .await?;
    Ok(HttpResponse::Ok().json(posts))
}
