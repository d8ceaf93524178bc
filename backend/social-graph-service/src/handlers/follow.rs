/// Follow graph handlers
use actix_web::{web, HttpResponse};
use serde_json::json;

use super::{parse_id, AppState, LimitQuery, PageQuery};
use crate::error::Result;
use crate::middleware::UserId;

pub async fn follow(
    state: web::Data<AppState>,
    user: UserId,
    target_id: web::Path<String>,
) -> Result<HttpResponse> {
    let target = parse_id(&target_id, "account")?;
    state.follow_graph.follow(user.0, target).await?;
    Ok(HttpResponse::Created().json(json!({ "following": true, "targetId": target })))
}

pub async fn unfollow(
    state: web::Data<AppState>,
    user: UserId,
    target_id: web::Path<String>,
) -> Result<HttpResponse> {
    let target = parse_id(&target_id, "account")?;
    state.follow_graph.unfollow(user.0, target).await?;
    Ok(HttpResponse::Ok().json(json!({ "following": false, "targetId": target })))
}

/// Drop one of the caller's followers
pub async fn remove_follower(
    state: web::Data<AppState>,
    user: UserId,
    follower_id: web::Path<String>,
) -> Result<HttpResponse> {
    let follower = parse_id(&follower_id, "account")?;
    state.follow_graph.remove_follower(user.0, follower).await?;
    Ok(HttpResponse::NoContent().finish())
}

pub async fn counts(state: web::Data<AppState>, id: web::Path<String>) -> Result<HttpResponse> {
    let account_id = parse_id(&id, "account")?;
    let counts = state.follow_graph.counts(account_id).await?;
    Ok(HttpResponse::Ok().json(counts))
}

pub async fn list_followers(
    state: web::Data<AppState>,
    id: web::Path<String>,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse> {
    let account_id = parse_id(&id, "account")?;
    let page = state
        .follow_graph
        .list_followers(account_id, state.page(&query))
        .await?;
    Ok(HttpResponse::Ok().json(page))
}

pub async fn list_following(
    state: web::Data<AppState>,
    id: web::Path<String>,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse> {
    let account_id = parse_id(&id, "account")?;
    let page = state
        .follow_graph
        .list_following(account_id, state.page(&query))
        .await?;
    Ok(HttpResponse::Ok().json(page))
}

/// Random PUBLIC accounts the caller does not follow yet
pub async fn suggestions(
    state: web::Data<AppState>,
    user: UserId,
    query: web::Query<LimitQuery>,
) -> Result<HttpResponse> {
    let cap = state.limits.suggestions_limit;
    let limit = query.limit.unwrap_or(cap).clamp(1, cap.max(1));
    let suggestions = state.follow_graph.suggestions(user.0, limit).await?;
    Ok(HttpResponse::Ok().json(suggestions))
}
