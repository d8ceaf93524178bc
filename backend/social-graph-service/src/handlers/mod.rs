/// HTTP handlers for social-graph-service
///
/// - Accounts: register, profile, privacy tier
/// - Follow: follow/unfollow, followers, counts, suggestions
/// - Feed: home feed, user posts, posts, comments, post and comment reactions
/// - Stories: create, tray, views
/// - Hashtags: process content, trending, search, tagged posts
pub mod accounts;
pub mod feed;
pub mod follow;
pub mod health;
pub mod hashtags;
pub mod stories;

use actix_web::web;
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::{FeedConfig, GraphConfig};
use crate::domain::PageRequest;
use crate::error::{AppError, Result};
use crate::metrics::serve_metrics;
use crate::repository::SocialStore;
use crate::services::{
    AccountService, FeedService, FollowGraphService, HashtagService, PostService, StoryService,
};

/// Shared handler state; every service holds the same store handle.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn SocialStore>,
    pub accounts: AccountService,
    pub follow_graph: FollowGraphService,
    pub feed: FeedService,
    pub posts: PostService,
    pub stories: StoryService,
    pub hashtags: HashtagService,
    pub limits: FeedConfig,
}

impl AppState {
    pub fn new(store: Arc<dyn SocialStore>, graph: &GraphConfig, limits: FeedConfig) -> Self {
        let hashtags = HashtagService::new(store.clone());
        Self {
            accounts: AccountService::new(store.clone()),
            follow_graph: FollowGraphService::new(store.clone(), graph.retry_config()),
            feed: FeedService::new(store.clone()),
            posts: PostService::new(store.clone(), hashtags.clone()),
            stories: StoryService::new(store.clone()),
            hashtags,
            store,
            limits,
        }
    }

    /// Clamp query paging to configured bounds.
    pub fn page(&self, query: &PageQuery) -> PageRequest {
        let limit = query
            .limit
            .unwrap_or(self.limits.default_page_size)
            .clamp(1, self.limits.max_page_size);
        PageRequest::new(query.page.unwrap_or(1), limit)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<usize>,
}

pub(crate) fn parse_id(raw: &str, what: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).map_err(|_| AppError::Validation(format!("Invalid {} ID", what)))
}

/// Register all routes.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default()
            .error_handler(|err, _| AppError::Validation(err.to_string()).into()),
    )
    .app_data(
        web::QueryConfig::default()
            .error_handler(|err, _| AppError::Validation(err.to_string()).into()),
    )
    .route("/health", web::get().to(health::health))
    .route("/metrics", web::get().to(serve_metrics))
    .service(
        web::scope("/api/v1")
            // accounts
            .route("/accounts", web::post().to(accounts::register))
            .route("/accounts/me/privacy", web::put().to(accounts::set_privacy))
            .route("/accounts/{username}", web::get().to(accounts::get_profile))
            .route("/accounts/{username}/posts", web::get().to(feed::user_posts))
            .route("/accounts/{id}/counts", web::get().to(follow::counts))
            .route("/accounts/{id}/followers", web::get().to(follow::list_followers))
            .route("/accounts/{id}/following", web::get().to(follow::list_following))
            // follow graph
            .route("/follows/{target_id}", web::post().to(follow::follow))
            .route("/follows/{target_id}", web::delete().to(follow::unfollow))
            .route("/followers/{follower_id}", web::delete().to(follow::remove_follower))
            .route("/suggestions", web::get().to(follow::suggestions))
            // feed, posts, comments, reactions
            .route("/feed", web::get().to(feed::home_feed))
            .route("/posts", web::post().to(feed::create_post))
            .route("/posts/{id}", web::get().to(feed::get_post))
            .route("/posts/{id}", web::patch().to(feed::update_post))
            .route("/posts/{id}", web::delete().to(feed::delete_post))
            .route("/posts/{id}/comments", web::post().to(feed::add_comment))
            .route("/posts/{id}/comments", web::get().to(feed::list_comments))
            .route("/comments/{id}", web::delete().to(feed::delete_comment))
            .route("/comments/{id}/reactions", web::post().to(feed::react_to_comment))
            .route("/comments/{id}/reactions", web::get().to(feed::comment_reactions))
            .route("/posts/{id}/reactions", web::post().to(feed::react))
            // stories
            .route("/stories", web::post().to(stories::create_story))
            .route("/stories", web::get().to(stories::story_tray))
            .route("/stories/{id}/views", web::post().to(stories::record_view))
            // hashtags
            .route("/hashtags/process-content", web::post().to(hashtags::process_content))
            .route("/hashtags/trending", web::get().to(hashtags::trending))
            .route("/hashtags/search", web::get().to(hashtags::search))
            .route("/hashtags/{tag}/posts", web::get().to(hashtags::tagged_posts)),
    );
}
