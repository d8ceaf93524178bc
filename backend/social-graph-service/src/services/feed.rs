//! Feed composition
//!
//! Builds paginated, privacy-filtered, newest-first post listings. The
//! evaluator turns each candidate author into an `AuthorScope`, so the store
//! only ever materialises the requested page.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::domain::{Account, Comment, CommentView, FeedItem, Page, PageRequest, Post};
use crate::error::{AppError, Result};
use crate::metrics::FEED_REQUEST_DURATION_SECONDS;
use crate::repository::{PostQuery, SocialStore};
use crate::services::hashtags::tag_key;
use crate::services::privacy;

/// Comments shown under each feed item
pub const PREVIEW_COMMENTS: usize = 2;

#[derive(Clone)]
pub struct FeedService {
    store: Arc<dyn SocialStore>,
}

impl FeedService {
    pub fn new(store: Arc<dyn SocialStore>) -> Self {
        Self { store }
    }

    /// Home feed: the viewer's own posts plus visible posts of accounts they follow.
    pub async fn get_feed(&self, viewer_id: Uuid, page: PageRequest) -> Result<Page<FeedItem>> {
        let _timer = FEED_REQUEST_DURATION_SECONDS
            .with_label_values(&["home"])
            .start_timer();

        let viewer = self
            .store
            .get_account(viewer_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("account {}", viewer_id)))?;

        // candidates: the viewer plus everyone they follow
        let mut authors = self.store.get_accounts(&viewer.following_ids).await?;
        authors.push(viewer);

        let scopes = authors
            .iter()
            .filter_map(|author| privacy::author_scope(Some(viewer_id), author))
            .collect();

        let query = PostQuery {
            scopes,
            include_public: false,
            hashtag: None,
            offset: page.offset(),
            limit: page.limit(),
        };

        let feed = self.run_query(&query, page).await?;
        debug!(
            viewer = %viewer_id,
            items = feed.items.len(),
            total = feed.total,
            "home feed composed"
        );
        Ok(feed)
    }

    /// Posts of one author as seen by `viewer` (None when unauthenticated).
    pub async fn get_user_posts(
        &self,
        username: &str,
        viewer: Option<Uuid>,
        page: PageRequest,
    ) -> Result<Page<FeedItem>> {
        let _timer = FEED_REQUEST_DURATION_SECONDS
            .with_label_values(&["user"])
            .start_timer();

        let author = self
            .store
            .get_account_by_username(username)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("account {}", username)))?;

        let Some(scope) = privacy::author_scope(viewer, &author) else {
            return Ok(Page::new(Vec::new(), 0, page));
        };

        let query = PostQuery {
            scopes: vec![scope],
            include_public: false,
            hashtag: None,
            offset: page.offset(),
            limit: page.limit(),
        };

        self.run_query(&query, page).await
    }

    /// Visible posts carrying `tag` (case-insensitive).
    pub async fn hashtag_posts(
        &self,
        tag: &str,
        viewer: Option<Uuid>,
        page: PageRequest,
    ) -> Result<Page<FeedItem>> {
        let _timer = FEED_REQUEST_DURATION_SECONDS
            .with_label_values(&["hashtag"])
            .start_timer();

        let key = tag_key(tag);
        if key.is_empty() {
            return Err(AppError::Validation("hashtag must not be empty".to_string()));
        }

        // Anyone sees PUBLIC posts of PUBLIC accounts; the viewer's own and
        // followed authors may add more tiers.
        let scopes = match viewer {
            Some(viewer_id) => {
                let viewer_account = self
                    .store
                    .get_account(viewer_id)
                    .await?
                    .ok_or_else(|| AppError::NotFound(format!("account {}", viewer_id)))?;
                let mut authors = self.store.get_accounts(&viewer_account.following_ids).await?;
                authors.push(viewer_account);
                authors
                    .iter()
                    .filter_map(|author| privacy::author_scope(viewer, author))
                    .collect()
            }
            None => Vec::new(),
        };

        let query = PostQuery {
            scopes,
            include_public: true,
            hashtag: Some(key),
            offset: page.offset(),
            limit: page.limit(),
        };

        self.run_query(&query, page).await
    }

    /// A single post, `Forbidden(reason)` when the viewer may not see it.
    pub async fn get_post(&self, post_id: Uuid, viewer: Option<Uuid>) -> Result<FeedItem> {
        let (post, author) = load_visible_post(self.store.as_ref(), post_id, viewer).await?;
        let mut items = self.assemble(vec![post], vec![author]).await?;
        items
            .pop()
            .ok_or_else(|| AppError::Internal(format!("post {} vanished during assembly", post_id)))
    }

    async fn run_query(&self, query: &PostQuery, page: PageRequest) -> Result<Page<FeedItem>> {
        let (posts, total) = self.store.query_posts(query).await?;

        let mut author_ids: Vec<Uuid> = posts.iter().map(|p| p.author_id).collect();
        author_ids.sort();
        author_ids.dedup();
        let authors = self.store.get_accounts(&author_ids).await?;

        let items = self.assemble(posts, authors).await?;
        Ok(Page::new(items, total, page))
    }

    /// Attach author, comment preview and reaction tally to each post.
    async fn assemble(&self, posts: Vec<Post>, authors: Vec<Account>) -> Result<Vec<FeedItem>> {
        if posts.is_empty() {
            return Ok(Vec::new());
        }

        let post_ids: Vec<Uuid> = posts.iter().map(|p| p.id).collect();
        let previews: Vec<Comment> = self
            .store
            .recent_comments(&post_ids, PREVIEW_COMMENTS)
            .await?
            .into_values()
            .flatten()
            .collect();
        let mut comments: HashMap<Uuid, Vec<CommentView>> = HashMap::new();
        for view in with_authors(self.store.as_ref(), previews).await? {
            comments.entry(view.comment.post_id).or_default().push(view);
        }
        let mut tallies = self.store.reaction_tallies(&post_ids).await?;
        let authors: HashMap<Uuid, Account> = authors.into_iter().map(|a| (a.id, a)).collect();

        let items = posts
            .into_iter()
            .filter_map(|post| {
                let author = authors.get(&post.author_id)?.author();
                let reactions = tallies.remove(&post.id).unwrap_or_default();
                let total_reactions = reactions.iter().map(|r| r.count).sum();
                Some(FeedItem {
                    recent_comments: comments.remove(&post.id).unwrap_or_default(),
                    reactions,
                    total_reactions,
                    author,
                    post,
                })
            })
            .collect();

        Ok(items)
    }
}

/// Pair each comment with its author snippet, keeping the input order.
pub(crate) async fn with_authors(
    store: &dyn SocialStore,
    comments: Vec<Comment>,
) -> Result<Vec<CommentView>> {
    let mut author_ids: Vec<Uuid> = comments.iter().map(|c| c.author_id).collect();
    author_ids.sort();
    author_ids.dedup();
    let authors: HashMap<Uuid, Account> = store
        .get_accounts(&author_ids)
        .await?
        .into_iter()
        .map(|a| (a.id, a))
        .collect();

    Ok(comments
        .into_iter()
        .filter_map(|comment| {
            let author = authors.get(&comment.author_id)?.author();
            Some(CommentView { comment, author })
        })
        .collect())
}

/// Load a post and its author, refusing viewers the evaluator denies.
pub(crate) async fn load_visible_post(
    store: &dyn SocialStore,
    post_id: Uuid,
    viewer: Option<Uuid>,
) -> Result<(Post, Account)> {
    let post = store
        .get_post(post_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("post {}", post_id)))?;
    let author = store
        .get_account(post.author_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("account {}", post.author_id)))?;

    privacy::ensure_post_visible(viewer, &author, &post)?;
    Ok((post, author))
}
