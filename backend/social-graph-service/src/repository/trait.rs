use chrono::{DateTime, Utc};
use std::collections::HashMap;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{
    Account, Comment, Hashtag, Post, PrivacyTier, ReactionCount, ReactionToggle, ReactionType,
    Story, ViewOutcome,
};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("duplicate {0}")]
    UniqueViolation(String),

    /// A referenced account, post, comment or story does not exist.
    #[error("unknown {0}")]
    MissingReference(String),

    /// Serialization failure or deadlock; safe to retry.
    #[error("contention: {0}")]
    Contention(String),

    #[error(transparent)]
    Database(#[from] sqlx::Error),

    #[error("corrupt record: {0}")]
    Corrupt(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeOp {
    Add,
    Remove,
}

/// One logical follow edge, written to both account records at once.
///
/// The commit only applies if both records still carry the versions the caller
/// read; otherwise nothing is written and `CommitOutcome::Conflict` is returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeChange {
    pub op: EdgeOp,
    pub follower_id: Uuid,
    pub followee_id: Uuid,
    pub follower_version: i64,
    pub followee_version: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    Applied,
    Conflict,
}

/// Post tiers of one author that a viewer may see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorScope {
    pub author_id: Uuid,
    pub tiers: Vec<PrivacyTier>,
}

/// Filter/sort/skip/limit shape for post queries.
///
/// Matches posts inside any `scopes` entry, plus (when `include_public`) posts
/// whose own tier and author tier are both PUBLIC. Results are ordered by
/// `created_at` desc then `id` desc.
#[derive(Debug, Clone, Default)]
pub struct PostQuery {
    pub scopes: Vec<AuthorScope>,
    pub include_public: bool,
    /// Lowercase tag to match case-insensitively.
    pub hashtag: Option<String>,
    pub offset: usize,
    pub limit: usize,
}

/// Persistence boundary for the social graph core.
#[async_trait::async_trait]
pub trait SocialStore: Send + Sync {
    // ---- accounts -------------------------------------------------------

    /// Insert a new account; `UniqueViolation` when the username is taken
    async fn insert_account(&self, account: &Account) -> StoreResult<()>;

    async fn get_account(&self, id: Uuid) -> StoreResult<Option<Account>>;

    async fn get_account_by_username(&self, username: &str) -> StoreResult<Option<Account>>;

    /// Batch lookup; result follows the order of `ids`, unknown ids are skipped
    async fn get_accounts(&self, ids: &[Uuid]) -> StoreResult<Vec<Account>>;

    async fn get_accounts_by_usernames(&self, usernames: &[String]) -> StoreResult<Vec<Account>>;

    /// Returns false when the account does not exist
    async fn update_privacy_tier(&self, id: Uuid, tier: PrivacyTier) -> StoreResult<bool>;

    /// PUBLIC-tier accounts not listed in `exclude`
    async fn list_public_accounts(
        &self,
        exclude: &[Uuid],
        limit: usize,
    ) -> StoreResult<Vec<Account>>;

    /// Apply a follow-edge change to both records, conditional on their versions
    async fn commit_edge(&self, change: EdgeChange) -> StoreResult<CommitOutcome>;

    // ---- posts ----------------------------------------------------------

    /// Insert a post and add 1 to the counter of each `(key, display)` tag
    /// pair, all or nothing
    async fn insert_post(
        &self,
        post: &Post,
        tags: &[(String, String)],
    ) -> StoreResult<Vec<Hashtag>>;

    async fn get_post(&self, id: Uuid) -> StoreResult<Option<Post>>;

    /// Replace mutable post fields and count `new_tags` in the same unit;
    /// `None` when the post does not exist
    async fn update_post(
        &self,
        post: &Post,
        new_tags: &[(String, String)],
    ) -> StoreResult<Option<Vec<Hashtag>>>;

    /// Delete a post with its comments and reactions
    async fn delete_post(&self, id: Uuid) -> StoreResult<bool>;

    /// Returns the requested page and the total number of matches
    async fn query_posts(&self, query: &PostQuery) -> StoreResult<(Vec<Post>, u64)>;

    // ---- comments & reactions --------------------------------------------

    /// `MissingReference` when the post or the author does not exist
    async fn insert_comment(&self, comment: &Comment) -> StoreResult<()>;

    async fn get_comment(&self, id: Uuid) -> StoreResult<Option<Comment>>;

    async fn delete_comment(&self, id: Uuid) -> StoreResult<bool>;

    /// Newest first
    async fn list_comments(
        &self,
        post_id: Uuid,
        offset: usize,
        limit: usize,
    ) -> StoreResult<(Vec<Comment>, u64)>;

    /// Up to `per_post` newest comments for each post
    async fn recent_comments(
        &self,
        post_ids: &[Uuid],
        per_post: usize,
    ) -> StoreResult<HashMap<Uuid, Vec<Comment>>>;

    /// At most one reaction per (post, account)
    async fn toggle_reaction(
        &self,
        post_id: Uuid,
        account_id: Uuid,
        reaction_type: ReactionType,
        now: DateTime<Utc>,
    ) -> StoreResult<ReactionToggle>;

    async fn reaction_tallies(
        &self,
        post_ids: &[Uuid],
    ) -> StoreResult<HashMap<Uuid, Vec<ReactionCount>>>;

    /// One reaction per (comment, account): any existing reaction is removed,
    /// otherwise `reaction_type` is added
    async fn toggle_comment_reaction(
        &self,
        comment_id: Uuid,
        account_id: Uuid,
        reaction_type: ReactionType,
        now: DateTime<Utc>,
    ) -> StoreResult<ReactionToggle>;

    async fn comment_reaction_tallies(
        &self,
        comment_ids: &[Uuid],
    ) -> StoreResult<HashMap<Uuid, Vec<ReactionCount>>>;

    // ---- stories ----------------------------------------------------------

    async fn insert_story(&self, story: &Story) -> StoreResult<()>;

    async fn get_story(&self, id: Uuid) -> StoreResult<Option<Story>>;

    /// Stories with `expires_at > now`, newest first
    async fn active_stories_by_authors(
        &self,
        author_ids: &[Uuid],
        now: DateTime<Utc>,
    ) -> StoreResult<Vec<Story>>;

    /// Atomic add-if-absent of a viewer; `None` if the story is missing or expired
    async fn add_story_view(
        &self,
        story_id: Uuid,
        viewer_id: Uuid,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<ViewOutcome>>;

    // ---- hashtags ---------------------------------------------------------

    /// Upsert `(key, display)` pairs, adding exactly 1 to each counter
    async fn increment_hashtags(&self, tags: &[(String, String)]) -> StoreResult<Vec<Hashtag>>;

    /// Count desc, tag asc
    async fn trending_hashtags(&self, limit: usize) -> StoreResult<Vec<Hashtag>>;

    /// Case-insensitive substring match, count desc, tag asc
    async fn search_hashtags(&self, query: &str, limit: usize) -> StoreResult<Vec<Hashtag>>;

    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }
}
