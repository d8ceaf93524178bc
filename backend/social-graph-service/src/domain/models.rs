use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use uuid::Uuid;

use crate::error::AppError;

/// Stories stay active for exactly this long after creation.
pub const STORY_TTL_HOURS: i64 = 24;

/// Default display duration hint for a story frame, in seconds.
pub const DEFAULT_STORY_DURATION_SECS: i32 = 5;

// ============================================================================
// Accounts
// ============================================================================

/// Visibility classification for accounts and posts.
///
/// Ordered from least to most restrictive so `max` yields the stricter tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PrivacyTier {
    Public,
    FriendsOnly,
    Private,
}

impl PrivacyTier {
    pub const ALL: [PrivacyTier; 3] = [
        PrivacyTier::Public,
        PrivacyTier::FriendsOnly,
        PrivacyTier::Private,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PrivacyTier::Public => "PUBLIC",
            PrivacyTier::FriendsOnly => "FRIENDS_ONLY",
            PrivacyTier::Private => "PRIVATE",
        }
    }
}

impl Default for PrivacyTier {
    fn default() -> Self {
        PrivacyTier::Public
    }
}

impl fmt::Display for PrivacyTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for PrivacyTier {
    type Error = AppError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "PUBLIC" => Ok(PrivacyTier::Public),
            "FRIENDS_ONLY" => Ok(PrivacyTier::FriendsOnly),
            "PRIVATE" => Ok(PrivacyTier::Private),
            other => Err(AppError::Validation(format!("invalid privacy tier: {}", other))),
        }
    }
}

/// Account record as held by the store.
///
/// `follower_ids` and `following_ids` are insertion-ordered and duplicate-free.
/// They are only ever changed through `SocialStore::commit_edge`, which also
/// bumps `graph_version`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: Uuid,
    pub username: String,
    pub profile_pic: Option<String>,
    pub bio: Option<String>,
    pub privacy_tier: PrivacyTier,
    pub follower_ids: Vec<Uuid>,
    pub following_ids: Vec<Uuid>,
    pub graph_version: i64,
    pub created_at: DateTime<Utc>,
}

impl Account {
    pub fn new(username: impl Into<String>, privacy_tier: PrivacyTier) -> Self {
        Self {
            id: Uuid::new_v4(),
            username: username.into(),
            profile_pic: None,
            bio: None,
            privacy_tier,
            follower_ids: Vec::new(),
            following_ids: Vec::new(),
            graph_version: 0,
            created_at: Utc::now(),
        }
    }

    pub fn follows(&self, account_id: Uuid) -> bool {
        self.following_ids.contains(&account_id)
    }

    pub fn is_followed_by(&self, account_id: Uuid) -> bool {
        self.follower_ids.contains(&account_id)
    }

    pub fn summary(&self) -> AccountSummary {
        AccountSummary {
            id: self.id,
            username: self.username.clone(),
            profile_pic: self.profile_pic.clone(),
            bio: self.bio.clone(),
            followers_count: self.follower_ids.len() as u64,
        }
    }

    pub fn author(&self) -> AuthorSnippet {
        AuthorSnippet {
            id: self.id,
            username: self.username.clone(),
            profile_pic: self.profile_pic.clone(),
        }
    }
}

/// Public profile view of an account.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountProfile {
    pub id: Uuid,
    pub username: String,
    pub profile_pic: Option<String>,
    pub bio: Option<String>,
    pub privacy_tier: PrivacyTier,
    pub followers_count: u64,
    pub following_count: u64,
    pub created_at: DateTime<Utc>,
}

impl From<&Account> for AccountProfile {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id,
            username: account.username.clone(),
            profile_pic: account.profile_pic.clone(),
            bio: account.bio.clone(),
            privacy_tier: account.privacy_tier,
            followers_count: account.follower_ids.len() as u64,
            following_count: account.following_ids.len() as u64,
            created_at: account.created_at,
        }
    }
}

/// Entry in follower/following/suggestion listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountSummary {
    pub id: Uuid,
    pub username: String,
    pub profile_pic: Option<String>,
    pub bio: Option<String>,
    pub followers_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorSnippet {
    pub id: Uuid,
    pub username: String,
    pub profile_pic: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowCounts {
    pub followers: u64,
    pub following: u64,
}

// ============================================================================
// Posts, comments, reactions
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: Uuid,
    pub author_id: Uuid,
    pub content: String,
    pub images: Vec<String>,
    pub videos: Vec<String>,
    pub privacy_tier: PrivacyTier,
    /// Display forms; distinct case-insensitively.
    pub hashtags: Vec<String>,
    /// Resolved mentions in authored order, duplicates kept.
    pub mentioned_account_ids: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Post {
    pub fn has_hashtag(&self, tag: &str) -> bool {
        let key = tag.to_lowercase();
        self.hashtags.iter().any(|t| t.to_lowercase() == key)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: Uuid,
    pub post_id: Uuid,
    pub author_id: Uuid,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

/// Comment together with who wrote it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentView {
    #[serde(flatten)]
    pub comment: Comment,
    pub author: AuthorSnippet,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReactionType {
    Like,
    Love,
    Laugh,
    Wow,
    Sad,
    Angry,
}

impl ReactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReactionType::Like => "LIKE",
            ReactionType::Love => "LOVE",
            ReactionType::Laugh => "LAUGH",
            ReactionType::Wow => "WOW",
            ReactionType::Sad => "SAD",
            ReactionType::Angry => "ANGRY",
        }
    }
}

impl Default for ReactionType {
    fn default() -> Self {
        ReactionType::Like
    }
}

impl TryFrom<&str> for ReactionType {
    type Error = AppError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "LIKE" => Ok(ReactionType::Like),
            "LOVE" => Ok(ReactionType::Love),
            "LAUGH" => Ok(ReactionType::Laugh),
            "WOW" => Ok(ReactionType::Wow),
            "SAD" => Ok(ReactionType::Sad),
            "ANGRY" => Ok(ReactionType::Angry),
            other => Err(AppError::Validation(format!("invalid reaction type: {}", other))),
        }
    }
}

/// Result of toggling a reaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReactionToggle {
    Added,
    Changed,
    Removed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReactionCount {
    pub reaction_type: ReactionType,
    pub count: u64,
}

/// Post as rendered in feeds: bounded comment preview plus full reaction tally.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedItem {
    #[serde(flatten)]
    pub post: Post,
    pub author: AuthorSnippet,
    pub recent_comments: Vec<CommentView>,
    pub reactions: Vec<ReactionCount>,
    pub total_reactions: u64,
}

// ============================================================================
// Stories
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StoryContentType {
    Image,
    Video,
    Text,
}

impl StoryContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoryContentType::Image => "IMAGE",
            StoryContentType::Video => "VIDEO",
            StoryContentType::Text => "TEXT",
        }
    }
}

impl TryFrom<&str> for StoryContentType {
    type Error = AppError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "IMAGE" => Ok(StoryContentType::Image),
            "VIDEO" => Ok(StoryContentType::Video),
            "TEXT" => Ok(StoryContentType::Text),
            other => Err(AppError::InvalidType(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Story {
    pub id: Uuid,
    pub author_id: Uuid,
    pub content: String,
    pub content_type: StoryContentType,
    pub background_color: Option<String>,
    /// Display hint only; never affects `expires_at`.
    pub duration_secs: i32,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub views: BTreeSet<Uuid>,
}

impl Story {
    pub fn expiry_for(created_at: DateTime<Utc>) -> DateTime<Utc> {
        created_at + Duration::hours(STORY_TTL_HOURS)
    }

    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

/// Story as exposed to a particular viewer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryItem {
    pub id: Uuid,
    pub content: String,
    pub content_type: StoryContentType,
    pub background_color: Option<String>,
    pub duration: i32,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub view_count: u64,
    pub viewed_by_me: bool,
}

impl StoryItem {
    pub fn for_viewer(story: &Story, viewer_id: Uuid) -> Self {
        Self {
            id: story.id,
            content: story.content.clone(),
            content_type: story.content_type,
            background_color: story.background_color.clone(),
            duration: story.duration_secs,
            created_at: story.created_at,
            expires_at: story.expires_at,
            view_count: story.views.len() as u64,
            viewed_by_me: story.views.contains(&viewer_id),
        }
    }
}

/// All active stories of one author, newest first.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryGroup {
    pub author: AuthorSnippet,
    pub stories: Vec<StoryItem>,
    pub viewed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewOutcome {
    Recorded,
    AlreadyViewed,
}

// ============================================================================
// Hashtags
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hashtag {
    /// Lowercase aggregation key.
    pub tag: String,
    /// Literal form of the first recorded occurrence.
    pub display_tag: String,
    pub count: i64,
}

// ============================================================================
// Pagination
// ============================================================================

/// 1-based skip/limit page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub page_size: u32,
}

impl PageRequest {
    pub fn new(page: u32, page_size: u32) -> Self {
        Self {
            page: page.max(1),
            page_size: page_size.max(1),
        }
    }

    pub fn offset(&self) -> usize {
        (self.page as usize - 1) * self.page_size as usize
    }

    pub fn limit(&self) -> usize {
        self.page_size as usize
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
    pub last_page: u32,
    pub has_more: bool,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: u64, request: PageRequest) -> Self {
        let last_page = if total == 0 {
            1
        } else {
            ((total + request.page_size as u64 - 1) / request.page_size as u64) as u32
        };
        let has_more = (request.offset() as u64 + items.len() as u64) < total;
        Self {
            items,
            total,
            page: request.page,
            page_size: request.page_size,
            last_page,
            has_more,
        }
    }
}
