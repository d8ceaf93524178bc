//! Posts, comments and reactions
//!
//! Authoring paths: tag and mention extraction on write, owner-only edits,
//! and visibility-gated comments and reactions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::domain::{
    Account, Comment, CommentView, Page, PageRequest, Post, PrivacyTier, ReactionCount,
    ReactionToggle, ReactionType,
};
use crate::error::{AppError, Result};
use crate::repository::SocialStore;
use crate::services::feed::{load_visible_post, with_authors};
use crate::services::hashtags::{self, HashtagService};
use crate::services::privacy;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPost {
    pub content: String,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub videos: Vec<String>,
    /// Defaults to PUBLIC
    pub privacy_tier: Option<PrivacyTier>,
    /// Extra tags on top of those written in `content`
    #[serde(default)]
    pub hashtags: Vec<String>,
}

/// Partial update; absent fields stay as they are.
///
/// Tags supplied on top of the content survive a content-only edit; sending
/// `hashtags` replaces them.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostPatch {
    pub content: Option<String>,
    pub images: Option<Vec<String>>,
    pub videos: Option<Vec<String>>,
    pub privacy_tier: Option<PrivacyTier>,
    pub hashtags: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReactionSummary {
    pub outcome: ReactionToggle,
    pub reactions: Vec<ReactionCount>,
    pub total_reactions: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReactionTally {
    pub reactions: Vec<ReactionCount>,
    pub total_reactions: u64,
}

impl From<Vec<ReactionCount>> for ReactionTally {
    fn from(reactions: Vec<ReactionCount>) -> Self {
        let total_reactions = reactions.iter().map(|r| r.count).sum();
        Self {
            reactions,
            total_reactions,
        }
    }
}

#[derive(Clone)]
pub struct PostService {
    store: Arc<dyn SocialStore>,
    hashtags: HashtagService,
}

fn non_empty(text: &str, field: &str) -> Result<()> {
    if text.trim().is_empty() {
        Err(AppError::Validation(format!("{} must not be empty", field)))
    } else {
        Ok(())
    }
}

impl PostService {
    pub fn new(store: Arc<dyn SocialStore>, hashtags: HashtagService) -> Self {
        Self { store, hashtags }
    }

    pub async fn create_post(&self, author_id: Uuid, new_post: NewPost) -> Result<Post> {
        self.create_post_at(author_id, new_post, Utc::now()).await
    }

    pub async fn create_post_at(
        &self,
        author_id: Uuid,
        new_post: NewPost,
        now: DateTime<Utc>,
    ) -> Result<Post> {
        non_empty(&new_post.content, "content")?;

        let author = self.require_account(author_id).await?;

        let explicit = hashtags::normalize_tags(&new_post.hashtags)?;
        let tags = hashtags::dedup_tags(
            hashtags::extract(&new_post.content)
                .hashtags
                .into_iter()
                .chain(explicit),
        );
        let mentioned_account_ids = self
            .hashtags
            .resolve_mentions(&hashtags::scan_mentions(&new_post.content))
            .await?;

        let post = Post {
            id: Uuid::new_v4(),
            author_id: author.id,
            content: new_post.content,
            images: new_post.images,
            videos: new_post.videos,
            privacy_tier: new_post.privacy_tier.unwrap_or_default(),
            hashtags: tags,
            mentioned_account_ids,
            created_at: now,
            updated_at: now,
        };

        let counted = self
            .store
            .insert_post(&post, &hashtags::tag_pairs(&post.hashtags))
            .await?;
        hashtags::note_counted(&counted);

        info!(post = %post.id, author = %author.id, tier = %post.privacy_tier, "post created");
        Ok(post)
    }

    /// Author-only edit. Tags new to the post bump their counters; removed
    /// tags leave counters untouched.
    pub async fn update_post(
        &self,
        post_id: Uuid,
        editor_id: Uuid,
        patch: PostPatch,
    ) -> Result<Post> {
        let mut post = self.require_post(post_id).await?;
        privacy::ensure_owner(editor_id, post.author_id)?;

        let previous_keys: HashSet<String> =
            post.hashtags.iter().map(|t| hashtags::tag_key(t)).collect();
        let retag = patch.content.is_some() || patch.hashtags.is_some();

        // stored tags that the old content does not produce were supplied explicitly
        let explicit = match patch.hashtags {
            Some(tags) => hashtags::normalize_tags(&tags)?,
            None => {
                let from_content: HashSet<String> = hashtags::extract(&post.content)
                    .hashtags
                    .iter()
                    .map(|t| hashtags::tag_key(t))
                    .collect();
                post.hashtags
                    .iter()
                    .filter(|t| !from_content.contains(&hashtags::tag_key(t)))
                    .cloned()
                    .collect()
            }
        };

        if let Some(content) = patch.content {
            non_empty(&content, "content")?;
            post.mentioned_account_ids = self
                .hashtags
                .resolve_mentions(&hashtags::scan_mentions(&content))
                .await?;
            post.content = content;
        }
        if retag {
            post.hashtags = hashtags::dedup_tags(
                hashtags::extract(&post.content)
                    .hashtags
                    .into_iter()
                    .chain(explicit),
            );
        }
        if let Some(images) = patch.images {
            post.images = images;
        }
        if let Some(videos) = patch.videos {
            post.videos = videos;
        }
        if let Some(tier) = patch.privacy_tier {
            post.privacy_tier = tier;
        }
        post.updated_at = Utc::now().max(post.created_at);

        let introduced: Vec<String> = post
            .hashtags
            .iter()
            .filter(|t| !previous_keys.contains(&hashtags::tag_key(t)))
            .cloned()
            .collect();
        let counted = self
            .store
            .update_post(&post, &hashtags::tag_pairs(&introduced))
            .await?
            .ok_or_else(|| AppError::NotFound(format!("post {}", post_id)))?;
        hashtags::note_counted(&counted);

        info!(post = %post.id, editor = %editor_id, "post updated");
        Ok(post)
    }

    pub async fn delete_post(&self, post_id: Uuid, editor_id: Uuid) -> Result<()> {
        let post = self.require_post(post_id).await?;
        privacy::ensure_owner(editor_id, post.author_id)?;

        if !self.store.delete_post(post_id).await? {
            return Err(AppError::NotFound(format!("post {}", post_id)));
        }
        info!(post = %post_id, "post deleted");
        Ok(())
    }

    pub async fn add_comment(
        &self,
        post_id: Uuid,
        author_id: Uuid,
        text: String,
    ) -> Result<CommentView> {
        self.add_comment_at(post_id, author_id, text, Utc::now()).await
    }

    pub async fn add_comment_at(
        &self,
        post_id: Uuid,
        author_id: Uuid,
        text: String,
        now: DateTime<Utc>,
    ) -> Result<CommentView> {
        non_empty(&text, "text")?;
        let author = self.require_account(author_id).await?;
        load_visible_post(self.store.as_ref(), post_id, Some(author_id)).await?;

        let comment = Comment {
            id: Uuid::new_v4(),
            post_id,
            author_id,
            text,
            created_at: now,
        };
        self.store.insert_comment(&comment).await?;
        Ok(CommentView {
            comment,
            author: author.author(),
        })
    }

    /// Newest first, each with its author.
    pub async fn list_comments(
        &self,
        post_id: Uuid,
        viewer: Option<Uuid>,
        page: PageRequest,
    ) -> Result<Page<CommentView>> {
        load_visible_post(self.store.as_ref(), post_id, viewer).await?;
        let (comments, total) = self
            .store
            .list_comments(post_id, page.offset(), page.limit())
            .await?;
        let views = with_authors(self.store.as_ref(), comments).await?;
        Ok(Page::new(views, total, page))
    }

    pub async fn delete_comment(&self, comment_id: Uuid, editor_id: Uuid) -> Result<()> {
        let comment = self.require_comment(comment_id).await?;
        privacy::ensure_owner(editor_id, comment.author_id)?;

        if !self.store.delete_comment(comment_id).await? {
            return Err(AppError::NotFound(format!("comment {}", comment_id)));
        }
        Ok(())
    }

    /// Toggle `reaction_type` on a post: add, switch type, or remove.
    pub async fn react(
        &self,
        post_id: Uuid,
        account_id: Uuid,
        reaction_type: ReactionType,
    ) -> Result<ReactionSummary> {
        self.require_account(account_id).await?;
        load_visible_post(self.store.as_ref(), post_id, Some(account_id)).await?;

        let outcome = self
            .store
            .toggle_reaction(post_id, account_id, reaction_type, Utc::now())
            .await?;
        let tally = self.post_tally(post_id).await?;

        Ok(ReactionSummary {
            outcome,
            reactions: tally.reactions,
            total_reactions: tally.total_reactions,
        })
    }

    /// Toggle a reaction on a comment: an existing reaction of any type is
    /// removed, otherwise `reaction_type` is added. Gated by the parent post.
    pub async fn react_to_comment(
        &self,
        comment_id: Uuid,
        account_id: Uuid,
        reaction_type: ReactionType,
    ) -> Result<ReactionSummary> {
        self.require_account(account_id).await?;
        let comment = self.require_comment(comment_id).await?;
        load_visible_post(self.store.as_ref(), comment.post_id, Some(account_id)).await?;

        let outcome = self
            .store
            .toggle_comment_reaction(comment_id, account_id, reaction_type, Utc::now())
            .await?;
        let tally = self.comment_tally(comment_id).await?;

        info!(comment = %comment_id, account = %account_id, ?outcome, "comment reaction toggled");
        Ok(ReactionSummary {
            outcome,
            reactions: tally.reactions,
            total_reactions: tally.total_reactions,
        })
    }

    /// Per-type reaction counts of a comment the viewer may see.
    pub async fn comment_reactions(
        &self,
        comment_id: Uuid,
        viewer: Option<Uuid>,
    ) -> Result<ReactionTally> {
        let comment = self.require_comment(comment_id).await?;
        load_visible_post(self.store.as_ref(), comment.post_id, viewer).await?;
        self.comment_tally(comment_id).await
    }

    async fn post_tally(&self, post_id: Uuid) -> Result<ReactionTally> {
        let mut tallies = self.store.reaction_tallies(&[post_id]).await?;
        Ok(tallies.remove(&post_id).unwrap_or_default().into())
    }

    async fn comment_tally(&self, comment_id: Uuid) -> Result<ReactionTally> {
        let mut tallies = self.store.comment_reaction_tallies(&[comment_id]).await?;
        Ok(tallies.remove(&comment_id).unwrap_or_default().into())
    }

    async fn require_account(&self, account_id: Uuid) -> Result<Account> {
        self.store
            .get_account(account_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("account {}", account_id)))
    }

    async fn require_comment(&self, comment_id: Uuid) -> Result<Comment> {
        self.store
            .get_comment(comment_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("comment {}", comment_id)))
    }

    async fn require_post(&self, post_id: Uuid) -> Result<Post> {
        self.store
            .get_post(post_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("post {}", post_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::InMemorySocialStore;
    use crate::services::privacy::DenialReason;

    async fn setup() -> (PostService, HashtagService, Arc<InMemorySocialStore>) {
        let store = Arc::new(InMemorySocialStore::new());
        let hashtags = HashtagService::new(store.clone());
        (PostService::new(store.clone(), hashtags.clone()), hashtags, store)
    }

    async fn account(store: &InMemorySocialStore, name: &str, tier: PrivacyTier) -> Account {
        let account = Account::new(name, tier);
        store.insert_account(&account).await.unwrap();
        account
    }

    #[tokio::test]
    async fn test_create_post_extracts_tags_and_mentions() {
        let (posts, hashtags, store) = setup().await;
        let author = account(&store, "author", PrivacyTier::Public).await;
        let bob = account(&store, "bob", PrivacyTier::Public).await;

        let post = posts
            .create_post(
                author.id,
                NewPost {
                    content: "hi @bob #Rust @nobody @bob #rust".into(),
                    hashtags: vec!["#async".into(), "RUST".into()],
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(post.hashtags, vec!["Rust", "async"]);
        assert_eq!(post.mentioned_account_ids, vec![bob.id, bob.id]);
        assert_eq!(post.privacy_tier, PrivacyTier::Public);

        let trending = hashtags.trending(10).await.unwrap();
        assert_eq!(trending.len(), 2);
        assert!(trending.iter().all(|h| h.count == 1));
    }

    #[tokio::test]
    async fn test_empty_content_rejected() {
        let (posts, _, store) = setup().await;
        let author = account(&store, "author", PrivacyTier::Public).await;
        let result = posts
            .create_post(author.id, NewPost { content: "   ".into(), ..Default::default() })
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_update_only_counts_new_tags() {
        let (posts, hashtags, store) = setup().await;
        let author = account(&store, "author", PrivacyTier::Public).await;
        let post = posts
            .create_post(author.id, NewPost { content: "#one #two".into(), ..Default::default() })
            .await
            .unwrap();

        let updated = posts
            .update_post(
                post.id,
                author.id,
                PostPatch {
                    content: Some("#ONE #three".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.hashtags, vec!["ONE", "three"]);
        assert_eq!(updated.created_at, post.created_at);

        let counts: Vec<(String, i64)> = hashtags
            .trending(10)
            .await
            .unwrap()
            .into_iter()
            .map(|h| (h.tag, h.count))
            .collect();
        assert!(counts.contains(&("one".to_string(), 1)));
        assert!(counts.contains(&("two".to_string(), 1)));
        assert!(counts.contains(&("three".to_string(), 1)));
    }

    #[tokio::test]
    async fn test_content_edit_keeps_supplied_tags() {
        let (posts, hashtags, store) = setup().await;
        let author = account(&store, "author", PrivacyTier::Public).await;
        let post = posts
            .create_post(
                author.id,
                NewPost {
                    content: "hello #intro".into(),
                    hashtags: vec!["rust".into()],
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(post.hashtags, vec!["intro", "rust"]);

        let edited = posts
            .update_post(
                post.id,
                author.id,
                PostPatch {
                    content: Some("hello world".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(edited.hashtags, vec!["rust"]);

        // an explicit list replaces the supplied tags
        let retagged = posts
            .update_post(
                post.id,
                author.id,
                PostPatch {
                    hashtags: Some(vec!["#tokio".into()]),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(retagged.hashtags, vec!["tokio"]);

        let rust = hashtags.search("rust", 1).await.unwrap();
        assert_eq!(rust[0].count, 1);
    }

    #[tokio::test]
    async fn test_unknown_actor_is_not_found() {
        let (posts, _, store) = setup().await;
        let author = account(&store, "author", PrivacyTier::Public).await;
        let post = posts
            .create_post(author.id, NewPost { content: "open".into(), ..Default::default() })
            .await
            .unwrap();
        let comment = posts
            .add_comment(post.id, author.id, "first".into())
            .await
            .unwrap();
        let ghost = Uuid::new_v4();

        assert!(matches!(
            posts.add_comment(post.id, ghost, "hi".into()).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            posts.react(post.id, ghost, ReactionType::Like).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            posts.react_to_comment(comment.comment.id, ghost, ReactionType::Like).await,
            Err(AppError::NotFound(_))
        ));

        let (_, total) = store.list_comments(post.id, 0, 10).await.unwrap();
        assert_eq!(total, 1);
        assert!(store.reaction_tallies(&[post.id]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_comment_reaction_toggle_and_tally() {
        let (posts, _, store) = setup().await;
        let author = account(&store, "author", PrivacyTier::Public).await;
        let fan = account(&store, "fan", PrivacyTier::Public).await;
        let post = posts
            .create_post(author.id, NewPost { content: "thread".into(), ..Default::default() })
            .await
            .unwrap();
        let comment = posts
            .add_comment(post.id, author.id, "reply here".into())
            .await
            .unwrap();
        assert_eq!(comment.author.username, "author");
        let comment_id = comment.comment.id;

        let added = posts
            .react_to_comment(comment_id, fan.id, ReactionType::Love)
            .await
            .unwrap();
        assert_eq!(added.outcome, ReactionToggle::Added);
        posts
            .react_to_comment(comment_id, author.id, ReactionType::Like)
            .await
            .unwrap();

        let tally = posts.comment_reactions(comment_id, None).await.unwrap();
        assert_eq!(tally.total_reactions, 2);
        assert_eq!(
            tally.reactions,
            vec![
                ReactionCount { reaction_type: ReactionType::Like, count: 1 },
                ReactionCount { reaction_type: ReactionType::Love, count: 1 },
            ]
        );

        // any second reaction from the same account clears the first
        let removed = posts
            .react_to_comment(comment_id, fan.id, ReactionType::Wow)
            .await
            .unwrap();
        assert_eq!(removed.outcome, ReactionToggle::Removed);
        assert_eq!(removed.total_reactions, 1);

        posts.delete_comment(comment_id, author.id).await.unwrap();
        assert!(store
            .comment_reaction_tallies(&[comment_id])
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_comment_reactions_follow_post_visibility() {
        let (posts, _, store) = setup().await;
        let author = account(&store, "author", PrivacyTier::Public).await;
        let stranger = account(&store, "stranger", PrivacyTier::Public).await;
        let post = posts
            .create_post(
                author.id,
                NewPost {
                    content: "only me".into(),
                    privacy_tier: Some(PrivacyTier::Private),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let comment = posts
            .add_comment(post.id, author.id, "memo".into())
            .await
            .unwrap();

        assert!(matches!(
            posts
                .react_to_comment(comment.comment.id, stranger.id, ReactionType::Like)
                .await,
            Err(AppError::Forbidden(DenialReason::Private))
        ));
        assert!(matches!(
            posts.comment_reactions(comment.comment.id, Some(stranger.id)).await,
            Err(AppError::Forbidden(DenialReason::Private))
        ));
        assert!(matches!(
            posts.comment_reactions(Uuid::new_v4(), Some(author.id)).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_only_author_edits_and_deletes() {
        let (posts, _, store) = setup().await;
        let author = account(&store, "author", PrivacyTier::Public).await;
        let other = account(&store, "other", PrivacyTier::Public).await;
        let post = posts
            .create_post(author.id, NewPost { content: "mine".into(), ..Default::default() })
            .await
            .unwrap();

        assert!(matches!(
            posts.update_post(post.id, other.id, PostPatch::default()).await,
            Err(AppError::Forbidden(DenialReason::NotOwner))
        ));
        assert!(matches!(
            posts.delete_post(post.id, other.id).await,
            Err(AppError::Forbidden(DenialReason::NotOwner))
        ));
        posts.delete_post(post.id, author.id).await.unwrap();
        assert!(store.get_post(post.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_reaction_toggle_cycle() {
        let (posts, _, store) = setup().await;
        let author = account(&store, "author", PrivacyTier::Public).await;
        let fan = account(&store, "fan", PrivacyTier::Public).await;
        let post = posts
            .create_post(author.id, NewPost { content: "react".into(), ..Default::default() })
            .await
            .unwrap();

        let added = posts.react(post.id, fan.id, ReactionType::Like).await.unwrap();
        assert_eq!(added.outcome, ReactionToggle::Added);
        assert_eq!(added.total_reactions, 1);

        let changed = posts.react(post.id, fan.id, ReactionType::Love).await.unwrap();
        assert_eq!(changed.outcome, ReactionToggle::Changed);
        assert_eq!(
            changed.reactions,
            vec![ReactionCount { reaction_type: ReactionType::Love, count: 1 }]
        );

        let removed = posts.react(post.id, fan.id, ReactionType::Love).await.unwrap();
        assert_eq!(removed.outcome, ReactionToggle::Removed);
        assert_eq!(removed.total_reactions, 0);
    }

    #[tokio::test]
    async fn test_comments_gated_by_visibility() {
        let (posts, _, store) = setup().await;
        let author = account(&store, "author", PrivacyTier::Public).await;
        let stranger = account(&store, "stranger", PrivacyTier::Public).await;
        let secret = posts
            .create_post(
                author.id,
                NewPost {
                    content: "friends only".into(),
                    privacy_tier: Some(PrivacyTier::FriendsOnly),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert!(matches!(
            posts.add_comment(secret.id, stranger.id, "hi".into()).await,
            Err(AppError::Forbidden(DenialReason::NotFollowing))
        ));
        assert!(matches!(
            posts.list_comments(secret.id, None, PageRequest::new(1, 10)).await,
            Err(AppError::Forbidden(DenialReason::RequiresAuth))
        ));

        let comment = posts
            .add_comment(secret.id, author.id, "note to self".into())
            .await
            .unwrap();
        assert!(matches!(
            posts.delete_comment(comment.comment.id, stranger.id).await,
            Err(AppError::Forbidden(DenialReason::NotOwner))
        ));
        posts.delete_comment(comment.comment.id, author.id).await.unwrap();
    }
}
