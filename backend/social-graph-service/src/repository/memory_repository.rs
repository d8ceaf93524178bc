//! In-process store
//!
//! Implements `SocialStore` over a single `RwLock`; every trait call is atomic
//! with respect to every other. Used for local development (`STORE_BACKEND=memory`)
//! and for the test suite.

use super::{
    AuthorScope, CommitOutcome, EdgeChange, EdgeOp, PostQuery, SocialStore, StoreError,
    StoreResult,
};
use crate::domain::{
    Account, Comment, Hashtag, Post, PrivacyTier, ReactionCount, ReactionToggle, ReactionType,
    Story, ViewOutcome,
};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;
use uuid::Uuid;

#[derive(Default)]
struct State {
    accounts: HashMap<Uuid, Account>,
    usernames: HashMap<String, Uuid>,
    posts: HashMap<Uuid, Post>,
    comments: HashMap<Uuid, Comment>,
    reactions: HashMap<(Uuid, Uuid), ReactionType>,
    comment_reactions: HashMap<(Uuid, Uuid), ReactionType>,
    stories: HashMap<Uuid, Story>,
    hashtags: HashMap<String, Hashtag>,
}

impl State {
    fn require_account(&self, id: Uuid) -> StoreResult<()> {
        if self.accounts.contains_key(&id) {
            Ok(())
        } else {
            Err(StoreError::MissingReference(format!("account {}", id)))
        }
    }

    fn bump_hashtags(&mut self, tags: &[(String, String)]) -> Vec<Hashtag> {
        tags.iter()
            .map(|(key, display)| {
                let entry = self.hashtags.entry(key.clone()).or_insert_with(|| Hashtag {
                    tag: key.clone(),
                    display_tag: display.clone(),
                    count: 0,
                });
                entry.count += 1;
                entry.clone()
            })
            .collect()
    }
}

/// Per-target reaction counts, keyed by the first half of each reaction key.
fn tally(
    reactions: &HashMap<(Uuid, Uuid), ReactionType>,
    ids: &[Uuid],
) -> HashMap<Uuid, Vec<ReactionCount>> {
    let mut counts: HashMap<Uuid, BTreeMap<ReactionType, u64>> = HashMap::new();
    for ((id, _), reaction_type) in reactions.iter() {
        if ids.contains(id) {
            *counts.entry(*id).or_default().entry(*reaction_type).or_default() += 1;
        }
    }
    counts
        .into_iter()
        .map(|(id, by_type)| {
            let tally = by_type
                .into_iter()
                .map(|(reaction_type, count)| ReactionCount {
                    reaction_type,
                    count,
                })
                .collect();
            (id, tally)
        })
        .collect()
}

#[derive(Default)]
pub struct InMemorySocialStore {
    state: RwLock<State>,
}

impl InMemorySocialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn newest_first(
    a_created: DateTime<Utc>,
    a_id: Uuid,
    b_created: DateTime<Utc>,
    b_id: Uuid,
) -> Ordering {
    b_created.cmp(&a_created).then_with(|| b_id.cmp(&a_id))
}

fn in_scope(scopes: &[AuthorScope], post: &Post) -> bool {
    scopes
        .iter()
        .any(|s| s.author_id == post.author_id && s.tiers.contains(&post.privacy_tier))
}

fn by_count_then_tag(a: &Hashtag, b: &Hashtag) -> Ordering {
    b.count.cmp(&a.count).then_with(|| a.tag.cmp(&b.tag))
}

#[async_trait::async_trait]
impl SocialStore for InMemorySocialStore {
    async fn insert_account(&self, account: &Account) -> StoreResult<()> {
        let mut state = self.state.write();
        if state.usernames.contains_key(&account.username) {
            return Err(StoreError::UniqueViolation("username".to_string()));
        }
        if state.accounts.contains_key(&account.id) {
            return Err(StoreError::UniqueViolation("account id".to_string()));
        }
        state.usernames.insert(account.username.clone(), account.id);
        state.accounts.insert(account.id, account.clone());
        Ok(())
    }

    async fn get_account(&self, id: Uuid) -> StoreResult<Option<Account>> {
        Ok(self.state.read().accounts.get(&id).cloned())
    }

    async fn get_account_by_username(&self, username: &str) -> StoreResult<Option<Account>> {
        let state = self.state.read();
        Ok(state
            .usernames
            .get(username)
            .and_then(|id| state.accounts.get(id))
            .cloned())
    }

    async fn get_accounts(&self, ids: &[Uuid]) -> StoreResult<Vec<Account>> {
        let state = self.state.read();
        Ok(ids
            .iter()
            .filter_map(|id| state.accounts.get(id).cloned())
            .collect())
    }

    async fn get_accounts_by_usernames(&self, usernames: &[String]) -> StoreResult<Vec<Account>> {
        let state = self.state.read();
        Ok(usernames
            .iter()
            .filter_map(|name| state.usernames.get(name))
            .filter_map(|id| state.accounts.get(id).cloned())
            .collect())
    }

    async fn update_privacy_tier(&self, id: Uuid, tier: PrivacyTier) -> StoreResult<bool> {
        let mut state = self.state.write();
        match state.accounts.get_mut(&id) {
            Some(account) => {
                account.privacy_tier = tier;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list_public_accounts(
        &self,
        exclude: &[Uuid],
        limit: usize,
    ) -> StoreResult<Vec<Account>> {
        let state = self.state.read();
        let mut accounts: Vec<Account> = state
            .accounts
            .values()
            .filter(|a| a.privacy_tier == PrivacyTier::Public && !exclude.contains(&a.id))
            .cloned()
            .collect();
        accounts.sort_by(|a, b| newest_first(a.created_at, a.id, b.created_at, b.id));
        accounts.truncate(limit);
        Ok(accounts)
    }

    async fn commit_edge(&self, change: EdgeChange) -> StoreResult<CommitOutcome> {
        let mut state = self.state.write();

        let versions = (
            state.accounts.get(&change.follower_id).map(|a| a.graph_version),
            state.accounts.get(&change.followee_id).map(|a| a.graph_version),
        );
        match versions {
            (Some(fv), Some(tv))
                if fv == change.follower_version && tv == change.followee_version => {}
            _ => {
                debug!(
                    follower = %change.follower_id,
                    followee = %change.followee_id,
                    "edge commit rejected: version mismatch"
                );
                return Ok(CommitOutcome::Conflict);
            }
        }

        if let Some(follower) = state.accounts.get_mut(&change.follower_id) {
            match change.op {
                EdgeOp::Add => {
                    if !follower.following_ids.contains(&change.followee_id) {
                        follower.following_ids.push(change.followee_id);
                    }
                }
                EdgeOp::Remove => follower.following_ids.retain(|id| *id != change.followee_id),
            }
            follower.graph_version += 1;
        }
        if let Some(followee) = state.accounts.get_mut(&change.followee_id) {
            match change.op {
                EdgeOp::Add => {
                    if !followee.follower_ids.contains(&change.follower_id) {
                        followee.follower_ids.push(change.follower_id);
                    }
                }
                EdgeOp::Remove => followee.follower_ids.retain(|id| *id != change.follower_id),
            }
            followee.graph_version += 1;
        }

        Ok(CommitOutcome::Applied)
    }

    async fn insert_post(
        &self,
        post: &Post,
        tags: &[(String, String)],
    ) -> StoreResult<Vec<Hashtag>> {
        let mut state = self.state.write();
        state.require_account(post.author_id)?;
        if state.posts.contains_key(&post.id) {
            return Err(StoreError::UniqueViolation("post id".to_string()));
        }
        state.posts.insert(post.id, post.clone());
        Ok(state.bump_hashtags(tags))
    }

    async fn get_post(&self, id: Uuid) -> StoreResult<Option<Post>> {
        Ok(self.state.read().posts.get(&id).cloned())
    }

    async fn update_post(
        &self,
        post: &Post,
        new_tags: &[(String, String)],
    ) -> StoreResult<Option<Vec<Hashtag>>> {
        let mut state = self.state.write();
        match state.posts.get_mut(&post.id) {
            Some(existing) => {
                existing.content = post.content.clone();
                existing.images = post.images.clone();
                existing.videos = post.videos.clone();
                existing.privacy_tier = post.privacy_tier;
                existing.hashtags = post.hashtags.clone();
                existing.mentioned_account_ids = post.mentioned_account_ids.clone();
                existing.updated_at = post.updated_at;
            }
            None => return Ok(None),
        }
        Ok(Some(state.bump_hashtags(new_tags)))
    }

    async fn delete_post(&self, id: Uuid) -> StoreResult<bool> {
        let mut state = self.state.write();
        let removed = state.posts.remove(&id).is_some();
        if removed {
            let dropped: Vec<Uuid> = state
                .comments
                .values()
                .filter(|c| c.post_id == id)
                .map(|c| c.id)
                .collect();
            state.comments.retain(|_, c| c.post_id != id);
            state
                .comment_reactions
                .retain(|(comment_id, _), _| !dropped.contains(comment_id));
            state.reactions.retain(|(post_id, _), _| *post_id != id);
        }
        Ok(removed)
    }

    async fn query_posts(&self, query: &PostQuery) -> StoreResult<(Vec<Post>, u64)> {
        let state = self.state.read();

        let author_is_public = |author_id: &Uuid| {
            state
                .accounts
                .get(author_id)
                .map(|a| a.privacy_tier == PrivacyTier::Public)
                .unwrap_or(false)
        };

        let mut matches: Vec<&Post> = state
            .posts
            .values()
            .filter(|p| {
                in_scope(&query.scopes, p)
                    || (query.include_public
                        && p.privacy_tier == PrivacyTier::Public
                        && author_is_public(&p.author_id))
            })
            .filter(|p| match &query.hashtag {
                Some(tag) => p.has_hashtag(tag),
                None => true,
            })
            .collect();
        matches.sort_by(|a, b| newest_first(a.created_at, a.id, b.created_at, b.id));

        let total = matches.len() as u64;
        let page = matches
            .into_iter()
            .skip(query.offset)
            .take(query.limit)
            .cloned()
            .collect();
        Ok((page, total))
    }

    async fn insert_comment(&self, comment: &Comment) -> StoreResult<()> {
        let mut state = self.state.write();
        state.require_account(comment.author_id)?;
        if !state.posts.contains_key(&comment.post_id) {
            return Err(StoreError::MissingReference(format!("post {}", comment.post_id)));
        }
        state.comments.insert(comment.id, comment.clone());
        Ok(())
    }

    async fn get_comment(&self, id: Uuid) -> StoreResult<Option<Comment>> {
        Ok(self.state.read().comments.get(&id).cloned())
    }

    async fn delete_comment(&self, id: Uuid) -> StoreResult<bool> {
        let mut state = self.state.write();
        let removed = state.comments.remove(&id).is_some();
        if removed {
            state.comment_reactions.retain(|(comment_id, _), _| *comment_id != id);
        }
        Ok(removed)
    }

    async fn list_comments(
        &self,
        post_id: Uuid,
        offset: usize,
        limit: usize,
    ) -> StoreResult<(Vec<Comment>, u64)> {
        let state = self.state.read();
        let mut comments: Vec<&Comment> = state
            .comments
            .values()
            .filter(|c| c.post_id == post_id)
            .collect();
        comments.sort_by(|a, b| newest_first(a.created_at, a.id, b.created_at, b.id));
        let total = comments.len() as u64;
        Ok((
            comments.into_iter().skip(offset).take(limit).cloned().collect(),
            total,
        ))
    }

    async fn recent_comments(
        &self,
        post_ids: &[Uuid],
        per_post: usize,
    ) -> StoreResult<HashMap<Uuid, Vec<Comment>>> {
        let state = self.state.read();
        let mut grouped: HashMap<Uuid, Vec<Comment>> = HashMap::new();
        for comment in state.comments.values() {
            if post_ids.contains(&comment.post_id) {
                grouped.entry(comment.post_id).or_default().push(comment.clone());
            }
        }
        for comments in grouped.values_mut() {
            comments.sort_by(|a, b| newest_first(a.created_at, a.id, b.created_at, b.id));
            comments.truncate(per_post);
        }
        Ok(grouped)
    }

    async fn toggle_reaction(
        &self,
        post_id: Uuid,
        account_id: Uuid,
        reaction_type: ReactionType,
        _now: DateTime<Utc>,
    ) -> StoreResult<ReactionToggle> {
        let mut state = self.state.write();
        state.require_account(account_id)?;
        if !state.posts.contains_key(&post_id) {
            return Err(StoreError::MissingReference(format!("post {}", post_id)));
        }
        let key = (post_id, account_id);
        let outcome = match state.reactions.get(&key).copied() {
            Some(existing) if existing == reaction_type => {
                state.reactions.remove(&key);
                ReactionToggle::Removed
            }
            Some(_) => {
                state.reactions.insert(key, reaction_type);
                ReactionToggle::Changed
            }
            None => {
                state.reactions.insert(key, reaction_type);
                ReactionToggle::Added
            }
        };
        Ok(outcome)
    }

    async fn reaction_tallies(
        &self,
        post_ids: &[Uuid],
    ) -> StoreResult<HashMap<Uuid, Vec<ReactionCount>>> {
        Ok(tally(&self.state.read().reactions, post_ids))
    }

    async fn toggle_comment_reaction(
        &self,
        comment_id: Uuid,
        account_id: Uuid,
        reaction_type: ReactionType,
        _now: DateTime<Utc>,
    ) -> StoreResult<ReactionToggle> {
        let mut state = self.state.write();
        state.require_account(account_id)?;
        if !state.comments.contains_key(&comment_id) {
            return Err(StoreError::MissingReference(format!("comment {}", comment_id)));
        }
        let key = (comment_id, account_id);
        if state.comment_reactions.remove(&key).is_some() {
            Ok(ReactionToggle::Removed)
        } else {
            state.comment_reactions.insert(key, reaction_type);
            Ok(ReactionToggle::Added)
        }
    }

    async fn comment_reaction_tallies(
        &self,
        comment_ids: &[Uuid],
    ) -> StoreResult<HashMap<Uuid, Vec<ReactionCount>>> {
        Ok(tally(&self.state.read().comment_reactions, comment_ids))
    }

    async fn insert_story(&self, story: &Story) -> StoreResult<()> {
        let mut state = self.state.write();
        state.require_account(story.author_id)?;
        state.stories.insert(story.id, story.clone());
        Ok(())
    }

    async fn get_story(&self, id: Uuid) -> StoreResult<Option<Story>> {
        Ok(self.state.read().stories.get(&id).cloned())
    }

    async fn active_stories_by_authors(
        &self,
        author_ids: &[Uuid],
        now: DateTime<Utc>,
    ) -> StoreResult<Vec<Story>> {
        let state = self.state.read();
        let mut stories: Vec<Story> = state
            .stories
            .values()
            .filter(|s| author_ids.contains(&s.author_id) && s.is_active_at(now))
            .cloned()
            .collect();
        stories.sort_by(|a, b| newest_first(a.created_at, a.id, b.created_at, b.id));
        Ok(stories)
    }

    async fn add_story_view(
        &self,
        story_id: Uuid,
        viewer_id: Uuid,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<ViewOutcome>> {
        let mut state = self.state.write();
        let known_viewer = state.accounts.contains_key(&viewer_id);
        match state.stories.get_mut(&story_id) {
            Some(story) if story.is_active_at(now) => {
                if !known_viewer {
                    return Err(StoreError::MissingReference(format!("account {}", viewer_id)));
                }
                if story.views.insert(viewer_id) {
                    Ok(Some(ViewOutcome::Recorded))
                } else {
                    Ok(Some(ViewOutcome::AlreadyViewed))
                }
            }
            _ => Ok(None),
        }
    }

    async fn increment_hashtags(&self, tags: &[(String, String)]) -> StoreResult<Vec<Hashtag>> {
        Ok(self.state.write().bump_hashtags(tags))
    }

    async fn trending_hashtags(&self, limit: usize) -> StoreResult<Vec<Hashtag>> {
        let state = self.state.read();
        let mut tags: Vec<Hashtag> = state.hashtags.values().cloned().collect();
        tags.sort_by(by_count_then_tag);
        tags.truncate(limit);
        Ok(tags)
    }

    async fn search_hashtags(&self, query: &str, limit: usize) -> StoreResult<Vec<Hashtag>> {
        let needle = query.to_lowercase();
        let state = self.state.read();
        let mut tags: Vec<Hashtag> = state
            .hashtags
            .values()
            .filter(|h| h.tag.contains(&needle))
            .cloned()
            .collect();
        tags.sort_by(by_count_then_tag);
        tags.truncate(limit);
        Ok(tags)
    }
}
