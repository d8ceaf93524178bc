//! Ephemeral stories
//!
//! Expiry is decided at read time against `expires_at`; nothing is swept or
//! deleted for a story to disappear.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::domain::{
    Account, Story, StoryContentType, StoryGroup, StoryItem, ViewOutcome,
    DEFAULT_STORY_DURATION_SECS,
};
use crate::error::{AppError, Result};
use crate::metrics::STORY_VIEW_EVENTS_TOTAL;
use crate::repository::SocialStore;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewStory {
    pub content: String,
    /// IMAGE, VIDEO or TEXT
    #[serde(rename = "type")]
    pub content_type: String,
    /// Only kept for TEXT stories
    pub background_color: Option<String>,
    /// Display hint in seconds; has no effect on expiry
    pub duration: Option<i32>,
}

#[derive(Clone)]
pub struct StoryService {
    store: Arc<dyn SocialStore>,
}

impl StoryService {
    pub fn new(store: Arc<dyn SocialStore>) -> Self {
        Self { store }
    }

    pub async fn create_story(&self, author_id: Uuid, payload: NewStory) -> Result<Story> {
        self.create_story_at(author_id, payload, Utc::now()).await
    }

    pub async fn create_story_at(
        &self,
        author_id: Uuid,
        payload: NewStory,
        now: DateTime<Utc>,
    ) -> Result<Story> {
        let content_type = StoryContentType::try_from(payload.content_type.as_str())?;

        let duration_secs = payload.duration.unwrap_or(DEFAULT_STORY_DURATION_SECS);
        if duration_secs <= 0 {
            return Err(AppError::Validation(
                "duration must be a positive number of seconds".to_string(),
            ));
        }

        if self.store.get_account(author_id).await?.is_none() {
            return Err(AppError::NotFound(format!("account {}", author_id)));
        }

        let background_color = match content_type {
            StoryContentType::Text => payload.background_color,
            _ => None,
        };

        let story = Story {
            id: Uuid::new_v4(),
            author_id,
            content: payload.content,
            content_type,
            background_color,
            duration_secs,
            created_at: now,
            expires_at: Story::expiry_for(now),
            views: Default::default(),
        };

        self.store.insert_story(&story).await?;
        info!(
            story = %story.id,
            author = %author_id,
            expires_at = %story.expires_at,
            "story created"
        );
        Ok(story)
    }

    pub async fn active_stories_for_viewer(&self, viewer_id: Uuid) -> Result<Vec<StoryGroup>> {
        self.active_stories_for_viewer_at(viewer_id, Utc::now()).await
    }

    /// Active stories of followed accounts, one group per author.
    ///
    /// Groups are ordered by their newest story; stories inside a group are
    /// newest first.
    pub async fn active_stories_for_viewer_at(
        &self,
        viewer_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<StoryGroup>> {
        let viewer = self
            .store
            .get_account(viewer_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("account {}", viewer_id)))?;

        if viewer.following_ids.is_empty() {
            return Ok(Vec::new());
        }

        let stories = self
            .store
            .active_stories_by_authors(&viewer.following_ids, now)
            .await?;

        let mut author_order: Vec<Uuid> = Vec::new();
        let mut by_author: HashMap<Uuid, Vec<Story>> = HashMap::new();
        for story in stories {
            let group = by_author.entry(story.author_id).or_insert_with(|| {
                author_order.push(story.author_id);
                Vec::new()
            });
            group.push(story);
        }

        let authors: HashMap<Uuid, Account> = self
            .store
            .get_accounts(&author_order)
            .await?
            .into_iter()
            .map(|a| (a.id, a))
            .collect();

        let groups = author_order
            .into_iter()
            .filter_map(|author_id| {
                let author = authors.get(&author_id)?;
                let stories = by_author.remove(&author_id)?;
                let viewed = stories.iter().any(|s| s.views.contains(&viewer_id));
                Some(StoryGroup {
                    author: author.author(),
                    stories: stories
                        .iter()
                        .map(|s| StoryItem::for_viewer(s, viewer_id))
                        .collect(),
                    viewed,
                })
            })
            .collect::<Vec<_>>();

        debug!(viewer = %viewer_id, groups = groups.len(), "story tray composed");
        Ok(groups)
    }

    pub async fn record_view(&self, story_id: Uuid, viewer_id: Uuid) -> Result<ViewOutcome> {
        self.record_view_at(story_id, viewer_id, Utc::now()).await
    }

    /// Idempotent; repeat views are not an error and are counted once.
    pub async fn record_view_at(
        &self,
        story_id: Uuid,
        viewer_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<ViewOutcome> {
        if self.store.get_account(viewer_id).await?.is_none() {
            return Err(AppError::NotFound(format!("account {}", viewer_id)));
        }

        match self.store.add_story_view(story_id, viewer_id, now).await? {
            Some(outcome) => {
                let label = match outcome {
                    ViewOutcome::Recorded => "recorded",
                    ViewOutcome::AlreadyViewed => "already_viewed",
                };
                STORY_VIEW_EVENTS_TOTAL.with_label_values(&[label]).inc();
                Ok(outcome)
            }
            None => {
                STORY_VIEW_EVENTS_TOTAL.with_label_values(&["rejected"]).inc();
                Err(AppError::NotFound(format!(
                    "story {} not found or expired",
                    story_id
                )))
            }
        }
    }
}
