mod common;

use chrono::{Duration, Utc};
use social_graph_service::domain::{PrivacyTier, ViewOutcome, STORY_TTL_HOURS};
use social_graph_service::services::NewStory;
use social_graph_service::AppError;

use common::{memory_state, register};

fn text(content: &str) -> NewStory {
    NewStory {
        content: content.to_string(),
        content_type: "TEXT".to_string(),
        background_color: Some("#000000".to_string()),
        duration: None,
    }
}

#[tokio::test]
async fn test_story_expires_exactly_at_ttl() {
    let state = memory_state();
    let author = register(&state, "author", PrivacyTier::Public).await;
    let viewer = register(&state, "viewer", PrivacyTier::Public).await;
    state.follow_graph.follow(viewer.id, author.id).await.unwrap();

    let created_at = Utc::now();
    let story = state
        .stories
        .create_story_at(author.id, text("hi"), created_at)
        .await
        .unwrap();
    assert_eq!(story.expires_at - story.created_at, Duration::hours(STORY_TTL_HOURS));

    let just_before = story.expires_at - Duration::seconds(1);
    let tray = state
        .stories
        .active_stories_for_viewer_at(viewer.id, just_before)
        .await
        .unwrap();
    assert_eq!(tray.len(), 1);
    assert_eq!(tray[0].stories[0].id, story.id);

    let at_expiry = state
        .stories
        .active_stories_for_viewer_at(viewer.id, story.expires_at)
        .await
        .unwrap();
    assert!(at_expiry.is_empty());

    assert!(matches!(
        state
            .stories
            .record_view_at(story.id, viewer.id, story.expires_at)
            .await,
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_view_recording_is_idempotent() {
    let state = memory_state();
    let author = register(&state, "author", PrivacyTier::Public).await;
    let viewer = register(&state, "viewer", PrivacyTier::Public).await;
    state.follow_graph.follow(viewer.id, author.id).await.unwrap();

    let story = state.stories.create_story(author.id, text("hi")).await.unwrap();

    assert_eq!(
        state.stories.record_view(story.id, viewer.id).await.unwrap(),
        ViewOutcome::Recorded
    );
    assert_eq!(
        state.stories.record_view(story.id, viewer.id).await.unwrap(),
        ViewOutcome::AlreadyViewed
    );

    let stored = state.store.get_story(story.id).await.unwrap().unwrap();
    assert_eq!(stored.views.len(), 1);
    assert!(stored.views.contains(&viewer.id));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_duplicate_views_record_once() {
    let state = memory_state();
    let author = register(&state, "author", PrivacyTier::Public).await;
    let viewer = register(&state, "viewer", PrivacyTier::Public).await;
    let story = state.stories.create_story(author.id, text("hi")).await.unwrap();

    let attempts = 32;
    let mut handles = Vec::new();
    for _ in 0..attempts {
        let stories = state.stories.clone();
        let (story_id, viewer_id) = (story.id, viewer.id);
        handles.push(tokio::spawn(async move {
            stories.record_view(story_id, viewer_id).await
        }));
    }

    let mut recorded = 0;
    let mut repeated = 0;
    for handle in handles {
        match handle.await.unwrap().unwrap() {
            ViewOutcome::Recorded => recorded += 1,
            ViewOutcome::AlreadyViewed => repeated += 1,
        }
    }
    assert_eq!(recorded, 1);
    assert_eq!(repeated, attempts - 1);

    let stored = state.store.get_story(story.id).await.unwrap().unwrap();
    assert_eq!(stored.views.len(), 1);
}

#[tokio::test]
async fn test_view_by_unknown_account_is_not_found() {
    let state = memory_state();
    let author = register(&state, "author", PrivacyTier::Public).await;
    let story = state.stories.create_story(author.id, text("hi")).await.unwrap();

    assert!(matches!(
        state.stories.record_view(story.id, uuid::Uuid::new_v4()).await,
        Err(AppError::NotFound(_))
    ));
    let stored = state.store.get_story(story.id).await.unwrap().unwrap();
    assert!(stored.views.is_empty());
}

#[tokio::test]
async fn test_tray_groups_by_author_with_viewed_flag() {
    let state = memory_state();
    let viewer = register(&state, "viewer", PrivacyTier::Public).await;
    let early = register(&state, "early", PrivacyTier::Public).await;
    let late = register(&state, "late", PrivacyTier::Public).await;
    let unfollowed = register(&state, "unfollowed", PrivacyTier::Public).await;
    state.follow_graph.follow(viewer.id, early.id).await.unwrap();
    state.follow_graph.follow(viewer.id, late.id).await.unwrap();

    let base = Utc::now() - Duration::hours(2);
    let first = state
        .stories
        .create_story_at(early.id, text("one"), base)
        .await
        .unwrap();
    let second = state
        .stories
        .create_story_at(early.id, text("two"), base + Duration::minutes(10))
        .await
        .unwrap();
    let newest = state
        .stories
        .create_story_at(late.id, text("three"), base + Duration::minutes(30))
        .await
        .unwrap();
    state
        .stories
        .create_story_at(unfollowed.id, text("hidden"), base + Duration::minutes(40))
        .await
        .unwrap();

    state.stories.record_view(first.id, viewer.id).await.unwrap();

    let tray = state.stories.active_stories_for_viewer(viewer.id).await.unwrap();
    assert_eq!(tray.len(), 2);

    assert_eq!(tray[0].author.id, late.id);
    assert_eq!(tray[0].stories.len(), 1);
    assert_eq!(tray[0].stories[0].id, newest.id);
    assert!(!tray[0].viewed);

    assert_eq!(tray[1].author.id, early.id);
    let ids: Vec<_> = tray[1].stories.iter().map(|s| s.id).collect();
    assert_eq!(ids, vec![second.id, first.id]);
    assert!(tray[1].viewed);
    assert!(tray[1].stories[1].viewed_by_me);
    assert!(!tray[1].stories[0].viewed_by_me);
    assert_eq!(tray[1].stories[1].view_count, 1);
}

#[tokio::test]
async fn test_tray_empty_without_follows() {
    let state = memory_state();
    let lonely = register(&state, "lonely", PrivacyTier::Public).await;
    let other = register(&state, "other", PrivacyTier::Public).await;
    state.stories.create_story(other.id, text("hi")).await.unwrap();

    assert!(state
        .stories
        .active_stories_for_viewer(lonely.id)
        .await
        .unwrap()
        .is_empty());
}
