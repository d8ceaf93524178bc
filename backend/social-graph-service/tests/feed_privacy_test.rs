mod common;

use chrono::{Duration, Utc};
use social_graph_service::domain::{PageRequest, PrivacyTier, ReactionType};
use social_graph_service::services::hashtags::extract;
use social_graph_service::services::DenialReason;
use social_graph_service::AppError;

use common::{memory_state, post, register};

fn page() -> PageRequest {
    PageRequest::new(1, 20)
}

#[tokio::test]
async fn test_mutual_follow_post_reaches_feed_and_trending() {
    let state = memory_state();
    let a = register(&state, "A", PrivacyTier::Public).await;
    let b = register(&state, "B", PrivacyTier::Public).await;
    state.follow_graph.follow(a.id, b.id).await.unwrap();
    state.follow_graph.follow(b.id, a.id).await.unwrap();

    let content = "hello #go @B";
    let created = state
        .posts
        .create_post(a.id, post(content, PrivacyTier::Public))
        .await
        .unwrap();
    assert_eq!(created.hashtags, vec!["go".to_string()]);
    assert_eq!(created.mentioned_account_ids, vec![b.id]);

    let extracted = extract(content);
    assert_eq!(extracted.hashtags, vec!["go".to_string()]);
    assert_eq!(extracted.mentions, vec!["B".to_string()]);

    let feed = state.feed.get_feed(b.id, page()).await.unwrap();
    assert!(feed.items.iter().any(|item| item.post.id == created.id));
    assert_eq!(feed.items[0].author.username, "A");

    let trending = state.hashtags.trending(1).await.unwrap();
    assert_eq!(trending.len(), 1);
    assert_eq!(trending[0].tag, "go");
    assert!(trending[0].count >= 1);
}

#[tokio::test]
async fn test_private_account_posts_only_visible_to_owner() {
    let state = memory_state();
    let c = register(&state, "C", PrivacyTier::Private).await;
    let d = register(&state, "D", PrivacyTier::Public).await;

    let created = state
        .posts
        .create_post(c.id, post("only for me", PrivacyTier::Public))
        .await
        .unwrap();

    let as_d = state.feed.get_user_posts("C", Some(d.id), page()).await.unwrap();
    assert!(as_d.items.is_empty());
    assert_eq!(as_d.total, 0);

    let anonymous = state.feed.get_user_posts("C", None, page()).await.unwrap();
    assert!(anonymous.items.is_empty());

    let as_self = state.feed.get_user_posts("C", Some(c.id), page()).await.unwrap();
    assert_eq!(as_self.items.len(), 1);
    assert_eq!(as_self.items[0].post.id, created.id);

    // following a PRIVATE account still grants nothing
    state.follow_graph.follow(d.id, c.id).await.unwrap();
    let after_follow = state.feed.get_user_posts("C", Some(d.id), page()).await.unwrap();
    assert!(after_follow.items.is_empty());
    assert!(!state
        .feed
        .get_feed(d.id, page())
        .await
        .unwrap()
        .items
        .iter()
        .any(|item| item.post.id == created.id));

    assert!(matches!(
        state.feed.get_post(created.id, Some(d.id)).await,
        Err(AppError::Forbidden(DenialReason::Private))
    ));
}

#[tokio::test]
async fn test_friends_only_requires_following() {
    let state = memory_state();
    let author = register(&state, "author", PrivacyTier::Public).await;
    let fan = register(&state, "fan", PrivacyTier::Public).await;
    let stranger = register(&state, "stranger", PrivacyTier::Public).await;
    state.follow_graph.follow(fan.id, author.id).await.unwrap();

    let public = state
        .posts
        .create_post(author.id, post("for everyone", PrivacyTier::Public))
        .await
        .unwrap();
    let circle = state
        .posts
        .create_post(author.id, post("for followers", PrivacyTier::FriendsOnly))
        .await
        .unwrap();

    let fan_view = state.feed.get_user_posts("author", Some(fan.id), page()).await.unwrap();
    assert_eq!(fan_view.total, 2);

    let stranger_view = state
        .feed
        .get_user_posts("author", Some(stranger.id), page())
        .await
        .unwrap();
    assert_eq!(stranger_view.total, 1);
    assert_eq!(stranger_view.items[0].post.id, public.id);

    assert!(matches!(
        state.feed.get_post(circle.id, Some(stranger.id)).await,
        Err(AppError::Forbidden(DenialReason::NotFollowing))
    ));
    assert!(matches!(
        state.feed.get_post(circle.id, None).await,
        Err(AppError::Forbidden(DenialReason::RequiresAuth))
    ));
    assert!(state.feed.get_post(public.id, None).await.is_ok());

    // the tier follows the edge: unfollowing hides FRIENDS_ONLY again
    state.follow_graph.unfollow(fan.id, author.id).await.unwrap();
    let after = state.feed.get_user_posts("author", Some(fan.id), page()).await.unwrap();
    assert_eq!(after.total, 1);
}

#[tokio::test]
async fn test_friends_only_account_caps_public_posts() {
    let state = memory_state();
    let author = register(&state, "guarded", PrivacyTier::FriendsOnly).await;
    let stranger = register(&state, "stranger", PrivacyTier::Public).await;

    let created = state
        .posts
        .create_post(author.id, post("public post, guarded account", PrivacyTier::Public))
        .await
        .unwrap();

    assert!(matches!(
        state.feed.get_post(created.id, Some(stranger.id)).await,
        Err(AppError::Forbidden(DenialReason::NotFollowing))
    ));

    state.follow_graph.follow(stranger.id, author.id).await.unwrap();
    assert!(state.feed.get_post(created.id, Some(stranger.id)).await.is_ok());
}

#[tokio::test]
async fn test_feed_is_newest_first_and_paged() {
    let state = memory_state();
    let viewer = register(&state, "viewer", PrivacyTier::Public).await;
    let author = register(&state, "author", PrivacyTier::Public).await;
    let unrelated = register(&state, "unrelated", PrivacyTier::Public).await;
    state.follow_graph.follow(viewer.id, author.id).await.unwrap();

    let base = Utc::now() - Duration::hours(1);
    let mut ids = Vec::new();
    for i in 0..5 {
        let created = state
            .posts
            .create_post_at(
                author.id,
                post(&format!("post {}", i), PrivacyTier::Public),
                base + Duration::minutes(i),
            )
            .await
            .unwrap();
        ids.push(created.id);
    }
    let own = state
        .posts
        .create_post_at(viewer.id, post("mine", PrivacyTier::Private), base + Duration::minutes(10))
        .await
        .unwrap();
    state
        .posts
        .create_post(unrelated.id, post("not followed", PrivacyTier::Public))
        .await
        .unwrap();

    let first = state.feed.get_feed(viewer.id, PageRequest::new(1, 4)).await.unwrap();
    assert_eq!(first.total, 6);
    assert!(first.has_more);
    let first_ids: Vec<_> = first.items.iter().map(|item| item.post.id).collect();
    assert_eq!(first_ids, vec![own.id, ids[4], ids[3], ids[2]]);

    let second = state.feed.get_feed(viewer.id, PageRequest::new(2, 4)).await.unwrap();
    let second_ids: Vec<_> = second.items.iter().map(|item| item.post.id).collect();
    assert_eq!(second_ids, vec![ids[1], ids[0]]);
    assert!(!second.has_more);
}

#[tokio::test]
async fn test_same_timestamp_posts_order_by_id_desc() {
    let state = memory_state();
    let viewer = register(&state, "viewer", PrivacyTier::Public).await;
    let author = register(&state, "author", PrivacyTier::Public).await;
    state.follow_graph.follow(viewer.id, author.id).await.unwrap();

    let at = Utc::now() - Duration::minutes(5);
    let mut ids = Vec::new();
    for i in 0..4 {
        let created = state
            .posts
            .create_post_at(author.id, post(&format!("tie {}", i), PrivacyTier::Public), at)
            .await
            .unwrap();
        ids.push(created.id);
    }
    let newer = state
        .posts
        .create_post_at(author.id, post("later", PrivacyTier::Public), at + Duration::seconds(1))
        .await
        .unwrap();

    let mut expected = ids.clone();
    expected.sort_by(|a, b| b.cmp(a));
    expected.insert(0, newer.id);

    let feed = state.feed.get_feed(viewer.id, page()).await.unwrap();
    let got: Vec<_> = feed.items.iter().map(|item| item.post.id).collect();
    assert_eq!(got, expected);

    // paging splits the tie without repeating or skipping
    let mut paged = Vec::new();
    for n in 1..=3 {
        let chunk = state.feed.get_feed(viewer.id, PageRequest::new(n, 2)).await.unwrap();
        paged.extend(chunk.items.iter().map(|item| item.post.id));
    }
    assert_eq!(paged, expected);
}

#[tokio::test]
async fn test_feed_items_carry_comment_preview_and_tally() {
    let state = memory_state();
    let author = register(&state, "author", PrivacyTier::Public).await;
    let fan = register(&state, "fan", PrivacyTier::Public).await;
    let other = register(&state, "other", PrivacyTier::Public).await;
    state.follow_graph.follow(fan.id, author.id).await.unwrap();

    let created = state
        .posts
        .create_post(author.id, post("hello", PrivacyTier::Public))
        .await
        .unwrap();

    let base = Utc::now();
    for i in 0..3 {
        state
            .posts
            .add_comment_at(created.id, fan.id, format!("c{}", i), base + Duration::seconds(i))
            .await
            .unwrap();
    }
    state.posts.react(created.id, fan.id, ReactionType::Like).await.unwrap();
    state.posts.react(created.id, other.id, ReactionType::Love).await.unwrap();

    let feed = state.feed.get_feed(fan.id, page()).await.unwrap();
    let item = &feed.items[0];
    let previews: Vec<&str> = item
        .recent_comments
        .iter()
        .map(|c| c.comment.text.as_str())
        .collect();
    assert_eq!(previews, vec!["c2", "c1"]);
    assert!(item.recent_comments.iter().all(|c| c.author.username == "fan"));
    assert_eq!(item.total_reactions, 2);
    assert_eq!(item.reactions.len(), 2);

    let comments = state
        .posts
        .list_comments(created.id, Some(fan.id), page())
        .await
        .unwrap();
    assert_eq!(comments.total, 3);
    assert_eq!(comments.items[0].comment.text, "c2");
    assert_eq!(comments.items[0].author.id, fan.id);
}

#[tokio::test]
async fn test_comments_and_reactions_respect_visibility() {
    let state = memory_state();
    let author = register(&state, "author", PrivacyTier::Public).await;
    let stranger = register(&state, "stranger", PrivacyTier::Public).await;

    let circle = state
        .posts
        .create_post(author.id, post("followers only", PrivacyTier::FriendsOnly))
        .await
        .unwrap();

    assert!(matches!(
        state
            .posts
            .add_comment(circle.id, stranger.id, "hi".to_string())
            .await,
        Err(AppError::Forbidden(DenialReason::NotFollowing))
    ));
    assert!(matches!(
        state.posts.react(circle.id, stranger.id, ReactionType::Like).await,
        Err(AppError::Forbidden(_))
    ));
    assert!(matches!(
        state.posts.delete_post(circle.id, stranger.id).await,
        Err(AppError::Forbidden(DenialReason::NotOwner))
    ));
}
