mod common;

use social_graph_service::domain::PrivacyTier;
use social_graph_service::services::PostPatch;

use common::{memory_state, post, register};

#[tokio::test]
async fn test_case_variants_share_one_counter() {
    let state = memory_state();
    let author = register(&state, "author", PrivacyTier::Public).await;

    let first = state
        .posts
        .create_post(author.id, post("learning #Go today", PrivacyTier::Public))
        .await
        .unwrap();
    assert_eq!(first.hashtags, vec!["Go".to_string()]);

    state
        .posts
        .create_post(author.id, post("more #GO and #go", PrivacyTier::Public))
        .await
        .unwrap();

    let trending = state.hashtags.trending(10).await.unwrap();
    assert_eq!(trending.len(), 1);
    assert_eq!(trending[0].tag, "go");
    assert_eq!(trending[0].display_tag, "Go");
    assert_eq!(trending[0].count, 2);
}

#[tokio::test]
async fn test_counters_never_decrease() {
    let state = memory_state();
    let author = register(&state, "author", PrivacyTier::Public).await;

    let created = state
        .posts
        .create_post(author.id, post("#rust #tokio", PrivacyTier::Public))
        .await
        .unwrap();

    // dropping #tokio and adding #actix only bumps the new tag
    state
        .posts
        .update_post(
            created.id,
            author.id,
            PostPatch {
                content: Some("#rust #actix".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    state.posts.delete_post(created.id, author.id).await.unwrap();

    let counts: Vec<(String, i64)> = state
        .hashtags
        .trending(10)
        .await
        .unwrap()
        .into_iter()
        .map(|h| (h.tag, h.count))
        .collect();
    assert_eq!(
        counts,
        vec![
            ("actix".to_string(), 1),
            ("rust".to_string(), 1),
            ("tokio".to_string(), 1),
        ]
    );
}

#[tokio::test]
async fn test_trending_order_and_search() {
    let state = memory_state();

    for content in ["#alpha #beta", "#beta #gamma", "#beta"] {
        state.hashtags.process_content(content).await.unwrap();
    }

    let trending = state.hashtags.trending(2).await.unwrap();
    let tags: Vec<&str> = trending.iter().map(|h| h.tag.as_str()).collect();
    assert_eq!(tags, vec!["beta", "alpha"]);
    assert_eq!(trending[0].count, 3);

    let found = state.hashtags.search("AM", 10).await.unwrap();
    let tags: Vec<&str> = found.iter().map(|h| h.tag.as_str()).collect();
    assert_eq!(tags, vec!["gamma"]);

    assert!(state.hashtags.search("   ", 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_process_content_resolves_known_mentions() {
    let state = memory_state();
    let known = register(&state, "known", PrivacyTier::Public).await;

    let processed = state
        .hashtags
        .process_content("ping @known and @ghost #Hello")
        .await
        .unwrap();

    assert_eq!(processed.hashtags.len(), 1);
    assert_eq!(processed.hashtags[0].tag, "hello");
    assert_eq!(processed.mentions.len(), 1);
    assert_eq!(processed.mentions[0].id, known.id);
}

#[tokio::test]
async fn test_hashtag_posts_case_insensitive_and_privacy_filtered() {
    let state = memory_state();
    let viewer = register(&state, "viewer", PrivacyTier::Public).await;
    let open = register(&state, "open", PrivacyTier::Public).await;
    let circle = register(&state, "circle", PrivacyTier::FriendsOnly).await;

    let visible = state
        .posts
        .create_post(open.id, post("#Rust is fun", PrivacyTier::Public))
        .await
        .unwrap();
    let guarded = state
        .posts
        .create_post(circle.id, post("#rust for friends", PrivacyTier::Public))
        .await
        .unwrap();

    let page = social_graph_service::domain::PageRequest::new(1, 10);
    let before = state
        .feed
        .hashtag_posts("RUST", Some(viewer.id), page)
        .await
        .unwrap();
    let ids: Vec<_> = before.items.iter().map(|item| item.post.id).collect();
    assert_eq!(ids, vec![visible.id]);

    state.follow_graph.follow(viewer.id, circle.id).await.unwrap();
    let after = state
        .feed
        .hashtag_posts("#rust", Some(viewer.id), page)
        .await
        .unwrap();
    assert_eq!(after.total, 2);
    assert!(after.items.iter().any(|item| item.post.id == guarded.id));

    let anonymous = state.feed.hashtag_posts("rust", None, page).await.unwrap();
    assert_eq!(anonymous.total, 1);
}
