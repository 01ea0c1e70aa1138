//! E2E tests for query caching and mutation invalidation

mod common;

use common::{TestApp, wait_for};
use snapgram::data::RemoteOp;
use snapgram::query::QueryKey;

#[tokio::test]
async fn test_cached_query_does_not_hit_backend_again() {
    let app = TestApp::new();
    let current = app.sign_up("sunny").await;
    app.create_post(&current.user.id, "Beach day").await;

    app.state.posts.get_recent_posts().await.unwrap();
    let lists = app.remote.call_count(RemoteOp::ListDocuments);
    let again = app.state.posts.get_recent_posts().await.unwrap();

    assert_eq!(again.len(), 1);
    assert_eq!(app.remote.call_count(RemoteOp::ListDocuments), lists);
}

#[tokio::test]
async fn test_like_marks_post_feeds_and_current_user_stale() {
    let app = TestApp::new();
    let current = app.sign_up("sunny").await;
    let post = app.create_post(&current.user.id, "Beach day").await;

    app.state.posts.get_post_by_id(&post.id).await.unwrap();
    app.state.posts.get_recent_posts().await.unwrap();
    app.state.posts.get_infinite_posts().await.unwrap();
    app.state.auth.get_current_user().await.unwrap();
    app.state.users.get_users(None).await.unwrap();

    let liked = app
        .state
        .posts
        .toggle_like(&post, &current.user.id)
        .await
        .unwrap();
    assert!(liked.is_liked_by(&current.user.id));

    let coordinator = &app.state.coordinator;
    assert!(coordinator.is_stale(&QueryKey::post_by_id(&post.id)).await);
    assert!(coordinator.is_stale(&QueryKey::recent_posts()).await);
    assert!(coordinator.is_stale(&QueryKey::infinite_posts()).await);
    assert!(coordinator.is_stale(&QueryKey::current_user()).await);
    assert!(!coordinator.is_stale(&QueryKey::users(None)).await);

    let detail = app
        .state
        .posts
        .get_post_by_id(&post.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(detail.likes, vec![current.user.id.clone()]);
}

#[tokio::test]
async fn test_failed_like_invalidates_nothing() {
    let app = TestApp::new();
    let current = app.sign_up("sunny").await;
    let post = app.create_post(&current.user.id, "Beach day").await;

    app.state.posts.get_post_by_id(&post.id).await.unwrap();
    app.state.posts.get_recent_posts().await.unwrap();
    app.state.posts.get_infinite_posts().await.unwrap();

    app.remote.fail_next(RemoteOp::UpdateDocument);
    let result = app.state.posts.toggle_like(&post, &current.user.id).await;
    assert!(result.is_err());

    let stats = app.state.coordinator.stats().await;
    assert_eq!(stats.stale_entries, 0);

    let detail = app
        .state
        .posts
        .get_post_by_id(&post.id)
        .await
        .unwrap()
        .unwrap();
    assert!(detail.likes.is_empty());
}

#[tokio::test]
async fn test_like_on_one_post_keeps_other_detail_fresh() {
    let app = TestApp::new();
    let current = app.sign_up("sunny").await;
    let liked = app.create_post(&current.user.id, "Beach day").await;
    let other = app.create_post(&current.user.id, "Harbor night").await;

    app.state.posts.get_post_by_id(&liked.id).await.unwrap();
    app.state.posts.get_post_by_id(&other.id).await.unwrap();

    app.state
        .posts
        .toggle_like(&liked, &current.user.id)
        .await
        .unwrap();

    let coordinator = &app.state.coordinator;
    assert!(coordinator.is_stale(&QueryKey::post_by_id(&liked.id)).await);
    assert!(!coordinator.is_stale(&QueryKey::post_by_id(&other.id)).await);
}

#[tokio::test]
async fn test_observer_refetches_after_mutation() {
    let app = TestApp::new();
    let current = app.sign_up("sunny").await;

    let mut observer = app.state.posts.observe_recent_posts().await;
    let state = observer.settled().await.unwrap();
    assert_eq!(state.data.map(|posts| posts.len()), Some(0));

    let post = app.create_post(&current.user.id, "Beach day").await;

    let state = wait_for(&mut observer, |state| {
        state.data.as_ref().is_some_and(|posts| posts.len() == 1) && !state.is_fetching
    })
    .await;
    assert_eq!(state.data.unwrap()[0].id, post.id);
    assert!(!state.is_stale);
}

#[tokio::test]
async fn test_unobserved_query_waits_for_next_read() {
    let app = TestApp::new();
    let current = app.sign_up("sunny").await;

    app.state.posts.get_recent_posts().await.unwrap();
    let lists = app.remote.call_count(RemoteOp::ListDocuments);

    app.create_post(&current.user.id, "Beach day").await;
    tokio::task::yield_now().await;

    assert_eq!(app.remote.call_count(RemoteOp::ListDocuments), lists);
    assert!(app.state.coordinator.is_stale(&QueryKey::recent_posts()).await);
}

#[tokio::test]
async fn test_like_refreshes_cached_search_results() {
    let app = TestApp::new();
    let current = app.sign_up("sunny").await;
    let post = app.create_post(&current.user.id, "Golden hour").await;

    let found = app.state.posts.search_posts("golden").await.unwrap().unwrap();
    assert!(found[0].likes.is_empty());

    app.state
        .posts
        .toggle_like(&post, &current.user.id)
        .await
        .unwrap();
    assert!(app.state.coordinator.is_stale(&QueryKey::search_posts("golden")).await);

    let found = app.state.posts.search_posts("golden").await.unwrap().unwrap();
    assert_eq!(found[0].likes, vec![current.user.id.clone()]);
}
