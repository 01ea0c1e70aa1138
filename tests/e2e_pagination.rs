//! E2E tests for the explore feed (cursor pagination) and search

mod common;

use std::collections::HashSet;

use common::TestApp;
use serde_json::json;
use snapgram::data::Collection;
use snapgram::query::{NextPage, QueryKey};

fn seed_posts(app: &TestApp, count: usize) -> Vec<String> {
    (0..count)
        .map(|n| {
            let id = format!("post-{:02}", n);
            app.remote.seed_blob(&format!("blob-{:02}", n), 3);
            app.remote.seed_document(
                Collection::Posts,
                &id,
                json!({
                    "creator": "u1",
                    "caption": format!("Sunset number {}", n),
                    "imageUrl": format!("memory://snapgram/files/blob-{:02}/preview", n),
                    "imageId": format!("blob-{:02}", n),
                    "location": "Lisbon",
                    "tags": ["sunset"],
                    "likes": [],
                }),
            );
            id
        })
        .collect()
}

#[tokio::test]
async fn test_explore_feed_pages_until_empty_page() {
    let app = TestApp::new();
    let ids = seed_posts(&app, 20);

    let data = app.state.posts.get_infinite_posts().await.unwrap();
    assert_eq!(data.pages.len(), 1);
    assert_eq!(data.pages[0].items.len(), 9);
    assert_eq!(data.page_params, vec![None]);
    // Newest first
    assert_eq!(data.pages[0].items[0].id, ids[19]);

    let data = app.state.posts.fetch_next_page().await.unwrap();
    assert_eq!(data.pages.len(), 2);
    assert_eq!(data.page_params[1].as_deref(), Some(ids[11].as_str()));

    let data = app.state.posts.fetch_next_page().await.unwrap();
    assert_eq!(data.pages.len(), 3);
    assert_eq!(data.pages[2].items.len(), 2);
    // A short page still offers a cursor.
    assert!(data.has_next_page());

    let data = app.state.posts.fetch_next_page().await.unwrap();
    assert_eq!(data.pages.len(), 4);
    assert!(data.pages[3].is_empty());
    assert_eq!(data.next_page(), NextPage::End);

    let data = app.state.posts.fetch_next_page().await.unwrap();
    assert_eq!(data.pages.len(), 4);

    let seen: HashSet<&str> = data.items().map(|post| post.id.as_str()).collect();
    assert_eq!(seen.len(), 20);
}

#[tokio::test]
async fn test_empty_feed_has_no_next_page() {
    let app = TestApp::new();

    let data = app.state.posts.get_infinite_posts().await.unwrap();

    assert_eq!(data.pages.len(), 1);
    assert!(data.pages[0].is_empty());
    assert!(!data.has_next_page());
}

#[tokio::test]
async fn test_invalidated_feed_reloads_loaded_pages() {
    let app = TestApp::new();
    let current = app.sign_up("sunny").await;
    seed_posts(&app, 12);

    app.state.posts.get_infinite_posts().await.unwrap();
    app.state.posts.fetch_next_page().await.unwrap();

    let created = app.create_post(&current.user.id, "Fresh catch").await;
    assert!(app.state.coordinator.is_stale(&QueryKey::infinite_posts()).await);

    let data = app.state.posts.get_infinite_posts().await.unwrap();
    assert_eq!(data.pages.len(), 2);
    assert_eq!(data.pages[0].items[0].id, created.id);
    assert_eq!(data.items().count(), 13);
}

#[tokio::test]
async fn test_search_matches_caption_words() {
    let app = TestApp::new();
    seed_posts(&app, 3);
    let ids = seed_posts_with_caption(&app, "harbor-1", "Fishing boats in the harbor");

    assert!(app.state.posts.search_posts("").await.unwrap().is_none());

    let found = app.state.posts.search_posts("harbor").await.unwrap().unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, ids);

    let found = app.state.posts.search_posts("sunset").await.unwrap().unwrap();
    assert_eq!(found.len(), 3);
}

#[tokio::test]
async fn test_search_input_publishes_after_delay() {
    let app = TestApp::new();
    let (input, mut term) = app.state.search_input();

    input.set("har".to_string());
    input.set("harbor".to_string());
    tokio::time::timeout(std::time::Duration::from_secs(5), term.changed())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(*term.borrow(), "harbor");
}

fn seed_posts_with_caption(app: &TestApp, id: &str, caption: &str) -> String {
    app.remote.seed_blob("blob-harbor", 3);
    app.remote.seed_document(
        Collection::Posts,
        id,
        json!({
            "creator": "u1",
            "caption": caption,
            "imageUrl": "memory://snapgram/files/blob-harbor/preview",
            "imageId": "blob-harbor",
        }),
    );
    id.to_string()
}
