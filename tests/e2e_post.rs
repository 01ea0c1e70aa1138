//! E2E tests for post operations (create, update, delete) and their blobs

mod common;

use common::{TestApp, image, post_form};
use snapgram::data::{Collection, RemoteOp};
use snapgram::error::{AppError, ErrorKind};
use snapgram::query::QueryKey;

#[tokio::test]
async fn test_create_post_uploads_one_image_and_marks_feed_stale() {
    let app = TestApp::new();
    let current = app.sign_up("sunny").await;

    let recent = app.state.posts.get_recent_posts().await.unwrap();
    assert!(recent.is_empty());

    let post = app.create_post(&current.user.id, "Hello").await;

    assert_eq!(app.remote.call_count(RemoteOp::UploadBlob), 1);
    assert_eq!(app.remote.call_count(RemoteOp::BlobPreview), 1);
    assert!(app.remote.has_blob(&post.image_id));

    let stored = app.remote.document(Collection::Posts, &post.id).unwrap();
    assert_eq!(
        stored.field("imageId").and_then(|v| v.as_str().map(str::to_string)),
        Some(post.image_id.clone())
    );
    assert_eq!(post.creator, current.user.id);
    assert_eq!(post.tags, vec!["travel".to_string(), "sea".to_string()]);

    assert!(app.state.coordinator.is_stale(&QueryKey::recent_posts()).await);
    let recent = app.state.posts.get_recent_posts().await.unwrap();
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].id, post.id);
}

#[tokio::test]
async fn test_short_caption_is_rejected_before_any_call() {
    let app = TestApp::new();
    let current = app.sign_up("sunny").await;
    let calls_before = app.remote.calls().len();

    let error = app
        .state
        .posts
        .create_post(&current.user.id, post_form("Hi"))
        .await
        .unwrap_err();

    assert_eq!(error.kind(), ErrorKind::ValidationFailure);
    match error {
        AppError::Validation(fields) => {
            assert!(fields.contains("caption"));
            assert!(!fields.contains("location"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(app.remote.calls().len(), calls_before);
    assert_eq!(app.remote.call_count(RemoteOp::UploadBlob), 0);
}

#[tokio::test]
async fn test_create_post_without_image_is_missing_prerequisite() {
    let app = TestApp::new();
    let current = app.sign_up("sunny").await;

    let mut form = post_form("A picture-less post");
    form.file = None;
    let error = app
        .state
        .posts
        .create_post(&current.user.id, form)
        .await
        .unwrap_err();

    assert_eq!(error.kind(), ErrorKind::MissingPrerequisite);
    assert_eq!(app.remote.call_count(RemoteOp::UploadBlob), 0);
}

#[tokio::test]
async fn test_failed_record_write_leaves_no_orphaned_blob() {
    let app = TestApp::new();
    let current = app.sign_up("sunny").await;

    app.remote.fail_next(RemoteOp::CreateDocument);
    let error = app
        .state
        .posts
        .create_post(&current.user.id, post_form("Beach day"))
        .await
        .unwrap_err();

    assert_eq!(error.kind(), ErrorKind::RemoteCallFailure);
    assert_eq!(app.remote.call_count(RemoteOp::UploadBlob), 1);
    assert_eq!(app.remote.call_count(RemoteOp::DeleteBlob), 1);
    assert!(app.remote.blob_ids().is_empty());
    assert!(app.remote.orphaned_blobs().is_empty());
    assert_eq!(app.remote.document_count(Collection::Posts), 0);
}

#[tokio::test]
async fn test_update_post_deletes_old_image_after_record_points_at_new_one() {
    let app = TestApp::new();
    let current = app.sign_up("sunny").await;
    let post = app.create_post(&current.user.id, "Beach day").await;
    let old_image = post.image_id.clone();

    let mut form = post_form("Beach day, golden hour");
    form.file = Some(image("sunset.jpg"));
    let updated = app.state.posts.update_post(&post, form).await.unwrap();

    assert_ne!(updated.image_id, old_image);
    assert_eq!(updated.caption, "Beach day, golden hour");
    assert!(app.remote.has_blob(&updated.image_id));
    assert!(!app.remote.has_blob(&old_image));
    assert!(app.remote.orphaned_blobs().is_empty());

    let calls = app.remote.calls();
    let write = calls
        .iter()
        .position(|call| call.op == RemoteOp::UpdateDocument && call.succeeded)
        .unwrap();
    let release = calls
        .iter()
        .position(|call| {
            call.op == RemoteOp::DeleteBlob && call.target.as_deref() == Some(old_image.as_str())
        })
        .unwrap();
    assert!(write < release);
}

#[tokio::test]
async fn test_failed_update_keeps_old_image_and_drops_new_one() {
    let app = TestApp::new();
    let current = app.sign_up("sunny").await;
    let post = app.create_post(&current.user.id, "Beach day").await;

    app.remote.fail_next(RemoteOp::UpdateDocument);
    let mut form = post_form("Beach day, golden hour");
    form.file = Some(image("sunset.jpg"));
    let result = app.state.posts.update_post(&post, form).await;

    assert!(result.is_err());
    assert_eq!(app.remote.blob_ids(), vec![post.image_id.clone()]);
    assert!(app.remote.orphaned_blobs().is_empty());

    let stored = app.remote.document(Collection::Posts, &post.id).unwrap();
    assert_eq!(
        stored.field("caption").and_then(|v| v.as_str().map(str::to_string)),
        Some("Beach day".to_string())
    );
}

#[tokio::test]
async fn test_update_without_new_file_keeps_image() {
    let app = TestApp::new();
    let current = app.sign_up("sunny").await;
    let post = app.create_post(&current.user.id, "Beach day").await;

    let mut form = post_form("Beach day again");
    form.file = None;
    let updated = app.state.posts.update_post(&post, form).await.unwrap();

    assert_eq!(updated.image_id, post.image_id);
    assert!(app.remote.has_blob(&post.image_id));
    assert_eq!(app.remote.call_count(RemoteOp::UploadBlob), 1);
    assert_eq!(app.remote.call_count(RemoteOp::DeleteBlob), 0);
}

#[tokio::test]
async fn test_delete_post_removes_record_and_image() {
    let app = TestApp::new();
    let current = app.sign_up("sunny").await;
    let post = app.create_post(&current.user.id, "Beach day").await;

    app.state
        .posts
        .delete_post(&post.id, &post.image_id)
        .await
        .unwrap();

    assert!(app.remote.document(Collection::Posts, &post.id).is_none());
    assert!(!app.remote.has_blob(&post.image_id));
}

#[tokio::test]
async fn test_delete_post_requires_both_ids() {
    let app = TestApp::new();
    let current = app.sign_up("sunny").await;
    let post = app.create_post(&current.user.id, "Beach day").await;
    let calls_before = app.remote.calls().len();

    let error = app
        .state
        .posts
        .delete_post(&post.id, "")
        .await
        .unwrap_err();

    assert_eq!(error.kind(), ErrorKind::MissingPrerequisite);
    assert_eq!(app.remote.calls().len(), calls_before);
    assert!(app.remote.document(Collection::Posts, &post.id).is_some());
}

#[tokio::test]
async fn test_delete_post_keeps_image_when_record_delete_fails() {
    let app = TestApp::new();
    let current = app.sign_up("sunny").await;
    let post = app.create_post(&current.user.id, "Beach day").await;

    app.remote.fail_next(RemoteOp::DeleteDocument);
    let result = app.state.posts.delete_post(&post.id, &post.image_id).await;

    assert!(result.is_err());
    assert!(app.remote.document(Collection::Posts, &post.id).is_some());
    assert!(app.remote.has_blob(&post.image_id));
    assert_eq!(app.remote.call_count(RemoteOp::DeleteBlob), 0);
}

#[tokio::test]
async fn test_save_and_unsave_post_updates_current_user() {
    let app = TestApp::new();
    let current = app.sign_up("sunny").await;
    let post = app.create_post(&current.user.id, "Beach day").await;

    let saved = app
        .state
        .posts
        .save_post(&current.user.id, &post.id)
        .await
        .unwrap();
    let refreshed = app.state.auth.get_current_user().await.unwrap();
    assert_eq!(refreshed.saved_record(&post.id).map(|s| s.id.clone()), Some(saved.id.clone()));

    app.state.posts.delete_saved_post(&saved.id).await.unwrap();
    let refreshed = app.state.auth.get_current_user().await.unwrap();
    assert!(refreshed.saved_record(&post.id).is_none());
}

#[tokio::test]
async fn test_user_posts_lists_only_that_creator() {
    let app = TestApp::new();
    let sunny = app.sign_up("sunny").await;
    let misty = app.sign_up("misty").await;
    app.create_post(&sunny.user.id, "Beach day").await;
    let mine = app.create_post(&misty.user.id, "Fog over the bay").await;

    assert!(app.state.posts.get_user_posts("").await.unwrap().is_none());

    let posts = app
        .state
        .posts
        .get_user_posts(&misty.user.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].id, mine.id);
}
