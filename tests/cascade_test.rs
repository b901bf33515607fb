mod common;

use axum::http::{Method, StatusCode};
use harvest_api::entities::RecordStatus;
use serde_json::json;

use common::TestApp;

struct Tree {
    category: String,
    root: String,
    child: String,
    sibling: String,
    grandchild: String,
}

async fn seed_tree(app: &TestApp) -> Tree {
    let category = app.seed_category("Brassicas").await;
    let root = app.seed_description(&category, "Cabbage", None).await;
    let child = app.seed_description(&category, "Red cabbage", Some(&root)).await;
    let sibling = app.seed_description(&category, "Savoy", Some(&root)).await;
    let grandchild = app
        .seed_description(&category, "Red cabbage (early)", Some(&child))
        .await;
    Tree {
        category,
        root,
        child,
        sibling,
        grandchild,
    }
}

#[tokio::test]
async fn delete_deactivates_direct_children_only() {
    let app = TestApp::new().await;
    let tree = seed_tree(&app).await;

    let (status, body) = app
        .send(Method::DELETE, &format!("/api/v1/descriptions/{}", tree.root), None)
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["status"], "inactive");

    assert_eq!(app.description_status(&tree.root).await, RecordStatus::Inactive);
    assert_eq!(app.description_status(&tree.child).await, RecordStatus::Inactive);
    assert_eq!(app.description_status(&tree.sibling).await, RecordStatus::Inactive);
    assert_eq!(
        app.description_status(&tree.grandchild).await,
        RecordStatus::Active
    );
}

#[tokio::test]
async fn put_with_inactive_status_cascades() {
    let app = TestApp::new().await;
    let tree = seed_tree(&app).await;

    let (status, _) = app
        .send(
            Method::PUT,
            &format!("/api/v1/descriptions/{}", tree.child),
            Some(json!({ "status": "inactive" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    assert_eq!(
        app.description_status(&tree.grandchild).await,
        RecordStatus::Inactive
    );
    assert_eq!(app.description_status(&tree.root).await, RecordStatus::Active);
    assert_eq!(app.description_status(&tree.sibling).await, RecordStatus::Active);
}

#[tokio::test]
async fn patch_with_inactive_status_cascades() {
    let app = TestApp::new().await;
    let tree = seed_tree(&app).await;

    let (status, _) = app
        .send(
            Method::PATCH,
            "/api/v1/descriptions",
            Some(json!({ "id": tree.root, "updates": { "status": "inactive" } })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.description_status(&tree.child).await, RecordStatus::Inactive);
}

#[tokio::test]
async fn saving_an_inactive_child_again_does_not_reach_grandchildren() {
    let app = TestApp::new().await;
    let tree = seed_tree(&app).await;

    app.send(
        Method::DELETE,
        &format!("/api/v1/descriptions/{}", tree.root),
        None,
    )
    .await;

    // Child is already inactive; saving it as inactive is not a transition
    let (status, _) = app
        .send(
            Method::PUT,
            &format!("/api/v1/descriptions/{}", tree.child),
            Some(json!({ "status": "inactive" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        app.description_status(&tree.grandchild).await,
        RecordStatus::Active
    );

    // A fresh deactivation of the child does cascade
    app.send(
        Method::POST,
        &format!("/api/v1/descriptions/{}/restore", tree.child),
        None,
    )
    .await;
    app.send(
        Method::DELETE,
        &format!("/api/v1/descriptions/{}", tree.child),
        None,
    )
    .await;
    assert_eq!(
        app.description_status(&tree.grandchild).await,
        RecordStatus::Inactive
    );
}

#[tokio::test]
async fn restore_does_not_reactivate_children() {
    let app = TestApp::new().await;
    let tree = seed_tree(&app).await;

    app.send(
        Method::DELETE,
        &format!("/api/v1/descriptions/{}", tree.root),
        None,
    )
    .await;
    let (status, body) = app
        .send(
            Method::POST,
            &format!("/api/v1/descriptions/{}/restore", tree.root),
            None,
        )
        .await;

    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["status"], "active");
    assert_eq!(app.description_status(&tree.root).await, RecordStatus::Active);
    assert_eq!(app.description_status(&tree.child).await, RecordStatus::Inactive);
    assert_eq!(app.description_status(&tree.sibling).await, RecordStatus::Inactive);
}

#[tokio::test]
async fn archiving_does_not_cascade() {
    let app = TestApp::new().await;
    let tree = seed_tree(&app).await;

    let (status, _) = app
        .send(
            Method::PUT,
            &format!("/api/v1/descriptions/{}", tree.root),
            Some(json!({ "status": "archived" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.description_status(&tree.child).await, RecordStatus::Active);
}

#[tokio::test]
async fn category_deactivation_covers_every_description() {
    let app = TestApp::new().await;
    let tree = seed_tree(&app).await;

    let (status, body) = app
        .send(
            Method::DELETE,
            &format!("/api/v1/categories/{}", tree.category),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["status"], "inactive");

    for id in [&tree.root, &tree.child, &tree.sibling, &tree.grandchild] {
        assert_eq!(app.description_status(id).await, RecordStatus::Inactive);
    }

    let (status, _) = app
        .send(
            Method::POST,
            &format!("/api/v1/categories/{}/restore", tree.category),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    for id in [&tree.root, &tree.child, &tree.sibling, &tree.grandchild] {
        assert_eq!(app.description_status(id).await, RecordStatus::Active);
    }
}
