mod common;

use axum::http::StatusCode;
use harvest_api::entities::RecordStatus;
use serde_json::json;

use common::TestApp;

const MISSING_ID: &str = "000000000000000000000000";

#[tokio::test]
async fn valid_batch_commits_in_submission_order() {
    let app = TestApp::new().await;
    let category = app.seed_category("Vegetables").await;
    let existing = app.seed_description(&category, "Carrot", None).await;

    let (status, body) = app
        .batch(json!([
            { "type": "create", "data": { "description": "Tomato", "categoryId": category, "userId": "u1" } },
            { "type": "update", "id": existing, "data": { "description": "Purple carrot" } },
            { "type": "create", "data": { "description": "Kale", "categoryId": category, "userId": "u1" } }
        ]))
        .await;

    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["success"], true);
    assert!(body.get("errors").is_none());

    let data = body["data"].as_array().expect("data array");
    let texts: Vec<_> = data.iter().map(|d| d["description"].as_str().unwrap()).collect();
    assert_eq!(texts, vec!["Tomato", "Purple carrot", "Kale"]);
    assert_eq!(data[0]["category"]["name"], "Vegetables");
    assert_eq!(data[0]["createdBy"], "u1");
    assert_eq!(app.description_count().await, 3);
}

#[tokio::test]
async fn failing_operation_is_isolated() {
    let app = TestApp::new().await;
    let category = app.seed_category("Vegetables").await;

    let (status, body) = app
        .batch(json!([
            { "type": "create", "data": { "description": "Tomato", "categoryId": category, "userId": "u1" } },
            { "type": "delete", "id": MISSING_ID }
        ]))
        .await;

    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"][0]["description"], "Tomato");

    let errors = body["errors"].as_array().expect("errors present");
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0]["id"], MISSING_ID);
    assert_eq!(errors[0]["error"], "Description not found");

    let (_, listing) = app
        .get(&format!("/api/v1/descriptions?category={category}"))
        .await;
    assert_eq!(listing["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn all_failed_batch_rolls_back_everything() {
    let app = TestApp::new().await;
    let category = app.seed_category("Vegetables").await;
    let existing = app.seed_description(&category, "Carrot", None).await;

    let (status, body) = app
        .batch(json!([
            { "type": "delete", "id": MISSING_ID },
            { "type": "create", "data": { "description": "carrot", "categoryId": category, "userId": "u1" } }
        ]))
        .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR, "{body}");
    assert_eq!(body["success"], false);
    assert!(body["data"].is_null());
    assert_eq!(body["message"], "All operations failed");

    assert_eq!(app.description_count().await, 1);
    assert_eq!(app.description_status(&existing).await, RecordStatus::Active);
}

#[tokio::test]
async fn sole_failing_delete_reports_total_failure() {
    let app = TestApp::new().await;

    let (status, body) = app
        .batch(json!([{ "type": "delete", "id": MISSING_ID }]))
        .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["message"], "All operations failed");
    assert!(body["details"]
        .as_str()
        .unwrap()
        .contains("Description not found"));
}

#[tokio::test]
async fn rejected_deactivation_does_not_cascade() {
    let app = TestApp::new().await;
    let category = app.seed_category("Herbs").await;
    let parent = app.seed_description(&category, "Basil", None).await;
    let child = app.seed_description(&category, "Thai basil", Some(&parent)).await;
    let other = app.seed_description(&category, "Mint", None).await;

    let (status, body) = app
        .batch(json!([
            { "type": "update", "id": parent, "data": { "status": "inactive", "categoryId": MISSING_ID } },
            { "type": "update", "id": other, "data": { "description": "Peppermint" } }
        ]))
        .await;

    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["errors"][0]["id"], parent);
    assert_eq!(body["errors"][0]["error"], "Category not found");
    assert_eq!(app.description_status(&parent).await, RecordStatus::Active);
    assert_eq!(app.description_status(&child).await, RecordStatus::Active);
}

#[tokio::test]
async fn later_operations_see_earlier_ones() {
    let app = TestApp::new().await;
    let category = app.seed_category("Fruit").await;
    let apple = app.seed_description(&category, "Apple", None).await;

    let (status, body) = app
        .batch(json!([
            { "type": "update", "id": apple, "data": { "description": "Pear" } },
            { "type": "create", "data": { "description": "Apple", "categoryId": category, "userId": "u1" } },
            { "type": "create", "data": { "description": "pear", "categoryId": category, "userId": "u1" } }
        ]))
        .await;

    assert_eq!(status, StatusCode::OK, "{body}");
    let data = body["data"].as_array().unwrap();
    assert_eq!(data.len(), 2);
    assert_eq!(data[1]["description"], "Apple");

    let errors = body["errors"].as_array().unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0]["id"], "unknown");
}

#[tokio::test]
async fn batch_delete_cascades_to_direct_children() {
    let app = TestApp::new().await;
    let category = app.seed_category("Herbs").await;
    let parent = app.seed_description(&category, "Basil", None).await;
    let child = app.seed_description(&category, "Genovese", Some(&parent)).await;
    let grandchild = app
        .seed_description(&category, "Genovese dwarf", Some(&child))
        .await;

    let (status, body) = app.batch(json!([{ "type": "delete", "id": parent }])).await;

    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"][0]["status"], "inactive");
    assert_eq!(body["data"][0]["children"][0]["status"], "inactive");
    assert_eq!(app.description_status(&child).await, RecordStatus::Inactive);
    assert_eq!(app.description_status(&grandchild).await, RecordStatus::Active);
}

#[tokio::test]
async fn malformed_batches_are_rejected_before_execution() {
    let app = TestApp::new().await;
    let category = app.seed_category("Vegetables").await;

    let cases = [
        json!([]),
        json!([{ "type": "create", "id": MISSING_ID, "data": { "description": "Leek", "categoryId": category, "userId": "u1" } }]),
        json!([{ "type": "delete" }]),
        json!([{ "type": "delete", "id": "not-an-id" }]),
        json!([{ "type": "rename", "id": MISSING_ID }]),
    ];

    for operations in cases {
        let (status, body) = app.batch(operations.clone()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{operations}: {body}");
        assert_eq!(body["success"], false);
    }
    assert_eq!(app.description_count().await, 0);
}

#[tokio::test]
async fn oversized_batch_is_rejected() {
    let app = TestApp::new().await;
    let operations: Vec<_> = (0..101)
        .map(|_| json!({ "type": "delete", "id": MISSING_ID }))
        .collect();

    let (status, body) = app.batch(json!(operations)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("between 1 and 100"));
}

#[tokio::test]
async fn update_without_data_is_a_per_operation_error() {
    let app = TestApp::new().await;
    let category = app.seed_category("Vegetables").await;
    let leek = app.seed_description(&category, "Leek", None).await;

    let (status, body) = app
        .batch(json!([
            { "type": "update", "id": leek },
            { "type": "create", "data": { "description": "Onion", "categoryId": category, "userId": "u1" } }
        ]))
        .await;

    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(
        body["errors"][0]["error"],
        "ID and data are required for update operations"
    );
}

#[tokio::test]
async fn create_requires_creator_and_category() {
    let app = TestApp::new().await;
    let category = app.seed_category("Vegetables").await;

    let (status, body) = app
        .batch(json!([
            { "type": "create", "data": { "description": "Leek", "categoryId": category } },
            { "type": "create", "data": { "description": "Leek", "categoryId": MISSING_ID, "userId": "u1" } },
            { "type": "create", "data": { "description": "Onion", "categoryId": category, "userId": "u1" } }
        ]))
        .await;

    assert_eq!(status, StatusCode::OK, "{body}");
    let errors = body["errors"].as_array().unwrap();
    assert_eq!(errors.len(), 2);
    assert_eq!(errors[0]["error"], "Missing required fields: userId");
    assert_eq!(errors[1]["error"], "Category not found");
}

#[tokio::test]
async fn committed_batch_is_visible_in_cached_listing() {
    let app = TestApp::new().await;
    let category = app.seed_category("Vegetables").await;
    app.seed_description(&category, "Leek", None).await;

    // Warm the listing cache
    let (_, before) = app.get("/api/v1/descriptions").await;
    assert_eq!(before["data"].as_array().unwrap().len(), 1);

    let (status, _) = app
        .batch(json!([
            { "type": "create", "data": { "description": "Onion", "categoryId": category, "userId": "u1" } }
        ]))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, after) = app.get("/api/v1/descriptions").await;
    assert_eq!(after["data"].as_array().unwrap().len(), 2);
}
