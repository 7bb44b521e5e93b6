//! Fee structure and EMI plan catalog tests.

mod common;

use common::{TestApp, ADMIN_ID, INSTITUTION_ID, PARENT_ID};
use serde_json::json;

#[tokio::test]
async fn admin_creates_fee_structure() {
    let app = TestApp::spawn().await;

    let response = app
        .post(
            "/fee-structures",
            ADMIN_ID,
            "admin",
            &json!({
                "institution_id": INSTITUTION_ID,
                "name": "Annual Tuition",
                "amount": "50000",
                "academic_year": "2026-27",
                "semester": "1"
            }),
        )
        .await;

    assert_eq!(response.status().as_u16(), 201);
    let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
    assert_eq!(body["fee_structure"]["name"], "Annual Tuition");
    assert_eq!(body["fee_structure"]["institution_id"], INSTITUTION_ID);

    app.cleanup().await;
}

#[tokio::test]
async fn parent_cannot_create_fee_structure() {
    let app = TestApp::spawn().await;

    let response = app
        .post(
            "/fee-structures",
            PARENT_ID,
            "parent",
            &json!({
                "institution_id": INSTITUTION_ID,
                "name": "Annual Tuition",
                "amount": "50000",
                "academic_year": "2026-27"
            }),
        )
        .await;

    assert_eq!(response.status().as_u16(), 403);

    app.cleanup().await;
}

#[tokio::test]
async fn fee_structure_amount_must_be_positive() {
    let app = TestApp::spawn().await;

    let response = app
        .post(
            "/fee-structures",
            ADMIN_ID,
            "admin",
            &json!({
                "institution_id": INSTITUTION_ID,
                "name": "Broken",
                "amount": "0",
                "academic_year": "2026-27"
            }),
        )
        .await;

    assert_eq!(response.status().as_u16(), 400);

    app.cleanup().await;
}

#[tokio::test]
async fn fee_structures_are_scoped_by_institution() {
    let app = TestApp::spawn().await;

    common::seed_catalog(&app, "10000", 3).await;

    let other_institution = "55555555-5555-5555-5555-555555555555";
    let response = app
        .get(
            &format!("/fee-structures?institution_id={}", other_institution),
            PARENT_ID,
            "parent",
        )
        .await;
    assert_eq!(response.status().as_u16(), 200);
    let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
    assert_eq!(body["fee_structures"].as_array().unwrap().len(), 0);

    let response = app
        .get(
            &format!("/fee-structures?institution_id={}", INSTITUTION_ID),
            PARENT_ID,
            "parent",
        )
        .await;
    let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
    assert_eq!(body["fee_structures"].as_array().unwrap().len(), 1);

    app.cleanup().await;
}

#[tokio::test]
async fn emi_plan_requires_at_least_one_installment() {
    let app = TestApp::spawn().await;

    let response = app
        .post(
            "/emi-plans",
            ADMIN_ID,
            "admin",
            &json!({ "name": "Broken plan", "installments": 0 }),
        )
        .await;

    assert_eq!(response.status().as_u16(), 422);

    app.cleanup().await;
}

#[tokio::test]
async fn emi_plan_rates_cannot_be_negative() {
    let app = TestApp::spawn().await;

    let response = app
        .post(
            "/emi-plans",
            ADMIN_ID,
            "admin",
            &json!({
                "name": "Broken plan",
                "installments": 6,
                "interest_rate": "-1"
            }),
        )
        .await;

    assert_eq!(response.status().as_u16(), 400);

    app.cleanup().await;
}

#[tokio::test]
async fn parents_can_list_plans() {
    let app = TestApp::spawn().await;

    common::seed_catalog(&app, "10000", 3).await;

    let response = app.get("/emi-plans?active_only=true", PARENT_ID, "parent").await;
    assert_eq!(response.status().as_u16(), 200);
    let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
    assert_eq!(body["plans"].as_array().unwrap().len(), 1);
    assert_eq!(body["plans"][0]["installments"], 3);

    app.cleanup().await;
}
