//! Payment recording and remaining-balance tests.

mod common;

use common::{TestApp, ADMIN_ID, OTHER_PARENT_ID, PARENT_ID};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::str::FromStr;

async fn setup_approved_application(app: &TestApp, amount: &str, installments: i32) -> String {
    let (fee_structure_id, plan_id) = common::seed_catalog(app, amount, installments).await;
    let student_id = common::create_student(app, PARENT_ID, "Asha Rao").await;
    let application_id =
        common::create_application(app, PARENT_ID, &student_id, &fee_structure_id, Some(&plan_id))
            .await;
    common::submit_and_approve(app, PARENT_ID, &application_id).await;
    application_id
}

fn installment_ids(body: &Value) -> Vec<String> {
    body["installments"]
        .as_array()
        .unwrap()
        .iter()
        .map(|i| i["installment_id"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn paying_an_installment_decrements_the_remaining_balance() {
    let app = TestApp::spawn().await;
    let application_id = setup_approved_application(&app, "10000", 3).await;

    let body = common::list_installments(&app, PARENT_ID, &application_id).await;
    let ids = installment_ids(&body);

    let response = app
        .post(
            &format!("/installments/{}/pay", ids[0]),
            PARENT_ID,
            "parent",
            &json!({ "method": "upi" }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 200);

    let body: Value = response.json().await.expect("Failed to parse JSON");
    assert!(body["transaction_id"].as_str().unwrap().starts_with("TXN-"));
    assert_eq!(
        Decimal::from_str(body["remaining_amount"].as_str().unwrap()).unwrap(),
        Decimal::from_str("6666.67").unwrap()
    );
    assert_eq!(body["application_status"], "active");

    app.cleanup().await;
}

#[tokio::test]
async fn an_installment_cannot_be_paid_twice() {
    let app = TestApp::spawn().await;
    let application_id = setup_approved_application(&app, "10000", 3).await;

    let body = common::list_installments(&app, PARENT_ID, &application_id).await;
    let ids = installment_ids(&body);
    let path = format!("/installments/{}/pay", ids[0]);

    let response = app.post(&path, PARENT_ID, "parent", &json!({})).await;
    assert_eq!(response.status().as_u16(), 200);

    let response = app.post(&path, PARENT_ID, "parent", &json!({})).await;
    assert_eq!(response.status().as_u16(), 409);

    // Remaining balance reflects a single payment
    let body = common::list_installments(&app, PARENT_ID, &application_id).await;
    assert_eq!(
        Decimal::from_str(body["summary"]["remaining_amount"].as_str().unwrap()).unwrap(),
        Decimal::from_str("6666.67").unwrap()
    );
    assert_eq!(body["summary"]["paid_count"].as_i64().unwrap(), 1);

    app.cleanup().await;
}

#[tokio::test]
async fn paying_every_installment_completes_the_application() {
    let app = TestApp::spawn().await;
    let application_id = setup_approved_application(&app, "10000", 3).await;

    let body = common::list_installments(&app, PARENT_ID, &application_id).await;
    let ids = installment_ids(&body);

    let mut last: Value = Value::Null;
    for id in &ids {
        let response = app
            .post(
                &format!("/installments/{}/pay", id),
                PARENT_ID,
                "parent",
                &json!({}),
            )
            .await;
        assert_eq!(response.status().as_u16(), 200);
        last = response.json().await.expect("Failed to parse JSON");
    }

    assert_eq!(
        Decimal::from_str(last["remaining_amount"].as_str().unwrap()).unwrap(),
        Decimal::ZERO
    );
    assert_eq!(last["application_status"], "completed");

    let response = app
        .get(
            &format!("/applications/{}", application_id),
            PARENT_ID,
            "parent",
        )
        .await;
    let body: Value = response.json().await.expect("Failed to parse JSON");
    assert_eq!(body["application"]["status"], "completed");

    app.cleanup().await;
}

#[tokio::test]
async fn only_the_owning_parent_can_pay() {
    let app = TestApp::spawn().await;
    let application_id = setup_approved_application(&app, "10000", 3).await;

    let body = common::list_installments(&app, PARENT_ID, &application_id).await;
    let ids = installment_ids(&body);
    let path = format!("/installments/{}/pay", ids[0]);

    let response = app
        .post(&path, OTHER_PARENT_ID, "parent", &json!({}))
        .await;
    assert_eq!(response.status().as_u16(), 403);

    app.cleanup().await;
}

#[tokio::test]
async fn rejected_applications_do_not_accept_payments() {
    let app = TestApp::spawn().await;
    let (fee_structure_id, plan_id) = common::seed_catalog(&app, "10000", 3).await;
    let student_id = common::create_student(&app, PARENT_ID, "Asha Rao").await;
    let application_id =
        common::create_application(&app, PARENT_ID, &student_id, &fee_structure_id, Some(&plan_id))
            .await;

    let response = app
        .patch(
            &format!("/applications/{}", application_id),
            PARENT_ID,
            "parent",
            &json!({ "action": "submit" }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 200);

    // Generate the schedule while still under review, then reject
    let response = app
        .post(
            &format!("/applications/{}/generate-installments", application_id),
            ADMIN_ID,
            "admin",
            &json!({}),
        )
        .await;
    assert_eq!(response.status().as_u16(), 200);

    let response = app
        .patch(
            &format!("/applications/{}", application_id),
            ADMIN_ID,
            "admin",
            &json!({ "action": "reject" }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 200);

    // A payment must not resurrect the rejected application
    let body = common::list_installments(&app, PARENT_ID, &application_id).await;
    let ids = installment_ids(&body);
    let response = app
        .post(
            &format!("/installments/{}/pay", ids[0]),
            PARENT_ID,
            "parent",
            &json!({}),
        )
        .await;
    assert_eq!(response.status().as_u16(), 409);

    let response = app
        .get(
            &format!("/applications/{}", application_id),
            PARENT_ID,
            "parent",
        )
        .await;
    let body: Value = response.json().await.expect("Failed to parse JSON");
    assert_eq!(body["application"]["status"], "rejected");
    assert_eq!(
        Decimal::from_str(body["application"]["remaining_amount"].as_str().unwrap()).unwrap(),
        Decimal::from(10000)
    );

    // The whole settlement rolled back, the installment is still pending
    let body = common::list_installments(&app, PARENT_ID, &application_id).await;
    assert_eq!(body["summary"]["paid_count"].as_i64().unwrap(), 0);

    app.cleanup().await;
}

#[tokio::test]
async fn applications_under_review_do_not_accept_payments() {
    let app = TestApp::spawn().await;
    let (fee_structure_id, plan_id) = common::seed_catalog(&app, "10000", 3).await;
    let student_id = common::create_student(&app, PARENT_ID, "Asha Rao").await;
    let application_id =
        common::create_application(&app, PARENT_ID, &student_id, &fee_structure_id, Some(&plan_id))
            .await;

    let response = app
        .patch(
            &format!("/applications/{}", application_id),
            PARENT_ID,
            "parent",
            &json!({ "action": "submit" }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 200);

    let response = app
        .post(
            &format!("/applications/{}/generate-installments", application_id),
            ADMIN_ID,
            "admin",
            &json!({}),
        )
        .await;
    assert_eq!(response.status().as_u16(), 200);

    // Paying must not move the application to active without approval
    let body = common::list_installments(&app, PARENT_ID, &application_id).await;
    let ids = installment_ids(&body);
    let response = app
        .post(
            &format!("/installments/{}/pay", ids[0]),
            PARENT_ID,
            "parent",
            &json!({}),
        )
        .await;
    assert_eq!(response.status().as_u16(), 409);

    let response = app
        .get(
            &format!("/applications/{}", application_id),
            PARENT_ID,
            "parent",
        )
        .await;
    let body: Value = response.json().await.expect("Failed to parse JSON");
    assert_eq!(body["application"]["status"], "platform_review");

    app.cleanup().await;
}

#[tokio::test]
async fn paying_an_unknown_installment_is_not_found() {
    let app = TestApp::spawn().await;

    let response = app
        .post(
            "/installments/99999999-9999-9999-9999-999999999999/pay",
            PARENT_ID,
            "parent",
            &json!({}),
        )
        .await;
    assert_eq!(response.status().as_u16(), 404);

    app.cleanup().await;
}

#[tokio::test]
async fn payments_form_an_audit_trail() {
    let app = TestApp::spawn().await;
    let application_id = setup_approved_application(&app, "10000", 3).await;

    let body = common::list_installments(&app, PARENT_ID, &application_id).await;
    let ids = installment_ids(&body);

    for id in ids.iter().take(2) {
        let response = app
            .post(
                &format!("/installments/{}/pay", id),
                PARENT_ID,
                "parent",
                &json!({ "method": "card" }),
            )
            .await;
        assert_eq!(response.status().as_u16(), 200);
    }

    let response = app
        .get(
            &format!("/payments?application_id={}", application_id),
            PARENT_ID,
            "parent",
        )
        .await;
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.expect("Failed to parse JSON");
    let payments = body["payments"].as_array().unwrap();
    assert_eq!(payments.len(), 2);
    for payment in payments {
        assert_eq!(payment["status"], "completed");
        assert_eq!(payment["method"], "card");
        assert_eq!(
            Decimal::from_str(payment["amount"].as_str().unwrap()).unwrap(),
            Decimal::from_str("3333.33").unwrap()
        );
    }

    // Admins can audit too
    let response = app
        .get(
            &format!("/payments?application_id={}", application_id),
            ADMIN_ID,
            "admin",
        )
        .await;
    assert_eq!(response.status().as_u16(), 200);

    // Other parents cannot
    let response = app
        .get(
            &format!("/payments?application_id={}", application_id),
            OTHER_PARENT_ID,
            "parent",
        )
        .await;
    assert_eq!(response.status().as_u16(), 403);

    app.cleanup().await;
}
