mod common;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use common::{hamburg, rotterdam, TestContext};
use consignment_api::auth::{Actor, USER_ID_HEADER, USER_ROLE_HEADER};

async fn send(router: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn request(method: &str, uri: &str, actor: Option<&Actor>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(actor) = actor {
        builder = builder
            .header(USER_ID_HEADER, actor.user_id.to_string())
            .header(USER_ROLE_HEADER, actor.role.as_str());
    }
    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

#[tokio::test]
async fn health_reports_database_up() {
    let ctx = TestContext::new().await;
    let (status, body) = send(ctx.router(), request("GET", "/health", None, None)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "up");
    assert_eq!(body["database"], "up");
}

#[tokio::test]
async fn requests_without_identity_are_forbidden() {
    let ctx = TestContext::new().await;
    let (status, body) = send(
        ctx.router(),
        request("POST", "/api/v1/consignments", None, None),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["success"], false);
    assert_eq!(body["errors"], json!(["forbidden"]));
}

#[tokio::test]
async fn drafts_are_created_and_read_back_over_http() {
    let ctx = TestContext::new().await;
    let (status, body) = send(
        ctx.router(),
        request("POST", "/api/v1/consignments", Some(&ctx.requester), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["consignment_id"], "CSG000001");
    assert_eq!(body["data"]["status"], "DRAFT");
    assert!(body.get("warning").is_none());

    let id = body["data"]["id"].as_str().unwrap().to_string();
    let (status, body) = send(
        ctx.router(),
        request(
            "GET",
            &format!("/api/v1/consignments/{}", id),
            Some(&ctx.requester),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["consignment_id"], "CSG000001");
    assert_eq!(body["data"]["status"], "DRAFT");
    assert!(body["data"]["lines"].as_array().unwrap().is_empty());
    assert!(body["data"].get("consignment").is_none());

    let (status, body) = send(
        ctx.router(),
        request("GET", "/api/v1/consignments/counts", Some(&ctx.requester), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 1);
}

#[tokio::test]
async fn skipped_steps_map_to_bad_request() {
    let ctx = TestContext::new().await;
    let draft = ctx
        .services
        .consignments
        .create_draft(&ctx.requester)
        .await
        .unwrap();

    let (status, body) = send(
        ctx.router(),
        request(
            "POST",
            &format!("/api/v1/consignments/{}/steps/3", draft.id),
            Some(&ctx.requester),
            Some(json!({ "consignor": rotterdam(), "delivery": hamburg() })),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["errors"], json!(["invalid_state"]));
}

#[tokio::test]
async fn unknown_consignments_are_not_found() {
    let ctx = TestContext::new().await;
    let (status, body) = send(
        ctx.router(),
        request(
            "GET",
            &format!("/api/v1/consignments/{}", uuid::Uuid::new_v4()),
            Some(&ctx.approver),
            None,
        ),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["errors"], json!(["not_found"]));
}

#[tokio::test]
async fn mixed_destination_console_warns_then_applies_on_acknowledgement() {
    let ctx = TestContext::new().await;
    let to_hamburg = ctx.ready_for_console("PO-5001", hamburg()).await;
    let to_rotterdam = ctx.ready_for_console("PO-5002", rotterdam()).await;
    let ids = json!([to_hamburg.id, to_rotterdam.id]);

    let (status, body) = send(
        ctx.router(),
        request(
            "POST",
            "/api/v1/consoles",
            Some(&ctx.coordinator),
            Some(json!({ "consignment_ids": ids })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], false);
    assert_eq!(body["warning"], true);
    assert!(body["message"]
        .as_str()
        .unwrap()
        .contains(&to_rotterdam.consignment_id));
    assert!(body["data"].is_null());

    let (status, body) = send(
        ctx.router(),
        request(
            "POST",
            "/api/v1/consoles",
            Some(&ctx.coordinator),
            Some(json!({ "consignment_ids": ids, "acknowledge_warning": true })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["console_id"], "CN000001");
    assert_eq!(body["data"]["status"], "CONSOLE_ASSIGNED");
    assert_eq!(body["data"]["consignments"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn malformed_identifiers_use_the_failure_envelope() {
    let ctx = TestContext::new().await;
    let draft = ctx
        .services
        .consignments
        .create_draft(&ctx.requester)
        .await
        .unwrap();

    let cases = [
        request("GET", "/api/v1/consignments/not-a-uuid", Some(&ctx.requester), None),
        request(
            "POST",
            &format!("/api/v1/consignments/{}/steps/first", draft.id),
            Some(&ctx.requester),
            Some(json!({ "po_line_ids": [] })),
        ),
        request(
            "POST",
            "/api/v1/consoles",
            Some(&ctx.coordinator),
            Some(json!({ "consignment_ids": ["not-a-uuid"] })),
        ),
        request(
            "GET",
            "/api/v1/consoles?page=first",
            Some(&ctx.coordinator),
            None,
        ),
    ];
    for case in cases {
        let uri = case.uri().to_string();
        let (status, body) = send(ctx.router(), case).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
        assert_eq!(body["success"], false, "{}", uri);
        assert_eq!(body["errors"], json!(["validation_error"]), "{}", uri);
        assert!(!body["message"].as_str().unwrap().is_empty(), "{}", uri);
    }
}

#[tokio::test]
async fn malformed_json_bodies_use_the_failure_envelope() {
    let ctx = TestContext::new().await;
    let user_id = ctx.coordinator.user_id.to_string();
    let build = |content_type: Option<&str>, body: &'static str| {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/api/v1/consoles")
            .header(USER_ID_HEADER, user_id.as_str())
            .header(USER_ROLE_HEADER, ctx.coordinator.role.as_str());
        if let Some(content_type) = content_type {
            builder = builder.header("content-type", content_type);
        }
        builder.body(Body::from(body)).unwrap()
    };

    for case in [
        build(Some("application/json"), "{\"consignment_ids\": ["),
        build(Some("application/json"), "{\"consignment_ids\": 7}"),
        build(None, "{\"consignment_ids\": []}"),
    ] {
        let (status, body) = send(ctx.router(), case).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(body["errors"], json!(["validation_error"]));
    }
}

#[tokio::test]
async fn oversized_quantities_are_refused_over_http() {
    let ctx = TestContext::new().await;
    let packaging = ctx.seed_packaging_type().await;
    let po = ctx.seed_purchase_order("PO-5003").await;
    let line = ctx.seed_line(&po, 1, 4).await;
    let draft = ctx
        .services
        .consignments
        .create_draft(&ctx.requester)
        .await
        .unwrap();
    ctx.step(&ctx.requester, draft.id, 0, json!({ "po_line_ids": [line.id] }))
        .await;
    ctx.step(
        &ctx.requester,
        draft.id,
        1,
        common::packaging_input(packaging.id, &[(&line, 4)]),
    )
    .await;
    let package_id = ctx
        .services
        .consignments
        .get_consignment(&ctx.requester, draft.id)
        .await
        .unwrap()
        .packages[0]
        .id;

    let (status, body) = send(
        ctx.router(),
        request(
            "POST",
            "/api/v1/allocations",
            Some(&ctx.requester),
            Some(json!({ "packaging_id": package_id, "po_line_id": line.id, "quantity": i32::MAX })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errors"], json!(["capacity_exceeded"]));

    let (status, body) = send(
        ctx.router(),
        request(
            "POST",
            "/api/v1/allocations",
            Some(&ctx.requester),
            Some(json!({ "packaging_id": package_id, "po_line_id": line.id, "quantity": 1_000_000_000_000i64 })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errors"], json!(["validation_error"]));

    let stored = ctx.reload_line(line.id).await;
    assert_eq!((stored.allocated_quantity, stored.remaining_quantity), (4, 0));
}
