mod common;

use assert_matches::assert_matches;
use serde_json::json;
use uuid::Uuid;

use common::{hamburg, packaging_input, party, TestContext};
use consignment_api::{
    auth::{Actor, Role},
    entities::ConsignmentStatus,
    errors::ServiceError,
    services::{
        audit::{self, ENTITY_CONSIGNMENT},
        consignments::{AttachDocument, ReviewDecision},
        workflow::{WizardStep, WIZARD_COMPLETE},
    },
};

fn sweden() -> serde_json::Value {
    party("Nordic Components AB", "Industrigatan 4", "Malmo", "21120", "se")
}

#[tokio::test]
async fn new_drafts_start_at_the_first_step() {
    let ctx = TestContext::new().await;
    let first = ctx
        .services
        .consignments
        .create_draft(&ctx.requester)
        .await
        .unwrap();
    let second = ctx
        .services
        .consignments
        .create_draft(&ctx.requester)
        .await
        .unwrap();

    assert_eq!(first.status, ConsignmentStatus::Draft);
    assert_eq!(first.step, 0);
    assert_eq!(first.consignment_id, "CSG000001");
    assert_eq!(second.consignment_id, "CSG000002");

    let viewer = Actor::new(Uuid::new_v4(), Role::Viewer);
    assert_matches!(
        ctx.services.consignments.create_draft(&viewer).await,
        Err(ServiceError::Forbidden(_))
    );
}

#[tokio::test]
async fn steps_cannot_be_skipped() {
    let ctx = TestContext::new().await;
    let actor = ctx.requester;
    let draft = ctx.services.consignments.create_draft(&actor).await.unwrap();

    let skipped = ctx
        .services
        .workflow
        .handle_step(&actor, draft.id, 2, json!({ "lines": [] }))
        .await;
    assert_matches!(skipped, Err(ServiceError::InvalidState(msg)) if msg.contains("line_selection"));

    let unknown = ctx
        .services
        .workflow
        .handle_step(&actor, draft.id, 9, json!({}))
        .await;
    assert_matches!(unknown, Err(ServiceError::ValidationError(_)));

    let empty = ctx
        .services
        .workflow
        .handle_step(&actor, draft.id, 0, json!({ "po_line_ids": [] }))
        .await;
    assert_matches!(empty, Err(ServiceError::ValidationError(_)));
    assert_eq!(ctx.reload_consignment(draft.id).await.step, 0);
}

#[tokio::test]
async fn revisiting_a_step_keeps_the_pointer() {
    let ctx = TestContext::new().await;
    let actor = ctx.requester;
    let po = ctx.seed_purchase_order("PO-2001").await;
    let line = ctx.seed_line(&po, 1, 6).await;
    let packaging = ctx.seed_packaging_type().await;
    let draft = ctx.services.consignments.create_draft(&actor).await.unwrap();

    let outcome = ctx
        .services
        .workflow
        .handle_step(&actor, draft.id, 0, json!({ "po_line_ids": [line.id] }))
        .await
        .unwrap();
    assert_eq!(outcome.consignment.step, 1);
    assert_eq!(outcome.next_step, Some(WizardStep::Packaging));

    ctx.step(&actor, draft.id, 1, packaging_input(packaging.id, &[(&line, 6)]))
        .await;
    let at_compliance = ctx
        .step(
            &actor,
            draft.id,
            2,
            json!({ "lines": [{ "po_line_id": line.id, "country_of_origin": "se" }] }),
        )
        .await;
    assert_eq!(at_compliance.step, 3);

    let revisited = ctx
        .step(&actor, draft.id, 0, json!({ "po_line_ids": [line.id] }))
        .await;
    assert_eq!(revisited.step, 3);

    let repacked = ctx
        .step(&actor, draft.id, 1, packaging_input(packaging.id, &[(&line, 4)]))
        .await;
    assert_eq!(repacked.step, 3);
    assert_eq!(ctx.reload_line(line.id).await.remaining_quantity, 2);
}

#[tokio::test]
async fn deselecting_a_line_releases_its_units() {
    let ctx = TestContext::new().await;
    let actor = ctx.requester;
    let po = ctx.seed_purchase_order("PO-2002").await;
    let kept = ctx.seed_line(&po, 1, 5).await;
    let dropped = ctx.seed_line(&po, 2, 5).await;
    let packaging = ctx.seed_packaging_type().await;
    let draft = ctx.services.consignments.create_draft(&actor).await.unwrap();

    ctx.step(&actor, draft.id, 0, json!({ "po_line_ids": [kept.id, dropped.id] }))
        .await;
    ctx.step(
        &actor,
        draft.id,
        1,
        packaging_input(packaging.id, &[(&kept, 2), (&dropped, 3)]),
    )
    .await;
    assert_eq!(ctx.reload_line(dropped.id).await.allocated_quantity, 3);

    ctx.step(&actor, draft.id, 0, json!({ "po_line_ids": [kept.id] }))
        .await;

    let line = ctx.reload_line(dropped.id).await;
    assert_eq!(line.allocated_quantity, 0);
    assert_eq!(line.remaining_quantity, 5);
    let detail = ctx
        .services
        .consignments
        .get_consignment(&actor, draft.id)
        .await
        .unwrap();
    assert_eq!(detail.lines.len(), 1);
    assert_eq!(detail.packages.len(), 1);
    assert_eq!(detail.packages[0].items.len(), 1);
}

#[tokio::test]
async fn fully_allocated_lines_cannot_be_selected() {
    let ctx = TestContext::new().await;
    let po = ctx.seed_purchase_order("PO-2003").await;
    let line = ctx.seed_line(&po, 1, 3).await;
    ctx.submitted_consignment(&ctx.requester, &[(&line, 3)], hamburg())
        .await;

    let draft = ctx
        .services
        .consignments
        .create_draft(&ctx.requester)
        .await
        .unwrap();
    let result = ctx
        .services
        .workflow
        .handle_step(&ctx.requester, draft.id, 0, json!({ "po_line_ids": [line.id] }))
        .await;
    assert_matches!(result, Err(ServiceError::CapacityExceeded(_)));
}

#[tokio::test]
async fn review_submits_and_records_the_status_change() {
    let ctx = TestContext::new().await;
    let po = ctx.seed_purchase_order("PO-2004").await;
    let line = ctx.seed_line(&po, 1, 8).await;

    let submitted = ctx
        .submitted_consignment(&ctx.requester, &[(&line, 8)], hamburg())
        .await;
    assert_eq!(submitted.step, WIZARD_COMPLETE);
    assert!(submitted.submitted_at.is_some());
    assert_eq!(submitted.consignor_country.as_deref(), Some("SE"));
    assert_eq!(submitted.delivery_city.as_deref(), Some("Hamburg"));

    let changes = audit::changes_for(&*ctx.db, ENTITY_CONSIGNMENT, submitted.id)
        .await
        .unwrap();
    assert!(changes.iter().any(|c| c.field_name == "status"
        && c.old_value.as_deref() == Some("DRAFT")
        && c.new_value.as_deref() == Some("PENDING_FOR_APPROVAL")));

    let again = ctx
        .services
        .workflow
        .handle_step(&ctx.requester, submitted.id, 4, json!({ "confirm": true }))
        .await;
    assert_matches!(again, Err(ServiceError::InvalidState(_)));
}

#[tokio::test]
async fn review_requires_confirmation_and_complete_data() {
    let ctx = TestContext::new().await;
    let actor = ctx.requester;
    let po = ctx.seed_purchase_order("PO-2005").await;
    let line = ctx.seed_line(&po, 1, 2).await;
    let packaging = ctx.seed_packaging_type().await;
    let draft = ctx.services.consignments.create_draft(&actor).await.unwrap();

    ctx.step(&actor, draft.id, 0, json!({ "po_line_ids": [line.id] }))
        .await;
    ctx.step(&actor, draft.id, 1, packaging_input(packaging.id, &[(&line, 2)]))
        .await;
    ctx.step(
        &actor,
        draft.id,
        2,
        json!({ "lines": [{ "po_line_id": line.id, "country_of_origin": "SE" }] }),
    )
    .await;
    ctx.step(
        &actor,
        draft.id,
        3,
        json!({ "consignor": sweden(), "delivery": hamburg() }),
    )
    .await;

    let unconfirmed = ctx
        .services
        .workflow
        .handle_step(&actor, draft.id, 4, json!({ "confirm": false }))
        .await;
    assert_matches!(unconfirmed, Err(ServiceError::ValidationError(_)));
    assert_eq!(
        ctx.reload_consignment(draft.id).await.status,
        ConsignmentStatus::Draft
    );

    let bad_address = ctx
        .services
        .workflow
        .handle_step(
            &actor,
            draft.id,
            3,
            json!({ "consignor": sweden(), "delivery": party("X", "Y", "Z", "1", "Germany") }),
        )
        .await;
    assert_matches!(bad_address, Err(ServiceError::ValidationError(_)));
}

#[tokio::test]
async fn rejected_consignments_can_be_resubmitted() {
    let ctx = TestContext::new().await;
    let po = ctx.seed_purchase_order("PO-2006").await;
    let line = ctx.seed_line(&po, 1, 5).await;
    let submitted = ctx
        .submitted_consignment(&ctx.requester, &[(&line, 5)], hamburg())
        .await;

    assert_matches!(
        ctx.services
            .consignments
            .review_consignment(
                &ctx.requester,
                submitted.id,
                ReviewDecision::Reject { reason: "no".into() }
            )
            .await,
        Err(ServiceError::Forbidden(_))
    );
    assert_matches!(
        ctx.services
            .consignments
            .review_consignment(
                &ctx.approver,
                submitted.id,
                ReviewDecision::Reject { reason: "  ".into() }
            )
            .await,
        Err(ServiceError::ValidationError(_))
    );

    let rejected = ctx
        .services
        .consignments
        .review_consignment(
            &ctx.approver,
            submitted.id,
            ReviewDecision::Reject {
                reason: "Wrong delivery city".into(),
            },
        )
        .await
        .unwrap();
    assert_eq!(rejected.status, ConsignmentStatus::Rejected);
    assert_eq!(rejected.rejection_reason.as_deref(), Some("Wrong delivery city"));

    let resubmitted = ctx
        .step(&ctx.requester, submitted.id, 4, json!({ "confirm": true }))
        .await;
    assert_eq!(resubmitted.status, ConsignmentStatus::PendingForApproval);
    assert_eq!(resubmitted.rejection_reason, None);
}

#[tokio::test]
async fn chemical_lines_need_an_hs_code() {
    let ctx = TestContext::new().await;
    let actor = ctx.requester;
    let po = ctx.seed_purchase_order("PO-2007").await;
    let line = ctx.seed_line_with(&po, 1, 4, true, false).await;
    let packaging = ctx.seed_packaging_type().await;
    let draft = ctx.services.consignments.create_draft(&actor).await.unwrap();

    ctx.step(&actor, draft.id, 0, json!({ "po_line_ids": [line.id] }))
        .await;
    ctx.step(&actor, draft.id, 1, packaging_input(packaging.id, &[(&line, 4)]))
        .await;

    let missing = ctx
        .services
        .workflow
        .handle_step(
            &actor,
            draft.id,
            2,
            json!({ "lines": [{ "po_line_id": line.id, "country_of_origin": "SE" }] }),
        )
        .await;
    assert_matches!(missing, Err(ServiceError::ValidationError(msg)) if msg.contains("HS code"));

    let ok = ctx
        .step(
            &actor,
            draft.id,
            2,
            json!({ "lines": [{ "po_line_id": line.id, "country_of_origin": "SE", "hs_code": "2905.11" }] }),
        )
        .await;
    assert_eq!(ok.step, 3);

    let items = ctx
        .services
        .consignments
        .dg_item_details(&actor, draft.id)
        .await
        .unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].hs_code.as_deref(), Some("2905.11"));
}

#[tokio::test]
async fn dangerous_goods_need_documents_and_un_numbers() {
    let ctx = TestContext::new().await;
    let actor = ctx.requester;
    let po = ctx.seed_purchase_order("PO-2008").await;
    let line = ctx.seed_line_with(&po, 1, 2, true, true).await;
    let packaging = ctx.seed_packaging_type().await;
    let draft = ctx.services.consignments.create_draft(&actor).await.unwrap();

    ctx.step(&actor, draft.id, 0, json!({ "po_line_ids": [line.id] }))
        .await;
    ctx.step(&actor, draft.id, 1, packaging_input(packaging.id, &[(&line, 2)]))
        .await;

    let compliance = json!({ "lines": [{
        "po_line_id": line.id,
        "country_of_origin": "SE",
        "hs_code": "2710.12",
        "dg_class": "3",
        "un_number": "un 1203",
    }] });

    let without_document = ctx
        .services
        .workflow
        .handle_step(&actor, draft.id, 2, compliance.clone())
        .await;
    assert_matches!(
        without_document,
        Err(ServiceError::ValidationError(msg)) if msg.contains("supporting document")
    );

    let document = ctx
        .services
        .consignments
        .attach_document(
            &actor,
            AttachDocument {
                consignment_id: draft.id,
                po_line_id: line.id,
                file_name: "msds.pdf".into(),
                document_type: "msds".into(),
                bytes: b"%PDF-1.4".to_vec(),
            },
        )
        .await
        .unwrap();
    assert!(ctx.storage.contains(&document.file_url));

    let with_document = ctx.step(&actor, draft.id, 2, compliance).await;
    assert_eq!(with_document.step, 3);

    let detail = ctx
        .services
        .consignments
        .get_consignment(&actor, draft.id)
        .await
        .unwrap();
    assert_eq!(detail.lines[0].un_number.as_deref(), Some("UN1203"));
    assert_eq!(detail.lines[0].document_count, 1);

    let hover = ctx
        .services
        .consignments
        .consignment_hover_details(&actor, draft.id)
        .await
        .unwrap();
    assert!(hover.has_dangerous_goods);
    assert_eq!(hover.total_allocated_units, 2);
    assert_eq!(hover.package_count, 1);

    ctx.services
        .consignments
        .remove_document(&actor, document.id)
        .await
        .unwrap();
    assert!(ctx.storage.is_empty());
}

#[tokio::test]
async fn requesters_only_see_their_own_consignments() {
    let ctx = TestContext::new().await;
    let mine = ctx
        .services
        .consignments
        .create_draft(&ctx.requester)
        .await
        .unwrap();
    let other_requester = Actor::new(Uuid::new_v4(), Role::Requester);
    ctx.services
        .consignments
        .create_draft(&other_requester)
        .await
        .unwrap();

    assert_matches!(
        ctx.services
            .consignments
            .get_consignment(&other_requester, mine.id)
            .await,
        Err(ServiceError::Forbidden(_))
    );

    let counts = ctx
        .services
        .consignments
        .get_counts(&ctx.requester)
        .await
        .unwrap();
    assert_eq!(counts.total, 1);
    let all = ctx.services.consignments.get_counts(&ctx.admin).await.unwrap();
    assert_eq!(all.total, 2);
    assert_eq!(all.by_status.get("DRAFT"), Some(&2));
}

#[tokio::test]
async fn stale_drafts_are_purged_and_release_capacity() {
    let ctx = TestContext::new().await;
    let po = ctx.seed_purchase_order("PO-2009").await;
    let line = ctx.seed_line(&po, 1, 10).await;
    let packaging = ctx.seed_packaging_type().await;

    let submitted = ctx
        .submitted_consignment(&ctx.requester, &[(&line, 4)], hamburg())
        .await;
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
        packaging_input(packaging.id, &[(&line, 6)]),
    )
    .await;
    assert_eq!(ctx.reload_line(line.id).await.remaining_quantity, 0);

    assert_matches!(
        ctx.services
            .consignments
            .purge_stale_drafts(&ctx.requester, chrono::Duration::zero())
            .await,
        Err(ServiceError::Forbidden(_))
    );

    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    let result = ctx
        .services
        .consignments
        .purge_stale_drafts(&ctx.admin, chrono::Duration::zero())
        .await
        .unwrap();
    assert_eq!(result.purged, vec![draft.consignment_id.clone()]);
    assert_eq!(result.lines_reconciled, 1);

    let refreshed = ctx.reload_line(line.id).await;
    assert_eq!(refreshed.allocated_quantity, 4);
    assert_eq!(refreshed.remaining_quantity, 6);
    assert_eq!(
        ctx.reload_consignment(submitted.id).await.status,
        ConsignmentStatus::PendingForApproval
    );

    let recent = ctx
        .services
        .consignments
        .purge_stale_drafts(&ctx.admin, chrono::Duration::hours(1))
        .await
        .unwrap();
    assert!(recent.purged.is_empty());
}
