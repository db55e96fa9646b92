mod common;

use assert_matches::assert_matches;
use proptest::prelude::*;
use sea_orm::{ActiveModelTrait, Set};
use serde_json::json;
use uuid::Uuid;

use common::{packaging_input, TestContext};
use consignment_api::{
    auth::Actor,
    entities::{consignment, purchase_order_line, ConsignmentStatus},
    errors::ServiceError,
    services::{
        allocation::AllocateRequest,
        audit::{self, ENTITY_CONSIGNMENT},
    },
};

/// Draft with `lines` selected and packed into one package; returns (consignment id, package id).
async fn packed_draft(
    ctx: &TestContext,
    actor: &Actor,
    lines: &[(&purchase_order_line::Model, i32)],
) -> (Uuid, Uuid) {
    let packaging = ctx.seed_packaging_type().await;
    let draft = ctx
        .services
        .consignments
        .create_draft(actor)
        .await
        .expect("create draft");
    let line_ids: Vec<Uuid> = lines.iter().map(|(l, _)| l.id).collect();
    ctx.step(actor, draft.id, 0, json!({ "po_line_ids": line_ids }))
        .await;
    ctx.step(actor, draft.id, 1, packaging_input(packaging.id, lines))
        .await;

    let detail = ctx
        .services
        .consignments
        .get_consignment(actor, draft.id)
        .await
        .expect("load consignment");
    assert_eq!(detail.packages.len(), 1);
    (draft.id, detail.packages[0].id)
}

async fn set_status(ctx: &TestContext, id: Uuid, status: ConsignmentStatus) {
    let mut active: consignment::ActiveModel = ctx.reload_consignment(id).await.into();
    active.status = Set(status);
    active.update(&*ctx.db).await.expect("update status");
}

#[tokio::test]
async fn over_allocation_is_rejected_without_partial_write() {
    let ctx = TestContext::new().await;
    let actor = ctx.requester;
    let po = ctx.seed_purchase_order("PO-1001").await;
    let line_a = ctx.seed_line(&po, 1, 10).await;
    let line_b = ctx.seed_line(&po, 2, 5).await;

    let (_, package_id) = packed_draft(&ctx, &actor, &[(&line_a, 10), (&line_b, 5)]).await;

    let a = ctx.reload_line(line_a.id).await;
    let b = ctx.reload_line(line_b.id).await;
    assert_eq!((a.allocated_quantity, a.remaining_quantity), (10, 0));
    assert_eq!((b.allocated_quantity, b.remaining_quantity), (5, 0));

    let result = ctx
        .services
        .allocations
        .allocate(
            &actor,
            AllocateRequest {
                packaging_id: package_id,
                po_line_id: line_a.id,
                quantity: 1,
            },
        )
        .await;
    assert_matches!(result, Err(ServiceError::CapacityExceeded(_)));

    let summary = ctx
        .services
        .allocations
        .get_allocated_summary(line_a.id)
        .await
        .unwrap();
    assert_eq!(summary.total_allocated, 10);
    assert_eq!(summary.packages.len(), 1);
    assert_eq!(summary.packages[0].allocated_qty, 10);
    assert_eq!(ctx.reload_line(line_a.id).await.allocated_quantity, 10);
}

#[tokio::test]
async fn allocation_adds_to_existing_entry_and_deallocation_restores_capacity() {
    let ctx = TestContext::new().await;
    let actor = ctx.requester;
    let po = ctx.seed_purchase_order("PO-1002").await;
    let line = ctx.seed_line(&po, 1, 10).await;

    let (_, package_id) = packed_draft(&ctx, &actor, &[(&line, 2)]).await;

    let result = ctx
        .services
        .allocations
        .allocate(
            &actor,
            AllocateRequest {
                packaging_id: package_id,
                po_line_id: line.id,
                quantity: 3,
            },
        )
        .await
        .unwrap();
    assert_eq!(result.allocation.allocated_qty, 5);
    assert_eq!(result.line.allocated_quantity, 5);
    assert_eq!(result.line.remaining_quantity, 5);

    let restored = ctx
        .services
        .allocations
        .deallocate(&actor, result.allocation.id)
        .await
        .unwrap();
    assert_eq!(restored.allocated_quantity, 0);
    assert_eq!(restored.remaining_quantity, 10);

    let summary = ctx
        .services
        .allocations
        .get_allocated_summary(line.id)
        .await
        .unwrap();
    assert!(summary.packages.is_empty());
    assert_eq!(summary.total_allocated, 0);
}

#[tokio::test]
async fn capacity_is_shared_across_consignments() {
    let ctx = TestContext::new().await;
    let actor = ctx.requester;
    let po = ctx.seed_purchase_order("PO-1003").await;
    let line = ctx.seed_line(&po, 1, 6).await;

    let (_, first_package) = packed_draft(&ctx, &actor, &[(&line, 4)]).await;
    let (_, second_package) = packed_draft(&ctx, &actor, &[(&line, 2)]).await;

    let result = ctx
        .services
        .allocations
        .allocate(
            &actor,
            AllocateRequest {
                packaging_id: second_package,
                po_line_id: line.id,
                quantity: 1,
            },
        )
        .await;
    assert_matches!(result, Err(ServiceError::CapacityExceeded(_)));

    let summary = ctx
        .services
        .allocations
        .get_allocated_summary(line.id)
        .await
        .unwrap();
    assert_eq!(summary.total_allocated, 6);
    let mut per_package: Vec<(Uuid, i32)> = summary
        .packages
        .iter()
        .map(|p| (p.packaging_id, p.allocated_qty))
        .collect();
    per_package.sort_by_key(|(_, qty)| *qty);
    assert_eq!(per_package, vec![(second_package, 2), (first_package, 4)]);
}

#[tokio::test]
async fn cancelled_consignments_release_their_units() {
    let ctx = TestContext::new().await;
    let actor = ctx.requester;
    let po = ctx.seed_purchase_order("PO-1004").await;
    let line = ctx.seed_line(&po, 1, 5).await;

    let (cancelled, _) = packed_draft(&ctx, &actor, &[(&line, 5)]).await;
    assert_eq!(ctx.reload_line(line.id).await.remaining_quantity, 0);

    let updated = ctx
        .services
        .consignments
        .cancel_consignment(&actor, cancelled)
        .await
        .unwrap();
    assert_eq!(updated.status, ConsignmentStatus::Cancelled);
    let released = ctx.reload_line(line.id).await;
    assert_eq!((released.allocated_quantity, released.remaining_quantity), (0, 5));

    let status_changes: Vec<_> = audit::changes_for(&*ctx.db, ENTITY_CONSIGNMENT, cancelled)
        .await
        .unwrap()
        .into_iter()
        .filter(|c| c.field_name == "status")
        .collect();
    assert_eq!(status_changes.len(), 1);
    assert_eq!(status_changes[0].old_value.as_deref(), Some("DRAFT"));
    assert_eq!(status_changes[0].new_value.as_deref(), Some("CANCELLED"));

    assert_matches!(
        ctx.services
            .consignments
            .cancel_consignment(&actor, cancelled)
            .await,
        Err(ServiceError::InvalidState(_))
    );

    let (_, package_id) = packed_draft(&ctx, &actor, &[(&line, 1)]).await;
    let result = ctx
        .services
        .allocations
        .allocate(
            &actor,
            AllocateRequest {
                packaging_id: package_id,
                po_line_id: line.id,
                quantity: 4,
            },
        )
        .await
        .unwrap();
    assert_eq!(result.line.allocated_quantity, 5);
    assert_eq!(result.line.remaining_quantity, 0);
}

#[tokio::test]
async fn only_the_owner_can_cancel_and_console_members_stay() {
    let ctx = TestContext::new().await;
    let actor = ctx.requester;
    let po = ctx.seed_purchase_order("PO-1007").await;
    let line = ctx.seed_line(&po, 1, 3).await;

    let (id, _) = packed_draft(&ctx, &actor, &[(&line, 3)]).await;

    let stranger = Actor::new(Uuid::new_v4(), actor.role);
    assert_matches!(
        ctx.services.consignments.cancel_consignment(&stranger, id).await,
        Err(ServiceError::Forbidden(_))
    );

    set_status(&ctx, id, ConsignmentStatus::ConsoleAssigned).await;
    assert_matches!(
        ctx.services.consignments.cancel_consignment(&actor, id).await,
        Err(ServiceError::InvalidState(_))
    );
    assert_eq!(
        ctx.reload_consignment(id).await.status,
        ConsignmentStatus::ConsoleAssigned
    );
    assert_eq!(ctx.reload_line(line.id).await.allocated_quantity, 3);
}

#[tokio::test]
async fn locked_consignments_reject_allocation_changes() {
    let ctx = TestContext::new().await;
    let actor = ctx.requester;
    let po = ctx.seed_purchase_order("PO-1005").await;
    let line = ctx.seed_line(&po, 1, 8).await;

    let (id, package_id) = packed_draft(&ctx, &actor, &[(&line, 2)]).await;
    set_status(&ctx, id, ConsignmentStatus::ConsoleAssigned).await;

    let result = ctx
        .services
        .allocations
        .allocate(
            &actor,
            AllocateRequest {
                packaging_id: package_id,
                po_line_id: line.id,
                quantity: 1,
            },
        )
        .await;
    assert_matches!(result, Err(ServiceError::InvalidState(_)));
    assert_eq!(ctx.reload_line(line.id).await.allocated_quantity, 2);
}

#[tokio::test]
async fn unselected_lines_and_foreign_actors_are_refused() {
    let ctx = TestContext::new().await;
    let actor = ctx.requester;
    let po = ctx.seed_purchase_order("PO-1006").await;
    let packed = ctx.seed_line(&po, 1, 8).await;
    let other = ctx.seed_line(&po, 2, 8).await;

    let (_, package_id) = packed_draft(&ctx, &actor, &[(&packed, 2)]).await;

    let result = ctx
        .services
        .allocations
        .allocate(
            &actor,
            AllocateRequest {
                packaging_id: package_id,
                po_line_id: other.id,
                quantity: 1,
            },
        )
        .await;
    assert_matches!(result, Err(ServiceError::ValidationError(_)));

    let stranger = Actor::new(Uuid::new_v4(), actor.role);
    let result = ctx
        .services
        .allocations
        .allocate(
            &stranger,
            AllocateRequest {
                packaging_id: package_id,
                po_line_id: packed.id,
                quantity: 1,
            },
        )
        .await;
    assert_matches!(result, Err(ServiceError::Forbidden(_)));

    let result = ctx
        .services
        .allocations
        .allocate(
            &actor,
            AllocateRequest {
                packaging_id: package_id,
                po_line_id: packed.id,
                quantity: 0,
            },
        )
        .await;
    assert_matches!(result, Err(ServiceError::ValidationError(_)));
}

#[tokio::test]
async fn oversized_requests_are_refused_without_wrapping() {
    let ctx = TestContext::new().await;
    let actor = ctx.requester;
    let po = ctx.seed_purchase_order("PO-1008").await;
    let full = ctx.seed_line(&po, 1, 10).await;
    let open = ctx.seed_line(&po, 2, 10).await;

    let (_, package_id) = packed_draft(&ctx, &actor, &[(&full, 10), (&open, 1)]).await;

    for (line, quantity) in [(&full, i32::MAX), (&open, i32::MAX), (&open, 1_000)] {
        let result = ctx
            .services
            .allocations
            .allocate(
                &actor,
                AllocateRequest {
                    packaging_id: package_id,
                    po_line_id: line.id,
                    quantity,
                },
            )
            .await;
        assert_matches!(result, Err(ServiceError::CapacityExceeded(_)));
    }

    let full_line = ctx.reload_line(full.id).await;
    assert_eq!((full_line.allocated_quantity, full_line.remaining_quantity), (10, 0));
    let open_line = ctx.reload_line(open.id).await;
    assert_eq!((open_line.allocated_quantity, open_line.remaining_quantity), (1, 9));
}

#[tokio::test]
async fn packing_plans_cannot_oversubscribe_a_line_across_packages() {
    let ctx = TestContext::new().await;
    let actor = ctx.requester;
    let packaging = ctx.seed_packaging_type().await;
    let po = ctx.seed_purchase_order("PO-1009").await;
    let line = ctx.seed_line(&po, 1, 5).await;

    let draft = ctx
        .services
        .consignments
        .create_draft(&actor)
        .await
        .unwrap();
    ctx.step(&actor, draft.id, 0, json!({ "po_line_ids": [line.id] }))
        .await;

    let package = |quantity: i32| {
        json!({
            "packaging_type_id": packaging.id,
            "items": [{ "po_line_id": line.id, "quantity": quantity }],
        })
    };
    let plans = [
        json!({ "packages": [package(3), package(3)] }),
        json!({ "packages": [package(i32::MAX), package(i32::MAX)] }),
        json!({ "packages": [package(5), package(i32::MAX)] }),
    ];
    for plan in plans {
        let result = ctx
            .services
            .workflow
            .handle_step(&actor, draft.id, 1, plan)
            .await;
        assert_matches!(result, Err(ServiceError::CapacityExceeded(_)));
    }

    let detail = ctx
        .services
        .consignments
        .get_consignment(&actor, draft.id)
        .await
        .unwrap();
    assert!(detail.packages.is_empty());
    let stored = ctx.reload_line(line.id).await;
    assert_eq!((stored.allocated_quantity, stored.remaining_quantity), (0, 5));

    // The same units split evenly still fit.
    ctx.step(
        &actor,
        draft.id,
        1,
        json!({ "packages": [package(2), package(3)] }),
    )
    .await;
    assert_eq!(ctx.reload_line(line.id).await.remaining_quantity, 0);
}

#[derive(Debug, Clone)]
enum LedgerOp {
    Allocate {
        consignment: usize,
        line: usize,
        quantity: i32,
    },
    Deallocate {
        consignment: usize,
        line: usize,
    },
}

fn quantity() -> impl Strategy<Value = i32> {
    prop_oneof![
        4 => 1i32..6,
        1 => (i32::MAX - 5)..=i32::MAX,
    ]
}

fn ledger_op() -> impl Strategy<Value = LedgerOp> {
    prop_oneof![
        3 => (0usize..2, 0usize..2, quantity()).prop_map(|(consignment, line, quantity)| {
            LedgerOp::Allocate { consignment, line, quantity }
        }),
        1 => (0usize..2, 0usize..2).prop_map(|(consignment, line)| {
            LedgerOp::Deallocate { consignment, line }
        }),
    ]
}

async fn run_ledger_ops(ops: Vec<LedgerOp>) -> Result<(), TestCaseError> {
    let ctx = TestContext::new().await;
    let actor = ctx.requester;
    let po = ctx.seed_purchase_order("PO-PROP").await;
    let lines = [ctx.seed_line(&po, 1, 9).await, ctx.seed_line(&po, 2, 4).await];

    let mut packages = Vec::new();
    for _ in 0..2 {
        let (_, package_id) = packed_draft(&ctx, &actor, &[(&lines[0], 1), (&lines[1], 1)]).await;
        packages.push(package_id);
    }

    for op in ops {
        match op {
            LedgerOp::Allocate {
                consignment,
                line,
                quantity,
            } => {
                let before = ctx.reload_line(lines[line].id).await.allocated_quantity;
                let result = ctx
                    .services
                    .allocations
                    .allocate(
                        &actor,
                        AllocateRequest {
                            packaging_id: packages[consignment],
                            po_line_id: lines[line].id,
                            quantity,
                        },
                    )
                    .await;
                let after = ctx.reload_line(lines[line].id).await.allocated_quantity;
                match result {
                    Ok(_) => prop_assert_eq!(i64::from(after), i64::from(before) + i64::from(quantity)),
                    Err(ServiceError::CapacityExceeded(_)) => {
                        prop_assert!(
                            i64::from(before) + i64::from(quantity)
                                > i64::from(lines[line].ordered_quantity)
                        );
                        prop_assert_eq!(after, before);
                    }
                    Err(e) => return Err(TestCaseError::fail(format!("unexpected error: {}", e))),
                }
            }
            LedgerOp::Deallocate { consignment, line } => {
                let summary = ctx
                    .services
                    .allocations
                    .get_allocated_summary(lines[line].id)
                    .await
                    .map_err(|e| TestCaseError::fail(e.to_string()))?;
                if let Some(entry) = summary
                    .packages
                    .iter()
                    .find(|p| p.packaging_id == packages[consignment])
                {
                    ctx.services
                        .allocations
                        .deallocate(&actor, entry.allocation_id)
                        .await
                        .map_err(|e| TestCaseError::fail(e.to_string()))?;
                }
            }
        }

        for line in &lines {
            let stored = ctx.reload_line(line.id).await;
            let summary = ctx
                .services
                .allocations
                .get_allocated_summary(line.id)
                .await
                .map_err(|e| TestCaseError::fail(e.to_string()))?;
            let ledger: i32 = summary.packages.iter().map(|p| p.allocated_qty).sum();
            prop_assert!(ledger <= line.ordered_quantity);
            prop_assert_eq!(stored.allocated_quantity, ledger);
            prop_assert_eq!(stored.remaining_quantity, line.ordered_quantity - ledger);
        }
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(12))]

    #[test]
    fn ledger_never_exceeds_ordered_quantity(ops in prop::collection::vec(ledger_op(), 1..20)) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(run_ledger_ops(ops))?;
    }
}
