#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use chrono::Utc;
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use uuid::Uuid;

use consignment_api::{
    app_router,
    auth::{Actor, Role},
    config::AppConfig,
    db,
    entities::{
        consignment, console, freight_forwarder, packaging_type, purchase_order,
        purchase_order_line, ConsignmentStatus, ConsoleStatus,
    },
    events::{process_events, EventSender, LogNotifier},
    handlers::AppServices,
    services::{consignments::ReviewDecision, storage::InMemoryFileStorage},
    AppState,
};

/// Application state over a fresh in-memory SQLite database.
pub struct TestContext {
    pub db: Arc<DatabaseConnection>,
    pub config: AppConfig,
    pub services: AppServices,
    pub storage: Arc<InMemoryFileStorage>,
    pub requester: Actor,
    pub approver: Actor,
    pub coordinator: Actor,
    pub admin: Actor,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestContext {
    pub async fn new() -> Self {
        let mut cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        // One connection keeps every query on the same in-memory database.
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");
        let db_arc = Arc::new(pool);

        let (event_tx, event_rx) = mpsc::channel(256);
        let event_task = tokio::spawn(process_events(event_rx, Arc::new(LogNotifier)));

        let storage = Arc::new(InMemoryFileStorage::new());
        let services = AppServices::new(
            db_arc.clone(),
            Arc::new(EventSender::new(event_tx)),
            storage.clone(),
            cfg.gl_codes(),
        )
        .expect("standard step registry is complete");

        Self {
            db: db_arc,
            config: cfg,
            services,
            storage,
            requester: Actor::new(Uuid::new_v4(), Role::Requester),
            approver: Actor::new(Uuid::new_v4(), Role::Approver),
            coordinator: Actor::new(Uuid::new_v4(), Role::LogisticsCoordinator),
            admin: Actor::new(Uuid::new_v4(), Role::Admin),
            _event_task: event_task,
        }
    }

    pub fn state(&self) -> AppState {
        AppState {
            db: self.db.clone(),
            config: self.config.clone(),
            services: self.services.clone(),
        }
    }

    pub fn router(&self) -> Router {
        app_router(self.state())
    }

    pub async fn seed_purchase_order(&self, po_number: &str) -> purchase_order::Model {
        purchase_order::ActiveModel {
            id: Set(Uuid::new_v4()),
            po_number: Set(po_number.to_string()),
            supplier_name: Set("Nordic Components AB".to_string()),
            created_at: Set(Utc::now()),
        }
        .insert(&*self.db)
        .await
        .expect("seed purchase order")
    }

    pub async fn seed_line(
        &self,
        po: &purchase_order::Model,
        line_number: i32,
        ordered_quantity: i32,
    ) -> purchase_order_line::Model {
        self.seed_line_with(po, line_number, ordered_quantity, false, false)
            .await
    }

    pub async fn seed_line_with(
        &self,
        po: &purchase_order::Model,
        line_number: i32,
        ordered_quantity: i32,
        is_chemical: bool,
        is_dangerous_good: bool,
    ) -> purchase_order_line::Model {
        let now = Utc::now();
        purchase_order_line::ActiveModel {
            id: Set(Uuid::new_v4()),
            purchase_order_id: Set(po.id),
            line_number: Set(line_number),
            product_code: Set(format!("SKU-{:03}", line_number)),
            description: Set(format!("Item {}", line_number)),
            ordered_quantity: Set(ordered_quantity),
            allocated_quantity: Set(0),
            remaining_quantity: Set(ordered_quantity),
            unit_weight_kg: Set(Some(dec!(1.5))),
            is_chemical: Set(is_chemical),
            is_dangerous_good: Set(is_dangerous_good),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db)
        .await
        .expect("seed purchase order line")
    }

    pub async fn seed_packaging_type(&self) -> packaging_type::Model {
        packaging_type::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set("Euro pallet".to_string()),
            length_cm: Set(dec!(120)),
            width_cm: Set(dec!(80)),
            height_cm: Set(dec!(144)),
            tare_weight_kg: Set(dec!(25)),
            max_weight_kg: Set(dec!(1000)),
            active: Set(true),
        }
        .insert(&*self.db)
        .await
        .expect("seed packaging type")
    }

    pub async fn seed_forwarder(&self, code: &str, active: bool) -> freight_forwarder::Model {
        freight_forwarder::ActiveModel {
            id: Set(Uuid::new_v4()),
            code: Set(code.to_string()),
            name: Set(format!("{} Logistics", code)),
            contact_email: Set(Some(format!("ops@{}.example", code.to_lowercase()))),
            active: Set(active),
        }
        .insert(&*self.db)
        .await
        .expect("seed freight forwarder")
    }

    /// Inserts a bare console row, bypassing the service.
    pub async fn seed_console(&self, console_id: &str, status: ConsoleStatus) -> console::Model {
        let now = Utc::now();
        console::ActiveModel {
            id: Set(Uuid::new_v4()),
            console_id: Set(console_id.to_string()),
            status: Set(status),
            freight_forwarder_id: Set(None),
            pickup_datetime: Set(None),
            gl_account: Set(None),
            destination_key: Set(String::new()),
            destination_country: Set(None),
            pickup_rejection_reason: Set(None),
            last_bol_generated_at: Set(None),
            last_bol_generated_by: Set(None),
            created_by: Set(self.admin.user_id),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db)
        .await
        .expect("seed console")
    }

    pub async fn reload_line(&self, id: Uuid) -> purchase_order_line::Model {
        purchase_order_line::Entity::find_by_id(id)
            .one(&*self.db)
            .await
            .expect("query line")
            .expect("line exists")
    }

    pub async fn reload_consignment(&self, id: Uuid) -> consignment::Model {
        consignment::Entity::find_by_id(id)
            .one(&*self.db)
            .await
            .expect("query consignment")
            .expect("consignment exists")
    }

    pub async fn reload_console(&self, id: Uuid) -> console::Model {
        console::Entity::find_by_id(id)
            .one(&*self.db)
            .await
            .expect("query console")
            .expect("console exists")
    }

    pub async fn step(
        &self,
        actor: &Actor,
        consignment_id: Uuid,
        step: i32,
        input: Value,
    ) -> consignment::Model {
        self.services
            .workflow
            .handle_step(actor, consignment_id, step, input)
            .await
            .unwrap_or_else(|e| panic!("step {} failed: {}", step, e))
            .consignment
    }

    /// Drives a new draft through every wizard step and submits it.
    ///
    /// Each `(line, quantity)` pair is packed into a single shared package.
    pub async fn submitted_consignment(
        &self,
        actor: &Actor,
        lines: &[(&purchase_order_line::Model, i32)],
        delivery: Value,
    ) -> consignment::Model {
        let packaging = self.seed_packaging_type().await;
        let draft = self
            .services
            .consignments
            .create_draft(actor)
            .await
            .expect("create draft");

        let line_ids: Vec<Uuid> = lines.iter().map(|(l, _)| l.id).collect();
        self.step(actor, draft.id, 0, json!({ "po_line_ids": line_ids }))
            .await;
        self.step(actor, draft.id, 1, packaging_input(packaging.id, lines))
            .await;
        let compliance: Vec<Value> = lines
            .iter()
            .map(|(l, _)| json!({ "po_line_id": l.id, "country_of_origin": "SE", "hs_code": "8471.30" }))
            .collect();
        self.step(actor, draft.id, 2, json!({ "lines": compliance }))
            .await;
        self.step(
            actor,
            draft.id,
            3,
            json!({ "consignor": party("Nordic Components AB", "Industrigatan 4", "Malmo", "21120", "SE"), "delivery": delivery }),
        )
        .await;
        let submitted = self
            .step(actor, draft.id, 4, json!({ "confirm": true }))
            .await;
        assert_eq!(submitted.status, ConsignmentStatus::PendingForApproval);
        submitted
    }

    /// A submitted and approved consignment waiting for a console.
    pub async fn approved_consignment(
        &self,
        lines: &[(&purchase_order_line::Model, i32)],
        delivery: Value,
    ) -> consignment::Model {
        let submitted = self
            .submitted_consignment(&self.requester, lines, delivery)
            .await;
        self.services
            .consignments
            .review_consignment(&self.approver, submitted.id, ReviewDecision::Approve)
            .await
            .expect("approve consignment")
    }

    /// Approved consignment packing all four units of a fresh single-line order.
    pub async fn ready_for_console(&self, po_number: &str, delivery: Value) -> consignment::Model {
        let po = self.seed_purchase_order(po_number).await;
        let line = self.seed_line(&po, 1, 4).await;
        self.approved_consignment(&[(&line, 4)], delivery).await
    }
}

pub fn party(name: &str, address: &str, city: &str, postal_code: &str, country: &str) -> Value {
    json!({
        "name": name,
        "address": address,
        "city": city,
        "postal_code": postal_code,
        "country": country,
    })
}

pub fn rotterdam() -> Value {
    party("Harbour DC", "Waalhaven 12", "Rotterdam", "3089 KH", "NL")
}

pub fn hamburg() -> Value {
    party("Elbe Warehouse", "Kattwykstrasse 7", "Hamburg", "21107", "DE")
}

pub fn malmo() -> Value {
    party("South Hub", "Hamngatan 2", "Malmo", "21122", "SE")
}

pub fn packaging_input(
    packaging_type_id: Uuid,
    lines: &[(&purchase_order_line::Model, i32)],
) -> Value {
    let items: Vec<Value> = lines
        .iter()
        .map(|(l, qty)| json!({ "po_line_id": l.id, "quantity": qty }))
        .collect();
    json!({
        "packages": [{
            "packaging_type_id": packaging_type_id,
            "gross_weight_kg": "42.5",
            "items": items,
        }]
    })
}
