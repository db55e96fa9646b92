//! Consignment creation wizard.
//!
//! Five fixed steps, each served by a typed [`StepHandler`]. The stored step
//! pointer only moves forward: revisiting a completed step edits data but
//! never lowers `consignment.step`.

pub mod inputs;
pub mod steps;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::counter;
use sea_orm::{ActiveModelTrait, DatabaseConnection, DatabaseTransaction, Set, TransactionTrait};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::auth::Actor;
use crate::entities::{consignment, ConsignmentStatus};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::services::consignments::lock_consignment;

/// Pointer value stored once the review step has been submitted.
pub const WIZARD_COMPLETE: i32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WizardStep {
    LineSelection = 0,
    Packaging = 1,
    Compliance = 2,
    Address = 3,
    Review = 4,
}

impl WizardStep {
    pub const ALL: [WizardStep; 5] = [
        WizardStep::LineSelection,
        WizardStep::Packaging,
        WizardStep::Compliance,
        WizardStep::Address,
        WizardStep::Review,
    ];

    pub fn index(self) -> i32 {
        self as i32
    }

    pub fn name(self) -> &'static str {
        match self {
            WizardStep::LineSelection => "line_selection",
            WizardStep::Packaging => "packaging",
            WizardStep::Compliance => "compliance",
            WizardStep::Address => "address",
            WizardStep::Review => "review",
        }
    }
}

impl TryFrom<i32> for WizardStep {
    type Error = ServiceError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        WizardStep::ALL
            .into_iter()
            .find(|s| s.index() == value)
            .ok_or_else(|| ServiceError::ValidationError(format!("Unknown wizard step {}", value)))
    }
}

impl fmt::Display for WizardStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// New pointer after completing `step`.
pub fn advance_pointer(current: i32, step: WizardStep) -> i32 {
    current.max(step.index() + 1)
}

pub struct StepContext<'a> {
    pub actor: &'a Actor,
    pub now: DateTime<Utc>,
}

#[async_trait]
pub trait StepHandler: Send + Sync {
    fn step(&self) -> WizardStep;

    /// Validates `input` and applies the step's mutation on `txn`.
    async fn handle(
        &self,
        txn: &DatabaseTransaction,
        ctx: &StepContext<'_>,
        consignment: consignment::Model,
        input: serde_json::Value,
    ) -> Result<consignment::Model, ServiceError>;
}

/// Step number to handler mapping, complete by construction.
pub struct StepRegistry {
    handlers: BTreeMap<WizardStep, Arc<dyn StepHandler>>,
}

impl std::fmt::Debug for StepRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepRegistry")
            .field("steps", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[derive(Default)]
pub struct StepRegistryBuilder {
    handlers: BTreeMap<WizardStep, Arc<dyn StepHandler>>,
    duplicates: Vec<WizardStep>,
}

impl StepRegistryBuilder {
    pub fn register(mut self, handler: impl StepHandler + 'static) -> Self {
        let step = handler.step();
        if self.handlers.insert(step, Arc::new(handler)).is_some() {
            self.duplicates.push(step);
        }
        self
    }

    pub fn build(self) -> Result<StepRegistry, ServiceError> {
        if let Some(step) = self.duplicates.first() {
            return Err(ServiceError::InternalError(format!(
                "Step '{}' has more than one handler",
                step
            )));
        }
        let missing: Vec<&str> = WizardStep::ALL
            .iter()
            .filter(|s| !self.handlers.contains_key(s))
            .map(|s| s.name())
            .collect();
        if !missing.is_empty() {
            return Err(ServiceError::InternalError(format!(
                "No handler registered for steps: {}",
                missing.join(", ")
            )));
        }
        Ok(StepRegistry {
            handlers: self.handlers,
        })
    }
}

impl StepRegistry {
    pub fn builder() -> StepRegistryBuilder {
        StepRegistryBuilder::default()
    }

    /// Registry wired with the production handlers.
    pub fn standard() -> Result<Self, ServiceError> {
        Self::builder()
            .register(steps::LineSelectionStep)
            .register(steps::PackagingStep)
            .register(steps::ComplianceStep)
            .register(steps::AddressStep)
            .register(steps::ReviewStep)
            .build()
    }

    pub fn handler(&self, step: WizardStep) -> Result<&Arc<dyn StepHandler>, ServiceError> {
        self.handlers
            .get(&step)
            .ok_or_else(|| ServiceError::InternalError(format!("No handler for step '{}'", step)))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepOutcome {
    pub consignment: consignment::Model,
    pub completed_step: WizardStep,
    /// `None` once the wizard is complete.
    pub next_step: Option<WizardStep>,
}

#[derive(Clone)]
pub struct WorkflowService {
    db_pool: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
    registry: Arc<StepRegistry>,
}

impl WorkflowService {
    pub fn new(
        db_pool: Arc<DatabaseConnection>,
        event_sender: Arc<EventSender>,
        registry: Arc<StepRegistry>,
    ) -> Self {
        Self {
            db_pool,
            event_sender,
            registry,
        }
    }

    /// Runs wizard step `step_number` for a consignment inside one transaction.
    #[instrument(skip(self, input), fields(user_id = %actor.user_id))]
    pub async fn handle_step(
        &self,
        actor: &Actor,
        consignment_id: Uuid,
        step_number: i32,
        input: serde_json::Value,
    ) -> Result<StepOutcome, ServiceError> {
        let step = WizardStep::try_from(step_number)?;
        let handler = self.registry.handler(step)?.clone();

        let txn = self.db_pool.begin().await?;
        let consignment = lock_consignment(&txn, consignment_id).await?;
        actor.require_edit_of(consignment.created_by)?;

        let allowed = match step {
            WizardStep::Review => consignment.status.is_submittable(),
            _ => consignment.status.is_mutable(),
        };
        if !allowed {
            return Err(ServiceError::InvalidState(format!(
                "Step '{}' is not available while consignment {} is {}",
                step, consignment.consignment_id, consignment.status
            )));
        }
        if step.index() > consignment.step {
            let pending = WizardStep::try_from(consignment.step)
                .map(|s| s.name())
                .unwrap_or("review");
            return Err(ServiceError::InvalidState(format!(
                "Complete step '{}' before '{}'",
                pending, step
            )));
        }

        let ctx = StepContext {
            actor,
            now: Utc::now(),
        };
        let previous_step = consignment.step;
        let updated = handler.handle(&txn, &ctx, consignment, input).await?;

        let pointer = advance_pointer(updated.step, step);
        let mut active: consignment::ActiveModel = updated.into();
        active.step = Set(pointer);
        active.updated_at = Set(ctx.now);
        let updated = active.update(&txn).await?;

        txn.commit().await?;

        counter!("consignment_workflow.step_completed", 1, "step" => step.name());
        info!(
            consignment_id = %updated.consignment_id,
            step = %step,
            previous_step,
            pointer = updated.step,
            "wizard step completed"
        );

        self.event_sender
            .send_or_log(Event::ConsignmentStepCompleted {
                consignment_id: updated.id,
                step: step.index(),
            })
            .await;
        if step == WizardStep::Review && updated.status == ConsignmentStatus::PendingForApproval {
            self.event_sender
                .send_or_log(Event::ConsignmentSubmitted {
                    consignment_id: updated.id,
                    submitted_by: actor.user_id,
                })
                .await;
        }

        let next_step = WizardStep::try_from(updated.step).ok();
        Ok(StepOutcome {
            consignment: updated,
            completed_step: step,
            next_step,
        })
    }
}
