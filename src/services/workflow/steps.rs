//! Handlers for the five wizard steps.

use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseTransaction, EntityTrait, ModelTrait,
    QueryFilter, Set,
};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::debug;
use uuid::Uuid;

use super::inputs::{
    self, normalize_country, normalize_un_number, non_blank, AddressInput, ComplianceInput,
    LineSelectionInput, PackagingInput, ReviewInput,
};
use super::{StepContext, StepHandler, WizardStep};
use crate::entities::{
    consignment, consignment_document, consignment_packaging, consignment_po_line,
    packaging_allocation, packaging_type, purchase_order_line, ConsignmentStatus,
};
use crate::errors::ServiceError;
use crate::services::allocation::{
    allocate_in, allocated_total, lock_lines, reconcile_lines, remove_allocation_in,
    within_capacity,
};
use crate::services::audit::{self, ENTITY_CONSIGNMENT, ENTITY_CONSIGNMENT_PO_LINE};
use crate::services::consignments::ConsignmentBundle;
use crate::services::sequences::PackageIdAllocator;

async fn selected_lines<C: ConnectionTrait>(
    conn: &C,
    consignment_pk: Uuid,
) -> Result<Vec<(consignment_po_line::Model, purchase_order_line::Model)>, ServiceError> {
    Ok(consignment_po_line::Entity::find()
        .filter(consignment_po_line::Column::ConsignmentId.eq(consignment_pk))
        .find_also_related(purchase_order_line::Entity)
        .all(conn)
        .await?
        .into_iter()
        .filter_map(|(cpl, line)| line.map(|line| (cpl, line)))
        .collect())
}

async fn document_counts<C: ConnectionTrait>(
    conn: &C,
    cpl_ids: Vec<Uuid>,
) -> Result<HashMap<Uuid, usize>, ServiceError> {
    let mut counts = HashMap::new();
    for doc in consignment_document::Entity::find()
        .filter(consignment_document::Column::ConsignmentPoLineId.is_in(cpl_ids))
        .all(conn)
        .await?
    {
        *counts.entry(doc.consignment_po_line_id).or_default() += 1;
    }
    Ok(counts)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IssueKind {
    MissingOrigin,
    MissingHsCode,
    MissingDgClass,
    InvalidUnNumber,
    MissingDgDocument,
}

#[derive(Debug, Clone)]
struct ComplianceIssue {
    kind: IssueKind,
    message: String,
}

/// Problems that keep one line from passing compliance.
fn compliance_issues(
    line: &purchase_order_line::Model,
    cpl: &consignment_po_line::Model,
    document_count: usize,
) -> Vec<ComplianceIssue> {
    let label = format!("line {} ({})", line.line_number, line.product_code);
    let mut issues = Vec::new();
    let mut push = |kind: IssueKind, what: &str| {
        issues.push(ComplianceIssue {
            kind,
            message: format!("{}: {}", label, what),
        })
    };

    if non_blank(&cpl.country_of_origin).is_none() {
        push(IssueKind::MissingOrigin, "country of origin is required");
    }
    if line.is_chemical && non_blank(&cpl.hs_code).is_none() {
        push(IssueKind::MissingHsCode, "chemical lines require an HS code");
    }
    if line.is_dangerous_good {
        if non_blank(&cpl.dg_class).is_none() {
            push(IssueKind::MissingDgClass, "dangerous goods class is required");
        }
        if cpl.un_number.as_deref().and_then(normalize_un_number).is_none() {
            push(IssueKind::InvalidUnNumber, "UN number must look like UN1234");
        }
        if document_count == 0 {
            push(
                IssueKind::MissingDgDocument,
                "dangerous goods need at least one supporting document",
            );
        }
    }
    issues
}

fn issues_to_error(issues: Vec<String>) -> Result<(), ServiceError> {
    if issues.is_empty() {
        Ok(())
    } else {
        Err(ServiceError::ValidationError(issues.join("; ")))
    }
}

/// Deletes packages of the consignment that no longer hold any allocation.
async fn drop_empty_packages<C: ConnectionTrait>(
    conn: &C,
    consignment_pk: Uuid,
) -> Result<usize, ServiceError> {
    let packages = consignment_packaging::Entity::find()
        .filter(consignment_packaging::Column::ConsignmentId.eq(consignment_pk))
        .all(conn)
        .await?;
    let used: BTreeSet<Uuid> = packaging_allocation::Entity::find()
        .filter(packaging_allocation::Column::ConsignmentId.eq(consignment_pk))
        .all(conn)
        .await?
        .into_iter()
        .map(|a| a.packaging_id)
        .collect();

    let mut dropped = 0;
    for package in packages {
        if !used.contains(&package.id) {
            package.delete(conn).await?;
            dropped += 1;
        }
    }
    Ok(dropped)
}

pub struct LineSelectionStep;

#[async_trait]
impl StepHandler for LineSelectionStep {
    fn step(&self) -> WizardStep {
        WizardStep::LineSelection
    }

    async fn handle(
        &self,
        txn: &DatabaseTransaction,
        ctx: &StepContext<'_>,
        consignment: consignment::Model,
        input: serde_json::Value,
    ) -> Result<consignment::Model, ServiceError> {
        let input: LineSelectionInput = inputs::parse(self.step(), input)?;
        input.check()?;

        let requested: BTreeSet<Uuid> = input.po_line_ids.iter().copied().collect();
        let lines: HashMap<Uuid, purchase_order_line::Model> = purchase_order_line::Entity::find()
            .filter(purchase_order_line::Column::Id.is_in(requested.iter().copied()))
            .all(txn)
            .await?
            .into_iter()
            .map(|l| (l.id, l))
            .collect();
        let missing: Vec<String> = requested
            .iter()
            .filter(|id| !lines.contains_key(id))
            .map(Uuid::to_string)
            .collect();
        if !missing.is_empty() {
            return Err(ServiceError::NotFound(format!(
                "Purchase order lines not found: {}",
                missing.join(", ")
            )));
        }

        let existing = consignment_po_line::Entity::find()
            .filter(consignment_po_line::Column::ConsignmentId.eq(consignment.id))
            .all(txn)
            .await?;
        let existing_ids: BTreeSet<Uuid> = existing.iter().map(|c| c.po_line_id).collect();

        let mut released = Vec::new();
        for cpl in existing.into_iter().filter(|c| !requested.contains(&c.po_line_id)) {
            let allocations = packaging_allocation::Entity::find()
                .filter(packaging_allocation::Column::ConsignmentId.eq(consignment.id))
                .filter(packaging_allocation::Column::PoLineId.eq(cpl.po_line_id))
                .all(txn)
                .await?;
            for allocation in allocations {
                remove_allocation_in(txn, ctx.actor, allocation).await?;
            }
            consignment_document::Entity::delete_many()
                .filter(consignment_document::Column::ConsignmentPoLineId.eq(cpl.id))
                .exec(txn)
                .await?;

            audit::record_change(
                txn,
                ctx.actor,
                ENTITY_CONSIGNMENT,
                consignment.id,
                "po_line",
                Some(cpl.po_line_id.to_string()),
                None,
            )
            .await?;
            released.push(cpl.po_line_id);
            cpl.delete(txn).await?;
        }

        for po_line_id in requested.iter().filter(|id| !existing_ids.contains(id)) {
            let line = &lines[po_line_id];
            let taken = allocated_total(txn, line.id).await?;
            if taken >= line.ordered_quantity {
                return Err(ServiceError::CapacityExceeded(format!(
                    "Line {} of {} is already fully allocated",
                    line.line_number, line.product_code
                )));
            }

            consignment_po_line::ActiveModel {
                id: Set(Uuid::new_v4()),
                consignment_id: Set(consignment.id),
                po_line_id: Set(line.id),
                hs_code: Set(None),
                eccn: Set(None),
                dg_class: Set(None),
                un_number: Set(None),
                dg_category: Set(None),
                country_of_origin: Set(None),
                created_at: Set(ctx.now),
                updated_at: Set(ctx.now),
            }
            .insert(txn)
            .await?;

            audit::record_change(
                txn,
                ctx.actor,
                ENTITY_CONSIGNMENT,
                consignment.id,
                "po_line",
                None,
                Some(line.id.to_string()),
            )
            .await?;
        }

        if !released.is_empty() {
            let dropped = drop_empty_packages(txn, consignment.id).await?;
            reconcile_lines(txn, &released).await?;
            debug!(released = released.len(), dropped, "lines deselected");
        }

        Ok(consignment)
    }
}

/// Adds packed units of `line` to a running tally, refusing totals past the ordered quantity.
fn add_units(
    tally: &mut BTreeMap<Uuid, i32>,
    line: &purchase_order_line::Model,
    quantity: i32,
) -> Result<(), ServiceError> {
    let entry = tally.entry(line.id).or_default();
    *entry = within_capacity(*entry, quantity, line.ordered_quantity).ok_or_else(|| {
        ServiceError::CapacityExceeded(format!(
            "Packing plan puts more than the {} ordered units of line {} ({}) into packages",
            line.ordered_quantity, line.line_number, line.product_code
        ))
    })?;
    Ok(())
}

pub struct PackagingStep;

#[async_trait]
impl StepHandler for PackagingStep {
    fn step(&self) -> WizardStep {
        WizardStep::Packaging
    }

    /// Replaces the consignment's whole packing plan.
    async fn handle(
        &self,
        txn: &DatabaseTransaction,
        ctx: &StepContext<'_>,
        consignment: consignment::Model,
        input: serde_json::Value,
    ) -> Result<consignment::Model, ServiceError> {
        let input: PackagingInput = inputs::parse(self.step(), input)?;
        input.check()?;

        let selected: BTreeMap<Uuid, purchase_order_line::Model> = selected_lines(txn, consignment.id)
            .await?
            .into_iter()
            .map(|(_, line)| (line.id, line))
            .collect();
        if selected.is_empty() {
            return Err(ServiceError::InvalidState(
                "Select purchase order lines before packing".to_string(),
            ));
        }

        let existing_packages: HashMap<Uuid, consignment_packaging::Model> =
            consignment_packaging::Entity::find()
                .filter(consignment_packaging::Column::ConsignmentId.eq(consignment.id))
                .all(txn)
                .await?
                .into_iter()
                .map(|p| (p.id, p))
                .collect();

        let type_ids: Vec<Uuid> = input.packages.iter().map(|p| p.packaging_type_id).collect();
        let types: HashMap<Uuid, packaging_type::Model> = packaging_type::Entity::find()
            .filter(packaging_type::Column::Id.is_in(type_ids))
            .all(txn)
            .await?
            .into_iter()
            .map(|t| (t.id, t))
            .collect();

        let mut packed: BTreeMap<Uuid, i32> = BTreeMap::new();
        for package in &input.packages {
            let packaging_type = types.get(&package.packaging_type_id).ok_or_else(|| {
                ServiceError::NotFound(format!(
                    "Packaging type {} not found",
                    package.packaging_type_id
                ))
            })?;
            if !packaging_type.active {
                return Err(ServiceError::ValidationError(format!(
                    "Packaging type '{}' is no longer in use",
                    packaging_type.name
                )));
            }
            if let Some(weight) = package.gross_weight_kg {
                if weight > packaging_type.max_weight_kg {
                    return Err(ServiceError::ValidationError(format!(
                        "Gross weight {} kg exceeds the {} kg limit of '{}'",
                        weight, packaging_type.max_weight_kg, packaging_type.name
                    )));
                }
            }
            if let Some(packaging_id) = package.packaging_id {
                if !existing_packages.contains_key(&packaging_id) {
                    return Err(ServiceError::ValidationError(format!(
                        "Package {} does not belong to consignment {}",
                        packaging_id, consignment.consignment_id
                    )));
                }
            }
            for item in &package.items {
                if !selected.contains_key(&item.po_line_id) {
                    return Err(ServiceError::ValidationError(format!(
                        "Line {} is not selected in consignment {}",
                        item.po_line_id, consignment.consignment_id
                    )));
                }
                add_units(&mut packed, &selected[&item.po_line_id], item.quantity)?;
            }
        }

        let unpacked: Vec<String> = selected
            .values()
            .filter(|line| packed.get(&line.id).copied().unwrap_or(0) < 1)
            .map(|line| format!("line {} ({})", line.line_number, line.product_code))
            .collect();
        if !unpacked.is_empty() {
            return Err(ServiceError::ValidationError(format!(
                "Every selected line needs at least one packed unit: {}",
                unpacked.join(", ")
            )));
        }

        lock_lines(txn, selected.keys().copied()).await?;

        // Clear the previous plan.
        let mut touched: BTreeSet<Uuid> = selected.keys().copied().collect();
        let previous = packaging_allocation::Entity::find()
            .filter(packaging_allocation::Column::ConsignmentId.eq(consignment.id))
            .all(txn)
            .await?;
        for allocation in previous {
            touched.insert(remove_allocation_in(txn, ctx.actor, allocation).await?);
        }
        let retained: BTreeSet<Uuid> = input.packages.iter().filter_map(|p| p.packaging_id).collect();
        for (id, package) in &existing_packages {
            if !retained.contains(id) {
                package.clone().delete(txn).await?;
            }
        }

        let mut package_ids = PackageIdAllocator::load(txn, consignment.id, &consignment.consignment_id).await?;

        for package in &input.packages {
            let draft_package_id = non_blank(&package.draft_package_id);
            let saved = match package.packaging_id.and_then(|id| existing_packages.get(&id)) {
                Some(existing) => {
                    let mut active: consignment_packaging::ActiveModel = existing.clone().into();
                    active.packaging_type_id = Set(package.packaging_type_id);
                    active.gross_weight_kg = Set(package.gross_weight_kg);
                    active.draft_package_id = Set(draft_package_id);
                    active.updated_at = Set(ctx.now);
                    active.update(txn).await?
                }
                None => {
                    consignment_packaging::ActiveModel {
                        id: Set(Uuid::new_v4()),
                        consignment_id: Set(consignment.id),
                        packaging_type_id: Set(package.packaging_type_id),
                        package_id: Set(package_ids.next_id()),
                        draft_package_id: Set(draft_package_id),
                        gross_weight_kg: Set(package.gross_weight_kg),
                        created_at: Set(ctx.now),
                        updated_at: Set(ctx.now),
                    }
                    .insert(txn)
                    .await?
                }
            };

            let mut per_line: BTreeMap<Uuid, i32> = BTreeMap::new();
            for item in &package.items {
                add_units(&mut per_line, &selected[&item.po_line_id], item.quantity)?;
            }
            for (po_line_id, quantity) in per_line {
                allocate_in(txn, ctx.actor, &consignment, &saved, po_line_id, quantity).await?;
            }
        }

        let touched: Vec<Uuid> = touched.into_iter().collect();
        reconcile_lines(txn, &touched).await?;

        debug!(
            consignment_id = %consignment.consignment_id,
            packages = input.packages.len(),
            "packing plan replaced"
        );
        Ok(consignment)
    }
}

pub struct ComplianceStep;

#[async_trait]
impl StepHandler for ComplianceStep {
    fn step(&self) -> WizardStep {
        WizardStep::Compliance
    }

    async fn handle(
        &self,
        txn: &DatabaseTransaction,
        ctx: &StepContext<'_>,
        consignment: consignment::Model,
        input: serde_json::Value,
    ) -> Result<consignment::Model, ServiceError> {
        let input: ComplianceInput = inputs::parse(self.step(), input)?;
        input.check()?;

        let selected = selected_lines(txn, consignment.id).await?;
        let by_line: HashMap<Uuid, usize> = selected
            .iter()
            .enumerate()
            .map(|(i, (_, line))| (line.id, i))
            .collect();

        let extra: Vec<String> = input
            .lines
            .iter()
            .filter(|l| !by_line.contains_key(&l.po_line_id))
            .map(|l| l.po_line_id.to_string())
            .collect();
        if !extra.is_empty() {
            return Err(ServiceError::ValidationError(format!(
                "Lines not selected in this consignment: {}",
                extra.join(", ")
            )));
        }
        let provided: BTreeSet<Uuid> = input.lines.iter().map(|l| l.po_line_id).collect();
        let missing: Vec<String> = selected
            .iter()
            .filter(|(_, line)| !provided.contains(&line.id))
            .map(|(_, line)| format!("line {} ({})", line.line_number, line.product_code))
            .collect();
        if !missing.is_empty() {
            return Err(ServiceError::ValidationError(format!(
                "Compliance data missing for {}",
                missing.join(", ")
            )));
        }

        let docs = document_counts(txn, selected.iter().map(|(cpl, _)| cpl.id).collect()).await?;

        let mut issues = Vec::new();
        let mut staged = Vec::with_capacity(input.lines.len());
        for entry in &input.lines {
            let (cpl, line) = &selected[by_line[&entry.po_line_id]];
            let country = match normalize_country("country_of_origin", &entry.country_of_origin) {
                Ok(code) => Some(code),
                Err(e) => {
                    issues.push(format!(
                        "line {} ({}): {}",
                        line.line_number,
                        line.product_code,
                        e.response_message()
                    ));
                    None
                }
            };
            let un_number = non_blank(&entry.un_number)
                .map(|raw| normalize_un_number(&raw).unwrap_or(raw));

            let mut proposed = cpl.clone();
            proposed.hs_code = non_blank(&entry.hs_code);
            proposed.eccn = non_blank(&entry.eccn);
            proposed.country_of_origin = country;
            proposed.dg_class = non_blank(&entry.dg_class);
            proposed.un_number = un_number;
            proposed.dg_category = non_blank(&entry.dg_category);

            let count = docs.get(&cpl.id).copied().unwrap_or(0);
            // Origin problems were already reported with the parse error above.
            issues.extend(
                compliance_issues(line, &proposed, count)
                    .into_iter()
                    .filter(|i| i.kind != IssueKind::MissingOrigin)
                    .map(|i| i.message),
            );
            staged.push((cpl.clone(), proposed));
        }
        issues_to_error(issues)?;

        for (current, proposed) in staged {
            let fields = [
                ("hs_code", &current.hs_code, &proposed.hs_code),
                ("eccn", &current.eccn, &proposed.eccn),
                ("country_of_origin", &current.country_of_origin, &proposed.country_of_origin),
                ("dg_class", &current.dg_class, &proposed.dg_class),
                ("un_number", &current.un_number, &proposed.un_number),
                ("dg_category", &current.dg_category, &proposed.dg_category),
            ];
            let mut changed = false;
            for (name, old, new) in fields {
                if old != new {
                    changed = true;
                    audit::record_change(
                        txn,
                        ctx.actor,
                        ENTITY_CONSIGNMENT_PO_LINE,
                        current.id,
                        name,
                        old.clone(),
                        new.clone(),
                    )
                    .await?;
                }
            }
            if !changed {
                continue;
            }

            let mut active: consignment_po_line::ActiveModel = current.into();
            active.hs_code = Set(proposed.hs_code);
            active.eccn = Set(proposed.eccn);
            active.country_of_origin = Set(proposed.country_of_origin);
            active.dg_class = Set(proposed.dg_class);
            active.un_number = Set(proposed.un_number);
            active.dg_category = Set(proposed.dg_category);
            active.updated_at = Set(ctx.now);
            active.update(txn).await?;
        }

        Ok(consignment)
    }
}

pub struct AddressStep;

#[async_trait]
impl StepHandler for AddressStep {
    fn step(&self) -> WizardStep {
        WizardStep::Address
    }

    async fn handle(
        &self,
        txn: &DatabaseTransaction,
        ctx: &StepContext<'_>,
        consignment: consignment::Model,
        input: serde_json::Value,
    ) -> Result<consignment::Model, ServiceError> {
        let input: AddressInput = inputs::parse(self.step(), input)?;
        let consignor = input.consignor.normalized("consignor")?;
        let delivery = input.delivery.normalized("delivery")?;

        let updates = [
            ("consignor_name", &consignment.consignor_name, &consignor.name),
            ("consignor_address", &consignment.consignor_address, &consignor.address),
            ("consignor_city", &consignment.consignor_city, &consignor.city),
            ("consignor_postal_code", &consignment.consignor_postal_code, &consignor.postal_code),
            ("consignor_country", &consignment.consignor_country, &consignor.country),
            ("delivery_name", &consignment.delivery_name, &delivery.name),
            ("delivery_address", &consignment.delivery_address, &delivery.address),
            ("delivery_city", &consignment.delivery_city, &delivery.city),
            ("delivery_postal_code", &consignment.delivery_postal_code, &delivery.postal_code),
            ("delivery_country", &consignment.delivery_country, &delivery.country),
        ];
        for (field, old, new) in updates {
            audit::record_change(
                txn,
                ctx.actor,
                ENTITY_CONSIGNMENT,
                consignment.id,
                field,
                old.clone(),
                Some(new.clone()),
            )
            .await?;
        }

        let mut active: consignment::ActiveModel = consignment.into();
        active.consignor_name = Set(Some(consignor.name));
        active.consignor_address = Set(Some(consignor.address));
        active.consignor_city = Set(Some(consignor.city));
        active.consignor_postal_code = Set(Some(consignor.postal_code));
        active.consignor_country = Set(Some(consignor.country));
        active.delivery_name = Set(Some(delivery.name));
        active.delivery_address = Set(Some(delivery.address));
        active.delivery_city = Set(Some(delivery.city));
        active.delivery_postal_code = Set(Some(delivery.postal_code));
        active.delivery_country = Set(Some(delivery.country));
        active.updated_at = Set(ctx.now);

        Ok(active.update(txn).await?)
    }
}

pub struct ReviewStep;

impl ReviewStep {
    fn completeness_issues(bundle: &ConsignmentBundle) -> Vec<String> {
        let mut issues = Vec::new();
        if bundle.lines.is_empty() {
            issues.push("no purchase order lines selected".to_string());
        }
        if bundle.packages.is_empty() {
            issues.push("no packages defined".to_string());
        }
        for (cpl, line) in &bundle.lines {
            if bundle.allocated_for_line(line.id) < 1 {
                issues.push(format!(
                    "line {} ({}) has no packed units",
                    line.line_number, line.product_code
                ));
            }
            let docs = bundle.document_counts.get(&cpl.id).copied().unwrap_or(0);
            issues.extend(compliance_issues(line, cpl, docs).into_iter().map(|i| i.message));
        }
        for package in &bundle.packages {
            if !bundle.allocations.iter().any(|a| a.packaging_id == package.id) {
                issues.push(format!("package {} is empty", package.package_id));
            }
        }

        let c = &bundle.consignment;
        let address_fields = [
            &c.consignor_name,
            &c.consignor_address,
            &c.consignor_city,
            &c.consignor_postal_code,
            &c.consignor_country,
            &c.delivery_name,
            &c.delivery_address,
            &c.delivery_city,
            &c.delivery_postal_code,
            &c.delivery_country,
        ];
        if address_fields.iter().any(|f| non_blank(f).is_none()) {
            issues.push("consignor and delivery addresses are incomplete".to_string());
        }
        issues
    }
}

#[async_trait]
impl StepHandler for ReviewStep {
    fn step(&self) -> WizardStep {
        WizardStep::Review
    }

    /// Submits the consignment for approval after re-validating everything.
    async fn handle(
        &self,
        txn: &DatabaseTransaction,
        ctx: &StepContext<'_>,
        consignment: consignment::Model,
        input: serde_json::Value,
    ) -> Result<consignment::Model, ServiceError> {
        let input: ReviewInput = inputs::parse(self.step(), input)?;
        if !input.confirm {
            return Err(ServiceError::ValidationError(
                "Submission must be confirmed".to_string(),
            ));
        }

        let bundle = ConsignmentBundle::load(txn, consignment).await?;
        issues_to_error(Self::completeness_issues(&bundle))?;

        let line_ids: Vec<Uuid> = bundle.lines.iter().map(|(_, line)| line.id).collect();
        reconcile_lines(txn, &line_ids).await?;

        let consignment = bundle.consignment;
        let old_status = consignment.status;
        let mut active: consignment::ActiveModel = consignment.into();
        active.status = Set(ConsignmentStatus::PendingForApproval);
        active.submitted_at = Set(Some(ctx.now));
        active.rejection_reason = Set(None);
        active.updated_at = Set(ctx.now);
        let updated = active.update(txn).await?;

        audit::record_change(
            txn,
            ctx.actor,
            ENTITY_CONSIGNMENT,
            updated.id,
            "status",
            Some(old_status.to_string()),
            Some(updated.status.to_string()),
        )
        .await?;

        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn line(is_chemical: bool, is_dangerous_good: bool) -> purchase_order_line::Model {
        purchase_order_line::Model {
            id: Uuid::new_v4(),
            purchase_order_id: Uuid::new_v4(),
            line_number: 1,
            product_code: "SOLV-01".into(),
            description: "Solvent".into(),
            ordered_quantity: 10,
            allocated_quantity: 0,
            remaining_quantity: 10,
            unit_weight_kg: None,
            is_chemical,
            is_dangerous_good,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn cpl(line_id: Uuid) -> consignment_po_line::Model {
        consignment_po_line::Model {
            id: Uuid::new_v4(),
            consignment_id: Uuid::new_v4(),
            po_line_id: line_id,
            hs_code: None,
            eccn: None,
            dg_class: None,
            un_number: None,
            dg_category: None,
            country_of_origin: Some("DE".into()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn plain_lines_only_need_origin() {
        let l = line(false, false);
        let mut c = cpl(l.id);
        assert!(compliance_issues(&l, &c, 0).is_empty());
        c.country_of_origin = None;
        let issues = compliance_issues(&l, &c, 0);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].kind, IssueKind::MissingOrigin);
    }

    #[test]
    fn chemical_lines_need_hs_code() {
        let l = line(true, false);
        let mut c = cpl(l.id);
        assert_eq!(compliance_issues(&l, &c, 0).len(), 1);
        c.hs_code = Some("2902.20".into());
        assert!(compliance_issues(&l, &c, 0).is_empty());
    }

    #[test]
    fn dangerous_goods_need_class_un_number_and_document() {
        let l = line(false, true);
        let mut c = cpl(l.id);
        assert_eq!(compliance_issues(&l, &c, 0).len(), 3);

        c.dg_class = Some("3".into());
        c.un_number = Some("UN1203".into());
        assert_eq!(compliance_issues(&l, &c, 0).len(), 1);
        assert!(compliance_issues(&l, &c, 1).is_empty());

        c.un_number = Some("1203".into());
        let kinds: Vec<IssueKind> = compliance_issues(&l, &c, 1).iter().map(|i| i.kind).collect();
        assert_eq!(kinds, vec![IssueKind::InvalidUnNumber]);
    }
}
