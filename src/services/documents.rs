//! Document context builder for BOL and XML exports.
//!
//! Contexts are serialisable trees handed to an external formatter. Building
//! one is read-only apart from persisting the consignment's GL code the first
//! time it is derived.

use chrono::{DateTime, Utc};
use metrics::counter;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::auth::{Actor, Capability};
use crate::config::GlCodes;
use crate::entities::{consignment, console, freight_forwarder, ConsignmentStatus, ConsoleStatus};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::services::audit::{self, ENTITY_CONSIGNMENT, ENTITY_CONSOLE};
use crate::services::consignments::{
    ensure_visible, is_unique_violation, lock_consignment, ConsignmentBundle,
};
use crate::services::sequences;

const MAX_XML_ATTEMPTS: usize = 3;

pub const DOCUMENT_BOL: &str = "bol";
pub const DOCUMENT_CONSOLE_BOL: &str = "console_bol";
pub const DOCUMENT_XML: &str = "xml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyContext {
    pub name: String,
    pub address: String,
    pub city: String,
    pub postal_code: String,
    pub country: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineContext {
    pub po_number: String,
    pub line_number: i32,
    pub product_code: String,
    pub description: String,
    pub quantity: i32,
    pub hs_code: Option<String>,
    pub eccn: Option<String>,
    pub country_of_origin: Option<String>,
    pub is_dangerous_good: bool,
    pub dg_class: Option<String>,
    pub un_number: Option<String>,
    pub dg_category: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageContext {
    pub package_id: String,
    pub packaging_type: String,
    pub length_cm: Decimal,
    pub width_cm: Decimal,
    pub height_cm: Decimal,
    pub gross_weight_kg: Option<Decimal>,
    pub lines: Vec<LineContext>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsignmentContext {
    pub consignment_id: String,
    pub status: ConsignmentStatus,
    pub ship_from: PartyContext,
    pub ship_to: PartyContext,
    pub gl_code: String,
    pub packages: Vec<PackageContext>,
    pub total_packages: usize,
    pub total_units: i32,
    pub total_gross_weight_kg: Decimal,
    pub has_dangerous_goods: bool,
    pub xml_id: Option<String>,
    pub pickup_datetime: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForwarderContext {
    pub code: String,
    pub name: String,
    pub contact_email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsoleContext {
    pub console_id: String,
    pub status: ConsoleStatus,
    pub gl_account: String,
    pub freight_forwarder: Option<ForwarderContext>,
    pub pickup_datetime: Option<DateTime<Utc>>,
    pub consignments: Vec<ConsignmentContext>,
    pub total_packages: usize,
    pub total_gross_weight_kg: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XmlDocument {
    pub xml_id: String,
    pub generated_at: DateTime<Utc>,
    pub context: ConsignmentContext,
}

fn party(
    role: &str,
    name: &Option<String>,
    address: &Option<String>,
    city: &Option<String>,
    postal_code: &Option<String>,
    country: &Option<String>,
) -> Result<PartyContext, ServiceError> {
    let field = |value: &Option<String>, what: &str| {
        value
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .ok_or_else(|| ServiceError::InvalidState(format!("{} {} is missing", role, what)))
    };
    Ok(PartyContext {
        name: field(name, "name")?,
        address: field(address, "address")?,
        city: field(city, "city")?,
        postal_code: field(postal_code, "postal code")?,
        country: field(country, "country")?,
    })
}

fn ensure_documentable(consignment: &consignment::Model) -> Result<(), ServiceError> {
    match consignment.status {
        ConsignmentStatus::Draft | ConsignmentStatus::Cancelled => Err(ServiceError::InvalidState(
            format!(
                "Documents cannot be generated for consignment {} while it is {}",
                consignment.consignment_id, consignment.status
            ),
        )),
        _ => Ok(()),
    }
}

/// Joins the bundle into a printable tree. `gl_code` must already be resolved.
pub(crate) fn consignment_context(
    bundle: &ConsignmentBundle,
    gl_code: String,
) -> Result<ConsignmentContext, ServiceError> {
    let c = &bundle.consignment;
    let ship_from = party(
        "Consignor",
        &c.consignor_name,
        &c.consignor_address,
        &c.consignor_city,
        &c.consignor_postal_code,
        &c.consignor_country,
    )?;
    let ship_to = party(
        "Delivery",
        &c.delivery_name,
        &c.delivery_address,
        &c.delivery_city,
        &c.delivery_postal_code,
        &c.delivery_country,
    )?;
    if bundle.packages.is_empty() {
        return Err(ServiceError::InvalidState(format!(
            "Consignment {} has no packages",
            c.consignment_id
        )));
    }

    let mut packages = Vec::with_capacity(bundle.packages.len());
    for package in &bundle.packages {
        let packaging_type = bundle
            .packaging_types
            .get(&package.packaging_type_id)
            .ok_or_else(|| {
                ServiceError::InternalError(format!(
                    "Packaging type {} of package {} is missing",
                    package.packaging_type_id, package.package_id
                ))
            })?;

        let lines = bundle
            .allocations
            .iter()
            .filter(|a| a.packaging_id == package.id)
            .filter_map(|a| {
                let (cpl, line) = bundle.lines.iter().find(|(_, l)| l.id == a.po_line_id)?;
                let po_number = bundle
                    .purchase_orders
                    .get(&line.purchase_order_id)
                    .map(|po| po.po_number.clone())
                    .unwrap_or_default();
                Some(LineContext {
                    po_number,
                    line_number: line.line_number,
                    product_code: line.product_code.clone(),
                    description: line.description.clone(),
                    quantity: a.allocated_qty,
                    hs_code: cpl.hs_code.clone(),
                    eccn: cpl.eccn.clone(),
                    country_of_origin: cpl.country_of_origin.clone(),
                    is_dangerous_good: line.is_dangerous_good,
                    dg_class: cpl.dg_class.clone(),
                    un_number: cpl.un_number.clone(),
                    dg_category: cpl.dg_category.clone(),
                })
            })
            .collect();

        packages.push(PackageContext {
            package_id: package.package_id.clone(),
            packaging_type: packaging_type.name.clone(),
            length_cm: packaging_type.length_cm,
            width_cm: packaging_type.width_cm,
            height_cm: packaging_type.height_cm,
            gross_weight_kg: package.gross_weight_kg,
            lines,
        });
    }

    Ok(ConsignmentContext {
        consignment_id: c.consignment_id.clone(),
        status: c.status,
        ship_from,
        ship_to,
        gl_code,
        total_packages: packages.len(),
        packages,
        total_units: bundle.total_allocated(),
        total_gross_weight_kg: bundle.total_gross_weight(),
        has_dangerous_goods: bundle.has_dangerous_goods(),
        xml_id: c.xml_id.clone(),
        pickup_datetime: c.pickup_datetime,
    })
}

/// Returns the consignment with its GL code, deriving and persisting it once.
async fn resolve_gl_code<C: ConnectionTrait>(
    conn: &C,
    actor: &Actor,
    gl_codes: &GlCodes,
    consignment: consignment::Model,
) -> Result<consignment::Model, ServiceError> {
    if consignment.gl_code.is_some() {
        return Ok(consignment);
    }
    let code = gl_codes
        .select(
            consignment.consignor_country.as_deref(),
            consignment.delivery_country.as_deref(),
        )
        .to_string();

    audit::record_change(
        conn,
        actor,
        ENTITY_CONSIGNMENT,
        consignment.id,
        "gl_code",
        None,
        Some(code.clone()),
    )
    .await?;

    let mut active: consignment::ActiveModel = consignment.into();
    active.gl_code = Set(Some(code));
    active.updated_at = Set(Utc::now());
    Ok(active.update(conn).await?)
}

#[derive(Clone)]
pub struct DocumentService {
    db_pool: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
    gl_codes: GlCodes,
}

impl DocumentService {
    pub fn new(
        db_pool: Arc<DatabaseConnection>,
        event_sender: Arc<EventSender>,
        gl_codes: GlCodes,
    ) -> Self {
        Self {
            db_pool,
            event_sender,
            gl_codes,
        }
    }

    async fn consignment_context_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        actor: &Actor,
        consignment: consignment::Model,
    ) -> Result<ConsignmentContext, ServiceError> {
        ensure_documentable(&consignment)?;
        let consignment = resolve_gl_code(conn, actor, &self.gl_codes, consignment).await?;
        let gl_code = consignment.gl_code.clone().unwrap_or_default();
        let bundle = ConsignmentBundle::load(conn, consignment).await?;
        consignment_context(&bundle, gl_code)
    }

    #[instrument(skip(self), fields(user_id = %actor.user_id))]
    pub async fn build_consignment_context(
        &self,
        actor: &Actor,
        id: Uuid,
    ) -> Result<ConsignmentContext, ServiceError> {
        actor.require(Capability::GenerateDocuments)?;
        let txn = self.db_pool.begin().await?;
        let consignment = lock_consignment(&txn, id).await?;
        ensure_visible(actor, &consignment)?;
        let context = self.consignment_context_in(&txn, actor, consignment).await?;
        txn.commit().await?;
        Ok(context)
    }

    async fn console_context_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        actor: &Actor,
        console: &console::Model,
    ) -> Result<ConsoleContext, ServiceError> {
        if console.status == ConsoleStatus::Cancelled {
            return Err(ServiceError::InvalidState(format!(
                "Console {} is cancelled",
                console.console_id
            )));
        }
        let members = consignment::Entity::find()
            .filter(consignment::Column::ConsoleId.eq(console.id))
            .order_by_asc(consignment::Column::ConsignmentId)
            .all(conn)
            .await?;
        if members.is_empty() {
            return Err(ServiceError::InvalidState(format!(
                "Console {} has no consignments",
                console.console_id
            )));
        }

        let mut consignments = Vec::with_capacity(members.len());
        for member in members {
            consignments.push(self.consignment_context_in(conn, actor, member).await?);
        }

        let gl_account = match &console.gl_account {
            Some(account) => account.clone(),
            None if consignments.iter().all(|c| c.gl_code == self.gl_codes.domestic) => {
                self.gl_codes.domestic.clone()
            }
            None => self.gl_codes.international.clone(),
        };
        let freight_forwarder = match console.freight_forwarder_id {
            Some(id) => freight_forwarder::Entity::find_by_id(id)
                .one(conn)
                .await?
                .map(|f| ForwarderContext {
                    code: f.code,
                    name: f.name,
                    contact_email: f.contact_email,
                }),
            None => None,
        };

        Ok(ConsoleContext {
            console_id: console.console_id.clone(),
            status: console.status,
            gl_account,
            freight_forwarder,
            pickup_datetime: console.pickup_datetime,
            total_packages: consignments.iter().map(|c| c.total_packages).sum(),
            total_gross_weight_kg: consignments.iter().map(|c| c.total_gross_weight_kg).sum(),
            consignments,
        })
    }

    #[instrument(skip(self), fields(user_id = %actor.user_id))]
    pub async fn build_console_context(
        &self,
        actor: &Actor,
        console_id: Uuid,
    ) -> Result<ConsoleContext, ServiceError> {
        actor.require(Capability::GenerateDocuments)?;
        let txn = self.db_pool.begin().await?;
        let console = console::Entity::find_by_id(console_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Console {} not found", console_id)))?;
        let context = self.console_context_in(&txn, actor, &console).await?;
        txn.commit().await?;
        Ok(context)
    }

    /// Builds the bill of lading context and stamps `bol_generated_at`.
    #[instrument(skip(self), fields(user_id = %actor.user_id))]
    pub async fn generate_bol(
        &self,
        actor: &Actor,
        id: Uuid,
    ) -> Result<ConsignmentContext, ServiceError> {
        actor.require(Capability::GenerateDocuments)?;
        let txn = self.db_pool.begin().await?;
        let consignment = lock_consignment(&txn, id).await?;
        ensure_visible(actor, &consignment)?;
        let pk = consignment.id;
        let context = self.consignment_context_in(&txn, actor, consignment).await?;

        let stamped = lock_consignment(&txn, pk).await?;
        let mut active: consignment::ActiveModel = stamped.into();
        active.bol_generated_at = Set(Some(Utc::now()));
        active.update(&txn).await?;
        txn.commit().await?;

        counter!("documents.generated", 1, "document" => DOCUMENT_BOL);
        info!(consignment_id = %context.consignment_id, "bill of lading generated");
        self.event_sender
            .send_or_log(Event::DocumentGenerated {
                entity_id: pk,
                document: DOCUMENT_BOL.to_string(),
                generated_by: actor.user_id,
            })
            .await;

        Ok(context)
    }

    /// Builds the console BOL; fixes the console GL account on first generation.
    #[instrument(skip(self), fields(user_id = %actor.user_id))]
    pub async fn generate_console_bol(
        &self,
        actor: &Actor,
        console_id: Uuid,
    ) -> Result<ConsoleContext, ServiceError> {
        actor.require(Capability::GenerateDocuments)?;
        let txn = self.db_pool.begin().await?;
        let console = console::Entity::find_by_id(console_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Console {} not found", console_id)))?;
        let context = self.console_context_in(&txn, actor, &console).await?;

        audit::record_change(
            &txn,
            actor,
            ENTITY_CONSOLE,
            console.id,
            "gl_account",
            console.gl_account.clone(),
            Some(context.gl_account.clone()),
        )
        .await?;

        let now = Utc::now();
        let mut active: console::ActiveModel = console.into();
        active.gl_account = Set(Some(context.gl_account.clone()));
        active.last_bol_generated_at = Set(Some(now));
        active.last_bol_generated_by = Set(Some(actor.user_id));
        active.updated_at = Set(now);
        let console = active.update(&txn).await?;
        txn.commit().await?;

        counter!("documents.generated", 1, "document" => DOCUMENT_CONSOLE_BOL);
        info!(console_id = %console.console_id, "console bill of lading generated");
        self.event_sender
            .send_or_log(Event::DocumentGenerated {
                entity_id: console.id,
                document: DOCUMENT_CONSOLE_BOL.to_string(),
                generated_by: actor.user_id,
            })
            .await;

        Ok(context)
    }

    /// Assigns the consignment an XML id on first export and stamps the export time.
    #[instrument(skip(self), fields(user_id = %actor.user_id))]
    pub async fn generate_xml(&self, actor: &Actor, id: Uuid) -> Result<XmlDocument, ServiceError> {
        actor.require(Capability::GenerateDocuments)?;

        let mut attempt = 0;
        let document = loop {
            attempt += 1;
            match self.export_xml(actor, id).await {
                Ok(document) => break document,
                Err(ServiceError::DatabaseError(e))
                    if is_unique_violation(&e) && attempt < MAX_XML_ATTEMPTS =>
                {
                    warn!(attempt, "xml id collided, retrying");
                }
                Err(e) => return Err(e),
            }
        };

        counter!("documents.generated", 1, "document" => DOCUMENT_XML);
        info!(
            consignment_id = %document.context.consignment_id,
            xml_id = %document.xml_id,
            "xml export generated"
        );
        self.event_sender
            .send_or_log(Event::DocumentGenerated {
                entity_id: id,
                document: DOCUMENT_XML.to_string(),
                generated_by: actor.user_id,
            })
            .await;

        Ok(document)
    }

    async fn export_xml(&self, actor: &Actor, id: Uuid) -> Result<XmlDocument, ServiceError> {
        let txn = self.db_pool.begin().await?;
        let consignment = lock_consignment(&txn, id).await?;
        ensure_visible(actor, &consignment)?;
        ensure_documentable(&consignment)?;

        let now = Utc::now();
        let xml_id = match consignment.xml_id.clone() {
            Some(existing) => existing,
            None => sequences::next_xml_id(&txn).await?,
        };
        audit::record_change(
            &txn,
            actor,
            ENTITY_CONSIGNMENT,
            consignment.id,
            "xml_id",
            consignment.xml_id.clone(),
            Some(xml_id.clone()),
        )
        .await?;

        let mut active: consignment::ActiveModel = consignment.into();
        active.xml_id = Set(Some(xml_id.clone()));
        active.xml_generated_at = Set(Some(now));
        let stamped = active.update(&txn).await?;

        let context = self.consignment_context_in(&txn, actor, stamped).await?;
        txn.commit().await?;

        Ok(XmlDocument {
            xml_id,
            generated_at: now,
            context,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn party_requires_every_field() {
        let present = Some("x".to_string());
        let blank = Some("  ".to_string());
        assert!(party("Delivery", &present, &present, &present, &present, &present).is_ok());
        assert_matches!(
            party("Delivery", &present, &blank, &present, &present, &present),
            Err(ServiceError::InvalidState(msg)) if msg == "Delivery address is missing"
        );
        assert_matches!(
            party("Consignor", &present, &present, &present, &present, &None),
            Err(ServiceError::InvalidState(_))
        );
    }

    #[test]
    fn party_values_are_trimmed() {
        let v = |s: &str| Some(s.to_string());
        let p = party("Delivery", &v(" Acme "), &v("1 Quay"), &v("Hamburg"), &v("20457"), &v("DE"))
            .unwrap();
        assert_eq!(p.name, "Acme");
    }
}
