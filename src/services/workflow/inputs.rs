//! Typed payloads for each wizard step.

use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;
use validator::Validate;

use super::WizardStep;
use crate::errors::ServiceError;

static COUNTRY_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z]{2}$").expect("valid regex"));
static UN_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^UN[0-9]{4}$").expect("valid regex"));

/// Deserialises a step payload, reporting shape errors as validation failures.
pub fn parse<T: DeserializeOwned>(step: WizardStep, input: serde_json::Value) -> Result<T, ServiceError> {
    serde_json::from_value(input).map_err(|e| {
        ServiceError::ValidationError(format!("Invalid input for step '{}': {}", step, e))
    })
}

/// Trimmed, uppercased ISO-3166 alpha-2 code.
pub fn normalize_country(field: &str, value: &str) -> Result<String, ServiceError> {
    let code = value.trim().to_ascii_uppercase();
    if COUNTRY_CODE.is_match(&code) {
        Ok(code)
    } else {
        Err(ServiceError::ValidationError(format!(
            "{} must be a two-letter country code, got '{}'",
            field, value
        )))
    }
}

pub fn normalize_un_number(value: &str) -> Option<String> {
    let compact: String = value
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_ascii_uppercase();
    UN_NUMBER.is_match(&compact).then_some(compact)
}

/// `None` for missing or blank strings, the trimmed value otherwise.
pub fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn ensure_unique(ids: impl IntoIterator<Item = Uuid>, what: &str) -> Result<(), ServiceError> {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(ServiceError::ValidationError(format!(
                "Duplicate {} {}",
                what, id
            )));
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LineSelectionInput {
    #[validate(length(min = 1, message = "Select at least one purchase order line"))]
    pub po_line_ids: Vec<Uuid>,
}

impl LineSelectionInput {
    pub fn check(&self) -> Result<(), ServiceError> {
        self.validate()?;
        ensure_unique(self.po_line_ids.iter().copied(), "purchase order line")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PackageItemInput {
    pub po_line_id: Uuid,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PackageInput {
    /// Existing package to keep; new packages omit it.
    #[serde(default)]
    pub packaging_id: Option<Uuid>,
    #[serde(default)]
    #[validate(length(max = 64))]
    pub draft_package_id: Option<String>,
    pub packaging_type_id: Uuid,
    #[serde(default)]
    pub gross_weight_kg: Option<Decimal>,
    #[validate(length(min = 1, message = "Every package needs at least one item"))]
    pub items: Vec<PackageItemInput>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PackagingInput {
    #[validate(length(min = 1, message = "At least one package is required"))]
    pub packages: Vec<PackageInput>,
}

impl PackagingInput {
    pub fn check(&self) -> Result<(), ServiceError> {
        self.validate()?;
        for package in &self.packages {
            package.validate()?;
            for item in &package.items {
                item.validate()?;
            }
            if let Some(weight) = package.gross_weight_kg {
                if weight <= Decimal::ZERO {
                    return Err(ServiceError::ValidationError(
                        "Gross weight must be positive".to_string(),
                    ));
                }
            }
        }
        ensure_unique(
            self.packages.iter().filter_map(|p| p.packaging_id),
            "package",
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ComplianceLineInput {
    pub po_line_id: Uuid,
    #[serde(default)]
    pub hs_code: Option<String>,
    #[serde(default)]
    pub eccn: Option<String>,
    pub country_of_origin: String,
    #[serde(default)]
    pub dg_class: Option<String>,
    #[serde(default)]
    pub un_number: Option<String>,
    #[serde(default)]
    pub dg_category: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ComplianceInput {
    #[validate(length(min = 1, message = "Compliance data is required for every line"))]
    pub lines: Vec<ComplianceLineInput>,
}

impl ComplianceInput {
    pub fn check(&self) -> Result<(), ServiceError> {
        self.validate()?;
        ensure_unique(self.lines.iter().map(|l| l.po_line_id), "compliance line")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PartyInput {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(length(min = 1, max = 512))]
    pub address: String,
    #[validate(length(min = 1, max = 128))]
    pub city: String,
    #[validate(length(min = 1, max = 32))]
    pub postal_code: String,
    #[validate(length(min = 2, max = 2))]
    pub country: String,
}

impl PartyInput {
    /// Trims every field and normalises the country code.
    pub fn normalized(&self, role: &str) -> Result<PartyInput, ServiceError> {
        let party = PartyInput {
            name: self.name.trim().to_string(),
            address: self.address.trim().to_string(),
            city: self.city.trim().to_string(),
            postal_code: self.postal_code.trim().to_string(),
            country: normalize_country(&format!("{} country", role), &self.country)?,
        };
        party.validate()?;
        Ok(party)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AddressInput {
    #[validate]
    pub consignor: PartyInput,
    #[validate]
    pub delivery: PartyInput,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewInput {
    pub confirm: bool,
}
