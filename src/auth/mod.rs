/*!
 * # Actor and capability checks
 *
 * Requests arrive already authenticated upstream; the gateway forwards the
 * caller as `x-user-id` / `x-user-role` headers. Every mutating service
 * operation takes the resulting [`Actor`] explicitly.
 */

use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::errors::ServiceError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Requester,
    Approver,
    LogisticsCoordinator,
    Viewer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    ViewConsignments,
    EditConsignments,
    ApproveConsignments,
    ManageConsoles,
    GenerateDocuments,
    PurgeDrafts,
}

impl Role {
    pub fn capabilities(&self) -> &'static [Capability] {
        use Capability::*;
        match self {
            Role::Admin => &[
                ViewConsignments,
                EditConsignments,
                ApproveConsignments,
                ManageConsoles,
                GenerateDocuments,
                PurgeDrafts,
            ],
            Role::Requester => &[ViewConsignments, EditConsignments, GenerateDocuments],
            Role::Approver => &[ViewConsignments, ApproveConsignments, GenerateDocuments],
            Role::LogisticsCoordinator => &[
                ViewConsignments,
                EditConsignments,
                ManageConsoles,
                GenerateDocuments,
            ],
            Role::Viewer => &[ViewConsignments],
        }
    }

    pub fn has(&self, capability: Capability) -> bool {
        self.capabilities().contains(&capability)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Requester => "requester",
            Role::Approver => "approver",
            Role::LogisticsCoordinator => "logistics_coordinator",
            Role::Viewer => "viewer",
        }
    }
}

impl FromStr for Role {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "requester" => Ok(Role::Requester),
            "approver" => Ok(Role::Approver),
            "logistics_coordinator" | "coordinator" => Ok(Role::LogisticsCoordinator),
            "viewer" => Ok(Role::Viewer),
            other => Err(ServiceError::Forbidden(format!("Unknown role '{}'", other))),
        }
    }
}

/// The verified caller of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: Uuid,
    pub role: Role,
}

impl Actor {
    pub fn new(user_id: Uuid, role: Role) -> Self {
        Self { user_id, role }
    }

    /// Fails with `Forbidden` unless the actor's role grants `capability`.
    pub fn require(&self, capability: Capability) -> Result<(), ServiceError> {
        if self.role.has(capability) {
            Ok(())
        } else {
            Err(ServiceError::Forbidden(format!(
                "Role '{}' lacks {:?}",
                self.role.as_str(),
                capability
            )))
        }
    }

    /// Requesters only see and edit their own consignments.
    pub fn is_scoped_to_own(&self) -> bool {
        self.role == Role::Requester
    }

    /// Edit check against a consignment's creator.
    pub fn require_edit_of(&self, created_by: Uuid) -> Result<(), ServiceError> {
        self.require(Capability::EditConsignments)?;
        if self.is_scoped_to_own() && created_by != self.user_id {
            return Err(ServiceError::Forbidden(
                "Requesters may only edit consignments they created".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ServiceError::Forbidden("Missing x-user-id header".to_string()))
            .and_then(|raw| {
                Uuid::parse_str(raw.trim())
                    .map_err(|_| ServiceError::Forbidden("Malformed x-user-id header".to_string()))
            })?;

        let role = parts
            .headers
            .get(USER_ROLE_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ServiceError::Forbidden("Missing x-user-role header".to_string()))?
            .parse::<Role>()?;

        Ok(Actor { user_id, role })
    }
}
