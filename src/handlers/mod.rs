pub mod allocations;
pub mod consignments;
pub mod consoles;
pub mod documents;
pub mod extract;
pub mod health;

use std::sync::Arc;

use crate::config::GlCodes;
use crate::db::DbPool;
use crate::errors::ServiceError;
use crate::events::EventSender;
use crate::services::{
    allocation::AllocationService,
    consignments::ConsignmentService,
    consoles::ConsoleService,
    documents::DocumentService,
    storage::FileStorage,
    workflow::{StepRegistry, WorkflowService},
};

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub consignments: Arc<ConsignmentService>,
    pub allocations: Arc<AllocationService>,
    pub workflow: Arc<WorkflowService>,
    pub consoles: Arc<ConsoleService>,
    pub documents: Arc<DocumentService>,
}

impl AppServices {
    /// Wires every service over one pool and event channel.
    ///
    /// Fails when the wizard step registry is incomplete.
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
        storage: Arc<dyn FileStorage>,
        gl_codes: GlCodes,
    ) -> Result<Self, ServiceError> {
        let registry = Arc::new(StepRegistry::standard()?);

        Ok(Self {
            consignments: Arc::new(ConsignmentService::new(
                db_pool.clone(),
                event_sender.clone(),
                storage,
            )),
            allocations: Arc::new(AllocationService::new(
                db_pool.clone(),
                event_sender.clone(),
            )),
            workflow: Arc::new(WorkflowService::new(
                db_pool.clone(),
                event_sender.clone(),
                registry,
            )),
            consoles: Arc::new(ConsoleService::new(db_pool.clone(), event_sender.clone())),
            documents: Arc::new(DocumentService::new(db_pool, event_sender, gl_codes)),
        })
    }
}
