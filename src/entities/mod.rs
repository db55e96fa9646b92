pub mod audit_log;
pub mod consignment;
pub mod consignment_document;
pub mod consignment_packaging;
pub mod consignment_po_line;
pub mod console;
pub mod console_audit_trail;
pub mod console_audit_trail_field;
pub mod freight_forwarder;
pub mod packaging_allocation;
pub mod packaging_type;
pub mod purchase_order;
pub mod purchase_order_line;

pub use consignment::ConsignmentStatus;
pub use console::ConsoleStatus;
