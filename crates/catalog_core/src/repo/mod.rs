//! Store contracts and persistence adapters.
//!
//! # Responsibility
//! - Define the item store and audit log store capabilities the service
//!   depends on.
//! - Isolate SQLite and JSON-lines details from service orchestration.
//!
//! # Invariants
//! - Item store writes must enforce `ItemPayload::validate()` before
//!   persistence.
//! - Every store call is bounded by an enforced deadline.
//! - Store APIs return semantic errors (`NotFound`) in addition to backend
//!   errors.

pub mod audit_store;
mod deadline;
pub mod item_store;
