//! Core domain logic for the catalog service.
//! This crate owns the item/audit store contracts and the orchestration
//! policy between them.

pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::{CatalogConfig, ConfigError};
pub use error::{CatalogError, CatalogResult, ErrorKind};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::audit::{AuditLogId, AuditLogRecord, MutationKind, RequestContext};
pub use model::item::{Item, ItemId, ItemPayload, ItemValidationError};
pub use model::page::{ItemPage, PageParamError, PageRequest};
pub use repo::audit_store::{AuditLogStore, AuditStoreError, AuditStoreResult, JsonlAuditLogStore};
pub use repo::item_store::{ItemStore, SqliteItemStore, StoreError, StoreResult};
pub use service::catalog_service::CatalogService;

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
