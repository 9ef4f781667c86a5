//! Catalog use-case services.
//!
//! # Responsibility
//! - Orchestrate item store and audit log store calls into use-case APIs.
//! - Keep transport/bootstrap layers decoupled from storage details.

pub mod catalog_service;
