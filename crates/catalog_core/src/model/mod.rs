//! Catalog domain model.
//!
//! # Responsibility
//! - Define the item record persisted by the relational store.
//! - Define the audit trail document appended by the document store.
//! - Define paging request/response shapes shared by store and service.
//!
//! # Invariants
//! - Every item is identified by a store-assigned, never reused `ItemId`.
//! - Deletion is represented by a `deleted_at` tombstone, not hard delete.

pub mod audit;
pub mod item;
pub mod page;
