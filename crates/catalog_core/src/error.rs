//! Caller-facing error taxonomy.
//!
//! # Invariants
//! - Every store failure keeps its kind and is wrapped with the service
//!   operation that produced it.
//! - `AuditStore` always means the item mutation was committed and kept.

use crate::model::audit::MutationKind;
use crate::model::item::{ItemId, ItemValidationError};
use crate::model::page::PageParamError;
use crate::repo::audit_store::AuditStoreError;
use crate::repo::item_store::StoreError;

pub type CatalogResult<T> = Result<T, CatalogError>;

/// Coarse error classification for transport-level mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    ValidationFailure,
    InvalidParameter,
    EntityStoreFailure,
    AuditStoreFailure,
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("{op}: item {id} not found")]
    NotFound { op: &'static str, id: ItemId },
    #[error("{op}: {source}")]
    Validation {
        op: &'static str,
        #[source]
        source: ItemValidationError,
    },
    #[error(transparent)]
    InvalidParameter(#[from] PageParamError),
    #[error("{op}: item store failure: {source}")]
    EntityStore {
        op: &'static str,
        #[source]
        source: StoreError,
    },
    #[error(
        "{op}: {} of item {item_id} committed but audit append failed: {source}",
        .mutation.as_str()
    )]
    AuditStore {
        op: &'static str,
        item_id: ItemId,
        mutation: MutationKind,
        #[source]
        source: AuditStoreError,
    },
}

impl CatalogError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Validation { .. } => ErrorKind::ValidationFailure,
            Self::InvalidParameter(_) => ErrorKind::InvalidParameter,
            Self::EntityStore { .. } => ErrorKind::EntityStoreFailure,
            Self::AuditStore { .. } => ErrorKind::AuditStoreFailure,
        }
    }

    /// Returns the id of an item whose mutation was kept despite this error.
    pub fn committed_item(&self) -> Option<ItemId> {
        match self {
            Self::AuditStore { item_id, .. } => Some(*item_id),
            _ => None,
        }
    }

    /// Wraps an item store error, lifting semantic variants to their own kind.
    pub(crate) fn from_store(op: &'static str, err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => Self::NotFound { op, id },
            StoreError::Validation(source) => Self::Validation { op, source },
            source => Self::EntityStore { op, source },
        }
    }
}
