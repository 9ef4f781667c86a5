//! Audit trail document model.
//!
//! # Responsibility
//! - Describe one mutating catalog request as an append-only document.
//! - Derive method and status from the mutation kind.
//!
//! # Invariants
//! - Records are never updated or deleted once appended.
//! - Records do not reference the item they describe.
//! - `time_stamp` always uses the `DD-MM-YYYY hh:mm:ss` layout.

use chrono::{DateTime, TimeZone};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier assigned by the document store on append.
pub type AuditLogId = Uuid;

/// `chrono` layout for `AuditLogRecord::time_stamp`.
pub const AUDIT_TIMESTAMP_FORMAT: &str = "%d-%m-%Y %H:%M:%S";

/// Kind of mutating catalog operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationKind {
    Create,
    Update,
    Delete,
}

impl MutationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }

    /// HTTP method the transport layer exposes this mutation under.
    pub fn method(self) -> &'static str {
        match self {
            Self::Create => "POST",
            Self::Update => "PUT",
            Self::Delete => "DELETE",
        }
    }

    /// Status code reported for a successful mutation.
    pub fn success_status(self) -> u16 {
        match self {
            Self::Create => 201,
            Self::Update => 200,
            Self::Delete => 204,
        }
    }
}

/// Caller metadata supplied by the transport collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub client_ip: String,
    /// Request path as received, including any query string.
    pub path: String,
}

impl RequestContext {
    pub fn new(client_ip: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            client_ip: client_ip.into(),
            path: path.into(),
        }
    }
}

/// One audit trail entry, serialized with the document collection's field names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditLogRecord {
    #[serde(rename = "clientIP")]
    pub client_ip: String,
    pub method: String,
    pub path: String,
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    #[serde(rename = "timeStamp")]
    pub time_stamp: String,
}

impl AuditLogRecord {
    /// Builds the record for a successful mutation observed at `at`.
    pub fn for_mutation<Tz>(ctx: &RequestContext, kind: MutationKind, at: &DateTime<Tz>) -> Self
    where
        Tz: TimeZone,
        Tz::Offset: std::fmt::Display,
    {
        Self {
            client_ip: ctx.client_ip.clone(),
            method: kind.method().to_string(),
            path: ctx.path.clone(),
            status_code: kind.success_status(),
            time_stamp: at.format(AUDIT_TIMESTAMP_FORMAT).to_string(),
        }
    }
}
