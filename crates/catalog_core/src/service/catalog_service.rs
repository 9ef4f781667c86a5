//! Catalog use-case service.
//!
//! # Responsibility
//! - Provide list/get/create/update/delete entry points for transport callers.
//! - Append one audit record after every committed mutation.
//!
//! # Invariants
//! - Reads never touch the audit log store.
//! - A mutation that fails before committing never writes an audit record.
//! - An audit failure after a committed mutation is reported as
//!   `AuditStoreFailure`; the mutation is not rolled back.
//! - The service holds no state besides its injected stores.

use crate::error::{CatalogError, CatalogResult};
use crate::model::audit::{AuditLogRecord, MutationKind, RequestContext};
use crate::model::item::{Item, ItemId, ItemPayload};
use crate::model::page::{ItemPage, PageRequest};
use crate::repo::audit_store::AuditLogStore;
use crate::repo::item_store::{ItemStore, StoreError};
use chrono::Local;
use log::{error, info, warn};
use std::time::Instant;

/// Use-case service over an item store and an audit log store.
pub struct CatalogService<S: ItemStore, A: AuditLogStore> {
    items: S,
    audit: A,
}

impl<S: ItemStore, A: AuditLogStore> CatalogService<S, A> {
    /// Creates a service over injected stores; store lifetimes stay with the
    /// caller.
    pub fn new(items: S, audit: A) -> Self {
        Self { items, audit }
    }

    /// Lists active items whose name starts with `search`.
    ///
    /// An empty `search` matches every active item. `total` counts every
    /// match, independent of the page window.
    pub fn list(&self, search: &str, page: PageRequest) -> CatalogResult<ItemPage> {
        const OP: &str = "catalog.list";
        let page = PageRequest::new(page.limit, page.offset);

        let (items, total) = self
            .items
            .find_all(search, page)
            .map_err(|err| store_failure(OP, err))?;

        info!(
            "event=item_list module=service status=ok returned={} total={} limit={} offset={}",
            items.len(),
            total,
            page.limit,
            page.offset
        );
        Ok(ItemPage {
            items,
            total,
            limit: page.limit,
            offset: page.offset,
        })
    }

    /// Lists items using raw external `limit`/`offset` values.
    ///
    /// Non-numeric or out-of-range values fail with `InvalidParameter` before
    /// the item store is called.
    pub fn list_with_raw_paging(
        &self,
        search: &str,
        limit: Option<&str>,
        offset: Option<&str>,
    ) -> CatalogResult<ItemPage> {
        let page = PageRequest::parse(limit, offset).map_err(|err| {
            warn!("event=item_list module=service status=rejected error={err}");
            CatalogError::from(err)
        })?;
        self.list(search, page)
    }

    /// Gets one active item.
    pub fn get(&self, id: ItemId) -> CatalogResult<Item> {
        self.items
            .find(id)
            .map_err(|err| store_failure("catalog.get", err))
    }

    /// Creates an item and records the mutation.
    pub fn create(&self, ctx: &RequestContext, payload: &ItemPayload) -> CatalogResult<Item> {
        const OP: &str = "catalog.create";
        let started_at = Instant::now();
        payload
            .validate()
            .map_err(|source| CatalogError::Validation { op: OP, source })?;

        let item = self
            .items
            .create(payload)
            .map_err(|err| store_failure(OP, err))?;

        self.record_mutation(OP, ctx, MutationKind::Create, item.id, started_at)?;
        Ok(item)
    }

    /// Replaces the mutable fields of an active item and records the mutation.
    ///
    /// # Contract
    /// - Only name/category/description/image are taken from `payload`.
    /// - A missing or deleted target fails with `NotFound` and writes no
    ///   audit record.
    pub fn update(
        &self,
        ctx: &RequestContext,
        id: ItemId,
        payload: &ItemPayload,
    ) -> CatalogResult<Item> {
        const OP: &str = "catalog.update";
        let started_at = Instant::now();
        payload
            .validate()
            .map_err(|source| CatalogError::Validation { op: OP, source })?;

        let mut item = self
            .items
            .find(id)
            .map_err(|err| store_failure(OP, err))?;
        item.apply(payload);

        let item = self
            .items
            .update(&item)
            .map_err(|err| store_failure(OP, err))?;

        self.record_mutation(OP, ctx, MutationKind::Update, item.id, started_at)?;
        Ok(item)
    }

    /// Soft-deletes an active item and records the mutation.
    pub fn delete(&self, ctx: &RequestContext, id: ItemId) -> CatalogResult<()> {
        const OP: &str = "catalog.delete";
        let started_at = Instant::now();

        let item = self
            .items
            .find(id)
            .map_err(|err| store_failure(OP, err))?;
        self.items
            .delete(item.id)
            .map_err(|err| store_failure(OP, err))?;

        self.record_mutation(OP, ctx, MutationKind::Delete, item.id, started_at)
    }

    fn record_mutation(
        &self,
        op: &'static str,
        ctx: &RequestContext,
        mutation: MutationKind,
        item_id: ItemId,
        started_at: Instant,
    ) -> CatalogResult<()> {
        let record = AuditLogRecord::for_mutation(ctx, mutation, &Local::now());
        match self.audit.append(&record) {
            Ok(audit_id) => {
                info!(
                    "event=item_{} module=service status=ok item_id={} audit_id={} duration_ms={}",
                    mutation.as_str(),
                    item_id,
                    audit_id,
                    started_at.elapsed().as_millis()
                );
                Ok(())
            }
            Err(source) => {
                error!(
                    "event=item_{} module=service status=error item_id={} entity_retained=true error_code=audit_append_failed duration_ms={} error={}",
                    mutation.as_str(),
                    item_id,
                    started_at.elapsed().as_millis(),
                    source
                );
                Err(CatalogError::AuditStore {
                    op,
                    item_id,
                    mutation,
                    source,
                })
            }
        }
    }
}

fn store_failure(op: &'static str, err: StoreError) -> CatalogError {
    let err = CatalogError::from_store(op, err);
    match &err {
        CatalogError::NotFound { .. } | CatalogError::Validation { .. } => {
            warn!("event=catalog_call module=service status=rejected op={op} error={err}");
        }
        _ => {
            error!(
                "event=catalog_call module=service status=error op={op} error_code=item_store_failed error={err}"
            );
        }
    }
    err
}
