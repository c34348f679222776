//! Read queries: single-shot and paginated.

use mongodb::bson::Document;
use serde::Serialize;

use super::connection::Connection;
use super::driver::{Driver, QueryOptions, Session};
use super::identifier::{normalize_filter, stringify_id};
use crate::error::Result;

/// Page size used when the caller gives none.
pub const DEFAULT_PAGE_SIZE: i64 = 10;

/// One page of rows plus the total match count.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationResult {
    pub total_count: u64,
    pub current_page: i64,
    pub per_page: i64,
    pub list: Vec<Document>,
}

impl<D: Driver> Connection<D> {
    /// Every row matching `filter`, with `_id` as a string.
    pub async fn query_all(
        &mut self,
        collection: &str,
        filter: &Document,
        options: &Document,
    ) -> Result<Vec<Document>> {
        let filter = normalize_filter(filter)?;
        let options = QueryOptions::from_document(options)?;
        let result = self.fetch(collection, filter, &options).await;
        self.observe(result)
    }

    /// One page of rows plus a separate count over the same filter.
    ///
    /// `options.limit` and `options.skip` win when positive; otherwise the
    /// page size is `limit` (or 10) and the offset is `current_page * limit`.
    pub async fn query_paginated(
        &mut self,
        collection: &str,
        limit: i64,
        current_page: i64,
        filter: &Document,
        options: &Document,
    ) -> Result<PaginationResult> {
        let filter = normalize_filter(filter)?;
        let mut options = QueryOptions::from_document(options)?;

        let per_page = if limit > 0 { limit } else { DEFAULT_PAGE_SIZE };
        if options.positive_limit().is_none() {
            options.limit = Some(per_page);
        }
        if options.positive_skip().is_none() {
            options.skip = Some(current_page.max(0).saturating_mul(per_page));
        }

        let result = self.page(collection, filter, &options).await;
        self.observe(result).map(|(list, total_count)| PaginationResult {
            total_count,
            current_page,
            per_page,
            list,
        })
    }

    async fn page(
        &self,
        collection: &str,
        filter: Document,
        options: &QueryOptions,
    ) -> Result<(Vec<Document>, u64)> {
        let list = self.fetch(collection, filter.clone(), options).await?;
        let total_count = self.count_normalized(collection, filter).await?;
        Ok((list, total_count))
    }

    async fn fetch(
        &self,
        collection: &str,
        filter: Document,
        options: &QueryOptions,
    ) -> Result<Vec<Document>> {
        let namespace = self.namespace(collection);
        let rows = self.session()?.find(&namespace, filter, options).await?;
        Ok(rows.into_iter().map(stringify_id).collect())
    }
}
