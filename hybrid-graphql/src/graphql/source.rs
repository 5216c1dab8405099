//! Interfaces provided by the backend sources consumed by a merged GraphQL connection.
//!
//! The entrypoint to this module is [`SourceFetcher`], which describes the interface by which the
//! pagination machinery pulls pages of records out of one backend service. This is, in
//! particular, the glue between the GraphQL and REST views of the data: a gateway wraps each of
//! its upstream list endpoints in a fetcher, and the [merge stage](crate::hybrid::merge)
//! interacts with the backends exclusively through this trait. That also makes the machinery
//! testable in isolation, by substituting the [mock] sources for real services.
//!
//! Records served by a fetcher are opaque to the merge stage except for one property: their
//! creation time, exposed through the [`Timestamped`] trait, which determines their rank in the
//! merged ordering.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use derive_more::Display;

pub mod mock;

/// Direction in which a source's records are scanned.
#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
pub enum SortDirection {
    /// Oldest records first.
    #[display(fmt = "ASC")]
    Ascending,
    /// Newest records first.
    #[display(fmt = "DESC")]
    Descending,
}

/// A single page of records pulled from one source.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SourcePage<N> {
    /// The records in this page, at most `limit` of them.
    pub nodes: Vec<N>,
    /// The source's total number of records, independent of the requested page.
    pub total_count: u64,
}

/// Errors reported by a source fetcher.
pub type FetchError = Box<dyn std::error::Error + Send + Sync>;

/// One backend service contributing records to a merged connection.
///
/// Implementations own their transport concerns end to end: retries, backoff, and timeout
/// budgets all live behind this trait. The merge stage treats a fetcher as a black box and
/// propagates its errors without local recovery.
///
/// The contract the merge stage relies on:
/// * `fetch` returns at most `limit` records, skipping the first `offset` in `sort` order;
/// * [`SourcePage::total_count`] is the source's grand total, regardless of `limit` and `offset`.
#[async_trait]
pub trait SourceFetcher<N>: Send + Sync {
    /// Load up to `limit` records starting at `offset`, scanning in `sort` order.
    async fn fetch(
        &self,
        limit: u64,
        offset: u64,
        sort: SortDirection,
    ) -> Result<SourcePage<N>, FetchError>;
}

/// A record that can be ranked by creation time.
///
/// Returning [`None`] means the record carries no usable timestamp. The merge stage treats that
/// as a data-integrity fault in the source and fails the page rather than guess an ordering.
pub trait Timestamped {
    /// When the record was created.
    fn created_at(&self) -> Option<DateTime<Utc>>;
}

/// Raw JSON records rank by their `createdAt` (or `created_at`) field, which may be either an
/// RFC 3339 string or a Unix timestamp in milliseconds.
impl Timestamped for serde_json::Value {
    fn created_at(&self) -> Option<DateTime<Utc>> {
        let field = self.get("createdAt").or_else(|| self.get("created_at"))?;
        match field {
            serde_json::Value::String(s) => DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|t| t.with_timezone(&Utc)),
            serde_json::Value::Number(n) => Utc.timestamp_millis_opt(n.as_i64()?).single(),
            _ => None,
        }
    }
}

impl<T: Timestamped> Timestamped for async_graphql::Json<T> {
    fn created_at(&self) -> Option<DateTime<Utc>> {
        self.0.created_at()
    }
}
