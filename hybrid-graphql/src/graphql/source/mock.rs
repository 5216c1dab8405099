//! Mock instantiation of the [`SourceFetcher`](super::SourceFetcher) interface.
//!
//! These sources are built on fixed in-memory record lists. They are useful for testing the
//! pagination machinery in isolation from actual backend services, and they record every fetch
//! call so tests can assert on the offsets the merge stage requests.
#![cfg(any(test, feature = "mocks"))]

use super::{FetchError, SortDirection, SourceFetcher, SourcePage};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

/// A recorded fetch call.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct FetchCall {
    pub limit: u64,
    pub offset: u64,
    pub sort: SortDirection,
}

/// An in-memory source serving a fixed list of records.
///
/// Records are expected newest first, mirroring the descending scan order of the services this
/// stands in for. Clones share the call log, so a test can keep one handle while the source
/// registry owns another.
#[derive(Clone, Debug)]
pub struct Source<N> {
    records: Vec<N>,
    calls: Arc<Mutex<Vec<FetchCall>>>,
}

impl<N> Source<N> {
    /// A source serving `records`, already in descending creation order.
    pub fn new(records: impl IntoIterator<Item = N>) -> Self {
        Self {
            records: records.into_iter().collect(),
            calls: Default::default(),
        }
    }

    /// The calls made against this source, oldest first.
    pub fn calls(&self) -> Vec<FetchCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl<N: Clone + Send + Sync> SourceFetcher<N> for Source<N> {
    async fn fetch(
        &self,
        limit: u64,
        offset: u64,
        sort: SortDirection,
    ) -> Result<SourcePage<N>, FetchError> {
        self.calls.lock().unwrap().push(FetchCall {
            limit,
            offset,
            sort,
        });

        let start = (offset as usize).min(self.records.len());
        let end = (start + limit as usize).min(self.records.len());
        Ok(SourcePage {
            nodes: self.records[start..end].to_vec(),
            total_count: self.records.len() as u64,
        })
    }
}

/// A source whose every fetch fails, for exercising fail-fast fan-in.
#[derive(Clone, Debug)]
pub struct FailingSource {
    message: String,
}

impl FailingSource {
    /// A source which fails every fetch with `message`.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[async_trait]
impl<N: Send> SourceFetcher<N> for FailingSource {
    async fn fetch(
        &self,
        _limit: u64,
        _offset: u64,
        _sort: SortDirection,
    ) -> Result<SourcePage<N>, FetchError> {
        Err(self.message.clone().into())
    }
}
