//! Fan-out to every source and merge of the results into one ranked, offset-stamped sequence.
//!
//! Every page request queries all sources concurrently with the same limit and joins on the
//! complete set of results before merging; a single slow source delays the page and a single
//! failing source fails it. There is no partial-result degradation, retry, or timeout budget at
//! this layer. Those concerns belong to the [fetchers](crate::graphql::source::SourceFetcher).
//!
//! Because each source is fetched independently at the full page limit, a source whose true
//! contribution to the page is smaller than the limit is over-fetched, and the surplus records
//! are discarded unstamped. The converse also holds: no source is re-queried to fill a page that
//! came up short, so a page may hold fewer records than requested even when more combined data
//! exists beyond what was fetched.

use super::{cursor::OffsetState, Error, MissingTimestampSnafu};
use crate::graphql::source::{SortDirection, SourceFetcher, Timestamped};
use futures::future::try_join_all;
use snafu::OptionExt;
use std::collections::BTreeMap;
use std::fmt::{self, Debug, Formatter};
use tracing::debug;

/// The fixed set of sources contributing to a merged connection, keyed by name.
///
/// The key set is agreed at integration time; cursors minted against one registry are only
/// meaningful against a registry with the same keys.
pub struct SourceRegistry<N> {
    fetchers: BTreeMap<String, Box<dyn SourceFetcher<N>>>,
}

impl<N> SourceRegistry<N> {
    /// Start building a registry.
    pub fn builder() -> SourceRegistryBuilder<N> {
        SourceRegistryBuilder {
            fetchers: BTreeMap::new(),
        }
    }

    /// The names of the contributing sources.
    pub fn sources(&self) -> impl '_ + Iterator<Item = &str> {
        self.fetchers.keys().map(String::as_str)
    }
}

impl<N> Debug for SourceRegistry<N> {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.debug_list().entries(self.fetchers.keys()).finish()
    }
}

/// Incremental constructor for a [`SourceRegistry`].
pub struct SourceRegistryBuilder<N> {
    fetchers: BTreeMap<String, Box<dyn SourceFetcher<N>>>,
}

impl<N> SourceRegistryBuilder<N> {
    /// Add a fetcher under `name`, replacing any fetcher previously registered with that name.
    pub fn source(
        mut self,
        name: impl Into<String>,
        fetcher: impl SourceFetcher<N> + 'static,
    ) -> Self {
        self.fetchers.insert(name.into(), Box::new(fetcher));
        self
    }

    /// Finish the registry.
    pub fn build(self) -> Result<SourceRegistry<N>, Error> {
        // Building the empty state up front surfaces configuration errors (no sources, names the
        // cursor format cannot carry) here instead of on the first query.
        OffsetState::empty(self.fetchers.keys().cloned())?;
        Ok(SourceRegistry {
            fetchers: self.fetchers,
        })
    }
}

/// A record drawn from one source, stamped with the composite offsets in effect after it.
#[derive(Clone, Debug)]
pub struct RankedNode<N> {
    /// The record as the source returned it.
    pub node: N,
    /// The source that produced the record.
    pub source: String,
    /// Read progress through every source immediately after consuming this record.
    ///
    /// Encoded, this is the cursor a client resends to resume right after this record.
    pub offsets: OffsetState,
}

/// The merged, ranked result of one page request.
#[derive(Clone, Debug)]
pub struct RankedPage<N> {
    /// Records in merged order, newest first, at most the requested page size.
    pub nodes: Vec<RankedNode<N>>,
    /// Sum of every source's own total count, independent of merge order.
    pub total_count: u64,
}

/// Fetch one page from every source in `sources` and merge the results into a single ranked
/// sequence of at most `first` records.
///
/// `after` is the decoded client cursor; `None` starts from the beginning. The cursor must track
/// exactly the sources in the registry.
pub async fn execute<N: Timestamped>(
    sources: &SourceRegistry<N>,
    first: u64,
    after: Option<&OffsetState>,
) -> Result<RankedPage<N>, Error> {
    let state = match after {
        Some(state) => {
            state.require_sources(sources.sources())?;
            state.clone()
        }
        None => OffsetState::empty(sources.sources())?,
    };

    // Over-fetch: any single source could supply the entire next page, so each one is asked for
    // `first` records starting at its own resume offset. Only newest-first ordering is supported.
    let pages = try_join_all(sources.fetchers.iter().map(|(name, fetcher)| {
        let offset = state.next_offset(name);
        async move {
            debug!(source = %name, limit = first, offset, "fetching source page");
            let page = fetcher
                .fetch(first, offset, SortDirection::Descending)
                .await
                .map_err(|error| Error::upstream(name.as_str(), error))?;
            Ok::<_, Error>((name.as_str(), page))
        }
    }))
    .await?;

    // Totals are source-additive; they do not depend on how the merged page comes out.
    let total_count = pages.iter().map(|(_, page)| page.total_count).sum();

    // Tag every record with its origin and order the combined set newest first. The sort is
    // stable, so records from one source keep their fetch order on timestamp ties.
    let mut tagged = Vec::new();
    for (name, page) in pages {
        for node in page.nodes {
            let created_at = node
                .created_at()
                .context(MissingTimestampSnafu { source_name: name })?;
            tagged.push((created_at, name, node));
        }
    }
    tagged.sort_by(|(a, ..), (b, ..)| b.cmp(a));

    // Walk the merged order, threading the offset state through each consumed record. Records
    // past the page boundary are dropped unstamped; they must not influence the delivered end
    // cursor.
    let mut state = state;
    let mut nodes = Vec::new();
    for (_, source, node) in tagged {
        if nodes.len() as u64 >= first {
            break;
        }
        state = state.increment(source)?;
        nodes.push(RankedNode {
            node,
            source: source.to_owned(),
            offsets: state.clone(),
        });
    }

    Ok(RankedPage { nodes, total_count })
}
