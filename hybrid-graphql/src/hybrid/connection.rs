//! Assembly of a ranked page into a Relay connection object.
//!
//! The connection carries `totalCount` beyond the Relay defaults, and every edge carries the
//! name of the source its node came from. Page-info flags are derived from the positions stamped
//! by the [merge stage](super::merge): a page has a previous page exactly when its first record
//! sits past position zero, and a next page exactly when consuming its last record still leaves
//! records unaccounted for against the summed total.

use super::{
    cursor::OffsetState,
    merge::RankedPage,
    BackwardPaginationSnafu, Error, MissingFirstSnafu, NegativeFirstSnafu,
};
use crate::graphql::{
    connection::{Connection, Edge},
    OutputType, SimpleObject,
};
use snafu::{ensure, OptionExt};

/// Relay connection arguments, as supplied by the client.
///
/// Only forward pagination is supported: `first` is required, and `last`/`before` are rejected
/// whenever they hold a value. The restriction is deliberate; backward pagination would need
/// every source scanned in the opposite direction, which the merge stage does not do.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct PageRequest {
    /// Limit the results to the first N records of the merged sequence.
    pub first: Option<i64>,
    /// Start the page after the position indicated by this cursor.
    pub after: Option<String>,
    /// Unsupported; any value is rejected.
    pub last: Option<i64>,
    /// Unsupported; any value is rejected.
    pub before: Option<String>,
}

impl PageRequest {
    /// A request for the first `first` records after `after`.
    pub fn forward(first: i64, after: Option<String>) -> Self {
        Self {
            first: Some(first),
            after,
            last: None,
            before: None,
        }
    }

    /// Check the arguments and decode the client cursor.
    ///
    /// Rejections happen here, before any source is fetched.
    pub fn validate(&self) -> Result<(u64, Option<OffsetState>), Error> {
        ensure!(
            self.last.is_none() && self.before.is_none(),
            BackwardPaginationSnafu
        );
        let first = self.first.context(MissingFirstSnafu)?;
        let first = u64::try_from(first)
            .ok()
            .context(NegativeFirstSnafu { first })?;
        let after = self.after.as_deref().map(OffsetState::decode).transpose()?;
        Ok((first, after))
    }
}

/// Connection-level fields beyond the Relay defaults.
#[derive(Clone, Copy, Debug, SimpleObject)]
pub struct ConnectionFields {
    /// Sum of every contributing source's own total count.
    pub total_count: u64,
}

/// Edge-level fields beyond the Relay defaults.
#[derive(Clone, Debug, SimpleObject)]
pub struct EdgeFields {
    /// Name of the source that produced this edge's node.
    pub source: String,
}

/// A Relay connection over records merged from several sources.
pub type HybridConnection<N> = Connection<OffsetState, N, ConnectionFields, EdgeFields>;

/// Turn a ranked page into a Relay connection object.
///
/// Each edge's cursor is the offset snapshot stamped on its node, so resuming from any edge
/// resumes every source exactly where that node left it. An empty page has no cursors and
/// reports no pages on either side.
pub fn build<N: OutputType>(page: RankedPage<N>) -> HybridConnection<N> {
    let has_previous = page
        .nodes
        .first()
        .map(|node| node.offsets.position().unwrap_or(0) > 0)
        .unwrap_or(false);
    let has_next = page
        .nodes
        .last()
        .map(|node| node.offsets.position().map_or(0, |p| p + 1) < page.total_count)
        .unwrap_or(false);

    let mut conn = Connection::with_additional_fields(
        has_previous,
        has_next,
        ConnectionFields {
            total_count: page.total_count,
        },
    );
    conn.edges.extend(page.nodes.into_iter().map(|node| {
        Edge::with_additional_fields(node.offsets, node.node, EdgeFields { source: node.source })
    }));
    conn
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::graphql::Json;
    use crate::hybrid::merge::RankedNode;
    use serde_json::{json, Value};

    #[test]
    fn test_validate_rejects_backward_pagination() {
        let request = PageRequest {
            last: Some(1),
            ..PageRequest::forward(1, None)
        };
        assert!(matches!(
            request.validate(),
            Err(Error::BackwardPagination)
        ));

        let request = PageRequest {
            before: Some("cursor".into()),
            ..PageRequest::forward(1, None)
        };
        assert!(matches!(
            request.validate(),
            Err(Error::BackwardPagination)
        ));
    }

    #[test]
    fn test_validate_requires_first() {
        assert!(matches!(
            PageRequest::default().validate(),
            Err(Error::MissingFirst)
        ));
        assert!(matches!(
            PageRequest::forward(-1, None).validate(),
            Err(Error::NegativeFirst { first: -1 })
        ));
    }

    #[test]
    fn test_validate_decodes_after() {
        let state = OffsetState::empty(["msg"]).unwrap().increment("msg").unwrap();
        let request = PageRequest::forward(2, Some(state.encode()));
        assert_eq!(request.validate().unwrap(), (2, Some(state)));

        let request = PageRequest::forward(2, Some("not a cursor".into()));
        assert!(matches!(
            request.validate(),
            Err(Error::MalformedCursor { .. })
        ));
    }

    fn ranked(total_count: u64, sources: &[&str]) -> RankedPage<Json<Value>> {
        let mut state = OffsetState::empty(["msg", "ord"]).unwrap();
        let mut nodes = Vec::new();
        for (i, source) in sources.iter().enumerate() {
            state = state.increment(source).unwrap();
            nodes.push(RankedNode {
                node: Json(json!({ "id": i })),
                source: (*source).to_owned(),
                offsets: state.clone(),
            });
        }
        RankedPage { nodes, total_count }
    }

    #[test]
    fn test_page_info_first_page_with_more() {
        let conn = build(ranked(3, &["msg", "ord"]));
        assert_eq!(conn.edges.len(), 2);
        assert!(!conn.has_previous_page);
        // Two consumed, three known: there is more.
        assert!(conn.has_next_page);
        assert_eq!(conn.additional_fields.total_count, 3);
    }

    #[test]
    fn test_page_info_exhausted_page() {
        let conn = build(ranked(2, &["msg", "ord"]));
        assert!(!conn.has_previous_page);
        assert!(!conn.has_next_page);
    }

    #[test]
    fn test_page_info_empty_page() {
        let conn = build(ranked(0, &[]));
        assert!(conn.edges.is_empty());
        assert!(!conn.has_previous_page);
        assert!(!conn.has_next_page);
        assert_eq!(conn.additional_fields.total_count, 0);
    }

    #[test]
    fn test_resumed_page_has_previous() {
        // Simulate a page whose first record sits past the start of the merged sequence.
        let mut page = ranked(5, &["msg", "ord", "msg"]);
        page.nodes.remove(0);
        let conn = build(page);
        assert!(conn.has_previous_page);
        assert!(conn.has_next_page);
    }
}
