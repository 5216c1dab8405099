//! Merging of independently paginated backend sources into one ordered connection.
//!
//! Clients see a single Relay-style connection, newest records first. Under the hood every page
//! is assembled from several sources, each with its own offset-based pagination and its own total
//! count. The glue holding this together is the [composite cursor](OffsetState): instead of a
//! single integer, a cursor records how far into *every* source the client has read, plus the
//! overall position in the merged ordering. Resuming from a cursor therefore resumes every
//! source exactly where it left off, no matter how the previous pages interleaved.
//!
//! Resolution of one page proceeds through the submodules in order:
//!
//! 1. [connection] validates the client's arguments and decodes the incoming cursor;
//! 2. [merge] fans out to every source concurrently, merges the results by creation time, and
//!    stamps each consumed record with the cursor state that resumes after it;
//! 3. [connection] assembles the final Relay connection object.
//!
//! [`paginate`] runs the full sequence.

use crate::graphql::{source::Timestamped, OutputType};
use snafu::Snafu;
use std::fmt::Display;

pub mod connection;
pub mod cursor;
pub mod merge;

pub use connection::{ConnectionFields, EdgeFields, HybridConnection, PageRequest};
pub use cursor::OffsetState;
pub use merge::{RankedNode, RankedPage, SourceRegistry, SourceRegistryBuilder};

/// Errors encountered while resolving a merged connection.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("backward pagination (`last`/`before`) is not supported"))]
    BackwardPagination,

    #[snafu(display("`first` is required"))]
    MissingFirst,

    #[snafu(display("`first` must be non-negative, got {first}"))]
    NegativeFirst { first: i64 },

    #[snafu(display("a connection requires at least one source"))]
    EmptySourceSet,

    #[snafu(display("duplicate source {name:?}"))]
    DuplicateSource { name: String },

    #[snafu(display("source name {name:?} is reserved"))]
    ReservedSource { name: String },

    #[snafu(display("source name {name:?} is not a valid cursor key"))]
    InvalidSourceName { name: String },

    #[snafu(display("malformed cursor: {reason}"))]
    MalformedCursor { reason: String },

    #[snafu(display("cursor tracks unknown source {name:?}"))]
    UnknownSource { name: String },

    #[snafu(display("cursor is missing source {name:?}"))]
    MissingSource { name: String },

    #[snafu(display("record from source {source_name:?} has no parseable creation timestamp"))]
    MissingTimestamp { source_name: String },

    #[snafu(display("source {source_name:?} failed: {error}"))]
    Upstream { source_name: String, error: String },
}

impl Error {
    /// A failure reported by one of the backend sources.
    pub fn upstream(source_name: impl Into<String>, error: impl Display) -> Self {
        Self::Upstream {
            source_name: source_name.into(),
            error: error.to_string(),
        }
    }
}

/// Resolve one page of a merged connection end to end.
///
/// Validates `request`, decodes the client's cursor, fans out to every source in `sources`,
/// merges and ranks the results, and assembles the Relay connection object. Any argument,
/// cursor, data-integrity, or upstream error fails the whole page; sibling fields in the
/// surrounding GraphQL query are unaffected by the standard partial-response semantics.
pub async fn paginate<N>(
    sources: &SourceRegistry<N>,
    request: PageRequest,
) -> Result<HybridConnection<N>, Error>
where
    N: Timestamped + OutputType,
{
    let (first, after) = request.validate()?;
    let page = merge::execute(sources, first, after.as_ref()).await?;
    Ok(connection::build(page))
}
