//! Common items that you will always want in scope when serving merged connections.

pub use crate::graphql::{
    async_graphql::{self, value},
    source::{SortDirection, SourceFetcher, SourcePage, Timestamped},
};
pub use crate::hybrid::{
    paginate, Error, HybridConnection, OffsetState, PageRequest, SourceRegistry,
};
