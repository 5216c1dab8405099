//! Hybrid GraphQL connections merge several independently paginated backend services into a
//! single ordered, cursor-paginated [Relay connection](https://relay.dev/graphql/connections.htm).
//! The crate consists of two sections:
//!
//! * A [graphql] interface layer, which defines the contract between the pagination machinery and
//!   the backend services feeding it. Each backend is represented by a
//!   [source fetcher](graphql::source::SourceFetcher), an async function serving pages of records
//!   together with the source's total count. The fetchers are black boxes: transport, retries,
//!   and backoff are entirely their concern.
//! * A [hybrid] engine, which is responsible for combining the per-source pages into one
//!   connection. It maintains a [composite cursor](hybrid::OffsetState) tracking read progress
//!   through every source, fans out to all sources concurrently, merges the results newest first,
//!   and assembles the final connection object with per-node resume cursors.
//!
//! The engine is agnostic to what the records look like. Anything implementing
//! [`Timestamped`](graphql::source::Timestamped) can be merged, from raw JSON payloads straight
//! off a REST service to fully typed domain objects. The library is completely modular: the mock
//! sources in [graphql::source] make it possible to exercise the whole pipeline without any real
//! backend, which is how the crate tests itself.

use std::sync::Once;
use tracing_subscriber::EnvFilter;

pub mod graphql;
pub mod hybrid;
pub mod prelude;

/// Initialize tracing.
pub fn init_logging() {
    static ONCE: Once = Once::new();

    ONCE.call_once(|| {
        color_eyre::install().unwrap();
        tracing_subscriber::fmt()
            .with_ansi(true)
            .with_env_filter(EnvFilter::from_default_env())
            .init();
    });
}
