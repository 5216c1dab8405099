//! A general interface for serving merged, paginated collections over GraphQL.

pub mod source;

// Re-export commonly used `async_graphql` types.
pub use async_graphql::{
    connection, value, Context, EmptyMutation, EmptySubscription, Json, Object, ObjectType,
    OutputType, Result, Schema, SimpleObject,
};

// Re-export `async_graphql` directly as an escape hatch.
pub extern crate async_graphql;
