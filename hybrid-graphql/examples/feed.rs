//! An activity feed merged from two mock backend services.
//!
//! Run with `cargo run --example feed --features examples`. The first page is fetched without a
//! cursor, then the page is resumed from its end cursor, the way a client would.

use clap::Parser;
use hybrid_graphql::{
    graphql::{
        source::mock, Context, EmptyMutation, EmptySubscription, Json, Object, Result, Schema,
    },
    hybrid::{paginate, HybridConnection, PageRequest, SourceRegistry},
    init_logging,
};
use serde_json::{json, Value};

////////////////////////////////////////////////////////////////////////////////////////////////////
// Schema
//

pub struct Query;

#[Object]
impl Query {
    /// Activity drawn from every backend service, newest first.
    async fn activity(
        &self,
        ctx: &Context<'_>,
        first: Option<i64>,
        after: Option<String>,
        last: Option<i64>,
        before: Option<String>,
    ) -> Result<HybridConnection<Json<Value>>> {
        let sources = ctx.data::<SourceRegistry<Json<Value>>>()?;
        let request = PageRequest {
            first,
            after,
            last,
            before,
        };
        Ok(paginate(sources, request).await?)
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////
// Test data
//

#[derive(Clone, Debug, Parser)]
pub struct Options {
    /// Records per page.
    #[clap(long, env = "FEED_PAGE_SIZE", default_value = "3")]
    page_size: u16,
}

fn message(id: &str, body: &str, created_at: &str) -> Json<Value> {
    Json(json!({ "id": id, "body": body, "createdAt": created_at }))
}

fn order(id: &str, total: u32, created_at: &str) -> Json<Value> {
    Json(json!({ "id": id, "total": total, "createdAt": created_at }))
}

fn sources() -> SourceRegistry<Json<Value>> {
    SourceRegistry::builder()
        .source(
            "messages",
            mock::Source::new([
                message("msg-4", "shipped!", "2024-05-04T16:20:00Z"),
                message("msg-3", "on its way", "2024-05-03T09:10:00Z"),
                message("msg-2", "thanks for the order", "2024-05-01T12:05:00Z"),
                message("msg-1", "welcome", "2024-04-28T08:00:00Z"),
            ]),
        )
        .source(
            "orders",
            mock::Source::new([
                order("ord-2", 6200, "2024-05-02T14:30:00Z"),
                order("ord-1", 1850, "2024-04-30T11:45:00Z"),
            ]),
        )
        .build()
        .expect("valid source registry")
}

////////////////////////////////////////////////////////////////////////////////////////////////////
// Demo
//

const PAGE_QUERY: &str = r#"
    query Page($first: Int, $after: String) {
        activity(first: $first, after: $after) {
            totalCount
            edges { cursor source node }
            pageInfo { startCursor endCursor hasNextPage hasPreviousPage }
        }
    }
"#;

#[async_std::main]
async fn main() -> color_eyre::Result<()> {
    init_logging();
    let opt = Options::parse();

    let schema = Schema::build(Query, EmptyMutation, EmptySubscription)
        .data(sources())
        .finish();

    let mut after: Option<String> = None;
    for page in 1.. {
        let request = hybrid_graphql::graphql::async_graphql::Request::new(PAGE_QUERY).variables(
            hybrid_graphql::graphql::async_graphql::Variables::from_json(json!({
                "first": opt.page_size,
                "after": after,
            })),
        );
        let response = schema.execute(request).await;
        println!("page {page}:");
        println!("{}", serde_json::to_string_pretty(&response)?);

        let data = response.data.into_json()?;
        let page_info = &data["activity"]["pageInfo"];
        if page_info["hasNextPage"] != true {
            break;
        }
        after = page_info["endCursor"].as_str().map(str::to_owned);
    }

    Ok(())
}
