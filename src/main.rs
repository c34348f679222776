//! Mongo Pool - command line entry point.
//!
//! Connects with settings from the environment and prints the document count
//! and first page of a collection as JSON.
//!
//! ```text
//! mongo-pool <collection> [page]
//! ```

use anyhow::Context;
use mongodb::bson::{doc, Bson};
use tracing::info;
use tracing_subscriber::EnvFilter;

use mongo_pool::{Config, Mongo, MongoDriver, MongoPool, PoolRegistry};

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file first (before anything else)
    dotenvy::dotenv().ok();

    // If RUST_LOG is not set, default to "info" level for our crate
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("mongo_pool=info,mongodb=warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .init();

    let mut args = std::env::args().skip(1);
    let collection = args
        .next()
        .context("usage: mongo-pool <collection> [page]")?;
    let page: i64 = match args.next() {
        Some(page) => page.parse().context("page must be an integer")?,
        None => 0,
    };

    let config = Config::from_env();
    info!(
        "Configuration loaded: {}:{}/{}",
        config.connection.host, config.connection.port, config.connection.database
    );

    let registry = PoolRegistry::new();
    registry.register(MongoPool::new(
        config.pool_name.clone(),
        MongoDriver,
        config.connection.clone(),
        config.pool.clone(),
    ))?;

    let mongo: Mongo = Mongo::from_registry(&registry, &config.pool_name)?;

    let total = mongo.count(&collection, &doc! {}).await?;
    info!("Collection '{}' holds {} documents", collection, total);

    let result = mongo
        .query_paginated(&collection, 10, page, &doc! {}, &doc! {})
        .await?;

    let rows: Vec<serde_json::Value> = result
        .list
        .iter()
        .map(|row| Bson::Document(row.clone()).into_relaxed_extjson())
        .collect();
    let output = serde_json::json!({
        "totalCount": result.total_count,
        "currentPage": result.current_page,
        "perPage": result.per_page,
        "list": rows,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);

    info!("Pool stats: {:?}", mongo.pool().stats());
    Ok(())
}
