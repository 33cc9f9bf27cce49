//! Common test utilities and fixtures.

pub mod fixtures;

#[allow(unused_imports)]
pub use fixtures::*;

use std::net::TcpListener;
use std::sync::Arc;

use amazon_lookup::config::{
    StaticConfig, ACCESS_KEY, ACCESS_SECRET, ASSOCIATES_ID, ENDPOINT, MAX_OPS_PER_WINDOW,
};
use amazon_lookup::database_ops::cache::{CacheStore, MemoryCacheStore};
use amazon_lookup::database_ops::db::{RecordStore, SqliteRecordStore};
use amazon_lookup::Amazon;
use httpmock::MockServer;

#[allow(dead_code)]
pub fn can_bind_localhost() -> bool {
    TcpListener::bind("127.0.0.1:0").is_ok()
}

/// Client wired to a mock catalog, an in-memory SQLite store and a memory cache.
#[allow(dead_code)]
pub struct Harness {
    pub amazon: Amazon,
    pub records: Arc<SqliteRecordStore>,
    pub cache: Arc<MemoryCacheStore>,
}

#[allow(dead_code)]
pub fn mock_config(server: &MockServer) -> StaticConfig {
    StaticConfig::new()
        .with(ACCESS_KEY, "AKIAEXAMPLE")
        .with(ACCESS_SECRET, "secret")
        .with(ASSOCIATES_ID, "tag-20")
        .with(ENDPOINT, server.url("/onca/xml"))
        .with(MAX_OPS_PER_WINDOW, "0")
}

/// Client over caller-supplied stores, for exercising store failures.
#[allow(dead_code)]
pub fn client_with(
    server: &MockServer,
    records: Arc<dyn RecordStore>,
    cache: Arc<dyn CacheStore>,
) -> Amazon {
    Amazon::from_config(&mock_config(server), records, cache).expect("amazon client")
}

#[allow(dead_code)]
pub async fn harness(server: &MockServer) -> Harness {
    let records = Arc::new(
        SqliteRecordStore::connect("sqlite::memory:")
            .await
            .expect("sqlite memory store"),
    );
    let cache = Arc::new(MemoryCacheStore::new());
    let amazon = client_with(
        server,
        records.clone() as Arc<dyn RecordStore>,
        cache.clone() as Arc<dyn CacheStore>,
    );
    Harness {
        amazon,
        records,
        cache,
    }
}
