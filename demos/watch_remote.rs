//! Example mirroring a Nacos config document and printing it as it changes.
//!
//! This example shows how to:
//! - Build a client from `NS_CONFIG_*` environment variables
//! - Read typed values from the materialized document
//! - Subscribe to reloads triggered by the remote service or local edits
//!
//! Run with:
//!
//! ```text
//! NS_CONFIG_SERVER_HOST=127.0.0.1 NS_CONFIG_NAMESPACE_ID=public \
//! NS_CONFIG_DATA_ID=demo NS_CONFIG_GROUP=DEFAULT_GROUP NS_CONFIG_FORMAT=yaml \
//! RUST_LOG=nacos_config=debug cargo run --example watch_remote
//! ```
//!
//! While running, publish a new version of the document from the Nacos console.

use nacos_config::prelude::*;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let client = NacosConfigClient::builder()
        .local_fallback(true)
        .build()
        .await?;

    println!("Mirroring {} to {}", client.key(), client.local_path().display());
    print_settings(client.config());

    let store = client.config().clone();
    let _subscription = client
        .subscribe(move |change: &ConfigChange| {
            println!("\nReloaded ({:?}):", change.origin);
            print_settings(&store);
        })
        .await;

    println!("\nWatching for changes, press Ctrl+C to stop");
    tokio::signal::ctrl_c().await?;

    client.shutdown().await;
    Ok(())
}

fn print_settings(store: &ConfigStore) {
    let mut keys: Vec<_> = store.all_settings().into_keys().collect();
    keys.sort();
    for key in keys {
        match store.get_string(&key) {
            Some(value) => println!("  {} = {}", key, value),
            None => println!("  {} = <table>", key),
        }
    }
}
