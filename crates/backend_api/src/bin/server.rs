use backend_api::{run_server, RevenueService};
use snapshot_store::SnapshotStore;
use std::env;
use std::sync::Arc;
use woo_client::{WooClient, WooConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Environment variables with sane defaults
    let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port: u16 = env::var("PORT")
        .unwrap_or_else(|_| "3000".to_string())
        .parse()
        .unwrap_or(3000);
    let data_dir = env::var("DATA_DIR").unwrap_or_else(|_| "data".to_string());
    let year: i32 = env::var("REVENUE_YEAR")
        .unwrap_or_else(|_| "2024".to_string())
        .parse()
        .unwrap_or(2024);

    let woo_config = WooConfig::from_env();

    println!("Revenue Stats API Server");
    println!("========================");
    println!(
        "Store URL: {}",
        if woo_config.base_url.is_empty() {
            "<not set>"
        } else {
            woo_config.base_url.as_str()
        }
    );
    println!("Revenue year: {}", year);
    println!("Snapshot dir: {}", data_dir);
    println!("Listening on: {}:{}", host, port);
    println!();

    // Pre-flight: refuse to start without a usable order API configuration.
    let client = match WooClient::new(woo_config) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("[FATAL] {}", e);
            eprintln!("        Set WOO_BASE_URL, WOO_CONSUMER_KEY and WOO_CONSUMER_SECRET.");
            std::process::exit(1);
        }
    };

    let service = Arc::new(RevenueService::new(
        Arc::new(client),
        SnapshotStore::new(&data_dir),
        year,
    ));

    run_server(service, &host, port).await?;

    Ok(())
}
