use indevolt_bridge::options::Options;
use indevolt_bridge::prelude::*;

use std::time::Duration;

#[tokio::main]
async fn main() -> Result<()> {
    let options = Options::new();

    let config = ConfigWrapper::new(options.config_file.clone()).unwrap_or_else(|err| {
        eprintln!("Failed to load config: {:#}", err);
        std::process::exit(255);
    });

    // Create a channel for shutdown signaling
    let (shutdown_tx, _) = broadcast::channel(1);

    // Handle Ctrl+C
    let shutdown_tx_clone = shutdown_tx.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
        }
        let _ = shutdown_tx_clone.send(());
    });

    if let Some(runtime) = options.runtime {
        let shutdown_tx_clone = shutdown_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(runtime)).await;
            let _ = shutdown_tx_clone.send(());
        });
    }

    if let Err(e) = indevolt_bridge::app(shutdown_tx.subscribe(), config).await {
        error!("Application error: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}
