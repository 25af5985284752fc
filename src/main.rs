use goodwe_bridge::prelude::*;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<()> {
    let options = Options::new();

    if let Some(Command::Probe {
        host,
        port,
        family,
        timeout_ms,
        retries,
        json,
    }) = options.command
    {
        goodwe_bridge::init_logging("warn");
        let policy = RetryPolicy::new(Duration::from_millis(timeout_ms), retries);
        return goodwe_bridge::probe(&host, port, family, policy, json).await;
    }

    let config = Config::new(&options.config_file)?;
    goodwe_bridge::init_logging(&config.loglevel);
    info!("Using config file: {}", options.config_file);
    config.log_summary();

    // Create a channel for shutdown signaling
    let (shutdown_tx, _) = broadcast::channel(1);

    // Handle Ctrl+C
    let shutdown_tx_clone = shutdown_tx.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
        }
        if let Err(e) = shutdown_tx_clone.send(()) {
            error!("Failed to send shutdown signal: {}", e);
        }
    });

    if let Some(secs) = options.runtime {
        let shutdown_tx_clone = shutdown_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(secs)).await;
            info!("Runtime limit of {}s reached", secs);
            let _ = shutdown_tx_clone.send(());
        });
    }

    goodwe_bridge::app(shutdown_tx, ConfigWrapper::from_config(config)).await
}
