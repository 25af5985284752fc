// Module declarations for the application's core components
pub mod config;    // Configuration management
pub mod error;     // Error handling and types
pub mod goodwe;    // GoodWe inverter protocol implementation
pub mod options;   // Command line options parsing
pub mod prelude;   // Common imports and types
pub mod scheduler; // Per-inverter polling tasks

// Get the package version from Cargo.toml
const CARGO_PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

use crate::goodwe::Inverter;
use crate::prelude::*;
use crate::scheduler::Scheduler;
use std::io::Write;

/// Sets up env_logger with a timestamped format. `RUST_LOG` wins over `level`.
pub fn init_logging(level: &str) {
    if let Err(e) = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {} {}] {}",
                chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f"),
                record.level(),
                record.module_path().unwrap_or(""),
                record.args()
            )
        })
        .write_style(env_logger::WriteStyle::Never)
        .try_init()
    {
        eprintln!("Failed to initialise logging: {}", e);
    }
}

/// Main application entry point
///
/// Polls every enabled inverter until `shutdown` fires.
pub async fn app(shutdown: broadcast::Sender<()>, config: ConfigWrapper) -> Result<()> {
    info!("goodwe-bridge {} starting", CARGO_PKG_VERSION);

    let scheduler = Scheduler::new(config);
    scheduler.start(shutdown).await?;

    info!("Application shutdown complete");
    Ok(())
}

/// One-shot diagnostic: identify the inverter, poll it once and print the result.
pub async fn probe(
    host: &str,
    port: u16,
    family: Option<DeviceFamily>,
    policy: RetryPolicy,
    json: bool,
) -> Result<()> {
    let mut inverter = Inverter::connect(host, port, family, policy).await?;

    let info = inverter.read_device_info().await?;
    let reading = inverter.poll().await?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "device": info,
                "reading": reading,
            }))?
        );
        return Ok(());
    }

    println!("{} {} (serial {}, firmware {})", info.family, info.model, info.serial, info.firmware);
    for sensor in reading.iter() {
        println!("  {:<28} {:<20} {} {}", sensor.title, sensor.name, sensor.value, sensor.unit);
    }

    Ok(())
}
