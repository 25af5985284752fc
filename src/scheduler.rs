use crate::prelude::*;

use crate::goodwe::Inverter;
use serde::Serialize;
use std::time::Duration;

const RECONNECT_DELAY_SECS: u64 = 5;

/// One line of output per successful poll.
#[derive(Serialize)]
struct Publication<'a> {
    inverter: &'a str,
    #[serde(flatten)]
    reading: &'a Reading,
}

pub fn publication(name: &str, reading: &Reading) -> Result<String> {
    Ok(serde_json::to_string(&Publication {
        inverter: name,
        reading,
    })?)
}

pub struct Scheduler {
    config: ConfigWrapper,
}

impl Scheduler {
    pub fn new(config: ConfigWrapper) -> Self {
        Self { config }
    }

    /// Polls every enabled inverter on its own interval until shutdown.
    pub async fn start(&self, shutdown: broadcast::Sender<()>) -> Result<()> {
        let handles: Vec<_> = self
            .config
            .enabled_inverters()
            .into_iter()
            .map(|inverter| {
                let shutdown_rx = shutdown.subscribe();
                tokio::spawn(async move {
                    let name = inverter.name().to_string();
                    if let Err(e) = poll_loop(inverter, shutdown_rx).await {
                        error!("inverter {}: {}", name, e);
                    }
                })
            })
            .collect();
        info!("Started {} inverter tasks", handles.len());

        for result in futures::future::join_all(handles).await {
            if let Err(e) = result {
                error!("Error waiting for inverter task: {}", e);
            }
        }

        Ok(())
    }
}

async fn poll_loop(
    config: config::Inverter,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    let name = config.name().to_string();
    let period = Duration::from_secs(config.poll_interval());

    let mut inverter = loop {
        let connect = Inverter::connect(
            config.host(),
            config.port(),
            config.family(),
            config.retry_policy(),
        );
        tokio::select! {
            _ = shutdown.recv() => return Ok(()),
            r = connect => match r {
                Ok(inverter) => break inverter,
                Err(e) => {
                    error!("inverter {}: {}", name, e);
                    info!("inverter {}: retrying in {}s", name, RECONNECT_DELAY_SECS);
                }
            },
        }
        tokio::select! {
            _ = shutdown.recv() => return Ok(()),
            _ = tokio::time::sleep(Duration::from_secs(RECONNECT_DELAY_SECS)) => {}
        }
    };

    info!(
        "inverter {}: polling {}:{} every {}s",
        name,
        config.host(),
        config.port(),
        config.poll_interval()
    );

    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = shutdown.recv() => break,
            _ = interval.tick() => {}
        }

        // a poll never runs into the next one
        let deadline = tokio::time::Instant::now() + period;
        let result = tokio::select! {
            _ = shutdown.recv() => break,
            r = inverter.poll_until(deadline) => r,
        };

        match result {
            Ok(reading) => {
                debug!("inverter {}: {} sensors", name, reading.len());
                println!("{}", publication(&name, &reading)?);
            }
            Err(e) => warn!("inverter {}: reading unavailable this cycle: {}", name, e),
        }
    }

    info!("inverter {}: stopped", name);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::goodwe::registry::{FieldMap, FieldSpec};

    #[test]
    fn publication_line() {
        const MAP: FieldMap = FieldMap {
            min_len: 2,
            fields: &[FieldSpec::u16("vpv1", 0).scaled(1, 10).unit("V")],
            derived: &[],
        };
        let reading = goodwe::decoder::decode(DeviceFamily::ES, &[0x09, 0x60], &MAP).unwrap();

        let line = publication("garage", &reading).unwrap();
        let json: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(json["inverter"], "garage");
        assert_eq!(json["family"], "ES");
        assert_eq!(json["sensors"][0]["name"], "vpv1");
        assert_eq!(json["sensors"][0]["value"], 240.0);
        assert_eq!(json["sensors"][0]["unit"], "V");
        assert!(json["timestamp"].is_string());
    }
}
