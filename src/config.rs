use crate::prelude::*;

use serde::Deserialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    pub inverters: Vec<Inverter>,

    #[serde(default = "Config::default_loglevel")]
    pub loglevel: String,
}

// Inverter {{{
#[derive(Clone, Debug, Deserialize)]
pub struct Inverter {
    #[serde(default = "Config::default_enabled")]
    pub enabled: bool,

    /// Prefix for published readings; defaults to the host.
    pub name: Option<String>,
    pub host: String,
    #[serde(default = "Config::default_port")]
    pub port: u16,
    #[serde(default, deserialize_with = "de_family")]
    pub family: Option<DeviceFamily>,

    pub poll_interval: Option<u64>,
    pub timeout_ms: Option<u64>,
    pub retries: Option<u32>,
}
impl Inverter {
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.host)
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Configured family, or `None` to detect it on first poll.
    pub fn family(&self) -> Option<DeviceFamily> {
        self.family
    }

    pub fn poll_interval(&self) -> u64 {
        self.poll_interval.unwrap_or(30)
    }

    pub fn timeout_ms(&self) -> u64 {
        self.timeout_ms.unwrap_or(2000)
    }

    pub fn retries(&self) -> u32 {
        self.retries.unwrap_or(3)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(Duration::from_millis(self.timeout_ms()), self.retries())
    }
} // }}}

#[derive(Clone, Debug)]
pub struct ConfigWrapper {
    config: Arc<Config>,
}

impl ConfigWrapper {
    pub fn new(file: &str) -> Result<Self> {
        Ok(Self::from_config(Config::new(file)?))
    }

    pub fn from_config(config: Config) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    pub fn inverters(&self) -> Vec<Inverter> {
        self.config.inverters.clone()
    }

    pub fn enabled_inverters(&self) -> Vec<Inverter> {
        self.inverters().into_iter().filter(|i| i.enabled()).collect()
    }

    pub fn inverter_with_name(&self, name: &str) -> Option<Inverter> {
        self.inverters().into_iter().find(|i| i.name() == name)
    }

    pub fn loglevel(&self) -> String {
        self.config.loglevel.clone()
    }
}

impl Config {
    pub fn new(file: &str) -> Result<Self> {
        let content = std::fs::read_to_string(file)
            .map_err(|err| file_error!("error reading {}: {}", file, err))?;

        Self::from_yaml(&content).map_err(|err| file_error!("{}: {}", file, err))
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Logs what was loaded. Called once logging is up, which itself depends
    /// on `loglevel`.
    pub fn log_summary(&self) {
        info!("Configuration loaded successfully:");
        info!(
            "  Inverters: {} configured, {} enabled",
            self.inverters.len(),
            self.inverters.iter().filter(|i| i.enabled).count()
        );
        for (i, inv) in self.inverters.iter().enumerate() {
            info!("    Inverter[{}]:", i);
            info!("      Name: {}", inv.name());
            info!("      Enabled: {}", inv.enabled);
            info!("      Host: {}", inv.host);
            info!("      Port: {}", inv.port);
            info!(
                "      Family: {}",
                inv.family
                    .map(|f| f.to_string())
                    .unwrap_or_else(|| "auto".to_string())
            );
            info!("      Poll Interval: {}s", inv.poll_interval());
            info!("      Timeout: {}ms", inv.timeout_ms());
            info!("      Retries: {}", inv.retries());
        }
        info!("  Log Level: {}", self.loglevel);
    }

    fn validate(&self) -> Result<()> {
        let mut names = HashSet::new();

        for (i, inv) in self.inverters.iter().enumerate() {
            if !names.insert(inv.name()) {
                bail!("inverter[{}].name {} is used more than once", i, inv.name());
            }

            if inv.enabled {
                if inv.host.is_empty() {
                    return Err(anyhow!("config.rs:Inverter host cannot be empty"));
                }
                if inv.port == 0 {
                    bail!("inverter[{}].port must be between 1 and 65535", i);
                }
                if inv.poll_interval() == 0 {
                    bail!("inverter[{}].poll_interval must be at least 1 second", i);
                }
                if inv.timeout_ms() == 0 {
                    return Err(anyhow!("config.rs:Invalid timeout_ms: 0"));
                }
            }
        }

        Ok(())
    }

    fn default_port() -> u16 {
        8899
    }

    fn default_enabled() -> bool {
        true
    }

    fn default_loglevel() -> String {
        "info".to_string()
    }
}

fn de_family<'de, D>(deserializer: D) -> Result<Option<DeviceFamily>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    // null, an empty string or no key at all mean "detect it"
    match Option::<String>::deserialize(deserializer)? {
        Some(s) if !s.trim().is_empty() => DeviceFamily::from_str(&s)
            .map(Some)
            .map_err(serde::de::Error::custom),
        _ => Ok(None),
    }
}
