use clap::{Parser, Subcommand};

use crate::goodwe::DeviceFamily;

/// GoodWe Bridge - poll GoodWe inverters over their local UDP protocol
#[derive(Debug, Parser)]
#[clap(author, version)]
pub struct Options {
    /// Config file to read
    #[clap(short = 'c', long = "config", default_value = "config.yaml")]
    pub config_file: String,

    /// Optional runtime limit in seconds
    #[clap(short = 't', long = "time")]
    pub runtime: Option<u64>,

    #[clap(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Read device info and one reading from an inverter, then exit
    Probe {
        /// Inverter address
        host: String,

        #[clap(short = 'p', long = "port", default_value_t = 8899)]
        port: u16,

        /// ET, ES or EM; detected when omitted
        #[clap(short = 'f', long = "family")]
        family: Option<DeviceFamily>,

        /// Per-attempt reply timeout in milliseconds
        #[clap(long = "timeout-ms", default_value_t = 2000)]
        timeout_ms: u64,

        #[clap(long = "retries", default_value_t = 3)]
        retries: u32,

        /// Print the reading as JSON instead of a table
        #[clap(long = "json")]
        json: bool,
    },
}

impl Options {
    pub fn new() -> Self {
        Self::parse()
    }
}
