pub use anyhow::{anyhow, bail, Error, Result};
pub use log::{debug, error, info, trace, warn};
pub use std::str::FromStr;
pub use tokio::sync::broadcast;

pub use crate::config::{self, Config, ConfigWrapper};
pub use crate::file_error;
pub use crate::goodwe::{self, DeviceFamily, Reading, RetryPolicy};
pub use crate::options::{Command, Options};
