use crate::goodwe::registry::DeviceFamily;

/// Errors raised while talking to an inverter.
///
/// Framing and decoding errors are structural and always reach the caller.
/// The transport retries validation failures and timeouts on its own and only
/// surfaces `Unreachable` once its attempts are spent.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("frame too short: {len} bytes, need at least {min}")]
    TooShort { len: usize, min: usize },

    #[error("checksum mismatch - got {got:#06x}, expected {expected:#06x}")]
    ChecksumMismatch { got: u16, expected: u16 },

    #[error("unrecognised frame header {0:02x?}")]
    InvalidHeader(Vec<u8>),

    #[error("frame declares {declared} data bytes but carries {actual}")]
    LengthMismatch { declared: usize, actual: usize },

    #[error("response echoes command {got:#06x}, expected {expected:#06x}")]
    UnexpectedCommand { got: u16, expected: u16 },

    #[error("reply to {command:#06x} carries {len} data bytes, not a length that request produces")]
    UnexpectedReplyLength { command: u16, len: usize },

    #[error("payload too short: {len} bytes, field map needs {min}")]
    PayloadTooShort { len: usize, min: usize },

    #[error("deadline exceeded while waiting for the inverter")]
    Timeout,

    #[error("no valid reply after {attempts} attempts")]
    Unreachable { attempts: u32 },

    #[error("no protocol registered for family {0}")]
    UnknownFamily(DeviceFamily),

    #[error("no supported inverter family answered at {0}")]
    NoCompatibleFamily(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True for errors that mean "this datagram was not a usable reply";
    /// the transport retries these.
    pub fn is_invalid_reply(&self) -> bool {
        matches!(
            self,
            Error::TooShort { .. }
                | Error::ChecksumMismatch { .. }
                | Error::InvalidHeader(_)
                | Error::LengthMismatch { .. }
                | Error::UnexpectedCommand { .. }
                | Error::UnexpectedReplyLength { .. }
        )
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Creates an anyhow error with the current file and line number
#[macro_export]
macro_rules! file_error {
    ($($arg:tt)*) => {
        anyhow::anyhow!(
            "[{}:{}] {}",
            std::path::Path::new(file!())
                .file_name()
                .map(|f| f.to_string_lossy())
                .unwrap_or_default(),
            line!(),
            format!($($arg)*)
        )
    };
}
