pub mod decoder;   // Payload -> Reading
pub mod inverter;  // Client: detection, polling
pub mod labels;    // Status code text
pub mod packet;    // Frame building and validation
pub mod registry;  // Per-family protocol tables
pub mod transport; // UDP link and retry policy

pub use decoder::{Reading, SensorValue, Value};
pub use inverter::{DeviceInfo, Inverter, LastPoll, PollState};
pub use registry::{DeviceFamily, SensorInfo};
pub use transport::{Link, RetryPolicy, Transport, UdpLink};
