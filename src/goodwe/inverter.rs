use crate::error::{Error, Result};
use crate::goodwe::decoder::{self, Reading};
use crate::goodwe::packet::{self, Request};
use crate::goodwe::registry::{self, DeviceFamily, InfoLayout, REGISTRY};
use crate::goodwe::transport::{Link, RetryPolicy, Transport, UdpLink};

use {
    bytes::Bytes,
    log::{debug, info, warn},
    serde::Serialize,
};

/// Identification strings from the device info response.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct DeviceInfo {
    pub family: DeviceFamily,
    pub model: String,
    pub serial: String,
    pub firmware: String,
}

impl DeviceInfo {
    pub fn parse(family: DeviceFamily, payload: &[u8], layout: &InfoLayout) -> Result<Self> {
        if payload.len() < layout.min_len {
            return Err(Error::PayloadTooShort {
                len: payload.len(),
                min: layout.min_len,
            });
        }

        Ok(Self {
            family,
            model: text(&payload[layout.model.clone()]),
            serial: text(&payload[layout.serial.clone()]),
            firmware: text(&payload[layout.firmware.clone()]),
        })
    }
}

// fixed-width fields are padded with spaces or NULs
fn text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .trim_matches(|c: char| c == '\0' || c.is_whitespace())
        .to_string()
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PollState {
    Idle,
    Awaiting,
}

/// How the most recent poll ended.
#[derive(Clone, Debug, PartialEq)]
pub enum LastPoll {
    Reading(Reading),
    Failed(String),
}

/// Client for one inverter. Owns its socket; polls are serialised by `&mut self`.
pub struct Inverter<L: Link = UdpLink> {
    name: String,
    transport: Transport<L>,
    family: Option<DeviceFamily>,
    state: PollState,
    last: Option<LastPoll>,
}

impl Inverter<UdpLink> {
    pub async fn connect(
        host: &str,
        port: u16,
        family: Option<DeviceFamily>,
        policy: RetryPolicy,
    ) -> Result<Self> {
        let link = UdpLink::open(host, port).await?;
        Ok(Self::with_link(format!("{}:{}", host, port), link, family, policy))
    }
}

impl<L: Link> Inverter<L> {
    pub fn with_link(
        name: String,
        link: L,
        family: Option<DeviceFamily>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            name,
            transport: Transport::new(link, policy),
            family,
            state: PollState::Idle,
            last: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn family(&self) -> Option<DeviceFamily> {
        self.family
    }

    pub fn state(&self) -> PollState {
        self.state
    }

    pub fn last(&self) -> Option<&LastPoll> {
        self.last.as_ref()
    }

    pub fn transport(&self) -> &Transport<L> {
        &self.transport
    }

    /// Fetches one fresh reading, detecting the family first if it is not
    /// yet known.
    pub async fn poll(&mut self) -> Result<Reading> {
        self.state = PollState::Awaiting;
        let result = self.poll_blocks().await;
        self.state = PollState::Idle;

        self.last = Some(match &result {
            Ok(reading) => LastPoll::Reading(reading.clone()),
            Err(e) => LastPoll::Failed(e.to_string()),
        });

        result
    }

    /// As `poll`, but abandons the in-flight attempt and fails with
    /// `Error::Timeout` once `deadline` passes.
    pub async fn poll_until(&mut self, deadline: tokio::time::Instant) -> Result<Reading> {
        let result = tokio::time::timeout_at(deadline, self.poll()).await;
        match result {
            Ok(result) => result,
            Err(_) => {
                warn!("{}: poll abandoned at deadline", self.name);
                self.state = PollState::Idle;
                self.last = Some(LastPoll::Failed(Error::Timeout.to_string()));
                Err(Error::Timeout)
            }
        }
    }

    async fn poll_blocks(&mut self) -> Result<Reading> {
        let family = match self.family {
            Some(family) => family,
            None => self.detect_family().await?,
        };
        let protocol = registry::lookup(family)?;

        let mut reading: Option<Reading> = None;
        for block in protocol.runtime {
            let payload = self.exchange(&block.request).await?;
            let decoded = decoder::decode(family, &payload, &block.fields)?;
            match reading.as_mut() {
                Some(r) => r.merge(decoded),
                None => reading = Some(decoded),
            }
        }

        reading.ok_or(Error::UnknownFamily(family))
    }

    /// Probes each distinct device info request in registry order. Families
    /// sharing a request are told apart by the model name in the reply.
    pub async fn detect_family(&mut self) -> Result<DeviceFamily> {
        let (family, _) = self.detect().await?;
        Ok(family)
    }

    // the device info payload that identified the family comes back with it
    async fn detect(&mut self) -> Result<(DeviceFamily, Bytes)> {
        let mut tried: Vec<Request> = Vec::new();

        for protocol in REGISTRY.iter() {
            if tried.contains(&protocol.device_info) {
                continue;
            }
            tried.push(protocol.device_info);

            let payload = match self.exchange(&protocol.device_info).await {
                Ok(payload) => payload,
                Err(e) => {
                    debug!("{}: no {} reply: {}", self.name, protocol.family, e);
                    continue;
                }
            };

            let family = REGISTRY
                .iter()
                .filter(|p| p.device_info == protocol.device_info)
                .find(|p| {
                    DeviceInfo::parse(p.family, &payload, &p.info_layout)
                        .map(|info| p.matches_model(&info.model))
                        .unwrap_or(false)
                })
                .map(|p| p.family)
                .unwrap_or(protocol.family);

            info!("{}: detected {} family", self.name, family);
            self.family = Some(family);
            return Ok((family, payload));
        }

        Err(Error::NoCompatibleFamily(self.name.clone()))
    }

    /// Reads model, serial and firmware. When the family is still unknown the
    /// detection reply is parsed directly instead of asking twice.
    pub async fn read_device_info(&mut self) -> Result<DeviceInfo> {
        let (family, payload) = match self.family {
            Some(family) => {
                let request = registry::lookup(family)?.device_info;
                (family, self.exchange(&request).await?)
            }
            None => self.detect().await?,
        };

        let protocol = registry::lookup(family)?;
        DeviceInfo::parse(family, &payload, &protocol.info_layout)
    }

    // one validated round trip; replies echoing a different command or
    // sized for a different request are treated like any other invalid
    // datagram
    async fn exchange(&mut self, request: &Request) -> Result<Bytes> {
        let frame = packet::build_request(request);
        let expected = request.expected_command();

        self.transport
            .request(&frame, |bytes| {
                let response = packet::validate_response(bytes)?;
                if response.command != expected {
                    return Err(Error::UnexpectedCommand {
                        got: response.command,
                        expected,
                    });
                }
                if !request.accepts_reply_len(response.payload.len()) {
                    return Err(Error::UnexpectedReplyLength {
                        command: response.command,
                        len: response.payload.len(),
                    });
                }
                Ok(response.payload)
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_et_device_info() {
        let mut payload = vec![0u8; 66];
        payload[6..22].copy_from_slice(b"9010KETU000W0000");
        payload[22..32].copy_from_slice(b"GW10K-ET  ");
        payload[54..66].copy_from_slice(b"02041-16-S00");

        let layout = &registry::lookup(DeviceFamily::ET).unwrap().info_layout;
        let info = DeviceInfo::parse(DeviceFamily::ET, &payload, layout).unwrap();
        assert_eq!(info.model, "GW10K-ET");
        assert_eq!(info.serial, "9010KETU000W0000");
        assert_eq!(info.firmware, "02041-16-S00");
    }

    #[test]
    fn short_device_info() {
        let layout = &registry::lookup(DeviceFamily::ES).unwrap().info_layout;
        assert!(matches!(
            DeviceInfo::parse(DeviceFamily::ES, &[0u8; 40], layout),
            Err(Error::PayloadTooShort { len: 40, min: 63 })
        ));
    }
}
