#![allow(dead_code)]

use async_trait::async_trait;
use goodwe_bridge::error::Result;
use goodwe_bridge::goodwe::packet::{self, FrameKind};
use goodwe_bridge::goodwe::registry::{self, DeviceFamily};
use goodwe_bridge::goodwe::{Link, RetryPolicy};
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;

pub fn common_setup() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Maps one request datagram to the reply the inverter sends, if any.
pub type Responder = Box<dyn FnMut(&[u8]) -> Option<Vec<u8>> + Send>;

pub fn quick_policy(max_retries: u32) -> RetryPolicy {
    RetryPolicy::new(Duration::from_millis(50), max_retries)
}

pub struct Factory;
impl Factory {
    // {{{ payloads
    pub fn et_device_info() -> Vec<u8> {
        let mut p = vec![0u8; 66];
        p[6..22].copy_from_slice(b"9010KETU000W0000");
        p[22..32].copy_from_slice(b"GW10K-ET  ");
        p[54..66].copy_from_slice(b"02041-16-S00");
        p
    }

    pub fn et_running_data() -> Vec<u8> {
        let mut p = vec![0u8; 250];
        p[6..8].copy_from_slice(&300u16.to_be_bytes()); // vpv1 30.0V
        p[8..10].copy_from_slice(&52i16.to_be_bytes()); // ipv1 5.2A
        p[10..14].copy_from_slice(&1500i32.to_be_bytes()); // ppv1
        p[52..54].copy_from_slice(&0xFFFFu16.to_be_bytes()); // vgrid2 n/a
        p[78..82].copy_from_slice(&(-200i32).to_be_bytes()); // active_power
        p[174..176].copy_from_slice(&1u16.to_be_bytes()); // work_mode
        p[182..186].copy_from_slice(&123456u32.to_be_bytes()); // e_total
        p
    }

    pub fn et_battery_info() -> Vec<u8> {
        let mut p = vec![0u8; 22];
        p[14..16].copy_from_slice(&87u16.to_be_bytes()); // soc
        p[16..18].copy_from_slice(&100u16.to_be_bytes()); // soh
        p
    }

    pub fn aa55_device_info(model: &str) -> Vec<u8> {
        let mut p = vec![b' '; 76];
        p[5..5 + model.len()].copy_from_slice(model.as_bytes());
        p[31..47].copy_from_slice(b"95048ESU000W0000");
        p[51..63].copy_from_slice(b"00332-04-S02");
        p
    }

    pub fn es_running_data() -> Vec<u8> {
        let mut p = vec![0u8; 140];
        p[0..2].copy_from_slice(&3000u16.to_be_bytes()); // vpv1 300.0V
        p[2..4].copy_from_slice(&40i16.to_be_bytes()); // ipv1 4.0A
        p[26] = 55; // soc
        p[38..40].copy_from_slice(&450i16.to_be_bytes()); // pgrid
        p[80] = 1; // exporting
        p
    }
    // }}}

    pub fn et_reply(payload: &[u8]) -> Vec<u8> {
        packet::build_response(FrameKind::Modbus, 0xF703, payload)
    }

    pub fn aa55_reply(function: u8, payload: &[u8]) -> Vec<u8> {
        packet::build_response(FrameKind::Aa55, u16::from_be_bytes([0x01, function | 0x80]), payload)
    }

    // {{{ responders
    pub fn silent() -> Responder {
        Box::new(|_: &[u8]| None)
    }

    pub fn et() -> Responder {
        let protocol = registry::lookup(DeviceFamily::ET).unwrap();
        let info = protocol.device_info.bytes();
        let running = protocol.runtime[0].request.bytes();
        let battery = protocol.runtime[1].request.bytes();

        Box::new(move |frame: &[u8]| {
            if frame == info.as_slice() {
                Some(Self::et_reply(&Self::et_device_info()))
            } else if frame == running.as_slice() {
                Some(Self::et_reply(&Self::et_running_data()))
            } else if frame == battery.as_slice() {
                Some(Self::et_reply(&Self::et_battery_info()))
            } else {
                None
            }
        })
    }

    /// An ES or EM inverter reporting `model`.
    pub fn aa55(model: &'static str) -> Responder {
        let protocol = registry::lookup(DeviceFamily::ES).unwrap();
        let info = protocol.device_info.bytes();
        let running = protocol.runtime[0].request.bytes();

        Box::new(move |frame: &[u8]| {
            if frame == info.as_slice() {
                Some(Self::aa55_reply(0x02, &Self::aa55_device_info(model)))
            } else if frame == running.as_slice() {
                Some(Self::aa55_reply(0x06, &Self::es_running_data()))
            } else {
                None
            }
        })
    }

    /// Ignores the first `n` requests, then behaves like `inner`.
    pub fn lossy(n: usize, mut inner: Responder) -> Responder {
        let mut seen = 0;
        Box::new(move |frame: &[u8]| {
            seen += 1;
            if seen <= n {
                None
            } else {
                inner(frame)
            }
        })
    }
    // }}}
}

// {{{ MockLink
/// In-memory link; replies come from a `Responder`, silence never resolves.
pub struct MockLink {
    responder: Responder,
    pending: VecDeque<Vec<u8>>,
    pub sent: Vec<Vec<u8>>,
}

impl MockLink {
    pub fn new(responder: Responder) -> Self {
        Self {
            responder,
            pending: VecDeque::new(),
            sent: Vec::new(),
        }
    }
}

#[async_trait]
impl Link for MockLink {
    async fn send(&mut self, frame: &[u8]) -> Result<()> {
        self.sent.push(frame.to_vec());
        if let Some(reply) = (self.responder)(frame) {
            self.pending.push_back(reply);
        }
        Ok(())
    }

    async fn recv(&mut self) -> Result<Vec<u8>> {
        match self.pending.pop_front() {
            Some(reply) => Ok(reply),
            None => futures::future::pending().await,
        }
    }

    fn clear(&mut self) {
        self.pending.clear();
    }
} // }}}

// {{{ FakeInverter
/// A responder behind a real loopback UDP socket.
pub struct FakeInverter {
    pub addr: SocketAddr,
    requests: Arc<AtomicUsize>,
    handle: tokio::task::JoinHandle<()>,
}

impl FakeInverter {
    /// With `stray`, every reply is preceded by a well-formed decoy from a
    /// different port, which clients must ignore.
    pub async fn spawn(mut responder: Responder, stray: bool) -> Self {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let decoy = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();
        let requests = Arc::new(AtomicUsize::new(0));
        let counter = requests.clone();

        let handle = tokio::spawn(async move {
            let mut buf = [0u8; 1024];
            while let Ok((len, from)) = socket.recv_from(&mut buf).await {
                counter.fetch_add(1, Ordering::SeqCst);
                let Some(reply) = responder(&buf[..len]) else {
                    continue;
                };
                if stray {
                    let frame = packet::validate_response(&reply).unwrap();
                    let junk = vec![0x11; frame.payload.len()];
                    let fake = packet::build_response(frame.kind, frame.command, &junk);
                    decoy.send_to(&fake, from).await.unwrap();
                }
                socket.send_to(&reply, from).await.unwrap();
            }
        });

        Self {
            addr,
            requests,
            handle,
        }
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

impl Drop for FakeInverter {
    fn drop(&mut self) {
        self.handle.abort();
    }
} // }}}
