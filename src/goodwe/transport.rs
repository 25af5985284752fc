use crate::error::{Error, Result};

use {
    async_trait::async_trait,
    log::{debug, warn},
    std::net::SocketAddr,
    std::time::Duration,
    tokio::net::UdpSocket,
};

/// Inverter replies comfortably fit; anything longer is truncated and then
/// fails validation.
const RECV_BUFFER: usize = 1024;

// {{{ Link
/// A datagram channel to exactly one inverter.
#[async_trait]
pub trait Link: Send {
    async fn send(&mut self, frame: &[u8]) -> Result<()>;

    /// Waits for the next datagram from the inverter. Never times out on its
    /// own; the transport bounds the wait.
    async fn recv(&mut self) -> Result<Vec<u8>>;

    /// Drops anything already queued, such as late replies to an abandoned
    /// attempt.
    fn clear(&mut self) {}
}

pub struct UdpLink {
    socket: UdpSocket,
    peer: SocketAddr,
}

impl UdpLink {
    /// Resolves `host` and binds an ephemeral local port of the matching
    /// address family. The socket is released when the link is dropped.
    pub async fn open(host: &str, port: u16) -> Result<Self> {
        let peer = tokio::net::lookup_host((host, port))
            .await?
            .next()
            .ok_or_else(|| {
                std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("{} did not resolve to any address", host),
                )
            })?;

        let bind = if peer.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
        let socket = UdpSocket::bind(bind).await?;
        debug!("bound {} for inverter at {}", socket.local_addr()?, peer);

        Ok(Self { socket, peer })
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }
}

#[async_trait]
impl Link for UdpLink {
    async fn send(&mut self, frame: &[u8]) -> Result<()> {
        self.socket.send_to(frame, self.peer).await?;
        Ok(())
    }

    async fn recv(&mut self) -> Result<Vec<u8>> {
        let mut buf = [0u8; RECV_BUFFER];
        loop {
            let (len, from) = self.socket.recv_from(&mut buf).await?;
            if from == self.peer {
                return Ok(buf[..len].to_vec());
            }
            debug!("ignoring {} bytes from {}, expecting {}", len, from, self.peer);
        }
    }

    fn clear(&mut self) {
        let mut buf = [0u8; RECV_BUFFER];
        while let Ok((len, from)) = self.socket.try_recv_from(&mut buf) {
            debug!("dropping stale {} bytes from {}", len, from);
        }
    }
} // }}}

// {{{ RetryPolicy
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RetryPolicy {
    /// How long each attempt waits for a reply.
    pub timeout: Duration,
    /// Attempts after the first; a request is sent at most `max_retries + 1` times.
    pub max_retries: u32,
}

impl RetryPolicy {
    pub fn new(timeout: Duration, max_retries: u32) -> Self {
        Self {
            timeout,
            max_retries,
        }
    }

    pub fn attempts(&self) -> u32 {
        self.max_retries + 1
    }

    /// Longest a single `request` can take.
    pub fn worst_case(&self) -> Duration {
        self.timeout * self.attempts()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(Duration::from_millis(2000), 3)
    }
} // }}}

// {{{ Transport
pub struct Transport<L: Link = UdpLink> {
    link: L,
    policy: RetryPolicy,
}

impl<L: Link> Transport<L> {
    pub fn new(link: L, policy: RetryPolicy) -> Self {
        Self { link, policy }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    /// Sends `frame` and returns whatever `validate` makes of the reply.
    ///
    /// Each attempt sends the identical frame once and waits up to the
    /// policy's timeout. Timeouts, socket errors and replies that `validate`
    /// rejects as invalid all fail the attempt; any other error from
    /// `validate` is returned immediately. After `max_retries + 1` failed
    /// attempts this gives up with `Error::Unreachable`.
    pub async fn request<T, F>(&mut self, frame: &[u8], mut validate: F) -> Result<T>
    where
        F: FnMut(&[u8]) -> Result<T> + Send,
        T: Send,
    {
        let attempts = self.policy.attempts();

        for attempt in 1..=attempts {
            match self.attempt(frame, &mut validate).await {
                Ok(r) => {
                    if attempt > 1 {
                        debug!("reply on attempt {}/{}", attempt, attempts);
                    }
                    return Ok(r);
                }
                Err(e) if Self::retryable(&e) => {
                    warn!("attempt {}/{} failed: {}", attempt, attempts, e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(Error::Unreachable { attempts })
    }

    async fn attempt<T, F>(&mut self, frame: &[u8], validate: &mut F) -> Result<T>
    where
        F: FnMut(&[u8]) -> Result<T> + Send,
        T: Send,
    {
        self.link.clear();

        debug!("-> {:02x?}", frame);
        self.link.send(frame).await?;

        let reply = tokio::time::timeout(self.policy.timeout, self.link.recv())
            .await
            .map_err(|_| Error::Timeout)??;
        debug!("<- {:02x?}", reply);

        validate(&reply)
    }

    fn retryable(e: &Error) -> bool {
        e.is_invalid_reply() || matches!(e, Error::Timeout | Error::Io(_))
    }
} // }}}
