//! Fire-and-forget StatsD emitter over UDP.

use anyhow::Context;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};

pub struct StatsdSink {
    socket: UdpSocket,
    prefix: String,
}

impl StatsdSink {
    /// Resolves `addr` and connects a non-blocking UDP socket to it. Every
    /// metric is sent as `<prefix>.<name>`, or as `<name>` if `prefix` is
    /// empty.
    pub fn connect(addr: &str, prefix: impl Into<String>) -> anyhow::Result<Self> {
        let target: SocketAddr = addr
            .to_socket_addrs()
            .with_context(|| format!("failed to resolve StatsD address `{addr}`"))?
            .next()
            .with_context(|| format!("StatsD address `{addr}` resolved to nothing"))?;

        let local = if target.is_ipv4() {
            "0.0.0.0:0"
        } else {
            "[::]:0"
        };
        let socket = UdpSocket::bind(local).context("failed to bind StatsD socket")?;
        socket
            .connect(target)
            .with_context(|| format!("failed to connect StatsD socket to `{target}`"))?;
        socket.set_nonblocking(true)?;

        Ok(Self {
            socket,
            prefix: prefix.into(),
        })
    }

    pub fn count(&self, name: &str, value: u64) {
        self.send(name, value, "c");
    }

    pub fn timing(&self, name: &str, millis: u64) {
        self.send(name, millis, "ms");
    }

    fn send(&self, name: &str, value: u64, kind: &str) {
        let line = if self.prefix.is_empty() {
            format!("{name}:{value}|{kind}")
        } else {
            format!("{}.{name}:{value}|{kind}", self.prefix)
        };

        if let Err(err) = self.socket.send(line.as_bytes()) {
            tracing::trace!("Dropped StatsD packet `{line}`: {err}");
        }
    }
}
