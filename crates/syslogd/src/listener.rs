// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! UDP transport: receives syslog datagrams, decodes them and hands them to the consumer over a
//! bounded queue.
//!
//! The receive loop never waits on the consumer. When the queue is full the newest message is
//! dropped and counted; remote senders get no acknowledgement either way.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Local;
use tokio::net::UdpSocket;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace};

use crate::constants::BUFFER_SIZE;
use crate::fault::FaultReporter;
use crate::message::LogMessage;
use crate::report_fault;
use crate::rfc3164;

/// Configuration for the syslog listener
#[derive(Debug, Clone)]
pub struct SyslogListenerConfig {
    /// Address to bind the UDP socket to (e.g., 127.0.0.1:5514 or localhost:5514). Host names
    /// are resolved when binding.
    pub listen_addr: String,
}

// BufferReader abstracts where datagrams come from.
enum BufferReader {
    UdpSocket(UdpSocket),

    /// Replays a fixed buffer, for tests
    #[allow(dead_code)]
    MirrorTest(Vec<u8>, SocketAddr),
}

impl BufferReader {
    async fn read(&self) -> std::io::Result<(Vec<u8>, SocketAddr)> {
        match self {
            BufferReader::UdpSocket(socket) => {
                let mut buf = vec![0; BUFFER_SIZE];
                let (amt, src) = socket.recv_from(&mut buf).await?;
                buf.truncate(amt);
                Ok((buf, src))
            }
            BufferReader::MirrorTest(data, src) => Ok((data.clone(), *src)),
        }
    }
}

/// Whether the receive loop should keep going after handling a datagram.
#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    ConsumerGone,
}

pub struct SyslogListener {
    cancel_token: CancellationToken,
    buffer_reader: BufferReader,
    tx: mpsc::Sender<LogMessage>,
    fault: Arc<FaultReporter>,
    dropped: Arc<AtomicU64>,
}

impl SyslogListener {
    /// Binds the UDP socket. Failing to bind is the one fatal error of the collector and is
    /// returned to the caller.
    pub async fn bind(
        config: &SyslogListenerConfig,
        tx: mpsc::Sender<LogMessage>,
        fault: Arc<FaultReporter>,
        cancel_token: CancellationToken,
    ) -> std::io::Result<SyslogListener> {
        let socket = UdpSocket::bind(config.listen_addr.as_str()).await?;
        Ok(SyslogListener {
            cancel_token,
            buffer_reader: BufferReader::UdpSocket(socket),
            tx,
            fault,
            dropped: Arc::new(AtomicU64::new(0)),
        })
    }

    /// The address actually bound, which differs from the configured one for port 0.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        match &self.buffer_reader {
            BufferReader::UdpSocket(socket) => socket.local_addr(),
            BufferReader::MirrorTest(_, src) => Ok(*src),
        }
    }

    /// Counter of messages dropped because the queue was full.
    pub fn dropped_counter(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.dropped)
    }

    /// Receive loop. Runs until cancelled or until the consumer goes away.
    pub async fn spin(self) {
        loop {
            let flow = tokio::select! {
                flow = self.consume_packet() => flow,
                _ = self.cancel_token.cancelled() => break,
            };
            if flow == Flow::ConsumerGone {
                error!("Message consumer stopped, no longer accepting syslog packets");
                break;
            }
        }
        debug!(
            "Syslog listener stopped, {} messages dropped on a full queue",
            self.dropped.load(Ordering::Relaxed)
        );
    }

    async fn consume_packet(&self) -> Flow {
        let (buf, src) = match self.buffer_reader.read().await {
            Ok(read) => read,
            Err(e) => {
                report_fault!(self.fault, "Error receiving syslog packet: {}", e);
                return Flow::Continue;
            }
        };
        trace!("Received {} bytes from {}", buf.len(), src);

        match rfc3164::parse(&buf, &Local::now()) {
            Ok(message) => self.enqueue(message),
            Err(e) => {
                debug!("Failed to parse syslog packet from {}: {}", src, e);
                Flow::Continue
            }
        }
    }

    fn enqueue(&self, message: LogMessage) -> Flow {
        match self.tx.try_send(message) {
            Ok(()) => Flow::Continue,
            Err(TrySendError::Full(_)) => {
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                report_fault!(
                    self.fault,
                    "Message queue full, dropping syslog message ({} dropped so far)",
                    dropped
                );
                Flow::Continue
            }
            Err(TrySendError::Closed(_)) => Flow::ConsumerGone,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};
    use tracing_test::traced_test;

    fn mirror_listener(
        packet: &str,
        capacity: usize,
    ) -> (SyslogListener, mpsc::Receiver<LogMessage>) {
        let (tx, rx) = mpsc::channel(capacity);
        let listener = SyslogListener {
            cancel_token: CancellationToken::new(),
            buffer_reader: BufferReader::MirrorTest(
                packet.as_bytes().to_vec(),
                SocketAddr::new(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 16)), 58045),
            ),
            tx,
            fault: Arc::new(FaultReporter::new()),
            dropped: Arc::new(AtomicU64::new(0)),
        };
        (listener, rx)
    }

    #[tokio::test]
    async fn test_packet_is_decoded_and_queued() {
        let (listener, mut rx) =
            mirror_listener("<30>Aug 13 14:41:30 gokrazy iptables: hello", 4);
        assert_eq!(listener.consume_packet().await, Flow::Continue);

        let message = rx.try_recv().unwrap();
        assert_eq!(message.hostname, "gokrazy");
        assert_eq!(message.tag, "iptables");
        assert_eq!(message.content, "hello");
    }

    #[tokio::test]
    #[traced_test]
    async fn test_unparsable_packet_is_skipped() {
        let (listener, mut rx) = mirror_listener("not syslog at all", 4);
        assert_eq!(listener.consume_packet().await, Flow::Continue);
        assert!(rx.try_recv().is_err());
        assert!(logs_contain("Failed to parse syslog packet"));
    }

    #[tokio::test]
    #[traced_test]
    async fn test_full_queue_drops_newest() {
        let (listener, mut rx) = mirror_listener("<30>Aug 13 14:41:30 dr kernel: one", 1);
        assert_eq!(listener.consume_packet().await, Flow::Continue);
        assert_eq!(listener.consume_packet().await, Flow::Continue);
        assert_eq!(listener.consume_packet().await, Flow::Continue);

        assert_eq!(listener.dropped_counter().load(Ordering::Relaxed), 2);
        assert!(logs_contain("Message queue full"));
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_closed_queue_stops_listener() {
        let (listener, rx) = mirror_listener("<30>Aug 13 14:41:30 dr kernel: one", 1);
        drop(rx);
        assert_eq!(listener.consume_packet().await, Flow::ConsumerGone);
        // spin returns on its own instead of looping forever
        listener.spin().await;
    }

    async fn bind_listener(
        listen_addr: &str,
        capacity: usize,
    ) -> std::io::Result<(SyslogListener, mpsc::Receiver<LogMessage>)> {
        let (tx, rx) = mpsc::channel(capacity);
        let listener = SyslogListener::bind(
            &SyslogListenerConfig {
                listen_addr: listen_addr.to_string(),
            },
            tx,
            Arc::new(FaultReporter::new()),
            CancellationToken::new(),
        )
        .await?;
        Ok((listener, rx))
    }

    #[tokio::test]
    async fn test_bind_reports_local_addr() {
        let (listener, _rx) = bind_listener("127.0.0.1:0", 1).await.unwrap();
        assert_ne!(listener.local_addr().unwrap().port(), 0);
    }

    #[tokio::test]
    async fn test_bind_resolves_host_names() {
        let (listener, _rx) = bind_listener("localhost:0", 1).await.unwrap();
        assert!(listener.local_addr().unwrap().ip().is_loopback());
    }

    #[tokio::test]
    async fn test_bind_rejects_unresolvable_address() {
        assert!(bind_listener("not an address", 1).await.is_err());
    }

    #[tokio::test]
    async fn test_datagram_larger_than_rfc_limit_is_kept_whole() {
        let (listener, mut rx) = bind_listener("127.0.0.1:0", 4).await.unwrap();
        let addr = listener.local_addr().unwrap();
        let cancel_token = listener.cancel_token.clone();
        let spin = tokio::spawn(listener.spin());

        let content = format!("{}END", "x".repeat(12 * 1024));
        let packet = format!("<13>{} dr kernel: {}", Local::now().to_rfc3339(), content);
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        socket.send_to(packet.as_bytes(), addr).await.unwrap();

        let message = tokio::time::timeout(std::time::Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(message.content.len(), content.len());
        assert!(message.content.ends_with("END"));

        cancel_token.cancel();
        spin.await.unwrap();
    }
}
