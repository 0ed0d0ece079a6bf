//! Persistent line-oriented TCP transport.
//!
//! Events go out as `[SUSPEITO]` lines; replies come back as bare `y`/`n`
//! lines matched FIFO against the pending-order sequence. Per-agent
//! submission order is preserved by the stream itself.

use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::mpsc;

use crate::correlator::Correlator;
use crate::types::{ResolvedDecision, SuspicionEvent, Verdict};
use crate::wire;

use super::{Transport, TransportError};

pub struct StreamTransport {
    addr: String,
    retry_delay: Duration,
    conn: Option<TcpStream>,
}

impl StreamTransport {
    pub fn new(addr: String, retry_delay: Duration) -> Self {
        Self {
            addr,
            retry_delay,
            conn: None,
        }
    }
}

#[async_trait]
impl Transport for StreamTransport {
    fn name(&self) -> &'static str {
        "stream"
    }

    async fn connect(&mut self) {
        loop {
            match TcpStream::connect(&self.addr).await {
                Ok(stream) => {
                    self.conn = Some(stream);
                    return;
                }
                Err(e) => {
                    log::warn!(
                        "failed to connect to {}: {}, retrying in {:?}",
                        self.addr, e, self.retry_delay
                    );
                    tokio::time::sleep(self.retry_delay).await;
                }
            }
        }
    }

    async fn run_session(
        &mut self,
        events: &mut mpsc::Receiver<SuspicionEvent>,
        correlator: &Correlator,
        decisions: &mpsc::Sender<ResolvedDecision>,
    ) -> TransportError {
        let stream = match self.conn.take() {
            Some(s) => s,
            None => return TransportError::ConnectionLost("no established session".to_string()),
        };
        let (read_half, mut write_half) = stream.into_split();
        let mut lines = BufReader::new(read_half).lines();

        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => {
                        // Register first: an unsent event must still be
                        // pending for the fail-closed sweep.
                        let local_id = correlator.register(event.clone());
                        let mut line = wire::format_suspect_line(local_id, &event);
                        line.push('\n');
                        if let Err(e) = write_half.write_all(line.as_bytes()).await {
                            return TransportError::ConnectionLost(e.to_string());
                        }
                        log::info!(
                            "submitted suspicion id {} ({}, pid {})",
                            local_id, event.process_name, event.pid
                        );
                    }
                    None => return TransportError::Closed,
                },

                reply = lines.next_line() => match reply {
                    Ok(Some(line)) => {
                        if handle_reply(&line, correlator, decisions).await.is_err() {
                            return TransportError::Closed;
                        }
                    }
                    Ok(None) => {
                        return TransportError::ConnectionLost("server closed the stream".to_string());
                    }
                    Err(e) => return TransportError::ConnectionLost(e.to_string()),
                },
            }
        }
    }
}

/// Match one reply line to the oldest pending event. Malformed lines and
/// replies with nothing pending are logged and dropped.
async fn handle_reply(
    line: &str,
    correlator: &Correlator,
    decisions: &mpsc::Sender<ResolvedDecision>,
) -> Result<(), ()> {
    match Verdict::from_wire(line) {
        Some(verdict) => match correlator.resolve_oldest() {
            Some((local_id, event)) => {
                log::info!("decision '{}' received for local id {}", line.trim(), local_id);
                decisions
                    .send(ResolvedDecision { local_id, verdict, event })
                    .await
                    .map_err(|_| ())
            }
            None => {
                log::warn!("received reply '{}' with nothing pending", line.trim());
                Ok(())
            }
        },
        None => {
            log::warn!("unrecognized reply line: {}", line.trim());
            Ok(())
        }
    }
}
