//! Plain TCP listener for stream-flavor agents.
//!
//! Each connection carries newline-delimited suspect lines inbound and
//! bare "y"/"n" verdicts outbound. The reply carries no id, so verdicts
//! are only written in submission order (the queue withholds a decision
//! while an earlier submission from the same origin is undecided) and the
//! agent matches them to its oldest pending event.

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;

use crate::protocol::parse_suspect_line;
use crate::AppState;

pub async fn run(listener: TcpListener, state: AppState) {
    loop {
        match listener.accept().await {
            Ok((socket, peer)) => {
                tracing::info!("stream agent connected from {}", peer);
                let state = state.clone();
                tokio::spawn(async move {
                    if let Err(err) = handle_connection(socket, peer.ip().to_string(), state).await {
                        tracing::warn!("stream session from {} ended: {}", peer, err);
                    }
                });
            }
            Err(err) => {
                tracing::error!("stream accept failed: {}", err);
            }
        }
    }
}

async fn handle_connection(
    socket: TcpStream,
    peer_ip: String,
    state: AppState,
) -> std::io::Result<()> {
    let (read_half, mut write_half) = socket.into_split();
    let mut lines = BufReader::new(read_half).lines();
    let mut decided = state.queue.subscribe();

    // Until the first suspect line names its host, the peer address stands
    // in as the origin. Staged decisions cannot be flushed before then.
    let mut origin: Option<String> = None;

    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line? {
                    Some(line) => {
                        handle_line(&line, &peer_ip, &mut origin, &state);
                    }
                    None => {
                        tracing::info!("stream agent {} disconnected", origin.as_deref().unwrap_or(&peer_ip));
                        return Ok(());
                    }
                }
            }
            notified = decided.recv() => {
                match notified {
                    Ok(for_origin) => {
                        if origin.as_deref() == Some(for_origin.as_str()) {
                            flush_staged(&for_origin, &state, &mut write_half).await?;
                        }
                    }
                    // Lagged just means missed wakeups; flush to catch up.
                    Err(broadcast::error::RecvError::Lagged(_)) => {
                        if let Some(origin) = &origin {
                            flush_staged(origin, &state, &mut write_half).await?;
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => return Ok(()),
                }
            }
        }
    }
}

fn handle_line(line: &str, peer_ip: &str, origin: &mut Option<String>, state: &AppState) {
    let Some(suspect) = parse_suspect_line(line) else {
        tracing::warn!("dropping malformed line from {}: {:?}", peer_ip, line);
        return;
    };

    let host = if suspect.host.is_empty() {
        peer_ip.to_string()
    } else {
        suspect.host.clone()
    };
    let first_identification = origin.is_none();
    *origin = Some(host.clone());

    // The agent denied all of its in-flight events when the previous link
    // dropped, so anything still retained for this origin refers to events
    // that no longer exist on the agent. A new session starts clean.
    if first_identification {
        let (dropped_pending, dropped_staged) = state.queue.purge_origin(&host);
        if dropped_pending > 0 || dropped_staged > 0 {
            tracing::info!(
                "purged {} stale pending and {} stale staged records for {}",
                dropped_pending,
                dropped_staged,
                host
            );
        }
    }

    let submission = state.queue.submit(&host, suspect.agent_message_id, line);
    state.liveness.ping(&host);

    if submission.duplicate {
        tracing::debug!("duplicate suspect line from {} (entry {})", host, submission.server_id);
    } else {
        tracing::info!(
            "suspect {} (pid {}) from {} queued as entry {}",
            suspect.name,
            suspect.pid,
            host,
            submission.server_id
        );
    }
}

/// Write every deliverable staged decision for `origin`. Decisions taken
/// but not yet written go back on the queue if the write fails.
async fn flush_staged(
    origin: &str,
    state: &AppState,
    write_half: &mut OwnedWriteHalf,
) -> std::io::Result<()> {
    let mut staged = state.queue.take_deliverable_staged(origin);
    while !staged.is_empty() {
        let decision = staged.remove(0);
        let reply = format!("{}\n", decision.response.as_wire());
        if let Err(err) = write_half.write_all(reply.as_bytes()).await {
            staged.insert(0, decision);
            state.queue.restage(origin, staged);
            return Err(err);
        }
        tracing::info!(
            "verdict {} delivered to {} for agent id {}",
            decision.response.as_wire(),
            origin,
            decision.agent_message_id
        );
    }
    Ok(())
}
