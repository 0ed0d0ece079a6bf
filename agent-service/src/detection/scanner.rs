//! The sequential scan loop.
//!
//! Runs on a dedicated thread so a cycle can never overlap with the next
//! one. Detected processes are suspended best-effort and pushed into a
//! bounded channel with a blocking send: a slow or disconnected transport
//! applies backpressure, it never causes a suspicion event to be dropped.

use std::collections::HashSet;
use std::net::UdpSocket;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use chrono::Utc;
use sysinfo::System;
use tokio::sync::mpsc;

use crate::config;
use crate::detection::dedup::{dedup_key, DedupCache};
use crate::detection::ruleset::DetectionRuleset;
use crate::process_ctl::ProcessControl;
use crate::types::SuspicionEvent;

/// Spawn the scan loop thread. Returns its join handle; the loop exits when
/// `running` is cleared or the downstream channel closes.
pub fn spawn_scan_loop(
    ruleset: DetectionRuleset,
    ctl: Arc<dyn ProcessControl>,
    events: mpsc::Sender<SuspicionEvent>,
    interval: Duration,
    running: Arc<AtomicBool>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        log::info!("scan loop started (interval {:?})", interval);
        let ruleset = ruleset.normalized();
        let mut sys = System::new_all();
        let mut cache = DedupCache::new();

        while running.load(Ordering::Relaxed) {
            if !run_cycle(&mut sys, &ruleset, &mut cache, &ctl, &events) {
                break;
            }
            thread::sleep(interval);
        }
        log::info!("scan loop stopped");
    })
}

/// One full scan cycle. Returns false when the downstream channel is gone
/// (agent shutting down).
fn run_cycle(
    sys: &mut System,
    ruleset: &DetectionRuleset,
    cache: &mut DedupCache,
    ctl: &Arc<dyn ProcessControl>,
    events: &mpsc::Sender<SuspicionEvent>,
) -> bool {
    sys.refresh_processes();

    let hostname = config::agent_identity();
    let source_ip = local_source_ip();
    let mut active: HashSet<(u32, String)> = HashSet::new();

    for (pid, process) in sys.processes() {
        // Unavailable name or path (permission denied, already exited) is
        // not an error: skip silently.
        let name = process.name();
        let exe_path = match process.exe() {
            Some(p) if !p.as_os_str().is_empty() => p.to_string_lossy().to_string(),
            _ => continue,
        };
        if name.is_empty() {
            continue;
        }

        if !ruleset.classify(name, &exe_path) {
            continue;
        }

        let pid = pid.as_u32();
        let key = dedup_key(pid, &exe_path);
        active.insert(key.clone());

        if cache.is_reported(&key) {
            continue;
        }

        log::warn!(
            "[SUSPECT] name={} path={} pid={} ip={} host={}",
            name, exe_path, pid, source_ip, hostname
        );

        // Containment is best-effort: a failed suspend is logged but the
        // event is still forwarded, since a decision is required either way.
        match ctl.suspend(pid) {
            Ok(()) => log::info!("process {} suspended pending decision", pid),
            Err(e) => log::error!("failed to suspend pid {}: {}", pid, e),
        }

        let event = SuspicionEvent {
            process_name: name.to_string(),
            exe_path,
            pid,
            source_ip: source_ip.clone(),
            hostname: hostname.to_string(),
            detected_at: Utc::now(),
        };

        if events.blocking_send(event).is_err() {
            // Receiver gone: shutdown in progress.
            return false;
        }

        cache.mark_reported(key);
    }

    cache.purge_absent(&active);
    true
}

/// Best-effort local source address, resolved once per cycle.
///
/// The connect is on a UDP socket: no packet is sent, the OS just picks the
/// outbound interface and local address for us.
fn local_source_ip() -> String {
    UdpSocket::bind("0.0.0.0:0")
        .and_then(|socket| {
            socket.connect("8.8.8.8:80")?;
            socket.local_addr()
        })
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|_| "unknown".to_string())
}
