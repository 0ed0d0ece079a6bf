//! ProcSentry agent entry point.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;

use procsentry_agent::config::{self, AgentConfig, TransportFlavor};
use procsentry_agent::correlator::Correlator;
use procsentry_agent::detection::{scanner, DetectionRuleset};
use procsentry_agent::executor::DecisionExecutor;
use procsentry_agent::process_ctl::{ProcessControl, SystemProcessControl};
use procsentry_agent::transport::{self, PollTransport, StreamTransport, Transport};
use procsentry_agent::heartbeat;

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = AgentConfig::from_env();
    log::info!(
        "starting ProcSentry agent v{} ({})",
        env!("CARGO_PKG_VERSION"),
        config::agent_identity()
    );

    let ruleset = match &config.ruleset_path {
        Some(path) => match DetectionRuleset::load(path) {
            Ok(ruleset) => {
                log::info!("loaded detection ruleset from {}", path.display());
                ruleset
            }
            Err(e) => {
                log::warn!(
                    "failed to load ruleset {}: {}, falling back to defaults",
                    path.display(),
                    e
                );
                DetectionRuleset::default()
            }
        },
        None => DetectionRuleset::default(),
    };

    let ctl: Arc<dyn ProcessControl> = Arc::new(SystemProcessControl);
    let correlator = Arc::new(Correlator::new());
    let running = Arc::new(AtomicBool::new(true));

    // Bounded engine -> transport queue: a slow network applies
    // backpressure to detection, it never drops suspicion events.
    let (event_tx, event_rx) = mpsc::channel(config::EVENT_QUEUE_CAPACITY);
    let (decision_tx, decision_rx) = mpsc::channel(config::EVENT_QUEUE_CAPACITY);

    let _scan_handle = scanner::spawn_scan_loop(
        ruleset,
        ctl.clone(),
        event_tx,
        config.scan_interval,
        running.clone(),
    );

    let executor = DecisionExecutor::new(ctl.clone());
    tokio::spawn(executor.run(decision_rx));

    let transport: Box<dyn Transport> = match config.transport {
        TransportFlavor::Stream => {
            log::info!("using stream transport -> {}", config.stream_addr);
            Box::new(StreamTransport::new(
                config.stream_addr.clone(),
                config.retry_delay,
            ))
        }
        TransportFlavor::Poll => {
            log::info!("using poll transport -> {}", config.server_url);
            Box::new(PollTransport::new(
                config.server_url.clone(),
                config::agent_identity().to_string(),
                config.poll_interval,
                config.retry_delay,
            ))
        }
    };
    tokio::spawn(transport::run(
        transport,
        event_rx,
        correlator.clone(),
        decision_tx.clone(),
        config.retry_delay,
    ));

    tokio::spawn(heartbeat::run(
        config.server_url.clone(),
        config::agent_identity().to_string(),
        config.heartbeat_interval,
    ));

    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("failed to listen for shutdown signal: {}", e);
    }

    // Cooperative shutdown. In-flight pending decisions are abandoned:
    // agent exit renders contained process state moot.
    log::info!("shutdown signal received, stopping agent");
    running.store(false, Ordering::Relaxed);
}
