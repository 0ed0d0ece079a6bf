//! Liveness heartbeat.
//!
//! Periodic ping so the server can show which agents are online. Purely
//! observational: a failed ping is logged and skipped, never escalated.

use std::time::Duration;

use serde::Serialize;

#[derive(Debug, Serialize)]
struct PingRequest<'a> {
    id: &'a str,
}

pub async fn run(base_url: String, agent: String, interval: Duration) {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
        .expect("failed to build HTTP client");

    let url = format!("{}/api/ping", base_url);
    let mut tick = tokio::time::interval(interval);
    tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tick.tick().await;
        match client.post(&url).json(&PingRequest { id: &agent }).send().await {
            Ok(response) if response.status().is_success() => {
                log::debug!("ping ok");
            }
            Ok(response) => {
                log::warn!("ping returned status {}", response.status());
            }
            Err(e) => {
                log::warn!("ping failed: {}", e);
            }
        }
    }
}
