//! ProcSentry endpoint agent.
//!
//! Continuously scans running processes, contains (suspends) the ones that
//! match the detection ruleset, and defers the terminate-or-release call to a
//! human operator behind the triage server. The pipeline:
//!
//! ```text
//! scanner -> correlator -> transport -> triage server -> operator
//!                                            |
//! executor <- correlator <- transport <------+
//! ```
//!
//! Everything in the core is fail-closed: when the link to the server is
//! confirmed lost, every still-pending suspicion resolves to Deny so no
//! contained process stays suspended forever.

pub mod config;
pub mod correlator;
pub mod detection;
pub mod executor;
pub mod heartbeat;
pub mod process_ctl;
pub mod transport;
pub mod types;
pub mod wire;
