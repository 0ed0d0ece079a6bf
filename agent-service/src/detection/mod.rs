//! Detection & containment engine.
//!
//! One sequential scan cycle at a fixed interval; cycles never overlap. A
//! process matching the ruleset is suspended best-effort and reported
//! downstream exactly once while it stays alive (the dedup cache handles
//! process exit and pid reuse).

pub mod dedup;
pub mod ruleset;
pub mod scanner;

pub use dedup::DedupCache;
pub use ruleset::DetectionRuleset;
