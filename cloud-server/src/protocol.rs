//! Wire protocol for the agent stream transport.
//!
//! One suspicion event per inbound line:
//!
//! ```text
//! [SUSPEITO] ID:<int>|Name:<str>|Path:<str>|PID:<int>|IP:<str>|Host:<str>
//! ```
//!
//! Replies to the agent are bare `y`/`n` lines, delivered in the agent's
//! submission order.

use serde::{Deserialize, Serialize};

pub const SUSPECT_TAG: &str = "[SUSPEITO]";

/// Operator outcome in wire form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    Allow,
    Deny,
}

impl Verdict {
    pub fn from_wire(s: &str) -> Option<Verdict> {
        match s.trim().to_lowercase().as_str() {
            "y" => Some(Verdict::Allow),
            "n" => Some(Verdict::Deny),
            _ => None,
        }
    }

    pub fn as_wire(&self) -> &'static str {
        match self {
            Verdict::Allow => "y",
            Verdict::Deny => "n",
        }
    }
}

/// A parsed `[SUSPEITO]` line.
#[derive(Debug, Clone, PartialEq)]
pub struct SuspectLine {
    pub agent_message_id: u64,
    pub name: String,
    pub path: String,
    pub pid: u32,
    pub ip: String,
    pub host: String,
}

/// Parse one suspect line. Returns None for anything malformed; the caller
/// logs and drops it.
pub fn parse_suspect_line(line: &str) -> Option<SuspectLine> {
    let rest = line.trim().strip_prefix(SUSPECT_TAG)?.trim();

    let mut id = None;
    let mut name = None;
    let mut path = None;
    let mut pid = None;
    let mut ip = None;
    let mut host = None;

    for field in rest.split('|') {
        // Only the first colon separates key from value; Windows paths
        // carry their own colon in the value.
        let (key, value) = field.split_once(':')?;
        let value = value.trim();
        match key.trim() {
            "ID" => id = value.parse::<u64>().ok(),
            "Name" => name = Some(value.to_string()),
            "Path" => path = Some(value.to_string()),
            "PID" => pid = value.parse::<u32>().ok(),
            "IP" => ip = Some(value.to_string()),
            "Host" => host = Some(value.to_string()),
            _ => return None,
        }
    }

    Some(SuspectLine {
        agent_message_id: id?,
        name: name?,
        path: path?,
        pid: pid?,
        ip: ip?,
        host: host?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_the_documented_line() {
        let line = r"[SUSPEITO] ID:7|Name:cmd.exe|Path:C:\Users\dev\cmd.exe|PID:4321|IP:192.168.2.50|Host:WKS-01";
        let parsed = parse_suspect_line(line).expect("valid line");
        assert_eq!(parsed.agent_message_id, 7);
        assert_eq!(parsed.name, "cmd.exe");
        // The drive-letter colon stays inside the value.
        assert_eq!(parsed.path, r"C:\Users\dev\cmd.exe");
        assert_eq!(parsed.pid, 4321);
        assert_eq!(parsed.ip, "192.168.2.50");
        assert_eq!(parsed.host, "WKS-01");
    }

    #[test]
    fn rejects_malformed_lines() {
        assert!(parse_suspect_line("hello").is_none());
        assert!(parse_suspect_line("[SUSPEITO] garbage").is_none());
        assert!(parse_suspect_line("[SUSPEITO] ID:x|Name:a|Path:b|PID:1|IP:c|Host:d").is_none());
        // Missing field
        assert!(parse_suspect_line("[SUSPEITO] ID:1|Name:a|Path:b|PID:1|IP:c").is_none());
    }

    #[test]
    fn verdict_round_trip() {
        assert_eq!(Verdict::from_wire("y"), Some(Verdict::Allow));
        assert_eq!(Verdict::from_wire(" N "), Some(Verdict::Deny));
        assert_eq!(Verdict::from_wire("maybe"), None);
        assert_eq!(Verdict::Allow.as_wire(), "y");
        assert_eq!(Verdict::Deny.as_wire(), "n");
    }
}
