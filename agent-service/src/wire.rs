//! Wire line format for the stream transport.
//!
//! One suspicion event per line:
//!
//! ```text
//! [SUSPEITO] ID:<int>|Name:<str>|Path:<str>|PID:<int>|IP:<str>|Host:<str>
//! ```
//!
//! The server replies with a bare `y` or `n` line per event, in submission
//! order. The reply carries no id, which is why the correlator keeps the
//! pending-order sequence.

use crate::types::SuspicionEvent;

pub const SUSPECT_TAG: &str = "[SUSPEITO]";

/// Render one suspicion event as a wire line (no trailing newline).
pub fn format_suspect_line(local_id: u64, event: &SuspicionEvent) -> String {
    format!(
        "{} ID:{}|Name:{}|Path:{}|PID:{}|IP:{}|Host:{}",
        SUSPECT_TAG,
        local_id,
        event.process_name,
        event.exe_path,
        event.pid,
        event.source_ip,
        event.hostname,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn formats_the_documented_shape() {
        let event = SuspicionEvent {
            process_name: "cmd.exe".to_string(),
            exe_path: r"C:\Users\dev\cmd.exe".to_string(),
            pid: 4321,
            source_ip: "192.168.2.50".to_string(),
            hostname: "WKS-01".to_string(),
            detected_at: Utc::now(),
        };

        let line = format_suspect_line(1, &event);
        assert_eq!(
            line,
            r"[SUSPEITO] ID:1|Name:cmd.exe|Path:C:\Users\dev\cmd.exe|PID:4321|IP:192.168.2.50|Host:WKS-01"
        );
        assert!(!line.contains('\n'));
    }
}
