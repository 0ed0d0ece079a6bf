//! Decision executor: applies resolved verdicts to contained processes.
//!
//! Allow resumes, Deny terminates. Both are best-effort: the containment
//! value was captured at suspend time, so a process that already vanished
//! or a permission failure is a logged loss, never a fatal error and never
//! retried.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::process_ctl::ProcessControl;
use crate::types::{ResolvedDecision, Verdict};

pub struct DecisionExecutor {
    ctl: Arc<dyn ProcessControl>,
}

impl DecisionExecutor {
    pub fn new(ctl: Arc<dyn ProcessControl>) -> Self {
        Self { ctl }
    }

    /// Apply one decision.
    pub fn apply(&self, decision: &ResolvedDecision) {
        let pid = decision.event.pid;
        match decision.verdict {
            Verdict::Allow => match self.ctl.resume(pid) {
                Ok(()) => log::info!(
                    "[RELEASED] {} (pid {}) resumed, local id {}",
                    decision.event.exe_path, pid, decision.local_id
                ),
                Err(e) => log::error!("failed to resume pid {}: {}", pid, e),
            },
            Verdict::Deny => match self.ctl.terminate(pid) {
                Ok(()) => log::warn!(
                    "[TERMINATED] {} (pid {}) killed, local id {}",
                    decision.event.exe_path, pid, decision.local_id
                ),
                Err(e) => log::error!("failed to terminate pid {}: {}", pid, e),
            },
        }
    }

    /// Consume decisions until the channel closes.
    pub async fn run(self, mut decisions: mpsc::Receiver<ResolvedDecision>) {
        while let Some(decision) = decisions.recv().await {
            self.apply(&decision);
        }
        log::info!("decision executor stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process_ctl::CtlError;
    use crate::types::SuspicionEvent;
    use chrono::Utc;
    use parking_lot::Mutex;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Call {
        Resume(u32),
        Terminate(u32),
    }

    #[derive(Default)]
    struct RecordingControl {
        calls: Mutex<Vec<Call>>,
        fail: bool,
    }

    impl ProcessControl for RecordingControl {
        fn suspend(&self, _pid: u32) -> Result<(), CtlError> {
            Ok(())
        }

        fn resume(&self, pid: u32) -> Result<(), CtlError> {
            self.calls.lock().push(Call::Resume(pid));
            if self.fail {
                return Err(CtlError::ProcessNotFound { pid });
            }
            Ok(())
        }

        fn terminate(&self, pid: u32) -> Result<(), CtlError> {
            self.calls.lock().push(Call::Terminate(pid));
            if self.fail {
                return Err(CtlError::ProcessNotFound { pid });
            }
            Ok(())
        }
    }

    fn decision(pid: u32, verdict: Verdict) -> ResolvedDecision {
        ResolvedDecision {
            local_id: 1,
            verdict,
            event: SuspicionEvent {
                process_name: "cmd.exe".to_string(),
                exe_path: r"c:\users\dev\cmd.exe".to_string(),
                pid,
                source_ip: "192.168.2.50".to_string(),
                hostname: "WKS-01".to_string(),
                detected_at: Utc::now(),
            },
        }
    }

    #[test]
    fn allow_resumes_and_deny_terminates() {
        let ctl = Arc::new(RecordingControl::default());
        let executor = DecisionExecutor::new(ctl.clone());

        executor.apply(&decision(4321, Verdict::Allow));
        executor.apply(&decision(9999, Verdict::Deny));

        assert_eq!(
            *ctl.calls.lock(),
            vec![Call::Resume(4321), Call::Terminate(9999)]
        );
    }

    #[test]
    fn capability_failure_is_tolerated() {
        let ctl = Arc::new(RecordingControl {
            fail: true,
            ..Default::default()
        });
        let executor = DecisionExecutor::new(ctl.clone());

        // Must not panic or propagate.
        executor.apply(&decision(1, Verdict::Allow));
        executor.apply(&decision(2, Verdict::Deny));
        assert_eq!(ctl.calls.lock().len(), 2);
    }
}
