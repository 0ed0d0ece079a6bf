//! Containment capability: the narrow OS seam for suspend/resume/terminate.
//!
//! Core logic only ever talks to the `ProcessControl` trait; the platform
//! backend shells out to the OS tools so no process-handle plumbing leaks
//! into the detection or decision paths.

use std::fmt;
use std::process::Command;

/// Injected containment backend.
pub trait ProcessControl: Send + Sync {
    fn suspend(&self, pid: u32) -> Result<(), CtlError>;
    fn resume(&self, pid: u32) -> Result<(), CtlError>;
    fn terminate(&self, pid: u32) -> Result<(), CtlError>;
}

#[derive(Debug, Clone)]
pub enum CtlError {
    ProcessNotFound { pid: u32 },
    CommandFailed { command: String, detail: String },
    Io(String),
}

impl fmt::Display for CtlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ProcessNotFound { pid } => write!(f, "process {} not found", pid),
            Self::CommandFailed { command, detail } => {
                write!(f, "{} failed: {}", command, detail)
            }
            Self::Io(e) => write!(f, "io error: {}", e),
        }
    }
}

impl std::error::Error for CtlError {}

/// Default backend using the platform's own process tooling.
pub struct SystemProcessControl;

impl ProcessControl for SystemProcessControl {
    fn suspend(&self, pid: u32) -> Result<(), CtlError> {
        platform::suspend(pid)
    }

    fn resume(&self, pid: u32) -> Result<(), CtlError> {
        platform::resume(pid)
    }

    fn terminate(&self, pid: u32) -> Result<(), CtlError> {
        platform::terminate(pid)
    }
}

#[cfg(windows)]
mod platform {
    use super::{run_checked, CtlError};

    // Suspension goes through NtSuspendProcess/NtResumeProcess; there is no
    // stock command-line tool for it, so a short PowerShell shim binds the
    // ntdll export. Requires elevation for processes of other users.
    fn nt_process_call(func: &str, pid: u32) -> Result<(), CtlError> {
        let script = format!(
            r#"
            $process = Get-Process -Id {pid} -ErrorAction SilentlyContinue
            if ($process) {{
                $signature = @"
                [DllImport("ntdll.dll", SetLastError = true)]
                public static extern int {func}(IntPtr processHandle);
"@
                $ntdll = Add-Type -MemberDefinition $signature -Name 'NtDll{func}' -Namespace 'Win32' -PassThru
                $result = $ntdll::{func}($process.Handle)
                if ($result -eq 0) {{ Write-Output "SUCCESS" }} else {{ Write-Output "FAILED:$result" }}
            }} else {{
                Write-Output "NOT_FOUND"
            }}
            "#
        );

        let stdout = run_checked(
            "powershell",
            &["-NoProfile", "-ExecutionPolicy", "Bypass", "-Command", &script],
        )?;

        if stdout.contains("SUCCESS") {
            Ok(())
        } else if stdout.contains("NOT_FOUND") {
            Err(CtlError::ProcessNotFound { pid })
        } else {
            Err(CtlError::CommandFailed {
                command: func.to_string(),
                detail: stdout,
            })
        }
    }

    pub fn suspend(pid: u32) -> Result<(), CtlError> {
        nt_process_call("NtSuspendProcess", pid)
    }

    pub fn resume(pid: u32) -> Result<(), CtlError> {
        nt_process_call("NtResumeProcess", pid)
    }

    pub fn terminate(pid: u32) -> Result<(), CtlError> {
        let pid_str = pid.to_string();
        run_checked("taskkill", &["/F", "/PID", &pid_str]).map(|_| ())
    }
}

#[cfg(unix)]
mod platform {
    use super::{run_checked, CtlError};

    fn signal(sig: &str, pid: u32) -> Result<(), CtlError> {
        let pid_str = pid.to_string();
        run_checked("kill", &[sig, &pid_str]).map(|_| ())
    }

    pub fn suspend(pid: u32) -> Result<(), CtlError> {
        signal("-STOP", pid)
    }

    pub fn resume(pid: u32) -> Result<(), CtlError> {
        signal("-CONT", pid)
    }

    pub fn terminate(pid: u32) -> Result<(), CtlError> {
        signal("-KILL", pid)
    }
}

/// Run a command, mapping a non-zero exit status to `CommandFailed`.
fn run_checked(command: &str, args: &[&str]) -> Result<String, CtlError> {
    let output = Command::new(command)
        .args(args)
        .output()
        .map_err(|e| CtlError::Io(e.to_string()))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        return Err(CtlError::CommandFailed {
            command: command.to_string(),
            detail: stderr,
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}
