//! Operator-configurable detection ruleset.
//!
//! Classification precedence:
//! 1. An explicit allow-list hit (exact path or exact name) suppresses
//!    suspicion entirely.
//! 2. A case-insensitive substring match against the suspicious-name list
//!    yields suspicious, overriding directory exclusion.
//! 3. Otherwise the executable path must be outside every ignored prefix
//!    and under a monitored prefix.
//!
//! All comparisons are on trimmed, lower-cased text.

use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionRuleset {
    /// Directory prefixes whose executables are treated as suspicious.
    pub monitored_dirs: Vec<String>,
    /// Directory prefixes exempt from the monitored-directory rule.
    pub ignored_dirs: Vec<String>,
    /// Substrings matched against process names, any case.
    pub suspicious_names: Vec<String>,
    /// Exact paths or names that are never suspicious.
    pub allowed: Vec<String>,
}

impl Default for DetectionRuleset {
    fn default() -> Self {
        Self {
            monitored_dirs: vec![r"c:\".to_string()],
            ignored_dirs: vec![
                r"c:\windows\".to_string(),
                r"c:\programdata\".to_string(),
                r"c:\program files\".to_string(),
                r"c:\program files (x86)\".to_string(),
            ],
            suspicious_names: default_suspicious_names(),
            allowed: Vec::new(),
        }
    }
}

/// Curated list of process names commonly abused for execution, download,
/// persistence or defense evasion on Windows hosts.
fn default_suspicious_names() -> Vec<String> {
    [
        // Script hosts and shells
        "powershell",
        "powershell_ise.exe",
        "cmd.exe",
        "wscript",
        "cscript",
        "mshta",
        // DLL / COM execution proxies
        "rundll32",
        "regsvr32",
        "installutil.exe",
        // Download and staging utilities
        "bitsadmin",
        "certutil",
        "ftp.exe",
        // WMI and scheduling (persistence)
        "wmic",
        "schtasks.exe",
        "at.exe",
        "taskhost.exe",
        "taskeng.exe",
        // Registry and system configuration
        "reg.exe",
        "regedit.exe",
        "netsh.exe",
        "net.exe",
        "msiexec.exe",
        // Backup tampering
        "vssadmin.exe",
        "conhost.exe",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl DetectionRuleset {
    /// Load a ruleset from a JSON file; entries are normalized on load.
    pub fn load(path: &Path) -> io::Result<Self> {
        let raw = fs::read_to_string(path)?;
        let ruleset: DetectionRuleset = serde_json::from_str(&raw)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        Ok(ruleset.normalized())
    }

    /// Lower-case and trim every entry so runtime comparisons stay cheap.
    pub fn normalized(mut self) -> Self {
        let norm = |list: &mut Vec<String>| {
            for entry in list.iter_mut() {
                *entry = entry.trim().to_lowercase();
            }
        };
        norm(&mut self.monitored_dirs);
        norm(&mut self.ignored_dirs);
        norm(&mut self.suspicious_names);
        norm(&mut self.allowed);
        self
    }

    /// Classify one process. Returns true when it should be contained.
    pub fn classify(&self, name: &str, exe_path: &str) -> bool {
        let name = name.trim().to_lowercase();
        let path = exe_path.trim().to_lowercase();

        // Explicit allow-list always wins.
        if self.allowed.iter().any(|a| *a == name || *a == path) {
            return false;
        }

        // A suspicious-name match overrides directory exclusion.
        if self.suspicious_names.iter().any(|s| name.contains(s.as_str())) {
            return true;
        }

        if self.ignored_dirs.iter().any(|d| path.starts_with(d.as_str())) {
            return false;
        }

        self.monitored_dirs.iter().any(|d| path.starts_with(d.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn ruleset() -> DetectionRuleset {
        DetectionRuleset::default()
    }

    #[test]
    fn name_match_is_case_insensitive() {
        let r = ruleset();
        assert!(r.classify("CMD.exe", r"c:\users\dev\cmd.exe"));
        assert!(r.classify("PowerShell", r"c:\users\dev\ps.exe"));
    }

    #[test]
    fn name_match_overrides_ignored_directory() {
        let r = ruleset();
        // Lives under an ignored prefix, but the name matches the list.
        assert!(r.classify("cmd.exe", r"C:\Windows\System32\cmd.exe"));
    }

    #[test]
    fn ignored_prefix_suppresses_non_matching_names() {
        let r = ruleset();
        assert!(!r.classify("notepad.exe", r"c:\windows\system32\notepad.exe"));
        assert!(!r.classify("app.exe", r"c:\program files\vendor\app.exe"));
    }

    #[test]
    fn monitored_prefix_flags_unknown_executables() {
        let r = ruleset();
        assert!(r.classify("dropper.exe", r"c:\users\dev\downloads\dropper.exe"));
    }

    #[test]
    fn path_outside_monitored_dirs_is_clean() {
        let r = ruleset();
        assert!(!r.classify("app.exe", r"d:\games\app.exe"));
    }

    #[test]
    fn allow_list_suppresses_everything() {
        let mut r = ruleset();
        r.allowed.push("cmd.exe".to_string());
        r.allowed.push(r"c:\users\dev\tool.exe".to_string());
        // Name on the suspicious list, but explicitly allowed.
        assert!(!r.classify("cmd.exe", r"c:\users\dev\cmd.exe"));
        // Exact path allowed even under a monitored prefix.
        assert!(!r.classify("tool.exe", r"C:\Users\dev\tool.exe"));
        // The allow-list is exact, not a substring match.
        assert!(r.classify("cmd.exe.bak", r"c:\users\dev\cmd.exe.bak"));
    }

    #[test]
    fn loads_and_normalizes_from_json() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(
            file,
            r#"{{
                "monitored_dirs": ["C:\\Lab\\"],
                "ignored_dirs": [],
                "suspicious_names": ["  EvilTool  "],
                "allowed": []
            }}"#
        )
        .expect("write ruleset");

        let r = DetectionRuleset::load(file.path()).expect("load ruleset");
        assert!(r.classify("eviltool.exe", r"d:\anywhere\eviltool.exe"));
        assert!(r.classify("benign.exe", r"c:\lab\benign.exe"));
        assert!(!r.classify("benign.exe", r"d:\benign.exe"));
    }
}
