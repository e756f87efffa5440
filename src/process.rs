//! Game process detection
//!
//! Edits must not happen while the game runs: it rewrites the profile on exit
//! and would silently undo them. On Linux the game runs under Wine/Proton, so
//! both the short `comm` name and the `exe` link target are checked.

use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::constants::process::{GAME_PROCESSES, PROC_DIR};

/// Kernel truncates `comm` to 15 bytes
const COMM_MAX_LEN: usize = 15;

/// A running process that matched one of the game executable names
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunningProcess {
    pub pid: u32,
    pub name: String,
    pub exe: Option<PathBuf>,
}

/// Precondition check consulted before any edit
pub trait ProcessGate {
    /// First running game process, if any
    fn running_process(&self) -> Option<RunningProcess>;

    fn is_running(&self) -> bool {
        self.running_process().is_some()
    }

    /// Poll until the game exits. Returns false if `max_wait` elapses first.
    fn wait_for_exit(&self, interval: Duration, max_wait: Option<Duration>) -> bool {
        let start = Instant::now();
        loop {
            let Some(process) = self.running_process() else {
                info!("Game process closed");
                return true;
            };
            debug!(pid = process.pid, "Game still running");

            if let Some(max) = max_wait
                && start.elapsed() >= max
            {
                warn!("Timeout waiting for game to close");
                return false;
            }
            thread::sleep(interval);
        }
    }
}

/// Scans procfs for game executables
#[derive(Debug, Clone)]
pub struct ProcScanner {
    proc_root: PathBuf,
    names: Vec<String>,
}

impl Default for ProcScanner {
    fn default() -> Self {
        Self::new(GAME_PROCESSES.iter().map(|s| s.to_string()).collect())
    }
}

impl ProcScanner {
    pub fn new(names: Vec<String>) -> Self {
        Self::with_root(PROC_DIR, names)
    }

    pub fn with_root(proc_root: impl Into<PathBuf>, names: Vec<String>) -> Self {
        let names = names.into_iter().map(|n| n.to_lowercase()).collect();
        Self {
            proc_root: proc_root.into(),
            names,
        }
    }

    fn matches(&self, candidate: &str) -> bool {
        let candidate = candidate.trim().to_lowercase();
        self.names.iter().any(|name| {
            // `comm` is truncated, so compare against the truncated name too
            *name == candidate
                || (candidate.len() == COMM_MAX_LEN && name.len() > COMM_MAX_LEN && name.starts_with(&candidate))
        })
    }

    fn inspect(&self, pid: u32, dir: &Path) -> Option<RunningProcess> {
        let exe = fs::read_link(dir.join("exe")).ok();
        let exe_name = exe
            .as_ref()
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned());

        if let Some(name) = exe_name.filter(|n| self.matches(n)) {
            return Some(RunningProcess { pid, name, exe });
        }

        let comm = fs::read_to_string(dir.join("comm")).ok()?;
        let comm = comm.trim();
        self.matches(comm).then(|| RunningProcess {
            pid,
            name: comm.to_string(),
            exe,
        })
    }
}

impl ProcessGate for ProcScanner {
    fn running_process(&self) -> Option<RunningProcess> {
        let entries = match fs::read_dir(&self.proc_root) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(path = %self.proc_root.display(), error = %e, "Cannot scan processes");
                return None;
            }
        };

        entries.filter_map(|entry| entry.ok()).find_map(|entry| {
            let pid: u32 = entry.file_name().to_str()?.parse().ok()?;
            let found = self.inspect(pid, &entry.path())?;
            info!(pid = found.pid, name = %found.name, "Game process is running");
            Some(found)
        })
    }
}
