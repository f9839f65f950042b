use std::thread;
use std::time::{Duration, Instant};

use sysinfo::{Pid, Process, ProcessStatus, ProcessesToUpdate, System};
use tracing::{debug, info, warn};

use super::ProcessReaper;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Kills running instances of the target application via the OS process table
#[derive(Debug, Clone)]
pub struct SystemProcessReaper {
    wait_timeout: Duration,
}

impl SystemProcessReaper {
    pub fn new(wait_timeout: Duration) -> Self {
        Self { wait_timeout }
    }
}

impl ProcessReaper for SystemProcessReaper {
    fn terminate_all(&self, process_name: &str) {
        let own_pid = sysinfo::get_current_pid().ok();
        let mut system = System::new();
        system.refresh_processes(ProcessesToUpdate::All, true);

        let mut pending: Vec<Pid> = Vec::new();
        for (pid, process) in system.processes() {
            if Some(*pid) == own_pid || !is_alive(process) {
                continue;
            }
            if !matches_process_name(&process.name().to_string_lossy(), process_name) {
                continue;
            }
            if process.kill() {
                info!(pid = pid.as_u32(), name = process_name, "terminated process");
                pending.push(*pid);
            } else {
                warn!(pid = pid.as_u32(), name = process_name, "could not signal process");
            }
        }

        if pending.is_empty() {
            debug!(name = process_name, "no running instances");
            return;
        }

        let deadline = Instant::now() + self.wait_timeout;
        while !pending.is_empty() {
            if Instant::now() >= deadline {
                warn!(
                    remaining = pending.len(),
                    "processes still running after {:?}, continuing anyway", self.wait_timeout
                );
                return;
            }
            thread::sleep(POLL_INTERVAL);
            system.refresh_processes(ProcessesToUpdate::Some(&pending), true);
            pending.retain(|pid| system.process(*pid).is_some_and(is_alive));
        }
    }
}

/// Killed processes linger as zombies until their parent reaps them
fn is_alive(process: &Process) -> bool {
    process.status() != ProcessStatus::Zombie
}

/// Compare process names the way the OS presents them: case-insensitive,
/// ignoring a trailing `.exe`.
pub fn matches_process_name(candidate: &str, target: &str) -> bool {
    fn stem(name: &str) -> &str {
        let len = name.len();
        if len > 4 && name.is_char_boundary(len - 4) && name[len - 4..].eq_ignore_ascii_case(".exe") {
            &name[..len - 4]
        } else {
            name
        }
    }
    stem(candidate).eq_ignore_ascii_case(stem(target))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches_process_name() {
        assert!(matches_process_name("nocturn", "nocturn"));
        assert!(matches_process_name("Nocturn.exe", "nocturn"));
        assert!(matches_process_name("NOCTURN.EXE", "nocturn.exe"));
        assert!(!matches_process_name("nocturn-helper", "nocturn"));
        assert!(!matches_process_name("noct", "nocturn"));
        assert!(!matches_process_name(".exe", "nocturn"));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_terminate_kills_running_instance() {
        use std::process::{Child, Command};

        let dir = tempfile::tempdir().unwrap();
        let name = format!("ns{}", std::process::id());
        let exe = dir.path().join(&name);
        std::fs::copy("/bin/sleep", &exe).unwrap();

        // a concurrent fork can briefly hold the fresh copy open for writing
        let mut child: Option<Child> = None;
        for _ in 0..20 {
            match Command::new(&exe).arg("30").spawn() {
                Ok(c) => {
                    child = Some(c);
                    break;
                }
                Err(_) => thread::sleep(Duration::from_millis(50)),
            }
        }
        let mut child = child.expect("spawn copied sleep");
        thread::sleep(Duration::from_millis(200));

        let reaper = SystemProcessReaper::new(Duration::from_secs(10));
        let started = Instant::now();
        reaper.terminate_all(&name.to_uppercase());
        let elapsed = started.elapsed();

        let status = child.try_wait().unwrap();
        if status.is_none() {
            let _ = child.kill();
            let _ = child.wait();
        }
        assert!(status.is_some(), "process survived terminate_all");
        assert!(elapsed < Duration::from_secs(5), "waited {:?}", elapsed);
    }

    #[test]
    fn test_terminate_unknown_name_is_noop() {
        let reaper = SystemProcessReaper::new(Duration::from_millis(200));
        let started = Instant::now();
        reaper.terminate_all("definitely-not-a-running-process-4b1d");
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
