//! Foreground job bookkeeping shared between the main loop and the signal relay.

use crate::command::ExitCode;
use nix::errno::Errno;
use nix::sys::signal::Signal;
use nix::sys::wait::{WaitPidFlag, WaitStatus, waitpid};
use nix::unistd::Pid;
use std::sync::Arc;
use std::sync::atomic::{AtomicI32, Ordering};
use tracing::{debug, trace};

/// Who currently owns the foreground.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForegroundJob {
    /// The shell itself: interactive signals reset the prompt.
    None,
    /// Children are being forked and no group is waited on yet. Reaping is held
    /// back so a fast child cannot vanish before its group is complete.
    Launching,
    /// A process group started by the shell and waited on by the main loop.
    Group(Pid),
}

impl ForegroundJob {
    fn encode(self) -> i32 {
        match self {
            ForegroundJob::None => 0,
            ForegroundJob::Launching => -1,
            ForegroundJob::Group(pgid) => pgid.as_raw(),
        }
    }

    fn decode(raw: i32) -> Self {
        match raw {
            -1 => ForegroundJob::Launching,
            raw if raw > 0 => ForegroundJob::Group(Pid::from_raw(raw)),
            _ => ForegroundJob::None,
        }
    }
}

/// Single-word register holding the current [`ForegroundJob`].
///
/// The main loop is the only writer; the signal relay only reads. Every update is
/// one atomic store, so a reader sees either the old or the new owner.
#[derive(Debug, Clone, Default)]
pub struct ForegroundRegistry {
    cell: Arc<AtomicI32>,
}

impl ForegroundRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> ForegroundJob {
        ForegroundJob::decode(self.cell.load(Ordering::SeqCst))
    }

    pub fn set(&self, job: ForegroundJob) {
        trace!(?job, "foreground changed");
        self.cell.store(job.encode(), Ordering::SeqCst);
    }

    pub fn clear(&self) {
        self.set(ForegroundJob::None);
    }

    /// Registers `pgid` as the foreground group until the returned guard is dropped.
    pub fn claim(&self, pgid: Pid) -> ForegroundGuard<'_> {
        self.set(ForegroundJob::Group(pgid));
        ForegroundGuard { registry: self }
    }

    /// Marks a launch in progress until the returned guard is dropped or handed
    /// to the job's group with [`ForegroundGuard::hand_to`].
    pub fn begin_launch(&self) -> ForegroundGuard<'_> {
        self.set(ForegroundJob::Launching);
        ForegroundGuard { registry: self }
    }
}

/// Clears the registry when dropped, whatever way the wait ended.
#[must_use = "the foreground is released as soon as the guard is dropped"]
pub struct ForegroundGuard<'a> {
    registry: &'a ForegroundRegistry,
}

impl ForegroundGuard<'_> {
    /// Makes `pgid` the foreground group for the rest of the guard's life.
    pub fn hand_to(&self, pgid: Pid) {
        self.registry.set(ForegroundJob::Group(pgid));
    }
}

impl Drop for ForegroundGuard<'_> {
    fn drop(&mut self) {
        self.registry.clear();
    }
}

/// How a launched line ended, as far as the main loop saw it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    Exited(i32),
    Signaled(Signal),
    /// Stopped by a signal. The job is left stopped; nothing tracks it further.
    Stopped(Signal),
    /// Launched with `&`; the payload is the job's process group.
    Background(Pid),
    /// The status was already collected by the asynchronous reaper.
    Reaped,
}

impl JobOutcome {
    pub fn exit_code(self) -> ExitCode {
        match self {
            JobOutcome::Exited(code) => code,
            JobOutcome::Signaled(sig) | JobOutcome::Stopped(sig) => 128 + sig as i32,
            JobOutcome::Background(_) | JobOutcome::Reaped => 0,
        }
    }

    pub(crate) fn from_status(status: WaitStatus) -> Self {
        match status {
            WaitStatus::Exited(_, code) => JobOutcome::Exited(code),
            WaitStatus::Signaled(_, sig, _) => JobOutcome::Signaled(sig),
            WaitStatus::Stopped(_, sig) => JobOutcome::Stopped(sig),
            _ => JobOutcome::Reaped,
        }
    }
}

/// Retries a system call interrupted by a signal.
pub(crate) fn syscall<F, T>(f: F) -> nix::Result<T>
where
    F: Fn() -> nix::Result<T>,
{
    loop {
        match f() {
            Err(Errno::EINTR) => (),
            result => return result,
        }
    }
}

/// Blocks until `pid` exits, is killed, or stops.
///
/// `ECHILD` means the reaper got to the child first; that is reported as
/// [`JobOutcome::Reaped`] rather than as an error.
pub fn wait_for(pid: Pid) -> nix::Result<JobOutcome> {
    loop {
        match syscall(|| waitpid(pid, Some(WaitPidFlag::WUNTRACED))) {
            Ok(WaitStatus::Continued(_)) => continue,
            Ok(status) => {
                debug!(?status, "child changed state");
                return Ok(JobOutcome::from_status(status));
            }
            Err(Errno::ECHILD) => {
                debug!(%pid, "child already reaped");
                return Ok(JobOutcome::Reaped);
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn registry_starts_empty() {
        assert_eq!(ForegroundRegistry::new().get(), ForegroundJob::None);
    }

    #[test]
    fn set_and_clear_round_trip() {
        let registry = ForegroundRegistry::new();
        registry.set(ForegroundJob::Group(Pid::from_raw(4242)));
        assert_eq!(registry.get(), ForegroundJob::Group(Pid::from_raw(4242)));
        registry.clear();
        assert_eq!(registry.get(), ForegroundJob::None);
    }

    #[test]
    fn guard_clears_on_drop() {
        let registry = ForegroundRegistry::new();
        {
            let _guard = registry.claim(Pid::from_raw(77));
            assert_eq!(registry.get(), ForegroundJob::Group(Pid::from_raw(77)));
        }
        assert_eq!(registry.get(), ForegroundJob::None);
    }

    #[test]
    fn launch_guard_hands_over_then_clears() {
        let registry = ForegroundRegistry::new();
        {
            let guard = registry.begin_launch();
            assert_eq!(registry.get(), ForegroundJob::Launching);
            guard.hand_to(Pid::from_raw(31));
            assert_eq!(registry.get(), ForegroundJob::Group(Pid::from_raw(31)));
        }
        assert_eq!(registry.get(), ForegroundJob::None);
    }

    #[test]
    fn clones_share_the_same_cell() {
        let registry = ForegroundRegistry::new();
        let reader = registry.clone();
        let guard = registry.claim(Pid::from_raw(1234));
        let seen = thread::spawn(move || reader.get()).join().unwrap();
        assert_eq!(seen, ForegroundJob::Group(Pid::from_raw(1234)));
        drop(guard);
        assert_eq!(registry.get(), ForegroundJob::None);
    }

    #[test]
    fn exit_codes_follow_shell_conventions() {
        assert_eq!(JobOutcome::Exited(3).exit_code(), 3);
        assert_eq!(JobOutcome::Signaled(Signal::SIGINT).exit_code(), 130);
        assert_eq!(JobOutcome::Stopped(Signal::SIGTSTP).exit_code(), 148);
        assert_eq!(JobOutcome::Background(Pid::from_raw(9)).exit_code(), 0);
        assert_eq!(JobOutcome::Reaped.exit_code(), 0);
    }

    #[test]
    fn waiting_on_a_stranger_reports_reaped() {
        // Our own pid is never a child of ours.
        assert_eq!(wait_for(Pid::this()), Ok(JobOutcome::Reaped));
    }
}
