//! Relays interactive signals to the foreground job and reaps finished children.
//!
//! Signals are picked up by `signal-hook` and handled on a dedicated thread, so
//! none of the logic here runs in signal-handler context.

use crate::job::{ForegroundJob, ForegroundRegistry, syscall};
use nix::errno::Errno;
use nix::sys::signal::{Signal, killpg};
use nix::sys::wait::{WaitPidFlag, WaitStatus, waitpid};
use nix::unistd::Pid;
use signal_hook::consts::{SIGCHLD, SIGINT, SIGTSTP};
use signal_hook::iterator::{Handle, Signals};
use std::io;
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

/// Callback run when an interactive signal arrives while the shell owns the
/// foreground, typically to throw away the half-typed line.
pub type IdleInterrupt = Box<dyn Fn(Signal) + Send + 'static>;

/// What the relay did with one signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayAction {
    /// Forwarded to the foreground process group.
    Forwarded(Signal, Pid),
    /// No foreground job; the prompt was reset.
    ResetPrompt,
    /// Collected this many child status changes.
    Reaped(usize),
    /// A launch or a foreground job owns the registry; the main loop sweeps
    /// once the line is done.
    Deferred,
    Ignored,
}

pub struct SignalRelay {
    foreground: ForegroundRegistry,
    on_idle: IdleInterrupt,
}

impl SignalRelay {
    pub fn new(foreground: ForegroundRegistry, on_idle: IdleInterrupt) -> Self {
        Self { foreground, on_idle }
    }

    /// Handles one delivered signal.
    pub fn handle(&self, signal: Signal) -> RelayAction {
        match signal {
            Signal::SIGINT | Signal::SIGTSTP => self.relay(signal),
            Signal::SIGCHLD => match self.foreground.get() {
                ForegroundJob::None => RelayAction::Reaped(reap_available()),
                ForegroundJob::Launching | ForegroundJob::Group(_) => RelayAction::Deferred,
            },
            _ => RelayAction::Ignored,
        }
    }

    fn relay(&self, signal: Signal) -> RelayAction {
        match self.foreground.get() {
            ForegroundJob::Group(pgid) => {
                debug!(%signal, %pgid, "forwarding signal");
                if let Err(e) = killpg(pgid, signal) {
                    // ESRCH: the group finished between the read and the kill.
                    debug!(%pgid, "forwarding {signal} failed: {e}");
                }
                RelayAction::Forwarded(signal, pgid)
            }
            ForegroundJob::Launching => {
                debug!("{signal} arrived between forks, dropped");
                RelayAction::Ignored
            }
            ForegroundJob::None => {
                (self.on_idle)(signal);
                RelayAction::ResetPrompt
            }
        }
    }

    /// Starts the relay thread for SIGINT, SIGTSTP and SIGCHLD.
    ///
    /// Registering replaces the default disposition, so from here on the shell
    /// itself is neither interrupted nor stopped by those signals.
    pub fn spawn(self) -> io::Result<RelayHandle> {
        let mut signals = Signals::new([SIGINT, SIGTSTP, SIGCHLD])?;
        let handle = signals.handle();
        let thread = thread::Builder::new()
            .name("signal-relay".into())
            .spawn(move || {
                for raw in signals.forever() {
                    match Signal::try_from(raw) {
                        Ok(signal) => {
                            let action = self.handle(signal);
                            debug!(?action, "handled {signal}");
                        }
                        Err(e) => warn!(raw, "unknown signal: {e}"),
                    }
                }
            })?;
        Ok(RelayHandle { handle, thread })
    }
}

/// Collects every child status that is available right now without blocking.
/// Returns how many were collected.
pub fn reap_available() -> usize {
    let flags = WaitPidFlag::WNOHANG | WaitPidFlag::WUNTRACED | WaitPidFlag::WCONTINUED;
    let mut reaped = 0;
    loop {
        match syscall(|| waitpid(Pid::from_raw(-1), Some(flags))) {
            Ok(WaitStatus::StillAlive) | Err(Errno::ECHILD) => return reaped,
            Ok(status) => {
                reaped += 1;
                log_status(status);
            }
            Err(e) => {
                warn!("waitpid failed: {e}");
                return reaped;
            }
        }
    }
}

fn log_status(status: WaitStatus) {
    match status {
        WaitStatus::Exited(pid, code) => info!(%pid, code, "child exited"),
        WaitStatus::Signaled(pid, signal, core) => info!(%pid, %signal, core, "child killed"),
        WaitStatus::Stopped(pid, signal) => info!(%pid, %signal, "child stopped"),
        WaitStatus::Continued(pid) => info!(%pid, "child continued"),
        other => debug!(?other, "child status"),
    }
}

/// Running relay thread. Dropping it leaves the thread running for the rest of
/// the process; call [`RelayHandle::stop`] to shut it down.
pub struct RelayHandle {
    handle: Handle,
    thread: JoinHandle<()>,
}

impl RelayHandle {
    pub fn stop(self) {
        self.handle.close();
        if self.thread.join().is_err() {
            warn!("signal relay thread panicked");
        }
    }
}
