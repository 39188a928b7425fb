//! Runs a single command in its own process group.

use crate::command::Command;
use crate::external::{ExternalCommand, PipeEnd};
use crate::job::{ForegroundRegistry, JobOutcome, syscall, wait_for};
use nix::errno::Errno;
use nix::unistd::{ForkResult, Pid, fork, setpgid};
use std::ffi::NulError;
use thiserror::Error;
use tracing::{debug, info};

/// Resource errors that abandon a line before (or while) its children start.
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("argument contains a NUL byte")]
    InvalidArgument(#[from] NulError),
    #[error("cannot create pipe: {0}")]
    Pipe(#[source] Errno),
    #[error("cannot fork: {0}")]
    Fork(#[source] Errno),
    #[error("wait failed: {0}")]
    Wait(#[source] Errno),
}

/// Forks a child that becomes `external`. Returns the child's pid in the parent.
///
/// `pgid` of zero starts a new group led by the child; anything else joins that
/// group. Both sides call `setpgid` so the group exists before either one
/// depends on it.
pub(crate) fn spawn(
    external: &ExternalCommand,
    pgid: Pid,
    pipe: Option<PipeEnd>,
) -> Result<Pid, LaunchError> {
    // SAFETY: the child only makes system calls before execvp or _exit.
    match syscall(|| unsafe { fork() }).map_err(LaunchError::Fork)? {
        ForkResult::Parent { child } => {
            let group = if pgid.as_raw() == 0 { child } else { pgid };
            // EACCES once the child has already exec'd; its own call covered it.
            let _ = setpgid(child, group);
            debug!(%child, pgid = %group, "forked");
            Ok(child)
        }
        ForkResult::Child => external.exec_child(pgid, pipe),
    }
}

/// Runs `cmd` as a child process.
///
/// The registry reads [`ForegroundJob::Launching`] across the fork, then holds
/// a foreground command's group for exactly as long as the shell waits on it. A
/// background command returns immediately with the registry cleared; its exit is
/// collected later by the signal relay or by the caller's next
/// [`reap_available`](crate::signals::reap_available) sweep.
///
/// [`ForegroundJob::Launching`]: crate::job::ForegroundJob::Launching
pub fn launch(cmd: &Command, foreground: &ForegroundRegistry) -> Result<JobOutcome, LaunchError> {
    let external = ExternalCommand::new(cmd)?;
    let launching = foreground.begin_launch();
    let child = spawn(&external, Pid::from_raw(0), None)?;

    if cmd.background {
        drop(launching);
        info!(pgid = %child, command = %cmd, "started in background");
        return Ok(JobOutcome::Background(child));
    }

    launching.hand_to(child);
    wait_for(child).map_err(LaunchError::Wait)
}
