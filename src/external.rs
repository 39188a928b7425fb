use crate::command::Command;
use crate::job::syscall;
use crate::redirect::{self, Redirection};
use nix::errno::Errno;
use nix::libc;
use nix::sys::signal::{SaFlags, SigAction, SigHandler, SigSet, Signal, sigaction};
use nix::unistd::{Pid, close, dup2, setpgid};
use std::ffi::{CString, NulError};
use std::os::fd::RawFd;
use std::ptr;

/// Exit status of a child that could not set itself up or exec.
const CHILD_FAILURE: i32 = 1;

/// Program to exec, converted to C strings before the fork.
///
/// Everything the child needs is allocated here, in the parent: the argument
/// strings, the null-terminated pointer array `execvp` takes, and the prefix of
/// every error message. The child side only makes system calls.
#[derive(Debug)]
pub(crate) struct ExternalCommand {
    argv: Vec<CString>,
    /// Points into `argv`; the heap buffers do not move with the `Vec`.
    argv_ptrs: Vec<*const libc::c_char>,
    /// `"yash: <program>: "`.
    error_prefix: String,
    redirections: Vec<Redirection>,
}

/// One end of a pipe to install on a standard descriptor in the child.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PipeEnd {
    pub(crate) fd: RawFd,
    pub(crate) onto: RawFd,
    /// Both raw descriptors of the pipe; closed once `fd` has been duplicated.
    pub(crate) pair: [RawFd; 2],
}

impl ExternalCommand {
    pub(crate) fn new(cmd: &Command) -> Result<Self, NulError> {
        let argv = cmd
            .argv
            .iter()
            .map(|arg| CString::new(arg.as_str()))
            .collect::<Result<Vec<_>, _>>()?;
        let argv_ptrs = argv
            .iter()
            .map(|arg| arg.as_ptr())
            .chain([ptr::null()])
            .collect();
        Ok(Self {
            error_prefix: format!("yash: {}: ", cmd.argv[0]),
            argv,
            argv_ptrs,
            redirections: redirect::prepare(cmd)?,
        })
    }

    /// Turns the forked child into the command. Never returns.
    ///
    /// `pgid` of zero puts the child in a new group of its own. The pipe end, if
    /// any, is wired before the file redirections.
    pub(crate) fn exec_child(&self, pgid: Pid, pipe: Option<PipeEnd>) -> ! {
        // The parent makes the same call; whichever runs second is a no-op.
        let _ = setpgid(Pid::from_raw(0), pgid);
        restore_default_signals();

        if let Some(end) = pipe {
            if let Err(e) = syscall(|| dup2(end.fd, end.onto)) {
                die(&["yash: pipe: ", e.desc(), "\n"]);
            }
            for fd in end.pair {
                let _ = close(fd);
            }
        }

        for redirection in &self.redirections {
            if let Err(e) = redirection.apply() {
                die(&[redirection.error_prefix.as_str(), e.desc(), "\n"]);
            }
        }

        // SAFETY: `argv_ptrs` is null-terminated and points into the live `argv`.
        unsafe { libc::execvp(self.argv[0].as_ptr(), self.argv_ptrs.as_ptr()) };
        let reason = match Errno::last() {
            Errno::ENOENT => "command not found",
            other => other.desc(),
        };
        die(&[self.error_prefix.as_str(), reason, "\n"])
    }
}

/// Gives SIGINT and SIGTSTP back their default behavior in the child.
fn restore_default_signals() {
    let default = SigAction::new(SigHandler::SigDfl, SaFlags::empty(), SigSet::empty());
    for signal in [Signal::SIGINT, Signal::SIGTSTP] {
        // SAFETY: installing SIG_DFL runs no handler code.
        let _ = unsafe { sigaction(signal, &default) };
    }
}

/// Reports a child-side failure and leaves without running any parent state
/// destructors or atexit hooks. The message is written piece by piece so nothing
/// is allocated after the fork.
fn die(parts: &[&str]) -> ! {
    for part in parts {
        // SAFETY: write(2) is async-signal-safe and `part` outlives the call.
        unsafe { libc::write(libc::STDERR_FILENO, part.as_ptr().cast(), part.len()) };
    }
    // SAFETY: _exit(2) is async-signal-safe.
    unsafe { libc::_exit(CHILD_FAILURE) }
}
