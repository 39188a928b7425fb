//! File redirections applied inside a freshly forked child.

use crate::command::{Command, Stream};
use crate::job::syscall;
use nix::fcntl::{OFlag, open};
use nix::libc;
use nix::sys::stat::Mode;
use nix::unistd::{close, dup2};
use std::ffi::CString;
use std::os::fd::RawFd;

/// Permissions for files created by `>` and `2>`: rw-rw-r--, before the umask.
pub(crate) fn creation_mode() -> Mode {
    Mode::S_IRUSR | Mode::S_IWUSR | Mode::S_IRGRP | Mode::S_IWGRP | Mode::S_IROTH
}

/// One redirection, converted ahead of the fork so the child only makes system
/// calls.
#[derive(Debug, Clone)]
pub(crate) struct Redirection {
    pub(crate) stream: Stream,
    pub(crate) path: CString,
    /// `"yash: <path>: "`, ready for a failure report in the child.
    pub(crate) error_prefix: String,
}

impl Redirection {
    fn target_fd(&self) -> RawFd {
        match self.stream {
            Stream::Stdin => libc::STDIN_FILENO,
            Stream::Stdout => libc::STDOUT_FILENO,
            Stream::Stderr => libc::STDERR_FILENO,
        }
    }

    fn flags(&self) -> OFlag {
        match self.stream {
            Stream::Stdin => OFlag::O_RDONLY,
            Stream::Stdout | Stream::Stderr => OFlag::O_WRONLY | OFlag::O_CREAT | OFlag::O_TRUNC,
        }
    }

    /// Opens the target and moves it onto the matching standard descriptor.
    pub(crate) fn apply(&self) -> nix::Result<()> {
        let fd = syscall(|| open(self.path.as_c_str(), self.flags(), creation_mode()))?;
        let target = self.target_fd();
        if fd != target {
            syscall(|| dup2(fd, target))?;
            close(fd)?;
        }
        Ok(())
    }
}

/// Collects `cmd`'s redirections in the order they must be applied: stdin, stdout,
/// stderr. Fails on a target containing a NUL byte.
pub(crate) fn prepare(cmd: &Command) -> Result<Vec<Redirection>, std::ffi::NulError> {
    [Stream::Stdin, Stream::Stdout, Stream::Stderr]
        .into_iter()
        .filter_map(|stream| cmd.target(stream).map(|target| (stream, target)))
        .map(|(stream, target)| {
            let path = CString::new(target)?;
            Ok::<_, std::ffi::NulError>(Redirection {
                stream,
                path,
                error_prefix: format!("yash: {target}: "),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prepares_in_stream_order() {
        let cmd = Command {
            argv: vec!["cat".into()],
            in_target: Some("in".into()),
            out_target: None,
            err_target: Some("err".into()),
            background: false,
        };
        let redirections = prepare(&cmd).unwrap();
        let streams: Vec<Stream> = redirections.iter().map(|r| r.stream).collect();
        assert_eq!(streams, vec![Stream::Stdin, Stream::Stderr]);
        assert_eq!(redirections[1].path.as_bytes(), b"err");
        assert_eq!(redirections[1].error_prefix, "yash: err: ");
        assert_eq!(redirections[0].flags(), OFlag::O_RDONLY);
        assert!(redirections[1].flags().contains(OFlag::O_TRUNC));
    }

    #[test]
    fn nul_in_target_is_refused() {
        let cmd = Command {
            argv: vec!["cat".into()],
            out_target: Some("bad\0name".into()),
            ..Command::default()
        };
        assert!(prepare(&cmd).is_err());
    }

    #[test]
    fn creation_mode_is_0664() {
        assert_eq!(creation_mode().bits(), 0o664);
    }
}
