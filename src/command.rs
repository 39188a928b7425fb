use std::fmt;

/// Conventional process exit code type used by this crate.
///
/// A value of 0 indicates success; any non-zero value indicates failure.
/// Termination by a signal is reported as `128 + signal`, the way POSIX shells do.
pub type ExitCode = i32;

/// One of the three standard streams a command can redirect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Stdin,
    Stdout,
    Stderr,
}

impl Stream {
    /// The operator that redirects this stream.
    pub fn operator(self) -> &'static str {
        match self {
            Stream::Stdin => "<",
            Stream::Stdout => ">",
            Stream::Stderr => "2>",
        }
    }
}

impl fmt::Display for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.operator())
    }
}

/// A validated simple command: program and arguments, optional redirections and
/// the background flag.
///
/// Only the command builder in [`crate::parser`] produces values with a non-empty
/// `argv`; everything downstream relies on that.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Command {
    /// Program name first, arguments after.
    pub argv: Vec<String>,
    pub in_target: Option<String>,
    pub out_target: Option<String>,
    pub err_target: Option<String>,
    pub background: bool,
}

impl Command {
    pub fn target(&self, stream: Stream) -> Option<&str> {
        match stream {
            Stream::Stdin => self.in_target.as_deref(),
            Stream::Stdout => self.out_target.as_deref(),
            Stream::Stderr => self.err_target.as_deref(),
        }
    }

    pub(crate) fn target_mut(&mut self, stream: Stream) -> &mut Option<String> {
        match stream {
            Stream::Stdin => &mut self.in_target,
            Stream::Stdout => &mut self.out_target,
            Stream::Stderr => &mut self.err_target,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.argv.join(" "))?;
        for stream in [Stream::Stdin, Stream::Stdout, Stream::Stderr] {
            if let Some(target) = self.target(stream) {
                write!(f, " {stream} {target}")?;
            }
        }
        if self.background {
            f.write_str(" &")?;
        }
        Ok(())
    }
}

/// Everything one input line asks the shell to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pipeline {
    /// A single command.
    Single(Command),
    /// Two commands, the first one's stdout feeding the second one's stdin.
    Pair(Command, Command),
}

impl Pipeline {
    /// A pipe pair runs in the background when either side carries `&`.
    pub fn is_background(&self) -> bool {
        match self {
            Pipeline::Single(cmd) => cmd.background,
            Pipeline::Pair(left, right) => left.background || right.background,
        }
    }
}

impl fmt::Display for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pipeline::Single(cmd) => write!(f, "{cmd}"),
            Pipeline::Pair(left, right) => write!(f, "{left} | {right}"),
        }
    }
}
