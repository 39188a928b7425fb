use crate::command::{ExitCode, Pipeline};
use crate::config::Config;
use crate::job::{ForegroundRegistry, JobOutcome};
use crate::launcher::{LaunchError, launch};
use crate::lexer::tokenize;
use crate::parser::{BuildError, build};
use crate::pipeline::launch_pipe;
use crate::signals::{RelayHandle, SignalRelay, reap_available};
use anyhow::Context;
use nix::sys::signal::Signal;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tracing::{debug, info};

/// Why a line was abandoned.
#[derive(Debug, Error)]
pub enum ShellError {
    #[error(transparent)]
    Build(#[from] BuildError),
    #[error(transparent)]
    Launch(#[from] LaunchError),
}

/// The shell's main loop: read a line, build it, run it, repeat.
///
/// Example
/// ```no_run
/// use yash::{Config, Interpreter};
/// let mut sh = Interpreter::new(Config::default());
/// let outcome = sh.execute_line("echo hello | wc -w").unwrap();
/// assert_eq!(outcome.map(|o| o.exit_code()), Some(0));
/// ```
pub struct Interpreter {
    config: Config,
    foreground: ForegroundRegistry,
    last_status: ExitCode,
    /// Raised by the relay when an interrupt arrives at the prompt.
    interrupted: Arc<AtomicBool>,
}

impl Interpreter {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            foreground: ForegroundRegistry::new(),
            last_status: 0,
            interrupted: Arc::new(AtomicBool::new(false)),
        }
    }

    /// The registry the relay reads to find the foreground job.
    pub fn foreground(&self) -> &ForegroundRegistry {
        &self.foreground
    }

    /// Exit code of the most recent line that ran.
    pub fn last_status(&self) -> ExitCode {
        self.last_status
    }

    /// Tokenizes, builds and runs one line.
    ///
    /// A blank line is not an error and yields `Ok(None)`. On error nothing was
    /// spawned (build errors) or the line was abandoned part way (launch errors);
    /// either way the shell can carry on.
    pub fn execute_line(&mut self, line: &str) -> Result<Option<JobOutcome>, ShellError> {
        let tokens = tokenize(line);
        if tokens.is_empty() {
            return Ok(None);
        }
        let pipeline = build(&tokens)?;
        debug!(%pipeline, "built");

        let outcome = match &pipeline {
            Pipeline::Single(cmd) => launch(cmd, &self.foreground)?,
            Pipeline::Pair(left, right) => launch_pipe(left, right, &self.foreground)?,
        };
        if let JobOutcome::Stopped(signal) = outcome {
            eprintln!("\nyash: stopped ({signal}): {pipeline}");
        }
        self.last_status = outcome.exit_code();
        Ok(Some(outcome))
    }

    /// Runs one line, reporting errors the same way as the REPL, and returns the
    /// status to exit with.
    pub fn run_once(&mut self, line: &str) -> ExitCode {
        match self.execute_line(line) {
            Ok(_) => self.last_status,
            Err(e) => {
                eprintln!("yash: {e}");
                1
            }
        }
    }

    /// Starts the signal relay thread for this shell's foreground registry.
    ///
    /// An interrupt at the prompt marks the line being read as abandoned; the
    /// REPL drops it instead of running it.
    pub fn start_relay(&self) -> anyhow::Result<RelayHandle> {
        let interrupted = self.interrupted.clone();
        let relay = SignalRelay::new(
            self.foreground.clone(),
            Box::new(move |_: Signal| {
                interrupted.store(true, Ordering::SeqCst);
                let mut stdout = std::io::stdout();
                let _ = stdout.write_all(b"\n");
                let _ = stdout.flush();
            }),
        );
        relay.spawn().context("cannot install signal handlers")
    }

    /// Interactive read-eval loop. Returns on end of input.
    pub fn repl(&mut self) -> anyhow::Result<()> {
        let mut rl = DefaultEditor::new().context("cannot initialise the line editor")?;
        let relay = self.start_relay()?;

        loop {
            self.interrupted.store(false, Ordering::SeqCst);
            match rl.readline(&self.config.prompt) {
                Ok(line) if self.interrupted.swap(false, Ordering::SeqCst) => {
                    debug!(%line, "discarding interrupted line");
                }
                Ok(line) => {
                    if let Err(e) = self.execute_line(&line) {
                        eprintln!("yash: {e}");
                    }
                    // Children that changed state while a foreground job held the
                    // registry had their SIGCHLD deferred to here.
                    reap_available();
                }
                Err(ReadlineError::Interrupted) => continue,
                Err(ReadlineError::Eof) => {
                    info!("end of input");
                    break;
                }
                Err(err) => {
                    relay.stop();
                    return Err(err).context("cannot read input");
                }
            }
        }

        relay.stop();
        Ok(())
    }
}
