//! Runs two commands connected by a pipe as one job.

use crate::command::Command;
use crate::external::{ExternalCommand, PipeEnd};
use crate::job::{ForegroundRegistry, JobOutcome, wait_for};
use crate::launcher::{LaunchError, spawn};
use nix::libc;
use nix::unistd::{Pid, pipe};
use std::os::fd::AsRawFd;
use tracing::{info, warn};

/// Runs `left | right`.
///
/// Both children share the process group led by the left child, so a forwarded
/// interrupt reaches the whole job. The parent's copies of the pipe are closed
/// as soon as both children exist; otherwise the reader would never see
/// end-of-file. The outcome is the right-hand command's.
///
/// Reaping is held back until both children exist, so the group led by the left
/// child is still there when the right one joins it, however fast the left one
/// exits. If the second fork fails the first child is left running and is
/// collected by the normal reaping path.
pub fn launch_pipe(
    left: &Command,
    right: &Command,
    foreground: &ForegroundRegistry,
) -> Result<JobOutcome, LaunchError> {
    let left_external = ExternalCommand::new(left)?;
    let right_external = ExternalCommand::new(right)?;
    let background = left.background || right.background;

    let (read, write) = pipe().map_err(LaunchError::Pipe)?;
    let pair = [read.as_raw_fd(), write.as_raw_fd()];

    let writer = PipeEnd {
        fd: write.as_raw_fd(),
        onto: libc::STDOUT_FILENO,
        pair,
    };
    let launching = foreground.begin_launch();
    let first = spawn(&left_external, Pid::from_raw(0), Some(writer))?;
    if !background {
        launching.hand_to(first);
    }

    let reader = PipeEnd {
        fd: read.as_raw_fd(),
        onto: libc::STDIN_FILENO,
        pair,
    };
    let second = spawn(&right_external, first, Some(reader));
    drop(read);
    drop(write);
    let second = second.inspect_err(|e| warn!(pgid = %first, "second pipe stage not started: {e}"))?;

    if background {
        drop(launching);
        info!(pgid = %first, "pipe started in background");
        return Ok(JobOutcome::Background(first));
    }

    wait_for(first).map_err(LaunchError::Wait)?;
    wait_for(second).map_err(LaunchError::Wait)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Pipeline;
    use crate::job::ForegroundJob;
    use crate::lexer::tokenize;
    use crate::parser::build;
    use crate::signals::{RelayAction, SignalRelay};
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::getpgid;
    use std::fs;
    use std::thread;
    use std::time::{Duration, Instant};
    use tempfile::TempDir;

    fn pair(line: &str) -> (Command, Command) {
        match build(&tokenize(line)).unwrap() {
            Pipeline::Pair(left, right) => (left, right),
            other => panic!("expected a pipe pair, got {other:?}"),
        }
    }

    fn run(line: &str) -> JobOutcome {
        let (left, right) = pair(line);
        launch_pipe(&left, &right, &ForegroundRegistry::new()).unwrap()
    }

    #[test]
    fn echo_into_word_count() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("count.txt");
        let outcome = run(&format!("echo hello | wc -w > {}", out.display()));
        assert_eq!(outcome, JobOutcome::Exited(0));
        assert_eq!(fs::read_to_string(&out).unwrap().trim(), "1");
    }

    #[test]
    fn reader_sees_end_of_file() {
        // `cat` only exits once every write end of the pipe is closed.
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("out.txt");
        let started = Instant::now();
        let outcome = run(&format!("printf a\\nb\\n | cat > {}", out.display()));
        assert_eq!(outcome, JobOutcome::Exited(0));
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(fs::read_to_string(&out).unwrap(), "a\nb\n");
    }

    #[test]
    fn left_input_and_right_error_redirections_apply() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("in.txt");
        let output = dir.path().join("out.txt");
        let errors = dir.path().join("err.txt");
        fs::write(&input, "3\n1\n2\n").unwrap();

        let outcome = run(&format!(
            "cat < {} | sort > {} 2> {}",
            input.display(),
            output.display(),
            errors.display()
        ));
        assert_eq!(outcome, JobOutcome::Exited(0));
        assert_eq!(fs::read_to_string(&output).unwrap(), "1\n2\n3\n");
        assert!(errors.exists());
    }

    #[test]
    fn outcome_is_the_right_hand_side() {
        assert_eq!(run("true | false"), JobOutcome::Exited(1));
        assert_eq!(run("false | true"), JobOutcome::Exited(0));
    }

    #[test]
    fn right_stage_joins_a_left_group_that_already_exited() {
        let registry = ForegroundRegistry::new();
        let relay = SignalRelay::new(registry.clone(), Box::new(|_: Signal| {}));
        let (left, right) = pair("true | sleep 2");
        let left = ExternalCommand::new(&left).unwrap();
        let right = ExternalCommand::new(&right).unwrap();

        let launching = registry.begin_launch();
        let first = spawn(&left, Pid::from_raw(0), None).unwrap();
        thread::sleep(Duration::from_millis(200));
        // The left child is done; its SIGCHLD must not take the group away.
        assert_eq!(relay.handle(Signal::SIGCHLD), RelayAction::Deferred);
        let second = spawn(&right, first, None).unwrap();
        drop(launching);

        assert_eq!(getpgid(Some(second)).unwrap(), first);
        assert_eq!(wait_for(first).unwrap(), JobOutcome::Exited(0));
        killpg(first, Signal::SIGKILL).unwrap();
        assert_eq!(wait_for(second).unwrap(), JobOutcome::Signaled(Signal::SIGKILL));
    }

    #[test]
    fn background_pipe_does_not_wait() {
        let registry = ForegroundRegistry::new();
        let (left, right) = pair("sleep 5 | cat > /dev/null &");
        let started = Instant::now();
        let outcome = launch_pipe(&left, &right, &registry).unwrap();
        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(registry.get(), ForegroundJob::None);
        let JobOutcome::Background(pgid) = outcome else {
            panic!("expected a background job, got {outcome:?}");
        };
        killpg(pgid, Signal::SIGKILL).unwrap();
    }

    #[test]
    fn interrupt_reaches_both_stages() {
        let registry = ForegroundRegistry::new();
        let watcher = registry.clone();
        let (left, right) = pair("sleep 5 | sleep 5");
        let handle = thread::spawn(move || launch_pipe(&left, &right, &watcher));

        let deadline = Instant::now() + Duration::from_secs(5);
        let pgid = loop {
            if let ForegroundJob::Group(pgid) = registry.get() {
                break pgid;
            }
            assert!(Instant::now() < deadline, "foreground never registered");
            thread::sleep(Duration::from_millis(10));
        };
        // Let the second stage join the group before signalling it.
        thread::sleep(Duration::from_millis(200));
        killpg(pgid, Signal::SIGINT).unwrap();

        let started = Instant::now();
        let outcome = handle.join().unwrap().unwrap();
        assert!(started.elapsed() < Duration::from_secs(4));
        assert_eq!(outcome, JobOutcome::Signaled(Signal::SIGINT));
        assert_eq!(registry.get(), ForegroundJob::None);
    }
}
