//! Asynchronous reaping collects every child of the process, so it lives in its
//! own test binary where no other test has children to lose.

use nix::errno::Errno;
use nix::sys::signal::Signal;
use nix::sys::wait::{WaitPidFlag, waitpid};
use std::thread;
use std::time::Duration;
use yash::launcher::launch;
use yash::lexer::tokenize;
use yash::parser::build_command;
use yash::signals::{RelayAction, SignalRelay, reap_available};
use yash::{ForegroundRegistry, JobOutcome};

#[test]
fn finished_background_jobs_are_reaped() {
    let registry = ForegroundRegistry::new();
    let relay = SignalRelay::new(registry.clone(), Box::new(|_: Signal| {}));

    let cmd = build_command(&tokenize("true &")).unwrap();
    let JobOutcome::Background(pgid) = launch(&cmd, &registry).unwrap() else {
        panic!("expected a background job");
    };
    thread::sleep(Duration::from_millis(300));

    assert_eq!(relay.handle(Signal::SIGCHLD), RelayAction::Reaped(1));
    assert_eq!(
        waitpid(pgid, Some(WaitPidFlag::WNOHANG)),
        Err(Errno::ECHILD)
    );

    // A status change during a launch waits for the main loop's sweep.
    let launching = registry.begin_launch();
    let JobOutcome::Background(pgid) = launch(&cmd, &ForegroundRegistry::new()).unwrap() else {
        panic!("expected a background job");
    };
    thread::sleep(Duration::from_millis(300));
    assert_eq!(relay.handle(Signal::SIGCHLD), RelayAction::Deferred);
    drop(launching);

    assert_eq!(reap_available(), 1);
    assert_eq!(
        waitpid(pgid, Some(WaitPidFlag::WNOHANG)),
        Err(Errno::ECHILD)
    );
    assert_eq!(reap_available(), 0);
}
