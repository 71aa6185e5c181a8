//! Interrupt tracking for the foreground session.
//!
//! SIGINT, SIGTERM and SIGHUP only set a flag and remember which signal arrived. A terminal
//! Ctrl+C already reaches the container (or sshfs) child through the shared process group;
//! SIGTERM and SIGHUP sent to `box` alone are passed on to the child by `wait_forwarding`.
//! Once the child exits the caller checks `interrupted()`, lets scoped guards clean up, and
//! exits with 130.

use std::io;
use std::process::{Child, ExitStatus};
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::time::Duration;

use wait_timeout::ChildExt;

static INTERRUPTED: AtomicBool = AtomicBool::new(false);
static LAST_SIGNAL: AtomicI32 = AtomicI32::new(0);

const POLL: Duration = Duration::from_millis(200);

#[cfg(unix)]
extern "C" fn handle_signal(sig: i32) {
    LAST_SIGNAL.store(sig, Ordering::SeqCst);
    INTERRUPTED.store(true, Ordering::SeqCst);
}

/// Install the flag-setting handlers. Safe to call more than once.
#[cfg(unix)]
pub fn install() {
    use nix::sys::signal::{self, SaFlags, SigAction, SigHandler, SigSet, Signal};
    let act = SigAction::new(
        SigHandler::Handler(handle_signal),
        SaFlags::SA_RESTART,
        SigSet::empty(),
    );
    unsafe {
        let _ = signal::sigaction(Signal::SIGINT, &act);
        let _ = signal::sigaction(Signal::SIGTERM, &act);
        let _ = signal::sigaction(Signal::SIGHUP, &act);
    }
}

#[cfg(not(unix))]
pub fn install() {}

pub fn interrupted() -> bool {
    INTERRUPTED.load(Ordering::SeqCst)
}

/// Block until a signal arrives (used by `box-sshfs` in the foreground).
pub fn wait_for_interrupt() {
    while !interrupted() {
        std::thread::sleep(POLL);
    }
}

/// SIGTERM or SIGHUP received by this process, which the terminal does not deliver to
/// children on its own.
#[cfg(unix)]
fn forwardable() -> Option<nix::sys::signal::Signal> {
    use nix::sys::signal::Signal;
    match Signal::try_from(LAST_SIGNAL.load(Ordering::SeqCst)) {
        Ok(sig @ (Signal::SIGTERM | Signal::SIGHUP)) => Some(sig),
        _ => None,
    }
}

#[cfg(unix)]
fn forward(child: &Child) -> bool {
    use nix::sys::signal::kill;
    use nix::unistd::Pid;
    let Some(sig) = forwardable() else {
        return false;
    };
    let Ok(pid) = i32::try_from(child.id()) else {
        return false;
    };
    tracing::debug!(pid, signal = %sig, "forwarding signal to child");
    let _ = kill(Pid::from_raw(pid), sig);
    true
}

#[cfg(not(unix))]
fn forward(_child: &Child) -> bool {
    false
}

/// Wait for `child` to exit, passing a pending SIGTERM or SIGHUP on to it once.
pub fn wait_forwarding(child: &mut Child) -> io::Result<ExitStatus> {
    let mut forwarded = false;
    loop {
        if let Some(status) = child.wait_timeout(POLL)? {
            return Ok(status);
        }
        if !forwarded && interrupted() {
            forwarded = forward(child);
        }
    }
}
