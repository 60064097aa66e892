// Interrupt handling for the single run thread.
//
// SIGINT/SIGTERM only raise a flag. A small signal thread drives a tokio
// runtime that listens for both; the run itself stays synchronous. The child
// process in the foreground process group receives the same signal and exits,
// the command runner then reports the stage as interrupted and nothing new is
// started afterwards.

use crate::log_warn;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use tokio::signal::unix::{SignalKind, signal};

static INTERRUPTED: AtomicBool = AtomicBool::new(false);

/// Registers the listeners. Call once, before the first stage runs.
pub fn install() -> io::Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    // Registered before returning so no signal is lost to the default handler.
    let (mut sigint, mut sigterm) = {
        let _guard = runtime.enter();
        (signal(SignalKind::interrupt())?, signal(SignalKind::terminate())?)
    };

    thread::Builder::new()
        .name("signals".to_string())
        .spawn(move || {
            runtime.block_on(async move {
                loop {
                    let received = tokio::select! {
                        received = sigint.recv() => received.map(|_| "SIGINT"),
                        received = sigterm.recv() => received.map(|_| "SIGTERM"),
                    };
                    let Some(name) = received else { break };
                    if !INTERRUPTED.swap(true, Ordering::SeqCst) {
                        log_warn!("Received {}, stopping after the current step", name);
                    }
                }
            });
        })?;
    Ok(())
}

pub fn is_interrupted() -> bool {
    INTERRUPTED.load(Ordering::SeqCst)
}

#[cfg(test)]
pub(crate) fn set_interrupted(value: bool) {
    INTERRUPTED.store(value, Ordering::SeqCst);
}
