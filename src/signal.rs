//! Signal-driven shutdown: traps the signal set the specification names and
//! exposes a single `AtomicBool` the receiver loop polls, mirroring the
//! reference source's `volatile int do_exit` set from a signal handler.
//!
//! Registers the flag directly with `signal_hook::flag::register` rather
//! than running a blocking iterator on a side thread, the same idiom
//! `examples/tock-tock/boards/host_emulation/src/chip.rs` uses for its own
//! `SIGTERM`/`SIGINT` shutdown flag: the handler itself only ever does the
//! async-signal-safe atomic store, so no dedicated thread is needed to keep
//! it out of signal context.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use signal_hook::consts::{SIGABRT, SIGFPE, SIGILL, SIGINT, SIGSEGV, SIGTERM};

/// Installs handlers for `SIGINT`, `SIGILL`, `SIGFPE`, `SIGSEGV`, `SIGTERM`
/// and `SIGABRT` and returns a flag that flips to `true` the first time any
/// of them is delivered.
pub fn install() -> std::io::Result<Arc<AtomicBool>> {
    let exit = Arc::new(AtomicBool::new(false));

    for &signal in &[SIGINT, SIGILL, SIGFPE, SIGSEGV, SIGTERM, SIGABRT] {
        signal_hook::flag::register(signal, Arc::clone(&exit))?;
    }

    Ok(exit)
}
