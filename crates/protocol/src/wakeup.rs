//! Signal delivery into a poll loop.
//!
//! Handlers do nothing but set an atomic flag and write one byte into a
//! self-pipe whose read end sits in the poll set, so the blocking readiness
//! wait observes the interruption. The loop inspects and clears the flags
//! before handling regular readiness on every iteration.

use std::os::fd::{AsFd, AsRawFd, BorrowedFd, OwnedFd};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use nix::fcntl::OFlag;
use nix::unistd::pipe2;

use crate::error::ProtocolError;

/// One watched signal: its pending flag plus the pipe the handler pokes.
pub struct SignalWakeup {
    read: OwnedFd,
    /// Kept alive for the handler registered with `register_raw`.
    _write: OwnedFd,
    flags: Vec<(i32, Arc<AtomicBool>)>,
}

impl SignalWakeup {
    /// Creates the self-pipe; no signals are watched yet.
    pub fn new() -> Result<SignalWakeup, ProtocolError> {
        let (read, write) = pipe2(OFlag::O_NONBLOCK | OFlag::O_CLOEXEC)?;
        Ok(SignalWakeup {
            read,
            _write: write,
            flags: Vec::new(),
        })
    }

    /// Watches `signal`: its handler sets the returned flag and wakes the
    /// poll loop.
    pub fn watch(&mut self, signal: i32) -> Result<Arc<AtomicBool>, ProtocolError> {
        let flag = Arc::new(AtomicBool::new(false));
        signal_hook::flag::register(signal, Arc::clone(&flag))?;
        signal_hook::low_level::pipe::register_raw(signal, self._write.as_raw_fd())?;
        self.flags.push((signal, Arc::clone(&flag)));
        Ok(flag)
    }

    /// The pipe read end for the poll set.
    pub fn poll_fd(&self) -> BorrowedFd<'_> {
        self.read.as_fd()
    }

    /// Drains queued wakeup bytes. Call once per loop iteration when the
    /// pipe polls readable.
    pub fn drain(&self) {
        let mut buf = [0u8; 64];
        while nix::unistd::read(&self.read, &mut buf).is_ok_and(|n| n > 0) {}
    }

    /// Takes (reads and clears) the pending flag for `signal`.
    pub fn take(&self, signal: i32) -> bool {
        self.flags
            .iter()
            .find(|(s, _)| *s == signal)
            .is_some_and(|(_, flag)| flag.swap(false, Ordering::SeqCst))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raised_signal_sets_flag_and_pokes_pipe() {
        let mut wakeup = SignalWakeup::new().unwrap();
        wakeup.watch(signal_hook::consts::SIGUSR1).unwrap();

        assert!(!wakeup.take(signal_hook::consts::SIGUSR1));
        signal_hook::low_level::raise(signal_hook::consts::SIGUSR1).unwrap();

        assert!(wakeup.take(signal_hook::consts::SIGUSR1));
        // Second take observes a cleared flag.
        assert!(!wakeup.take(signal_hook::consts::SIGUSR1));
        wakeup.drain();
    }
}
