//! Shell spawning on a fresh PTY.
//!
//! The PTY pair comes from `portable-pty`, which also handles the child
//! setup the multiplexer depends on: new process session with the slave as
//! controlling terminal, stdio duplicated from the slave, and inherited
//! descriptors closed before exec so no server socket leaks into user
//! shells.

use std::os::fd::{BorrowedFd, OwnedFd};

use portable_pty::{native_pty_system, Child, CommandBuilder, MasterPty, PtySize};
use tracing::{debug, info};

use muxkit_protocol::WindowSize;

use crate::error::ServerError;

/// Fallback PTY size when the front-end has not reported one yet.
const DEFAULT_ROWS: u16 = 24;
const DEFAULT_COLS: u16 = 80;

/// A spawned shell bound to its PTY.
pub struct SpawnedPane {
    /// The server's master handle; closing it is how the shell learns the
    /// multiplexer is gone.
    pub master: Box<dyn MasterPty + Send>,
    pub child: Box<dyn Child + Send + Sync>,
    pub pid: u32,
    /// Duplicate of the master descriptor used for FD passing; the kernel
    /// makes a further copy for the receiving front-end.
    pub master_fd: OwnedFd,
}

/// Resolves the shell for spawned children: `$SHELL` if it names an
/// executable absolute path, then the passwd entry, then `/bin/sh`.
pub fn resolve_shell() -> String {
    if let Ok(shell) = std::env::var("SHELL") {
        if shell_is_usable(&shell) {
            return shell;
        }
    }
    if let Ok(Some(user)) = nix::unistd::User::from_uid(nix::unistd::Uid::current()) {
        let shell = user.shell.to_string_lossy().into_owned();
        if shell_is_usable(&shell) {
            return shell;
        }
    }
    "/bin/sh".to_string()
}

fn shell_is_usable(shell: &str) -> bool {
    shell.starts_with('/')
        && nix::unistd::access(shell, nix::unistd::AccessFlags::X_OK).is_ok()
}

/// Creates a PTY of the requested size and spawns the user's shell on it.
pub fn spawn_shell(size: WindowSize) -> Result<SpawnedPane, ServerError> {
    let rows = if size.rows > 0 { size.rows } else { DEFAULT_ROWS };
    let cols = if size.cols > 0 { size.cols } else { DEFAULT_COLS };

    let pty_system = native_pty_system();
    let pair = pty_system
        .openpty(PtySize {
            rows,
            cols,
            pixel_width: 0,
            pixel_height: 0,
        })
        .map_err(|e| ServerError::PtyCreation(e.to_string()))?;

    let shell = resolve_shell();
    debug!(shell = %shell, rows, cols, "spawning shell");

    let mut cmd = CommandBuilder::new(&shell);
    cmd.env("TERM", "xterm-256color");
    cmd.env("MUXKIT", std::process::id().to_string());

    let child = pair
        .slave
        .spawn_command(cmd)
        .map_err(|e| ServerError::Spawn(e.to_string()))?;
    // The slave stays open only for the duration of the spawn; the master
    // must see EOF once the shell exits.
    drop(pair.slave);

    let pid = child.process_id().unwrap_or(0);

    let raw = pair
        .master
        .as_raw_fd()
        .ok_or_else(|| ServerError::PtyCreation("master exposes no descriptor".into()))?;
    // The boxed master owns `raw` for as long as the slot lives; the
    // duplicate is the handle handed to front-ends.
    let master_fd = unsafe { BorrowedFd::borrow_raw(raw) }.try_clone_to_owned()?;

    info!(pid, "shell spawned");
    Ok(SpawnedPane {
        master: pair.master,
        child,
        pid,
        master_fd,
    })
}
