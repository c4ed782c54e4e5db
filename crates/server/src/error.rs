//! Server error taxonomy.
//!
//! Nothing here is globally fatal: the dispatcher logs, drops the affected
//! request or connection, and keeps running. These errors exist so the
//! failure can be propagated to the spot that decides that.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("system call failed: {0}")]
    Sys(#[from] nix::errno::Errno),

    #[error(transparent)]
    Protocol(#[from] muxkit_protocol::ProtocolError),

    #[error("pty creation failed: {0}")]
    PtyCreation(String),

    #[error("shell spawn failed: {0}")]
    Spawn(String),
}
