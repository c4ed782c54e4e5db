//! Front-end error taxonomy.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("system call failed: {0}")]
    Sys(#[from] nix::errno::Errno),

    #[error(transparent)]
    Protocol(#[from] muxkit_protocol::ProtocolError),

    #[error("could not reach the server after starting it")]
    ServerUnreachable,
}
