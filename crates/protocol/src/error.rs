//! Protocol error taxonomy.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("system call failed: {0}")]
    Sys(#[from] nix::errno::Errno),

    /// The peer closed the stream in the middle of a frame. End-of-file at
    /// a frame boundary is a normal disconnect and is not an error.
    #[error("peer closed the stream mid-frame")]
    TruncatedFrame,

    #[error("frame length {0} exceeds the protocol maximum")]
    ImpossibleLength(u64),

    #[error("protocol version mismatch: ours {ours}, peer {theirs}")]
    VersionMismatch { ours: u32, theirs: u32 },

    #[error("expected a file descriptor in ancillary data, none arrived")]
    NoFdReceived,
}
