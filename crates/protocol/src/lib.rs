//! Wire protocol between the muxkit front-end and server.
//!
//! The protocol is local-only and per-user: framed, typed messages over a
//! Unix stream socket, with PTY master descriptors transported out of band
//! by `SCM_RIGHTS`. See `message` for the frame layout and the places the
//! framing is deliberately bypassed.

mod error;
mod fdpass;
mod message;
pub mod paths;
mod wakeup;

pub use error::ProtocolError;
pub use fdpass::{recv_fd, send_fd};
pub use message::{
    read_frame, read_raw_u32, read_text_reply, write_message, write_raw_u32, write_text_reply,
    Frame, MsgType, WindowSize, HEADER_SIZE, MAX_PAYLOAD, PROTOCOL_VERSION,
};
pub use wakeup::SignalWakeup;

/// Hard cap on panes per session.
pub const MAX_PANES: usize = 64;

/// Hard cap on simultaneously connected front-ends.
pub const MAX_CLIENTS: usize = 64;

/// `listen(2)` backlog for the server socket.
pub const LISTEN_BACKLOG: usize = 5;

/// Command payload creating the first pane of a session.
pub const CMD_NEW_SESSION: &str = "new-session";

/// Command payload adding a pane to the connection's session.
pub const CMD_PANE_SPLIT: &str = "pane-split";
