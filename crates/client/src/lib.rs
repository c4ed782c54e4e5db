//! The muxkit front-end.
//!
//! One front-end owns one controlling terminal. It connects to the
//! per-user server (starting it on demand), holds the pane objects that
//! render each PTY through the embedded emulator, and drives a small state
//! machine over multiplexed I/O: standard input, the server link, and
//! every pane master. Detach serializes each pane's grid to the server and
//! exits; attach replays those snapshots into fresh emulators.

mod client;
mod error;
mod fsm;
mod keybinds;
mod render;

pub use client::{
    run_attach, run_kill, run_list, run_new_session, run_new_session_detached, session_is_nested,
    NESTED_WARNING,
};
pub use error::ClientError;
pub use render::VERSION_STRING;
