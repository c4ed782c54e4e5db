//! The muxkit server: a per-user daemon owning sessions, PTY masters, and
//! shell children, reachable over a local stream socket.
//!
//! Sessions outlive front-ends: on detach the connection goes away but
//! masters and children stay open; on attach the masters are handed to the
//! new front-end by descriptor passing and any cached grid snapshots are
//! replayed. The server is destroyed only from the outside; sessions are
//! destroyed when their last shell exits or on an explicit kill.

mod dispatcher;
mod error;
mod session;
mod spawn;

pub use dispatcher::{run, Dispatcher};
pub use error::ServerError;
pub use spawn::resolve_shell;
