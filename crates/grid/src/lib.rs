//! Screen model for muxkit panes.
//!
//! This crate is the canonical in-memory representation of a pane: the
//! [`Cell`] unit, the live [`Grid`] with its scrollback ring, and the
//! snapshot codec that makes detach/attach transparent. It knows nothing
//! about terminals, PTYs, or the wire protocol; the emulator adaptor in
//! `muxkit-term` writes into it and the renderer in `muxkit-client` reads
//! out of it.

mod cell;
mod grid;
pub mod snapshot;

pub use cell::{
    Cell, ATTR_BOLD, ATTR_ITALIC, ATTR_REVERSE, ATTR_UNDERLINE, FLAG_DEFAULT_BG, FLAG_DEFAULT_FG,
};
pub use grid::{Grid, LINE_CONTINUATION};
pub use snapshot::{SnapshotCursor, SnapshotError};

/// Scrollback capacity of every pane grid, in rows.
pub const DEFAULT_HISTORY_SIZE: u32 = 1000;
