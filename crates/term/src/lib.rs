//! Terminal model for muxkit.
//!
//! This crate bridges the opaque VT emulator (`alacritty_terminal`) and the
//! pane grid: [`Emulator`] is the adaptor, [`Pane`] ties an emulator, a
//! grid, and a PTY master together, and [`Window`] arranges panes into the
//! equal-width vertical strip the front-end renders.
//!
//! The data flow during normal operation is
//! `PTY output → Pane::input → emulator → grid`, and on attach the inverse
//! `snapshot → grid → Emulator::repaint_from_grid → emulator`.

mod convert;
mod emulator;
mod pane;
mod window;

pub use convert::convert_cell;
pub use emulator::Emulator;
pub use pane::Pane;
pub use window::{Layout, Window};
