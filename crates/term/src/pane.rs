//! One pane: a PTY master, an emulator, and the grid mirroring it.

use std::os::fd::OwnedFd;

use muxkit_grid::{Grid, DEFAULT_HISTORY_SIZE};

use crate::emulator::Emulator;

/// A pane of the window. Geometry is `(sx, sy)` cells at `(xoff, yoff)` on
/// the terminal; the grid always matches `sx × sy` except mid-resize. The
/// cursor `(cx, cy)` is pane-relative.
pub struct Pane {
    pub id: u32,
    pub sx: u32,
    pub sy: u32,
    pub xoff: u32,
    pub yoff: u32,
    pub cx: u32,
    pub cy: u32,
    pub grid: Grid,
    emulator: Emulator,
    /// PTY master. The server holds its own copy of this descriptor; both
    /// sides read and write independently and close without coordination.
    pub master: Option<OwnedFd>,
}

impl Pane {
    /// Creates a pane with a fresh grid and emulator of the given size.
    pub fn new(id: u32, sx: u32, sy: u32, xoff: u32, yoff: u32) -> Pane {
        Pane {
            id,
            sx,
            sy,
            xoff,
            yoff,
            cx: 0,
            cy: 0,
            grid: Grid::new(sx, sy, DEFAULT_HISTORY_SIZE),
            emulator: Emulator::new(sx as usize, sy as usize, DEFAULT_HISTORY_SIZE as usize),
            master: None,
        }
    }

    /// Feeds PTY output through the emulator and mirrors the result into
    /// the grid: scrolled rows are captured into the ring first, then the
    /// live cells, per-row continuation flags, and cursor are synced.
    ///
    /// Returns any bytes the emulator wants written back to the PTY master
    /// (cursor-position reports and the like); the caller owns that write.
    pub fn input(&mut self, bytes: &[u8]) -> Vec<u8> {
        self.emulator.advance(bytes);
        for (row, flag) in self.emulator.drain_scrolled_rows() {
            self.grid.push_history_cells(&row, flag);
        }
        self.sync_grid();
        self.emulator.take_responses()
    }

    fn sync_grid(&mut self) {
        for y in 0..self.sy {
            for x in 0..self.sx {
                *self.grid.cell_mut(x, y) = self.emulator.read_cell(x as usize, y as usize);
            }
            let flag = if self.emulator.row_is_continuation(y as usize) {
                muxkit_grid::LINE_CONTINUATION
            } else {
                0
            };
            self.grid.set_line_flag(y, flag);
        }
        let (cx, cy) = self.emulator.cursor();
        self.cx = (cx as u32).min(self.sx.saturating_sub(1));
        self.cy = (cy as u32).min(self.sy.saturating_sub(1));
    }

    /// Replays a deserialized grid into the emulator and adopts the
    /// restored cursor. Called on attach after the snapshot replaced
    /// `self.grid`.
    pub fn replay_snapshot(&mut self, cx: u32, cy: u32) {
        self.cx = cx.min(self.sx.saturating_sub(1));
        self.cy = cy.min(self.sy.saturating_sub(1));
        self.emulator.repaint_from_grid(&self.grid, self.cx, self.cy);
    }

    /// Resizes the pane: grid first (destructive for live content beyond
    /// the kept rectangle), then the emulator, then the cursor clamp.
    pub fn resize(&mut self, sx: u32, sy: u32) {
        self.grid.resize(sx, sy);
        self.sx = sx;
        self.sy = sy;
        self.emulator.resize(sx as usize, sy as usize);
        self.cx = self.cx.min(sx.saturating_sub(1));
        self.cy = self.cy.min(sy.saturating_sub(1));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row_text(pane: &Pane, y: u32) -> String {
        pane.grid
            .row(y)
            .iter()
            .map(|c| c.text().unwrap_or(" "))
            .collect::<String>()
            .trim_end()
            .to_string()
    }

    #[test]
    fn input_mirrors_emulator_into_grid() {
        let mut pane = Pane::new(0, 20, 5, 0, 0);
        let responses = pane.input(b"hello");
        assert!(responses.is_empty());
        assert_eq!(row_text(&pane, 0), "hello");
        assert_eq!((pane.cx, pane.cy), (5, 0));
    }

    #[test]
    fn overflow_fills_scrollback_ring() {
        let mut pane = Pane::new(0, 10, 2, 0, 0);
        pane.input(b"a\r\nb\r\nc\r\nd");
        assert_eq!(pane.grid.history_count, 2);
        assert_eq!(row_text(&pane, 0), "c");
        assert_eq!(row_text(&pane, 1), "d");
    }

    #[test]
    fn snapshot_round_trip_through_pane() {
        let mut first = Pane::new(3, 12, 4, 0, 0);
        first.input(b"one\r\ntwo");
        let bytes = muxkit_grid::snapshot::serialize(&first.grid, first.id, first.cx, first.cy);

        let mut second = Pane::new(3, 12, 4, 0, 0);
        let (pane_id, cursor) =
            muxkit_grid::snapshot::deserialize(&mut second.grid, &bytes).unwrap();
        assert_eq!(pane_id, 3);
        second.replay_snapshot(cursor.cx, cursor.cy);

        assert_eq!(row_text(&second, 0), "one");
        assert_eq!(row_text(&second, 1), "two");
        assert_eq!((second.cx, second.cy), (first.cx, first.cy));

        // The emulator itself was repainted: feeding more bytes continues
        // from the restored cursor.
        second.input(b"!");
        assert_eq!(row_text(&second, 1), "two!");
    }

    #[test]
    fn resize_clamps_cursor() {
        let mut pane = Pane::new(0, 20, 5, 0, 0);
        pane.input(b"0123456789");
        pane.resize(4, 2);
        assert!(pane.cx < 4);
        assert!(pane.cy < 2);
        assert_eq!(pane.grid.width, 4);
        assert_eq!(pane.grid.height, 2);
    }
}
