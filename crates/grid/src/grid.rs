//! The pane grid: a live cell rectangle plus a scrollback ring.
//!
//! The ring is mono-directional: `history_count` only ever grows while rows
//! are pushed, and the physical slot for logical row `k` (0 = oldest still
//! stored) is `(history_count - stored + k) % history_size`. Rows scrolled
//! into view are addressed through [`Grid::display_line`], which stitches
//! the ring and the live rectangle into one virtual sequence.

use crate::cell::Cell;

/// Per-row flag: this row continues the previous row's logical line.
pub const LINE_CONTINUATION: u8 = 0x01;

/// A pane's live `height × width` cell rectangle, its scrollback ring, and
/// the current scroll offset into that ring.
#[derive(Clone, Debug)]
pub struct Grid {
    pub width: u32,
    pub height: u32,
    cells: Vec<Cell>,
    /// Ring of historical rows, `history_size` slots of `width` cells.
    history: Vec<Cell>,
    pub history_size: u32,
    pub history_count: u32,
    pub scroll_offset: u32,
    /// One flag byte per live row (`LINE_CONTINUATION`).
    line_flags: Vec<u8>,
    /// One flag byte per ring slot.
    history_flags: Vec<u8>,
}

impl Grid {
    /// Allocates a zeroed grid and an empty ring of `history_size` rows.
    pub fn new(width: u32, height: u32, history_size: u32) -> Grid {
        Grid {
            width,
            height,
            cells: vec![Cell::BLANK; (width * height) as usize],
            history: vec![Cell::BLANK; (history_size * width) as usize],
            history_size,
            history_count: 0,
            scroll_offset: 0,
            line_flags: vec![0; height as usize],
            history_flags: vec![0; history_size as usize],
        }
    }

    /// Number of history rows currently stored in the ring.
    pub fn stored(&self) -> u32 {
        self.history_count.min(self.history_size)
    }

    pub fn cell(&self, x: u32, y: u32) -> &Cell {
        &self.cells[(y * self.width + x) as usize]
    }

    pub fn cell_mut(&mut self, x: u32, y: u32) -> &mut Cell {
        &mut self.cells[(y * self.width + x) as usize]
    }

    /// The live row at screen row `y`.
    pub fn row(&self, y: u32) -> &[Cell] {
        let start = (y * self.width) as usize;
        &self.cells[start..start + self.width as usize]
    }

    pub fn line_flag(&self, y: u32) -> u8 {
        self.line_flags[y as usize]
    }

    pub fn set_line_flag(&mut self, y: u32, flag: u8) {
        self.line_flags[y as usize] = flag;
    }

    /// The stored history row at logical index `k`, 0 being the oldest row
    /// still in the ring.
    pub fn history_row(&self, k: u32) -> &[Cell] {
        let slot = self.history_slot(k);
        let start = (slot * self.width) as usize;
        &self.history[start..start + self.width as usize]
    }

    pub fn history_flag(&self, k: u32) -> u8 {
        self.history_flags[self.history_slot(k) as usize]
    }

    fn history_slot(&self, k: u32) -> u32 {
        debug_assert!(k < self.stored());
        (self.history_count - self.stored() + k) % self.history_size
    }

    /// Copies live row `y` into the next ring slot.
    ///
    /// Called exclusively by the emulator adaptor when a row scrolls off the
    /// top; the row must be captured before any further mutation of the
    /// live grid.
    pub fn push_line_to_history(&mut self, y: u32) {
        if self.history_size == 0 {
            return;
        }
        let flag = self.line_flags[y as usize];
        let start = (y * self.width) as usize;
        let row: Vec<Cell> = self.cells[start..start + self.width as usize].to_vec();
        self.push_history_cells(&row, flag);
    }

    /// Appends one row of cells (already the right shape for this grid) to
    /// the ring, padding or truncating to the grid width.
    pub fn push_history_cells(&mut self, row: &[Cell], flag: u8) {
        if self.history_size == 0 {
            return;
        }
        let slot = self.history_count % self.history_size;
        let start = (slot * self.width) as usize;
        let n = row.len().min(self.width as usize);
        self.history[start..start + n].copy_from_slice(&row[..n]);
        for cell in &mut self.history[start + n..start + self.width as usize] {
            *cell = Cell::BLANK;
        }
        self.history_flags[slot as usize] = flag;
        self.history_count += 1;
    }

    /// Scrolls the view `n` lines further into history, saturating at the
    /// oldest stored row.
    pub fn scroll_up(&mut self, n: u32) {
        self.scroll_offset = (self.scroll_offset + n).min(self.stored());
    }

    /// Scrolls the view `n` lines back toward the live screen; scrolling
    /// past zero is a no-op.
    pub fn scroll_down(&mut self, n: u32) {
        self.scroll_offset = self.scroll_offset.saturating_sub(n);
    }

    /// The row to render at screen row `y` under the current scroll offset.
    ///
    /// With no offset this is the live row. Scrolled, it addresses a
    /// virtual sequence whose last `height` entries are the live grid and
    /// whose earlier entries are the ring in chronological order. Rows
    /// above the oldest available history return `None` and render blank.
    pub fn display_line(&self, y: u32) -> Option<&[Cell]> {
        if y >= self.height {
            return None;
        }
        if self.scroll_offset == 0 {
            return Some(self.row(y));
        }
        if self.history_count == 0 || self.history_size == 0 {
            return None;
        }
        let available = self.stored() as i64;
        let line = available - self.scroll_offset as i64 + y as i64;
        if line < 0 {
            return None;
        }
        if line >= available {
            return Some(self.row((line - available) as u32));
        }
        Some(self.history_row(line as u32))
    }

    /// Reshapes the live rectangle, keeping the top-left subrectangle that
    /// fits. A width change also rebuilds the ring at the new width.
    pub fn resize(&mut self, new_width: u32, new_height: u32) {
        if new_width != self.width {
            self.reflow_history(new_width);
        }
        let mut cells = vec![Cell::BLANK; (new_width * new_height) as usize];
        let copy_w = self.width.min(new_width) as usize;
        for y in 0..self.height.min(new_height) {
            let src = (y * self.width) as usize;
            let dst = (y * new_width) as usize;
            cells[dst..dst + copy_w].copy_from_slice(&self.cells[src..src + copy_w]);
        }
        self.cells = cells;
        self.width = new_width;
        self.height = new_height;
        self.line_flags = vec![0; new_height as usize];
        self.scroll_offset = self.scroll_offset.min(self.stored());
    }

    /// Rewraps the stored history at `new_width`.
    ///
    /// Rows are joined into logical lines using the continuation flags,
    /// trailing blank cells are trimmed, blank lines at the tail are
    /// dropped, and the result is re-emitted into a fresh ring of the same
    /// capacity; leading overflow is discarded. Best effort: a wide cell
    /// straddling the new boundary simply starts the next row.
    ///
    /// The ring is laid out at `new_width` after this call; [`Grid::resize`]
    /// pairs it with the live-cell reshape that updates `self.width`.
    pub fn reflow_history(&mut self, new_width: u32) {
        let stored = self.stored();
        let mut logical: Vec<Vec<Cell>> = Vec::new();
        for k in 0..stored {
            let row = self.history_row(k).to_vec();
            if self.history_flag(k) & LINE_CONTINUATION != 0 && !logical.is_empty() {
                logical.last_mut().expect("checked non-empty").extend(row);
            } else {
                logical.push(row);
            }
        }
        for line in &mut logical {
            while line.last().is_some_and(Cell::is_blank) {
                line.pop();
            }
        }
        while logical.last().is_some_and(Vec::is_empty) {
            logical.pop();
        }

        let nw = new_width as usize;
        let mut rows: Vec<(Vec<Cell>, u8)> = Vec::new();
        for line in logical {
            if line.is_empty() {
                rows.push((Vec::new(), 0));
                continue;
            }
            for (i, chunk) in line.chunks(nw.max(1)).enumerate() {
                let flag = if i == 0 { 0 } else { LINE_CONTINUATION };
                rows.push((chunk.to_vec(), flag));
            }
        }

        let cap = self.history_size as usize;
        let skip = rows.len().saturating_sub(cap);
        let kept = &rows[skip..];

        let mut history = vec![Cell::BLANK; cap * nw];
        let mut flags = vec![0u8; cap];
        for (i, (cells, flag)) in kept.iter().enumerate() {
            let n = cells.len().min(nw);
            history[i * nw..i * nw + n].copy_from_slice(&cells[..n]);
            flags[i] = *flag;
        }
        self.history = history;
        self.history_flags = flags;
        self.history_count = kept.len() as u32;
        self.scroll_offset = self.scroll_offset.min(self.history_count);
    }

    /// Snapshot codec internals: raw access used by `snapshot`.
    pub(crate) fn live_cells(&self) -> &[Cell] {
        &self.cells
    }

    pub(crate) fn replace_buffers(
        &mut self,
        width: u32,
        height: u32,
        history_size: u32,
        cells: Vec<Cell>,
        history: Vec<Cell>,
        history_count: u32,
        scroll_offset: u32,
    ) {
        self.width = width;
        self.height = height;
        self.history_size = history_size;
        self.cells = cells;
        self.history = history;
        self.history_count = history_count;
        self.scroll_offset = scroll_offset;
        self.line_flags = vec![0; height as usize];
        self.history_flags = vec![0; history_size as usize];
    }
}
