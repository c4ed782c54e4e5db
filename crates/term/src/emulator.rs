//! The emulator adaptor.
//!
//! [`Emulator`] wraps `alacritty_terminal`'s `Term` behind the narrow
//! surface the pane model needs: feed PTY bytes, read cells and the cursor
//! back, collect the bytes the terminal wants written to the PTY (cursor
//! position reports and the like), and capture rows that scroll off the
//! top.
//!
//! The emulator exposes no scroll callback, so scrolled rows are recovered
//! after each feed from the growth of its internal history: the `d` newest
//! history rows are exactly the rows that scrolled off since the last
//! sync, including rows that scrolled through within a single read chunk.
//! The internal history is sized to the pane's ring capacity.

use alacritty_terminal::event::{Event, EventListener};
use alacritty_terminal::grid::Dimensions;
use alacritty_terminal::index::{Column, Line, Point};
use alacritty_terminal::term::cell::Flags;
use alacritty_terminal::term::{Config, Term};
use alacritty_terminal::vte::ansi::Processor;
use crossbeam_channel::{unbounded, Receiver, Sender};

use muxkit_grid::{Cell, Grid, LINE_CONTINUATION};

use crate::convert::convert_cell;

/// Terminal dimensions handed to the emulator.
#[derive(Clone, Copy)]
struct EmulatorSize {
    cols: usize,
    rows: usize,
    scrollback: usize,
}

impl Dimensions for EmulatorSize {
    fn total_lines(&self) -> usize {
        self.rows + self.scrollback
    }

    fn screen_lines(&self) -> usize {
        self.rows
    }

    fn columns(&self) -> usize {
        self.cols
    }
}

/// Listener that forwards emulator events to the adaptor.
struct EventProxy {
    sender: Sender<Event>,
}

impl EventListener for EventProxy {
    fn send_event(&self, event: Event) {
        let _ = self.sender.send(event);
    }
}

/// One embedded terminal emulator plus the state needed to mirror it into a
/// [`Grid`].
pub struct Emulator {
    term: Term<EventProxy>,
    processor: Processor,
    events: Receiver<Event>,
    size: EmulatorSize,
    /// Emulator history rows already captured into the grid ring.
    seen_history: usize,
    /// Whether the most recently captured history row wrapped into its
    /// successor; seeds the next captured row's continuation flag.
    last_captured_wrapped: bool,
}

impl Emulator {
    /// Creates an emulator of `cols × rows` with `scrollback` rows of
    /// internal history (UTF-8 input and the alternate screen are native to
    /// the library).
    pub fn new(cols: usize, rows: usize, scrollback: usize) -> Emulator {
        let (sender, events) = unbounded();
        let size = EmulatorSize {
            cols,
            rows,
            scrollback,
        };
        let config = Config {
            scrolling_history: scrollback,
            ..Config::default()
        };
        let term = Term::new(config, &size, EventProxy { sender });
        Emulator {
            term,
            processor: Processor::new(),
            events,
            size,
            seen_history: 0,
            last_captured_wrapped: false,
        }
    }

    /// Feeds PTY output bytes through the escape-sequence parser.
    pub fn advance(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.processor.advance(&mut self.term, byte);
        }
    }

    /// Bytes the terminal wants written back to the PTY master (device
    /// status reports and similar), in arrival order.
    pub fn take_responses(&mut self) -> Vec<u8> {
        let mut out = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            if let Event::PtyWrite(text) = event {
                out.extend_from_slice(text.as_bytes());
            }
        }
        out
    }

    /// Rows that scrolled off the top since the last call, oldest first,
    /// each with its continuation flag.
    pub fn drain_scrolled_rows(&mut self) -> Vec<(Vec<Cell>, u8)> {
        let mut last_wrapped = self.last_captured_wrapped;
        let history;
        let mut rows;
        {
            let grid = self.term.grid();
            history = grid.history_size();
            let fresh = history.saturating_sub(self.seen_history);
            rows = Vec::with_capacity(fresh);
            for i in (1..=fresh).rev() {
                let row = &grid[Line(-(i as i32))];
                let cells: Vec<Cell> = (0..self.size.cols)
                    .map(|x| convert_cell(&row[Column(x)]))
                    .collect();
                let flag = if last_wrapped { LINE_CONTINUATION } else { 0 };
                last_wrapped = row[Column(self.size.cols - 1)]
                    .flags
                    .contains(Flags::WRAPLINE);
                rows.push((cells, flag));
            }
        }
        self.last_captured_wrapped = last_wrapped;
        self.seen_history = history;
        rows
    }

    /// Reads the live cell at `(x, y)` in grid form.
    pub fn read_cell(&self, x: usize, y: usize) -> Cell {
        let row = &self.term.grid()[Line(y as i32)];
        convert_cell(&row[Column(x)])
    }

    /// True if live row `y` continues the previous row's logical line.
    pub fn row_is_continuation(&self, y: usize) -> bool {
        let grid = self.term.grid();
        let prev = if y == 0 {
            if grid.history_size() == 0 {
                return false;
            }
            &grid[Line(-1)]
        } else {
            &grid[Line(y as i32 - 1)]
        };
        prev[Column(self.size.cols - 1)]
            .flags
            .contains(Flags::WRAPLINE)
    }

    /// Current cursor position, column then row.
    pub fn cursor(&self) -> (usize, usize) {
        let Point { line, column } = self.term.grid().cursor.point;
        (column.0, line.0.max(0) as usize)
    }

    /// Resizes the emulator; its own content reflows, and history capture
    /// restarts from the post-resize state.
    pub fn resize(&mut self, cols: usize, rows: usize) {
        self.size.cols = cols;
        self.size.rows = rows;
        self.term.resize(self.size);
        self.seen_history = self.term.grid().history_size();
    }

    /// Repaints the emulator from a grid's live cells, used when a snapshot
    /// is replayed on attach. Emits an ANSI program that rewrites every
    /// cell with its attributes and finally positions the cursor.
    /// Scrollback is not replayed; the grid's ring holds it directly.
    pub fn repaint_from_grid(&mut self, grid: &Grid, cx: u32, cy: u32) {
        use std::fmt::Write as _;

        let mut seq = String::from("\x1b[H\x1b[2J\x1b[0m");
        let mut last = (0u8, 0u8, 0u8, 0x03u8);
        for y in 0..grid.height {
            let _ = write!(seq, "\x1b[{};1H", y + 1);
            let mut x = 0;
            while x < grid.width {
                let cell = grid.cell(x, y);
                let state = (cell.fg, cell.bg, cell.attr, cell.flags);
                if state != last {
                    seq.push_str("\x1b[0m");
                    if cell.attr & muxkit_grid::ATTR_BOLD != 0 {
                        seq.push_str("\x1b[1m");
                    }
                    if cell.attr & muxkit_grid::ATTR_UNDERLINE != 0 {
                        seq.push_str("\x1b[4m");
                    }
                    if cell.attr & muxkit_grid::ATTR_ITALIC != 0 {
                        seq.push_str("\x1b[3m");
                    }
                    if cell.attr & muxkit_grid::ATTR_REVERSE != 0 {
                        seq.push_str("\x1b[7m");
                    }
                    if cell.flags & muxkit_grid::FLAG_DEFAULT_FG == 0 {
                        let _ = write!(seq, "\x1b[38;5;{}m", cell.fg);
                    }
                    if cell.flags & muxkit_grid::FLAG_DEFAULT_BG == 0 {
                        let _ = write!(seq, "\x1b[48;5;{}m", cell.bg);
                    }
                    last = state;
                }
                match cell.text() {
                    Some(text) => {
                        seq.push_str(text);
                        x += cell.render_width();
                    }
                    None => {
                        seq.push(' ');
                        x += 1;
                    }
                }
            }
        }
        let _ = write!(seq, "\x1b[{};{}H", cy + 1, cx + 1);

        self.advance(seq.as_bytes());
        // The repaint positions every row absolutely, but guard against any
        // history the program may have produced.
        self.seen_history = self.term.grid().history_size();
        self.last_captured_wrapped = false;
    }
}
