//! Rendering: stateless re-emission of the grid as ANSI output.
//!
//! Every renderer writes into any `Write` sink so the output can be
//! asserted against byte buffers in tests; the event loop hands in locked
//! stdout. Attribute state is tracked per call and reset between
//! attribute-differing runs.

use std::io::Write;

use crossterm::cursor::{Hide, MoveTo, SetCursorStyle, Show};
use crossterm::style::{Attribute, Color, Print, SetAttribute, SetBackgroundColor, SetForegroundColor};
use crossterm::terminal::{Clear, ClearType};
use crossterm::queue;
use unicode_width::UnicodeWidthStr;

use muxkit_grid::{
    Cell, ATTR_BOLD, ATTR_ITALIC, ATTR_REVERSE, ATTR_UNDERLINE, FLAG_DEFAULT_BG, FLAG_DEFAULT_FG,
};
use muxkit_term::Pane;

/// Version string shown right-aligned in the status bar.
pub const VERSION_STRING: &str = concat!("muxkit ", env!("CARGO_PKG_VERSION"));

/// Marker inserted into the status bar while viewing scrollback.
pub const HISTORY_MARKER: &str = "[history]";

fn apply_style<W: Write>(out: &mut W, cell: &Cell) -> std::io::Result<()> {
    queue!(out, SetAttribute(Attribute::Reset))?;
    if cell.attr & ATTR_BOLD != 0 {
        queue!(out, SetAttribute(Attribute::Bold))?;
    }
    if cell.attr & ATTR_UNDERLINE != 0 {
        queue!(out, SetAttribute(Attribute::Underlined))?;
    }
    if cell.attr & ATTR_ITALIC != 0 {
        queue!(out, SetAttribute(Attribute::Italic))?;
    }
    if cell.attr & ATTR_REVERSE != 0 {
        queue!(out, SetAttribute(Attribute::Reverse))?;
    }
    if cell.flags & FLAG_DEFAULT_FG == 0 {
        queue!(out, SetForegroundColor(Color::AnsiValue(cell.fg)))?;
    }
    if cell.flags & FLAG_DEFAULT_BG == 0 {
        queue!(out, SetBackgroundColor(Color::AnsiValue(cell.bg)))?;
    }
    Ok(())
}

/// Repaints one pane. Ends with the cursor at the pane's own position, or
/// hidden when the pane is scrolled into history.
pub fn render_pane<W: Write>(out: &mut W, pane: &Pane) -> std::io::Result<()> {
    queue!(out, Hide, SetAttribute(Attribute::Reset))?;
    let mut last: Option<(u8, u8, u8, u8)> = None;

    for y in 0..pane.sy {
        queue!(out, MoveTo(pane.xoff as u16, (pane.yoff + y) as u16))?;
        let Some(line) = pane.grid.display_line(y) else {
            // Below the bottom of available history: blanks.
            queue!(out, SetAttribute(Attribute::Reset), Print(" ".repeat(pane.sx as usize)))?;
            last = None;
            continue;
        };

        let mut x = 0u32;
        while x < pane.sx && (x as usize) < line.len() {
            let cell = &line[x as usize];
            let state = (cell.fg, cell.bg, cell.attr, cell.flags);
            if last != Some(state) {
                apply_style(out, cell)?;
                last = Some(state);
            }
            match cell.text() {
                Some(text) => {
                    queue!(out, Print(text))?;
                    // A wide cell owns the column after it; its spacer is
                    // never rendered.
                    x += cell.render_width();
                }
                None => {
                    queue!(out, Print(" "))?;
                    x += 1;
                }
            }
        }
        if x < pane.sx {
            queue!(out, SetAttribute(Attribute::Reset), Print(" ".repeat((pane.sx - x) as usize)))?;
            last = None;
        }
    }

    queue!(out, SetAttribute(Attribute::Reset))?;
    if pane.grid.scroll_offset > 0 {
        queue!(out, Hide)?;
    } else {
        queue!(
            out,
            MoveTo((pane.xoff + pane.cx) as u16, (pane.yoff + pane.cy) as u16),
            Show
        )?;
    }
    Ok(())
}

/// Draws the vertical border in the column to the pane's right.
pub fn render_pane_border<W: Write>(out: &mut W, pane: &Pane) -> std::io::Result<()> {
    queue!(out, Hide, SetForegroundColor(Color::DarkBlue))?;
    for y in 0..pane.sy {
        queue!(
            out,
            MoveTo((pane.xoff + pane.sx) as u16, (pane.yoff + y) as u16),
            Print("│")
        )?;
    }
    queue!(out, SetAttribute(Attribute::Reset))?;
    Ok(())
}

/// Draws the status bar on the last row: window name left, `[history]`
/// when scrolled, the version string right-aligned, white on blue.
pub fn render_status_bar<W: Write>(
    out: &mut W,
    name: &str,
    cols: u16,
    rows: u16,
    in_history: bool,
) -> std::io::Result<()> {
    queue!(
        out,
        Hide,
        MoveTo(0, rows.saturating_sub(1)),
        SetForegroundColor(Color::White),
        SetBackgroundColor(Color::DarkBlue),
        Print(format!(" {name} "))
    )?;
    let mut used = UnicodeWidthStr::width(name) + 2;
    if in_history {
        queue!(out, Print(HISTORY_MARKER))?;
        used += HISTORY_MARKER.len();
    }

    let cols = cols as usize;
    let version_len = VERSION_STRING.len() + 1;
    if cols > used + version_len {
        queue!(
            out,
            Print(" ".repeat(cols - used - version_len)),
            Print(VERSION_STRING),
            Print(" ")
        )?;
    }
    queue!(
        out,
        Clear(ClearType::UntilNewLine),
        SetAttribute(Attribute::Reset)
    )?;
    Ok(())
}

/// Places (or hides) the terminal cursor for the active pane.
pub fn position_cursor<W: Write>(
    out: &mut W,
    pane: &Pane,
    sync_input_mode: bool,
) -> std::io::Result<()> {
    if pane.grid.scroll_offset > 0 {
        queue!(out, Hide)?;
        return Ok(());
    }
    if sync_input_mode {
        queue!(out, SetCursorStyle::SteadyUnderScore)?;
    }
    queue!(
        out,
        MoveTo((pane.xoff + pane.cx) as u16, (pane.yoff + pane.cy) as u16),
        Show
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pane_with_text(text: &str) -> Pane {
        let mut pane = Pane::new(0, 20, 4, 0, 0);
        pane.input(text.as_bytes());
        pane
    }

    #[test]
    fn pane_render_emits_text_and_cursor() {
        let pane = pane_with_text("hi");
        let mut out = Vec::new();
        render_pane(&mut out, &pane).unwrap();
        let rendered = String::from_utf8_lossy(&out);

        assert!(rendered.contains("hi"));
        // Hidden while painting, shown at the cursor afterwards.
        assert!(rendered.contains("\x1b[?25l"));
        assert!(rendered.ends_with("\x1b[?25h"));
        // Row 0 of a pane at the origin is addressed as 1;1.
        assert!(rendered.contains("\x1b[1;1H"));
    }

    #[test]
    fn scrolled_pane_keeps_cursor_hidden() {
        let mut pane = Pane::new(0, 10, 2, 0, 0);
        pane.input(b"a\r\nb\r\nc\r\nd");
        pane.grid.scroll_up(1);

        let mut out = Vec::new();
        render_pane(&mut out, &pane).unwrap();
        let rendered = String::from_utf8_lossy(&out);
        assert!(!rendered.contains("\x1b[?25h"));
    }

    #[test]
    fn colored_cells_emit_256_color_sequences() {
        let mut pane = pane_with_text("");
        pane.input(b"\x1b[38;5;201mX");
        let mut out = Vec::new();
        render_pane(&mut out, &pane).unwrap();
        let rendered = String::from_utf8_lossy(&out);
        assert!(rendered.contains("\x1b[38;5;201m"));
    }

    #[test]
    fn default_colors_emit_no_color_sequence() {
        let pane = pane_with_text("plain");
        let mut out = Vec::new();
        render_pane(&mut out, &pane).unwrap();
        let rendered = String::from_utf8_lossy(&out);
        assert!(!rendered.contains("\x1b[38;5;"));
        assert!(!rendered.contains("\x1b[48;5;"));
    }

    #[test]
    fn border_is_blue_bars_in_the_gutter_column() {
        let pane = Pane::new(0, 10, 3, 0, 0);
        let mut out = Vec::new();
        render_pane_border(&mut out, &pane).unwrap();
        let rendered = String::from_utf8_lossy(&out);
        assert!(rendered.contains("\x1b[38;5;4m"));
        assert_eq!(rendered.matches('│').count(), 3);
        // Border column is one past the pane's right edge (col 11, 1-based).
        assert!(rendered.contains("\x1b[1;11H"));
    }

    #[test]
    fn status_bar_is_white_on_blue_with_version() {
        let mut out = Vec::new();
        render_status_bar(&mut out, "New Window", 80, 24, false).unwrap();
        let rendered = String::from_utf8_lossy(&out);
        assert!(rendered.contains("\x1b[38;5;15m"));
        assert!(rendered.contains("\x1b[48;5;4m"));
        assert!(rendered.contains(" New Window "));
        assert!(rendered.contains(VERSION_STRING));
        assert!(!rendered.contains(HISTORY_MARKER));
        // Last row, first column.
        assert!(rendered.contains("\x1b[24;1H"));
    }

    #[test]
    fn status_bar_shows_history_marker() {
        let mut out = Vec::new();
        render_status_bar(&mut out, "New Window", 80, 24, true).unwrap();
        assert!(String::from_utf8_lossy(&out).contains(HISTORY_MARKER));
    }

    #[test]
    fn cursor_positioning_respects_offsets() {
        let mut pane = Pane::new(0, 10, 4, 11, 0);
        pane.input(b"ab");
        let mut out = Vec::new();
        position_cursor(&mut out, &pane, false).unwrap();
        let rendered = String::from_utf8_lossy(&out);
        // Column 11 + cursor 2, 1-based → 14.
        assert!(rendered.contains("\x1b[1;14H"));
        assert!(rendered.ends_with("\x1b[?25h"));
    }
}
