//! Emulator cell → grid cell conversion.
//!
//! The emulator reports cells with full color fidelity; the grid stores an
//! 8-bit palette index plus default-color flags. Indexed colors pass
//! through, named colors map to their palette slots, and RGB colors are
//! projected onto the 216-color cube.

use alacritty_terminal::term::cell::{Cell as TermCell, Flags};
use alacritty_terminal::vte::ansi::{Color, NamedColor, Rgb};

use muxkit_grid::{
    Cell, ATTR_BOLD, ATTR_ITALIC, ATTR_REVERSE, ATTR_UNDERLINE, FLAG_DEFAULT_BG, FLAG_DEFAULT_FG,
};

/// Projects an RGB color onto the 216-color cube.
fn rgb_to_cube(rgb: Rgb) -> u8 {
    let r = u16::from(rgb.r) / 51;
    let g = u16::from(rgb.g) / 51;
    let b = u16::from(rgb.b) / 51;
    (16 + r * 36 + g * 6 + b) as u8
}

fn named_to_index(named: NamedColor) -> u8 {
    match named {
        NamedColor::Black | NamedColor::DimBlack => 0,
        NamedColor::Red | NamedColor::DimRed => 1,
        NamedColor::Green | NamedColor::DimGreen => 2,
        NamedColor::Yellow | NamedColor::DimYellow => 3,
        NamedColor::Blue | NamedColor::DimBlue => 4,
        NamedColor::Magenta | NamedColor::DimMagenta => 5,
        NamedColor::Cyan | NamedColor::DimCyan => 6,
        NamedColor::White | NamedColor::DimWhite | NamedColor::DimForeground => 7,
        NamedColor::BrightBlack => 8,
        NamedColor::BrightRed => 9,
        NamedColor::BrightGreen => 10,
        NamedColor::BrightYellow => 11,
        NamedColor::BrightBlue => 12,
        NamedColor::BrightMagenta => 13,
        NamedColor::BrightCyan => 14,
        NamedColor::BrightWhite | NamedColor::BrightForeground => 15,
        // Cursor and the default pair are handled by the caller; falling
        // through here keeps them visible rather than black.
        NamedColor::Foreground | NamedColor::Background | NamedColor::Cursor => 7,
    }
}

/// Converts one emulator cell into the grid representation.
///
/// A wide character's spacer cell converts to a zeroed cell; the renderer
/// skips it by advancing past the wide cell's width.
pub fn convert_cell(cell: &TermCell) -> Cell {
    if cell.flags.contains(Flags::WIDE_CHAR_SPACER) {
        return Cell::BLANK;
    }

    let mut out = Cell::BLANK;
    out.set_char(cell.c);
    out.width = if cell.flags.contains(Flags::WIDE_CHAR) {
        2
    } else {
        1
    };

    match cell.fg {
        Color::Named(NamedColor::Foreground) => out.flags |= FLAG_DEFAULT_FG,
        Color::Named(named) => out.fg = named_to_index(named),
        Color::Indexed(idx) => out.fg = idx,
        Color::Spec(rgb) => out.fg = rgb_to_cube(rgb),
    }
    match cell.bg {
        Color::Named(NamedColor::Background) => out.flags |= FLAG_DEFAULT_BG,
        Color::Named(named) => out.bg = named_to_index(named),
        Color::Indexed(idx) => out.bg = idx,
        Color::Spec(rgb) => out.bg = rgb_to_cube(rgb),
    }

    if cell.flags.contains(Flags::BOLD) {
        out.attr |= ATTR_BOLD;
    }
    if cell.flags.contains(Flags::UNDERLINE) {
        out.attr |= ATTR_UNDERLINE;
    }
    if cell.flags.contains(Flags::ITALIC) {
        out.attr |= ATTR_ITALIC;
    }
    if cell.flags.contains(Flags::INVERSE) {
        out.attr |= ATTR_REVERSE;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rgb_projection_matches_cube_formula() {
        // Pure red saturates the red axis: 16 + 5*36 = 196.
        assert_eq!(rgb_to_cube(Rgb { r: 255, g: 0, b: 0 }), 196);
        // Black lands on the cube origin.
        assert_eq!(rgb_to_cube(Rgb { r: 0, g: 0, b: 0 }), 16);
        // White saturates all axes: 16 + 5*36 + 5*6 + 5 = 231.
        assert_eq!(
            rgb_to_cube(Rgb {
                r: 255,
                g: 255,
                b: 255
            }),
            231
        );
    }

    #[test]
    fn default_colors_set_flags() {
        let mut cell = TermCell::default();
        cell.c = 'x';
        cell.fg = Color::Named(NamedColor::Foreground);
        cell.bg = Color::Named(NamedColor::Background);
        let out = convert_cell(&cell);
        assert_eq!(out.flags, FLAG_DEFAULT_FG | FLAG_DEFAULT_BG);
    }

    #[test]
    fn indexed_colors_pass_through() {
        let mut cell = TermCell::default();
        cell.c = 'x';
        cell.fg = Color::Indexed(201);
        cell.bg = Color::Indexed(17);
        let out = convert_cell(&cell);
        assert_eq!(out.fg, 201);
        assert_eq!(out.bg, 17);
        assert_eq!(out.flags & FLAG_DEFAULT_FG, 0);
    }

    #[test]
    fn bright_named_colors_map_high() {
        let mut cell = TermCell::default();
        cell.c = 'x';
        cell.fg = Color::Named(NamedColor::BrightCyan);
        assert_eq!(convert_cell(&cell).fg, 14);
    }

    #[test]
    fn attributes_become_bitmask() {
        let mut cell = TermCell::default();
        cell.c = 'x';
        cell.flags.insert(Flags::BOLD | Flags::INVERSE);
        let out = convert_cell(&cell);
        assert_eq!(out.attr, ATTR_BOLD | ATTR_REVERSE);
    }

    #[test]
    fn wide_char_and_spacer() {
        let mut wide = TermCell::default();
        wide.c = '界';
        wide.flags.insert(Flags::WIDE_CHAR);
        assert_eq!(convert_cell(&wide).width, 2);

        let mut spacer = TermCell::default();
        spacer.flags.insert(Flags::WIDE_CHAR_SPACER);
        assert_eq!(convert_cell(&spacer), Cell::BLANK);
    }
}
