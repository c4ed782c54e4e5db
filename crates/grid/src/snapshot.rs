//! Grid snapshot codec.
//!
//! A snapshot is the byte buffer a front-end produces from a pane's grid at
//! detach time and replays into the same pane on the next attach. Layout:
//! eight native-endian `u32` words (`pane_id, cx, cy, width, height,
//! history_size, history_count, scroll_offset`), then the live cells as
//! `width × height` 10-byte records, then the stored history rows oldest
//! first, unwrapping the ring.
//!
//! The layout is deliberately not portable across architectures: emitter and
//! consumer are the same binary on the same machine, and cross-version
//! durability is a non-goal.

use thiserror::Error;

use crate::cell::Cell;
use crate::grid::Grid;

/// Number of header words in a snapshot.
const HEADER_WORDS: usize = 8;
const HEADER_SIZE: usize = HEADER_WORDS * 4;

/// A snapshot failed to decode.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SnapshotError {
    #[error("snapshot shorter than its header ({0} bytes)")]
    TruncatedHeader(usize),
    #[error("snapshot body truncated: expected {expected} bytes, got {actual}")]
    TruncatedBody { expected: usize, actual: usize },
}

/// Cursor restored from a snapshot, relative to the pane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotCursor {
    pub cx: u32,
    pub cy: u32,
}

/// Serializes `grid` together with the owning pane's id and cursor.
pub fn serialize(grid: &Grid, pane_id: u32, cx: u32, cy: u32) -> Vec<u8> {
    let stored = grid.stored();
    let cell_count = (grid.width * grid.height + stored * grid.width) as usize;
    let mut buf = Vec::with_capacity(HEADER_SIZE + cell_count * Cell::ENCODED_SIZE);

    for word in [
        pane_id,
        cx,
        cy,
        grid.width,
        grid.height,
        grid.history_size,
        grid.history_count,
        grid.scroll_offset,
    ] {
        buf.extend_from_slice(&word.to_ne_bytes());
    }
    for cell in grid.live_cells() {
        cell.encode(&mut buf);
    }
    for k in 0..stored {
        for cell in grid.history_row(k) {
            cell.encode(&mut buf);
        }
    }
    buf
}

/// Decodes `buf` into `grid`, replacing its buffers.
///
/// On success the grid holds the snapshot's live cells and its history rows
/// in chronological order starting at slot zero, with `history_count` reset
/// to the number of rows actually replayed. Returns the pane id and cursor
/// recorded at serialization time.
pub fn deserialize(grid: &mut Grid, buf: &[u8]) -> Result<(u32, SnapshotCursor), SnapshotError> {
    if buf.len() < HEADER_SIZE {
        return Err(SnapshotError::TruncatedHeader(buf.len()));
    }
    let mut words = [0u32; HEADER_WORDS];
    for (i, word) in words.iter_mut().enumerate() {
        let mut raw = [0u8; 4];
        raw.copy_from_slice(&buf[i * 4..i * 4 + 4]);
        *word = u32::from_ne_bytes(raw);
    }
    let [pane_id, cx, cy, width, height, history_size, history_count, scroll_offset] = words;

    let stored = history_count.min(history_size);
    let live_count = (width * height) as usize;
    let hist_count = (stored * width) as usize;
    let expected = HEADER_SIZE + (live_count + hist_count) * Cell::ENCODED_SIZE;
    if buf.len() < expected {
        return Err(SnapshotError::TruncatedBody {
            expected,
            actual: buf.len(),
        });
    }

    let mut offset = HEADER_SIZE;
    let mut take = |n: usize| {
        let cells: Vec<Cell> = buf[offset..offset + n * Cell::ENCODED_SIZE]
            .chunks_exact(Cell::ENCODED_SIZE)
            .map(Cell::decode)
            .collect();
        offset += n * Cell::ENCODED_SIZE;
        cells
    };
    let cells = take(live_count);
    let mut history = take(hist_count);
    // The ring is replayed flat from slot zero; pad to full capacity.
    history.resize((history_size * width) as usize, Cell::BLANK);

    grid.replace_buffers(
        width,
        height,
        history_size,
        cells,
        history,
        stored,
        scroll_offset,
    );
    Ok((pane_id, SnapshotCursor { cx, cy }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_grid() -> Grid {
        let mut g = Grid::new(4, 2, 3);
        for (i, c) in "demo".chars().enumerate() {
            g.cell_mut(i as u32, 0).set_char(c);
        }
        g.cell_mut(0, 1).set_char('!');
        // Push five rows through a three-slot ring to exercise unwrapping.
        for c in ['1', '2', '3', '4', '5'] {
            let row: Vec<Cell> = (0..4).map(|_| Cell::from_char(c)).collect();
            g.push_history_cells(&row, 0);
        }
        g
    }

    fn row_text(row: &[Cell]) -> String {
        row.iter()
            .map(|c| c.text().unwrap_or(" "))
            .collect::<String>()
            .trim_end()
            .to_string()
    }

    #[test]
    fn round_trip_restores_live_cells_and_cursor() {
        let g = sample_grid();
        let bytes = serialize(&g, 7, 3, 1);

        let mut restored = Grid::new(10, 10, 10);
        let (pane_id, cursor) = deserialize(&mut restored, &bytes).unwrap();

        assert_eq!(pane_id, 7);
        assert_eq!(cursor, SnapshotCursor { cx: 3, cy: 1 });
        assert_eq!(restored.width, 4);
        assert_eq!(restored.height, 2);
        assert_eq!(row_text(restored.row(0)), "demo");
        assert_eq!(row_text(restored.row(1)), "!");
    }

    #[test]
    fn round_trip_unwraps_history_chronologically() {
        let g = sample_grid();
        let bytes = serialize(&g, 0, 0, 0);

        let mut restored = Grid::new(1, 1, 1);
        deserialize(&mut restored, &bytes).unwrap();

        // history_count resets to the number of rows replayed.
        assert_eq!(restored.history_count, 3);
        assert_eq!(row_text(restored.history_row(0)), "3333");
        assert_eq!(row_text(restored.history_row(1)), "4444");
        assert_eq!(row_text(restored.history_row(2)), "5555");
    }

    #[test]
    fn truncated_header_is_rejected() {
        let mut g = Grid::new(2, 2, 2);
        assert_eq!(
            deserialize(&mut g, &[0u8; 5]),
            Err(SnapshotError::TruncatedHeader(5))
        );
    }

    #[test]
    fn truncated_body_is_rejected() {
        let g = sample_grid();
        let bytes = serialize(&g, 0, 0, 0);
        let mut restored = Grid::new(1, 1, 1);
        let err = deserialize(&mut restored, &bytes[..bytes.len() - 1]).unwrap_err();
        assert!(matches!(err, SnapshotError::TruncatedBody { .. }));
    }

    #[test]
    fn scroll_offset_survives_round_trip() {
        let mut g = sample_grid();
        g.scroll_up(2);
        let bytes = serialize(&g, 0, 0, 0);
        let mut restored = Grid::new(1, 1, 1);
        deserialize(&mut restored, &bytes).unwrap();
        assert_eq!(restored.scroll_offset, 2);
        assert_eq!(row_text(restored.display_line(0).unwrap()), "4444");
    }
}
