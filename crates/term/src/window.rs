//! The window: an ordered strip of equal-width vertical panes.

use crate::pane::Pane;

/// A window lays panes out left to right in equal widths with one border
/// column between neighbors; every pane spans the full content height.
/// Exactly one pane is active.
pub struct Window {
    pub name: String,
    panes: Vec<Pane>,
    active: usize,
    next_pane_id: u32,
}

/// Pane geometry computed by [`Window::layout_for`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    pub pane_width: u32,
    pub pane_height: u32,
}

impl Window {
    pub fn new(name: &str) -> Window {
        Window {
            name: name.to_string(),
            panes: Vec::new(),
            active: 0,
            next_pane_id: 0,
        }
    }

    /// Effective per-pane width for `count` panes across `total_width`
    /// columns: `(W − (count−1)) / count`, remainders dropped.
    pub fn pane_width_for(total_width: u32, count: u32) -> u32 {
        (total_width - (count - 1)) / count
    }

    /// Appends a pane and returns a handle to it. Pane ids are assigned
    /// monotonically within the window and never reused.
    pub fn add_pane(&mut self, sx: u32, sy: u32, xoff: u32, yoff: u32) -> &mut Pane {
        let id = self.next_pane_id;
        self.next_pane_id += 1;
        self.panes.push(Pane::new(id, sx, sy, xoff, yoff));
        self.panes.last_mut().expect("pane just pushed")
    }

    pub fn len(&self) -> usize {
        self.panes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.panes.is_empty()
    }

    pub fn panes(&self) -> &[Pane] {
        &self.panes
    }

    pub fn panes_mut(&mut self) -> &mut [Pane] {
        &mut self.panes
    }

    pub fn active_index(&self) -> usize {
        self.active
    }

    pub fn active_pane(&self) -> &Pane {
        &self.panes[self.active]
    }

    pub fn active_pane_mut(&mut self) -> &mut Pane {
        &mut self.panes[self.active]
    }

    /// Moves activation to the next pane in list order, wrapping.
    pub fn next_pane(&mut self) {
        if !self.panes.is_empty() {
            self.active = (self.active + 1) % self.panes.len();
        }
    }

    /// Removes the pane at `index`. If it was active, activation falls to
    /// the pane that follows it in list order (the previous one when the
    /// removed pane was last).
    pub fn remove_pane(&mut self, index: usize) -> Pane {
        let pane = self.panes.remove(index);
        if self.panes.is_empty() {
            self.active = 0;
        } else if index < self.active {
            self.active -= 1;
        } else if self.active >= self.panes.len() {
            self.active = self.panes.len() - 1;
        }
        pane
    }

    /// Recomputes equal-width geometry for a `total_width × pane_height`
    /// content area and applies it to every pane (grid and emulator
    /// resize, offset update). Returns the resulting per-pane size.
    pub fn layout(&mut self, total_width: u32, pane_height: u32) -> Layout {
        let count = self.panes.len().max(1) as u32;
        let pane_width = Self::pane_width_for(total_width, count);
        let mut xoff = 0;
        for pane in &mut self.panes {
            pane.resize(pane_width, pane_height);
            pane.xoff = xoff;
            pane.yoff = 0;
            xoff += pane_width + 1;
        }
        Layout {
            pane_width,
            pane_height,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pane_ids_are_monotone() {
        let mut w = Window::new("test");
        assert_eq!(w.add_pane(10, 5, 0, 0).id, 0);
        assert_eq!(w.add_pane(10, 5, 0, 0).id, 1);
        w.remove_pane(0);
        assert_eq!(w.add_pane(10, 5, 0, 0).id, 2);
    }

    #[test]
    fn split_widths_match_layout_rule() {
        // 80 columns, two panes: 40 and 39 with the border at column 41.
        assert_eq!(Window::pane_width_for(80, 2), 39);
        let mut w = Window::new("test");
        w.add_pane(80, 23, 0, 0);
        w.add_pane(80, 23, 0, 0);
        let layout = w.layout(80, 23);
        assert_eq!(layout.pane_width, 39);
        assert_eq!(w.panes()[0].xoff, 0);
        assert_eq!(w.panes()[1].xoff, 40);
    }

    #[test]
    fn single_pane_takes_full_width() {
        assert_eq!(Window::pane_width_for(80, 1), 80);
    }

    #[test]
    fn removing_active_pane_falls_to_next() {
        let mut w = Window::new("test");
        w.add_pane(10, 5, 0, 0);
        w.add_pane(10, 5, 0, 0);
        w.add_pane(10, 5, 0, 0);

        // Remove the active first pane: the former second becomes active.
        w.remove_pane(0);
        assert_eq!(w.active_index(), 0);
        assert_eq!(w.active_pane().id, 1);
    }

    #[test]
    fn removing_last_active_pane_falls_back() {
        let mut w = Window::new("test");
        w.add_pane(10, 5, 0, 0);
        w.add_pane(10, 5, 0, 0);
        w.next_pane();
        assert_eq!(w.active_pane().id, 1);

        w.remove_pane(1);
        assert_eq!(w.active_pane().id, 0);
    }

    #[test]
    fn next_pane_wraps() {
        let mut w = Window::new("test");
        w.add_pane(10, 5, 0, 0);
        w.add_pane(10, 5, 0, 0);
        w.next_pane();
        w.next_pane();
        assert_eq!(w.active_index(), 0);
    }
}
