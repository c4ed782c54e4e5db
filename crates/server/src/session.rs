//! Server-side sessions.
//!
//! A session is the unit of persistence: pane slots holding PTY masters and
//! shell children, the cached window size, the detached flag, and per-pane
//! grid snapshots waiting for the next attach. Ids are assigned
//! monotonically (highest existing + 1, starting at 0) and never reused.

use muxkit_protocol::{WindowSize, MAX_PANES};

use crate::spawn::SpawnedPane;

/// One pane slot. A reaped slot becomes `None`; slot indexes are stable for
/// the life of the session so they keep lining up with the front-end's pane
/// ids.
pub type PaneSlot = Option<SpawnedPane>;

pub struct Session {
    pub id: u32,
    /// Index of the bound connection in the dispatcher's table, when a
    /// front-end is attached.
    pub client: Option<usize>,
    pub detached: bool,
    panes: Vec<PaneSlot>,
    /// Most recent window size reported by the front-end. Used only as the
    /// initial PTY size for panes spawned later; never propagated to
    /// existing PTYs (the front-end is authoritative for those).
    pub window_size: WindowSize,
    /// Cached detach snapshots, indexed by pane id.
    snapshots: Vec<Option<Vec<u8>>>,
    /// Set once every pane's shell has been reaped; the dispatcher removes
    /// the session on its next sweep.
    pub defunct: bool,
}

impl Session {
    pub fn new(id: u32, client: usize) -> Session {
        Session {
            id,
            client: Some(client),
            detached: false,
            panes: Vec::new(),
            window_size: WindowSize::default(),
            snapshots: Vec::new(),
            defunct: false,
        }
    }

    /// Id for the next session given the current list (insertion ordered).
    pub fn next_id(sessions: &[Session]) -> u32 {
        sessions.last().map_or(0, |s| s.id + 1)
    }

    pub fn pane_count(&self) -> usize {
        self.panes.len()
    }

    pub fn can_add_pane(&self) -> bool {
        self.panes.len() < MAX_PANES
    }

    pub fn add_pane(&mut self, pane: SpawnedPane) {
        debug_assert!(self.can_add_pane());
        self.panes.push(Some(pane));
        self.snapshots.push(None);
    }

    pub fn panes_mut(&mut self) -> &mut [PaneSlot] {
        &mut self.panes
    }

    /// Live panes in slot order.
    pub fn live_panes(&self) -> impl Iterator<Item = &SpawnedPane> {
        self.panes.iter().flatten()
    }

    pub fn live_count(&self) -> usize {
        self.panes.iter().flatten().count()
    }

    /// Pid shown in session listings: the first live shell.
    pub fn display_pid(&self) -> Option<u32> {
        self.live_panes().next().map(|p| p.pid)
    }

    /// Stores a detach snapshot under its pane id; the previous snapshot
    /// for that pane is replaced.
    pub fn store_snapshot(&mut self, pane_id: u32, data: Vec<u8>) -> bool {
        let idx = pane_id as usize;
        if idx >= MAX_PANES {
            return false;
        }
        if idx >= self.snapshots.len() {
            self.snapshots.resize(idx + 1, None);
        }
        self.snapshots[idx] = Some(data);
        true
    }

    /// Snapshots present, in pane-id order.
    pub fn snapshot_count(&self) -> usize {
        self.snapshots.iter().flatten().filter(|s| !s.is_empty()).count()
    }

    /// Hands out all cached snapshots, clearing the cache; the next attach
    /// starts from live emulator state only.
    pub fn take_snapshots(&mut self) -> Vec<Vec<u8>> {
        self.snapshots
            .iter_mut()
            .filter_map(Option::take)
            .filter(|s| !s.is_empty())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_monotone_from_zero() {
        let mut sessions: Vec<Session> = Vec::new();
        assert_eq!(Session::next_id(&sessions), 0);
        sessions.push(Session::new(0, 0));
        sessions.push(Session::new(1, 1));
        assert_eq!(Session::next_id(&sessions), 2);

        // Removal never frees an id for reuse.
        sessions.remove(0);
        assert_eq!(Session::next_id(&sessions), 2);
    }

    #[test]
    fn snapshot_store_and_take() {
        let mut s = Session::new(0, 0);
        assert!(s.store_snapshot(1, vec![1, 2, 3]));
        assert!(s.store_snapshot(0, vec![9]));
        assert!(!s.store_snapshot(MAX_PANES as u32, vec![0]));

        assert_eq!(s.snapshot_count(), 2);
        let taken = s.take_snapshots();
        assert_eq!(taken, vec![vec![9], vec![1, 2, 3]]);
        assert_eq!(s.snapshot_count(), 0);
    }

    #[test]
    fn empty_session_lists_nothing() {
        let mut s = Session::new(0, 0);
        assert!(s.display_pid().is_none());
        assert!(s.can_add_pane());
        assert_eq!(s.take_snapshots(), Vec::<Vec<u8>>::new());
    }
}
