//! Tab - one layout tree plus the panes it references.

use std::collections::HashMap;

use crate::core::session::Session;
use crate::store::ProfileId;

use super::layout::{CloseOutcome, Layout, NavDirection, SplitDirection};
use super::pane::{Pane, PaneId};

/// Unique identifier for a tab
pub type TabId = u64;

/// Result of asking a tab to close its focused pane
#[derive(Debug, PartialEq, Eq)]
pub enum PaneCloseResult {
    /// Pane removed, tree collapsed one level
    Closed,
    /// The focused pane was the sole leaf; the tab should be closed
    LastPane,
}

/// A tab: one pane tree, exactly one focused leaf
pub struct Tab {
    pub id: TabId,
    pub title: String,
    pub layout: Layout,
    /// All panes in this tab, keyed by id; the layout holds the structure
    pub panes: HashMap<PaneId, Pane>,
    pub focused_pane: PaneId,
}

impl Tab {
    /// Create a tab around an initial pane
    pub fn new(id: TabId, title: String, mut pane: Pane) -> Self {
        pane.focused = true;
        let pane_id = pane.id;
        let mut panes = HashMap::new();
        panes.insert(pane_id, pane);
        Self {
            id,
            title,
            layout: Layout::new(pane_id),
            panes,
            focused_pane: pane_id,
        }
    }

    /// Split the focused pane.
    ///
    /// The new leaf's session inherits the cwd and profile of the origin;
    /// the new leaf takes focus.
    pub fn split(
        &mut self,
        direction: SplitDirection,
        new_pane_id: PaneId,
        scrollback_limit: usize,
    ) -> Option<PaneId> {
        let origin = self.panes.get(&self.focused_pane)?;
        let cwd = origin.session.cwd.clone();
        let profile_id: ProfileId = origin.profile_id.clone();

        if !self.layout.split(self.focused_pane, new_pane_id, direction) {
            return None;
        }

        let session = Session::with_cwd(new_pane_id, scrollback_limit, &cwd);
        self.panes
            .insert(new_pane_id, Pane::new(new_pane_id, session, profile_id));
        self.focus_pane(new_pane_id);
        Some(new_pane_id)
    }

    /// Close the focused pane, collapsing the tree one level.
    ///
    /// Focus transfers to the nearest remaining leaf (sibling subtree
    /// first). Closing the sole leaf is reported as `LastPane` so the
    /// manager can close the tab instead.
    pub fn close_focused(&mut self) -> PaneCloseResult {
        match self.layout.close(self.focused_pane) {
            CloseOutcome::CloseTab => PaneCloseResult::LastPane,
            CloseOutcome::Closed { focus } => {
                self.panes.remove(&self.focused_pane);
                self.focused_pane = focus;
                self.focus_pane(focus);
                PaneCloseResult::Closed
            }
            CloseOutcome::NotFound => PaneCloseResult::Closed,
        }
    }

    /// Move focus to a specific pane
    pub fn focus_pane(&mut self, pane_id: PaneId) {
        if !self.panes.contains_key(&pane_id) {
            return;
        }
        if let Some(pane) = self.panes.get_mut(&self.focused_pane) {
            pane.focused = false;
        }
        if let Some(pane) = self.panes.get_mut(&pane_id) {
            pane.focused = true;
            self.focused_pane = pane_id;
        }
    }

    /// Move focus geometrically
    pub fn navigate(&mut self, direction: NavDirection) -> Option<PaneId> {
        let target = self.layout.navigate(self.focused_pane, direction)?;
        self.focus_pane(target);
        Some(target)
    }

    pub fn focused_pane(&self) -> Option<&Pane> {
        self.panes.get(&self.focused_pane)
    }

    pub fn focused_pane_mut(&mut self) -> Option<&mut Pane> {
        self.panes.get_mut(&self.focused_pane)
    }

    pub fn pane_count(&self) -> usize {
        self.panes.len()
    }
}
