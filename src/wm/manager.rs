//! Window manager - ordered tabs, each owning one pane tree.

use crate::core::session::{Session, SessionId};
use crate::store::ProfileId;

use super::layout::{NavDirection, SplitDirection};
use super::pane::{Pane, PaneId};
use super::tab::{PaneCloseResult, Tab, TabId};

/// What a close request resolved to, reported upward to the host
#[derive(Debug, PartialEq, Eq)]
pub enum CloseRequest {
    /// A pane was removed; the tab survives
    PaneClosed,
    /// The tab's last pane was closed, so the tab went with it
    TabClosed,
    /// The last pane of the last tab: the window should close
    WindowClosed,
}

/// Top-level coordinator for tabs and panes
pub struct WindowManager {
    /// Tabs in display order
    tabs: Vec<Tab>,
    /// Index of the active tab
    active: usize,
    next_tab_id: TabId,
    next_pane_id: PaneId,
    scrollback_limit: usize,
    default_profile: ProfileId,
}

impl WindowManager {
    /// Create a manager with one initial tab
    pub fn new(scrollback_limit: usize, default_profile: &str) -> Self {
        let mut wm = Self {
            tabs: Vec::new(),
            active: 0,
            next_tab_id: 1,
            next_pane_id: 1,
            scrollback_limit,
            default_profile: default_profile.to_string(),
        };
        wm.new_tab();
        wm
    }

    /// Create a new tab and make it active
    pub fn new_tab(&mut self) -> TabId {
        let tab_id = self.next_tab_id;
        self.next_tab_id += 1;
        let pane_id = self.next_pane_id;
        self.next_pane_id += 1;

        let session = Session::new(pane_id, self.scrollback_limit);
        let pane = Pane::new(pane_id, session, self.default_profile.clone());
        let tab = Tab::new(tab_id, format!("{}:shell", tab_id), pane);

        self.tabs.push(tab);
        self.active = self.tabs.len() - 1;
        tab_id
    }

    /// Select a tab by 1-based index (Cmd+1..9)
    pub fn select_tab(&mut self, index: usize) {
        if index >= 1 && index <= self.tabs.len() {
            self.active = index - 1;
        }
    }

    pub fn next_tab(&mut self) {
        if !self.tabs.is_empty() {
            self.active = (self.active + 1) % self.tabs.len();
        }
    }

    pub fn prev_tab(&mut self) {
        if !self.tabs.is_empty() {
            self.active = (self.active + self.tabs.len() - 1) % self.tabs.len();
        }
    }

    pub fn active_tab(&self) -> Option<&Tab> {
        self.tabs.get(self.active)
    }

    pub fn active_tab_mut(&mut self) -> Option<&mut Tab> {
        self.tabs.get_mut(self.active)
    }

    pub fn active_index(&self) -> usize {
        self.active
    }

    pub fn tabs(&self) -> &[Tab] {
        &self.tabs
    }

    /// Split the focused pane of the active tab
    pub fn split(&mut self, direction: SplitDirection) -> Option<PaneId> {
        let pane_id = self.next_pane_id;
        let scrollback_limit = self.scrollback_limit;
        let tab = self.tabs.get_mut(self.active)?;
        let created = tab.split(direction, pane_id, scrollback_limit)?;
        self.next_pane_id += 1;
        Some(created)
    }

    /// Close the focused pane; falls back to closing the tab, then the
    /// window (Cmd+W order)
    pub fn close_focused_pane(&mut self) -> CloseRequest {
        let Some(tab) = self.tabs.get_mut(self.active) else {
            return CloseRequest::WindowClosed;
        };
        match tab.close_focused() {
            PaneCloseResult::Closed => CloseRequest::PaneClosed,
            PaneCloseResult::LastPane => self.close_active_tab(),
        }
    }

    /// Close the active tab; closing the last tab closes the window
    pub fn close_active_tab(&mut self) -> CloseRequest {
        if self.tabs.len() <= 1 {
            return CloseRequest::WindowClosed;
        }
        self.tabs.remove(self.active);
        if self.active >= self.tabs.len() {
            self.active = self.tabs.len() - 1;
        }
        CloseRequest::TabClosed
    }

    /// Move focus geometrically within the active tab
    pub fn navigate(&mut self, direction: NavDirection) {
        if let Some(tab) = self.tabs.get_mut(self.active) {
            tab.navigate(direction);
        }
    }

    /// Session of the focused pane in the active tab
    pub fn focused_session_mut(&mut self) -> Option<&mut Session> {
        self.active_tab_mut()?
            .focused_pane_mut()
            .map(|pane| &mut pane.session)
    }

    pub fn focused_session(&self) -> Option<&Session> {
        self.active_tab()?.focused_pane().map(|pane| &pane.session)
    }

    /// Find a session anywhere (sandbox events carry session ids, and the
    /// originating pane may no longer be focused or on the active tab)
    pub fn session_mut(&mut self, id: SessionId) -> Option<&mut Session> {
        for tab in &mut self.tabs {
            for pane in tab.panes.values_mut() {
                if pane.session.id == id {
                    return Some(&mut pane.session);
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scenario_d_select_tab_by_index() {
        let mut wm = WindowManager::new(100, "default");
        wm.new_tab();
        assert_eq!(wm.active_index(), 1);
        // Cmd+1 selects tab 1 regardless of prior active tab
        wm.select_tab(1);
        assert_eq!(wm.active_index(), 0);
        // Out-of-range selection is a no-op
        wm.select_tab(9);
        assert_eq!(wm.active_index(), 0);
    }

    #[test]
    fn test_tab_cycling_wraps() {
        let mut wm = WindowManager::new(100, "default");
        wm.new_tab();
        wm.new_tab();
        wm.select_tab(3);
        wm.next_tab();
        assert_eq!(wm.active_index(), 0);
        wm.prev_tab();
        assert_eq!(wm.active_index(), 2);
    }

    #[test]
    fn test_close_order_pane_tab_window() {
        let mut wm = WindowManager::new(100, "default");
        wm.split(SplitDirection::Vertical).unwrap();
        assert_eq!(wm.close_focused_pane(), CloseRequest::PaneClosed);
        // Sole pane left: closing it closes the (last) tab -> window
        assert_eq!(wm.close_focused_pane(), CloseRequest::WindowClosed);
    }

    #[test]
    fn test_close_tab_with_others_remaining() {
        let mut wm = WindowManager::new(100, "default");
        wm.new_tab();
        assert_eq!(wm.close_focused_pane(), CloseRequest::TabClosed);
        assert_eq!(wm.tabs().len(), 1);
        assert_eq!(wm.active_index(), 0);
    }

    #[test]
    fn test_pane_ids_unique_across_tabs() {
        let mut wm = WindowManager::new(100, "default");
        wm.split(SplitDirection::Vertical).unwrap();
        wm.new_tab();
        wm.split(SplitDirection::Horizontal).unwrap();

        let mut ids: Vec<PaneId> = wm
            .tabs()
            .iter()
            .flat_map(|t| t.panes.keys().copied())
            .collect();
        ids.sort_unstable();
        let before = ids.len();
        ids.dedup();
        assert_eq!(ids.len(), before);
    }

    #[test]
    fn test_session_lookup_across_tabs() {
        let mut wm = WindowManager::new(100, "default");
        let first_session = wm.focused_session().unwrap().id;
        wm.new_tab();
        assert!(wm.session_mut(first_session).is_some());
        assert!(wm.session_mut(999).is_none());
    }
}
