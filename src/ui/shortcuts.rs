//! Keyboard shortcut dispatch.
//!
//! One central table maps key events to actions, consulted by the event
//! loop; overlays never install their own listeners. The platform
//! "command" key maps to CONTROL on a terminal host, Option to ALT.
//! Escape always closes the topmost overlay first.

use bitflags::bitflags;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::wm::{NavDirection, SplitDirection};

bitflags! {
    /// Modifier keys
    #[derive(Clone, Copy, Debug, Default, PartialEq)]
    pub struct Modifiers: u8 {
        const SHIFT = 0b0001;
        const CTRL  = 0b0010;
        const ALT   = 0b0100;
    }
}

impl From<KeyModifiers> for Modifiers {
    fn from(mods: KeyModifiers) -> Self {
        let mut result = Modifiers::empty();
        if mods.contains(KeyModifiers::SHIFT) {
            result |= Modifiers::SHIFT;
        }
        if mods.contains(KeyModifiers::CONTROL) {
            result |= Modifiers::CTRL;
        }
        if mods.contains(KeyModifiers::ALT) {
            result |= Modifiers::ALT;
        }
        result
    }
}

/// Overlays that can sit above the terminal surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Overlay {
    Search,
    SshManager,
    Preferences,
}

/// Explicit stack of mounted overlays; Escape closes the topmost
#[derive(Default)]
pub struct OverlayStack {
    stack: Vec<Overlay>,
}

impl OverlayStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, overlay: Overlay) {
        if !self.stack.contains(&overlay) {
            self.stack.push(overlay);
        }
    }

    pub fn pop(&mut self) -> Option<Overlay> {
        self.stack.pop()
    }

    pub fn top(&self) -> Option<Overlay> {
        self.stack.last().copied()
    }

    pub fn toggle(&mut self, overlay: Overlay) {
        if self.top() == Some(overlay) {
            self.stack.pop();
        } else {
            self.stack.retain(|o| *o != overlay);
            self.stack.push(overlay);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }
}

/// Everything a key event can ask the application to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    NewTab,
    /// Close pane, else tab, else window
    Close,
    Split(SplitDirection),
    ToggleSearch,
    SelectTab(usize),
    PrevTab,
    NextTab,
    Navigate(NavDirection),
    OpenPreferences,
    OpenSshManager,
    CloseTopOverlay,
    /// Interrupt the pending command in the focused session
    Interrupt,
    Submit,
    Complete,
    HistoryPrev,
    HistoryNext,
    InsertChar(char),
    Backspace,
}

/// Map a key event to an action, honoring the overlay stack.
///
/// Returns None for keys with no binding in the current context.
pub fn dispatch(event: &KeyEvent, overlays: &OverlayStack) -> Option<Action> {
    let mods = Modifiers::from(event.modifiers);

    // Escape closes the topmost overlay before anything else sees it
    if event.code == KeyCode::Esc {
        return if overlays.is_empty() {
            None
        } else {
            Some(Action::CloseTopOverlay)
        };
    }

    if mods.contains(Modifiers::CTRL) {
        let shifted = mods.contains(Modifiers::SHIFT);
        let alted = mods.contains(Modifiers::ALT);

        if alted {
            // Cmd+Option+Arrow: navigate panes by direction
            return match event.code {
                KeyCode::Left => Some(Action::Navigate(NavDirection::Left)),
                KeyCode::Right => Some(Action::Navigate(NavDirection::Right)),
                KeyCode::Up => Some(Action::Navigate(NavDirection::Up)),
                KeyCode::Down => Some(Action::Navigate(NavDirection::Down)),
                _ => None,
            };
        }

        return match event.code {
            KeyCode::Char('t') => Some(Action::NewTab),
            KeyCode::Char('w') => Some(Action::Close),
            KeyCode::Char('d') if shifted => {
                Some(Action::Split(SplitDirection::Horizontal))
            }
            KeyCode::Char('D') => Some(Action::Split(SplitDirection::Horizontal)),
            KeyCode::Char('d') => Some(Action::Split(SplitDirection::Vertical)),
            KeyCode::Char('f') => Some(Action::ToggleSearch),
            KeyCode::Char(',') => Some(Action::OpenPreferences),
            KeyCode::Char('s') if shifted => Some(Action::OpenSshManager),
            KeyCode::Char('S') => Some(Action::OpenSshManager),
            KeyCode::Char('{') => Some(Action::PrevTab),
            KeyCode::Char('}') => Some(Action::NextTab),
            KeyCode::Char('[') if shifted => Some(Action::PrevTab),
            KeyCode::Char(']') if shifted => Some(Action::NextTab),
            KeyCode::Char('c') => Some(Action::Interrupt),
            KeyCode::Char(c @ '1'..='9') => {
                Some(Action::SelectTab(c as usize - '0' as usize))
            }
            _ => None,
        };
    }

    // Unmodified keys edit the focused line (or the topmost overlay's
    // query; the application routes by overlay)
    match event.code {
        KeyCode::Enter => Some(Action::Submit),
        KeyCode::Tab => Some(Action::Complete),
        KeyCode::Up => Some(Action::HistoryPrev),
        KeyCode::Down => Some(Action::HistoryNext),
        KeyCode::Backspace => Some(Action::Backspace),
        KeyCode::Char(c) => Some(Action::InsertChar(c)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode, mods: KeyModifiers) -> KeyEvent {
        KeyEvent::new(code, mods)
    }

    #[test]
    fn test_tab_and_pane_shortcuts() {
        let overlays = OverlayStack::new();
        assert_eq!(
            dispatch(&key(KeyCode::Char('t'), KeyModifiers::CONTROL), &overlays),
            Some(Action::NewTab)
        );
        assert_eq!(
            dispatch(&key(KeyCode::Char('d'), KeyModifiers::CONTROL), &overlays),
            Some(Action::Split(SplitDirection::Vertical))
        );
        assert_eq!(
            dispatch(
                &key(
                    KeyCode::Char('d'),
                    KeyModifiers::CONTROL | KeyModifiers::SHIFT
                ),
                &overlays
            ),
            Some(Action::Split(SplitDirection::Horizontal))
        );
        assert_eq!(
            dispatch(&key(KeyCode::Char('w'), KeyModifiers::CONTROL), &overlays),
            Some(Action::Close)
        );
    }

    #[test]
    fn test_select_tab_by_number() {
        let overlays = OverlayStack::new();
        assert_eq!(
            dispatch(&key(KeyCode::Char('1'), KeyModifiers::CONTROL), &overlays),
            Some(Action::SelectTab(1))
        );
        assert_eq!(
            dispatch(&key(KeyCode::Char('9'), KeyModifiers::CONTROL), &overlays),
            Some(Action::SelectTab(9))
        );
    }

    #[test]
    fn test_navigate_requires_both_modifiers() {
        let overlays = OverlayStack::new();
        assert_eq!(
            dispatch(
                &key(KeyCode::Left, KeyModifiers::CONTROL | KeyModifiers::ALT),
                &overlays
            ),
            Some(Action::Navigate(NavDirection::Left))
        );
        // Plain arrow is history recall, not navigation
        assert_eq!(
            dispatch(&key(KeyCode::Up, KeyModifiers::NONE), &overlays),
            Some(Action::HistoryPrev)
        );
    }

    #[test]
    fn test_escape_closes_topmost_overlay_only() {
        let mut overlays = OverlayStack::new();
        assert_eq!(dispatch(&key(KeyCode::Esc, KeyModifiers::NONE), &overlays), None);

        overlays.push(Overlay::Search);
        overlays.push(Overlay::Preferences);
        assert_eq!(
            dispatch(&key(KeyCode::Esc, KeyModifiers::NONE), &overlays),
            Some(Action::CloseTopOverlay)
        );
        assert_eq!(overlays.pop(), Some(Overlay::Preferences));
        assert_eq!(overlays.top(), Some(Overlay::Search));
    }

    #[test]
    fn test_overlay_toggle() {
        let mut overlays = OverlayStack::new();
        overlays.toggle(Overlay::Search);
        assert_eq!(overlays.top(), Some(Overlay::Search));
        overlays.toggle(Overlay::Search);
        assert!(overlays.is_empty());
    }

    #[test]
    fn test_plain_typing() {
        let overlays = OverlayStack::new();
        assert_eq!(
            dispatch(&key(KeyCode::Char('x'), KeyModifiers::NONE), &overlays),
            Some(Action::InsertChar('x'))
        );
        assert_eq!(
            dispatch(&key(KeyCode::Enter, KeyModifiers::NONE), &overlays),
            Some(Action::Submit)
        );
        assert_eq!(
            dispatch(&key(KeyCode::Tab, KeyModifiers::NONE), &overlays),
            Some(Action::Complete)
        );
    }
}
