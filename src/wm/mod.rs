//! Window management - tabs and split panes.
//!
//! This module provides the multiplexer structure:
//!
//! - **manager**: top-level `WindowManager` coordinating all tabs
//! - **tab**: one tab, one layout tree, one focused leaf
//! - **pane**: leaf payload owning a session
//! - **layout**: the binary tree of splits with its invariants
//!
//! # Module Hierarchy
//!
//! ```text
//! wm/
//! ├── mod.rs      - module exports
//! ├── manager.rs  - WindowManager (ordered tabs, close order)
//! ├── tab.rs      - Tab (layout root + pane table + focus)
//! ├── pane.rs     - Pane (session + profile binding)
//! └── layout.rs   - Layout (Split/Leaf tree, navigation, ratios)
//! ```

pub mod layout;
pub mod manager;
pub mod pane;
pub mod tab;

pub use layout::{Layout, NavDirection, PaneRect, SplitDirection};
pub use manager::{CloseRequest, WindowManager};
pub use pane::{Pane, PaneId};
pub use tab::{Tab, TabId};
