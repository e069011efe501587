//! User interface - keyboard dispatch and terminal rendering.
//!
//! # Module Hierarchy
//!
//! ```text
//! ui/
//! ├── mod.rs       - module exports
//! ├── shortcuts.rs - central key table, actions, overlay stack
//! └── renderer.rs  - frame drawing into a host-supplied rectangle
//! ```

pub mod renderer;
pub mod shortcuts;

pub use renderer::{ContentRect, Renderer};
pub use shortcuts::{Action, Modifiers, Overlay, OverlayStack};
