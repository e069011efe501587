//! Core terminal subsystem components.
//!
//! This module contains the command execution engine and its collaborators:
//!
//! - **vfs**: in-memory virtual file system serving the builtins
//! - **session**: scrollback, history, and cwd for one leaf pane
//! - **command**: tokenizer, builtin table, completion, dispatch
//! - **sandbox**: boot lifecycle and I/O gateway for the execution runtime
//!
//! # Control flow
//!
//! ```text
//! input line
//! └── CommandProcessor::execute
//!     ├── builtin  -> mutates VirtualFileSystem / Session directly
//!     └── forward  -> SandboxRuntime (when Ready) -> streamed output
//!                     appended to the session's latest entry
//! ```

pub mod command;
pub mod sandbox;
pub mod session;
pub mod vfs;

pub use command::CommandProcessor;
pub use sandbox::{RuntimeState, SandboxEvent, SandboxRuntime, ShellBackend};
pub use session::{Session, SessionId, TerminalEntry};
pub use vfs::VirtualFileSystem;
