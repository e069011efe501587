//! deskterm - a pane-splitting terminal subsystem.
//!
//! Tabs hold binary trees of split panes; each leaf pane owns one shell
//! session with its own scrollback, history, and working directory.
//! Builtins run against an in-memory virtual filesystem; everything else
//! is forwarded to a sandbox runtime that boots in the background.
//!
//! # Quick Start
//!
//! ```text
//! deskterm               # Start with the configured shell
//! deskterm -s /bin/bash  # Override the sandbox shell
//! ```
//!
//! # Keybindings
//!
//! | Key | Action |
//! |-----|--------|
//! | Ctrl+T | New tab |
//! | Ctrl+W | Close pane, then tab, then window |
//! | Ctrl+D | Split left/right |
//! | Ctrl+Shift+D | Split top/bottom |
//! | Ctrl+F | Search scrollback |
//! | Ctrl+1..9 | Select tab |
//! | Ctrl+{ / Ctrl+} | Previous / next tab |
//! | Ctrl+Alt+Arrow | Navigate panes |
//! | Ctrl+C | Interrupt the pending command |
//! | Ctrl+, | Preferences |
//! | Ctrl+Shift+S | SSH connections |

mod config;
mod core;
mod store;
mod ui;
mod wm;

use std::env;
use std::time::Duration;

use crossterm::event::{self, Event, KeyEventKind, MouseButton, MouseEventKind};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use crate::config::{data_dir, Preferences, TabBarPosition};
use crate::core::{
    CommandProcessor, SandboxEvent, SandboxRuntime, ShellBackend, VirtualFileSystem,
};
use crate::store::{ProfileStore, SshConnectionRegistry};
use crate::ui::shortcuts::{self, Action, Overlay, OverlayStack};
use crate::ui::Renderer;
use crate::wm::{CloseRequest, WindowManager};

/// Command line options
#[derive(Default)]
struct CliArgs {
    /// Shell override (takes precedence over preferences)
    shell: Option<String>,
}

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn print_help() {
    eprintln!("deskterm {} - a pane-splitting terminal subsystem", VERSION);
    eprintln!();
    eprintln!("Usage: deskterm [OPTIONS]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -s, --shell <CMD>     Shell backing the sandbox runtime");
    eprintln!("  -v, --version         Show version");
    eprintln!("  -h, --help            Show this help");
    eprintln!();
    eprintln!("Configuration: ~/.deskterm/config.toml");
    eprintln!("Profiles:      ~/.deskterm/profiles.toml");
    eprintln!("Connections:   ~/.deskterm/ssh.toml");
}

fn parse_args() -> Result<CliArgs, String> {
    let args: Vec<String> = env::args().collect();
    let mut parsed = CliArgs::default();
    let mut i = 1;

    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            "-v" | "--version" => {
                eprintln!("deskterm {}", VERSION);
                std::process::exit(0);
            }
            "-s" | "--shell" => {
                i += 1;
                if i >= args.len() {
                    return Err("missing shell argument".to_string());
                }
                parsed.shell = Some(args[i].clone());
            }
            arg => {
                return Err(format!("unknown argument: {}. Use -h for help.", arg));
            }
        }
        i += 1;
    }

    Ok(parsed)
}

fn init_logging() {
    let log_path = data_dir()
        .map(|dir| dir.join("deskterm.log"))
        .unwrap_or_else(|| std::path::PathBuf::from("deskterm.log"));

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .ok();

    if let Some(file) = log_file {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(Level::INFO)
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false)
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    }
}

fn main() -> anyhow::Result<()> {
    let args = match parse_args() {
        Ok(parsed) => parsed,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("Use --help for usage information");
            std::process::exit(1);
        }
    };

    init_logging();
    info!("deskterm {} starting", VERSION);

    let dir = data_dir();
    let mut prefs = match &dir {
        Some(dir) => Preferences::load(&dir.join("config.toml")),
        None => Preferences::default(),
    };
    if let Some(shell) = args.shell {
        prefs.shell = shell;
    }
    let profiles = match &dir {
        Some(dir) => ProfileStore::load(&dir.join("profiles.toml")),
        None => ProfileStore::in_memory(),
    };
    let ssh = match &dir {
        Some(dir) => SshConnectionRegistry::load(&dir.join("ssh.toml")),
        None => SshConnectionRegistry::in_memory(),
    };

    info!("shell: {}", prefs.shell);
    info!("profiles: {}", profiles.profiles().len());
    info!("saved connections: {}", ssh.connections().len());

    let mut wm = WindowManager::new(prefs.scrollback_limit, profiles.default_id());
    let mut vfs = VirtualFileSystem::new();
    let mut sandbox = SandboxRuntime::new(std::sync::Arc::new(ShellBackend::new(&prefs.shell)));
    sandbox.boot();

    let mut renderer = Renderer::new();
    renderer.init()?;

    let result = run_loop(
        &mut wm,
        &mut vfs,
        &mut sandbox,
        &mut renderer,
        &prefs,
        &profiles,
        &ssh,
    );

    let _ = renderer.cleanup();
    info!("deskterm exiting");
    result
}

/// The UI loop: drain sandbox events, apply key actions, redraw.
///
/// All session and layout mutation happens here, on one thread; worker
/// threads only feed the sandbox channel.
fn run_loop(
    wm: &mut WindowManager,
    vfs: &mut VirtualFileSystem,
    sandbox: &mut SandboxRuntime,
    renderer: &mut Renderer,
    prefs: &Preferences,
    profiles: &ProfileStore,
    ssh: &SshConnectionRegistry,
) -> anyhow::Result<()> {
    let poll_timeout = Duration::from_millis(10);
    let processor = CommandProcessor::new();
    let mut overlays = OverlayStack::new();
    let mut search_query = String::new();
    let mut dirty = true;

    loop {
        while let Some(event) = sandbox.poll() {
            dirty = true;
            match event {
                SandboxEvent::Booted | SandboxEvent::BootFailed(_) => {}
                SandboxEvent::Output {
                    session,
                    chunk,
                    is_error,
                } => {
                    if let Some(s) = wm.session_mut(session) {
                        s.append_output(&chunk, is_error);
                    }
                }
                SandboxEvent::Done { session, .. } => {
                    // Aborted completions are swallowed by the gateway;
                    // only normal ones arrive here
                    if let Some(s) = wm.session_mut(session) {
                        s.busy = false;
                    }
                }
            }
        }

        if dirty {
            let rect = Renderer::content_rect()?;
            renderer.draw(
                rect,
                wm,
                prefs,
                profiles,
                ssh,
                sandbox.state(),
                &overlays,
                &search_query,
            )?;
            dirty = false;
        }

        if !event::poll(poll_timeout)? {
            continue;
        }
        match event::read()? {
            Event::Key(key_event) => {
                if key_event.kind != KeyEventKind::Press {
                    continue;
                }
                let Some(action) = shortcuts::dispatch(&key_event, &overlays) else {
                    continue;
                };
                dirty = true;
                if apply_action(
                    action,
                    wm,
                    vfs,
                    sandbox,
                    &processor,
                    &mut overlays,
                    &mut search_query,
                ) {
                    break;
                }
            }
            Event::Mouse(mouse_event) => {
                if let MouseEventKind::Drag(MouseButton::Left) = mouse_event.kind {
                    if drag_divider_at(wm, prefs, mouse_event.column, mouse_event.row) {
                        dirty = true;
                    }
                }
            }
            Event::Resize(_, _) => {
                dirty = true;
            }
            _ => {}
        }
    }

    Ok(())
}

/// Apply one action. Returns true when the window should close.
fn apply_action(
    action: Action,
    wm: &mut WindowManager,
    vfs: &mut VirtualFileSystem,
    sandbox: &mut SandboxRuntime,
    processor: &CommandProcessor,
    overlays: &mut OverlayStack,
    search_query: &mut String,
) -> bool {
    // The search overlay captures line editing while it is topmost
    if overlays.top() == Some(Overlay::Search) {
        match action {
            Action::InsertChar(c) => {
                search_query.push(c);
                return false;
            }
            Action::Backspace => {
                search_query.pop();
                return false;
            }
            Action::Submit | Action::HistoryPrev | Action::HistoryNext | Action::Complete => {
                return false;
            }
            _ => {}
        }
    }

    match action {
        Action::NewTab => {
            wm.new_tab();
        }
        Action::Close => {
            let closing = wm.focused_session().map(|s| s.id);
            match wm.close_focused_pane() {
                CloseRequest::WindowClosed => return true,
                CloseRequest::PaneClosed | CloseRequest::TabClosed => {
                    if let Some(id) = closing {
                        sandbox.forget_session(id);
                    }
                }
            }
        }
        Action::Split(direction) => {
            wm.split(direction);
        }
        Action::ToggleSearch => {
            search_query.clear();
            overlays.toggle(Overlay::Search);
        }
        Action::SelectTab(index) => wm.select_tab(index),
        Action::PrevTab => wm.prev_tab(),
        Action::NextTab => wm.next_tab(),
        Action::Navigate(direction) => wm.navigate(direction),
        Action::OpenPreferences => overlays.toggle(Overlay::Preferences),
        Action::OpenSshManager => overlays.toggle(Overlay::SshManager),
        Action::CloseTopOverlay => {
            overlays.pop();
        }
        Action::Interrupt => {
            // Settle right here: a silent command may block its worker
            // past the abort check, so the entry completes on the UI side
            if let Some(session) = wm.focused_session_mut() {
                if sandbox.interrupt(session.id) {
                    session.busy = false;
                    session.append_output("\ninterrupted\n", true);
                }
            }
        }
        Action::Submit => {
            let Some(session) = wm.focused_session_mut() else {
                return false;
            };
            // A busy session rejects the submit; the typed line is kept
            if session.busy {
                return false;
            }
            let line = std::mem::take(&mut session.input);
            session.reset_history_cursor();
            let forwarded = processor.execute(&line, session, vfs, sandbox);
            if forwarded {
                session.busy = true;
            }
        }
        Action::Complete => {
            if let Some(session) = wm.focused_session_mut() {
                if let Some(completed) = processor.complete(&session.input, &session.cwd, vfs) {
                    session.input = completed;
                }
            }
        }
        Action::HistoryPrev => {
            if let Some(session) = wm.focused_session_mut() {
                session.history_prev();
            }
        }
        Action::HistoryNext => {
            if let Some(session) = wm.focused_session_mut() {
                session.history_next();
            }
        }
        Action::InsertChar(c) => {
            if let Some(session) = wm.focused_session_mut() {
                session.input.push(c);
                session.reset_history_cursor();
            }
        }
        Action::Backspace => {
            if let Some(session) = wm.focused_session_mut() {
                session.input.pop();
                session.reset_history_cursor();
            }
        }
    }
    false
}

/// Translate a mouse drag into a divider move on the active tab
fn drag_divider_at(wm: &mut WindowManager, prefs: &Preferences, column: u16, row: u16) -> bool {
    let Ok((cols, rows)) = crossterm::terminal::size() else {
        return false;
    };
    let tab_bar_rows = if prefs.tab_bar.visible { 1u16 } else { 0 };
    let top = if prefs.tab_bar.visible && prefs.tab_bar.position == TabBarPosition::Top {
        1u16
    } else {
        0
    };
    let height = rows.saturating_sub(tab_bar_rows + 1);
    if height == 0 || cols == 0 || row < top {
        return false;
    }
    let px = column as f32 / cols as f32;
    let py = (row - top) as f32 / height as f32;
    match wm.active_tab_mut() {
        Some(tab) => tab.layout.drag_divider(px, py, 0.04),
        None => false,
    }
}
