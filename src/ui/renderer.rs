//! Render surface for the multiplexer.
//!
//! Draws the tab bar, pane borders, scrollback entries, the prompt line,
//! and overlays into a content rectangle handed in by the host. The
//! renderer never queries window geometry itself; the host decides how
//! many cells the subsystem gets.

use std::io::{self, Write};

use crossterm::{
    cursor::{Hide, MoveTo, Show},
    execute, queue,
    style::{Attribute, Color, ResetColor, SetAttribute, SetBackgroundColor, SetForegroundColor},
    terminal::{self, Clear, ClearType},
};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::config::{Preferences, TabBarPosition};
use crate::core::sandbox::RuntimeState;
use crate::core::session::Session;
use crate::store::{ProfileStore, SshConnectionRegistry};
use crate::ui::shortcuts::{Overlay, OverlayStack};
use crate::wm::{PaneRect, WindowManager};

/// Rectangle of terminal cells the subsystem is allowed to draw into
#[derive(Debug, Clone, Copy)]
pub struct ContentRect {
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
}

const BORDER_ACTIVE: Color = Color::Rgb {
    r: 122,
    g: 162,
    b: 247,
};
const BORDER_INACTIVE: Color = Color::Rgb {
    r: 65,
    g: 72,
    b: 104,
};
const ERROR_FG: Color = Color::Rgb {
    r: 247,
    g: 118,
    b: 142,
};

/// Terminal renderer. Owns raw mode and the alternate screen for the
/// lifetime of the run.
pub struct Renderer {
    initialized: bool,
}

impl Renderer {
    pub fn new() -> Self {
        Self { initialized: false }
    }

    /// Enter raw mode and the alternate screen
    pub fn init(&mut self) -> io::Result<()> {
        terminal::enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(
            stdout,
            terminal::EnterAlternateScreen,
            crossterm::event::EnableMouseCapture,
            Hide,
            Clear(ClearType::All)
        )?;
        stdout.flush()?;
        self.initialized = true;
        Ok(())
    }

    /// Restore the host terminal
    pub fn cleanup(&mut self) -> io::Result<()> {
        if !self.initialized {
            return Ok(());
        }
        let mut stdout = io::stdout();
        execute!(
            stdout,
            crossterm::event::DisableMouseCapture,
            terminal::LeaveAlternateScreen,
            Show,
            ResetColor
        )?;
        terminal::disable_raw_mode()?;
        self.initialized = false;
        Ok(())
    }

    /// Current terminal size as a content rectangle
    pub fn content_rect() -> io::Result<ContentRect> {
        let (width, height) = terminal::size()?;
        Ok(ContentRect {
            x: 0,
            y: 0,
            width,
            height,
        })
    }

    /// Draw one full frame
    #[allow(clippy::too_many_arguments)]
    pub fn draw(
        &mut self,
        rect: ContentRect,
        wm: &WindowManager,
        prefs: &Preferences,
        profiles: &ProfileStore,
        ssh: &SshConnectionRegistry,
        runtime: &RuntimeState,
        overlays: &OverlayStack,
        search_query: &str,
    ) -> io::Result<()> {
        let mut out = io::stdout();
        queue!(out, Clear(ClearType::All))?;

        let tab_bar_rows = if prefs.tab_bar.visible { 1 } else { 0 };
        let status_rows = 1u16;
        let pane_area = ContentRect {
            x: rect.x,
            y: if prefs.tab_bar.visible && prefs.tab_bar.position == TabBarPosition::Top {
                rect.y + 1
            } else {
                rect.y
            },
            width: rect.width,
            height: rect.height.saturating_sub(tab_bar_rows + status_rows),
        };

        if prefs.tab_bar.visible {
            let bar_y = match prefs.tab_bar.position {
                TabBarPosition::Top => rect.y,
                TabBarPosition::Bottom => {
                    rect.y + rect.height.saturating_sub(status_rows + 1)
                }
            };
            self.draw_tab_bar(&mut out, wm, rect, bar_y)?;
        }

        if let Some(tab) = wm.active_tab() {
            for (pane_id, unit) in tab.layout.rects() {
                let cells = to_cells(unit, pane_area);
                let Some(pane) = tab.panes.get(&pane_id) else {
                    continue;
                };
                let profile = profiles.resolve(&pane.profile_id);
                let text_color = parse_hex_color(&profile.text_color);
                self.draw_pane(&mut out, cells, &pane.session, pane.focused, text_color)?;
            }
        }

        self.draw_status(&mut out, wm, runtime, rect)?;

        match overlays.top() {
            Some(Overlay::Search) => self.draw_search_bar(&mut out, wm, search_query, rect)?,
            Some(Overlay::SshManager) => self.draw_ssh_panel(&mut out, ssh, rect)?,
            Some(Overlay::Preferences) => {
                self.draw_preferences_panel(&mut out, prefs, profiles, rect)?
            }
            None => {}
        }

        queue!(out, ResetColor)?;
        out.flush()
    }

    fn draw_tab_bar(
        &self,
        out: &mut impl Write,
        wm: &WindowManager,
        rect: ContentRect,
        y: u16,
    ) -> io::Result<()> {
        queue!(out, MoveTo(rect.x, y), Clear(ClearType::CurrentLine))?;
        for (i, tab) in wm.tabs().iter().enumerate() {
            if i == wm.active_index() {
                queue!(
                    out,
                    SetAttribute(Attribute::Reverse),
                    SetForegroundColor(BORDER_ACTIVE)
                )?;
            }
            write!(out, " {} ", tab.title)?;
            queue!(out, SetAttribute(Attribute::Reset), ResetColor)?;
        }
        Ok(())
    }

    fn draw_pane(
        &self,
        out: &mut impl Write,
        cells: ContentRect,
        session: &Session,
        focused: bool,
        text_color: Option<Color>,
    ) -> io::Result<()> {
        if cells.width < 3 || cells.height < 3 {
            return Ok(());
        }
        let border = if focused {
            BORDER_ACTIVE
        } else {
            BORDER_INACTIVE
        };
        queue!(out, SetForegroundColor(border))?;

        let right = cells.x + cells.width - 1;
        let bottom = cells.y + cells.height - 1;
        queue!(out, MoveTo(cells.x, cells.y))?;
        write!(out, "┌{}┐", "─".repeat(cells.width as usize - 2))?;
        for row in cells.y + 1..bottom {
            queue!(out, MoveTo(cells.x, row))?;
            write!(out, "│")?;
            queue!(out, MoveTo(right, row))?;
            write!(out, "│")?;
        }
        queue!(out, MoveTo(cells.x, bottom))?;
        write!(out, "└{}┘", "─".repeat(cells.width as usize - 2))?;
        queue!(out, ResetColor)?;

        // Newest lines win the available rows; the prompt line is always last
        let inner_width = cells.width as usize - 2;
        let inner_height = cells.height as usize - 2;
        let mut lines = rendered_lines(session, inner_width);
        lines.push((truncate_to(&prompt_line(session), inner_width), false));
        let skip = lines.len().saturating_sub(inner_height);

        if let Some(color) = text_color {
            queue!(out, SetForegroundColor(color))?;
        }
        for (row, (line, is_error)) in lines.into_iter().skip(skip).enumerate() {
            queue!(out, MoveTo(cells.x + 1, cells.y + 1 + row as u16))?;
            if is_error {
                queue!(out, SetForegroundColor(ERROR_FG))?;
            }
            write!(out, "{}", line)?;
            if is_error {
                match text_color {
                    Some(color) => queue!(out, SetForegroundColor(color))?,
                    None => queue!(out, ResetColor)?,
                }
            }
        }
        queue!(out, ResetColor)?;
        Ok(())
    }

    fn draw_status(
        &self,
        out: &mut impl Write,
        wm: &WindowManager,
        runtime: &RuntimeState,
        rect: ContentRect,
    ) -> io::Result<()> {
        let y = rect.y + rect.height.saturating_sub(1);
        let runtime_label = match runtime {
            RuntimeState::Booting => "runtime: booting".to_string(),
            RuntimeState::Ready => "runtime: ready".to_string(),
            RuntimeState::Failed(_) => "runtime: failed (run retry-boot)".to_string(),
        };
        let status = match wm.active_tab() {
            Some(tab) => format!(
                " [{}] {} | panes: {} | {} ",
                wm.active_index() + 1,
                tab.title,
                tab.pane_count(),
                runtime_label
            ),
            None => format!(" {} ", runtime_label),
        };
        queue!(
            out,
            MoveTo(rect.x, y),
            Clear(ClearType::CurrentLine),
            SetAttribute(Attribute::Reverse)
        )?;
        write!(out, "{}", truncate_to(&status, rect.width as usize))?;
        queue!(out, SetAttribute(Attribute::Reset))?;
        Ok(())
    }

    fn draw_search_bar(
        &self,
        out: &mut impl Write,
        wm: &WindowManager,
        query: &str,
        rect: ContentRect,
    ) -> io::Result<()> {
        let matches = wm
            .focused_session()
            .map(|s| s.search_matches(query))
            .unwrap_or(0);
        let y = rect.y + rect.height.saturating_sub(2);
        queue!(
            out,
            MoveTo(rect.x, y),
            Clear(ClearType::CurrentLine),
            SetBackgroundColor(BORDER_INACTIVE)
        )?;
        let bar = format!(" search: {} ({} matches) ", query, matches);
        write!(out, "{}", truncate_to(&bar, rect.width as usize))?;
        queue!(out, ResetColor)?;
        Ok(())
    }

    fn draw_ssh_panel(
        &self,
        out: &mut impl Write,
        ssh: &SshConnectionRegistry,
        rect: ContentRect,
    ) -> io::Result<()> {
        let mut lines = vec!["saved connections (Esc to close)".to_string()];
        if ssh.connections().is_empty() {
            lines.push("  (none)".to_string());
        }
        for conn in ssh.connections() {
            let marker = if conn.is_connectable() { " " } else { "!" };
            lines.push(format!(
                "{} {}  {}@{}:{}",
                marker, conn.name, conn.username, conn.host, conn.port
            ));
        }
        self.draw_panel(out, &lines, rect)
    }

    fn draw_preferences_panel(
        &self,
        out: &mut impl Write,
        prefs: &Preferences,
        profiles: &ProfileStore,
        rect: ContentRect,
    ) -> io::Result<()> {
        let default = profiles.resolve(profiles.default_id());
        let lines = vec![
            "preferences (Esc to close)".to_string(),
            format!("shell             {}", prefs.shell),
            format!("scrollback_limit  {}", prefs.scrollback_limit),
            format!("bell_style        {:?}", prefs.bell_style),
            format!(
                "tab_bar           visible={} position={:?}",
                prefs.tab_bar.visible, prefs.tab_bar.position
            ),
            format!("confirm_close     {}", prefs.confirm_close),
            format!(
                "default profile   {} ({}pt {})",
                default.name, default.font_size, default.font_family
            ),
        ];
        self.draw_panel(out, &lines, rect)
    }

    /// Centered overlay panel over the pane area
    fn draw_panel(
        &self,
        out: &mut impl Write,
        lines: &[String],
        rect: ContentRect,
    ) -> io::Result<()> {
        let width = (rect.width.saturating_sub(8)).min(60).max(20);
        let x = rect.x + rect.width.saturating_sub(width) / 2;
        let y = rect.y + rect.height.saturating_sub(lines.len() as u16 + 2) / 2;
        queue!(out, SetBackgroundColor(BORDER_INACTIVE))?;
        for (i, line) in lines.iter().enumerate() {
            queue!(out, MoveTo(x, y + i as u16))?;
            let text = truncate_to(line, width as usize);
            let pad = (width as usize).saturating_sub(text.width());
            write!(out, " {}{} ", text, " ".repeat(pad))?;
        }
        queue!(out, ResetColor)?;
        Ok(())
    }
}

/// Parse a `#rrggbb` color string
fn parse_hex_color(hex: &str) -> Option<Color> {
    let hex = hex.strip_prefix('#')?;
    if hex.len() != 6 {
        return None;
    }
    let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
    let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
    let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
    Some(Color::Rgb { r, g, b })
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}

/// Map a unit-square pane rectangle onto terminal cells
fn to_cells(unit: PaneRect, area: ContentRect) -> ContentRect {
    let x = area.x + (unit.x * area.width as f32) as u16;
    let y = area.y + (unit.y * area.height as f32) as u16;
    let width = (unit.width * area.width as f32).round() as u16;
    let height = (unit.height * area.height as f32).round() as u16;
    ContentRect {
        x,
        y,
        width: width.min(area.width.saturating_sub(x - area.x)),
        height: height.min(area.height.saturating_sub(y - area.y)),
    }
}

/// Prompt line for a session.
///
/// A busy session shows a pending marker ahead of the input; the typed
/// line survives a rejected submission, so it stays visible.
fn prompt_line(session: &Session) -> String {
    let marker = if session.busy { "... " } else { "" };
    format!("{} $ {}{}", session.cwd, marker, session.input)
}

/// Flatten a session's entries into display lines with error styling
fn rendered_lines(session: &Session, width: usize) -> Vec<(String, bool)> {
    let mut lines = Vec::new();
    for entry in &session.entries {
        if let Some(cmd) = &entry.command {
            lines.push((truncate_to(&format!("$ {}", cmd), width), false));
        }
        if let Some(output) = &entry.output {
            for line in output.lines() {
                lines.push((truncate_to(line, width), entry.is_error));
            }
        }
    }
    lines
}

/// Truncate a string to a display width, honoring wide characters
fn truncate_to(text: &str, width: usize) -> String {
    if text.width() <= width {
        return text.to_string();
    }
    let mut result = String::new();
    let mut used = 0;
    for ch in text.chars() {
        let w = ch.width().unwrap_or(0);
        if used + w > width {
            break;
        }
        used += w;
        result.push(ch);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_honors_display_width() {
        assert_eq!(truncate_to("hello", 10), "hello");
        assert_eq!(truncate_to("hello", 3), "hel");
        // Wide characters count double
        assert_eq!(truncate_to("日本語", 4), "日本");
    }

    #[test]
    fn test_unit_rect_maps_to_cells() {
        let area = ContentRect {
            x: 0,
            y: 1,
            width: 80,
            height: 40,
        };
        let unit = PaneRect {
            x: 0.5,
            y: 0.0,
            width: 0.5,
            height: 1.0,
        };
        let cells = to_cells(unit, area);
        assert_eq!(cells.x, 40);
        assert_eq!(cells.y, 1);
        assert_eq!(cells.width, 40);
        assert_eq!(cells.height, 40);
    }

    #[test]
    fn test_busy_prompt_keeps_typed_line_visible() {
        let mut session = Session::new(1, 100);
        session.cwd = "/home".to_string();
        session.input = "echo next".to_string();
        assert_eq!(prompt_line(&session), "/home $ echo next");
        session.busy = true;
        assert_eq!(prompt_line(&session), "/home $ ... echo next");
    }

    #[test]
    fn test_parse_hex_color() {
        assert_eq!(
            parse_hex_color("#c0caf5"),
            Some(Color::Rgb {
                r: 0xc0,
                g: 0xca,
                b: 0xf5
            })
        );
        assert_eq!(parse_hex_color("c0caf5"), None);
        assert_eq!(parse_hex_color("#fff"), None);
        assert_eq!(parse_hex_color("#zzzzzz"), None);
    }

    #[test]
    fn test_rendered_lines_split_multiline_output() {
        let mut session = Session::new(1, 100);
        session.push_command("ls", Some("a\nb".to_string()), false);
        session.push_output("oops", true);
        let lines = rendered_lines(&session, 80);
        assert_eq!(
            lines,
            vec![
                ("$ ls".to_string(), false),
                ("a".to_string(), false),
                ("b".to_string(), false),
                ("oops".to_string(), true),
            ]
        );
    }
}
