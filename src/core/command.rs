//! Command execution engine.
//!
//! Resolves an input line against the builtin table or forwards it to the
//! sandbox runtime. Dispatch order: empty check, builtin lookup by exact
//! head match, sandbox forward when ready, otherwise a user-visible
//! rejection entry. Also owns tokenization and tab completion.

use thiserror::Error;

use super::sandbox::SandboxRuntime;
use super::session::Session;
use super::vfs::{VfsError, VirtualFileSystem};

/// Parse failures are rendered inline, non-fatal
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("syntax error: unterminated quote")]
    UnterminatedQuote,
}

/// A tokenized input line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedLine {
    pub head: String,
    pub args: Vec<String>,
}

/// Builtin command table: name and one-line description for `help`
const BUILTINS: &[(&str, &str)] = &[
    ("ls", "list directory entries"),
    ("cd", "change working directory"),
    ("pwd", "print working directory"),
    ("cat", "print file contents"),
    ("mkdir", "create a directory"),
    ("touch", "create an empty file"),
    ("rm", "remove a file or directory"),
    ("echo", "print arguments"),
    ("clear", "clear the scrollback"),
    ("history", "show command history"),
    ("help", "list builtin commands"),
    ("retry-boot", "retry the sandbox runtime boot"),
];

/// Tokenize a line on whitespace, respecting single and double quotes.
///
/// Quoted spaces do not split tokens. Returns `Ok(None)` for empty input,
/// which is a no-op rather than an error.
pub fn parse(line: &str) -> Result<Option<ParsedLine>, ParseError> {
    let mut tokens: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut quote: Option<char> = None;

    for ch in line.chars() {
        match quote {
            Some(q) => {
                if ch == q {
                    quote = None;
                } else {
                    current.push(ch);
                }
            }
            None => match ch {
                '\'' | '"' => {
                    quote = Some(ch);
                    in_token = true;
                }
                c if c.is_whitespace() => {
                    if in_token {
                        tokens.push(std::mem::take(&mut current));
                        in_token = false;
                    }
                }
                c => {
                    current.push(c);
                    in_token = true;
                }
            },
        }
    }
    if quote.is_some() {
        return Err(ParseError::UnterminatedQuote);
    }
    if in_token {
        tokens.push(current);
    }

    let mut iter = tokens.into_iter();
    match iter.next() {
        Some(head) => Ok(Some(ParsedLine {
            head,
            args: iter.collect(),
        })),
        None => Ok(None),
    }
}

/// Longest common prefix of a candidate set
fn common_prefix(candidates: &[String]) -> String {
    let Some(first) = candidates.first() else {
        return String::new();
    };
    let mut prefix = first.clone();
    for candidate in &candidates[1..] {
        let matched = prefix
            .chars()
            .zip(candidate.chars())
            .take_while(|(a, b)| a == b)
            .count();
        prefix.truncate(
            prefix
                .char_indices()
                .nth(matched)
                .map(|(i, _)| i)
                .unwrap_or(prefix.len()),
        );
    }
    prefix
}

/// The command processor: builtin dispatch, completion, forwarding
pub struct CommandProcessor;

impl CommandProcessor {
    pub fn new() -> Self {
        Self
    }

    /// Builtin names, for completion and `help`
    pub fn builtin_names() -> Vec<&'static str> {
        BUILTINS.iter().map(|(name, _)| *name).collect()
    }

    /// Execute one submitted line against the session.
    ///
    /// Mutates `session.entries`; never blocks on the sandbox. Returns
    /// whether the line was forwarded (the caller keeps the session busy
    /// until the runtime reports completion).
    pub fn execute(
        &self,
        line: &str,
        session: &mut Session,
        vfs: &mut VirtualFileSystem,
        sandbox: &mut SandboxRuntime,
    ) -> bool {
        let parsed = match parse(line) {
            Ok(Some(parsed)) => parsed,
            Ok(None) => return false,
            Err(e) => {
                session.push_command(line, Some(e.to_string()), true);
                return false;
            }
        };

        session.record_history(line.trim());

        if BUILTINS.iter().any(|(name, _)| *name == parsed.head) {
            self.run_builtin(&parsed, line, session, vfs, sandbox);
            return false;
        }

        // Not a builtin: forward verbatim
        match sandbox.forward(session.id, line.trim()) {
            Ok(()) => {
                session.push_command(line.trim(), None, false);
                true
            }
            Err(e) => {
                session.push_command(line.trim(), Some(e.to_string()), true);
                false
            }
        }
    }

    /// Complete the trailing token of `input`.
    ///
    /// First word completes against builtin names, later words against the
    /// entries of the working directory. Returns the replacement line only
    /// when completion actually extends the typed prefix.
    pub fn complete(
        &self,
        input: &str,
        cwd: &str,
        vfs: &VirtualFileSystem,
    ) -> Option<String> {
        let token_start = input
            .rfind(char::is_whitespace)
            .map(|i| i + 1)
            .unwrap_or(0);
        let prefix = &input[token_start..];
        let first_word = !input[..token_start].chars().any(|c| !c.is_whitespace());

        let candidates: Vec<String> = if first_word {
            Self::builtin_names()
                .into_iter()
                .filter(|name| name.starts_with(prefix))
                .map(str::to_string)
                .collect()
        } else {
            vfs.entry_names(cwd)
                .into_iter()
                .filter(|name| name.starts_with(prefix))
                .collect()
        };

        let replacement = match candidates.len() {
            0 => return None,
            1 => candidates[0].clone(),
            _ => {
                let lcp = common_prefix(&candidates);
                if lcp.len() <= prefix.len() {
                    // No visible effect: leave input unchanged
                    return None;
                }
                lcp
            }
        };
        if replacement == prefix {
            return None;
        }
        Some(format!("{}{}", &input[..token_start], replacement))
    }

    fn run_builtin(
        &self,
        parsed: &ParsedLine,
        line: &str,
        session: &mut Session,
        vfs: &mut VirtualFileSystem,
        sandbox: &mut SandboxRuntime,
    ) {
        let line = line.trim();
        let result: Result<Option<String>, VfsError> = match parsed.head.as_str() {
            "ls" => {
                let target = parsed.args.first().map(String::as_str).unwrap_or(".");
                let path = VirtualFileSystem::resolve(&session.cwd, target);
                vfs.list(&path).map(|entries| {
                    let lines: Vec<String> = entries
                        .into_iter()
                        .map(|(name, is_dir)| {
                            if is_dir {
                                format!("{}/", name)
                            } else {
                                name
                            }
                        })
                        .collect();
                    if lines.is_empty() {
                        None
                    } else {
                        Some(lines.join("\n"))
                    }
                })
            }
            "cd" => {
                let target = parsed.args.first().map(String::as_str).unwrap_or("/");
                let path = VirtualFileSystem::resolve(&session.cwd, target);
                if vfs.is_dir(&path) {
                    session.cwd = path;
                    Ok(None)
                } else {
                    match vfs.node(&path) {
                        Ok(_) => Err(VfsError::NotADirectory(path)),
                        Err(e) => Err(e),
                    }
                }
            }
            "pwd" => Ok(Some(session.cwd.clone())),
            "cat" => match parsed.args.first() {
                Some(arg) => {
                    let path = VirtualFileSystem::resolve(&session.cwd, arg);
                    vfs.read_file(&path).map(|c| Some(c.to_string()))
                }
                None => Ok(Some("usage: cat <file>".to_string())),
            },
            "mkdir" => match parsed.args.first() {
                Some(arg) => {
                    let path = VirtualFileSystem::resolve(&session.cwd, arg);
                    vfs.mkdir(&path).map(|_| None)
                }
                None => Ok(Some("usage: mkdir <dir>".to_string())),
            },
            "touch" => match parsed.args.first() {
                Some(arg) => {
                    let path = VirtualFileSystem::resolve(&session.cwd, arg);
                    vfs.touch(&path).map(|_| None)
                }
                None => Ok(Some("usage: touch <file>".to_string())),
            },
            "rm" => match parsed.args.first() {
                Some(arg) => {
                    let path = VirtualFileSystem::resolve(&session.cwd, arg);
                    vfs.remove(&path).map(|_| None)
                }
                None => Ok(Some("usage: rm <path>".to_string())),
            },
            "echo" => Ok(Some(parsed.args.join(" "))),
            "clear" => {
                session.clear_entries();
                return;
            }
            "history" => {
                let lines: Vec<String> = session
                    .command_history
                    .iter()
                    .rev()
                    .enumerate()
                    .map(|(i, cmd)| format!("{:>4}  {}", i + 1, cmd))
                    .collect();
                Ok(Some(lines.join("\n")))
            }
            "help" => {
                let lines: Vec<String> = BUILTINS
                    .iter()
                    .map(|(name, desc)| format!("{:<12} {}", name, desc))
                    .collect();
                Ok(Some(lines.join("\n")))
            }
            "retry-boot" => {
                let output = if sandbox.retry_boot() {
                    "retrying sandbox boot..."
                } else {
                    "sandbox runtime has not failed; nothing to retry"
                };
                Ok(Some(output.to_string()))
            }
            // Unreachable while the table and dispatch agree; treat as no-op
            _ => Ok(None),
        };

        match result {
            Ok(output) => session.push_command(line, output, false),
            Err(e) => session.push_command(line, Some(e.to_string()), true),
        }
    }
}

impl Default for CommandProcessor {
    fn default() -> Self {
        Self::new()
    }
}
