//! The tmux command collaborator.
//!
//! Every query is a separate `tmux` invocation bounded by a timeout. Pane
//! captures and cursor queries tolerate failure (they log and return empty
//! results) while layout queries propagate errors.

use std::io::Read;
use std::process::{Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, warn};
use wait_timeout::ChildExt;

use tmux2html_core::{Layout, PaneSource, layout};

use crate::error::{Result, Tmux2HtmlError};
use crate::target::Target;
use crate::util::require_command;

const PROGRAM: &str = "tmux";

/// Supplies the current layout of the window being rendered.
pub trait WindowSource {
    fn window_layout(&self) -> Result<Layout>;
}

/// One line of `list-windows -F '#F,#{window_layout}'`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Window {
    pub active: bool,
    pub layout: Layout,
}

#[derive(Debug, Clone)]
pub struct Tmux {
    program: String,
    timeout: Duration,
    session: Option<String>,
    window: Option<usize>,
}

impl Tmux {
    /// Client for the window named by `target`; fails when `tmux` is not
    /// installed.
    pub fn new(target: &Target, timeout: Duration) -> Result<Self> {
        require_command(PROGRAM)?;
        Ok(Self {
            program: PROGRAM.to_string(),
            timeout,
            session: target.session.clone(),
            window: target.window,
        })
    }

    /// Run `program` in place of `tmux`.
    #[must_use]
    pub fn with_program(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
            session: None,
            window: None,
        }
    }

    /// Run a command and return its stdout.
    pub fn run(&self, args: &[String]) -> Result<String> {
        let command = describe(&self.program, args);
        debug!(%command, "running");

        let mut cmd = Command::new(&self.program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        // Keep a terminal Ctrl-C away from tmux; only we react to it.
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }
        let mut child = cmd.spawn()?;
        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);

        let Some(status) = child.wait_timeout(self.timeout)? else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(Tmux2HtmlError::ExternalCommandTimedOut {
                command,
                seconds: self.timeout.as_secs(),
            });
        };

        let stdout = collect(stdout);
        if !status.success() {
            return Err(Tmux2HtmlError::ExternalCommandFailed {
                command,
                exit_code: status.code().unwrap_or(1),
                stderr: collect(stderr),
            });
        }
        Ok(stdout)
    }

    /// Like [`Tmux::run`] but failures become an empty string.
    fn run_tolerant(&self, args: &[String]) -> String {
        self.run(args).unwrap_or_else(|error| {
            warn!(%error, "tmux query failed");
            String::new()
        })
    }

    /// All windows of the configured session.
    pub fn windows(&self) -> Result<Vec<Window>> {
        let mut args = strings(&["list-windows", "-F", "#F,#{window_layout}"]);
        if let Some(session) = &self.session {
            args.extend(strings(&["-t", session]));
        }
        self.run(&args)?
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(parse_window_line)
            .collect()
    }

    /// Copy-mode scroll offset and screen height of a pane, when scrolled.
    fn scroll_position(&self, pane: u32) -> Option<(usize, usize)> {
        let args = strings(&[
            "display-message",
            "-p",
            "-t",
            &pane_target(pane),
            "#{scroll_position}/#{scroll_region_lower}",
        ]);
        parse_scroll_position(&self.run_tolerant(&args))
    }
}

impl WindowSource for Tmux {
    fn window_layout(&self) -> Result<Layout> {
        let windows = self.windows()?;
        let missing = || Tmux2HtmlError::WindowNotFound {
            window: self
                .window
                .map_or_else(|| "active".to_string(), |index| index.to_string()),
        };
        let window = match self.window {
            Some(index) => windows.into_iter().nth(index),
            None => windows.into_iter().find(|window| window.active),
        };
        window.map(|window| window.layout).ok_or_else(missing)
    }
}

impl PaneSource for Tmux {
    fn capture(&self, pane: u32, full_history: bool, max_lines: usize) -> String {
        let scroll = if full_history {
            None
        } else {
            self.scroll_position(pane)
        };
        let mut args = strings(&["capture-pane", "-epJ", "-t", &pane_target(pane)]);
        args.extend(capture_range(full_history, max_lines, scroll));
        self.run_tolerant(&args)
    }

    fn cursor_position(&self, pane: u32) -> Option<(usize, usize)> {
        let args = strings(&[
            "display-message",
            "-p",
            "-t",
            &pane_target(pane),
            "#{pane_active},#{cursor_x},#{cursor_y}",
        ]);
        parse_cursor(&self.run_tolerant(&args))
    }
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        buf
    })
}

fn collect(handle: Option<JoinHandle<Vec<u8>>>) -> String {
    let bytes = handle.and_then(|h| h.join().ok()).unwrap_or_default();
    String::from_utf8_lossy(&bytes).into_owned()
}

fn strings(args: &[&str]) -> Vec<String> {
    args.iter().map(|arg| (*arg).to_string()).collect()
}

fn describe(program: &str, args: &[String]) -> String {
    std::iter::once(program)
        .chain(args.iter().map(String::as_str))
        .collect::<Vec<_>>()
        .join(" ")
}

fn pane_target(pane: u32) -> String {
    format!("%{pane}")
}

/// Parse `<flags>,<layout>`; the active window carries `*` in its flags.
pub fn parse_window_line(line: &str) -> Result<Window> {
    let (flags, layout_string) = line
        .split_once(',')
        .ok_or_else(|| Tmux2HtmlError::invalid(format!("unexpected list-windows line `{line}`")))?;
    Ok(Window {
        active: flags.contains('*'),
        layout: layout::parse(layout_string)?,
    })
}

/// `-S`/`-E` arguments for `capture-pane`.
#[must_use]
pub fn capture_range(full_history: bool, max_lines: usize, scroll: Option<(usize, usize)>) -> Vec<String> {
    if full_history {
        let start = if max_lines == 0 {
            "-".to_string()
        } else {
            format!("-{max_lines}")
        };
        return vec!["-S".to_string(), start, "-E".to_string(), "-".to_string()];
    }
    match scroll {
        Some((position, height)) if position > 0 => {
            let start = -(position as i64);
            let end = start + height as i64;
            vec!["-S".to_string(), start.to_string(), "-E".to_string(), end.to_string()]
        }
        _ => Vec::new(),
    }
}

/// `<position>/<height>`; an empty position means the pane is not in copy
/// mode.
#[must_use]
pub fn parse_scroll_position(output: &str) -> Option<(usize, usize)> {
    let (position, height) = output.trim().split_once('/')?;
    Some((position.parse().ok()?, height.parse().ok()?))
}

/// `<active>,<x>,<y>`; only the active pane has a cursor.
#[must_use]
pub fn parse_cursor(output: &str) -> Option<(usize, usize)> {
    let fields: Vec<usize> = output
        .trim()
        .split(',')
        .map(str::parse)
        .collect::<std::result::Result<_, _>>()
        .ok()?;
    match fields.as_slice() {
        [1, x, y] => Some((*x, *y)),
        _ => None,
    }
}
