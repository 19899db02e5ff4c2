//! `[session:]window[.pane]` target selection.

use std::fmt;

use tmux2html_core::Layout;

use crate::error::{Result, Tmux2HtmlError};
use crate::util::silent_int;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Target {
    pub session: Option<String>,
    /// Index into the session's window list; `None` is the active window.
    pub window: Option<usize>,
    /// Index into the window's depth-first pane list.
    pub pane: Option<usize>,
}

impl Target {
    /// Parse a target. Non-numeric window or pane indices count as `0`.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        let (session, rest) = match raw.split_once(':') {
            Some((session, rest)) => (Some(session.to_string()).filter(|s| !s.is_empty()), rest),
            None => (None, raw),
        };
        let (window, pane) = match rest.split_once('.') {
            Some((window, pane)) => (Some(silent_int(window)), Some(silent_int(pane))),
            None if rest.is_empty() => (None, None),
            None => (Some(silent_int(rest)), None),
        };
        Self {
            session,
            window,
            pane,
        }
    }

    /// The region to render: the whole window, or one of its panes.
    pub fn select(&self, window: &Layout) -> Result<Layout> {
        let Some(index) = self.pane else {
            return Ok(window.clone());
        };
        let leaves = window.leaves();
        leaves
            .get(index)
            .map(|&pane| pane.clone())
            .ok_or(Tmux2HtmlError::PaneNotFound {
                index,
                count: leaves.len(),
            })
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(session) = &self.session {
            write!(f, "{session}:")?;
        }
        match self.window {
            Some(window) => write!(f, "{window}")?,
            None => f.write_str("active")?,
        }
        if let Some(pane) = self.pane {
            write!(f, ".{pane}")?;
        }
        Ok(())
    }
}
