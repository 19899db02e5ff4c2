//! Line chunking: captured pane text to fixed-width HTML rows.
//!
//! A pane's capture is a list of source lines with embedded SGR sequences.
//! Each source line becomes one or more [`ChunkedLine`]s: text is appended
//! cell by cell, wrapping before a character that would overflow the pane
//! width, and every finished row is padded to exactly the pane width.
//!
//! # Invariants
//!
//! 1. A chunk never holds more cells than the pane width; wide characters
//!    are moved whole to the next chunk.
//! 2. A finalized row renders exactly `width` cells (text plus padding).
//! 3. Colors and styles carry across source lines within one pane; they are
//!    reset only when a new pane starts.
//! 4. The output has at least `height` rows.
//!
//! # Failure Modes
//!
//! | Input | Behavior |
//! |-------|----------|
//! | Unknown SGR token | Skipped, scan continues |
//! | Control or unassigned character | Rendered as a one-cell placeholder |
//! | Character wider than the pane | Clamped to the pane width |

use std::fmt::Write;
use std::sync::LazyLock;

use regex_lite::Regex;
use unicode_width::UnicodeWidthChar;

use crate::acs;
use crate::color::{Color, SgrState};
use crate::css::{self, Channel, StyleRegistry};

static SGR_SEQUENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("\x1b\\[([^m]*)m").expect("SGR pattern is valid"));

#[derive(Debug, Clone, PartialEq, Eq)]
enum Fragment {
    Open(String),
    Text(String),
    Close,
}

/// One output row of a pane, before finalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkedLine {
    width: usize,
    length: usize,
    row: usize,
    fragments: Vec<Fragment>,
    depth: usize,
}

impl ChunkedLine {
    #[must_use]
    pub fn new(width: usize, row: usize) -> Self {
        Self {
            width,
            length: 0,
            row,
            fragments: Vec::new(),
            depth: 0,
        }
    }

    /// Cells used so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.length
    }

    /// No text and no tags yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    #[must_use]
    pub fn row(&self) -> usize {
        self.row
    }

    #[must_use]
    pub fn remaining(&self) -> usize {
        self.width.saturating_sub(self.length)
    }

    /// Whether `cells` more cells fit.
    #[must_use]
    pub fn fits(&self, cells: usize) -> bool {
        self.length + cells <= self.width
    }

    #[must_use]
    pub fn has_open_tag(&self) -> bool {
        self.depth > 0
    }

    pub fn open(&mut self, tag: String) {
        self.fragments.push(Fragment::Open(tag));
        self.depth += 1;
    }

    pub fn close(&mut self) {
        if self.depth > 0 {
            self.fragments.push(Fragment::Close);
            self.depth -= 1;
        }
    }

    /// Append already-escaped markup occupying `cells` cells.
    pub fn push(&mut self, html: &str, cells: usize) {
        debug_assert!(self.fits(cells), "chunk overflow");
        self.length += cells;
        if let Some(Fragment::Text(text)) = self.fragments.last_mut() {
            text.push_str(html);
        } else {
            self.fragments.push(Fragment::Text(html.to_string()));
        }
    }

    /// Close open tags, pad to the full width and render the row.
    ///
    /// `cursor` is the cursor column when the cursor sits on this row; a
    /// cursor inside the padding splits the padding run around it.
    #[must_use]
    pub fn finalize(mut self, cursor: Option<usize>) -> String {
        while self.depth > 0 {
            self.close();
        }

        let mut html = String::with_capacity(64 + self.width);
        let _ = write!(html, "<div data-row=\"{}\">", self.row);
        for fragment in &self.fragments {
            match fragment {
                Fragment::Open(tag) => html.push_str(tag),
                Fragment::Text(text) => html.push_str(text),
                Fragment::Close => html.push_str("</span>"),
            }
        }

        let pad = self.remaining();
        match cursor.filter(|&col| col >= self.length && col < self.width) {
            Some(col) => {
                let before = col - self.length;
                push_padding(&mut html, before);
                let _ = write!(html, "<span class=\"{} {}\"> </span>", css::CURSOR, css::NO_SELECT);
                push_padding(&mut html, pad - before - 1);
            }
            None => push_padding(&mut html, pad),
        }
        html.push_str("</div>");
        html
    }
}

fn push_padding(html: &mut String, cells: usize) {
    if cells > 0 {
        let _ = write!(html, "<span class=\"{}\">{}</span>", css::NO_SELECT, " ".repeat(cells));
    }
}

/// Markup and cell width for one character.
fn cell_markup(ch: char) -> (String, usize) {
    if ch.is_control() {
        return (placeholder(ch, 1), 1);
    }
    match ch.width() {
        None => (placeholder(ch, 1), 1),
        Some(0) => (escape(ch), 0),
        Some(1) if u32::from(ch) <= 0xff => (escape(ch), 1),
        Some(cells) => (placeholder(ch, cells), cells),
    }
}

fn escape(ch: char) -> String {
    let mut buf = [0u8; 4];
    v_htmlescape::escape(ch.encode_utf8(&mut buf)).to_string()
}

/// Fixed-width span whose glyph is drawn client-side from `data-glyph`.
fn placeholder(ch: char, cells: usize) -> String {
    format!(
        "<span class=\"{}\" data-glyph=\"&#x{:x};\">{}</span>",
        css::GLYPH,
        u32::from(ch),
        " ".repeat(cells)
    )
}

/// Chunking state for one pane.
#[derive(Debug)]
pub struct PaneChunker<'a> {
    registry: &'a mut StyleRegistry,
    width: usize,
    height: usize,
    cursor: Option<(usize, usize)>,
    state: SgrState,
    alt_charset: bool,
    rows: Vec<String>,
    current: ChunkedLine,
    style_tag: Option<String>,
}

impl<'a> PaneChunker<'a> {
    /// `cursor` is `(column, row)` within the pane's output rows.
    pub fn new(
        registry: &'a mut StyleRegistry,
        width: usize,
        height: usize,
        cursor: Option<(usize, usize)>,
    ) -> Self {
        Self {
            registry,
            width,
            height,
            cursor,
            state: SgrState::new(),
            alt_charset: false,
            rows: Vec::with_capacity(height),
            current: ChunkedLine::new(width, 0),
            style_tag: None,
        }
    }

    /// Chunk a whole capture and return the rendered rows.
    #[must_use]
    pub fn run(mut self, content: &str) -> Vec<String> {
        let content = content.strip_suffix('\n').unwrap_or(content);
        let lines: Vec<&str> = if content.is_empty() {
            Vec::new()
        } else {
            content.split('\n').collect()
        };

        let total = lines.len();
        for (index, line) in lines.into_iter().enumerate() {
            self.feed_line(line, index + 1 < total);
        }

        while self.rows.len() < self.height {
            self.finish_row();
        }
        self.rows
    }

    fn feed_line(&mut self, line: &str, more_lines: bool) {
        let rows_before = self.rows.len();
        let mut last = 0;
        for captures in SGR_SEQUENCE.captures_iter(line) {
            let (Some(whole), Some(params)) = (captures.get(0), captures.get(1)) else {
                continue;
            };
            self.append_run(&line[last..whole.start()]);
            self.apply_sequence(params.as_str());
            last = whole.end();
        }
        self.append_run(&line[last..]);

        let produced = self.rows.len() > rows_before;
        if !self.current.is_empty() || (!produced && (self.rows.len() < self.height || more_lines)) {
            self.finish_row();
        }
    }

    fn apply_sequence(&mut self, params: &str) {
        if self.style_tag.take().is_some() {
            self.current.close();
        }
        self.state.apply(params);
        let tagged = self.style_tag_markup(Some(params));
        self.current.open(tagged);
        self.style_tag = Some(self.style_tag_markup(None));
    }

    fn append_run(&mut self, text: &str) {
        if text.is_empty() || self.width == 0 {
            return;
        }
        if self.style_tag.is_none() && self.has_style() {
            let tag = self.style_tag_markup(None);
            self.current.open(tag.clone());
            self.style_tag = Some(tag);
        }

        for ch in text.chars() {
            match ch {
                acs::SHIFT_OUT => {
                    self.alt_charset = true;
                    continue;
                }
                acs::SHIFT_IN => {
                    self.alt_charset = false;
                    continue;
                }
                _ => {}
            }
            let ch = if self.alt_charset { acs::translate(ch) } else { ch };
            let (html, cells) = cell_markup(ch);
            if cells == 0 {
                self.current.push(&html, 0);
                continue;
            }

            let (html, cells) = if cells > self.width {
                (placeholder(ch, self.width), self.width)
            } else {
                (html, cells)
            };
            if !self.current.fits(cells) {
                self.wrap();
            }

            if self.cursor == Some((self.current.len(), self.rows.len())) {
                self.push_cursor(&html, cells);
            } else {
                self.current.push(&html, cells);
            }
        }
    }

    fn push_cursor(&mut self, html: &str, cells: usize) {
        if self.style_tag.is_some() {
            self.current.close();
        }
        let tag = self.cursor_tag_markup();
        self.current.open(tag);
        self.current.push(html, cells);
        self.current.close();
        if let Some(tag) = &self.style_tag {
            self.current.open(tag.clone());
        }
    }

    /// End the current chunk mid-line and continue in a fresh one with the
    /// same style.
    fn wrap(&mut self) {
        let tag = self.style_tag.take();
        self.finish_row();
        if let Some(tag) = tag {
            self.current.open(tag.clone());
            self.style_tag = Some(tag);
        }
    }

    fn finish_row(&mut self) {
        let row = self.rows.len();
        let next = ChunkedLine::new(self.width, row + 1);
        let line = std::mem::replace(&mut self.current, next);
        let cursor = self
            .cursor
            .filter(|&(_, cursor_row)| cursor_row == row)
            .map(|(col, _)| col);
        self.rows.push(line.finalize(cursor));
        self.style_tag = None;
    }

    fn has_style(&self) -> bool {
        !self.state.fg.is_unset() || !self.state.bg.is_unset() || !self.state.styles.is_empty()
    }

    fn style_tag_markup(&mut self, sequence: Option<&str>) -> String {
        let classes = self.classes(false);
        let mut tag = String::from("<span");
        if !classes.is_empty() {
            let _ = write!(tag, " class=\"{}\"", classes.join(" "));
        }
        if let Some(sequence) = sequence {
            let _ = write!(tag, " data-seq=\"{}\"", v_htmlescape::escape(sequence));
        }
        tag.push('>');
        tag
    }

    fn cursor_tag_markup(&mut self) -> String {
        format!("<span class=\"{}\">", self.classes(true).join(" "))
    }

    /// Classes for the current state. `cursor` swaps foreground and
    /// background relative to the current style, so the cursor over
    /// reversed text draws in the plain default colors.
    fn classes(&mut self, cursor: bool) -> Vec<String> {
        let styles = &self.state.styles;
        let reverse = styles.reverse() != cursor;
        let (fg, bg) = if reverse {
            (self.state.bg, self.state.fg)
        } else {
            (self.state.fg, self.state.bg)
        };

        let mut classes = Vec::new();
        let marker = match (cursor, reverse) {
            (true, true) => Some(css::CURSOR),
            (true, false) => Some(css::CURSOR_REVERSE),
            (false, true) => Some(css::REVERSE),
            (false, false) => None,
        };
        if let Some(marker) = marker {
            classes.push(marker.to_string());
        }
        if let Some(key) = self.registry.register(Channel::Foreground, fg, styles) {
            classes.push(key);
        }
        if let Some(key) = self.registry.register(Channel::Background, bg, styles) {
            classes.push(key);
        }
        if styles.bold() && !matches!(fg, Color::Indexed(index) if index < 16) {
            classes.push(css::BOLD.to_string());
        }
        if styles.italic() {
            classes.push(css::ITALIC.to_string());
        }
        if styles.underline() {
            classes.push(css::UNDERLINE.to_string());
        }
        classes
    }
}

/// Render one pane's captured text into `height`-or-more rows of `width`
/// cells.
#[must_use]
pub fn render_rows(
    registry: &mut StyleRegistry,
    content: &str,
    width: usize,
    height: usize,
    cursor: Option<(usize, usize)>,
) -> Vec<String> {
    PaneChunker::new(registry, width, height, cursor).run(content)
}

/// Visible text of a rendered row: tags stripped, glyph placeholders
/// replaced by their spaces.
#[cfg(test)]
pub(crate) fn row_text(row: &str) -> String {
    let mut text = String::with_capacity(row.len());
    let mut in_tag = false;
    for ch in row.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => text.push(ch),
            _ => {}
        }
    }
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#x27;", "'")
        .replace("&#x2f;", "/")
        .replace("&amp;", "&")
}
