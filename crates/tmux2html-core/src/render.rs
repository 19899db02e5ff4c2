//! Pane tree rendering.
//!
//! [`Renderer`] walks a [`Layout`] tree and produces nested `div`
//! containers: one per split, one per pane, with separators drawn between
//! adjacent children. Pane content comes from a [`PaneSource`] and is run
//! through the chunking engine under a per-pass [`RenderContext`].

use std::fmt::{self, Write};

use crate::chunk::render_rows;
use crate::color::Color;
use crate::css::{self, StyleRegistry};
use crate::layout::Layout;

const VERTICAL_BAR: u32 = 0x2502;
const HORIZONTAL_BAR: u32 = 0x2500;

/// Default document colors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Theme {
    pub fg: Color,
    pub bg: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            fg: Color::Rgb(0xfa, 0xfa, 0xfa),
            bg: Color::Rgb(0, 0, 0),
        }
    }
}

impl Theme {
    /// Dark text on a light background.
    #[must_use]
    pub fn light() -> Self {
        let dark = Self::default();
        Self {
            fg: dark.bg,
            bg: dark.fg,
        }
    }
}

/// How much of each pane to capture.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureOptions {
    /// Capture scrollback as well as the visible screen.
    pub full_history: bool,
    /// Scrollback bound in lines; `0` is unbounded.
    pub max_lines: usize,
}

/// Supplies captured pane text.
pub trait PaneSource {
    /// Raw pane text with SGR sequences preserved. Failures yield an empty
    /// string.
    fn capture(&self, pane: u32, full_history: bool, max_lines: usize) -> String;

    /// Cursor `(column, row)` of the pane, or `None` when the pane is not
    /// active.
    fn cursor_position(&self, pane: u32) -> Option<(usize, usize)>;
}

/// Packs hidden history rows into bounded text hunks.
pub trait HistoryEncoder {
    fn encode(&self, text: &str) -> Vec<String>;
}

/// State owned by one render pass.
#[derive(Debug, Clone)]
pub struct RenderContext {
    registry: StyleRegistry,
    history_panes: usize,
}

impl RenderContext {
    #[must_use]
    pub fn new(theme: Theme) -> Self {
        Self {
            registry: StyleRegistry::new(theme.fg, theme.bg),
            history_panes: 0,
        }
    }

    /// Panes rendered so far that carry a history payload.
    #[must_use]
    pub fn history_panes(&self) -> usize {
        self.history_panes
    }

    /// Stylesheet for everything rendered in this pass.
    #[must_use]
    pub fn stylesheet(&self) -> String {
        self.registry.flush()
    }
}

/// Rows rendered for one pane.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaneRows {
    /// Rows shown in the pane.
    pub visible: Vec<String>,
    /// Older rows moved out of view in full-history mode.
    pub history: Vec<String>,
}

/// A rendered document body and its stylesheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub html: String,
    pub css: String,
    /// Some pane carries a history payload.
    pub has_history: bool,
}

pub struct Renderer {
    theme: Theme,
    options: CaptureOptions,
    encoder: Option<Box<dyn HistoryEncoder>>,
}

impl fmt::Debug for Renderer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Renderer")
            .field("theme", &self.theme)
            .field("options", &self.options)
            .field("encoder", &self.encoder.is_some())
            .finish()
    }
}

impl Renderer {
    #[must_use]
    pub fn new(theme: Theme, options: CaptureOptions) -> Self {
        Self {
            theme,
            options,
            encoder: None,
        }
    }

    /// Move full-history rows above the visible screen into encoded
    /// payloads.
    #[must_use]
    pub fn with_encoder(mut self, encoder: Box<dyn HistoryEncoder>) -> Self {
        self.encoder = Some(encoder);
        self
    }

    #[must_use]
    pub fn theme(&self) -> Theme {
        self.theme
    }

    /// Fresh context for a new pass; no classes carry over.
    #[must_use]
    pub fn begin_pass(&self) -> RenderContext {
        RenderContext::new(self.theme)
    }

    /// Render a whole tree in one pass.
    #[must_use]
    pub fn render_snapshot(&self, root: &Layout, source: &dyn PaneSource) -> Snapshot {
        let mut ctx = self.begin_pass();
        let html = self.render(&mut ctx, root, source).concat();
        Snapshot {
            html,
            css: ctx.stylesheet(),
            has_history: ctx.history_panes() > 0,
        }
    }

    /// Render `root` into markup fragments, filling panes from `source`.
    #[must_use]
    pub fn render(&self, ctx: &mut RenderContext, root: &Layout, source: &dyn PaneSource) -> Vec<String> {
        let mut fragments = Vec::new();
        self.walk(root, &mut fragments, &mut |node, out| {
            let rows = self.pane_rows(ctx, node, source);
            if !rows.history.is_empty() {
                ctx.history_panes += 1;
            }
            pane_markup(node, &rows, self.encoder.as_deref(), out);
        });
        fragments
    }

    /// Geometry only: every pane is an empty placeholder.
    #[must_use]
    pub fn render_skeleton(&self, root: &Layout) -> Vec<String> {
        let mut fragments = Vec::new();
        self.walk(root, &mut fragments, &mut |node, out| {
            pane_markup(node, &PaneRows::default(), None, out);
        });
        fragments
    }

    /// Capture and chunk one leaf.
    #[must_use]
    pub fn pane_rows(&self, ctx: &mut RenderContext, pane: &Layout, source: &dyn PaneSource) -> PaneRows {
        let CaptureOptions {
            full_history,
            max_lines,
        } = self.options;
        let (content, cursor) = match pane.identifier {
            Some(id) => {
                let content = source.capture(id, full_history, max_lines);
                let cursor = if full_history {
                    None
                } else {
                    source.cursor_position(id)
                };
                (content, cursor)
            }
            None => (String::new(), None),
        };

        let mut visible = render_rows(&mut ctx.registry, &content, pane.width, pane.height, cursor);
        if !full_history {
            visible.truncate(pane.height);
            return PaneRows {
                visible,
                history: Vec::new(),
            };
        }
        if self.encoder.is_none() || visible.len() <= pane.height {
            return PaneRows {
                visible,
                history: Vec::new(),
            };
        }
        let history = visible.drain(..visible.len() - pane.height).collect();
        PaneRows { visible, history }
    }

    fn walk(&self, node: &Layout, out: &mut Vec<String>, leaf: &mut dyn FnMut(&Layout, &mut Vec<String>)) {
        if node.is_leaf() {
            leaf(node, out);
            return;
        }

        let orientation = if node.vertical { "v" } else { "h" };
        out.push(format!("<div class=\"{orientation}\">"));
        for child in &node.panes {
            if let Some(separator) = separator(node, child) {
                out.push(separator);
            }
            self.walk(child, out, leaf);
        }
        out.push("</div>".to_string());
    }
}

/// Divider drawn before `child` when it does not start at its parent's
/// origin.
fn separator(parent: &Layout, child: &Layout) -> Option<String> {
    let glyph = |code: u32| {
        format!(
            "<span class=\"{} {}\" data-glyph=\"&#x{code:x};\"> </span>",
            css::GLYPH,
            css::NO_SELECT
        )
    };

    let mut html = String::new();
    if child.x > parent.x {
        html.push_str("<div class=\"sep sep-v\"><pre>");
        for _ in 0..child.height {
            let _ = write!(html, "<div>{}</div>", glyph(VERTICAL_BAR));
        }
    } else if child.y > parent.y {
        html.push_str("<div class=\"sep sep-h\"><pre><div>");
        html.push_str(&glyph(HORIZONTAL_BAR).repeat(child.width));
        html.push_str("</div>");
    } else {
        return None;
    }
    html.push_str("</pre></div>");
    Some(html)
}

fn pane_markup(pane: &Layout, rows: &PaneRows, encoder: Option<&dyn HistoryEncoder>, out: &mut Vec<String>) {
    let id = pane
        .identifier
        .map_or_else(|| "-".to_string(), |id| id.to_string());
    let mut open = format!(
        "<div id=\"p{id}\" class=\"pane\" data-size=\"{},{}\"",
        pane.width, pane.height
    );
    if !rows.history.is_empty() {
        let _ = write!(open, " data-history=\"{}\"", rows.history.len());
    }
    open.push_str("><pre>");
    out.push(open);
    out.extend(rows.visible.iter().cloned());
    out.push("</pre>".to_string());

    if let Some(encoder) = encoder.filter(|_| !rows.history.is_empty()) {
        for hunk in encoder.encode(&rows.history.join("\n")) {
            out.push(format!("<script type=\"text/tmux-data\">{hunk}</script>"));
        }
    }
    out.push("</div>".to_string());
}
