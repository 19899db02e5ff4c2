//! Per-pass CSS class registry.
//!
//! Each distinct color used while rendering is registered once under a
//! deterministic key (`f1`, `b-rgb_255_0_0`, …) and every span that uses it
//! references the class. [`StyleRegistry::flush`] turns the registry into a
//! stylesheet once all panes are rendered.

use std::collections::BTreeMap;
use std::fmt::Write;

use crate::color::{Color, StyleSet, effective_index};

/// Class prefix of the outer document container.
pub const CLASS_NAME: &str = "tmux-html";

/// Bold text.
pub const BOLD: &str = "sb";
/// Italic text.
pub const ITALIC: &str = "si";
/// Underlined text.
pub const UNDERLINE: &str = "su";
/// Non-selectable padding and separators.
pub const NO_SELECT: &str = "ns";
/// Reverse video with default colors.
pub const REVERSE: &str = "rv";
/// The cursor cell.
pub const CURSOR: &str = "cur";
/// The cursor cell over reversed text: back to the default colors.
pub const CURSOR_REVERSE: &str = "cr";
/// Fixed-width glyph placeholder.
pub const GLYPH: &str = "u";

const FONT_STACK: &[&str] = &[
    "DejaVu Sans Mono for Powerline",
    "Droid Sans Mono for Powerline",
    "Fira Mono for Powerline",
    "Hack",
    "Inconsolata for Powerline",
    "Meslo LG M for Powerline",
    "Roboto Mono for Powerline",
    "Source Code Pro for Powerline",
    "Ubuntu Mono derivative Powerline",
    "DejaVu Sans Mono",
    "Menlo",
    "Consolas",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Foreground,
    Background,
}

impl Channel {
    const fn prefix(self) -> char {
        match self {
            Self::Foreground => 'f',
            Self::Background => 'b',
        }
    }

    const fn property(self) -> &'static str {
        match self {
            Self::Foreground => "color",
            Self::Background => "background-color",
        }
    }
}

#[derive(Debug, Clone)]
pub struct StyleRegistry {
    fg: Color,
    bg: Color,
    entries: BTreeMap<String, String>,
}

impl StyleRegistry {
    /// Registry for a document whose default colors are `fg` on `bg`.
    #[must_use]
    pub fn new(fg: Color, bg: Color) -> Self {
        Self {
            fg,
            bg,
            entries: BTreeMap::new(),
        }
    }

    /// Register a color and return its class key, or `None` for
    /// [`Color::Unset`].
    ///
    /// Low palette foregrounds are brightened under bold, so `f1` becomes
    /// `f9`. Registering the same key again leaves the registry unchanged.
    pub fn register(&mut self, channel: Channel, color: Color, styles: &StyleSet) -> Option<String> {
        let (key, rgb) = match color {
            Color::Unset => return None,
            Color::Indexed(index) => {
                let index = match channel {
                    Channel::Foreground => effective_index(index, styles),
                    Channel::Background => index,
                };
                let rgb = Color::Indexed(index).to_hex(&StyleSet::new());
                (format!("{}{index}", channel.prefix()), rgb)
            }
            Color::Rgb(r, g, b) => (
                format!("{}-rgb_{r}_{g}_{b}", channel.prefix()),
                color.to_hex(styles),
            ),
        };

        self.entries
            .insert(key.clone(), format!("{}:{rgb}", channel.property()));
        Some(key)
    }

    #[must_use]
    pub fn declaration(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every registered color, keeping the base rules.
    pub fn reset(&mut self) {
        self.entries.clear();
    }

    /// Render the stylesheet: base rules first, then registered colors in
    /// key order so explicit colors win over the reverse/cursor defaults.
    #[must_use]
    pub fn flush(&self) -> String {
        let none = StyleSet::new();
        let fg = self.fg.to_hex(&none);
        let bg = self.bg.to_hex(&none);
        let fonts = FONT_STACK
            .iter()
            .map(|font| format!("\"{font}\""))
            .collect::<Vec<_>>()
            .join(",");

        let mut css = String::with_capacity(1024 + self.entries.len() * 48);
        let _ = write!(
            css,
            "div.{CLASS_NAME} pre{{font-family:{fonts},monospace;color:{fg};background-color:{bg};margin:0;}}"
        );

        let base: [(&str, String); 8] = [
            (BOLD, "font-weight:bold".to_string()),
            (ITALIC, "font-style:italic".to_string()),
            (UNDERLINE, "text-decoration:underline".to_string()),
            (
                NO_SELECT,
                "-webkit-user-select:none;-moz-user-select:none;-ms-user-select:none;user-select:none"
                    .to_string(),
            ),
            (GLYPH, "position:relative".to_string()),
            (REVERSE, format!("color:{bg};background-color:{fg}")),
            (CURSOR, format!("color:{bg};background-color:{fg}")),
            (CURSOR_REVERSE, format!("color:{fg};background-color:{bg}")),
        ];
        for (class, style) in &base {
            let _ = write!(css, "div.{CLASS_NAME} pre span.{class}{{{style};}}");
        }
        let _ = write!(
            css,
            "div.{CLASS_NAME} pre span.{GLYPH}::after{{content:attr(data-glyph);position:absolute;left:0;top:0;}}"
        );

        for (key, style) in &self.entries {
            let _ = write!(css, "div.{CLASS_NAME} pre span.{key}{{{style};}}");
        }
        css
    }
}
