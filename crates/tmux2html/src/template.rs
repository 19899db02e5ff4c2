//! HTML document assembly.
//!
//! Templates use `${key}` placeholders. Unknown keys are left untouched so
//! substituted markup is never re-scanned.

use std::sync::LazyLock;

use regex_lite::{Captures, Regex};

use tmux2html_core::css::CLASS_NAME;
use tmux2html_core::{Recording, Snapshot, StyleSet, Theme};

use crate::compress::{HUNK_LEN, compress_hunks};
use crate::error::Result;
use crate::util::now_local_human;

const DOCUMENT: &str = include_str!("../templates/document.html");
const STREAM_SCRIPT: &str = include_str!("../templates/stream.js");
const ANIMATION_SCRIPT: &str = include_str!("../templates/animation.js");
const SCROLL_SCRIPT: &str = include_str!("../templates/scroll.js");

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([a-z_]+)\}").expect("placeholder pattern is valid"));

/// Replace `${key}` placeholders from `values`.
#[must_use]
pub fn substitute(template: &str, values: &[(&str, &str)]) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures<'_>| {
            let key = &caps[1];
            values
                .iter()
                .find(|(name, _)| *name == key)
                .map_or_else(|| caps[0].to_string(), |(_, value)| (*value).to_string())
        })
        .into_owned()
}

fn script(source: &str, values: &[(&str, &str)]) -> String {
    format!("<script>\n{}</script>", substitute(source, values))
}

/// A complete page.
#[derive(Debug, Clone)]
pub struct Page<'a> {
    pub title: &'a str,
    pub theme: Theme,
    pub css: &'a str,
    pub panes: &'a str,
    pub scripts: Vec<String>,
}

impl Page<'_> {
    #[must_use]
    pub fn render(&self) -> String {
        let none = StyleSet::new();
        let title = v_htmlescape::escape(self.title).to_string();
        let fg = self.theme.fg.to_hex(&none);
        let bg = self.theme.bg.to_hex(&none);
        let created = now_local_human();
        let scripts = self.scripts.join("\n");
        substitute(
            DOCUMENT,
            &[
                ("version", env!("CARGO_PKG_VERSION")),
                ("title", &title),
                ("prefix", CLASS_NAME),
                ("fg", &fg),
                ("bg", &bg),
                ("css", self.css),
                ("panes", self.panes),
                ("created", &created),
                ("script", &scripts),
            ],
        )
    }
}

/// A single static snapshot, with the scroll script when a pane carries
/// history.
#[must_use]
pub fn snapshot_document(snapshot: &Snapshot, theme: Theme, title: &str) -> String {
    let mut scripts = Vec::new();
    if snapshot.has_history {
        scripts.push(script(SCROLL_SCRIPT, &[("prefix", CLASS_NAME)]));
    }
    Page {
        title,
        theme,
        css: &snapshot.css,
        panes: &snapshot.html,
        scripts,
    }
    .render()
}

/// A snapshot that re-fetches itself every `interval` seconds.
#[must_use]
pub fn stream_document(snapshot: &Snapshot, theme: Theme, title: &str, interval: f64) -> String {
    let interval = format!("{interval}");
    Page {
        title,
        theme,
        css: &snapshot.css,
        panes: &snapshot.html,
        scripts: vec![script(
            STREAM_SCRIPT,
            &[("prefix", CLASS_NAME), ("interval", &interval)],
        )],
    }
    .render()
}

/// A recording played back from compressed frames.
pub fn animation_document(recording: &Recording, theme: Theme, title: &str) -> Result<String> {
    let hunks = compress_hunks(&recording.frames_json()?, HUNK_LEN)?;
    let payload = format!(
        "<script type=\"text/tmux-frames\" id=\"{CLASS_NAME}-frames\">\n{}\n</script>",
        hunks.join("\n")
    );
    Ok(Page {
        title,
        theme,
        css: &recording.css,
        panes: "",
        scripts: vec![payload, script(ANIMATION_SCRIPT, &[("prefix", CLASS_NAME)])],
    }
    .render())
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use base64::{Engine as _, engine::general_purpose::STANDARD};
    use flate2::read::GzDecoder;
    use tmux2html_core::Frame;

    use super::*;

    fn snapshot(has_history: bool) -> Snapshot {
        Snapshot {
            html: "<div id=\"p1\" class=\"pane\" data-size=\"1,1\"><pre></pre></div>".to_string(),
            css: "div.tmux-html pre{}".to_string(),
            has_history,
        }
    }

    #[test]
    fn unknown_placeholders_survive() {
        let out = substitute("${a} ${b} $c", &[("a", "1")]);
        assert_eq!(out, "1 ${b} $c");
    }

    #[test]
    fn values_are_not_rescanned() {
        let out = substitute("${a}", &[("a", "${b}"), ("b", "no")]);
        assert_eq!(out, "${b}");
    }

    #[test]
    fn snapshot_page_is_complete() {
        let page = snapshot_document(&snapshot(false), Theme::default(), "<main>");
        assert!(page.starts_with("<!DOCTYPE html>"));
        assert!(page.contains("<title>&lt;main&gt;</title>"));
        assert!(page.contains("body{margin:0;background-color:#000000;}"));
        assert!(page.contains("<div class=\"tmux-html\""));
        assert!(page.contains("<div id=\"p1\" class=\"pane\""));
        assert!(page.contains("<style id=\"tmux-html-css\">div.tmux-html pre{}</style>"));
        assert!(!page.contains("<script>"));
        assert!(!page.contains("${"));
    }

    #[test]
    fn history_adds_scroll_script() {
        let page = snapshot_document(&snapshot(true), Theme::light(), "t");
        assert!(page.contains("div.tmux-html div.pane[data-history]"));
        assert!(page.contains("background-color:#fafafa"));
    }

    #[test]
    fn stream_page_embeds_interval() {
        let page = stream_document(&snapshot(false), Theme::default(), "t", 0.25);
        assert!(page.contains("var interval = 0.25 * 1000;"));
        assert!(page.contains("document.getElementById('tmux-html-css')"));
    }

    #[test]
    fn animation_payload_round_trips() {
        let recording = Recording {
            frames: vec![Frame {
                reset: true,
                layout: Some("<div id=\"p1\"></div>".to_string()),
                lines: Default::default(),
                delay: 0.0,
            }],
            css: String::new(),
        };
        let page = animation_document(&recording, Theme::default(), "t").unwrap();
        let start = page.find("id=\"tmux-html-frames\">").unwrap() + "id=\"tmux-html-frames\">".len();
        let end = start + page[start..].find("</script>").unwrap();
        let encoded: String = page[start..end].split_whitespace().collect();

        let bytes = STANDARD.decode(encoded).unwrap();
        let mut json = String::new();
        GzDecoder::new(bytes.as_slice()).read_to_string(&mut json).unwrap();
        assert_eq!(json, recording.frames_json().unwrap());
        assert!(page.contains("new DecompressionStream('gzip')"));
    }
}
