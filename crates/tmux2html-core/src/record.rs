//! Record mode: a sequence of delta frames.
//!
//! Every poll renders each pane and compares its rows with the rows from
//! the previous poll. Only rows whose markup changed are emitted. When the
//! pane tree changes shape the frame instead carries a fresh skeleton and
//! every row of every pane.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use tracing::{debug, info};

use crate::layout::Layout;
use crate::render::{PaneSource, RenderContext, Renderer};

/// One animation step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Frame {
    /// The container skeleton was replaced.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub reset: bool,
    /// Skeleton markup, present on reset frames.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub layout: Option<String>,
    /// Changed rows by pane identifier, then row index.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub lines: BTreeMap<u32, BTreeMap<usize, String>>,
    /// Seconds to wait before applying this frame.
    pub delay: f64,
}

/// Finished recording.
#[derive(Debug, Clone, PartialEq)]
pub struct Recording {
    pub frames: Vec<Frame>,
    pub css: String,
}

impl Recording {
    pub fn frames_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.frames)
    }

    /// Total playback time in seconds.
    #[must_use]
    pub fn duration(&self) -> f64 {
        self.frames.iter().map(|frame| frame.delay).sum()
    }
}

/// Rendered rows of every pane from one capture pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample {
    panes: Vec<(u32, Vec<String>)>,
}

/// Accumulates frames across polls within one render pass.
#[derive(Debug)]
pub struct Recorder {
    renderer: Renderer,
    ctx: RenderContext,
    structure: Option<u64>,
    previous: HashMap<u32, Vec<String>>,
    frames: Vec<Frame>,
    pending_delay: f64,
}

impl Recorder {
    #[must_use]
    pub fn new(renderer: Renderer) -> Self {
        let ctx = renderer.begin_pass();
        Self {
            renderer,
            ctx,
            structure: None,
            previous: HashMap::new(),
            frames: Vec::new(),
            pending_delay: 0.0,
        }
    }

    /// Render the tree and record what changed since the last poll.
    ///
    /// `delay` is the time elapsed since the previous poll. Returns the new
    /// frame, or `None` when nothing changed; the delay then carries over
    /// to the next frame.
    pub fn poll(&mut self, root: &Layout, source: &dyn PaneSource, delay: f64) -> Option<&Frame> {
        let sample = self.capture(root, source);
        self.commit(root, sample, delay)
    }

    /// Render every pane of `root` without touching the recorded frames.
    ///
    /// A sample that is never committed leaves the recording unchanged.
    pub fn capture(&mut self, root: &Layout, source: &dyn PaneSource) -> Sample {
        let panes = root
            .leaves()
            .into_iter()
            .filter_map(|pane| {
                let id = pane.identifier?;
                Some((id, self.renderer.pane_rows(&mut self.ctx, pane, source).visible))
            })
            .collect();
        Sample { panes }
    }

    /// Diff `sample` against the previous commit and append a frame when
    /// anything changed.
    pub fn commit(&mut self, root: &Layout, sample: Sample, delay: f64) -> Option<&Frame> {
        self.pending_delay += delay;

        let key = root.structure_key();
        let reset = self.structure != Some(key);
        let layout = if reset {
            debug!(panes = root.leaves().len(), "pane structure changed");
            self.structure = Some(key);
            self.previous.clear();
            Some(self.renderer.render_skeleton(root).concat())
        } else {
            None
        };

        let mut lines = BTreeMap::new();
        for (id, rows) in sample.panes {
            let previous = self.previous.get(&id);
            let changed: BTreeMap<usize, String> = rows
                .iter()
                .enumerate()
                .filter(|&(index, row)| previous.and_then(|rows| rows.get(index)) != Some(row))
                .map(|(index, row)| (index, row.clone()))
                .collect();
            if !changed.is_empty() {
                lines.insert(id, changed);
            }
            self.previous.insert(id, rows);
        }

        if !reset && lines.is_empty() {
            return None;
        }

        let frame = Frame {
            reset,
            layout,
            lines,
            delay: if self.frames.is_empty() { 0.0 } else { self.pending_delay },
        };
        self.pending_delay = 0.0;
        info!(
            frame = self.frames.len(),
            reset = frame.reset,
            panes = frame.lines.len(),
            "recorded frame"
        );
        self.frames.push(frame);
        self.frames.last()
    }

    /// Close the pass and produce the stylesheet for every frame.
    #[must_use]
    pub fn finish(self) -> Recording {
        Recording {
            css: self.ctx.stylesheet(),
            frames: self.frames,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::HashMap;

    use super::*;
    use crate::layout;
    use crate::render::{CaptureOptions, Theme};

    #[derive(Default)]
    struct Screens {
        content: RefCell<HashMap<u32, String>>,
    }

    impl Screens {
        fn set(&self, pane: u32, text: &str) {
            self.content.borrow_mut().insert(pane, text.to_string());
        }
    }

    impl PaneSource for Screens {
        fn capture(&self, pane: u32, _full_history: bool, _max_lines: usize) -> String {
            self.content.borrow().get(&pane).cloned().unwrap_or_default()
        }

        fn cursor_position(&self, _pane: u32) -> Option<(usize, usize)> {
            None
        }
    }

    fn recorder() -> Recorder {
        Recorder::new(Renderer::new(Theme::default(), CaptureOptions::default()))
    }

    fn rows(count: usize, marker: Option<(usize, &str)>) -> String {
        (0..count)
            .map(|row| match marker {
                Some((at, text)) if at == row => text.to_string(),
                _ => format!("line {row}"),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn first_frame_is_a_full_reset() {
        let root = layout::parse("@1,10x2,0,0,1").unwrap();
        let screens = Screens::default();
        screens.set(1, "a\nb");

        let mut recorder = recorder();
        let frame = recorder.poll(&root, &screens, 0.5).unwrap().clone();
        assert!(frame.reset);
        assert!(frame.layout.as_deref().unwrap().contains("id=\"p1\""));
        assert_eq!(frame.lines[&1].len(), 2);
        assert_eq!(frame.delay, 0.0);
    }

    #[test]
    fn only_changed_rows_are_emitted() {
        let root = layout::parse("@1,20x8,0,0[10x8,0,0,1,10x8,10,0,2]").unwrap();
        let screens = Screens::default();
        screens.set(1, &rows(8, None));
        screens.set(2, &rows(8, None));

        let mut recorder = recorder();
        recorder.poll(&root, &screens, 0.0);

        screens.set(2, &rows(8, Some((5, "changed"))));
        let frame = recorder.poll(&root, &screens, 0.5).unwrap().clone();
        assert!(!frame.reset);
        assert!(frame.layout.is_none());
        assert_eq!(frame.lines.len(), 1);
        let pane = &frame.lines[&2];
        assert_eq!(pane.len(), 1);
        assert!(pane[&5].contains("changed"));
        assert_eq!(frame.delay, 0.5);
    }

    #[test]
    fn idle_polls_fold_into_the_next_delay() {
        let root = layout::parse("@1,10x1,0,0,1").unwrap();
        let screens = Screens::default();
        screens.set(1, "a");

        let mut recorder = recorder();
        recorder.poll(&root, &screens, 0.0);
        assert!(recorder.poll(&root, &screens, 0.5).is_none());
        assert!(recorder.poll(&root, &screens, 0.5).is_none());
        screens.set(1, "b");
        let frame = recorder.poll(&root, &screens, 0.5).unwrap();
        assert!((frame.delay - 1.5).abs() < f64::EPSILON);
        assert_eq!(recorder.finish().frames.len(), 2);
    }

    #[test]
    fn structure_change_forces_reset() {
        let single = layout::parse("@1,10x2,0,0,1").unwrap();
        let split = layout::parse("@1,10x2,0,0[5x2,0,0,1,5x2,5,0,2]").unwrap();
        let screens = Screens::default();
        screens.set(1, "a");

        let mut recorder = recorder();
        recorder.poll(&single, &screens, 0.0);
        let frame = recorder.poll(&split, &screens, 0.5).unwrap();
        assert!(frame.reset);
        assert!(frame.layout.as_deref().unwrap().contains("class=\"sep"));
        assert_eq!(frame.lines[&1].len(), 2);
        assert_eq!(frame.lines[&2].len(), 2);
    }

    #[test]
    fn registry_spans_the_whole_recording() {
        let root = layout::parse("@1,10x1,0,0,1").unwrap();
        let screens = Screens::default();
        screens.set(1, "\x1b[31mred");

        let mut recorder = recorder();
        recorder.poll(&root, &screens, 0.0);
        screens.set(1, "\x1b[32mgreen");
        recorder.poll(&root, &screens, 1.0);

        let recording = recorder.finish();
        assert!(recording.css.contains("span.f1{"));
        assert!(recording.css.contains("span.f2{"));
        assert_eq!(recording.duration(), 1.0);
    }

    #[test]
    fn discarded_sample_leaves_recording_untouched() {
        let root = layout::parse("@1,10x1,0,0,1").unwrap();
        let screens = Screens::default();
        screens.set(1, "a");

        let mut recorder = recorder();
        recorder.poll(&root, &screens, 0.0);
        screens.set(1, "");
        let _ = recorder.capture(&root, &screens);
        screens.set(1, "b");
        let frame = recorder.poll(&root, &screens, 0.5).unwrap().clone();
        assert!(frame.lines[&1][&0].contains('b'));

        let recording = recorder.finish();
        assert_eq!(recording.frames.len(), 2);
        assert_eq!(recording.duration(), 0.5);
    }

    #[test]
    fn frames_serialize_compactly() {
        let root = layout::parse("@1,3x1,0,0,7").unwrap();
        let screens = Screens::default();
        screens.set(7, "x");

        let mut recorder = recorder();
        recorder.poll(&root, &screens, 0.0);
        screens.set(7, "y");
        recorder.poll(&root, &screens, 0.25);

        let json = recorder.finish().frames_json().unwrap();
        let frames: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(frames[0]["reset"], true);
        assert!(frames[1].get("reset").is_none());
        assert!(frames[1].get("layout").is_none());
        assert_eq!(frames[1]["delay"], 0.25);
        assert!(frames[1]["lines"]["7"]["0"].as_str().unwrap().contains('y'));
    }
}
