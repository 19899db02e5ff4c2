#![forbid(unsafe_code)]

//! Rendering core for tmux2html.
//!
//! Turns captured tmux pane text (with SGR escape sequences) and tmux
//! layout strings into styled, cell-accurate HTML. Nothing here spawns
//! processes or touches the filesystem; pane content arrives through
//! [`render::PaneSource`].

pub mod acs;
pub mod chunk;
pub mod color;
pub mod css;
pub mod layout;
pub mod record;
pub mod render;

pub use chunk::{ChunkedLine, render_rows};
pub use color::{Color, SgrState, StyleSet, parse_sgr, term_to_rgb};
pub use css::{Channel, StyleRegistry};
pub use layout::{Layout, LayoutError};
pub use record::{Frame, Recorder, Recording, Sample};
pub use render::{
    CaptureOptions, HistoryEncoder, PaneRows, PaneSource, RenderContext, Renderer, Snapshot, Theme,
};
