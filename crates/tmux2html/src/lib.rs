#![forbid(unsafe_code)]

//! tmux2html: render tmux windows and panes as HTML.
//!
//! The rendering itself lives in `tmux2html-core`; this crate talks to
//! tmux, assembles documents and drives the streaming and recording loops.

pub mod cli;
pub mod compress;
pub mod driver;
pub mod error;
pub mod output;
pub mod target;
pub mod template;
pub mod tmux;
pub mod util;

pub use cli::run_from_env;
pub use error::{Result, Tmux2HtmlError};
