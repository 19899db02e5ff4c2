use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tracing::info;

use tmux2html_core::{CaptureOptions, Renderer, Theme};

use crate::compress::GzipBase64;
use crate::driver::{self, Interrupt, SignalGuard};
use crate::error::{Result, Tmux2HtmlError};
use crate::output::Output;
use crate::target::Target;
use crate::template;
use crate::tmux::{Tmux, WindowSource};
use crate::util::{init_logging, parse_color, parse_mode};

#[derive(Debug, Parser)]
#[command(
    name = "tmux2html",
    about = "Render tmux panes as HTML",
    version
)]
pub struct Cli {
    /// Target `[session:]window[.pane]`; defaults to the active window.
    #[arg(default_value = "")]
    pub target: String,

    /// Output file (required with --stream); stdout when omitted.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Output file permissions (octal).
    #[arg(short, long, default_value = "644")]
    pub mode: String,

    /// Dark text on a light background.
    #[arg(long)]
    pub light: bool,

    /// Default foreground color: palette index `N` or `R,G,B`.
    #[arg(long)]
    pub fg: Option<String>,

    /// Default background color: palette index `N` or `R,G,B`.
    #[arg(long)]
    pub bg: Option<String>,

    /// Keep rewriting the output file, with a script that auto refreshes
    /// every --interval.
    #[arg(long)]
    pub stream: bool,

    /// Seconds between captures.
    #[arg(long, default_value_t = 0.5, allow_negative_numbers = true)]
    pub interval: f64,

    /// Record an animation for this many seconds (0 until interrupted).
    #[arg(long, allow_negative_numbers = true)]
    pub duration: Option<f64>,

    /// Include the full scrollback history.
    #[arg(long)]
    pub full: bool,

    /// Limit scrollback to this many lines (0 is unbounded).
    #[arg(long, default_value_t = 0)]
    pub max_lines: usize,

    /// Seconds to wait for each tmux command.
    #[arg(long, default_value_t = 10)]
    pub timeout: u64,

    /// Only print errors.
    #[arg(short, long)]
    pub quiet: bool,
}

/// What to produce.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Mode {
    Snapshot,
    Stream { interval: Duration },
    Record { interval: Duration, duration: Option<Duration> },
}

/// Validated settings for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub target: Target,
    pub output: Output,
    pub theme: Theme,
    pub capture: CaptureOptions,
    pub mode: Mode,
    pub timeout: Duration,
    pub quiet: bool,
}

impl Cli {
    /// Check option combinations and resolve them. Nothing here talks to
    /// tmux.
    pub fn settings(&self) -> Result<Settings> {
        if !self.interval.is_finite() || self.interval <= 0.0 {
            return Err(Tmux2HtmlError::invalid("--interval must be a positive number of seconds"));
        }
        if self.duration.is_some_and(|d| !d.is_finite() || d < 0.0) {
            return Err(Tmux2HtmlError::invalid("--duration must be zero or a positive number of seconds"));
        }
        if self.stream {
            if self.output.is_none() {
                return Err(Tmux2HtmlError::conflict("--stream requires --output"));
            }
            if self.full {
                return Err(Tmux2HtmlError::conflict("--stream cannot be combined with --full"));
            }
            if self.duration.is_some() {
                return Err(Tmux2HtmlError::conflict("--stream cannot be combined with --duration"));
            }
        }
        if self.duration.is_some() && self.full {
            return Err(Tmux2HtmlError::conflict("--duration cannot be combined with --full"));
        }

        let mut theme = if self.light {
            Theme::light()
        } else {
            Theme::default()
        };
        if let Some(fg) = &self.fg {
            theme.fg = parse_color(fg)?;
        }
        if let Some(bg) = &self.bg {
            theme.bg = parse_color(bg)?;
        }

        let interval = seconds(self.interval, "--interval")?;
        let mode = match (self.stream, self.duration) {
            (true, _) => Mode::Stream { interval },
            (false, Some(limit)) => Mode::Record {
                interval,
                duration: if limit > 0.0 {
                    Some(seconds(limit, "--duration")?)
                } else {
                    None
                },
            },
            (false, None) => Mode::Snapshot,
        };

        Ok(Settings {
            target: Target::parse(&self.target),
            output: Output::new(self.output.clone(), parse_mode(&self.mode)?),
            theme,
            capture: CaptureOptions {
                full_history: self.full,
                max_lines: self.max_lines,
            },
            mode,
            timeout: Duration::from_secs(self.timeout),
            quiet: self.quiet,
        })
    }
}

fn seconds(value: f64, flag: &str) -> Result<Duration> {
    Duration::try_from_secs_f64(value)
        .map_err(|_| Tmux2HtmlError::invalid(format!("{flag} is out of range: {value}")))
}

pub fn run_from_env() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.quiet);
    run(cli)
}

pub fn run(cli: Cli) -> Result<()> {
    let settings = cli.settings()?;
    let tmux = Tmux::new(&settings.target, settings.timeout)?;
    let region = settings.target.select(&tmux.window_layout()?)?;
    let title = format!("tmux2html: {}", settings.target);
    info!(window = %settings.target, panes = region.leaves().len(), "rendering");

    let mut renderer = Renderer::new(settings.theme, settings.capture);
    if settings.capture.full_history {
        renderer = renderer.with_encoder(Box::new(GzipBase64::default()));
    }

    match settings.mode {
        Mode::Snapshot => {
            let snapshot = renderer.render_snapshot(&region, &tmux);
            settings
                .output
                .write(&template::snapshot_document(&snapshot, settings.theme, &title))?;
            announce_written(&settings);
        }
        Mode::Stream { interval } => {
            let interrupt = Interrupt::manual();
            let _guard = SignalGuard::new(&interrupt)?;
            if !settings.quiet {
                if let Some(path) = settings.output.path() {
                    println!(
                        "Streaming ({:.2}s) to {}.\nPress Ctrl-C to stop.",
                        interval.as_secs_f64(),
                        path.display()
                    );
                }
            }
            driver::stream(&tmux, region, &renderer, &settings.output, &title, interval, &interrupt)?;
        }
        Mode::Record { interval, duration } => {
            let interrupt = Interrupt::manual();
            let _guard = SignalGuard::new(&interrupt)?;
            if !settings.quiet {
                match duration {
                    Some(limit) => eprintln!(
                        "Recording for {:.2} seconds.  Press Ctrl-C to stop.",
                        limit.as_secs_f64()
                    ),
                    None => eprintln!("Recording indefinitely.  Press Ctrl-C to stop."),
                }
            }
            let recording = driver::record(&tmux, region, renderer, interval, duration, &interrupt)?;
            settings
                .output
                .write(&template::animation_document(&recording, settings.theme, &title)?)?;
            announce_written(&settings);
        }
    }
    Ok(())
}

fn announce_written(settings: &Settings) {
    if settings.quiet {
        return;
    }
    if let Some(path) = settings.output.path() {
        println!("Wrote HTML to: {}", path.display());
    }
}
