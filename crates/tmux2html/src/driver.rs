//! Polling loops for streaming and recording.
//!
//! Both loops re-derive the rendered region from a fresh window layout on
//! every poll and stop cleanly on SIGINT/SIGTERM, keeping whatever output
//! was produced up to that point. A poll that overlaps the stop request is
//! discarded: its captures may have been cut short by the same signal.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use tmux2html_core::{Layout, PaneSource, Recorder, Recording, Renderer};

use crate::error::Result;
use crate::output::Output;
use crate::template;
use crate::tmux::WindowSource;

#[cfg(unix)]
use signal_hook::consts::signal::{SIGINT, SIGTERM};
#[cfg(unix)]
use signal_hook::iterator::Signals;

const SLEEP_SLICE: Duration = Duration::from_millis(50);

/// Stop flag shared with the signal thread.
#[derive(Debug, Clone, Default)]
pub struct Interrupt {
    flag: Arc<AtomicBool>,
}

impl Interrupt {
    /// A flag only [`Interrupt::trigger`] can set.
    #[must_use]
    pub fn manual() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_set(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Sleep in short slices. Returns `false` when interrupted.
    pub fn sleep(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        loop {
            if self.is_set() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            thread::sleep(SLEEP_SLICE.min(deadline - now));
        }
    }
}

/// Routes SIGINT/SIGTERM into an [`Interrupt`] while alive.
#[cfg(unix)]
#[derive(Debug)]
pub struct SignalGuard {
    handle: signal_hook::iterator::Handle,
    thread: Option<thread::JoinHandle<()>>,
}

#[cfg(unix)]
impl SignalGuard {
    pub fn new(interrupt: &Interrupt) -> std::io::Result<Self> {
        let mut signals = Signals::new([SIGINT, SIGTERM]).map_err(std::io::Error::other)?;
        let handle = signals.handle();
        let interrupt = interrupt.clone();
        let thread = thread::spawn(move || {
            for signal in signals.forever() {
                info!(signal, "stop requested");
                interrupt.trigger();
            }
        });
        Ok(Self {
            handle,
            thread: Some(thread),
        })
    }
}

#[cfg(unix)]
impl Drop for SignalGuard {
    fn drop(&mut self) {
        self.handle.close();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// Stand-in on platforms without POSIX signals.
#[cfg(not(unix))]
#[derive(Debug)]
pub struct SignalGuard;

#[cfg(not(unix))]
impl SignalGuard {
    pub fn new(_interrupt: &Interrupt) -> std::io::Result<Self> {
        Ok(Self)
    }
}

/// Re-render `region` into `output` every `interval` until interrupted.
/// Returns the number of documents written.
pub fn stream<S>(
    source: &S,
    mut region: Layout,
    renderer: &Renderer,
    output: &Output,
    title: &str,
    interval: Duration,
    interrupt: &Interrupt,
) -> Result<usize>
where
    S: PaneSource + WindowSource,
{
    let mut written = 0;
    while !interrupt.is_set() {
        let Some(window) = window_layout(source, interrupt)? else {
            break;
        };
        region = region.refit(&window);
        let snapshot = renderer.render_snapshot(&region, source);
        if interrupt.is_set() {
            debug!("dropping interrupted refresh");
            break;
        }
        output.write(&template::stream_document(
            &snapshot,
            renderer.theme(),
            title,
            interval.as_secs_f64(),
        ))?;
        written += 1;
        debug!(written, "stream refreshed");
        if !interrupt.sleep(interval) {
            break;
        }
    }
    info!(written, "streaming stopped");
    Ok(written)
}

/// Record frames every `interval` for `duration` (`None` runs until
/// interrupted).
pub fn record<S>(
    source: &S,
    mut region: Layout,
    renderer: Renderer,
    interval: Duration,
    duration: Option<Duration>,
    interrupt: &Interrupt,
) -> Result<Recording>
where
    S: PaneSource + WindowSource,
{
    let mut recorder = Recorder::new(renderer);
    let start = Instant::now();
    let mut last = start;

    while !interrupt.is_set() {
        if duration.is_some_and(|limit| start.elapsed() >= limit) {
            break;
        }
        let Some(window) = window_layout(source, interrupt)? else {
            break;
        };
        region = region.refit(&window);
        let now = Instant::now();
        let delay = now.duration_since(last).as_secs_f64();
        last = now;
        let sample = recorder.capture(&region, source);
        if interrupt.is_set() {
            debug!("dropping interrupted poll");
            break;
        }
        recorder.commit(&region, sample, delay);
        if !interrupt.sleep(interval) {
            break;
        }
    }

    let recording = recorder.finish();
    info!(
        frames = recording.frames.len(),
        seconds = recording.duration(),
        "recording finished"
    );
    Ok(recording)
}

/// The current window layout, or `None` when the query failed because a
/// stop was requested while it ran.
fn window_layout<S: WindowSource>(source: &S, interrupt: &Interrupt) -> Result<Option<Layout>> {
    match source.window_layout() {
        Ok(layout) => Ok(Some(layout)),
        Err(error) if interrupt.is_set() => {
            debug!(%error, "layout query interrupted");
            Ok(None)
        }
        Err(error) => Err(error),
    }
}
