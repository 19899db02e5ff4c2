use std::io;

use chrono::Local;
use tmux2html_core::Color;
use tracing_subscriber::EnvFilter;

use crate::error::{Result, Tmux2HtmlError};

/// Environment variable holding the log filter.
pub const LOG_ENV: &str = "TMUX2HTML_LOG";

/// Install the stderr subscriber. Safe to call more than once.
pub fn init_logging(quiet: bool) {
    let fallback = if quiet { "error" } else { "warn" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(fallback));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

#[must_use]
pub fn now_local_human() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

pub fn command_exists(command: &str) -> bool {
    which::which(command).is_ok()
}

pub fn require_command(command: &str) -> Result<()> {
    if command_exists(command) {
        Ok(())
    } else {
        Err(Tmux2HtmlError::MissingCommand {
            command: command.to_string(),
        })
    }
}

/// Parse a color argument: a palette index (`N`) or `R,G,B`.
pub fn parse_color(raw: &str) -> Result<Color> {
    let parts = raw
        .split(',')
        .map(|part| part.trim().parse::<u8>())
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|_| Tmux2HtmlError::invalid(format!("bad color `{raw}`: expected N or R,G,B (0-255)")))?;

    match parts.as_slice() {
        [index] => Ok(Color::Indexed(*index)),
        [r, g, b] => Ok(Color::Rgb(*r, *g, *b)),
        _ => Err(Tmux2HtmlError::invalid(format!(
            "bad color `{raw}`: expected N or R,G,B"
        ))),
    }
}

/// Parse an octal permission string such as `644` or `0o600`.
pub fn parse_mode(raw: &str) -> Result<u32> {
    let trimmed = raw.trim();
    let digits = trimmed
        .strip_prefix("0o")
        .or_else(|| trimmed.strip_prefix("0O"))
        .unwrap_or(trimmed);
    let mode = u32::from_str_radix(digits, 8)
        .map_err(|_| Tmux2HtmlError::invalid(format!("bad file mode `{raw}`: expected octal digits")))?;
    if mode > 0o7777 {
        return Err(Tmux2HtmlError::invalid(format!("file mode `{raw}` is out of range")));
    }
    Ok(mode)
}

/// Integer parse that falls back to `0`, matching how tmux treats
/// malformed target indices.
#[must_use]
pub fn silent_int(raw: &str) -> usize {
    raw.trim().parse().unwrap_or(0)
}
