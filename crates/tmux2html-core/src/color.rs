//! Terminal color model and SGR parameter interpretation.
//!
//! Colors arrive from tmux captures as SGR parameter strings (`ESC [ … m`).
//! This module turns those parameters into [`Color`] values and style codes,
//! and maps palette indices to RGB triples.
//!
//! # Palette
//!
//! | Index     | Meaning                                        |
//! |-----------|------------------------------------------------|
//! | 0–7       | basic colors                                   |
//! | 8–15      | basic colors brightened by `0x55` per channel  |
//! | 16–231    | 6×6×6 color cube                               |
//! | 232–255   | 24-step grayscale ramp                         |

use tracing::debug;

const BASIC: [(u8, u8, u8); 8] = [
    (0x00, 0x00, 0x00),
    (0x80, 0x00, 0x00),
    (0x00, 0x80, 0x00),
    (0x80, 0x80, 0x00),
    (0x00, 0x00, 0x80),
    (0x80, 0x00, 0x80),
    (0x00, 0x80, 0x80),
    (0x80, 0x80, 0x80),
];

const BRIGHTEN: u8 = 0x55;

const CUBE_STEPS: [u8; 6] = [0x00, 0x5f, 0x87, 0xaf, 0xd7, 0xff];

/// A terminal color as carried by SGR sequences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Color {
    /// No color set; inherit the document default.
    #[default]
    Unset,
    /// 256-color palette index.
    Indexed(u8),
    /// 24-bit color.
    Rgb(u8, u8, u8),
}

impl Color {
    #[must_use]
    pub const fn is_unset(self) -> bool {
        matches!(self, Self::Unset)
    }

    /// Resolve to an RGB triple, applying bold brightening for palette
    /// colors. Returns `None` for [`Color::Unset`].
    #[must_use]
    pub fn to_rgb(self, styles: &StyleSet) -> Option<(u8, u8, u8)> {
        match self {
            Self::Unset => None,
            Self::Indexed(index) => Some(term_to_rgb(index, styles)),
            Self::Rgb(r, g, b) => Some((r, g, b)),
        }
    }

    /// CSS hex notation (`#rrggbb`), or `none` when unset.
    #[must_use]
    pub fn to_hex(self, styles: &StyleSet) -> String {
        match self.to_rgb(styles) {
            Some((r, g, b)) => format!("#{r:02x}{g:02x}{b:02x}"),
            None => "none".to_string(),
        }
    }
}

/// Ordered, deduplicated set of active SGR style codes.
///
/// Codes are only ever appended (or cleared wholesale by `0`), so an
/// "off" code such as `22` stays in the set and cancels its "on" partner.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct StyleSet(Vec<u16>);

impl StyleSet {
    pub const BOLD: u16 = 1;
    pub const ITALIC: u16 = 3;
    pub const UNDERLINE: u16 = 4;
    pub const REVERSE: u16 = 7;
    pub const BOLD_OFF: u16 = 22;
    pub const ITALIC_OFF: u16 = 23;
    pub const UNDERLINE_OFF: u16 = 24;
    pub const REVERSE_OFF: u16 = 27;

    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_codes(codes: &[u16]) -> Self {
        let mut set = Self::new();
        for &code in codes {
            set.insert(code);
        }
        set
    }

    #[must_use]
    pub fn contains(&self, code: u16) -> bool {
        self.0.contains(&code)
    }

    /// Append `code` unless it is already present.
    pub fn insert(&mut self, code: u16) {
        if !self.contains(code) {
            self.0.push(code);
        }
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn codes(&self) -> &[u16] {
        &self.0
    }

    /// `on` is present and its cancelling `off` code is not.
    #[must_use]
    pub fn is_active(&self, on: u16, off: u16) -> bool {
        self.contains(on) && !self.contains(off)
    }

    #[must_use]
    pub fn bold(&self) -> bool {
        self.is_active(Self::BOLD, Self::BOLD_OFF)
    }

    #[must_use]
    pub fn italic(&self) -> bool {
        self.is_active(Self::ITALIC, Self::ITALIC_OFF)
    }

    #[must_use]
    pub fn underline(&self) -> bool {
        self.is_active(Self::UNDERLINE, Self::UNDERLINE_OFF)
    }

    #[must_use]
    pub fn reverse(&self) -> bool {
        self.is_active(Self::REVERSE, Self::REVERSE_OFF)
    }
}

/// Running SGR state for one pane: colors persist across lines and are only
/// cleared by explicit codes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SgrState {
    pub fg: Color,
    pub bg: Color,
    pub styles: StyleSet,
}

impl SgrState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply the parameter string of one `ESC [ params m` sequence.
    pub fn apply(&mut self, params: &str) {
        let (fg, bg) = parse_sgr(params, self.fg, self.bg, &mut self.styles);
        self.fg = fg;
        self.bg = bg;
    }
}

/// Palette index after bold brightening (or un-brightening for `22`).
#[must_use]
pub fn effective_index(index: u8, styles: &StyleSet) -> u8 {
    if index < 8 && styles.bold() {
        index + 8
    } else if (8..16).contains(&index) && styles.contains(StyleSet::BOLD_OFF) {
        index - 8
    } else {
        index
    }
}

/// RGB triple for a palette index under the given styles.
#[must_use]
pub fn term_to_rgb(index: u8, styles: &StyleSet) -> (u8, u8, u8) {
    let index = effective_index(index, styles);
    match index {
        0..=7 => BASIC[usize::from(index)],
        8..=15 => {
            let (r, g, b) = BASIC[usize::from(index - 8)];
            (
                r.saturating_add(BRIGHTEN),
                g.saturating_add(BRIGHTEN),
                b.saturating_add(BRIGHTEN),
            )
        }
        16 => (0x00, 0x00, 0x00),
        17..=231 => {
            let n = usize::from(index - 16);
            (
                CUBE_STEPS[n / 36],
                CUBE_STEPS[(n / 6) % 6],
                CUBE_STEPS[n % 6],
            )
        }
        232..=255 => {
            let c = 8 + (index - 232) * 10;
            (c, c, c)
        }
    }
}

/// Cursor over the numeric tokens of one SGR parameter string.
///
/// Extended color codes (`38`, `48`) pull their operands from the same
/// cursor, so the main loop never sees them.
#[derive(Debug, Clone)]
struct SgrTokens {
    tokens: Vec<u32>,
    index: usize,
}

impl SgrTokens {
    fn new(params: &str) -> Self {
        let tokens = params
            .split(';')
            .filter_map(|raw| match raw.trim().parse::<u32>() {
                Ok(value) => Some(value),
                Err(_) => {
                    debug!(token = raw, params, "ignoring non-numeric SGR parameter");
                    None
                }
            })
            .collect();
        Self { tokens, index: 0 }
    }

    fn take_next(&mut self) -> Option<u32> {
        let value = self.tokens.get(self.index).copied()?;
        self.index += 1;
        Some(value)
    }

    fn take_u8(&mut self) -> Option<u8> {
        u8::try_from(self.take_next()?).ok()
    }

    /// Operands of `38`/`48`: `5;N` or `2;R;G;B`.
    fn take_color(&mut self) -> Option<Color> {
        match self.take_next()? {
            5 => Some(Color::Indexed(self.take_u8()?)),
            2 => {
                let r = self.take_u8()?;
                let g = self.take_u8()?;
                let b = self.take_u8()?;
                Some(Color::Rgb(r, g, b))
            }
            mode => {
                debug!(mode, "unsupported extended color mode");
                None
            }
        }
    }
}

/// Interpret an SGR parameter string, updating `styles` in place and
/// returning the new `(fg, bg)`.
///
/// Code `0` clears the style flags but leaves colors alone; colors are only
/// cleared by `39`/`49`. An empty parameter string is a full reset.
pub fn parse_sgr(params: &str, fg: Color, bg: Color, styles: &mut StyleSet) -> (Color, Color) {
    if params.is_empty() {
        styles.clear();
        return (Color::Unset, Color::Unset);
    }

    let (mut fg, mut bg) = (fg, bg);
    let mut tokens = SgrTokens::new(params);
    while let Some(token) = tokens.take_next() {
        match token {
            38 => {
                if let Some(color) = tokens.take_color() {
                    fg = color;
                }
            }
            48 => {
                if let Some(color) = tokens.take_color() {
                    bg = color;
                }
            }
            39 => fg = Color::Unset,
            49 => bg = Color::Unset,
            30..=37 => fg = Color::Indexed((token - 30) as u8),
            40..=47 => bg = Color::Indexed((token - 40) as u8),
            90..=97 => fg = Color::Indexed((token - 90 + 8) as u8),
            100..=107 => bg = Color::Indexed((token - 100 + 8) as u8),
            0 => styles.clear(),
            other => match u16::try_from(other) {
                Ok(code) => styles.insert(code),
                Err(_) => debug!(token = other, "ignoring out-of-range SGR code"),
            },
        }
    }
    (fg, bg)
}
