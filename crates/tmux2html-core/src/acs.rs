//! VT100 alternate character set (line drawing) translation.
//!
//! `SO` (0x0e) shifts into the alternate set and `SI` (0x0f) shifts back.
//! While shifted, bytes `0x60..=0x7e` select line-drawing glyphs.

pub const SHIFT_OUT: char = '\x0e';
pub const SHIFT_IN: char = '\x0f';

const FIRST: u32 = 0x60;

const GLYPHS: [char; 31] = [
    '◆', '▒', '␉', '␌', '␍', '␊', '°', '±', '␤', '␋', '┘', '┐', '┌', '└', '┼', '⎺', '⎻', '─',
    '⎼', '⎽', '├', '┤', '┴', '┬', '│', '≤', '≥', 'π', '≠', '£', '·',
];

/// Glyph for `ch` under the alternate character set; other characters pass
/// through unchanged.
#[must_use]
pub fn translate(ch: char) -> char {
    let code = u32::from(ch);
    code.checked_sub(FIRST)
        .and_then(|offset| GLYPHS.get(offset as usize))
        .copied()
        .unwrap_or(ch)
}
