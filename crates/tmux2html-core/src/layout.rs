//! tmux window layout parsing.
//!
//! tmux serialises a window's pane tree as a compact string such as
//!
//! ```text
//! bb62,159x48,0,0{79x48,0,0,79,79x48,80,0[79x24,80,0,80,79x23,80,25,81]}
//! ```
//!
//! The first field is a checksum/window identifier and is discarded. Every
//! node is `WxH,x,y` followed by either `,id` for a leaf pane or a bracketed
//! group of children: `{…}` splits left-to-right, `[…]` splits
//! top-to-bottom.
//!
//! # Invariants
//!
//! 1. A node is either a leaf (`identifier` is `Some`, no children) or a
//!    split (`identifier` is `None`, at least one child).
//! 2. Children keep the order they appear in the layout string.
//! 3. Parsing never recovers partially: malformed input is a [`LayoutError`].

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LayoutError {
    #[error("empty layout string")]
    Empty,

    #[error("layout string has no window identifier field: {0:?}")]
    MissingWindowField(String),

    #[error("unmatched '{open}' at offset {offset}")]
    UnmatchedBracket { open: char, offset: usize },

    #[error("invalid {field} value: {value:?}")]
    InvalidNumber { field: &'static str, value: String },

    #[error("incomplete layout node: {count} dangling token(s)")]
    IncompleteNode { count: usize },

    #[error("split group contains no panes")]
    EmptyGroup,
}

pub type Result<T> = std::result::Result<T, LayoutError>;

/// One lexical token of a layout segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token<'a> {
    /// A comma-delimited scalar field (`80x24`, `0`, `3`).
    Field(&'a str),
    /// A bracketed sub-layout; `body` excludes the brackets.
    Group { vertical: bool, body: &'a str },
}

/// A rectangular region of a tmux window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
    /// Pane identifier (`%N`) for leaves, `None` for split nodes.
    pub identifier: Option<u32>,
    /// `true` when children are stacked top-to-bottom.
    pub vertical: bool,
    pub panes: Vec<Layout>,
}

impl Layout {
    #[must_use]
    pub fn leaf(x: usize, y: usize, width: usize, height: usize, identifier: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
            identifier: Some(identifier),
            vertical: false,
            panes: Vec::new(),
        }
    }

    #[must_use]
    pub fn split(
        x: usize,
        y: usize,
        width: usize,
        height: usize,
        vertical: bool,
        panes: Vec<Layout>,
    ) -> Self {
        Self {
            x,
            y,
            width,
            height,
            identifier: None,
            vertical,
            panes,
        }
    }

    #[must_use]
    pub const fn x2(&self) -> usize {
        self.x + self.width
    }

    #[must_use]
    pub const fn y2(&self) -> usize {
        self.y + self.height
    }

    #[must_use]
    pub const fn size(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    #[must_use]
    pub fn is_leaf(&self) -> bool {
        self.panes.is_empty()
    }

    #[must_use]
    pub const fn dimensions(&self) -> (usize, usize, usize, usize) {
        (self.x, self.y, self.x2(), self.y2())
    }

    #[must_use]
    pub const fn is_inside(&self, other: &Self) -> bool {
        self.x >= other.x && self.y >= other.y && self.x2() <= other.x2() && self.y2() <= other.y2()
    }

    /// Depth-first list of leaf panes, in layout order.
    #[must_use]
    pub fn leaves(&self) -> Vec<&Layout> {
        let mut out = Vec::new();
        self.collect(&mut out, false);
        out
    }

    /// Depth-first list of every node, the root included.
    #[must_use]
    pub fn nodes(&self) -> Vec<&Layout> {
        let mut out = Vec::new();
        self.collect(&mut out, true);
        out
    }

    fn collect<'a>(&'a self, out: &mut Vec<&'a Layout>, all: bool) {
        if all || self.identifier.is_some() {
            out.push(self);
        }
        for pane in &self.panes {
            pane.collect(out, all);
        }
    }

    /// Composite key over `(identifier, origin, size)` of every node.
    ///
    /// Two trees with equal keys render to the same container skeleton.
    #[must_use]
    pub fn structure_key(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        for node in self.nodes() {
            (node.identifier, node.x, node.y, node.width, node.height, node.panes.len())
                .hash(&mut hasher);
        }
        hasher.finish()
    }

    /// Re-derive this region from a freshly parsed window tree.
    ///
    /// Collects the outermost nodes of `fresh` lying inside this rectangle,
    /// so a pane split since the last poll is replaced by the split group
    /// covering the same area. A whole-window region returns `fresh` as is.
    #[must_use]
    pub fn refit(&self, fresh: &Layout) -> Layout {
        if fresh.is_inside(self) {
            return fresh.clone();
        }

        let mut panes = Vec::new();
        let mut covered: Vec<(usize, usize, usize, usize)> = Vec::new();
        for node in fresh.nodes() {
            if node.is_inside(self) && !covered.contains(&node.dimensions()) {
                covered.extend(node.nodes().iter().map(|n| n.dimensions()));
                panes.push(node.clone());
            }
        }

        match panes.len() {
            0 => self.clone(),
            1 => panes.remove(0),
            _ => {
                let x = panes.iter().map(|p| p.x).min().unwrap_or(self.x);
                let y = panes.iter().map(|p| p.y).min().unwrap_or(self.y);
                let x2 = panes.iter().map(Layout::x2).max().unwrap_or(self.x2());
                let y2 = panes.iter().map(Layout::y2).max().unwrap_or(self.y2());
                let vertical = panes.windows(2).all(|w| w[1].y > w[0].y);
                Layout::split(x, y, x2 - x, y2 - y, vertical, panes)
            }
        }
    }

    fn describe(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        let kind = if self.vertical { "Vertical" } else { "Horizontal" };
        let id = self
            .identifier
            .map_or_else(|| "-".to_string(), |id| id.to_string());
        writeln!(
            f,
            "{:indent$}{kind}Layout(id:{id} x:{} y:{} x2:{} y2:{})",
            "",
            self.x,
            self.y,
            self.x2(),
            self.y2(),
            indent = depth * 2
        )?;
        for pane in &self.panes {
            pane.describe(f, depth + 1)?;
        }
        Ok(())
    }
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.describe(f, 0)
    }
}

/// Parse a full window layout string (`checksum,WxH,x,y…`).
pub fn parse(layout: &str) -> Result<Layout> {
    let layout = layout.trim();
    if layout.is_empty() {
        return Err(LayoutError::Empty);
    }
    let (_, body) = layout
        .split_once(',')
        .ok_or_else(|| LayoutError::MissingWindowField(layout.to_string()))?;

    let mut panes = build(&tokenize(body)?, false)?;
    if panes.is_empty() {
        return Err(LayoutError::Empty);
    }
    Ok(panes.remove(0))
}

/// Index of the bracket closing the one at `open`.
///
/// Only brackets of the same kind are counted. Returns `None` when `open`
/// is not a bracket or the bracket is never balanced.
#[must_use]
pub fn find_close(segment: &str, open: usize) -> Option<usize> {
    let bytes = segment.as_bytes();
    let open_byte = *bytes.get(open)?;
    let close_byte = match open_byte {
        b'{' => b'}',
        b'[' => b']',
        _ => return None,
    };

    let mut depth = 0usize;
    for (offset, &byte) in bytes[open..].iter().enumerate() {
        if byte == open_byte {
            depth += 1;
        } else if byte == close_byte {
            depth -= 1;
            if depth == 0 {
                return Some(open + offset);
            }
        }
    }
    None
}

/// Split a layout segment into scalar fields and bracketed groups.
pub fn tokenize(segment: &str) -> Result<Vec<Token<'_>>> {
    let bytes = segment.as_bytes();
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        match bytes[pos] {
            b',' => pos += 1,
            open @ (b'{' | b'[') => {
                let close = find_close(segment, pos).ok_or(LayoutError::UnmatchedBracket {
                    open: char::from(open),
                    offset: pos,
                })?;
                tokens.push(Token::Group {
                    vertical: open == b'[',
                    body: &segment[pos + 1..close],
                });
                pos = close + 1;
            }
            _ => {
                let start = pos;
                while pos < bytes.len() && !matches!(bytes[pos], b',' | b'{' | b'[') {
                    pos += 1;
                }
                tokens.push(Token::Field(&segment[start..pos]));
            }
        }
    }
    Ok(tokens)
}

fn parse_number(field: &'static str, value: &str) -> Result<usize> {
    value
        .trim()
        .parse::<usize>()
        .map_err(|_| LayoutError::InvalidNumber {
            field,
            value: value.to_string(),
        })
}

fn scalar<'a>(field: &'static str, token: Token<'a>) -> Result<&'a str> {
    match token {
        Token::Field(value) => Ok(value),
        Token::Group { body, .. } => Err(LayoutError::InvalidNumber {
            field,
            value: body.to_string(),
        }),
    }
}

/// Build sibling nodes from tokens, four at a time.
///
/// `parent_vertical` is inherited by leaves so a pane knows which way its
/// group splits.
pub fn build(tokens: &[Token<'_>], parent_vertical: bool) -> Result<Vec<Layout>> {
    let dangling = tokens.len() % 4;
    if dangling != 0 {
        return Err(LayoutError::IncompleteNode { count: dangling });
    }

    let mut panes = Vec::with_capacity(tokens.len() / 4);
    for node in tokens.chunks_exact(4) {
        let size = scalar("size", node[0])?;
        let (width, height) =
            size.split_once('x')
                .ok_or_else(|| LayoutError::InvalidNumber {
                    field: "size",
                    value: size.to_string(),
                })?;
        let width = parse_number("width", width)?;
        let height = parse_number("height", height)?;
        let x = parse_number("x", scalar("x", node[1])?)?;
        let y = parse_number("y", scalar("y", node[2])?)?;

        let layout = match node[3] {
            Token::Group { vertical, body } => {
                let children = build(&tokenize(body)?, vertical)?;
                if children.is_empty() {
                    return Err(LayoutError::EmptyGroup);
                }
                Layout::split(x, y, width, height, vertical, children)
            }
            Token::Field(id) => {
                let id = parse_number("identifier", id)?;
                let id = u32::try_from(id).map_err(|_| LayoutError::InvalidNumber {
                    field: "identifier",
                    value: id.to_string(),
                })?;
                let mut leaf = Layout::leaf(x, y, width, height, id);
                leaf.vertical = parent_vertical;
                leaf
            }
        };
        panes.push(layout);
    }
    Ok(panes)
}

#[cfg(test)]
mod tests {
    use super::*;

    const NESTED: &str = "bb62,159x48,0,0{79x48,0,0,79,79x48,80,0[79x24,80,0,80,79x23,80,25,81]}";

    #[test]
    fn single_pane() {
        let root = parse("@1,80x24,0,0,3").expect("single pane layout");
        assert_eq!(root.size(), (80, 24));
        assert_eq!((root.x, root.y), (0, 0));
        assert_eq!(root.identifier, Some(3));
        assert!(root.panes.is_empty());
    }

    #[test]
    fn nested_layout_tree() {
        let root = parse(NESTED).expect("nested layout");
        assert_eq!(root.identifier, None);
        assert!(!root.vertical);
        assert_eq!(root.panes.len(), 2);

        let left = &root.panes[0];
        assert_eq!(left.identifier, Some(79));
        assert_eq!(left.size(), (79, 48));

        let right = &root.panes[1];
        assert!(right.vertical);
        assert_eq!(right.identifier, None);
        assert_eq!(right.panes.len(), 2);
        assert_eq!(right.panes[0].identifier, Some(80));
        assert_eq!(right.panes[1].identifier, Some(81));
        assert_eq!((right.panes[1].x, right.panes[1].y), (80, 25));
        assert!(right.panes[1].vertical, "leaf inherits parent orientation");
    }

    #[test]
    fn leaves_are_depth_first() {
        let root = parse(NESTED).expect("nested layout");
        let ids: Vec<_> = root.leaves().iter().filter_map(|p| p.identifier).collect();
        assert_eq!(ids, vec![79, 80, 81]);
        assert_eq!(root.nodes().len(), 5);
    }

    #[test]
    fn find_close_counts_same_kind_only() {
        let s = "{a{b[c]}d}e";
        assert_eq!(find_close(s, 0), Some(9));
        assert_eq!(find_close(s, 2), Some(7));
        assert_eq!(find_close(s, 4), Some(6));
        assert_eq!(find_close("{{}", 0), None);
        assert_eq!(find_close("x", 0), None);
    }

    #[test]
    fn tokenize_groups_and_siblings() {
        let tokens = tokenize("10x5,0,0{5x5,0,0,1,4x5,6,0,2},3x3,0,6,4").expect("tokens");
        assert_eq!(tokens.len(), 8);
        assert_eq!(tokens[0], Token::Field("10x5"));
        assert!(matches!(tokens[3], Token::Group { vertical: false, .. }));
        assert_eq!(tokens[7], Token::Field("4"));
    }

    #[test]
    fn deeply_nested_brackets() {
        let layout = "x,20x20,0,0[20x10,0,0{10x10,0,0[10x5,0,0,1,10x4,0,6,2],9x10,11,0,3},20x9,0,11,4]";
        let root = parse(layout).expect("deep layout");
        let ids: Vec<_> = root.leaves().iter().filter_map(|p| p.identifier).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);
    }

    #[test]
    fn malformed_layouts_fail() {
        assert_eq!(parse(""), Err(LayoutError::Empty));
        assert!(matches!(parse("80x24"), Err(LayoutError::MissingWindowField(_))));
        assert!(matches!(
            parse("a,80x24,0,0{40x24,0,0,1"),
            Err(LayoutError::UnmatchedBracket { open: '{', .. })
        ));
        assert!(matches!(
            parse("a,80x24,zero,0,1"),
            Err(LayoutError::InvalidNumber { field: "x", .. })
        ));
        assert!(matches!(
            parse("a,80,0,0,1"),
            Err(LayoutError::InvalidNumber { field: "size", .. })
        ));
        assert!(matches!(parse("a,80x24,0,0"), Err(LayoutError::IncompleteNode { count: 3 })));
        assert_eq!(parse("a,80x24,0,0{}"), Err(LayoutError::EmptyGroup));
    }

    #[test]
    fn structure_key_tracks_geometry() {
        let a = parse(NESTED).expect("layout");
        let b = parse(NESTED).expect("layout");
        assert_eq!(a.structure_key(), b.structure_key());

        let resized = parse("bb62,159x48,0,0{79x48,0,0,79,79x48,80,0[79x20,80,0,80,79x27,80,21,81]}")
            .expect("layout");
        assert_ne!(a.structure_key(), resized.structure_key());
    }

    #[test]
    fn geometry_predicates() {
        let outer = Layout::leaf(0, 0, 10, 10, 1);
        let inner = Layout::leaf(2, 2, 3, 3, 2);
        let apart = Layout::leaf(10, 0, 5, 5, 3);
        assert!(inner.is_inside(&outer));
        assert!(!apart.is_inside(&outer));
        assert!(!outer.is_inside(&inner));
    }

    #[test]
    fn refit_follows_a_split_pane() {
        let before = parse(NESTED).expect("layout");
        let target = before.panes[1].panes[0].clone();
        let after = parse(
            "bb62,159x48,0,0{79x48,0,0,79,79x48,80,0[79x24,80,0{39x24,80,0,80,39x24,120,0,82},79x23,80,25,81]}",
        )
        .expect("layout");

        let refit = target.refit(&after);
        assert_eq!(refit.dimensions(), target.dimensions());
        let ids: Vec<_> = refit.leaves().iter().filter_map(|p| p.identifier).collect();
        assert_eq!(ids, vec![80, 82]);
    }

    #[test]
    fn refit_of_whole_window_is_fresh_tree() {
        let root = parse(NESTED).expect("layout");
        assert_eq!(root.refit(&root), root);
    }

    #[test]
    fn display_dumps_tree() {
        let root = parse(NESTED).expect("layout");
        let dump = root.to_string();
        assert!(dump.starts_with("HorizontalLayout(id:- x:0 y:0 x2:159 y2:48)"));
        assert!(dump.contains("    VerticalLayout(id:81 x:80 y:25 x2:159 y2:48)"));
    }
}
