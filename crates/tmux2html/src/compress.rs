//! gzip + base64 payloads split into fixed-length hunks for embedding in
//! `<script>` elements.

use std::io::{self, Write};

use base64::{Engine as _, engine::general_purpose::STANDARD};
use flate2::Compression;
use flate2::write::GzEncoder;
use tracing::warn;

use tmux2html_core::HistoryEncoder;

/// Characters per hunk.
pub const HUNK_LEN: usize = 200;

pub fn gzip(data: &[u8]) -> io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    encoder.finish()
}

/// Compress `text` and split its base64 form into hunks of at most
/// `hunk_len` characters.
pub fn compress_hunks(text: &str, hunk_len: usize) -> io::Result<Vec<String>> {
    let encoded = STANDARD.encode(gzip(text.as_bytes())?);
    let hunk_len = hunk_len.max(1);
    // base64 output is ASCII, so byte chunks are character chunks.
    Ok(encoded
        .as_bytes()
        .chunks(hunk_len)
        .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
        .collect())
}

/// [`HistoryEncoder`] producing gzip + base64 hunks.
#[derive(Debug, Clone, Copy)]
pub struct GzipBase64 {
    hunk_len: usize,
}

impl Default for GzipBase64 {
    fn default() -> Self {
        Self { hunk_len: HUNK_LEN }
    }
}

impl GzipBase64 {
    #[must_use]
    pub fn new(hunk_len: usize) -> Self {
        Self { hunk_len }
    }
}

impl HistoryEncoder for GzipBase64 {
    fn encode(&self, text: &str) -> Vec<String> {
        compress_hunks(text, self.hunk_len).unwrap_or_else(|error| {
            warn!(%error, "failed to compress history payload");
            Vec::new()
        })
    }
}
